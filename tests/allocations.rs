use std::{
    alloc::{GlobalAlloc, Layout, System},
    cell::Cell,
};

use shared_ptr::{SharedFromThis, Strong, ThisSlot, Weak};

struct Counting;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    static LIVE: Cell<isize> = const { Cell::new(0) };
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = ALLOCATIONS.try_with(|n| n.set(n.get() + 1));
        let _ = LIVE.try_with(|n| n.set(n.get() + 1));
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let _ = LIVE.try_with(|n| n.set(n.get() - 1));
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: Counting = Counting;

/// Number of allocations made by the current thread while running `f`.
fn allocations(f: impl FnOnce()) -> usize {
    let before = ALLOCATIONS.with(Cell::get);
    f();
    ALLOCATIONS.with(Cell::get) - before
}

/// Allocations made by the current thread since `start` that have not been freed yet.
fn live_since(start: isize) -> isize {
    LIVE.with(Cell::get) - start
}

struct Node {
    this: ThisSlot<Node>,
    value: u32,
}

impl Node {
    fn new(value: u32) -> Self {
        Node {
            this: ThisSlot::new(),
            value,
        }
    }
}

impl SharedFromThis for Node {
    fn this_slot(&self) -> &ThisSlot<Self> {
        &self.this
    }
}

#[test]
fn new_allocates_once() {
    let n = allocations(|| {
        let s = Strong::new([7u64; 4]);
        let w = s.downgrade();
        let s2 = s.clone();
        let field = s.project(|a| &a[2]);

        drop(s);
        drop(s2);
        assert!(*field == 7);
        drop(field);
        assert!(w.expired());
    });

    assert!(n == 1);
}

#[test]
fn from_box_allocates_twice() {
    let n = allocations(|| {
        let s = Strong::from_box(Box::new(5u32));
        let w = Weak::from(&s);
        assert!(*w.lock() == 5);
    });

    assert!(n == 2);
}

#[test]
fn empty_does_not_allocate() {
    let n = allocations(|| {
        let s = Strong::<u32>::empty();
        let w = s.downgrade();
        assert!(w.lock().is_null());
    });

    assert!(n == 0);
}

#[test]
fn inline_block_freed_after_last_weak() {
    let start = LIVE.with(Cell::get);

    let s = Strong::new([1u64; 8]);
    let w = s.downgrade();
    let field = w.project(|a| &a[3]);
    assert!(live_since(start) == 1);

    drop(s);
    // the value shares the block, which the weak pointers keep allocated
    assert!(w.expired() && field.expired());
    assert!(live_since(start) == 1);

    drop(w);
    assert!(live_since(start) == 1);
    drop(field);
    assert!(live_since(start) == 0);
}

#[test]
fn indirect_value_freed_before_block() {
    let start = LIVE.with(Cell::get);

    let s = Strong::from_box(Box::new(String::from("indirect")));
    let w = s.downgrade();
    // box, string buffer and block
    assert!(live_since(start) == 3);

    drop(s);
    assert!(w.expired());
    assert!(live_since(start) == 1);

    drop(w);
    assert!(live_since(start) == 0);
}

#[test]
fn self_ref_blocks_freed() {
    let start = LIVE.with(Cell::get);

    let p = Strong::new_with_self_ref(Node::new(1));
    let again = p.shared_from_this().unwrap();
    assert!(again == p);
    let w = again.weak_from_this();
    assert!(live_since(start) == 1);

    drop(p);
    drop(again);
    assert!(w.expired());
    assert!(live_since(start) == 1);

    drop(w);
    assert!(live_since(start) == 0);
}

#[test]
fn reset_with_self_ref_frees_previous_blocks() {
    let start = LIVE.with(Cell::get);

    let mut p = Strong::from_box_with_self_ref(Box::new(Node::new(1)));
    let first = p.weak_from_this();
    assert!(live_since(start) == 2);

    p.reset_with_self_ref(Box::new(Node::new(2)));
    assert!(p.value == 2);
    assert!(p.shared_from_this().unwrap() == p);
    assert!(first.expired());
    // the first block stays for `first`, the second value and block are new
    assert!(live_since(start) == 3);

    drop(first);
    assert!(live_since(start) == 2);

    drop(p);
    assert!(live_since(start) == 0);
}

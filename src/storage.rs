use std::{
    cell::{Cell, UnsafeCell},
    mem::MaybeUninit,
    ptr,
    ptr::NonNull,
};

/// The two counters every control block carries.
///
/// `strong` counts the [`Strong`][crate::Strong] pointers keeping the value alive. `handles` counts
/// every [`Handle`][crate::handle::Handle], strong or weak, keeping the block itself allocated. A new
/// block starts at one of each on behalf of the strong pointer that created it.
pub(crate) struct Counts {
    strong: Cell<usize>,
    handles: Cell<usize>,
}

impl Counts {
    fn new() -> Self {
        Counts {
            strong: Cell::new(1),
            handles: Cell::new(1),
        }
    }

    /// Only called by `Handle`.
    pub(crate) fn handle_begin(&self) {
        debug_assert!(self.handles.get() > 0);
        increment(&self.handles);
    }

    /// Only called by `Handle`. Returns `true` when the last handle is gone and the block must be freed.
    pub(crate) fn handle_end(&self) -> bool {
        let n = self.handles.get();
        debug_assert!(n > 0);
        self.handles.set(n - 1);
        n == 1
    }

    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        self.handles.get()
    }
}

/// Adds one to a count, aborting the process on overflow. Overflow needs pointers leaked with
/// `mem::forget`, and a wrapped count would free a block that is still in use.
pub(crate) fn increment(count: &Cell<usize>) {
    match count.get().checked_add(1) {
        Some(n) => count.set(n),
        None => {
            log::error!("reference count overflow");
            std::process::abort()
        }
    }
}

/// A control block. Pointers only ever see `dyn Storage`, so they do not know whether the value lives
/// inside the block or in a separate allocation.
pub(crate) trait Storage {
    fn counts(&self) -> &Counts;

    /// Drops the managed value without freeing the block.
    ///
    /// # Safety
    ///
    /// Must be called exactly once, when the strong count drops to zero. [`Storage::end_strong`] is the
    /// only caller.
    unsafe fn destroy(&self);

    fn begin_strong(&self) {
        let strong = &self.counts().strong;
        debug_assert!(strong.get() > 0, "strong count revived from zero");
        increment(strong);
    }

    fn end_strong(&self) {
        let strong = &self.counts().strong;
        debug_assert!(strong.get() > 0);
        strong.set(strong.get() - 1);

        if strong.get() == 0 {
            log::trace!("strong count reached zero, destroying value");
            // the count never leaves zero again, so this runs once
            unsafe { self.destroy() }
        }
    }

    fn strong_count(&self) -> usize {
        self.counts().strong.get()
    }

    fn alive(&self) -> bool {
        self.strong_count() > 0
    }
}

/// A control block adopting a value that was allocated on its own.
pub(crate) struct IndirectStorage<T>
where
    T: ?Sized,
{
    counts: Counts,
    data: Cell<Option<NonNull<T>>>,
}

impl<T> IndirectStorage<T>
where
    T: ?Sized,
{
    pub(crate) fn new(value: Box<T>) -> Self {
        IndirectStorage {
            counts: Counts::new(),
            data: Cell::new(Some(NonNull::from(Box::leak(value)))),
        }
    }

    /// The adopted value, or `None` once it has been destroyed.
    pub(crate) fn data(&self) -> Option<NonNull<T>> {
        self.data.get()
    }
}

impl<T> Storage for IndirectStorage<T>
where
    T: ?Sized,
{
    fn counts(&self) -> &Counts {
        &self.counts
    }

    unsafe fn destroy(&self) {
        // cleared before dropping so the block's own `Drop` can not free it a second time
        if let Some(data) = self.data.take() {
            drop(Box::from_raw(data.as_ptr()));
        }
    }
}

impl<T> Drop for IndirectStorage<T>
where
    T: ?Sized,
{
    fn drop(&mut self) {
        if let Some(data) = self.data.get_mut().take() {
            unsafe { drop(Box::from_raw(data.as_ptr())) }
        }
    }
}

/// A control block with the value embedded in it, so that both share one allocation.
pub(crate) struct InlineStorage<T> {
    counts: Counts,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> InlineStorage<T> {
    /// Creates a block with room for the value. The value must be written with [`InlineStorage::init`]
    /// before the block is used for anything else.
    pub(crate) fn uninit() -> Self {
        InlineStorage {
            counts: Counts::new(),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Moves `value` into the block and returns a pointer to it.
    ///
    /// # Safety
    ///
    /// Must be called exactly once, right after [`InlineStorage::uninit`], before any handle to the block
    /// exists. The block must not move afterwards, so call this on its final heap address.
    pub(crate) unsafe fn init(&self, value: T) -> NonNull<T> {
        let slot = self.value.get().cast::<T>();
        slot.write(value);
        NonNull::new_unchecked(slot)
    }
}

impl<T> Storage for InlineStorage<T> {
    fn counts(&self) -> &Counts {
        &self.counts
    }

    unsafe fn destroy(&self) {
        // the bytes stay allocated until the last handle frees the block
        ptr::drop_in_place(self.value.get().cast::<T>());
    }
}

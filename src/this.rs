use std::{cell::RefCell, fmt};

use crate::{error::DanglingWeak, strong::Strong, weak::Weak};

/// Lets a value hand out pointers to itself once it is owned by a [`Strong`].
///
/// The value embeds a [`ThisSlot`] and returns it from [`SharedFromThis::this_slot`]. The slot is filled
/// by [`Strong::new_with_self_ref`], [`Strong::from_box_with_self_ref`] and
/// [`Strong::reset_with_self_ref`]. Other constructors leave it empty.
///
/// # Examples
///
/// ```
/// # use shared_ptr::{SharedFromThis, Strong, ThisSlot};
/// struct Node {
///     this: ThisSlot<Node>,
///     value: i32,
/// }
///
/// impl SharedFromThis for Node {
///     fn this_slot(&self) -> &ThisSlot<Self> {
///         &self.this
///     }
/// }
///
/// let node = Strong::new_with_self_ref(Node { this: ThisSlot::new(), value: 7 });
/// let again = node.shared_from_this().unwrap();
///
/// assert!(again == node);
/// assert!(again.value == 7);
/// ```
pub trait SharedFromThis: Sized + 'static {
    fn this_slot(&self) -> &ThisSlot<Self>;

    /// Returns a new strong pointer to `self`. Fails if `self` was never registered, or if it is being
    /// dropped.
    fn shared_from_this(&self) -> Result<Strong<Self>, DanglingWeak> {
        Strong::try_from(&self.weak_from_this())
    }

    /// Returns a weak pointer to `self`. It is expired if `self` was never registered.
    fn weak_from_this(&self) -> Weak<Self> {
        self.this_slot().get()
    }
}

/// The weak back-reference stored inside a [`SharedFromThis`] value.
pub struct ThisSlot<T>
where
    T: 'static,
{
    me: RefCell<Weak<T>>,
}

impl<T> ThisSlot<T> {
    pub const fn new() -> Self {
        ThisSlot {
            me: RefCell::new(Weak::new()),
        }
    }

    pub fn get(&self) -> Weak<T> {
        self.me.borrow().clone()
    }

    pub(crate) fn register(&self, weak: Weak<T>) {
        // the previous registration is dropped outside of the borrow
        let previous = self.me.replace(weak);
        drop(previous);
    }
}

impl<T> Default for ThisSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ThisSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ThisSlot")
    }
}

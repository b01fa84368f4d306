use std::{fmt, marker::PhantomData, mem, ptr::NonNull};

use crate::{handle::Handle, strong::Strong};

/// A weak pointer to a value owned by [`Strong`] pointers.
///
/// A weak pointer keeps the control block allocated but not the value. To access the value you must
/// first [`upgrade`][Weak::upgrade] or [`lock`][Weak::lock] it, which fails once the last strong pointer
/// is gone.
pub struct Weak<T>
where
    T: ?Sized + 'static,
{
    handle: Handle,
    ptr: Option<NonNull<T>>,
    _marker: PhantomData<*const T>,
}

impl<T> fmt::Debug for Weak<T>
where
    T: ?Sized + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("Weak");
        if let Some(strong) = self.upgrade() {
            f.field(&strong);
        }
        f.finish()
    }
}

impl<T> Weak<T>
where
    T: ?Sized,
{
    /// Creates an empty weak pointer. It is always expired.
    pub const fn new() -> Self {
        Weak::from_parts(Handle::empty(), None)
    }

    pub(crate) const fn from_parts(handle: Handle, ptr: Option<NonNull<T>>) -> Self {
        Weak {
            handle,
            ptr,
            _marker: PhantomData,
        }
    }

    /// Creates a strong pointer to the value. Returns `None` if the value has already been dropped
    /// because there are no more strong pointers to it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use shared_ptr::Strong;
    /// let s = Strong::new(5);
    /// let w = s.downgrade();
    ///
    /// assert!(*w.upgrade().unwrap() == 5);
    ///
    /// drop(s);
    /// assert!(w.upgrade().is_none());
    /// ```
    pub fn upgrade(&self) -> Option<Strong<T>> {
        let storage = self.handle.get()?;
        if !storage.alive() {
            return None;
        }

        storage.begin_strong();
        Some(Strong::from_parts(self.handle.clone(), self.ptr))
    }

    /// Same as [`Weak::upgrade`], but returns an empty pointer on failure.
    pub fn lock(&self) -> Strong<T> {
        self.upgrade().unwrap_or_default()
    }

    /// Stores a new strong pointer to the value in `target` and returns `true`, or returns `false` and
    /// leaves `target` untouched if the value has been dropped. Whatever `target` owned before is
    /// released.
    pub fn try_lock_into(&self, target: &mut Strong<T>) -> bool {
        match self.upgrade() {
            Some(strong) => {
                *target = strong;
                true
            }
            None => false,
        }
    }

    /// Creates a weak pointer to a part of the value, or to the value seen as another type, sharing the
    /// control block with `self`. Returns an empty weak pointer if the value has already been dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// # use shared_ptr::Strong;
    /// let pair = Strong::new((1, String::from("one")));
    /// let name = pair.downgrade().project(|p| &p.1);
    ///
    /// assert!(*name.lock() == "one");
    /// drop(pair);
    /// assert!(name.expired());
    /// ```
    pub fn project<U>(&self, f: impl FnOnce(&T) -> &U) -> Weak<U>
    where
        U: ?Sized + 'static,
    {
        let Some(strong) = self.upgrade() else {
            return Weak::new();
        };
        let ptr = strong.get().map(|value| NonNull::from(f(value)));

        Weak::from_parts(self.handle.clone(), ptr)
    }

    /// Returns `true` if the pointer is empty or the value has been dropped.
    pub fn expired(&self) -> bool {
        self.handle.get().map_or(true, |storage| !storage.alive())
    }

    /// See [`Strong::use_count`].
    pub fn use_count(&self) -> usize {
        self.handle.get().map_or(0, |storage| storage.strong_count())
    }

    pub fn reset(&mut self) {
        self.handle = Handle::empty();
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Gets the observed address. The value behind it may already be dropped.
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        if self.handle.is_empty() {
            return None;
        }
        self.ptr
    }

    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        self.handle
            .get()
            .map_or(0, |storage| storage.counts().handle_count())
    }
}

impl<T> Clone for Weak<T>
where
    T: ?Sized,
{
    fn clone(&self) -> Self {
        Weak::from_parts(self.handle.clone(), self.ptr)
    }
}

impl<T> Default for Weak<T>
where
    T: ?Sized,
{
    fn default() -> Self {
        Weak::new()
    }
}

impl<T> From<&Strong<T>> for Weak<T>
where
    T: ?Sized,
{
    fn from(strong: &Strong<T>) -> Self {
        strong.downgrade()
    }
}

use std::{
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem,
    ops::Deref,
    ptr,
    ptr::NonNull,
};

use crate::{
    error::DanglingWeak,
    handle::Handle,
    storage::{IndirectStorage, InlineStorage, Storage},
    this::SharedFromThis,
    weak::Weak,
};

/// A reference counted pointer, similar to [`Rc`].
///
/// The counts are not atomic, so neither `Strong` nor [`Weak`] can cross threads. A `Strong` may be
/// empty, in which case [`Strong::get`] returns `None`. The address it observes may differ from the
/// value that keeps it alive, see [`Strong::alias`].
///
/// [`Rc`]: std::rc::Rc
pub struct Strong<T>
where
    T: ?Sized + 'static,
{
    handle: Handle,
    ptr: Option<NonNull<T>>,
    _owns: PhantomData<T>,
}

impl<T> Drop for Strong<T>
where
    T: ?Sized,
{
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T> fmt::Debug for Strong<T>
where
    T: ?Sized + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("Strong(null)"),
        }
    }
}

impl<T> Strong<T> {
    /// Allocates the control block and the value together, using a single heap allocation.
    ///
    /// # Examples
    ///
    /// ```
    /// # use shared_ptr::Strong;
    /// let s = Strong::new(5);
    /// assert!(*s == 5);
    /// assert!(s.use_count() == 1);
    /// ```
    pub fn new(value: T) -> Self {
        let storage = Box::into_raw(Box::new(InlineStorage::<T>::uninit()));
        log::trace!("allocated inline control block for {}", std::any::type_name::<T>());

        unsafe {
            let ptr = (*storage).init(value);
            let handle = Handle::from_raw(NonNull::new_unchecked(storage as *mut dyn Storage));
            Strong::from_parts(handle, Some(ptr))
        }
    }

    /// Like [`Strong::new`], and registers the new pointer with the value so that
    /// [`SharedFromThis::shared_from_this`] works.
    pub fn new_with_self_ref(value: T) -> Self
    where
        T: SharedFromThis,
    {
        let strong = Strong::new(value);
        strong.register_self();
        strong
    }

    /// Like [`Strong::from_box`], and registers the new pointer with the value.
    pub fn from_box_with_self_ref(value: Box<T>) -> Self
    where
        T: SharedFromThis,
    {
        let strong = Strong::from_box(value);
        strong.register_self();
        strong
    }

    /// Like [`Strong::reset_with`], and registers the new pointer with the value. A previous
    /// registration is overwritten.
    pub fn reset_with_self_ref(&mut self, value: Box<T>)
    where
        T: SharedFromThis,
    {
        self.reset_with(value);
        self.register_self();
    }

    fn register_self(&self)
    where
        T: SharedFromThis,
    {
        if let Some(value) = self.get() {
            value.this_slot().register(self.downgrade());
        }
    }
}

impl<T> Strong<T>
where
    T: ?Sized,
{
    /// Creates an empty pointer.
    pub const fn empty() -> Self {
        Strong::from_parts(Handle::empty(), None)
    }

    pub(crate) const fn from_parts(handle: Handle, ptr: Option<NonNull<T>>) -> Self {
        Strong {
            handle,
            ptr,
            _owns: PhantomData,
        }
    }

    /// Adopts a value that already lives on the heap. The control block is a second allocation, use
    /// [`Strong::new`] where possible.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::fmt::Display;
    /// # use shared_ptr::Strong;
    /// let s = Strong::<dyn Display>::from_box(Box::new(5));
    /// assert!(s.to_string() == "5");
    /// ```
    pub fn from_box(value: Box<T>) -> Self {
        let storage = Box::into_raw(Box::new(IndirectStorage::new(value)));
        log::trace!("allocated indirect control block for {}", std::any::type_name::<T>());

        unsafe {
            let ptr = (*storage).data();
            let handle = Handle::from_raw(NonNull::new_unchecked(storage as *mut dyn Storage));
            Strong::from_parts(handle, ptr)
        }
    }

    /// Creates a pointer that shares ownership with `owner` but observes `ptr`.
    ///
    /// The value owned by `owner` is dropped when its last strong pointer is gone, whether or not that
    /// pointer is an alias. If `owner` is empty the result is empty as well.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid for as long as the value owned by `owner` is alive, typically because it
    /// points into that value.
    pub unsafe fn alias<U>(owner: &Strong<U>, ptr: NonNull<T>) -> Self
    where
        U: ?Sized + 'static,
    {
        if let Some(storage) = owner.handle.get() {
            storage.begin_strong();
        }

        Strong::from_parts(owner.handle.clone(), Some(ptr))
    }

    /// Same as [`Strong::alias`], but takes over the ownership of `owner` instead of sharing it. The
    /// strong count does not change.
    ///
    /// # Safety
    ///
    /// See [`Strong::alias`].
    pub unsafe fn alias_owned<U>(mut owner: Strong<U>, ptr: NonNull<T>) -> Self
    where
        U: ?Sized + 'static,
    {
        let handle = mem::take(&mut owner.handle);
        owner.ptr = None;

        Strong::from_parts(handle, Some(ptr))
    }

    /// Creates a pointer to a part of the value, or to the value seen as another type, sharing
    /// ownership with `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use shared_ptr::Strong;
    /// let pair = Strong::new((1, String::from("one")));
    /// let name = pair.project(|p| &p.1);
    ///
    /// drop(pair);
    /// assert!(*name == "one");
    /// ```
    pub fn project<U>(&self, f: impl FnOnce(&T) -> &U) -> Strong<U>
    where
        U: ?Sized + 'static,
    {
        match self.get() {
            Some(value) => {
                let ptr = NonNull::from(f(value));
                unsafe { Strong::alias(self, ptr) }
            }
            None => Strong::empty(),
        }
    }

    /// Same as [`Strong::project`], but consumes `self`. Commonly used to turn a pointer into a trait
    /// object pointer.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::fmt::Debug;
    /// # use shared_ptr::Strong;
    /// fn as_debug(v: &i32) -> &(dyn Debug + 'static) {
    ///     v
    /// }
    ///
    /// let s = Strong::new(5);
    /// let d: Strong<dyn Debug> = s.clone().map(as_debug);
    ///
    /// assert!(d == s);
    /// assert!(s.use_count() == 2);
    /// ```
    pub fn map<U>(self, f: impl FnOnce(&T) -> &U) -> Strong<U>
    where
        U: ?Sized + 'static,
    {
        let ptr = match self.get() {
            Some(value) => NonNull::from(f(value)),
            None => return Strong::empty(),
        };

        unsafe { Strong::alias_owned(self, ptr) }
    }

    /// Releases ownership and leaves `self` empty. Drops the value if this was its last strong pointer.
    pub fn reset(&mut self) {
        if let Some(storage) = self.handle.get() {
            storage.end_strong();
        }

        self.handle = Handle::empty();
        self.ptr = None;
    }

    /// Releases ownership, then adopts `value` as [`Strong::from_box`] does.
    pub fn reset_with(&mut self, value: Box<T>) {
        self.reset();
        *self = Strong::from_box(value);
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Moves the ownership out, leaving `self` empty.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Gets a reference to the value, or `None` if the pointer is empty.
    pub fn get(&self) -> Option<&T> {
        self.as_ptr().map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Gets the observed address, or `None` if the pointer is empty.
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        if self.handle.is_empty() {
            return None;
        }
        self.ptr
    }

    pub fn is_null(&self) -> bool {
        self.handle.is_empty()
    }

    /// Gets the number of strong pointers to the value, `0` if the pointer is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// # use shared_ptr::Strong;
    /// let s1 = Strong::new(5);
    /// let s2 = s1.clone();
    /// assert!(s1.use_count() == 2);
    ///
    /// drop(s2);
    /// assert!(s1.use_count() == 1);
    /// ```
    pub fn use_count(&self) -> usize {
        self.handle.get().map_or(0, |storage| storage.strong_count())
    }

    /// Creates a new weak pointer to the value.
    pub fn downgrade(&self) -> Weak<T> {
        Weak::from_parts(self.handle.clone(), self.ptr)
    }

    /// The observed address, paired with the block address when the observed value is zero-sized.
    fn identity(&self) -> (*const (), *const ()) {
        match self.get() {
            Some(value) if mem::size_of_val(value) == 0 => {
                ((value as *const T).cast(), self.handle.block_addr())
            }
            Some(value) => ((value as *const T).cast(), ptr::null()),
            None => (ptr::null(), ptr::null()),
        }
    }
}

impl<T> Clone for Strong<T>
where
    T: ?Sized,
{
    fn clone(&self) -> Self {
        if let Some(storage) = self.handle.get() {
            storage.begin_strong();
        }

        Strong::from_parts(self.handle.clone(), self.ptr)
    }
}

impl<T> Default for Strong<T>
where
    T: ?Sized,
{
    fn default() -> Self {
        Strong::empty()
    }
}

impl<T> Deref for Strong<T>
where
    T: ?Sized,
{
    type Target = T;

    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("dereferenced an empty `Strong`"),
        }
    }
}

impl<T> From<Box<T>> for Strong<T>
where
    T: ?Sized,
{
    fn from(value: Box<T>) -> Self {
        Strong::from_box(value)
    }
}

impl<T> TryFrom<&Weak<T>> for Strong<T>
where
    T: ?Sized,
{
    type Error = DanglingWeak;

    fn try_from(weak: &Weak<T>) -> Result<Self, DanglingWeak> {
        weak.upgrade().ok_or(DanglingWeak)
    }
}

/// Two pointers are equal when they observe the same address, so an alias or a trait object pointer
/// equals the pointer it was made from. Zero-sized values may share one dangling address, so for them
/// the control block must match as well, and a zero-sized alias never equals a pointer to a sized value.
impl<T, U> PartialEq<Strong<U>> for Strong<T>
where
    T: ?Sized,
    U: ?Sized + 'static,
{
    fn eq(&self, other: &Strong<U>) -> bool {
        self.identity() == other.identity()
    }
}

impl<T> Eq for Strong<T> where T: ?Sized {}

impl<T> Hash for Strong<T>
where
    T: ?Sized,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state)
    }
}

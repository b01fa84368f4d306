use std::{ptr, ptr::NonNull};

use crate::storage::Storage;

/// An owning, counted reference to a control block.
///
/// Every [`Strong`][crate::Strong] and [`Weak`][crate::Weak] holds exactly one `Handle`, and the block
/// is freed when the last one is released. Duplicating a handle must go through [`Clone`] so the handle
/// count stays accurate.
pub(crate) struct Handle {
    storage: Option<NonNull<dyn Storage>>,
}

impl Handle {
    pub(crate) const fn empty() -> Self {
        Handle { storage: None }
    }

    /// Takes ownership of a block without touching its handle count.
    ///
    /// # Safety
    ///
    /// `storage` must come from [`Box::into_raw`] and its handle count must be one, owned by nobody else.
    pub(crate) unsafe fn from_raw(storage: NonNull<dyn Storage>) -> Self {
        Handle {
            storage: Some(storage),
        }
    }

    pub(crate) fn get(&self) -> Option<&dyn Storage> {
        // the block outlives `self` because `self` keeps it allocated
        self.storage.map(|storage| unsafe { &*storage.as_ptr() })
    }

    /// Address of the block, null if empty.
    pub(crate) fn block_addr(&self) -> *const () {
        self.storage
            .map_or(ptr::null(), |storage| storage.as_ptr().cast_const().cast())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.storage.is_none()
    }

    fn release(&mut self) {
        let Some(storage) = self.storage.take() else {
            return;
        };

        unsafe {
            if storage.as_ref().counts().handle_end() {
                log::trace!("last handle released, freeing control block");
                drop(Box::from_raw(storage.as_ptr()));
            }
        }
    }
}

impl Default for Handle {
    fn default() -> Self {
        Handle::empty()
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        if let Some(storage) = self.get() {
            storage.counts().handle_begin();
        }

        Handle {
            storage: self.storage,
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.release();
    }
}

use thiserror::Error;

/// Returned when a [`Strong`][crate::Strong] is requested from a [`Weak`][crate::Weak] whose value has
/// already been dropped.
///
/// [`Weak::lock`][crate::Weak::lock] and [`Weak::upgrade`][crate::Weak::upgrade] report the same
/// condition without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("dangling weak reference")]
pub struct DanglingWeak;

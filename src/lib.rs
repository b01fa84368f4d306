//! A reference counted [`Strong`] and [`Weak`] pointer for single-threaded use.
//!
//! The provided pointer types are similar to [`std::rc::Rc`] and [`std::rc::Weak`], built on a
//! control block with two counters. The strong count decides when the value is dropped, while the
//! handle count, which includes weak pointers, decides when the control block itself is freed. A weak
//! pointer therefore stays safe to query and drop after the value is gone.
//!
//! The control block comes in two layouts. [`Strong::new`] places the value inside the block, so that a
//! value and its counts cost a single allocation. [`Strong::from_box`] adopts a value that was allocated
//! on its own, which also allows unsized values such as trait objects. The pointers do not know which
//! layout backs them.
//!
//! A strong pointer may observe a different address than the value keeping it alive, for example a
//! field of that value. See [`Strong::project`], [`Strong::map`] and [`Strong::alias`]. Two strong
//! pointers compare equal when they observe the same address.
//!
//! Types implementing [`SharedFromThis`] can hand out pointers to themselves once owned by a `Strong`.
//!
//! The counts are plain integers, so neither pointer is [`Send`] or [`Sync`]. Reference cycles between
//! strong pointers are leaked.

mod error;
mod handle;
mod storage;
mod strong;
mod this;
mod weak;

pub use crate::{
    error::DanglingWeak,
    strong::Strong,
    this::{SharedFromThis, ThisSlot},
    weak::Weak,
};

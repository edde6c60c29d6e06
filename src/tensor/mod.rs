//! Tensor handles and identities
//!
//! A [`Tensor`] is a cheap, copyable handle. The tensor itself (name, type,
//! shape, format, storage, staged insertions, pending assignment and staging
//! flags) is a tensor identity living in its session's arena.

mod arena;
mod id;
pub(crate) mod identity;
pub(crate) mod staging;

pub(crate) use arena::TensorArena;
pub use id::{Tensor, TensorId};
pub use identity::StagingFlags;

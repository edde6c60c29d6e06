//! Tensor handles into a session's arena

use std::fmt;

/// Stable address of a tensor identity inside a session arena
///
/// `index` selects the arena slot and `epoch` counts how many identities the
/// slot has held. Releasing a tensor bumps the slot's epoch, so ids of
/// released tensors never match a live identity again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId {
    index: u32,
    epoch: u32,
}

impl TensorId {
    #[inline]
    pub(crate) const fn new(index: u32, epoch: u32) -> Self {
        Self { index, epoch }
    }

    /// Arena slot
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot this id was issued for
    #[inline]
    pub fn epoch(self) -> u32 {
        self.epoch
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({}v{})", self.index, self.epoch)
    }
}

/// User-facing tensor handle
///
/// A `Tensor` is a view of one tensor identity owned by a
/// [`Session`](crate::session::Session). Copying the handle aliases the same
/// identity: an insertion through one copy is visible through every other.
/// Two handles are equal exactly when they refer to the same identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tensor {
    id: TensorId,
}

impl Tensor {
    #[inline]
    pub(crate) const fn from_id(id: TensorId) -> Self {
        Self { id }
    }

    /// Identity this handle refers to
    #[inline]
    pub fn id(self) -> TensorId {
        self.id
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_copies_alias() {
        let a = Tensor::from_id(TensorId::new(3, 0));
        let b = a;
        assert_eq!(a, b);
        assert_eq!(b.id().index(), 3);
    }

    #[test]
    fn test_epoch_distinguishes_ids() {
        let old = TensorId::new(1, 0);
        let new = TensorId::new(1, 1);
        assert_ne!(old, new);
        assert_eq!(new.to_string(), "Tensor(1v1)");
    }
}

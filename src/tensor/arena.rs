//! Epoch-checked storage of tensor identities

use super::identity::TensorIdentity;
use super::{Tensor, TensorId};
use crate::error::{Error, Result};

#[derive(Debug)]
struct Slot {
    epoch: u32,
    identity: Option<TensorIdentity>,
}

/// Slots of tensor identities addressed by [`TensorId`]
///
/// Released slots are reused with a bumped epoch, so a handle to a released
/// tensor fails with `StaleHandle` instead of reaching its successor.
#[derive(Debug, Default)]
pub(crate) struct TensorArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl TensorArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, identity: TensorIdentity) -> Tensor {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].identity = Some(identity);
                index
            }
            None => {
                self.slots.push(Slot {
                    epoch: 0,
                    identity: Some(identity),
                });
                (self.slots.len() - 1) as u32
            }
        };
        Tensor::from_id(TensorId::new(index, self.slots[index as usize].epoch))
    }

    pub(crate) fn get(&self, id: TensorId) -> Result<&TensorIdentity> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.epoch == id.epoch())
            .and_then(|slot| slot.identity.as_ref())
            .ok_or_else(|| stale(id))
    }

    pub(crate) fn get_mut(&mut self, id: TensorId) -> Result<&mut TensorIdentity> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.epoch == id.epoch())
            .and_then(|slot| slot.identity.as_mut())
            .ok_or_else(|| stale(id))
    }

    pub(crate) fn contains(&self, id: TensorId) -> bool {
        self.get(id).is_ok()
    }

    pub(crate) fn remove(&mut self, id: TensorId) -> Result<TensorIdentity> {
        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.epoch == id.epoch())
            .ok_or_else(|| stale(id))?;
        let identity = slot.identity.take().ok_or_else(|| stale(id))?;
        slot.epoch = slot.epoch.wrapping_add(1);
        self.free.push(id.index());
        Ok(identity)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.identity.is_some()).count()
    }
}

fn stale(id: TensorId) -> Error {
    Error::StaleHandle { id: id.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use crate::format::Format;

    fn identity(name: &str) -> TensorIdentity {
        TensorIdentity::new(name.into(), DType::F64, vec![2], Format::sparse(1), 64, false)
    }

    #[test]
    fn test_insert_and_get() {
        let mut arena = TensorArena::new();
        let a = arena.insert(identity("a"));
        let b = arena.insert(identity("b"));
        assert_ne!(a, b);
        assert_eq!(arena.get(b.id()).unwrap().name(), "b");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_released_handle_is_stale() {
        let mut arena = TensorArena::new();
        let a = arena.insert(identity("a"));
        arena.remove(a.id()).unwrap();
        assert!(matches!(arena.get(a.id()), Err(Error::StaleHandle { .. })));
        assert!(arena.remove(a.id()).is_err());

        let reused = arena.insert(identity("c"));
        assert_eq!(reused.id().index(), a.id().index());
        assert_ne!(reused, a);
        assert!(!arena.contains(a.id()));
        assert_eq!(arena.get(reused.id()).unwrap().name(), "c");
    }
}

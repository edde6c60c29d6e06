//! Dependency synchronization
//!
//! Edges run both ways: a tensor lists the `operands` its pending assignment
//! reads, and every operand lists the tensor among its `dependents`. Reads
//! walk operands downward and evaluate whatever is stale; writes walk
//! dependents upward and re-arm their assembly and compute.

use std::collections::BTreeSet;

use super::Session;
use crate::error::Result;
use crate::tensor::{Tensor, TensorId};

impl Session {
    /// Bring `t` up to date for reading
    ///
    /// Synchronizes every operand first, packs staged insertions, then
    /// evaluates the pending assignment if any stage is outstanding.
    pub fn sync_values(&mut self, t: Tensor) -> Result<()> {
        self.sync_operands(t)?;
        self.pack(t)?;
        let identity = self.identity(t)?;
        if identity.assignment.is_some() && identity.flags.is_stale() {
            log::debug!("synchronizing '{}'", identity.name());
            self.evaluate(t)?;
        }
        Ok(())
    }

    /// Prepare `t` for a direct insertion
    ///
    /// A pending assignment is materialized and then detached, so the
    /// insertion accumulates onto the computed values instead of being lost
    /// to a later evaluation.
    pub fn sync_dependent_tensors(&mut self, t: Tensor) -> Result<()> {
        if self.identity(t)?.assignment.is_none() {
            return Ok(());
        }
        self.sync_values(t)?;
        self.detach_assignment(t)?;
        let identity = self.identity_mut(t)?;
        identity.assignment = None;
        identity.kernel = None;
        identity.module = None;
        identity.flags.needs_compile = false;
        identity.flags.needs_assemble = false;
        identity.flags.needs_compute = false;
        log::debug!("detached the assignment of '{}' before insertion", identity.name());
        Ok(())
    }

    pub(super) fn sync_operands(&mut self, t: Tensor) -> Result<()> {
        let operands = self.identity(t)?.operands.clone();
        for operand in operands {
            self.sync_values(Tensor::from_id(operand))?;
        }
        Ok(())
    }

    /// Re-arm assembly and compute on everything that transitively reads `id`
    pub(super) fn mark_dependents_stale(&mut self, id: TensorId) -> Result<()> {
        let mut stack: Vec<TensorId> = self.arena.get(id)?.dependents.iter().copied().collect();
        let mut seen = BTreeSet::new();
        while let Some(dependent) = stack.pop() {
            if !seen.insert(dependent) {
                continue;
            }
            let identity = self.arena.get_mut(dependent)?;
            identity.flags.needs_assemble = true;
            identity.flags.needs_compute = true;
            stack.extend(identity.dependents.iter().copied());
        }
        Ok(())
    }

    /// Remove the operand edges of `t`'s pending assignment
    pub(super) fn detach_assignment(&mut self, t: Tensor) -> Result<()> {
        let operands = std::mem::take(&mut self.identity_mut(t)?.operands);
        for operand in operands {
            if let Ok(identity) = self.arena.get_mut(operand) {
                identity.dependents.remove(&t.id());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::codegen::{ModuleCache, NativeBackend};
    use crate::expr::IndexVar;
    use crate::format::Format;
    use crate::session::{Session, SessionConfig};

    fn session() -> Session {
        Session::with_cache(
            SessionConfig::default(),
            Arc::new(ModuleCache::new(Arc::new(NativeBackend::new()))),
        )
    }

    #[test]
    fn test_read_evaluates_chain() {
        let mut s = session();
        let a = s.tensor::<f64>("a", &[3], Format::sparse(1)).unwrap();
        let b = s.tensor::<f64>("b", &[3], Format::sparse(1)).unwrap();
        let c = s.tensor::<f64>("c", &[3], Format::sparse(1)).unwrap();
        let i = IndexVar::new("i");
        s.insert(a, &[1], 2.0).unwrap();
        s.set_assignment(b, &[&i], a.access([&i]) * 3.0).unwrap();
        s.set_assignment(c, &[&i], b.access([&i]) + a.access([&i])).unwrap();

        assert_eq!(s.at::<f64>(c, &[1]).unwrap(), 8.0);
        assert!(!s.flags(a).unwrap().is_stale());
        assert!(!s.flags(b).unwrap().is_stale());
        assert!(!s.flags(c).unwrap().is_stale());
    }

    #[test]
    fn test_insert_restales_transitive_dependents() {
        let mut s = session();
        let a = s.tensor::<f64>("a", &[3], Format::sparse(1)).unwrap();
        let b = s.tensor::<f64>("b", &[3], Format::sparse(1)).unwrap();
        let c = s.tensor::<f64>("c", &[3], Format::sparse(1)).unwrap();
        let i = IndexVar::new("i");
        s.insert(a, &[0], 1.0).unwrap();
        s.set_assignment(b, &[&i], a.access([&i])).unwrap();
        s.set_assignment(c, &[&i], b.access([&i])).unwrap();
        s.evaluate(c).unwrap();
        assert!(!s.needs_compute(c).unwrap());

        s.insert(a, &[2], 5.0).unwrap();
        let flags = s.flags(c).unwrap();
        assert!(flags.needs_assemble && flags.needs_compute && !flags.needs_compile);
        assert_eq!(s.at::<f64>(c, &[2]).unwrap(), 5.0);
    }

    #[test]
    fn test_insert_into_result_accumulates() {
        let mut s = session();
        let a = s.tensor::<f64>("a", &[2], Format::sparse(1)).unwrap();
        let b = s.tensor::<f64>("b", &[2], Format::sparse(1)).unwrap();
        let i = IndexVar::new("i");
        s.insert(a, &[0], 1.0).unwrap();
        s.set_assignment(b, &[&i], a.access([&i]) * 10.0).unwrap();

        s.insert(b, &[0], 1.0).unwrap();
        assert!(s.assignment(b).unwrap().is_none());
        assert!(s.dependents(a).unwrap().is_empty());
        assert_eq!(s.at::<f64>(b, &[0]).unwrap(), 11.0);
    }
}

//! The record behind every tensor handle

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::TensorId;
use super::staging::{CoordinateBuffer, StagingBuffer};
use crate::codegen::{CompiledModule, Kernel};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::expr::Assignment;
use crate::format::Format;
use crate::storage::TensorStorage;

/// Stages that still have to run before the tensor's storage is current
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagingFlags {
    /// Staged insertions are waiting to be packed
    pub needs_pack: bool,
    /// The pending assignment has no compiled module yet
    pub needs_compile: bool,
    /// The result structure is out of date
    pub needs_assemble: bool,
    /// The result values are out of date
    pub needs_compute: bool,
}

impl StagingFlags {
    /// A tensor is stale when reading it would first have to pack or evaluate
    pub fn is_stale(&self) -> bool {
        self.needs_pack || self.needs_compile || self.needs_compute
    }
}

/// Everything a session knows about one tensor
#[derive(Debug)]
pub(crate) struct TensorIdentity {
    pub(crate) name: RefCell<String>,
    pub(crate) dtype: DType,
    pub(crate) dims: Vec<usize>,
    pub(crate) format: Format,
    pub(crate) storage: TensorStorage,
    pub(crate) staging: Option<Box<dyn StagingBuffer>>,
    pub(crate) assignment: Option<Assignment>,
    pub(crate) kernel: Option<Kernel>,
    pub(crate) module: Option<Arc<dyn CompiledModule>>,
    pub(crate) flags: StagingFlags,
    pub(crate) alloc_size: usize,
    pub(crate) assemble_while_compute: bool,
    /// Tensors whose pending assignment reads this one
    pub(crate) dependents: BTreeSet<TensorId>,
    /// Tensors this one's pending assignment reads
    pub(crate) operands: Vec<TensorId>,
}

impl TensorIdentity {
    pub(crate) fn new(
        name: String,
        dtype: DType,
        dims: Vec<usize>,
        format: Format,
        alloc_size: usize,
        assemble_while_compute: bool,
    ) -> Self {
        let storage = TensorStorage::empty(&dims, dtype, &format);
        Self {
            name: RefCell::new(name),
            dtype,
            dims,
            format,
            storage,
            staging: None,
            assignment: None,
            kernel: None,
            module: None,
            flags: StagingFlags::default(),
            alloc_size,
            assemble_while_compute,
            dependents: BTreeSet::new(),
            operands: Vec::new(),
        }
    }

    pub(crate) fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub(crate) fn order(&self) -> usize {
        self.dims.len()
    }

    /// Check a coordinate against order and extents
    pub(crate) fn check_coordinate(&self, coordinate: &[i32]) -> Result<()> {
        if coordinate.len() != self.order() {
            return Err(Error::arity_mismatch(&self.name(), self.order(), coordinate.len()));
        }
        for (mode, (&c, &size)) in coordinate.iter().zip(&self.dims).enumerate() {
            if c < 0 || c as usize >= size {
                return Err(Error::IndexOutOfBounds {
                    tensor: self.name(),
                    mode,
                    index: c as i64,
                    size,
                });
            }
        }
        Ok(())
    }

    /// Check that `T` is the component type
    pub(crate) fn check_dtype<T: Element>(&self) -> Result<()> {
        if T::DTYPE != self.dtype {
            return Err(Error::dtype_mismatch(&self.name(), self.dtype, T::DTYPE));
        }
        Ok(())
    }

    /// Append a staged record
    pub(crate) fn stage<T: Element>(&mut self, coordinate: &[i32], value: T) -> Result<()> {
        let order = self.order();
        let alloc_size = self.alloc_size;
        let staging = self
            .staging
            .get_or_insert_with(|| {
                Box::new(CoordinateBuffer::<T>::new(order, alloc_size)) as Box<dyn StagingBuffer>
            });
        let buffer = staging
            .as_any_mut()
            .downcast_mut::<CoordinateBuffer<T>>()
            .ok_or_else(|| Error::Internal("staging buffer has the wrong component type".into()))?;
        buffer.push(coordinate, value);
        self.flags.needs_pack = true;
        Ok(())
    }

    /// Number of staged, unpacked records
    pub(crate) fn staged(&self) -> usize {
        self.staging.as_ref().map_or(0, |s| s.len())
    }

    /// Grow the staging buffer for `additional` records
    pub(crate) fn reserve(&mut self, additional: usize) -> Result<()> {
        if self.staging.is_none() {
            let order = self.order();
            let alloc_size = self.alloc_size;
            let buffer: Box<dyn StagingBuffer> = crate::dispatch_dtype!(self.dtype, T => {
                Box::new(CoordinateBuffer::<T>::new(order, alloc_size)) as Box<dyn StagingBuffer>
            }, "reserve");
            self.staging = Some(buffer);
        }
        if let Some(staging) = self.staging.as_mut() {
            staging.reserve(additional);
        }
        Ok(())
    }

    /// Drop staged records without packing them
    pub(crate) fn discard_staged(&mut self) {
        if let Some(staging) = self.staging.as_mut() {
            staging.clear();
        }
        self.flags.needs_pack = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(dtype: DType) -> TensorIdentity {
        TensorIdentity::new("A".into(), dtype, vec![2, 3], Format::sparse(2), 1 << 10, false)
    }

    #[test]
    fn test_fresh_identity_is_clean() {
        let id = identity(DType::F64);
        assert_eq!(id.flags, StagingFlags::default());
        assert!(!id.flags.is_stale());
        assert_eq!(id.staged(), 0);
    }

    #[test]
    fn test_stage_arms_pack() {
        let mut id = identity(DType::F64);
        id.stage(&[1, 2], 3.0f64).unwrap();
        assert!(id.flags.needs_pack);
        assert_eq!(id.staged(), 1);
        id.discard_staged();
        assert_eq!(id.staged(), 0);
        assert!(!id.flags.needs_pack);
    }

    #[test]
    fn test_coordinate_checks() {
        let id = identity(DType::I32);
        assert!(id.check_coordinate(&[1, 2]).is_ok());
        assert!(matches!(id.check_coordinate(&[1]), Err(Error::ArityMismatch { .. })));
        assert!(matches!(
            id.check_coordinate(&[2, 0]),
            Err(Error::IndexOutOfBounds { mode: 0, index: 2, .. })
        ));
        assert!(id.check_dtype::<i32>().is_ok());
        assert!(matches!(id.check_dtype::<f64>(), Err(Error::DTypeMismatch { .. })));
    }

    #[test]
    fn test_reserve_before_insert() {
        let mut id = identity(DType::U8);
        id.reserve(500).unwrap();
        id.stage(&[0, 0], 1u8).unwrap();
        assert!(id.staging.as_ref().unwrap().capacity() >= 500);
    }
}

//! Coordinate staging buffers
//!
//! Insertions are appended here as typed records and stay unordered, possibly
//! with duplicate coordinates, until the next pack drains them.

use std::any::Any;
use std::fmt;

use crate::dtype::Element;
use crate::error::Result;
use crate::format::Format;
use crate::storage::TensorStorage;
use crate::storage::pack::pack_records;

/// Bytes per staged coordinate component
const COORDINATE_BYTES: usize = std::mem::size_of::<i32>();

/// Type-erased staging buffer owned by a tensor identity
pub(crate) trait StagingBuffer: fmt::Debug {
    /// Number of staged records
    fn len(&self) -> usize;

    /// Records that fit before the next reallocation
    fn capacity(&self) -> usize;

    /// Grow capacity for `additional` records without touching content
    fn reserve(&mut self, additional: usize);

    /// Drop every staged record
    fn clear(&mut self);

    /// Drain the staged records into storage merged with `existing`
    fn pack(
        &mut self,
        dims: &[usize],
        format: &Format,
        existing: &TensorStorage,
    ) -> Result<TensorStorage>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Staged `(coordinate, value)` records of one tensor
pub(crate) struct CoordinateBuffer<T: Element> {
    order: usize,
    alloc_size: usize,
    coords: Vec<i32>,
    values: Vec<T>,
}

impl<T: Element> CoordinateBuffer<T> {
    /// Empty buffer; nothing is allocated before the first record
    pub(crate) fn new(order: usize, alloc_size: usize) -> Self {
        Self {
            order,
            alloc_size,
            coords: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Width of one record in bytes
    #[inline]
    pub(crate) fn stride(&self) -> usize {
        self.order * COORDINATE_BYTES + std::mem::size_of::<T>()
    }

    /// Append one record
    pub(crate) fn push(&mut self, coordinate: &[i32], value: T) {
        debug_assert_eq!(coordinate.len(), self.order);
        if self.values.capacity() == 0 {
            let records = (self.alloc_size / self.stride()).max(1);
            self.reserve(records);
        }
        self.coords.extend_from_slice(coordinate);
        self.values.push(value);
    }
}

impl<T: Element> StagingBuffer for CoordinateBuffer<T> {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn capacity(&self) -> usize {
        self.values.capacity()
    }

    fn reserve(&mut self, additional: usize) {
        self.coords.reserve(additional * self.order);
        self.values.reserve(additional);
    }

    fn clear(&mut self) {
        self.coords.clear();
        self.values.clear();
    }

    fn pack(
        &mut self,
        dims: &[usize],
        format: &Format,
        existing: &TensorStorage,
    ) -> Result<TensorStorage> {
        let storage = pack_records(dims, format, Some(existing), &self.coords, &self.values)?;
        self.clear();
        Ok(storage)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T: Element> fmt::Debug for CoordinateBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinateBuffer")
            .field("dtype", &T::DTYPE)
            .field("order", &self.order)
            .field("records", &self.values.len())
            .finish()
    }
}

//! Typed storage handles
//!
//! [`TensorStorage`] owns the index arrays and value array of one tensor in
//! its [`Format`]. It is what compiled modules read and write; the staging
//! core only creates it (by packing) and forwards it.
//!
//! # Layout
//!
//! Storage is a tree of levels, one per mode in format order. Level `k` turns
//! each position of level `k-1` (the root has one position) into a range of
//! its own positions:
//!
//! - **Dense** level of size `N`: parent `p` owns positions `p*N .. p*N + N`,
//!   the coordinate is the offset within that range.
//! - **Compressed** level: parent `p` owns positions `pos[p] .. pos[p+1]`,
//!   the coordinate at position `q` is `crd[q]` (sorted within a segment).
//!
//! Positions of the last level index the value array.

mod array;
pub(crate) mod pack;
mod raw;

pub use array::Array;
pub use raw::{RawStorage, RawStorageHandle};

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::format::{Format, ModeFormat};

/// Index of one storage level
#[derive(Debug, Clone)]
pub enum ModeIndex {
    /// Dense level: every coordinate below `size` is stored
    Dense {
        /// Extent of the mode
        size: usize,
    },
    /// Compressed level: segment bounds and stored coordinates (both `I32`)
    Compressed {
        /// Segment bounds, one more entry than parent positions
        pos: Array,
        /// Stored coordinates
        crd: Array,
    },
}

impl ModeIndex {
    /// Mode format of this level
    pub fn mode_format(&self) -> ModeFormat {
        match self {
            ModeIndex::Dense { .. } => ModeFormat::Dense,
            ModeIndex::Compressed { .. } => ModeFormat::Compressed,
        }
    }

    /// Position range owned by parent position `parent`
    #[inline]
    pub(crate) fn segment(&self, parent: usize) -> std::ops::Range<usize> {
        match self {
            ModeIndex::Dense { size } => parent * size..(parent + 1) * size,
            ModeIndex::Compressed { pos, .. } => {
                let pos = i32_view(pos);
                pos[parent] as usize..pos[parent + 1] as usize
            }
        }
    }

    /// Coordinate stored at position `q` of the segment starting at `start`
    #[inline]
    pub(crate) fn coordinate(&self, start: usize, q: usize) -> i32 {
        match self {
            ModeIndex::Dense { .. } => (q - start) as i32,
            ModeIndex::Compressed { crd, .. } => i32_view(crd)[q],
        }
    }
}

fn i32_view(array: &Array) -> &[i32] {
    // Index arrays are built as I32 by every constructor in this module.
    array.as_slice::<i32>().unwrap_or(&[])
}

/// Index arrays and values of one tensor
#[derive(Debug, Clone)]
pub struct TensorStorage {
    dims: Vec<usize>,
    dtype: DType,
    format: Format,
    index: Vec<ModeIndex>,
    values: Array,
}

impl TensorStorage {
    /// Storage holding no components
    ///
    /// Dense levels still materialize their positions, so an all-dense
    /// tensor starts out as explicit zeros.
    pub fn empty(dims: &[usize], dtype: DType, format: &Format) -> Self {
        let level_dims = format.level_dims(dims);
        let mut positions = 1usize;
        let mut index = Vec::with_capacity(level_dims.len());
        for (mode, &size) in format.modes().iter().zip(&level_dims) {
            match mode {
                ModeFormat::Dense => {
                    index.push(ModeIndex::Dense { size });
                    positions *= size;
                }
                ModeFormat::Compressed => {
                    index.push(ModeIndex::Compressed {
                        pos: Array::zeros(DType::I32, positions + 1),
                        crd: Array::zeros(DType::I32, 0),
                    });
                    positions = 0;
                }
            }
        }
        Self {
            dims: dims.to_vec(),
            dtype,
            format: format.clone(),
            index,
            values: Array::zeros(dtype, positions),
        }
    }

    /// Assemble storage from prebuilt levels
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the levels do not describe `values.len()`
    /// positions or disagree with `dims`, and `DTypeMismatch` for non-`I32`
    /// index arrays.
    pub fn from_parts(
        name: &str,
        dims: &[usize],
        format: &Format,
        index: Vec<ModeIndex>,
        values: Array,
    ) -> Result<Self> {
        if index.len() != format.order() || dims.len() != format.order() {
            return Err(Error::shape_mismatch(
                name,
                &[format.order()],
                &[index.len()],
            ));
        }
        let level_dims = format.level_dims(dims);
        let mut positions = 1usize;
        for (k, (level, mode)) in index.iter().zip(format.modes()).enumerate() {
            if level.mode_format() != *mode {
                return Err(Error::format_mismatch(name, format, "mismatched level index"));
            }
            match level {
                ModeIndex::Dense { size } => {
                    if *size != level_dims[k] {
                        return Err(Error::shape_mismatch(name, &[level_dims[k]], &[*size]));
                    }
                    positions *= size;
                }
                ModeIndex::Compressed { pos, crd } => {
                    for array in [pos, crd] {
                        if array.dtype() != DType::I32 {
                            return Err(Error::dtype_mismatch(name, DType::I32, array.dtype()));
                        }
                    }
                    if pos.len() != positions + 1 {
                        return Err(Error::shape_mismatch(name, &[positions + 1], &[pos.len()]));
                    }
                    let pos = i32_view(pos);
                    let crd = i32_view(crd);
                    if pos[0] != 0 || pos.windows(2).any(|w| w[0] > w[1]) {
                        return Err(Error::invalid_argument(
                            "pos",
                            format!("level {k} segment bounds are not monotone from 0"),
                        ));
                    }
                    let total = pos[positions] as usize;
                    if crd.len() != total {
                        return Err(Error::shape_mismatch(name, &[total], &[crd.len()]));
                    }
                    for p in 0..positions {
                        let segment = &crd[pos[p] as usize..pos[p + 1] as usize];
                        if let Some(&bad) = segment
                            .iter()
                            .find(|&&c| c < 0 || c as usize >= level_dims[k])
                        {
                            return Err(Error::IndexOutOfBounds {
                                tensor: name.to_string(),
                                mode: format.ordering()[k],
                                index: bad as i64,
                                size: level_dims[k],
                            });
                        }
                        if segment.windows(2).any(|w| w[0] >= w[1]) {
                            return Err(Error::invalid_argument(
                                "crd",
                                format!("level {k} coordinates are not strictly increasing"),
                            ));
                        }
                    }
                    positions = total;
                }
            }
        }
        if values.len() != positions {
            return Err(Error::shape_mismatch(name, &[positions], &[values.len()]));
        }
        Ok(Self {
            dims: dims.to_vec(),
            dtype: values.dtype(),
            format: format.clone(),
            index,
            values,
        })
    }

    /// Extent of each mode
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of modes
    #[inline]
    pub fn order(&self) -> usize {
        self.dims.len()
    }

    /// Component type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Storage format
    #[inline]
    pub fn format(&self) -> &Format {
        &self.format
    }

    /// Level indices in format order
    #[inline]
    pub fn index(&self) -> &[ModeIndex] {
        &self.index
    }

    /// Value array
    #[inline]
    pub fn values(&self) -> &Array {
        &self.values
    }

    /// Mutable value array
    #[inline]
    pub fn values_mut(&mut self) -> &mut Array {
        &mut self.values
    }

    /// Number of stored components (explicit zeros included)
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Value position of a coordinate, if it is stored
    pub fn locate(&self, coordinate: &[i32]) -> Option<usize> {
        let mut parent = 0usize;
        for (k, level) in self.index.iter().enumerate() {
            let c = coordinate[self.format.ordering()[k]];
            match level {
                ModeIndex::Dense { size } => {
                    if c < 0 || c as usize >= *size {
                        return None;
                    }
                    parent = parent * size + c as usize;
                }
                ModeIndex::Compressed { crd, .. } => {
                    let segment = level.segment(parent);
                    let start = segment.start;
                    let found = i32_view(crd)[segment].binary_search(&c).ok()?;
                    parent = start + found;
                }
            }
        }
        Some(parent)
    }

    /// Visit every stored position with its coordinate in tensor mode order
    pub fn for_each_position(&self, mut f: impl FnMut(&[i32], usize)) {
        let mut coordinate = vec![0i32; self.order()];
        if self.index.is_empty() {
            if !self.values.is_empty() {
                f(&coordinate, 0);
            }
            return;
        }
        self.walk(0, 0, &mut coordinate, &mut f);
    }

    fn walk(
        &self,
        level: usize,
        parent: usize,
        coordinate: &mut [i32],
        f: &mut dyn FnMut(&[i32], usize),
    ) {
        let mode = self.format.ordering()[level];
        let index = &self.index[level];
        let segment = index.segment(parent);
        let start = segment.start;
        for q in segment {
            coordinate[mode] = index.coordinate(start, q);
            if level + 1 == self.index.len() {
                f(coordinate, q);
            } else {
                self.walk(level + 1, q, coordinate, f);
            }
        }
    }

    /// Stored components as (coordinate, value) pairs in storage order
    pub fn entries<T: Element>(&self) -> Result<Vec<(Vec<i32>, T)>> {
        let values = self.values.as_slice::<T>()?;
        let mut entries = Vec::with_capacity(values.len());
        self.for_each_position(|coordinate, q| entries.push((coordinate.to_vec(), values[q])));
        Ok(entries)
    }

    /// Approximate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        let index: usize = self
            .index
            .iter()
            .map(|level| match level {
                ModeIndex::Dense { .. } => 0,
                ModeIndex::Compressed { pos, crd } => (pos.len() + crd.len()) * 4,
            })
            .sum();
        index + self.values.len() * self.dtype.size_in_bytes()
    }
}

//! Stable-layout storage handle passed to generated code
//!
//! [`RawStorage`] is the `#[repr(C)]` view of a [`TensorStorage`]. Every
//! generated entry point receives a pointer to one; the staging core only
//! forwards that pointer.
//!
//! # Layout
//!
//! ```text
//! order          i32             number of modes
//! dimensions     *const i32      extent per tensor mode
//! csize          i32             bytes per component
//! mode_ordering  *const i32      tensor mode stored at each level
//! mode_types     *const i32      ModeFormat tag per level
//! indices        *const *const *const u8
//!                                per level: dense      -> [&size, null]
//!                                           compressed -> [pos, crd]
//! vals           *mut u8         component array
//! vals_size      i32             number of components
//! dtype          i32             DType tag
//! ```

use std::marker::PhantomData;
use std::ptr;

use super::{ModeIndex, TensorStorage};

/// C layout of a tensor's storage
#[repr(C)]
#[derive(Debug)]
pub struct RawStorage {
    /// Number of modes
    pub order: i32,
    /// Extent of every tensor mode
    pub dimensions: *const i32,
    /// Size of one component in bytes
    pub csize: i32,
    /// Tensor mode stored at each level
    pub mode_ordering: *const i32,
    /// `ModeFormat` tag of each level
    pub mode_types: *const i32,
    /// Per-level index array pointers
    pub indices: *const *const *const u8,
    /// Component array
    pub vals: *mut u8,
    /// Number of components
    pub vals_size: i32,
    /// `DType` tag of the components
    pub dtype: i32,
}

impl RawStorage {
    /// Mode format tag of level `level`
    ///
    /// # Safety
    /// `self` must come from a live [`RawStorageHandle`] and `level < order`.
    #[inline]
    pub unsafe fn mode_type(&self, level: usize) -> i32 {
        unsafe { *self.mode_types.add(level) }
    }

    /// Tensor mode stored at level `level`
    ///
    /// # Safety
    /// Same as [`RawStorage::mode_type`].
    #[inline]
    pub unsafe fn mode_of_level(&self, level: usize) -> usize {
        unsafe { *self.mode_ordering.add(level) as usize }
    }

    /// First index array of a level (`&size` for dense, `pos` for compressed)
    ///
    /// # Safety
    /// Same as [`RawStorage::mode_type`].
    #[inline]
    pub unsafe fn index0(&self, level: usize) -> *const i32 {
        unsafe { (*(*self.indices.add(level))).cast() }
    }

    /// Second index array of a level (`crd` for compressed, null for dense)
    ///
    /// # Safety
    /// Same as [`RawStorage::mode_type`].
    #[inline]
    pub unsafe fn index1(&self, level: usize) -> *const i32 {
        unsafe { (*(*self.indices.add(level)).add(1)).cast() }
    }
}

/// Owner of a [`RawStorage`] and the pointer tables it refers to
///
/// The handle borrows the storage it describes, so the storage cannot be
/// repacked while generated code may still read it.
pub struct RawStorageHandle<'a> {
    raw: Box<RawStorage>,
    _dims: Vec<i32>,
    _ordering: Vec<i32>,
    _mode_types: Vec<i32>,
    _sizes: Vec<i32>,
    _level_tables: Vec<[*const u8; 2]>,
    _levels: Vec<*const *const u8>,
    _storage: PhantomData<&'a TensorStorage>,
}

impl<'a> RawStorageHandle<'a> {
    /// Build the C view of `storage`
    pub fn new(storage: &'a TensorStorage) -> Self {
        let dims: Vec<i32> = storage.dims().iter().map(|&d| d as i32).collect();
        let ordering: Vec<i32> = storage.format().ordering().iter().map(|&m| m as i32).collect();
        let mode_types: Vec<i32> = storage.format().modes().iter().map(|m| m.tag()).collect();
        let sizes: Vec<i32> = storage
            .index()
            .iter()
            .map(|level| match level {
                ModeIndex::Dense { size } => *size as i32,
                ModeIndex::Compressed { .. } => 0,
            })
            .collect();

        let level_tables: Vec<[*const u8; 2]> = storage
            .index()
            .iter()
            .zip(&sizes)
            .map(|(level, size)| match level {
                ModeIndex::Dense { .. } => [ptr::from_ref(size).cast::<u8>(), ptr::null()],
                ModeIndex::Compressed { pos, crd } => [pos.as_ptr(), crd.as_ptr()],
            })
            .collect();
        let levels: Vec<*const *const u8> = level_tables.iter().map(|t| t.as_ptr()).collect();

        let raw = Box::new(RawStorage {
            order: dims.len() as i32,
            dimensions: dims.as_ptr(),
            csize: storage.dtype().size_in_bytes() as i32,
            mode_ordering: ordering.as_ptr(),
            mode_types: mode_types.as_ptr(),
            indices: levels.as_ptr(),
            vals: storage.values().as_ptr().cast_mut(),
            vals_size: storage.nnz() as i32,
            dtype: storage.dtype().tag(),
        });

        Self {
            raw,
            _dims: dims,
            _ordering: ordering,
            _mode_types: mode_types,
            _sizes: sizes,
            _level_tables: level_tables,
            _levels: levels,
            _storage: PhantomData,
        }
    }

    /// Pointer handed to generated entry points
    #[inline]
    pub fn as_ptr(&self) -> *const RawStorage {
        &*self.raw
    }

    /// The C view itself
    #[inline]
    pub fn raw(&self) -> &RawStorage {
        &self.raw
    }
}

impl std::fmt::Debug for RawStorageHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawStorageHandle")
            .field("order", &self.raw.order)
            .field("vals_size", &self.raw.vals_size)
            .field("dtype", &self.raw.dtype)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Format, ModeFormat};
    use crate::storage::pack::build_storage;

    #[test]
    fn test_raw_layout_of_csr() {
        let storage = build_storage(&[2, 3], &Format::csr(), &[0, 2, 1, 0], &[1.0f64, 2.0]);
        let handle = RawStorageHandle::new(&storage);
        let raw = handle.raw();
        assert_eq!(raw.order, 2);
        assert_eq!(raw.csize, 8);
        assert_eq!(raw.vals_size, 2);
        unsafe {
            assert_eq!(*raw.dimensions.add(1), 3);
            assert_eq!(raw.mode_type(0), ModeFormat::Dense.tag());
            assert_eq!(raw.mode_type(1), ModeFormat::Compressed.tag());
            assert_eq!(*raw.index0(0), 2);
            assert!(raw.index1(0).is_null());
            let pos = std::slice::from_raw_parts(raw.index0(1), 3);
            assert_eq!(pos, &[0, 1, 2]);
            assert_eq!(*raw.index1(1).add(1), 0);
        }
    }

    #[test]
    fn test_raw_ordering_of_csc() {
        let storage = build_storage(&[2, 3], &Format::csc(), &[], &[] as &[f32]);
        let handle = RawStorageHandle::new(&storage);
        unsafe {
            assert_eq!(handle.raw().mode_of_level(0), 1);
            assert_eq!(handle.raw().mode_of_level(1), 0);
        }
    }
}

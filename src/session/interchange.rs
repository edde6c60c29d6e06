//! Bulk CSR/CSC interchange
//!
//! Matrices in the two classic compressed layouts can be built directly from
//! their three arrays, and read back as borrowed slices without copying.
//! The `_from_raw_parts` constructors adopt caller memory in place; it is
//! never freed by the session.

use super::Session;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::storage::{Array, ModeIndex, TensorStorage};
use crate::tensor::Tensor;

/// Borrowed arrays of a CSR or CSC matrix
///
/// For CSR, `ptr` has one entry per row plus one and `idx` holds column
/// coordinates; CSC swaps the roles of rows and columns.
#[derive(Debug, Clone, Copy)]
pub struct CompressedArrays<'a, T> {
    /// Segment bounds
    pub ptr: &'a [i32],
    /// Coordinates of the compressed mode
    pub idx: &'a [i32],
    /// Stored values
    pub vals: &'a [T],
}

#[derive(Clone, Copy)]
enum Layout {
    Csr,
    Csc,
}

impl Layout {
    fn format(self) -> Format {
        match self {
            Layout::Csr => Format::csr(),
            Layout::Csc => Format::csc(),
        }
    }

    /// Extent of the dense outer level
    fn outer(self, dims: [usize; 2]) -> usize {
        match self {
            Layout::Csr => dims[0],
            Layout::Csc => dims[1],
        }
    }
}

impl Session {
    /// Build a CSR matrix from its arrays
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `rowptr` does not have `dims[0] + 1`
    /// entries or `colidx`/`vals` lengths disagree with `rowptr`, and
    /// `InvalidArgument`/`IndexOutOfBounds` for malformed indices.
    pub fn make_csr<T: Element>(
        &mut self,
        name: &str,
        dims: [usize; 2],
        rowptr: Vec<i32>,
        colidx: Vec<i32>,
        vals: Vec<T>,
    ) -> Result<Tensor> {
        let parts = (Array::from_vec(rowptr), Array::from_vec(colidx), Array::from_vec(vals));
        self.install(name, dims, Layout::Csr, parts)
    }

    /// Build a CSC matrix from its arrays
    pub fn make_csc<T: Element>(
        &mut self,
        name: &str,
        dims: [usize; 2],
        colptr: Vec<i32>,
        rowidx: Vec<i32>,
        vals: Vec<T>,
    ) -> Result<Tensor> {
        let parts = (Array::from_vec(colptr), Array::from_vec(rowidx), Array::from_vec(vals));
        self.install(name, dims, Layout::Csc, parts)
    }

    /// Build a CSR matrix over caller-owned arrays
    ///
    /// The number of stored components is read from `rowptr[dims[0]]`.
    ///
    /// # Safety
    ///
    /// - `rowptr` must point to `dims[0] + 1` initialized `i32`s
    /// - `colidx` and `vals` must point to `rowptr[dims[0]]` initialized
    ///   elements each
    /// - All three arrays must stay valid, and must not be accessed through
    ///   other aliases, until the tensor is released or its storage replaced
    /// - The caller frees the arrays
    pub unsafe fn make_csr_from_raw_parts<T: Element>(
        &mut self,
        name: &str,
        dims: [usize; 2],
        rowptr: *mut i32,
        colidx: *mut i32,
        vals: *mut T,
    ) -> Result<Tensor> {
        // SAFETY: forwarded from the caller.
        let parts = unsafe { adopt(name, Layout::Csr.outer(dims), rowptr, colidx, vals)? };
        self.install(name, dims, Layout::Csr, parts)
    }

    /// Build a CSC matrix over caller-owned arrays
    ///
    /// # Safety
    ///
    /// As [`make_csr_from_raw_parts`](Session::make_csr_from_raw_parts), with
    /// `colptr` holding `dims[1] + 1` entries.
    pub unsafe fn make_csc_from_raw_parts<T: Element>(
        &mut self,
        name: &str,
        dims: [usize; 2],
        colptr: *mut i32,
        rowidx: *mut i32,
        vals: *mut T,
    ) -> Result<Tensor> {
        // SAFETY: forwarded from the caller.
        let parts = unsafe { adopt(name, Layout::Csc.outer(dims), colptr, rowidx, vals)? };
        self.install(name, dims, Layout::Csc, parts)
    }

    /// Borrow the arrays of a CSR matrix, synchronizing it first
    ///
    /// # Errors
    ///
    /// `RequiresMatrix`, `DTypeMismatch` or `FormatMismatch` if `t` is not a
    /// CSR matrix of `T`.
    pub fn csr_arrays<T: Element>(&mut self, t: Tensor) -> Result<CompressedArrays<'_, T>> {
        self.compressed_arrays(t, Layout::Csr)
    }

    /// Borrow the arrays of a CSC matrix, synchronizing it first
    pub fn csc_arrays<T: Element>(&mut self, t: Tensor) -> Result<CompressedArrays<'_, T>> {
        self.compressed_arrays(t, Layout::Csc)
    }

    fn install(
        &mut self,
        name: &str,
        dims: [usize; 2],
        layout: Layout,
        (ptr, idx, vals): (Array, Array, Array),
    ) -> Result<Tensor> {
        let format = layout.format();
        let expected = layout.outer(dims) + 1;
        if ptr.len() != expected {
            return Err(Error::shape_mismatch(name, &[expected], &[ptr.len()]));
        }
        let dtype = vals.dtype();
        let index = vec![
            ModeIndex::Dense {
                size: layout.outer(dims),
            },
            ModeIndex::Compressed { pos: ptr, crd: idx },
        ];
        let storage = TensorStorage::from_parts(name, &dims, &format, index, vals)?;
        let t = self.tensor_with_dtype(name, dtype, &dims, format)?;
        self.identity_mut(t)?.storage = storage;
        log::debug!(
            "installed {} arrays as '{name}' ({} stored)",
            self.identity(t)?.format,
            self.identity(t)?.storage.nnz()
        );
        Ok(t)
    }

    fn compressed_arrays<T: Element>(
        &mut self,
        t: Tensor,
        layout: Layout,
    ) -> Result<CompressedArrays<'_, T>> {
        {
            let identity = self.identity(t)?;
            if identity.order() != 2 {
                return Err(Error::RequiresMatrix {
                    tensor: identity.name(),
                    order: identity.order(),
                });
            }
            identity.check_dtype::<T>()?;
            let format = layout.format();
            if identity.format != format {
                return Err(Error::format_mismatch(&identity.name(), format, &identity.format));
            }
        }
        self.sync_values(t)?;

        let storage = &self.identity(t)?.storage;
        let ModeIndex::Compressed { pos, crd } = &storage.index()[1] else {
            return Err(Error::Internal("compressed level missing from storage".into()));
        };
        Ok(CompressedArrays {
            ptr: pos.as_slice::<i32>()?,
            idx: crd.as_slice::<i32>()?,
            vals: storage.values().as_slice::<T>()?,
        })
    }
}

/// Wrap caller arrays, reading the stored count from the last segment bound
///
/// # Safety
///
/// `ptr` must point to `outer + 1` initialized `i32`s; `idx` and `vals` to
/// as many elements as the last of them.
unsafe fn adopt<T: Element>(
    name: &str,
    outer: usize,
    ptr: *mut i32,
    idx: *mut i32,
    vals: *mut T,
) -> Result<(Array, Array, Array)> {
    // SAFETY: caller guarantees `outer + 1` elements behind `ptr`.
    let ptr = unsafe { Array::from_raw_parts(ptr, outer + 1)? };
    let nnz = ptr.as_slice::<i32>()?[outer];
    if nnz < 0 {
        return Err(Error::invalid_argument(
            "ptr",
            format!("'{name}' has a negative component count {nnz}"),
        ));
    }
    let nnz = nnz as usize;
    // SAFETY: caller guarantees `nnz` elements behind `idx` and `vals`.
    let (idx, vals) = unsafe {
        (
            Array::from_raw_parts(idx, nnz)?,
            Array::from_raw_parts(vals, nnz)?,
        )
    };
    Ok((ptr, idx, vals))
}

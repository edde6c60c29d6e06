//! Code generation boundary
//!
//! Everything the staging core knows about generated code lives here:
//!
//! - [`IterateFn`]: the fixed iteration ABI every module exposes
//! - [`ctx`]: the iteration-context blob protocol shared by both sides
//! - [`CompiledModule`]: a compiled computation (iterate, assemble, compute)
//! - [`CodeGenerator`]: the injected backend that builds modules
//! - [`ModuleCache`]: memoizes modules per [`ModuleKey`]
//!
//! # Iteration ABI
//!
//! ```text
//! int32 entry(void* args[5])
//!   args[0]  void**          &iterCtx, null on the first call; the callee
//!                            allocates it with ctx::alloc
//!   args[1]  int32*          coordinate buffer, capacity * order entries
//!   args[2]  T*              value buffer, capacity entries
//!   args[3]  const int32*    &capacity
//!   args[4]  RawStorage*     storage handle
//! returns the number of records written; 0 ends the iteration
//! ```

mod cache;
mod kernel;
pub mod native;

pub use cache::{CacheStats, ModuleCache};
pub use kernel::{Kernel, KernelExpr, OperandSlot};
pub use native::NativeBackend;

use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use crate::dtype::DType;
use crate::error::Result;
use crate::format::Format;
use crate::storage::TensorStorage;

/// Generated iteration entry point
pub type IterateFn = unsafe extern "C" fn(args: *mut *mut c_void) -> i32;

/// Number of parameters passed to an [`IterateFn`]
pub const ITERATE_ARGS: usize = 5;

/// Iteration-context blobs
///
/// A blob is 8-byte aligned and its first machine word holds its total size
/// in bytes, header included. That word is all a caller needs to duplicate or
/// free a blob it did not allocate.
pub mod ctx {
    use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
    use std::ffi::c_void;

    const ALIGN: usize = 8;

    /// Bytes taken by the size header
    pub const HEADER: usize = std::mem::size_of::<usize>();

    fn layout(size: usize) -> Layout {
        match Layout::from_size_align(size.max(HEADER), ALIGN) {
            Ok(layout) => layout,
            Err(_) => handle_alloc_error(Layout::new::<usize>()),
        }
    }

    /// Allocate a zeroed blob of `size` bytes and record the size
    pub fn alloc(size: usize) -> *mut c_void {
        let layout = layout(size);
        // SAFETY: layout has non-zero size.
        let blob = unsafe { alloc_zeroed(layout) };
        if blob.is_null() {
            handle_alloc_error(layout);
        }
        // SAFETY: blob is aligned for usize and at least HEADER bytes long.
        unsafe { blob.cast::<usize>().write(layout.size()) };
        blob.cast()
    }

    /// Size word of a blob
    ///
    /// # Safety
    /// `blob` must be a live blob from [`alloc`] or [`duplicate`].
    pub unsafe fn size(blob: *const c_void) -> usize {
        unsafe { blob.cast::<usize>().read() }
    }

    /// Byte-for-byte copy of a blob; null stays null
    ///
    /// # Safety
    /// `blob` must be null or a live blob from [`alloc`] or [`duplicate`].
    pub unsafe fn duplicate(blob: *const c_void) -> *mut c_void {
        if blob.is_null() {
            return std::ptr::null_mut();
        }
        unsafe {
            let size = size(blob);
            let copy = alloc(size);
            std::ptr::copy_nonoverlapping(blob.cast::<u8>(), copy.cast::<u8>(), size);
            copy
        }
    }

    /// Release a blob; null is ignored
    ///
    /// # Safety
    /// `blob` must be null or a live blob from [`alloc`] or [`duplicate`]
    /// that is not used afterwards.
    pub unsafe fn free(blob: *mut c_void) {
        if blob.is_null() {
            return;
        }
        unsafe {
            let size = size(blob);
            dealloc(blob.cast(), layout(size));
        }
    }
}

/// Cache key of a compiled module
///
/// Iteration modules are keyed by the tensor's format, component type and
/// exact shape. Kernel modules additionally carry the canonical signature of
/// the lowered assignment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    /// Format of the tensor the module produces or walks
    pub format: Format,
    /// Component type
    pub dtype: DType,
    /// Exact extents
    pub shape: Vec<usize>,
    /// Signature of the computation, `None` for iteration-only modules
    pub kernel: Option<String>,
}

impl ModuleKey {
    /// Key of an iteration-only module
    pub fn iteration(format: &Format, dtype: DType, shape: &[usize]) -> Self {
        Self {
            format: format.clone(),
            dtype,
            shape: shape.to_vec(),
            kernel: None,
        }
    }

    /// Key of a module computing `kernel`
    pub fn for_kernel(kernel: &Kernel) -> Self {
        Self {
            format: kernel.result_format().clone(),
            dtype: kernel.dtype(),
            shape: kernel.result_dims().to_vec(),
            kernel: Some(kernel.signature()),
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}", self.format, self.dtype, self.shape)?;
        if let Some(kernel) = &self.kernel {
            write!(f, " [{kernel}]")?;
        }
        Ok(())
    }
}

/// A compiled computation
///
/// Every module walks tensors of its key's format through
/// [`iterate_entry`](CompiledModule::iterate_entry). Modules built for an
/// assignment also assemble and compute its result.
pub trait CompiledModule: Send + Sync + fmt::Debug {
    /// Key the module was built for
    fn key(&self) -> &ModuleKey;

    /// Human-readable source of the generated code
    fn source(&self) -> &str;

    /// Generic iteration entry point
    fn iterate_entry(&self) -> IterateFn;

    /// Build the index structure of `output` from `operands`
    ///
    /// Values of the assembled structure are unspecified until
    /// [`compute`](CompiledModule::compute) runs.
    fn assemble(&self, output: &mut TensorStorage, operands: &[&TensorStorage]) -> Result<()>;

    /// Fill the values of an assembled `output`
    fn compute(&self, output: &mut TensorStorage, operands: &[&TensorStorage]) -> Result<()>;

    /// Assemble and compute in one call
    fn assemble_and_compute(
        &self,
        output: &mut TensorStorage,
        operands: &[&TensorStorage],
    ) -> Result<()> {
        self.assemble(output, operands)?;
        self.compute(output, operands)
    }
}

/// What a backend is asked to build
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    /// Cache key of the module
    pub key: &'a ModuleKey,
    /// Lowered assignment, `None` for iteration-only modules
    pub kernel: Option<&'a Kernel>,
}

/// Backend turning build requests into compiled modules
pub trait CodeGenerator: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Build one module
    ///
    /// # Errors
    ///
    /// Returns `Codegen` if the backend cannot produce code for the request.
    fn build(&self, request: &BuildRequest<'_>) -> Result<Arc<dyn CompiledModule>>;
}

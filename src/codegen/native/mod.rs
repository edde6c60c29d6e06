//! Built-in reference backend
//!
//! The native backend "generates" modules by selecting monomorphized Rust
//! routines for the requested component type:
//!
//! - iteration modules expose an `extern "C"` level walker over the storage
//!   handle ABI
//! - kernel modules evaluate a lowered assignment point by point and build the
//!   result through the regular packing routine
//!
//! Both render a C-like view of the loop nest they implement as `source()`.

mod iterate;
mod kernel;
mod source;

use std::sync::Arc;

use super::{BuildRequest, CodeGenerator, CompiledModule, IterateFn, Kernel, ModuleKey};
use crate::error::Result;
use crate::storage::TensorStorage;

fn iterate_entry_for(key: &ModuleKey) -> Result<IterateFn> {
    let entry = crate::dispatch_dtype!(key.dtype, T => {
        iterate::iterate::<T> as IterateFn
    }, "iterate");
    Ok(entry)
}

/// Reference code generator
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl NativeBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }
}

impl CodeGenerator for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn build(&self, request: &BuildRequest<'_>) -> Result<Arc<dyn CompiledModule>> {
        let key = request.key.clone();
        let entry = iterate_entry_for(&key)?;
        Ok(match request.kernel {
            None => Arc::new(IterationModule {
                source: source::iteration(&key),
                key,
                entry,
            }),
            Some(kernel) => Arc::new(KernelModule {
                source: source::kernel(&key, kernel),
                key,
                kernel: kernel.clone(),
                entry,
            }),
        })
    }
}

/// Module that only walks tensors of one format
#[derive(Debug)]
pub struct IterationModule {
    key: ModuleKey,
    source: String,
    entry: IterateFn,
}

impl CompiledModule for IterationModule {
    fn key(&self) -> &ModuleKey {
        &self.key
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn iterate_entry(&self) -> IterateFn {
        self.entry
    }

    fn assemble(&self, _output: &mut TensorStorage, _operands: &[&TensorStorage]) -> Result<()> {
        Err(crate::error::Error::Codegen(format!(
            "iteration module {} has no assemble entry point",
            self.key
        )))
    }

    fn compute(&self, _output: &mut TensorStorage, _operands: &[&TensorStorage]) -> Result<()> {
        Err(crate::error::Error::Codegen(format!(
            "iteration module {} has no compute entry point",
            self.key
        )))
    }
}

/// Module computing one lowered assignment
#[derive(Debug)]
pub struct KernelModule {
    key: ModuleKey,
    source: String,
    kernel: Kernel,
    entry: IterateFn,
}

impl KernelModule {
    /// Kernel this module computes
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }
}

impl CompiledModule for KernelModule {
    fn key(&self) -> &ModuleKey {
        &self.key
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn iterate_entry(&self) -> IterateFn {
        self.entry
    }

    fn assemble(&self, output: &mut TensorStorage, operands: &[&TensorStorage]) -> Result<()> {
        crate::dispatch_dtype!(self.kernel.dtype(), T => {
            kernel::assemble::<T>(&self.kernel, output, operands)
        }, "assemble")
    }

    fn compute(&self, output: &mut TensorStorage, operands: &[&TensorStorage]) -> Result<()> {
        crate::dispatch_dtype!(self.kernel.dtype(), T => {
            kernel::compute::<T>(&self.kernel, output, operands)
        }, "compute")
    }

    fn assemble_and_compute(
        &self,
        output: &mut TensorStorage,
        operands: &[&TensorStorage],
    ) -> Result<()> {
        crate::dispatch_dtype!(self.kernel.dtype(), T => {
            kernel::assemble_and_compute::<T>(&self.kernel, output, operands)
        }, "assemble_and_compute")
    }
}

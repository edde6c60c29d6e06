//! Sessions: tensor identities and their staging state machine
//!
//! A [`Session`] owns every tensor identity it creates, the configuration
//! applied to them and a handle to the [`ModuleCache`] it compiles through.
//! Users hold [`Tensor`] handles and drive each tensor through its stages:
//!
//! ```text
//! insert ──> pack                         (needs_pack)
//! set_assignment ──> compile              (needs_compile)
//!                      ├──> assemble      (needs_assemble)
//!                      └──> compute       (needs_compute)
//! ```
//!
//! Every stage is a no-op when its flag is clear, and clears its flag only
//! after it succeeded. Reads ([`Session::at`], [`Session::get`],
//! [`Session::iter`]) bring the tensor and everything it reads up to date
//! first; insertions materialize the tensor's own pending assignment first.
//!
//! # Example
//!
//! ```ignore
//! let mut session = Session::new();
//! let a = session.tensor::<f64>("A", &[3, 3], Format::sparse(2))?;
//! session.insert(a, &[0, 0], 1.0)?;
//! session.insert(a, &[1, 1], 2.0)?;
//! session.insert(a, &[0, 0], 3.0)?;
//! session.pack(a)?;
//! for component in session.iter::<f64>(a)? {
//!     println!("{:?} = {}", component.coordinate, component.value);
//! }
//! ```

mod config;
mod interchange;
mod sync;

pub use config::{DEFAULT_ALLOC_SIZE, DEFAULT_ITERATOR_CAPACITY, SessionConfig};
pub use interchange::CompressedArrays;

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::codegen::{CompiledModule, Kernel, ModuleCache, ModuleKey, OperandSlot};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::expr::{Assignment, IndexExpr, IndexVar};
use crate::format::Format;
use crate::iter::TensorIter;
use crate::storage::TensorStorage;
use crate::tensor::identity::TensorIdentity;
use crate::tensor::{StagingFlags, Tensor, TensorArena, TensorId};

/// Owner of tensor identities
pub struct Session {
    arena: TensorArena,
    cache: Arc<ModuleCache>,
    config: SessionConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Session with default configuration and the process-wide cache
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Session with `config` and the process-wide cache
    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_cache(config, ModuleCache::global())
    }

    /// Session with `config` compiling through `cache`
    pub fn with_cache(config: SessionConfig, cache: Arc<ModuleCache>) -> Self {
        Self {
            arena: TensorArena::new(),
            cache,
            config,
        }
    }

    /// Configuration applied to new tensors
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Cache modules are resolved from
    pub fn cache(&self) -> &Arc<ModuleCache> {
        &self.cache
    }

    /// Number of live tensors
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns true if the session holds no tensors
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn identity(&self, t: Tensor) -> Result<&TensorIdentity> {
        self.arena.get(t.id())
    }

    pub(crate) fn identity_mut(&mut self, t: Tensor) -> Result<&mut TensorIdentity> {
        self.arena.get_mut(t.id())
    }

    // ========================================================================
    // Creation and release
    // ========================================================================

    /// Create a tensor with components of type `T`
    ///
    /// # Arguments
    ///
    /// * `name` - Display name used in messages and printing
    /// * `dims` - Extent of every mode
    /// * `format` - Storage format, one mode format per mode
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the format order differs from the number
    /// of dimensions or an extent does not fit a 32-bit coordinate.
    pub fn tensor<T: Element>(
        &mut self,
        name: &str,
        dims: &[usize],
        format: Format,
    ) -> Result<Tensor> {
        self.tensor_with_dtype(name, T::DTYPE, dims, format)
    }

    /// Create a tensor with a runtime component type
    pub fn tensor_with_dtype(
        &mut self,
        name: &str,
        dtype: DType,
        dims: &[usize],
        format: Format,
    ) -> Result<Tensor> {
        if format.order() != dims.len() {
            return Err(Error::invalid_argument(
                "format",
                format!(
                    "format {format} has {} modes but tensor '{name}' has order {}",
                    format.order(),
                    dims.len()
                ),
            ));
        }
        if let Some(&too_big) = dims.iter().find(|&&d| d > i32::MAX as usize) {
            return Err(Error::invalid_argument(
                "dims",
                format!("extent {too_big} of tensor '{name}' exceeds the coordinate range"),
            ));
        }
        let identity = TensorIdentity::new(
            name.to_string(),
            dtype,
            dims.to_vec(),
            format,
            self.config.alloc_size,
            self.config.assemble_while_compute,
        );
        let t = self.arena.insert(identity);
        log::debug!("created tensor '{name}' {dtype} {dims:?} as {t}");
        Ok(t)
    }

    /// Create an order-0 tensor holding `value`
    pub fn scalar<T: Element>(&mut self, name: &str, value: T) -> Result<Tensor> {
        let t = self.tensor::<T>(name, &[], Format::dense(0))?;
        self.insert(t, &[], value)?;
        self.pack(t)?;
        Ok(t)
    }

    /// Release a tensor; its handles become stale
    ///
    /// # Errors
    ///
    /// Returns `StillReferenced` if another tensor's pending assignment reads
    /// it, and `StaleHandle` if it was already released.
    pub fn release(&mut self, t: Tensor) -> Result<()> {
        let identity = self.identity(t)?;
        if let Some(&by) = identity.dependents.iter().next() {
            return Err(Error::StillReferenced {
                tensor: identity.name(),
                by: self.arena.get(by)?.name(),
            });
        }
        let operands = identity.operands.clone();
        for operand in operands {
            if let Ok(o) = self.arena.get_mut(operand) {
                o.dependents.remove(&t.id());
            }
        }
        let identity = self.arena.remove(t.id())?;
        log::debug!("released tensor '{}'", identity.name());
        Ok(())
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Display name
    pub fn name(&self, t: Tensor) -> Result<String> {
        Ok(self.identity(t)?.name())
    }

    /// Rename; names belong to the identity, so this works through `&self`
    pub fn set_name(&self, t: Tensor, name: &str) -> Result<()> {
        *self.identity(t)?.name.borrow_mut() = name.to_string();
        Ok(())
    }

    /// Number of modes
    pub fn order(&self, t: Tensor) -> Result<usize> {
        Ok(self.identity(t)?.order())
    }

    /// Extent of every mode
    pub fn dims(&self, t: Tensor) -> Result<&[usize]> {
        Ok(&self.identity(t)?.dims)
    }

    /// Component type
    pub fn dtype(&self, t: Tensor) -> Result<DType> {
        Ok(self.identity(t)?.dtype)
    }

    /// Storage format
    pub fn format(&self, t: Tensor) -> Result<&Format> {
        Ok(&self.identity(t)?.format)
    }

    /// Packed storage as it is now, without synchronizing
    pub fn storage(&self, t: Tensor) -> Result<&TensorStorage> {
        Ok(&self.identity(t)?.storage)
    }

    /// Staging reservation in bytes
    pub fn alloc_size(&self, t: Tensor) -> Result<usize> {
        Ok(self.identity(t)?.alloc_size)
    }

    /// Set the staging reservation taken on the next first insertion
    pub fn set_alloc_size(&mut self, t: Tensor, bytes: usize) -> Result<()> {
        self.identity_mut(t)?.alloc_size = bytes;
        Ok(())
    }

    /// Fuse assembly into compute for this tensor
    pub fn set_assemble_while_compute(&mut self, t: Tensor, fused: bool) -> Result<()> {
        self.identity_mut(t)?.assemble_while_compute = fused;
        Ok(())
    }

    /// All staging flags
    pub fn flags(&self, t: Tensor) -> Result<StagingFlags> {
        Ok(self.identity(t)?.flags)
    }

    /// Staged insertions are waiting to be packed
    pub fn needs_pack(&self, t: Tensor) -> Result<bool> {
        Ok(self.flags(t)?.needs_pack)
    }

    /// The pending assignment is not compiled
    pub fn needs_compile(&self, t: Tensor) -> Result<bool> {
        Ok(self.flags(t)?.needs_compile)
    }

    /// The result structure is out of date
    pub fn needs_assemble(&self, t: Tensor) -> Result<bool> {
        Ok(self.flags(t)?.needs_assemble)
    }

    /// The result values are out of date
    pub fn needs_compute(&self, t: Tensor) -> Result<bool> {
        Ok(self.flags(t)?.needs_compute)
    }

    /// Tensors whose pending assignment reads `t`
    pub fn dependents(&self, t: Tensor) -> Result<Vec<Tensor>> {
        Ok(self
            .identity(t)?
            .dependents
            .iter()
            .map(|&id| Tensor::from_id(id))
            .collect())
    }

    /// Tensors read by the pending assignment of `t`
    pub fn operands(&self, t: Tensor) -> Result<Vec<Tensor>> {
        Ok(self
            .identity(t)?
            .operands
            .iter()
            .map(|&id| Tensor::from_id(id))
            .collect())
    }

    /// Number of staged, unpacked insertions
    pub fn staged(&self, t: Tensor) -> Result<usize> {
        Ok(self.identity(t)?.staged())
    }

    // ========================================================================
    // Staging
    // ========================================================================

    /// Stage one component
    ///
    /// The insertion is summed with any component already stored or staged at
    /// the same coordinate when the tensor is next packed.
    ///
    /// # Errors
    ///
    /// - `ArityMismatch` if the coordinate length differs from the order
    /// - `IndexOutOfBounds` if a coordinate exceeds its extent
    /// - `DTypeMismatch` if `T` is not the component type
    pub fn insert<T: Element>(&mut self, t: Tensor, coordinate: &[i32], value: T) -> Result<()> {
        {
            let identity = self.identity(t)?;
            identity.check_dtype::<T>()?;
            identity.check_coordinate(coordinate)?;
        }
        self.sync_dependent_tensors(t)?;
        self.identity_mut(t)?.stage(coordinate, value)?;
        log::trace!("{t}: staged {coordinate:?}");
        self.mark_dependents_stale(t.id())
    }

    /// Stage every component of `components`, then pack
    pub fn insert_components<T, C, I>(&mut self, t: Tensor, components: I) -> Result<()>
    where
        T: Element,
        C: AsRef<[i32]>,
        I: IntoIterator<Item = (C, T)>,
    {
        for (coordinate, value) in components {
            self.insert(t, coordinate.as_ref(), value)?;
        }
        self.pack(t)
    }

    /// Grow the staging buffer for `additional` insertions
    pub fn reserve(&mut self, t: Tensor, additional: usize) -> Result<()> {
        self.identity_mut(t)?.reserve(additional)
    }

    /// Pack staged insertions into storage
    ///
    /// No-op unless insertions are staged. Staged components are sorted into
    /// the tensor's format and summed per coordinate, together with the
    /// components already stored.
    pub fn pack(&mut self, t: Tensor) -> Result<()> {
        let identity = self.identity_mut(t)?;
        if !identity.flags.needs_pack {
            return Ok(());
        }
        let staged = identity.staged();
        if let Some(staging) = identity.staging.as_mut() {
            identity.storage = staging.pack(&identity.dims, &identity.format, &identity.storage)?;
        }
        identity.flags.needs_pack = false;
        log::debug!(
            "packed {staged} insertions into '{}' ({} stored)",
            identity.name(),
            identity.storage.nnz()
        );
        Ok(())
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// Make `t` the result of `lhs(indices) = rhs`
    ///
    /// Replaces any previous assignment and discards staged insertions.
    /// Compilation is deferred to [`compile`](Session::compile) or the next
    /// read.
    ///
    /// # Errors
    ///
    /// - `CyclicDependency` if an operand already depends on `t`, or is `t`
    /// - `ArityMismatch`, `ShapeMismatch`, `DTypeMismatch`, `InvalidArgument`
    ///   if the assignment is malformed
    pub fn set_assignment(
        &mut self,
        t: Tensor,
        indices: &[&IndexVar],
        rhs: IndexExpr,
    ) -> Result<()> {
        let assignment = Assignment {
            lhs: t,
            indices: indices.iter().map(|&v| v.clone()).collect(),
            rhs,
        };

        let name = self.name(t)?;
        for operand in assignment.operands() {
            let operand_name = self.name(operand)?;
            if self.reaches(operand.id(), t.id()) {
                return Err(Error::CyclicDependency {
                    tensor: name,
                    operand: operand_name,
                });
            }
        }

        let arena = &self.arena;
        let describe = |tensor: Tensor| -> Result<(String, OperandSlot)> {
            let identity = arena.get(tensor.id())?;
            Ok((
                identity.name(),
                OperandSlot {
                    format: identity.format.clone(),
                    dtype: identity.dtype,
                    dims: identity.dims.clone(),
                },
            ))
        };
        let (kernel, operands) = Kernel::lower(&assignment, &describe)?;
        let rendered = assignment.render(&|tensor| {
            self.name(tensor).unwrap_or_else(|_| tensor.to_string())
        });

        self.detach_assignment(t)?;
        let operand_ids: Vec<TensorId> = operands.iter().map(|o| o.id()).collect();
        for &id in &operand_ids {
            self.arena.get_mut(id)?.dependents.insert(t.id());
        }

        let identity = self.identity_mut(t)?;
        identity.discard_staged();
        identity.assignment = Some(assignment);
        identity.kernel = Some(kernel);
        identity.operands = operand_ids;
        identity.flags.needs_compile = true;
        identity.flags.needs_assemble = true;
        identity.flags.needs_compute = true;
        log::debug!("assignment {rendered}");

        self.mark_dependents_stale(t.id())
    }

    /// Pending assignment of `t`
    pub fn assignment(&self, t: Tensor) -> Result<Option<&Assignment>> {
        Ok(self.identity(t)?.assignment.as_ref())
    }

    /// Pending assignment rendered with tensor names
    pub fn assignment_string(&self, t: Tensor) -> Result<Option<String>> {
        let Some(assignment) = self.assignment(t)? else {
            return Ok(None);
        };
        let name_of = |tensor: Tensor| self.name(tensor).unwrap_or_else(|_| tensor.to_string());
        Ok(Some(assignment.render(&name_of)))
    }

    /// Returns true if `target` is `from` or is read, directly or not, by it
    fn reaches(&self, from: TensorId, target: TensorId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Ok(identity) = self.arena.get(id) {
                stack.extend(identity.operands.iter().copied());
            }
        }
        false
    }

    // ========================================================================
    // Stages
    // ========================================================================

    /// Resolve the compiled module of the pending assignment
    ///
    /// No-op unless `needs_compile` is set. A fresh module re-arms assembly
    /// and compute.
    pub fn compile(&mut self, t: Tensor) -> Result<()> {
        let identity = self.identity(t)?;
        if !identity.flags.needs_compile {
            return Ok(());
        }
        let kernel = identity.kernel.as_ref().ok_or_else(|| {
            Error::Internal(format!("'{}' has no assignment to compile", identity.name()))
        })?;
        let key = ModuleKey::for_kernel(kernel);
        let module = self.cache.resolve(&key, Some(kernel))?;

        let identity = self.identity_mut(t)?;
        identity.module = Some(module);
        identity.flags.needs_compile = false;
        identity.flags.needs_assemble = true;
        identity.flags.needs_compute = true;
        log::debug!("compiled '{}' ({key})", identity.name());
        Ok(())
    }

    /// Build the index structure of the result
    ///
    /// Compiles first if needed and brings every operand up to date.
    pub fn assemble(&mut self, t: Tensor) -> Result<()> {
        self.compile(t)?;
        if !self.identity(t)?.flags.needs_assemble {
            return Ok(());
        }
        self.sync_operands(t)?;
        self.run_module(t, Stage::Assemble)?;
        let identity = self.identity_mut(t)?;
        identity.flags.needs_assemble = false;
        log::debug!("assembled '{}' ({} stored)", identity.name(), identity.storage.nnz());
        Ok(())
    }

    /// Fill the values of the result
    ///
    /// Compiles and assembles first if needed; with assemble-while-compute a
    /// pending assembly is fused into this call.
    pub fn compute(&mut self, t: Tensor) -> Result<()> {
        self.compile(t)?;
        let flags = self.identity(t)?.flags;
        if !flags.needs_compute {
            return Ok(());
        }
        let fused = flags.needs_assemble && self.identity(t)?.assemble_while_compute;
        if flags.needs_assemble && !fused {
            self.assemble(t)?;
        }
        self.sync_operands(t)?;
        self.run_module(t, if fused { Stage::Fused } else { Stage::Compute })?;
        let identity = self.identity_mut(t)?;
        identity.flags.needs_compute = false;
        if fused {
            identity.flags.needs_assemble = false;
        }
        log::debug!("computed '{}'{}", identity.name(), if fused { " (fused)" } else { "" });
        Ok(())
    }

    /// Compile, assemble and compute, each only if needed
    pub fn evaluate(&mut self, t: Tensor) -> Result<()> {
        self.compile(t)?;
        if !self.identity(t)?.assemble_while_compute {
            self.assemble(t)?;
        }
        self.compute(t)
    }

    fn run_module(&mut self, t: Tensor, stage: Stage) -> Result<()> {
        let identity = self.identity(t)?;
        let module = identity.module.clone().ok_or_else(|| {
            Error::Internal(format!("'{}' has no compiled module", identity.name()))
        })?;
        let operand_ids = identity.operands.clone();
        let placeholder = TensorStorage::empty(&[], identity.dtype, &Format::dense(0));

        let mut output = std::mem::replace(&mut self.identity_mut(t)?.storage, placeholder);
        let arena = &self.arena;
        let result = (|| -> Result<()> {
            let mut operands = Vec::with_capacity(operand_ids.len());
            for id in &operand_ids {
                operands.push(&arena.get(*id)?.storage);
            }
            match stage {
                Stage::Assemble => module.assemble(&mut output, &operands),
                Stage::Compute => module.compute(&mut output, &operands),
                Stage::Fused => module.assemble_and_compute(&mut output, &operands),
            }
        })();
        self.identity_mut(t)?.storage = output;
        result
    }

    /// Compiled module of the pending assignment, if compiled
    pub fn module(&self, t: Tensor) -> Result<Option<Arc<dyn CompiledModule>>> {
        Ok(self.identity(t)?.module.clone())
    }

    /// Source of the module computing `t`, compiling it if needed
    pub fn source(&mut self, t: Tensor) -> Result<Option<String>> {
        self.compile(t)?;
        Ok(self.module(t)?.map(|module| module.source().to_string()))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Component at `coordinate`, zero if nothing is stored there
    pub fn at<T: Element>(&mut self, t: Tensor, coordinate: &[i32]) -> Result<T> {
        Ok(self.get(t, coordinate)?.unwrap_or_else(T::zero))
    }

    /// Component at `coordinate`, `None` if nothing is stored there
    ///
    /// Explicitly stored zeros (dense modes) are `Some(0)`.
    pub fn get<T: Element>(&mut self, t: Tensor, coordinate: &[i32]) -> Result<Option<T>> {
        {
            let identity = self.identity(t)?;
            identity.check_dtype::<T>()?;
            identity.check_coordinate(coordinate)?;
        }
        self.sync_values(t)?;
        let storage = &self.identity(t)?.storage;
        match storage.locate(coordinate) {
            Some(q) => Ok(Some(storage.values().as_slice::<T>()?[q])),
            None => Ok(None),
        }
    }

    /// Iterate the stored components of `t`
    ///
    /// Brings `t` up to date, then walks its storage with the generic
    /// iteration entry point of the module cached for its format, type and
    /// shape.
    pub fn iter<T: Element>(&mut self, t: Tensor) -> Result<TensorIter<'_, T>> {
        self.identity(t)?.check_dtype::<T>()?;
        self.sync_values(t)?;
        let identity = self.identity(t)?;
        let key = ModuleKey::iteration(&identity.format, identity.dtype, &identity.dims);
        let module = self.cache.resolve(&key, None)?;
        Ok(TensorIter::new(
            t,
            &identity.storage,
            module,
            self.config.iterator_buffer_capacity,
        ))
    }

    /// Stored components as (coordinate, value) pairs, in storage order
    pub fn components<T: Element>(&mut self, t: Tensor) -> Result<Vec<(Vec<i32>, T)>> {
        Ok(self
            .iter::<T>(t)?
            .map(|c| (c.coordinate.to_vec(), c.value))
            .collect())
    }

    /// Returns true if both tensors have the same type, extents and nonzero
    /// components, whatever their formats
    pub fn equals(&mut self, a: Tensor, b: Tensor) -> Result<bool> {
        let (dtype, same_shape) = {
            let (x, y) = (self.identity(a)?, self.identity(b)?);
            (x.dtype, x.dtype == y.dtype && x.dims == y.dims)
        };
        if !same_shape {
            return Ok(false);
        }
        crate::dispatch_dtype!(dtype, T => {
            let lhs = self.nonzeros::<T>(a)?;
            let rhs = self.nonzeros::<T>(b)?;
            Ok(lhs == rhs)
        }, "equals")
    }

    fn nonzeros<T: Element>(&mut self, t: Tensor) -> Result<Vec<(Vec<i32>, T)>> {
        let mut entries: Vec<(Vec<i32>, T)> = self
            .components::<T>(t)?
            .into_iter()
            .filter(|(_, v)| *v != T::zero())
            .collect();
        entries.sort_by(|x, y| x.0.cmp(&y.0));
        Ok(entries)
    }

    /// New tensor with permuted modes
    ///
    /// Mode `k` of the result is mode `ordering[k]` of `t`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `ordering` is not a permutation of the
    /// modes of `t` or `format` has a different order.
    pub fn transpose(
        &mut self,
        t: Tensor,
        name: &str,
        ordering: &[usize],
        format: Format,
    ) -> Result<Tensor> {
        let (dtype, dims) = {
            let identity = self.identity(t)?;
            (identity.dtype, identity.dims.clone())
        };
        let mut seen = vec![false; dims.len()];
        if ordering.len() != dims.len()
            || ordering.iter().any(|&m| m >= dims.len() || std::mem::replace(&mut seen[m], true))
        {
            return Err(Error::invalid_argument(
                "ordering",
                format!("{ordering:?} is not a permutation of {} modes", dims.len()),
            ));
        }
        let permuted: Vec<usize> = ordering.iter().map(|&m| dims[m]).collect();
        let result = self.tensor_with_dtype(name, dtype, &permuted, format)?;
        crate::dispatch_dtype!(dtype, T => {
            for (coordinate, value) in self.components::<T>(t)? {
                let moved: Vec<i32> = ordering.iter().map(|&m| coordinate[m]).collect();
                self.identity_mut(result)?.stage(&moved, value)?;
            }
        }, "transpose");
        self.pack(result)?;
        Ok(result)
    }

    /// Render `t` and its stored components
    pub fn display(&mut self, t: Tensor) -> Result<String> {
        self.sync_values(t)?;
        let (dtype, header) = {
            let identity = self.identity(t)?;
            let dims: Vec<String> = identity.dims.iter().map(|d| d.to_string()).collect();
            (
                identity.dtype,
                format!(
                    "{} ({}) {} {}",
                    identity.name(),
                    dims.join("x"),
                    identity.format,
                    identity.dtype
                ),
            )
        };
        let mut out = header;
        crate::dispatch_dtype!(dtype, T => {
            for (coordinate, value) in self.components::<T>(t)? {
                let coords: Vec<String> = coordinate.iter().map(|c| c.to_string()).collect();
                let _ = write!(out, "\n  ({}): {:?}", coords.join(","), value);
            }
        }, "display");
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Assemble,
    Compute,
    Fused,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("tensors", &self.arena.len())
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

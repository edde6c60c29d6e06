//! Iteration over tensor components through generated code
//!
//! A [`TensorIter`] never looks at the storage layout itself. It calls the
//! generic iteration entry point of a compiled module, which fills a buffer of
//! up to `capacity` records and keeps its position in an opaque context blob.
//! The iterator hands out records from that buffer and refills it when it runs
//! dry; a refill that produces no record marks the end.
//!
//! # Copy-on-write
//!
//! Cloning an iterator is cheap: the clone shares the buffers and the context
//! blob through [`Shared`]. The first advance of a shared iterator deep-copies
//! them, so each copy continues independently from where it was cloned.

use std::ffi::c_void;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::codegen::{CompiledModule, ITERATE_ARGS, ctx};
use crate::dtype::Element;
use crate::storage::{RawStorageHandle, TensorStorage};
use crate::tensor::Tensor;

/// Reference-counted state with explicit copy-on-write
#[derive(Debug)]
pub struct Shared<S> {
    inner: Rc<S>,
}

impl<S> Shared<S> {
    /// Wrap `state`
    pub fn new(state: S) -> Self {
        Self {
            inner: Rc::new(state),
        }
    }

    /// Returns true if no other handle shares the state
    pub fn is_uniquely_owned(&self) -> bool {
        Rc::strong_count(&self.inner) == 1 && Rc::weak_count(&self.inner) == 0
    }

    /// Read access
    pub fn get(&self) -> &S {
        &self.inner
    }
}

impl<S: Clone> Shared<S> {
    /// Replace shared state by a private deep copy
    ///
    /// Returns true if a copy was made.
    pub fn clone_if_shared(&mut self) -> bool {
        if self.is_uniquely_owned() {
            return false;
        }
        self.inner = Rc::new(S::clone(&self.inner));
        true
    }

    /// Write access, copying first if shared
    pub fn make_mut(&mut self) -> &mut S {
        self.clone_if_shared();
        Rc::make_mut(&mut self.inner)
    }
}

impl<S> Clone for Shared<S> {
    /// Shares the state; see [`Shared::clone_if_shared`] for a deep copy
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Buffers and context of one iteration
pub struct IterState<T: Element> {
    coords: Vec<i32>,
    values: Vec<T>,
    context: *mut c_void,
    count: usize,
}

impl<T: Element> IterState<T> {
    fn new(order: usize, capacity: usize) -> Self {
        Self {
            coords: vec![0; order * capacity],
            values: vec![T::zero(); capacity],
            context: std::ptr::null_mut(),
            count: 0,
        }
    }

    /// Records currently buffered
    pub fn count(&self) -> usize {
        self.count
    }

    /// Size of the context blob in bytes, zero before the first fill
    pub fn context_size(&self) -> usize {
        if self.context.is_null() {
            return 0;
        }
        // SAFETY: non-null contexts are live blobs owned by this state.
        unsafe { ctx::size(self.context) }
    }
}

impl<T: Element> Clone for IterState<T> {
    fn clone(&self) -> Self {
        Self {
            coords: self.coords.clone(),
            values: self.values.clone(),
            // SAFETY: the context is null or a live blob owned by self.
            context: unsafe { ctx::duplicate(self.context) },
            count: self.count,
        }
    }
}

impl<T: Element> Drop for IterState<T> {
    fn drop(&mut self) {
        // SAFETY: the context is null or a live blob owned by self.
        unsafe { ctx::free(self.context) };
    }
}

impl<T: Element> fmt::Debug for IterState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterState")
            .field("count", &self.count)
            .field("context_size", &self.context_size())
            .finish()
    }
}

/// One stored component
#[derive(Debug, Clone, PartialEq)]
pub struct Component<T> {
    /// Coordinate in tensor mode order
    pub coordinate: SmallVec<[i32; 4]>,
    /// Stored value
    pub value: T,
}

/// Forward cursor over the stored components of a tensor
///
/// Created by [`Session::iter`](crate::session::Session::iter). Implements
/// [`Iterator`], and also exposes the cursor directly through
/// [`current`](TensorIter::current), [`advance`](TensorIter::advance) and
/// [`is_end`](TensorIter::is_end).
pub struct TensorIter<'a, T: Element> {
    tensor: Tensor,
    order: usize,
    capacity: i32,
    module: Arc<dyn CompiledModule>,
    storage: Rc<RawStorageHandle<'a>>,
    state: Shared<IterState<T>>,
    cursor: usize,
}

impl<'a, T: Element> TensorIter<'a, T> {
    pub(crate) fn new(
        tensor: Tensor,
        storage: &'a TensorStorage,
        module: Arc<dyn CompiledModule>,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.clamp(1, i32::MAX as usize);
        let order = storage.order();
        let mut iter = Self {
            tensor,
            order,
            capacity: capacity as i32,
            module,
            storage: Rc::new(RawStorageHandle::new(storage)),
            state: Shared::new(IterState::new(order, capacity)),
            cursor: 0,
        };
        iter.fill();
        iter
    }

    fn fill(&mut self) {
        let entry = self.module.iterate_entry();
        let state = self.state.make_mut();
        let mut args: [*mut c_void; ITERATE_ARGS] = [
            std::ptr::from_mut(&mut state.context).cast(),
            state.coords.as_mut_ptr().cast(),
            state.values.as_mut_ptr().cast(),
            std::ptr::from_ref(&self.capacity).cast_mut().cast(),
            self.storage.as_ptr().cast_mut().cast(),
        ];
        // SAFETY: buffers hold `capacity` records of this tensor's order and
        // component type, and the storage handle outlives the call.
        let written = unsafe { entry(args.as_mut_ptr()) };
        state.count = (written.max(0) as usize).min(self.capacity as usize);
        self.cursor = 0;
        log::trace!("iteration refill produced {} records", state.count);
    }

    /// Tensor being iterated
    pub fn tensor(&self) -> Tensor {
        self.tensor
    }

    /// Returns true once every component has been visited
    pub fn is_end(&self) -> bool {
        self.cursor >= self.state.get().count
    }

    /// Coordinate under the cursor
    pub fn coordinate(&self) -> Option<&[i32]> {
        if self.is_end() {
            return None;
        }
        let start = self.cursor * self.order;
        Some(&self.state.get().coords[start..start + self.order])
    }

    /// Value under the cursor
    pub fn value(&self) -> Option<T> {
        if self.is_end() {
            return None;
        }
        Some(self.state.get().values[self.cursor])
    }

    /// Component under the cursor
    pub fn current(&self) -> Option<Component<T>> {
        Some(Component {
            coordinate: SmallVec::from_slice(self.coordinate()?),
            value: self.value()?,
        })
    }

    /// Move to the next component
    pub fn advance(&mut self) {
        if self.is_end() {
            return;
        }
        if self.state.clone_if_shared() {
            log::trace!("iterator state copied on write");
        }
        self.cursor += 1;
        if self.cursor == self.state.get().count {
            self.fill();
        }
    }

    /// Returns true if the buffers and context are shared with a clone
    pub fn is_shared(&self) -> bool {
        !self.state.is_uniquely_owned()
    }
}

impl<T: Element> Clone for TensorIter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            tensor: self.tensor,
            order: self.order,
            capacity: self.capacity,
            module: self.module.clone(),
            storage: self.storage.clone(),
            state: self.state.clone(),
            cursor: self.cursor,
        }
    }
}

impl<T: Element> PartialEq for TensorIter<'_, T> {
    /// Same tensor, and both at the end or both at the same coordinate
    fn eq(&self, other: &Self) -> bool {
        if self.tensor != other.tensor {
            return false;
        }
        match (self.coordinate(), other.coordinate()) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl<T: Element> Iterator for TensorIter<'_, T> {
    type Item = Component<T>;

    fn next(&mut self) -> Option<Component<T>> {
        let component = self.current()?;
        self.advance();
        Some(component)
    }
}

impl<T: Element> fmt::Debug for TensorIter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorIter")
            .field("tensor", &self.tensor)
            .field("cursor", &self.cursor)
            .field("state", self.state.get())
            .finish()
    }
}

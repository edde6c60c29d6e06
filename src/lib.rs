//! # tacit
//!
//! **Runtime core of a sparse tensor-algebra compiler.**
//!
//! tacit holds sparse tensors in per-mode dense/compressed formats, stages
//! element insertions, and evaluates index-notation assignments through
//! compiled modules that are generated once per format, type and shape and
//! then shared by every tensor that needs them.
//!
//! ## Why tacit?
//!
//! - **Lazy staging**: insertions are buffered and packed on demand; results
//!   are compiled, assembled and computed only when read
//! - **Dependency tracking**: reads materialize every stale operand first,
//!   writes re-arm everything that reads the written tensor
//! - **Memoized code modules**: one build per (format, type, shape), shared
//!   across sessions and threads
//! - **Layout-agnostic iteration**: walk any tensor through a generated entry
//!   point with copy-on-write cursors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tacit::prelude::*;
//!
//! let mut session = Session::new();
//! let a = session.tensor::<f64>("A", &[3, 3], Format::csr())?;
//! let x = session.tensor::<f64>("x", &[3], Format::dense(1))?;
//! let y = session.tensor::<f64>("y", &[3], Format::dense(1))?;
//! session.insert_components(a, [([0, 0], 2.0), ([1, 2], 3.0)])?;
//! session.insert_components(x, [([0], 1.0), ([2], 4.0)])?;
//!
//! let (i, j) = (IndexVar::new("i"), IndexVar::new("j"));
//! session.set_assignment(y, &[&i], a.access([&i, &j]) * x.access([&j]))?;
//! assert_eq!(session.at::<f64>(y, &[1])?, 12.0);
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): parallel sort when packing large staging buffers
//! - `f16`: half-precision element types (F16, BF16)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod codegen;
pub mod dtype;
pub mod error;
pub mod expr;
pub mod format;
pub mod io;
pub mod iter;
pub mod session;
pub mod storage;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codegen::{CodeGenerator, CompiledModule, ModuleCache, ModuleKey, NativeBackend};
    pub use crate::dtype::{DType, Element};
    pub use crate::error::{Error, Result};
    pub use crate::expr::{IndexExpr, IndexVar};
    pub use crate::format::{Format, ModeFormat};
    pub use crate::io::FileType;
    pub use crate::iter::{Component, TensorIter};
    pub use crate::session::{Session, SessionConfig};
    pub use crate::tensor::{StagingFlags, Tensor};
}

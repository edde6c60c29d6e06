//! DType dispatch utilities
//!
//! This module provides the `dispatch_dtype!` macro for runtime type dispatch.
//! Tensor identities are type-erased (they carry a `DType`), while staging,
//! packing and the native kernels are generic over `Element`; the macro is the
//! single bridge between the two.
//!
//! # Usage
//!
//! ```ignore
//! fn element_size(dtype: DType) -> Result<usize> {
//!     let size = dispatch_dtype!(dtype, T => {
//!         std::mem::size_of::<T>()
//!     }, "element_size");
//!     Ok(size)
//! }
//! ```
//!
//! The body is evaluated as the value of the macro, so it may either produce a
//! value or `return` from the enclosing function. The enclosing function must
//! return `crate::error::Result<_>`, since F16/BF16 return
//! `Error::FeatureRequired` when the "f16" feature is disabled.
//!
//! ## Supported Types
//!
//! - `F64` -> `f64`, `F32` -> `f32`
//! - `F16` -> `half::f16`, `BF16` -> `half::bf16` (requires "f16" feature)
//! - `I64`/`I32`/`I16`/`I8` -> `i64`/`i32`/`i16`/`i8`
//! - `U64`/`U32`/`U16`/`U8` -> `u64`/`u32`/`u16`/`u8`

/// Internal helper macro to dispatch types requiring the "f16" feature.
#[macro_export]
#[doc(hidden)]
macro_rules! dispatch_f16_type {
    ($T:ident, $body:block, $dtype:expr, $type:ty) => {{
        #[cfg(feature = "f16")]
        {
            type $T = $type;
            $body
        }
        #[cfg(not(feature = "f16"))]
        {
            return Err($crate::error::Error::FeatureRequired {
                dtype: $dtype,
                feature: "f16",
            });
        }
    }};
}

/// Macro for runtime dtype dispatch to typed operations.
///
/// Binds `$T` to the Rust type of `$dtype` and evaluates `$body`.
/// `$error_op` names the operation for error messages.
#[macro_export]
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:block, $error_op:expr) => {{
        let _ = $error_op;
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::dtype::DType::F16 => {
                $crate::dispatch_f16_type!($T, $body, $dtype, half::f16)
            }
            $crate::dtype::DType::BF16 => {
                $crate::dispatch_f16_type!($T, $body, $dtype, half::bf16)
            }
            $crate::dtype::DType::I64 => {
                type $T = i64;
                $body
            }
            $crate::dtype::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::dtype::DType::I16 => {
                type $T = i16;
                $body
            }
            $crate::dtype::DType::I8 => {
                type $T = i8;
                $body
            }
            $crate::dtype::DType::U64 => {
                type $T = u64;
                $body
            }
            $crate::dtype::DType::U32 => {
                type $T = u32;
                $body
            }
            $crate::dtype::DType::U16 => {
                type $T = u16;
                $body
            }
            $crate::dtype::DType::U8 => {
                type $T = u8;
                $body
            }
        }
    }};
}

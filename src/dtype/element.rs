//! Element trait for mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;

/// Trait for types that can be components of a tensor
///
/// This trait connects Rust's type system to tacit's runtime dtype system.
/// Values cross into generated code through raw buffers, so every element
/// must be plain old data.
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - Basic trait requirements
/// - `Pod + Zeroable` - Safe byte views of typed arrays (bytemuck)
/// - `PartialEq + Debug` - Comparison and printing of components
///
/// # Arithmetic
///
/// Packing and the native kernels only combine components through the
/// `wrapping_*` methods. Integers wrap on overflow in every build profile;
/// floats use their ordinary operators.
pub trait Element: Copy + Send + Sync + Pod + Zeroable + 'static + PartialEq + Debug {
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for generic numeric operations
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type (saturating for integers)
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;

    /// `self + rhs`, wrapping for integers
    fn wrapping_add(self, rhs: Self) -> Self;

    /// `self - rhs`, wrapping for integers
    fn wrapping_sub(self, rhs: Self) -> Self;

    /// `self * rhs`, wrapping for integers
    fn wrapping_mul(self, rhs: Self) -> Self;

    /// `-self`, wrapping for integers (two's complement for unsigned types)
    fn wrapping_neg(self) -> Self;
}

macro_rules! impl_element {
    (@arith float) => {
        #[inline]
        fn wrapping_add(self, rhs: Self) -> Self {
            self + rhs
        }

        #[inline]
        fn wrapping_sub(self, rhs: Self) -> Self {
            self - rhs
        }

        #[inline]
        fn wrapping_mul(self, rhs: Self) -> Self {
            self * rhs
        }

        #[inline]
        fn wrapping_neg(self) -> Self {
            -self
        }
    };
    (@arith int) => {
        #[inline]
        fn wrapping_add(self, rhs: Self) -> Self {
            Self::wrapping_add(self, rhs)
        }

        #[inline]
        fn wrapping_sub(self, rhs: Self) -> Self {
            Self::wrapping_sub(self, rhs)
        }

        #[inline]
        fn wrapping_mul(self, rhs: Self) -> Self {
            Self::wrapping_mul(self, rhs)
        }

        #[inline]
        fn wrapping_neg(self) -> Self {
            Self::wrapping_neg(self)
        }
    };
    ($($ty:ty => $dtype:ident, $kind:ident, $zero:expr, $one:expr);* $(;)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    v as $ty
                }

                #[inline]
                fn zero() -> Self {
                    $zero
                }

                #[inline]
                fn one() -> Self {
                    $one
                }

                impl_element!(@arith $kind);
            }
        )*
    };
}

impl_element! {
    f64 => F64, float, 0.0, 1.0;
    f32 => F32, float, 0.0, 1.0;
    i64 => I64, int, 0, 1;
    i32 => I32, int, 0, 1;
    i16 => I16, int, 0, 1;
    i8 => I8, int, 0, 1;
    u64 => U64, int, 0, 1;
    u32 => U32, int, 0, 1;
    u16 => U16, int, 0, 1;
    u8 => U8, int, 0, 1;
}

// ============================================================================
// Half-precision floating point types (requires "f16" feature)
// ============================================================================

#[cfg(feature = "f16")]
impl Element for half::f16 {
    const DTYPE: DType = DType::F16;

    #[inline]
    fn to_f64(self) -> f64 {
        half::f16::to_f64(self)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }

    #[inline]
    fn zero() -> Self {
        half::f16::ZERO
    }

    #[inline]
    fn one() -> Self {
        half::f16::ONE
    }

    impl_element!(@arith float);
}

#[cfg(feature = "f16")]
impl Element for half::bf16 {
    const DTYPE: DType = DType::BF16;

    #[inline]
    fn to_f64(self) -> f64 {
        half::bf16::to_f64(self)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        half::bf16::from_f64(v)
    }

    #[inline]
    fn zero() -> Self {
        half::bf16::ZERO
    }

    #[inline]
    fn one() -> Self {
        half::bf16::ONE
    }

    impl_element!(@arith float);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_dtypes() {
        assert_eq!(f64::DTYPE, DType::F64);
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(i32::DTYPE, DType::I32);
        assert_eq!(u8::DTYPE, DType::U8);
    }

    #[test]
    fn test_element_sizes_match_dtype() {
        assert_eq!(std::mem::size_of::<f64>(), f64::DTYPE.size_in_bytes());
        assert_eq!(std::mem::size_of::<i16>(), i16::DTYPE.size_in_bytes());
        assert_eq!(std::mem::size_of::<u32>(), u32::DTYPE.size_in_bytes());
    }

    #[test]
    fn test_f64_conversions() {
        assert_eq!(i32::from_f64(3.9), 3);
        assert_eq!(u8::from_f64(-1.0), 0);
        assert_eq!(f32::from_f64(0.5).to_f64(), 0.5);
        assert_eq!(i64::one() + i64::one(), 2);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        assert_eq!(Element::wrapping_add(200u8, 100), 44);
        assert_eq!(Element::wrapping_sub(0u32, 1), u32::MAX);
        assert_eq!(Element::wrapping_mul(i8::MAX, 2), -2);
        assert_eq!(Element::wrapping_neg(1u16), u16::MAX);
        assert_eq!(Element::wrapping_neg(i64::MIN), i64::MIN);
    }

    #[test]
    fn test_float_arithmetic_is_plain() {
        assert_eq!(Element::wrapping_add(0.5f64, 0.25), 0.75);
        assert_eq!(Element::wrapping_sub(1.0f32, 3.0), -2.0);
        assert_eq!(Element::wrapping_neg(2.0f64), -2.0);
        assert!(Element::wrapping_mul(f64::MAX, 2.0).is_infinite());
    }
}

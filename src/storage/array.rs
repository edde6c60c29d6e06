//! Array: type-erased component buffers with owned or user-owned memory

use std::fmt;
use std::ptr::NonNull;

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};

/// A typed, type-erased buffer of `len` elements of `dtype`
///
/// Index arrays (`I32`) and value arrays (any dtype) of a tensor's storage
/// are `Array`s. The buffer is either owned by tacit or wraps memory owned by
/// the caller (see [`Array::from_raw_parts`]); user-owned memory is never
/// freed by tacit.
pub struct Array {
    buf: Buffer,
    len: usize,
    dtype: DType,
}

enum Buffer {
    /// 8-byte words so every dtype is correctly aligned
    Owned(Vec<u64>),
    /// Caller memory; valid for reads and writes while the array lives
    UserOwned(NonNull<u8>),
}

fn words_for(len: usize, dtype: DType) -> usize {
    (len * dtype.size_in_bytes()).div_ceil(8)
}

impl Array {
    /// Create a zero-filled array
    pub fn zeros(dtype: DType, len: usize) -> Self {
        Self {
            buf: Buffer::Owned(vec![0u64; words_for(len, dtype)]),
            len,
            dtype,
        }
    }

    /// Create an owned array from a slice, copying the data
    pub fn from_slice<T: Element>(data: &[T]) -> Self {
        let mut array = Self::zeros(T::DTYPE, data.len());
        if let Buffer::Owned(words) = &mut array.buf {
            let typed: &mut [T] = bytemuck::cast_slice_mut(words.as_mut_slice());
            typed[..data.len()].copy_from_slice(data);
        }
        array
    }

    /// Create an owned array from a vector
    pub fn from_vec<T: Element>(data: Vec<T>) -> Self {
        Self::from_slice(&data)
    }

    /// Wrap caller memory without taking ownership
    ///
    /// # Safety
    /// - `ptr` must point to `len` initialized elements of `T`
    /// - The memory must stay valid for reads and writes, and must not be
    ///   accessed through other aliases, for the lifetime of this array
    /// - Caller is responsible for eventual deallocation
    pub unsafe fn from_raw_parts<T: Element>(ptr: *mut T, len: usize) -> Result<Self> {
        match NonNull::new(ptr.cast::<u8>()) {
            Some(ptr) => Ok(Self {
                buf: Buffer::UserOwned(ptr),
                len,
                dtype: T::DTYPE,
            }),
            None if len == 0 => Ok(Self::zeros(T::DTYPE, 0)),
            None => Err(Error::invalid_argument(
                "ptr",
                "null pointer for a non-empty array",
            )),
        }
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the array has no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns true if the memory belongs to the caller
    #[inline]
    pub fn is_user_owned(&self) -> bool {
        matches!(self.buf, Buffer::UserOwned(_))
    }

    /// Raw pointer to the first element
    pub fn as_ptr(&self) -> *const u8 {
        match &self.buf {
            Buffer::Owned(words) => words.as_ptr().cast(),
            Buffer::UserOwned(ptr) => ptr.as_ptr(),
        }
    }

    /// Typed view of the elements
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedDType` if `T` is not the array's dtype.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        self.check::<T>()?;
        Ok(match &self.buf {
            Buffer::Owned(words) => {
                let typed: &[T] = bytemuck::cast_slice(words.as_slice());
                &typed[..self.len]
            }
            // SAFETY: from_raw_parts guarantees len valid elements of T.
            Buffer::UserOwned(ptr) => unsafe {
                std::slice::from_raw_parts(ptr.as_ptr().cast::<T>(), self.len)
            },
        })
    }

    /// Mutable typed view of the elements
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        self.check::<T>()?;
        Ok(match &mut self.buf {
            Buffer::Owned(words) => {
                let typed: &mut [T] = bytemuck::cast_slice_mut(words.as_mut_slice());
                &mut typed[..self.len]
            }
            // SAFETY: from_raw_parts guarantees exclusive access to len elements.
            Buffer::UserOwned(ptr) => unsafe {
                std::slice::from_raw_parts_mut(ptr.as_ptr().cast::<T>(), self.len)
            },
        })
    }

    /// Copy the elements into a vector
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.as_slice::<T>()?.to_vec())
    }

    fn check<T: Element>(&self) -> Result<()> {
        if T::DTYPE != self.dtype {
            return Err(Error::unsupported_dtype(T::DTYPE, "typed array view"));
        }
        Ok(())
    }
}

impl Clone for Array {
    /// Clones always own their memory, including clones of user-owned arrays
    fn clone(&self) -> Self {
        let bytes = self.len * self.dtype.size_in_bytes();
        let mut words = vec![0u64; words_for(self.len, self.dtype)];
        let dst: &mut [u8] = bytemuck::cast_slice_mut(words.as_mut_slice());
        // SAFETY: as_ptr points to at least `bytes` readable bytes.
        let src = unsafe { std::slice::from_raw_parts(self.as_ptr(), bytes) };
        dst[..bytes].copy_from_slice(src);
        Self {
            buf: Buffer::Owned(words),
            len: self.len,
            dtype: self.dtype,
        }
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("dtype", &self.dtype)
            .field("len", &self.len)
            .field("user_owned", &self.is_user_owned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_roundtrip() {
        let array = Array::from_slice(&[1.5f64, -2.0, 3.25]);
        assert_eq!(array.len(), 3);
        assert_eq!(array.dtype(), DType::F64);
        assert_eq!(array.as_slice::<f64>().unwrap(), &[1.5, -2.0, 3.25]);
    }

    #[test]
    fn test_odd_sized_elements() {
        let array = Array::from_slice(&[1u8, 2, 3]);
        assert_eq!(array.as_slice::<u8>().unwrap(), &[1, 2, 3]);
        let array = Array::from_slice(&[7i16; 5]);
        assert_eq!(array.as_slice::<i16>().unwrap(), &[7; 5]);
    }

    #[test]
    fn test_wrong_type_view() {
        let array = Array::from_slice(&[1i32, 2]);
        assert!(array.as_slice::<f32>().is_err());
    }

    #[test]
    fn test_user_owned_is_not_copied() {
        let mut data = vec![1i32, 2, 3];
        let mut array = unsafe { Array::from_raw_parts(data.as_mut_ptr(), data.len()) }.unwrap();
        assert!(array.is_user_owned());
        assert_eq!(array.as_ptr(), data.as_ptr().cast());
        array.as_mut_slice::<i32>().unwrap()[0] = 10;
        drop(array);
        assert_eq!(data, vec![10, 2, 3]);
    }

    #[test]
    fn test_clone_of_user_owned_is_owned() {
        let mut data = vec![4.0f32, 5.0];
        let array = unsafe { Array::from_raw_parts(data.as_mut_ptr(), 2) }.unwrap();
        let copy = array.clone();
        assert!(!copy.is_user_owned());
        assert_eq!(copy.as_slice::<f32>().unwrap(), &[4.0, 5.0]);
    }

    #[test]
    fn test_null_pointer() {
        let empty = unsafe { Array::from_raw_parts::<f64>(std::ptr::null_mut(), 0) }.unwrap();
        assert!(empty.is_empty());
        assert!(unsafe { Array::from_raw_parts::<f64>(std::ptr::null_mut(), 3) }.is_err());
    }
}

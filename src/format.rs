//! Per-mode storage format descriptors
//!
//! A [`Format`] names, for every mode of a tensor, how that mode's coordinates
//! are stored, plus the order in which modes are laid out in memory. The
//! format decides both the physical storage and which generated code is used,
//! so it is part of every code-module cache key.
//!
//! # Common formats
//!
//! | Format            | Modes                    | Ordering |
//! |-------------------|--------------------------|----------|
//! | dense vector      | `(d)`                    | `[0]`    |
//! | sparse vector     | `(s)`                    | `[0]`    |
//! | CSR               | `(d,s)`                  | `[0, 1]` |
//! | CSC               | `(d,s)`                  | `[1, 0]` |
//! | DCSR              | `(s,s)`                  | `[0, 1]` |

use std::fmt;

use crate::error::{Error, Result};

/// Storage of one mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeFormat {
    /// Every coordinate of the mode is stored
    ///
    /// Storage: the extent only. Missing components occupy explicit zeros.
    Dense,

    /// Only coordinates holding components are stored
    ///
    /// Storage: a `pos` array (one segment per parent position) and a `crd`
    /// array with the stored coordinates of each segment.
    Compressed,
}

impl ModeFormat {
    /// Tag written into the storage handle ABI
    #[inline]
    pub const fn tag(self) -> i32 {
        match self {
            ModeFormat::Dense => 0,
            ModeFormat::Compressed => 1,
        }
    }

    /// Inverse of [`ModeFormat::tag`]
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(ModeFormat::Dense),
            1 => Some(ModeFormat::Compressed),
            _ => None,
        }
    }

    /// One-letter name used in format strings
    pub const fn short_name(self) -> &'static str {
        match self {
            ModeFormat::Dense => "d",
            ModeFormat::Compressed => "s",
        }
    }
}

/// Storage format of a whole tensor
///
/// `modes[k]` describes the k-th *stored* level, and `ordering[k]` is the
/// tensor mode stored at that level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Format {
    modes: Vec<ModeFormat>,
    ordering: Vec<usize>,
}

impl Format {
    /// Create a format with the identity mode ordering
    pub fn new(modes: Vec<ModeFormat>) -> Self {
        let ordering = (0..modes.len()).collect();
        Self { modes, ordering }
    }

    /// Create a format with an explicit mode ordering
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `ordering` is not a permutation of
    /// `0..modes.len()`.
    pub fn with_ordering(modes: Vec<ModeFormat>, ordering: Vec<usize>) -> Result<Self> {
        if ordering.len() != modes.len() {
            return Err(Error::invalid_argument(
                "ordering",
                format!(
                    "mode ordering has {} entries for {} modes",
                    ordering.len(),
                    modes.len()
                ),
            ));
        }
        let mut seen = vec![false; ordering.len()];
        for &mode in &ordering {
            if mode >= seen.len() || seen[mode] {
                return Err(Error::invalid_argument(
                    "ordering",
                    format!("{ordering:?} is not a permutation"),
                ));
            }
            seen[mode] = true;
        }
        Ok(Self { modes, ordering })
    }

    /// All modes dense
    pub fn dense(order: usize) -> Self {
        Self::new(vec![ModeFormat::Dense; order])
    }

    /// All modes compressed (the default for new tensors)
    pub fn sparse(order: usize) -> Self {
        Self::new(vec![ModeFormat::Compressed; order])
    }

    /// Compressed sparse row
    pub fn csr() -> Self {
        Self::new(vec![ModeFormat::Dense, ModeFormat::Compressed])
    }

    /// Compressed sparse column
    pub fn csc() -> Self {
        Self {
            modes: vec![ModeFormat::Dense, ModeFormat::Compressed],
            ordering: vec![1, 0],
        }
    }

    /// Number of modes
    #[inline]
    pub fn order(&self) -> usize {
        self.modes.len()
    }

    /// Mode formats in level order
    #[inline]
    pub fn modes(&self) -> &[ModeFormat] {
        &self.modes
    }

    /// Tensor mode stored at each level
    #[inline]
    pub fn ordering(&self) -> &[usize] {
        &self.ordering
    }

    /// Returns true if this is the CSR format
    pub fn is_csr(&self) -> bool {
        *self == Self::csr()
    }

    /// Returns true if this is the CSC format
    pub fn is_csc(&self) -> bool {
        *self == Self::csc()
    }

    /// Returns true if every mode is dense
    pub fn is_dense(&self) -> bool {
        self.modes.iter().all(|m| *m == ModeFormat::Dense)
    }

    /// Permute tensor-order dims into level order
    pub fn level_dims(&self, dims: &[usize]) -> Vec<usize> {
        self.ordering.iter().map(|&mode| dims[mode]).collect()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_csr() {
            return write!(f, "CSR");
        }
        if self.is_csc() {
            return write!(f, "CSC");
        }
        let modes: Vec<&str> = self.modes.iter().map(|m| m.short_name()).collect();
        write!(f, "({}", modes.join(","))?;
        if self.ordering.iter().enumerate().any(|(k, &m)| k != m) {
            let ordering: Vec<String> = self.ordering.iter().map(|m| m.to_string()).collect();
            write!(f, ";{}", ordering.join(","))?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_display() {
        assert_eq!(Format::csr().to_string(), "CSR");
        assert_eq!(Format::csc().to_string(), "CSC");
        assert_eq!(Format::sparse(3).to_string(), "(s,s,s)");
        assert_eq!(Format::dense(1).to_string(), "(d)");
        let f = Format::with_ordering(vec![ModeFormat::Compressed; 2], vec![1, 0]).unwrap();
        assert_eq!(f.to_string(), "(s,s;1,0)");
    }

    #[test]
    fn test_format_properties() {
        assert!(Format::csr().is_csr());
        assert!(!Format::csr().is_csc());
        assert!(Format::csc().is_csc());
        assert!(Format::dense(2).is_dense());
        assert!(!Format::sparse(2).is_dense());
        assert_eq!(Format::csc().level_dims(&[3, 5]), vec![5, 3]);
    }

    #[test]
    fn test_invalid_ordering() {
        assert!(Format::with_ordering(vec![ModeFormat::Dense; 2], vec![0, 0]).is_err());
        assert!(Format::with_ordering(vec![ModeFormat::Dense; 2], vec![0]).is_err());
        assert!(Format::with_ordering(vec![ModeFormat::Dense; 2], vec![0, 2]).is_err());
    }

    #[test]
    fn test_mode_tags() {
        assert_eq!(ModeFormat::from_tag(ModeFormat::Dense.tag()), Some(ModeFormat::Dense));
        assert_eq!(
            ModeFormat::from_tag(ModeFormat::Compressed.tag()),
            Some(ModeFormat::Compressed)
        );
        assert_eq!(ModeFormat::from_tag(7), None);
    }
}

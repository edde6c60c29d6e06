//! Session configuration

/// Default staging reservation per tensor, in bytes
pub const DEFAULT_ALLOC_SIZE: usize = 1 << 20;

/// Default number of records produced per iteration refill
pub const DEFAULT_ITERATOR_CAPACITY: usize = 100;

/// Defaults applied to tensors created by a session
///
/// ```ignore
/// let config = SessionConfig::default()
///     .with_alloc_size(4096)
///     .with_assemble_while_compute(true);
/// let mut session = Session::with_config(config);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Initial staging reservation in bytes, taken on the first insertion
    pub alloc_size: usize,
    /// Issue assembly and compute as one fused call
    pub assemble_while_compute: bool,
    /// Records fetched per call into generated iteration code
    pub iterator_buffer_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            alloc_size: DEFAULT_ALLOC_SIZE,
            assemble_while_compute: false,
            iterator_buffer_capacity: DEFAULT_ITERATOR_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Set the staging reservation
    pub fn with_alloc_size(mut self, bytes: usize) -> Self {
        self.alloc_size = bytes;
        self
    }

    /// Set assemble-while-compute
    pub fn with_assemble_while_compute(mut self, fused: bool) -> Self {
        self.assemble_while_compute = fused;
        self
    }

    /// Set the iteration buffer capacity (clamped to at least one record)
    pub fn with_iterator_buffer_capacity(mut self, records: usize) -> Self {
        self.iterator_buffer_capacity = records.max(1);
        self
    }
}

//! Grow-only staging buffer shared by every operation on a device handle.
//!
//! Channel reads, TDO captures, SPI receives and chain scans all need a
//! temporary byte buffer sized to the operation. Allocating one per call is
//! wasteful on hot paths (a CSVF player issues thousands of small shifts), so
//! each [`FpgaLink`](crate::FpgaLink) handle owns a single buffer that is
//! lazily grown to the high-water mark and never shrunk.

/// A reusable byte buffer whose capacity only ever grows.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    pub(crate) data: Vec<u8>,
}

impl ScratchBuffer {
    /// Create an empty scratch buffer. Nothing is allocated until the first
    /// [`ensure`](Self::ensure).
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow the buffer so that at least `min_bytes` are addressable.
    ///
    /// A no-op when the buffer is already large enough; never reallocates
    /// downward. New bytes are zeroed.
    pub fn ensure(&mut self, min_bytes: usize) {
        if self.data.len() < min_bytes {
            self.data.resize(min_bytes, 0);
        }
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

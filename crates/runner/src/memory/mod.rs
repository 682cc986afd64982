use std::ops::Range;

use thiserror::Error;
use x86e_common::Width;

/// Default size of the emulated address space, in bytes.
pub const DEFAULT_MEMORY_SIZE: usize = 1 << 16;

/// Custom error type for memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Memory access out of bounds: {len} byte(s) at address {address:#x} (memory size {size:#x})")]
    OutOfBounds { address: u64, len: u64, size: usize },
}

/// Represents the emulator's memory, a flat, byte-addressed, little-endian
/// address space.
///
/// Programs are not loaded into memory: instructions live in the
/// [`Program`](x86e_common::Program) and memory only holds the stack and
/// whatever the program stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    /// The index of the vector corresponds to the memory address.
    pub data: Vec<u8>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}

impl Memory {
    /// Creates a zeroed memory of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Validates that `len` bytes starting at `address` lie inside memory.
    fn range(&self, address: u64, len: u64) -> Result<Range<usize>, MemoryError> {
        let out_of_bounds = || MemoryError::OutOfBounds {
            address,
            len,
            size: self.size(),
        };
        let end = address.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.size() as u64 {
            return Err(out_of_bounds());
        }
        Ok(address as usize..end as usize)
    }

    /// Reads a little-endian value of the given width, zero-extended to 64 bits.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] if any byte of the access lies
    /// outside memory.
    pub fn read(&self, address: u64, width: Width) -> Result<u64, MemoryError> {
        let range = self.range(address, width.bytes())?;
        let mut bytes = [0u8; 8];
        bytes[..range.len()].copy_from_slice(&self.data[range]);
        Ok(u64::from_le_bytes(bytes))
    }

    /// Writes the low `width` bytes of `value` in little-endian order.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfBounds`] if any byte of the access lies
    /// outside memory. Nothing is written in that case.
    pub fn write(&mut self, address: u64, value: u64, width: Width) -> Result<(), MemoryError> {
        let range = self.range(address, width.bytes())?;
        let len = range.len();
        self.data[range].copy_from_slice(&value.to_le_bytes()[..len]);
        Ok(())
    }

    /// Borrows `len` raw bytes starting at `address`.
    pub fn read_bytes(&self, address: u64, len: u64) -> Result<&[u8], MemoryError> {
        let range = self.range(address, len)?;
        Ok(&self.data[range])
    }

    /// Copies `bytes` into memory starting at `address`.
    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(address, bytes.len() as u64)?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }
}

//! Linear memory implementation
//!
//! This module provides safe, bounds-checked access to linear memory.
//!
//! Memory layout:
//! - Page size: 64KB (65,536 bytes)
//! - Address space: 32-bit (max 4GB)
//! - Byte order: little-endian regardless of host
//! - Out-of-bounds access: fatal runtime error, never clamped

use super::RuntimeError;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt::Write;

/// Page size in bytes (64KB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages (2^16 = 64K pages = 4GB total)
pub const MAX_PAGES: u32 = 65536;

/// Bytes per row of a memory dump
const DUMP_ROW: usize = 16;

/// A linear memory instance
///
/// All access is bounds-checked before touching the underlying data and
/// growth validates against the maximum limits. No unsafe code.
#[derive(Debug, Clone)]
pub struct Memory {
    /// The actual memory data
    data: Vec<u8>,

    /// Current size in pages
    current_pages: u32,

    /// Maximum size in pages (None = address space limit)
    max_pages: Option<u32>,
}

impl Memory {
    /// Create a new memory instance with the given limits
    ///
    /// # Errors
    /// - Initial pages exceeds maximum
    /// - Initial or maximum pages exceeds the address space
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Result<Self, RuntimeError> {
        if initial_pages > MAX_PAGES {
            return Err(RuntimeError::MemoryError(format!(
                "Initial memory size {initial_pages} pages exceeds maximum {MAX_PAGES} pages"
            )));
        }

        if let Some(max) = max_pages {
            if initial_pages > max {
                return Err(RuntimeError::MemoryError(format!(
                    "Initial size {initial_pages} pages exceeds specified maximum {max} pages"
                )));
            }
            if max > MAX_PAGES {
                return Err(RuntimeError::MemoryError(format!(
                    "Maximum size {max} pages exceeds system maximum {MAX_PAGES} pages"
                )));
            }
        }

        let initial_bytes = initial_pages as usize * PAGE_SIZE;
        let mut data = Vec::new();
        data.try_reserve_exact(initial_bytes)
            .map_err(|e| RuntimeError::MemoryError(format!("cannot allocate {initial_pages} pages: {e}")))?;
        data.resize(initial_bytes, 0);

        Ok(Memory {
            data,
            current_pages: initial_pages,
            max_pages,
        })
    }

    /// Get the current memory size in pages
    pub fn size_in_pages(&self) -> u32 {
        self.current_pages
    }

    /// Get the current memory size in bytes
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Get the maximum memory size in pages (None = unbounded)
    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Grow memory by the specified number of pages
    ///
    /// Returns the previous size in pages, or -1 without changing anything
    /// if `delta_pages` is negative, the limit would be exceeded or the
    /// allocation fails. New pages are zero-filled.
    pub fn grow(&mut self, delta_pages: i32) -> i32 {
        let current = self.current_pages;

        let Ok(delta) = u32::try_from(delta_pages) else {
            return -1;
        };
        let Some(new_pages) = current.checked_add(delta) else {
            return -1;
        };
        if new_pages > self.max_pages.unwrap_or(MAX_PAGES) {
            return -1;
        }

        let new_bytes = new_pages as usize * PAGE_SIZE;
        match self.data.try_reserve(new_bytes - self.data.len()) {
            Ok(()) => {
                self.data.resize(new_bytes, 0);
                self.current_pages = new_pages;
                current as i32
            }
            Err(_) => -1,
        }
    }

    /// Check that `width` bytes at `addr` are within the current size
    #[inline]
    fn check_bounds(&self, addr: u64, width: usize) -> Result<usize, RuntimeError> {
        let out_of_bounds = || RuntimeError::MemoryOutOfBounds {
            addr,
            width,
            size: self.data.len(),
        };
        let start = usize::try_from(addr).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(width).ok_or_else(out_of_bounds)?;
        if end > self.data.len() {
            return Err(out_of_bounds());
        }
        Ok(start)
    }

    fn slice(&self, addr: u64, width: usize) -> Result<&[u8], RuntimeError> {
        let start = self.check_bounds(addr, width)?;
        Ok(&self.data[start..start + width])
    }

    fn slice_mut(&mut self, addr: u64, width: usize) -> Result<&mut [u8], RuntimeError> {
        let start = self.check_bounds(addr, width)?;
        Ok(&mut self.data[start..start + width])
    }

    /// Read a u8 from memory
    pub fn read_u8(&self, addr: u64) -> Result<u8, RuntimeError> {
        Ok(self.slice(addr, 1)?[0])
    }

    /// Read a u16 from memory (little-endian)
    pub fn read_u16(&self, addr: u64) -> Result<u16, RuntimeError> {
        Ok(LittleEndian::read_u16(self.slice(addr, 2)?))
    }

    /// Read a u32 from memory (little-endian)
    pub fn read_u32(&self, addr: u64) -> Result<u32, RuntimeError> {
        Ok(LittleEndian::read_u32(self.slice(addr, 4)?))
    }

    /// Read a u64 from memory (little-endian)
    pub fn read_u64(&self, addr: u64) -> Result<u64, RuntimeError> {
        Ok(LittleEndian::read_u64(self.slice(addr, 8)?))
    }

    /// Read an i8 from memory
    pub fn read_i8(&self, addr: u64) -> Result<i8, RuntimeError> {
        Ok(self.read_u8(addr)? as i8)
    }

    /// Read an i16 from memory (little-endian)
    pub fn read_i16(&self, addr: u64) -> Result<i16, RuntimeError> {
        Ok(LittleEndian::read_i16(self.slice(addr, 2)?))
    }

    /// Read an i32 from memory (little-endian)
    pub fn read_i32(&self, addr: u64) -> Result<i32, RuntimeError> {
        Ok(LittleEndian::read_i32(self.slice(addr, 4)?))
    }

    /// Read an i64 from memory (little-endian)
    pub fn read_i64(&self, addr: u64) -> Result<i64, RuntimeError> {
        Ok(LittleEndian::read_i64(self.slice(addr, 8)?))
    }

    /// Read an f32 from memory (little-endian)
    pub fn read_f32(&self, addr: u64) -> Result<f32, RuntimeError> {
        Ok(LittleEndian::read_f32(self.slice(addr, 4)?))
    }

    /// Read an f64 from memory (little-endian)
    pub fn read_f64(&self, addr: u64) -> Result<f64, RuntimeError> {
        Ok(LittleEndian::read_f64(self.slice(addr, 8)?))
    }

    /// Write a u8 to memory
    pub fn write_u8(&mut self, addr: u64, value: u8) -> Result<(), RuntimeError> {
        self.slice_mut(addr, 1)?[0] = value;
        Ok(())
    }

    /// Write a u16 to memory (little-endian)
    pub fn write_u16(&mut self, addr: u64, value: u16) -> Result<(), RuntimeError> {
        LittleEndian::write_u16(self.slice_mut(addr, 2)?, value);
        Ok(())
    }

    /// Write a u32 to memory (little-endian)
    pub fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), RuntimeError> {
        LittleEndian::write_u32(self.slice_mut(addr, 4)?, value);
        Ok(())
    }

    /// Write a u64 to memory (little-endian)
    pub fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), RuntimeError> {
        LittleEndian::write_u64(self.slice_mut(addr, 8)?, value);
        Ok(())
    }

    /// Write an f32 to memory (little-endian)
    pub fn write_f32(&mut self, addr: u64, value: f32) -> Result<(), RuntimeError> {
        LittleEndian::write_f32(self.slice_mut(addr, 4)?, value);
        Ok(())
    }

    /// Write an f64 to memory (little-endian)
    pub fn write_f64(&mut self, addr: u64, value: f64) -> Result<(), RuntimeError> {
        LittleEndian::write_f64(self.slice_mut(addr, 8)?, value);
        Ok(())
    }

    /// Read a slice of bytes from memory
    pub fn read_bytes(&self, addr: u64, len: usize) -> Result<Vec<u8>, RuntimeError> {
        Ok(self.slice(addr, len)?.to_vec())
    }

    /// Write a slice of bytes to memory
    pub fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), RuntimeError> {
        self.slice_mut(addr, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Render a hex dump of `count` bytes starting at `start`
    ///
    /// A `count` of 0 or one running past the end is clamped to the end of
    /// memory; a `start` beyond the end yields an empty dump.
    pub fn dump(&self, start: usize, count: usize) -> String {
        let mut out = String::new();
        if start >= self.data.len() {
            return out;
        }
        let end = match count {
            0 => self.data.len(),
            n => start.saturating_add(n).min(self.data.len()),
        };

        for (row, chunk) in self.data[start..end].chunks(DUMP_ROW).enumerate() {
            let encoded = hex::encode(chunk);
            let bytes: Vec<&str> = (0..encoded.len())
                .step_by(2)
                .map(|i| &encoded[i..i + 2])
                .collect();
            let ascii: String = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
                .collect();
            let _ = writeln!(
                out,
                "{:08x}  {:<width$}  |{ascii}|",
                start + row * DUMP_ROW,
                bytes.join(" "),
                width = DUMP_ROW * 3 - 1
            );
        }
        out
    }
}

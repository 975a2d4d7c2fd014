//! # Floepack
//!
//! A bounded, cursor-driven byte region for building and reading wire frames.
//!
//! ## Philosophy
//!
//! - **Explicit State**: Every buffer carries `position`, `limit` and `capacity`,
//!   with `0 <= position <= limit <= capacity` holding after every call.
//! - **All-or-Nothing**: A read or write that does not fit before `limit` fails
//!   before touching a single byte. The cursor never moves on error.
//! - **Explicit Byte Order**: Multi-byte scalars follow the buffer's `ByteOrder`.
//!   New buffers start in network order (big-endian).
//!
//! ## Usage
//!
//! ```
//! use floepack::{Buffer, ByteOrder};
//!
//! let mut buf = Buffer::allocate(16);
//! buf.set_order(ByteOrder::Little);
//! buf.put_i32(7).unwrap().put_u8(1).unwrap();
//! buf.flip();
//! assert_eq!(buf.get_i32().unwrap(), 7);
//! assert_eq!(buf.get_u8().unwrap(), 1);
//! ```

mod macros;

#[cfg(test)]
mod tests;

use crate::macros::for_each_multibyte;
use crate::macros::impl_multibyte;

/// Buffer access failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A position, limit or absolute index fell outside its allowed range.
    Range { value: usize, bound: usize },
    /// A write needed more bytes than remain before `limit`.
    Overflow { needed: usize, remaining: usize },
    /// A read needed more bytes than remain before `limit`.
    Underflow { needed: usize, remaining: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Range { value, bound } => {
                write!(f, "Range error: {} is outside 0..={}", value, bound)
            }
            Error::Overflow { needed, remaining } => {
                write!(f, "Buffer overflow: need {} bytes, {} remaining", needed, remaining)
            }
            Error::Underflow { needed, remaining } => {
                write!(f, "Buffer underflow: need {} bytes, {} remaining", needed, remaining)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for buffer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Byte order applied to multi-byte scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// The fixed order every new buffer starts in.
    pub const NETWORK: ByteOrder = ByteOrder::Big;

    /// The order of the host CPU.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") { ByteOrder::Big } else { ByteOrder::Little }
    }

    /// The opposite order.
    pub const fn swapped(self) -> Self {
        match self {
            ByteOrder::Big => ByteOrder::Little,
            ByteOrder::Little => ByteOrder::Big,
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::NETWORK
    }
}

/// A fixed-capacity byte region with a read/write cursor.
///
/// # Invariants
///
/// - `position <= limit <= capacity` at all times.
/// - Relative `put_*`/`get_*` calls operate at `position` and advance it by the
///   width of the value. Bytes past `limit` are never read or written.
/// - Snapshots (`to_vec`, `raw_bytes`, `as_slice`) never move the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
    position: usize,
    limit: usize,
    order: ByteOrder,
}

impl Buffer {
    /// Creates a zeroed buffer. `position = 0`, `limit = capacity`.
    pub fn allocate(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            position: 0,
            limit: capacity,
            order: ByteOrder::NETWORK,
        }
    }

    /// Wraps existing bytes for reading. `position = 0`, `limit = capacity = len`.
    pub fn wrap(bytes: Vec<u8>) -> Self {
        let limit = bytes.len();
        Self {
            data: bytes,
            position: 0,
            limit,
            order: ByteOrder::NETWORK,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes between the cursor and the limit.
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Moves the cursor.
    ///
    /// # Errors
    /// Returns `Error::Range` if `position > limit`.
    pub fn set_position(&mut self, position: usize) -> Result<&mut Self> {
        if position > self.limit {
            return Err(Error::Range { value: position, bound: self.limit });
        }
        self.position = position;
        Ok(self)
    }

    /// Moves the limit. A cursor past the new limit is pulled back to it.
    ///
    /// # Errors
    /// Returns `Error::Range` if `limit > capacity`.
    pub fn set_limit(&mut self, limit: usize) -> Result<&mut Self> {
        if limit > self.data.len() {
            return Err(Error::Range { value: limit, bound: self.data.len() });
        }
        self.limit = limit;
        if self.position > limit {
            self.position = limit;
        }
        Ok(self)
    }

    pub fn set_order(&mut self, order: ByteOrder) -> &mut Self {
        self.order = order;
        self
    }

    /// Resets for writing: `position = 0`, `limit = capacity`.
    pub fn clear(&mut self) -> &mut Self {
        self.position = 0;
        self.limit = self.data.len();
        self
    }

    /// Switches from writing to reading: `limit = position`, `position = 0`.
    pub fn flip(&mut self) -> &mut Self {
        self.limit = self.position;
        self.position = 0;
        self
    }

    /// Rewinds the cursor to zero, keeping the limit.
    pub fn rewind(&mut self) -> &mut Self {
        self.position = 0;
        self
    }

    /// Grows the buffer so at least `additional` bytes fit past the cursor.
    ///
    /// Contents and position are preserved; the limit moves to the new capacity.
    /// Capacity at least doubles on every growth so repeated appends stay linear.
    pub fn expand(&mut self, additional: usize) -> &mut Self {
        let needed = self.position + additional;
        if needed > self.data.len() {
            let new_capacity = needed.max(self.data.len() * 2);
            self.data.resize(new_capacity, 0);
        }
        self.limit = self.data.len();
        self
    }

    /// Copies `[0, limit)` out of the buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data[..self.limit].to_vec()
    }

    /// Copies `len` bytes starting at absolute `offset`.
    ///
    /// # Errors
    /// Returns `Error::Range` if the region extends past `limit`.
    pub fn raw_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let end = offset.checked_add(len).unwrap_or(usize::MAX);
        if end > self.limit {
            return Err(Error::Range { value: end, bound: self.limit });
        }
        Ok(self.data[offset..end].to_vec())
    }

    /// Borrows `[0, limit)`.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.limit]
    }

    /// Consumes the buffer, returning `[0, limit)`.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.limit);
        self.data
    }

    /// Reserves `n` bytes for writing at the cursor, returning their start.
    fn claim_write(&mut self, n: usize) -> Result<usize> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(Error::Overflow { needed: n, remaining });
        }
        let start = self.position;
        self.position += n;
        Ok(start)
    }

    /// Reserves `n` bytes for reading at the cursor, returning their start.
    fn claim_read(&mut self, n: usize) -> Result<usize> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(Error::Underflow { needed: n, remaining });
        }
        let start = self.position;
        self.position += n;
        Ok(start)
    }

    /// Checks an absolute region against the limit.
    fn check_absolute(&self, index: usize, width: usize) -> Result<()> {
        let end = index.checked_add(width).unwrap_or(usize::MAX);
        if end > self.limit {
            return Err(Error::Range { value: end, bound: self.limit });
        }
        Ok(())
    }

    /// Writes a single byte.
    pub fn put_u8(&mut self, v: u8) -> Result<&mut Self> {
        let start = self.claim_write(1)?;
        self.data[start] = v;
        Ok(self)
    }

    /// Reads a single byte.
    pub fn get_u8(&mut self) -> Result<u8> {
        let start = self.claim_read(1)?;
        Ok(self.data[start])
    }

    /// Writes a signed byte.
    pub fn put_i8(&mut self, v: i8) -> Result<&mut Self> {
        self.put_u8(v as u8)
    }

    /// Reads a signed byte.
    pub fn get_i8(&mut self) -> Result<i8> {
        Ok(self.get_u8()? as i8)
    }

    /// Writes a bool as one byte (`1` or `0`).
    pub fn put_bool(&mut self, v: bool) -> Result<&mut Self> {
        self.put_u8(v as u8)
    }

    /// Reads a bool. Any non-zero byte is `true`.
    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_u8()? != 0)
    }

    /// Writes a byte at an absolute index without moving the cursor.
    pub fn put_u8_at(&mut self, index: usize, v: u8) -> Result<&mut Self> {
        self.check_absolute(index, 1)?;
        self.data[index] = v;
        Ok(self)
    }

    /// Reads a byte at an absolute index without moving the cursor.
    pub fn get_u8_at(&self, index: usize) -> Result<u8> {
        self.check_absolute(index, 1)?;
        Ok(self.data[index])
    }

    /// Writes a byte sequence.
    pub fn put_bytes(&mut self, v: &[u8]) -> Result<&mut Self> {
        let start = self.claim_write(v.len())?;
        self.data[start..start + v.len()].copy_from_slice(v);
        Ok(self)
    }

    /// Reads `len` bytes.
    pub fn get_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let start = self.claim_read(len)?;
        Ok(self.data[start..start + len].to_vec())
    }

    /// Borrows `len` bytes at the cursor and advances past them.
    pub fn get_slice(&mut self, len: usize) -> Result<&[u8]> {
        let start = self.claim_read(len)?;
        Ok(&self.data[start..start + len])
    }

    /// Writes a signed byte sequence.
    pub fn put_i8_seq(&mut self, v: &[i8]) -> Result<&mut Self> {
        let start = self.claim_write(v.len())?;
        for (slot, b) in self.data[start..start + v.len()].iter_mut().zip(v) {
            *slot = *b as u8;
        }
        Ok(self)
    }

    /// Reads `count` signed bytes.
    pub fn get_i8_seq(&mut self, count: usize) -> Result<Vec<i8>> {
        let start = self.claim_read(count)?;
        Ok(self.data[start..start + count].iter().map(|b| *b as i8).collect())
    }

    /// Writes a bool sequence, one byte each.
    pub fn put_bool_seq(&mut self, v: &[bool]) -> Result<&mut Self> {
        let start = self.claim_write(v.len())?;
        for (slot, b) in self.data[start..start + v.len()].iter_mut().zip(v) {
            *slot = *b as u8;
        }
        Ok(self)
    }

    /// Reads `count` bools.
    pub fn get_bool_seq(&mut self, count: usize) -> Result<Vec<bool>> {
        let start = self.claim_read(count)?;
        Ok(self.data[start..start + count].iter().map(|b| *b != 0).collect())
    }

    for_each_multibyte!(impl_multibyte);
}

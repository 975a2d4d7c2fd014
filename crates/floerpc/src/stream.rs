//! # Wire Streams
//!
//! Typed readers and writers layered over `floepack::Buffer`.
//!
//! ## Format
//!
//! - **Scalars**: little-endian, fixed width.
//! - **Sizes**: one byte if `< 255`, otherwise `0xFF` followed by an `i32`.
//! - **Strings**: `[size][UTF-8 bytes]`.
//! - **Context**: `[size]` followed by that many `(key, value)` string pairs.
//! - **Encapsulation**: `[i32 total size][encoding major][encoding minor][body]`,
//!   where the size counts its own six header bytes.
//!
//! ## Invariants
//! - The output stream grows on demand; only size limits can fail a write.
//! - The input stream never reads past its bytes; every read is bounds-checked.

use floepack::Buffer;
use floepack::ByteOrder;

use crate::error::Error;
use crate::error::Result;
use crate::Context;
use crate::ENCAPS_HEADER_SIZE;
use crate::ENCODING_MAJOR;
use crate::ENCODING_MINOR;

const INITIAL_CAPACITY: usize = 256;

/// A growable little-endian writer.
#[derive(Debug, Clone)]
pub struct OutputStream {
    buf: Buffer,
    /// Start offsets of open encapsulations.
    encaps: Vec<usize>,
}

impl OutputStream {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut buf = Buffer::allocate(capacity);
        buf.set_order(ByteOrder::Little);
        Self { buf, encaps: Vec::new() }
    }

    /// Discards everything written so far, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.encaps.clear();
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.position()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.position() == 0
    }

    /// Borrows the bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf.as_slice()[..self.buf.position()]
    }

    /// Copies the bytes written so far.
    ///
    /// # Errors
    /// Returns `Error::Malformed` if an encapsulation is still open.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.encaps.is_empty() {
            return Err(Error::Malformed("encapsulation still open".into()));
        }
        Ok(self.as_bytes().to_vec())
    }

    fn ensure(&mut self, n: usize) {
        if self.buf.remaining() < n {
            self.buf.expand(n);
        }
    }

    pub fn write_byte(&mut self, v: u8) -> Result<()> {
        self.ensure(1);
        self.buf.put_u8(v)?;
        Ok(())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.ensure(1);
        self.buf.put_bool(v)?;
        Ok(())
    }

    pub fn write_short(&mut self, v: i16) -> Result<()> {
        self.ensure(2);
        self.buf.put_i16(v)?;
        Ok(())
    }

    pub fn write_int(&mut self, v: i32) -> Result<()> {
        self.ensure(4);
        self.buf.put_i32(v)?;
        Ok(())
    }

    pub fn write_long(&mut self, v: i64) -> Result<()> {
        self.ensure(8);
        self.buf.put_i64(v)?;
        Ok(())
    }

    pub fn write_float(&mut self, v: f32) -> Result<()> {
        self.ensure(4);
        self.buf.put_f32(v)?;
        Ok(())
    }

    pub fn write_double(&mut self, v: f64) -> Result<()> {
        self.ensure(8);
        self.buf.put_f64(v)?;
        Ok(())
    }

    /// Writes raw bytes with no size prefix.
    pub fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.ensure(v.len());
        self.buf.put_bytes(v)?;
        Ok(())
    }

    /// Writes a compact size.
    ///
    /// # Errors
    /// Returns `Error::SizeMismatch` if `size` does not fit in an `i32`.
    pub fn write_size(&mut self, size: usize) -> Result<()> {
        if size < 255 {
            return self.write_byte(size as u8);
        }
        let v = i32::try_from(size).map_err(|_| Error::SizeMismatch {
            declared: size,
            actual: i32::MAX as usize,
        })?;
        self.write_byte(255)?;
        self.write_int(v)
    }

    pub fn write_string(&mut self, v: &str) -> Result<()> {
        self.write_size(v.len())?;
        self.write_bytes(v.as_bytes())
    }

    pub fn write_string_seq<S: AsRef<str>>(&mut self, v: &[S]) -> Result<()> {
        self.write_size(v.len())?;
        for s in v {
            self.write_string(s.as_ref())?;
        }
        Ok(())
    }

    /// Writes a size-prefixed byte sequence.
    pub fn write_byte_seq(&mut self, v: &[u8]) -> Result<()> {
        self.write_size(v.len())?;
        self.write_bytes(v)
    }

    pub fn write_context(&mut self, ctx: &Context) -> Result<()> {
        self.write_size(ctx.len())?;
        for (key, value) in ctx {
            self.write_string(key)?;
            self.write_string(value)?;
        }
        Ok(())
    }

    /// Opens an encapsulation. The size is back-patched by `end_encaps`.
    pub fn start_encaps(&mut self) -> Result<()> {
        self.encaps.push(self.buf.position());
        self.write_int(0)?;
        self.write_byte(ENCODING_MAJOR)?;
        self.write_byte(ENCODING_MINOR)
    }

    /// Closes the innermost encapsulation and patches its size.
    pub fn end_encaps(&mut self) -> Result<()> {
        let start = self
            .encaps
            .pop()
            .ok_or_else(|| Error::Malformed("no open encapsulation".into()))?;
        let size = self.buf.position() - start;
        let size = i32::try_from(size).map_err(|_| Error::SizeMismatch {
            declared: size,
            actual: i32::MAX as usize,
        })?;
        self.buf.put_i32_at(start, size)?;
        Ok(())
    }

    /// Writes `body` as a complete encapsulation.
    pub fn write_encaps(&mut self, body: &[u8]) -> Result<()> {
        self.start_encaps()?;
        self.write_bytes(body)?;
        self.end_encaps()
    }

    /// Overwrites an `i32` already written at `index`.
    pub fn patch_int(&mut self, index: usize, v: i32) -> Result<()> {
        self.buf.put_i32_at(index, v)?;
        Ok(())
    }
}

impl Default for OutputStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounds of an encapsulation being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encaps {
    /// Absolute offset one past the encapsulation's last byte.
    pub end: usize,
    pub major: u8,
    pub minor: u8,
}

/// A bounds-checked little-endian reader over an owned frame.
#[derive(Debug, Clone)]
pub struct InputStream {
    buf: Buffer,
}

impl InputStream {
    pub fn new(bytes: Vec<u8>) -> Self {
        let mut buf = Buffer::wrap(bytes);
        buf.set_order(ByteOrder::Little);
        Self { buf }
    }

    pub fn pos(&self) -> usize {
        self.buf.position()
    }

    pub fn set_pos(&mut self, pos: usize) -> Result<()> {
        self.buf.set_position(pos)?;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Total number of bytes in the frame.
    pub fn len(&self) -> usize {
        self.buf.limit()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.limit() == 0
    }

    /// Copies `len` bytes at absolute `offset` without moving the cursor.
    pub fn raw_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        Ok(self.buf.raw_bytes(offset, len)?)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.buf.get_u8()?)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.buf.get_bool()?)
    }

    pub fn read_short(&mut self) -> Result<i16> {
        Ok(self.buf.get_i16()?)
    }

    pub fn read_int(&mut self) -> Result<i32> {
        Ok(self.buf.get_i32()?)
    }

    pub fn read_long(&mut self) -> Result<i64> {
        Ok(self.buf.get_i64()?)
    }

    pub fn read_float(&mut self) -> Result<f32> {
        Ok(self.buf.get_f32()?)
    }

    pub fn read_double(&mut self) -> Result<f64> {
        Ok(self.buf.get_f64()?)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(self.buf.get_bytes(len)?)
    }

    /// Reads a compact size.
    ///
    /// # Errors
    /// Returns `Error::NegativeSize` for a negative extended size.
    pub fn read_size(&mut self) -> Result<usize> {
        let b = self.read_byte()?;
        if b < 255 {
            return Ok(b as usize);
        }
        let v = self.read_int()?;
        if v < 0 {
            return Err(Error::NegativeSize(v));
        }
        Ok(v as usize)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_size()?;
        let bytes = self.buf.get_slice(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| Error::InvalidUtf8)
    }

    pub fn read_string_seq(&mut self) -> Result<Vec<String>> {
        let count = self.read_size()?;
        // Each string occupies at least one byte, so a larger count is a lie.
        if count > self.remaining() {
            return Err(Error::SizeMismatch { declared: count, actual: self.remaining() });
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_string()?);
        }
        Ok(out)
    }

    pub fn read_byte_seq(&mut self) -> Result<Vec<u8>> {
        let len = self.read_size()?;
        self.read_bytes(len)
    }

    pub fn read_context(&mut self) -> Result<Context> {
        let count = self.read_size()?;
        if count > self.remaining() {
            return Err(Error::SizeMismatch { declared: count, actual: self.remaining() });
        }
        let mut ctx = Context::new();
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_string()?;
            ctx.insert(key, value);
        }
        Ok(ctx)
    }

    /// Enters an encapsulation, validating its size and encoding version.
    pub fn start_encaps(&mut self) -> Result<Encaps> {
        let start = self.pos();
        let size = self.read_int()?;
        if size < 0 {
            return Err(Error::NegativeSize(size));
        }
        let size = size as usize;
        if size < ENCAPS_HEADER_SIZE {
            return Err(Error::Malformed(format!("encapsulation size {} below header size", size)));
        }
        let available = self.len() - start;
        if size > available {
            return Err(Error::SizeMismatch { declared: size, actual: available });
        }
        let major = self.read_byte()?;
        let minor = self.read_byte()?;
        if major != ENCODING_MAJOR || minor > ENCODING_MINOR {
            return Err(Error::UnsupportedEncoding { major, minor });
        }
        Ok(Encaps { end: start + size, major, minor })
    }

    /// Leaves an encapsulation; the body must have been fully consumed.
    pub fn end_encaps(&mut self, encaps: Encaps) -> Result<()> {
        if self.pos() != encaps.end {
            return Err(Error::SizeMismatch { declared: encaps.end, actual: self.pos() });
        }
        Ok(())
    }

    /// Reads an encapsulation and returns its body.
    pub fn read_encaps(&mut self) -> Result<Vec<u8>> {
        let encaps = self.start_encaps()?;
        let body = self.read_bytes(encaps.end - self.pos())?;
        self.end_encaps(encaps)?;
        Ok(body)
    }

    /// Skips an encapsulation, returning its raw bytes including the header.
    pub fn skip_encaps(&mut self) -> Result<Vec<u8>> {
        let start = self.pos();
        let encaps = self.start_encaps()?;
        self.set_pos(encaps.end)?;
        self.raw_bytes(start, encaps.end - start)
    }
}

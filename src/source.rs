//! Seekable byte source with typed little/big-endian reads.
//!
//! Every decoder consumes a [`Reader`]. Reads past the end of the buffer are
//! reported as [`BitmapError::UnexpectedEof`]; nothing ever reads out of
//! bounds or pads with zeros.

use crate::error::BitmapError;

/// Seek origin for [`Reader::seek`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekFrom {
    Start(u64),
    Current(i64),
    End(i64),
}

/// Cursor over an in-memory byte buffer.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// The whole underlying buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Bytes from the current position to the end, without consuming them.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Move the cursor. Targets outside `0..=len` are an error and leave the
    /// position unchanged.
    pub fn seek(&mut self, to: SeekFrom) -> Result<usize, BitmapError> {
        let target = match to {
            SeekFrom::Start(off) => i128::from(off),
            SeekFrom::Current(delta) => self.pos as i128 + i128::from(delta),
            SeekFrom::End(delta) => self.data.len() as i128 + i128::from(delta),
        };
        if target < 0 || target > self.data.len() as i128 {
            return Err(BitmapError::UnexpectedEof);
        }
        self.pos = target as usize;
        Ok(self.pos)
    }

    pub fn set_position(&mut self, pos: usize) -> Result<(), BitmapError> {
        if pos > self.data.len() {
            return Err(BitmapError::UnexpectedEof);
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), BitmapError> {
        let new_pos = self.pos.checked_add(n).ok_or(BitmapError::UnexpectedEof)?;
        self.set_position(new_pos)
    }

    /// Run `f` and restore the cursor afterwards, whatever `f` did.
    ///
    /// Format validators are written against this so that probing never
    /// consumes the stream.
    pub fn probe<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut Self) -> bool,
    {
        let saved = self.pos;
        let matched = f(self);
        self.pos = saved;
        matched
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], BitmapError> {
        let end = self.pos.checked_add(n).ok_or(BitmapError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(BitmapError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    /// Borrow the next `n` bytes without advancing.
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        self.data.get(self.pos..self.pos.checked_add(n)?)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), BitmapError> {
        let bytes = self.take(buf.len())?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BitmapError> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, BitmapError> {
        let b = *self.data.get(self.pos).ok_or(BitmapError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_i8(&mut self) -> Result<i8, BitmapError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, BitmapError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16_be(&mut self) -> Result<u16, BitmapError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16_le(&mut self) -> Result<i16, BitmapError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16_be(&mut self) -> Result<i16, BitmapError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, BitmapError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, BitmapError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, BitmapError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32_be(&mut self) -> Result<i32, BitmapError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_f32_le(&mut self) -> Result<f32, BitmapError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32_be(&mut self) -> Result<f32, BitmapError> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    /// Read a `u32` in the given byte order (`true` = big endian).
    pub fn read_u32_endian(&mut self, big_endian: bool) -> Result<u32, BitmapError> {
        if big_endian {
            self.read_u32_be()
        } else {
            self.read_u32_le()
        }
    }
}

//! Big-endian cursor over a fully buffered input.

use crate::error::ObjectStreamError;

/// A checked binary reader over a byte slice.
///
/// All multi-byte reads are network byte order. Reads past the end of
/// input fail with [`ObjectStreamError::UnexpectedEof`]; length-prefixed
/// payload reads are additionally bounded by `max_data_block_size` so an
/// attacker-chosen length cannot force a gigabyte allocation.
pub struct StreamReader<'a> {
    data: &'a [u8],
    x: usize,
    max_data_block_size: usize,
}

impl<'a> StreamReader<'a> {
    /// Creates a reader whose block-size limit equals the input length.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            x: 0,
            max_data_block_size: data.len(),
        }
    }

    pub fn with_max_block_size(data: &'a [u8], max_data_block_size: usize) -> Self {
        Self {
            data,
            x: 0,
            max_data_block_size,
        }
    }

    /// Current offset into the input.
    pub fn position(&self) -> usize {
        self.x
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.x
    }

    pub fn max_data_block_size(&self) -> usize {
        self.max_data_block_size
    }

    fn require(&self, n: usize) -> Result<(), ObjectStreamError> {
        if n > self.data.len() - self.x {
            return Err(ObjectStreamError::UnexpectedEof);
        }
        Ok(())
    }

    /// Returns the next byte without advancing the cursor.
    pub fn peek(&self) -> Result<u8, ObjectStreamError> {
        self.require(1)?;
        Ok(self.data[self.x])
    }

    /// Consumes and returns `n` raw bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ObjectStreamError> {
        self.require(n)?;
        let out = &self.data[self.x..self.x + n];
        self.x += n;
        Ok(out)
    }

    /// Consumes `n` bytes of length-prefixed payload, enforcing the
    /// block-size limit before touching the input.
    pub fn block(&mut self, n: usize) -> Result<&'a [u8], ObjectStreamError> {
        if n > self.max_data_block_size {
            return Err(ObjectStreamError::BlockTooLarge {
                size: n,
                limit: self.max_data_block_size,
            });
        }
        self.take(n)
    }

    #[inline]
    pub fn u8(&mut self) -> Result<u8, ObjectStreamError> {
        self.require(1)?;
        let val = self.data[self.x];
        self.x += 1;
        Ok(val)
    }

    #[inline]
    pub fn i8(&mut self) -> Result<i8, ObjectStreamError> {
        Ok(self.u8()? as i8)
    }

    #[inline]
    pub fn u16(&mut self) -> Result<u16, ObjectStreamError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    #[inline]
    pub fn i16(&mut self) -> Result<i16, ObjectStreamError> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    #[inline]
    pub fn u32(&mut self) -> Result<u32, ObjectStreamError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    #[inline]
    pub fn i32(&mut self) -> Result<i32, ObjectStreamError> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    #[inline]
    pub fn u64(&mut self) -> Result<u64, ObjectStreamError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    #[inline]
    pub fn i64(&mut self) -> Result<i64, ObjectStreamError> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    #[inline]
    pub fn f32(&mut self) -> Result<f32, ObjectStreamError> {
        Ok(f32::from_bits(self.u32()?))
    }

    #[inline]
    pub fn f64(&mut self) -> Result<f64, ObjectStreamError> {
        Ok(f64::from_bits(self.u64()?))
    }
}

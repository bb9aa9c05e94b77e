//! Cursor-based binary reader over an in-memory buffer

use crate::error::{AssetError, Result};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Byte order for reading binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Big endian (network byte order, used by the CRI containers)
    #[default]
    Big,
    /// Little endian
    Little,
}

/// Binary reader for the container formats
///
/// All reads are bounds-checked and fail with [`AssetError::NotEnoughData`]
/// instead of panicking. Slices returned by the `*_at` helpers borrow the
/// backing buffer, so nothing is copied until a caller asks for ownership.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    cursor: Cursor<&'a [u8]>,
    byte_order: ByteOrder,
}

/// Byte-order dependent reads, one method per primitive
macro_rules! read_ordered {
    ($($(#[$doc:meta])* $name:ident -> $ty:ty, $width:literal;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self) -> Result<$ty> {
                self.ensure($width)?;
                Ok(match self.byte_order {
                    ByteOrder::Big => self.cursor.$name::<BigEndian>()?,
                    ByteOrder::Little => self.cursor.$name::<LittleEndian>()?,
                })
            }
        )*
    };
}

impl<'a> BinaryReader<'a> {
    /// Create a new binary reader from byte slice
    pub fn new(data: &'a [u8], byte_order: ByteOrder) -> Self {
        Self {
            cursor: Cursor::new(data),
            byte_order,
        }
    }

    /// Get current position in the stream
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Set position in the stream
    pub fn set_position(&mut self, pos: u64) -> Result<()> {
        if pos > self.len() as u64 {
            return Err(AssetError::format(format!(
                "seek to {:#x} past end of {:#x}-byte buffer",
                pos,
                self.len()
            )));
        }
        self.cursor.set_position(pos);
        Ok(())
    }

    /// Skip `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.ensure(count)?;
        self.cursor.set_position(self.position() + count as u64);
        Ok(())
    }

    /// Get the total length of the data
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    /// Check if the reader is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get remaining bytes from current position
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position() as usize)
    }

    /// Check if we have at least `count` bytes remaining
    pub fn has_bytes(&self, count: usize) -> bool {
        self.remaining() >= count
    }

    /// Fail unless `count` more bytes are available
    fn ensure(&self, count: usize) -> Result<()> {
        if self.has_bytes(count) {
            Ok(())
        } else {
            Err(AssetError::not_enough_data(count, self.remaining()))
        }
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.cursor.read_u8()?)
    }

    /// Read a signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        self.ensure(1)?;
        Ok(self.cursor.read_i8()?)
    }

    read_ordered! {
        /// Read an unsigned 16-bit integer
        read_u16 -> u16, 2;
        /// Read a signed 16-bit integer
        read_i16 -> i16, 2;
        /// Read an unsigned 32-bit integer
        read_u32 -> u32, 4;
        /// Read a signed 32-bit integer
        read_i32 -> i32, 4;
        /// Read an unsigned 64-bit integer
        read_u64 -> u64, 8;
        /// Read a signed 64-bit integer
        read_i64 -> i64, 8;
        /// Read a 32-bit float
        read_f32 -> f32, 4;
        /// Read a 64-bit float
        read_f64 -> f64, 8;
    }

    /// Read an unsigned integer of `width` bytes (1, 2, 4 or 8)
    pub fn read_uint_sized(&mut self, width: usize) -> Result<u64> {
        match width {
            1 => Ok(self.read_u8()? as u64),
            2 => Ok(self.read_u16()? as u64),
            4 => Ok(self.read_u32()? as u64),
            8 => self.read_u64(),
            other => Err(AssetError::unsupported(format!(
                "{}-byte integer fields",
                other
            ))),
        }
    }

    /// Read a fixed number of bytes, borrowing them from the buffer
    pub fn read_slice(&mut self, count: usize) -> Result<&'a [u8]> {
        self.ensure(count)?;
        let start = self.position() as usize;
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + count) as u64);
        Ok(&data[start..start + count])
    }

    /// Read a 4-byte block signature and check it
    pub fn expect_signature(&mut self, expected: &[u8]) -> Result<()> {
        let found = self.read_slice(expected.len())?;
        if found != expected {
            return Err(AssetError::invalid_signature(
                String::from_utf8_lossy(expected).into_owned(),
                String::from_utf8_lossy(found).into_owned(),
            ));
        }
        Ok(())
    }

    /// Look at the next `count` bytes without moving the cursor
    pub fn peek_slice(&self, count: usize) -> Option<&'a [u8]> {
        let start = self.position() as usize;
        let data: &'a [u8] = *self.cursor.get_ref();
        data.get(start..start.checked_add(count)?)
    }

    /// Borrow `count` bytes at an absolute offset without moving the cursor
    pub fn slice_at(&self, offset: usize, count: usize) -> Result<&'a [u8]> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let end = offset
            .checked_add(count)
            .ok_or_else(|| AssetError::format("offset overflow"))?;
        data.get(offset..end)
            .ok_or_else(|| AssetError::not_enough_data(end, data.len()))
    }

    /// Borrow the NUL-terminated byte run at an absolute offset (terminator excluded)
    pub fn cstring_at(&self, offset: usize) -> Result<&'a [u8]> {
        cstring_run(*self.cursor.get_ref(), offset)
    }
}

/// NUL-terminated run starting at `offset`; a missing terminator is a format error
fn cstring_run(data: &[u8], offset: usize) -> Result<&[u8]> {
    let tail = data
        .get(offset..)
        .ok_or_else(|| AssetError::not_enough_data(offset, data.len()))?;
    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| AssetError::format(format!("unterminated string at {:#x}", offset)))?;
    Ok(&tail[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_reading() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = BinaryReader::new(&data, ByteOrder::Little);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u8().unwrap(), 0x02);
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn test_endianness() {
        let data = [0x01, 0x02, 0x03, 0x04];

        let mut reader_le = BinaryReader::new(&data, ByteOrder::Little);
        assert_eq!(reader_le.read_u32().unwrap(), 0x04030201);

        let mut reader_be = BinaryReader::new(&data, ByteOrder::Big);
        assert_eq!(reader_be.read_u32().unwrap(), 0x01020304);
    }

    #[test]
    fn test_string_reading() {
        let data = b"Hello\0World\0tail";
        let reader = BinaryReader::new(data, ByteOrder::Big);

        assert_eq!(reader.cstring_at(0).unwrap(), b"Hello");
        assert_eq!(reader.cstring_at(6).unwrap(), b"World");
        assert_eq!(reader.position(), 0);
        assert!(matches!(reader.cstring_at(12), Err(AssetError::Format(_))));
        assert!(reader.cstring_at(64).is_err());
    }

    #[test]
    fn test_truncated_read_is_an_error() {
        let data = [0x01, 0x02];
        let mut reader = BinaryReader::new(&data, ByteOrder::Big);
        assert!(matches!(
            reader.read_u32(),
            Err(AssetError::NotEnoughData {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_signed_and_float_reads() {
        let data = [0xFF, 0xFF, 0xFE, 0x3F, 0x80, 0x00, 0x00];
        let mut reader = BinaryReader::new(&data, ByteOrder::Big);

        assert_eq!(reader.read_i8().unwrap(), -1);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_f32().unwrap(), 1.0);
        assert!(reader.read_i8().is_err());
    }

    #[test]
    fn test_sized_uint_and_skip() {
        let data = [0x00, 0x10, 0xAA, 0x00, 0x00, 0x00, 0x20];
        let mut reader = BinaryReader::new(&data, ByteOrder::Big);

        assert_eq!(reader.read_uint_sized(2).unwrap(), 0x10);
        reader.skip(1).unwrap();
        assert_eq!(reader.read_uint_sized(4).unwrap(), 0x20);
        assert!(reader.skip(1).is_err());
        assert!(matches!(
            reader.read_uint_sized(3),
            Err(AssetError::UnsupportedFormat(_))
        ));
        assert!(reader.set_position(8).is_err());
    }

    #[test]
    fn test_signature_and_peek() {
        let data = b"@SFV\0\0\0\x10";
        let mut reader = BinaryReader::new(data, ByteOrder::Big);
        assert_eq!(reader.peek_slice(4), Some(&b"@SFV"[..]));
        reader.expect_signature(b"@SFV").unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0x10);

        let mut reader = BinaryReader::new(data, ByteOrder::Big);
        assert!(matches!(
            reader.expect_signature(b"@SFA"),
            Err(AssetError::InvalidSignature { .. })
        ));
    }
}

//! Positioned big-endian reader over a file or an in-memory buffer.
//!
//! Every read is bounds-checked against the length of the source before
//! touching the underlying reader, so running out of input is reported as
//! [`Error::Truncated`] with the absolute offset instead of a bare
//! `UnexpectedEof`.

use crate::{Error, Result};
use bitstream_io::{BigEndian, BitRead, BitReader};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Cursor over an in-memory buffer, as produced by [`BinaryCursor::sub_cursor`].
pub type MemoryCursor = BinaryCursor<Cursor<Bytes>>;

/// Cursor over a file opened with [`FileCursor::open`].
pub type FileCursor = BinaryCursor<BufReader<File>>;

/// Big-endian bit/byte reader tracking an absolute byte offset.
pub struct BinaryCursor<R: Read> {
    reader: BitReader<R, BigEndian>,
    /// Absolute offset of the first readable byte.
    base: u64,
    /// Number of readable bytes starting at `base`.
    len: u64,
    /// Bits consumed since `base`.
    consumed_bits: u64,
}

impl FileCursor {
    /// Open `path` and position the cursor at byte `offset`.
    ///
    /// An offset past the end of the file yields an empty cursor.
    pub fn open<P: AsRef<Path>>(path: P, offset: u64) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let start = offset.min(file_size);
        reader.seek(SeekFrom::Start(start))?;
        Ok(Self::with_base(reader, offset, file_size.saturating_sub(offset)))
    }
}

impl MemoryCursor {
    /// Create a cursor over an in-memory buffer starting at offset 0.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = data.len() as u64;
        Self::with_base(Cursor::new(data), 0, len)
    }
}

impl<R: Read> BinaryCursor<R> {
    /// Wrap a reader whose first byte lives at absolute offset `base`.
    pub fn with_base(reader: R, base: u64, len: u64) -> Self {
        Self {
            reader: BitReader::endian(reader, BigEndian),
            base,
            len,
            consumed_bits: 0,
        }
    }

    /// Absolute byte offset of the next read.
    pub fn position(&self) -> u64 {
        self.base + self.consumed_bits / 8
    }

    /// Bytes left before the end of the source.
    pub fn remaining(&self) -> u64 {
        self.len - self.consumed_bits.div_ceil(8)
    }

    /// Whether the cursor has consumed its whole source.
    pub fn is_empty(&self) -> bool {
        self.consumed_bits >= self.len * 8
    }

    fn ensure_bits(&self, bits: u64) -> Result<()> {
        let available_bits = self.len * 8 - self.consumed_bits;
        if bits > available_bits {
            return Err(Error::Truncated {
                offset: self.position(),
                needed: bits.div_ceil(8),
                available: available_bits / 8,
            });
        }
        Ok(())
    }

    fn ensure_bytes(&self, len: u64) -> Result<()> {
        let available = (self.len * 8 - self.consumed_bits) / 8;
        if len > available {
            return Err(Error::Truncated {
                offset: self.position(),
                needed: len,
                available,
            });
        }
        Ok(())
    }

    fn read_uint<U: bitstream_io::Numeric>(&mut self, bits: u32) -> Result<U> {
        self.ensure_bits(bits as u64)?;
        let value = self.reader.read::<U>(bits)?;
        self.consumed_bits += bits as u64;
        Ok(value)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_uint(8)
    }

    /// Read a big-endian 16-bit integer.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_uint(16)
    }

    /// Read a big-endian 24-bit integer, as used for box flags.
    pub fn read_u24(&mut self) -> Result<u32> {
        self.read_uint(24)
    }

    /// Read a big-endian 32-bit integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_uint(32)
    }

    /// Read a big-endian 64-bit integer.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_uint(64)
    }

    /// Read an unsigned value of `bits` width (at most 32).
    pub fn read_bits(&mut self, bits: u32) -> Result<u32> {
        self.read_uint(bits)
    }

    /// Read a single bit as a boolean flag.
    pub fn read_flag(&mut self) -> Result<bool> {
        self.ensure_bits(1)?;
        let bit = self.reader.read_bit()?;
        self.consumed_bits += 1;
        Ok(bit)
    }

    /// Skip padding bits.
    pub fn skip_bits(&mut self, bits: u32) -> Result<()> {
        self.ensure_bits(bits as u64)?;
        self.reader.skip(bits)?;
        self.consumed_bits += bits as u64;
        Ok(())
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: u64) -> Result<Bytes> {
        self.ensure_bytes(len)?;
        let mut buf = vec![0u8; len as usize];
        self.reader.read_bytes(&mut buf)?;
        self.consumed_bits += len * 8;
        Ok(Bytes::from(buf))
    }

    /// Read `len` bytes and return them as an independent cursor.
    ///
    /// The nested cursor keeps reporting absolute offsets, and whatever it
    /// leaves unread cannot desynchronize this one.
    pub fn sub_cursor(&mut self, len: u64) -> Result<MemoryCursor> {
        let base = self.position();
        let data = self.read_bytes(len)?;
        Ok(BinaryCursor::with_base(Cursor::new(data), base, len))
    }

    /// Read a null-terminated UTF-8 string. The terminator is consumed and
    /// not included; an immediate terminator yields an empty string.
    pub fn read_cstring(&mut self) -> Result<String> {
        let start = self.position();
        let mut buf = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                byte => buf.push(byte),
            }
        }
        String::from_utf8(buf).map_err(|_| Error::InvalidString { offset: start })
    }

    /// Read a null-terminated string, mapping the empty string to `None`.
    pub fn read_optional_cstring(&mut self) -> Result<Option<String>> {
        let s = self.read_cstring()?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }

    /// Read a one-byte count followed by that many null-terminated strings.
    pub fn read_string_table(&mut self) -> Result<Vec<String>> {
        let count = self.read_u8()?;
        let mut table = Vec::with_capacity(count as usize);
        for _ in 0..count {
            table.push(self.read_cstring()?);
        }
        Ok(table)
    }
}

impl<R: Read + Seek> BinaryCursor<R> {
    /// Skip `len` bytes without materializing them.
    pub fn skip(&mut self, len: u64) -> Result<()> {
        self.ensure_bytes(len)?;
        // ensure_bytes bounds len by the source length, which fits in i64
        let delta = len as i64;
        let seeked = match self.reader.reader() {
            Some(inner) => {
                inner.seek(SeekFrom::Current(delta))?;
                true
            }
            None => false,
        };
        if !seeked {
            let mut left = len * 8;
            while left > 0 {
                let step = left.min(u32::MAX as u64 & !7);
                self.reader.skip(step as u32)?;
                left -= step;
            }
        }
        self.consumed_bits += len * 8;
        Ok(())
    }
}

impl<R: Read> std::fmt::Debug for BinaryCursor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryCursor")
            .field("position", &self.position())
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian_widths() {
        let mut cursor = MemoryCursor::from_bytes(vec![
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E,
            0x0F, 0x10, 0x11, 0x12,
        ]);
        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u16().unwrap(), 0x0203);
        assert_eq!(cursor.read_u24().unwrap(), 0x040506);
        assert_eq!(cursor.read_u32().unwrap(), 0x0708090A);
        assert_eq!(cursor.read_u64().unwrap(), 0x0B0C0D0E0F101112);
        assert!(cursor.is_empty());
        assert_eq!(cursor.position(), 18);
    }

    #[test]
    fn test_flags_and_padding() {
        // 101 00000 then 0xFF
        let mut cursor = MemoryCursor::from_bytes(vec![0b1010_0000, 0xFF]);
        assert!(cursor.read_flag().unwrap());
        assert!(!cursor.read_flag().unwrap());
        assert!(cursor.read_flag().unwrap());
        cursor.skip_bits(5).unwrap();
        assert_eq!(cursor.position(), 1);
        assert_eq!(cursor.read_u8().unwrap(), 0xFF);
    }

    #[test]
    fn test_truncated_reports_offset() {
        let mut cursor = MemoryCursor::from_bytes(vec![0x00, 0x01, 0x02]);
        cursor.read_u16().unwrap();
        match cursor.read_u32() {
            Err(Error::Truncated {
                offset,
                needed,
                available,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(needed, 4);
                assert_eq!(available, 1);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[test]
    fn test_cstring_and_string_table() {
        let mut cursor = MemoryCursor::from_bytes(b"\0abc\0\x02hi\0\0".to_vec());
        assert_eq!(cursor.read_cstring().unwrap(), "");
        assert_eq!(cursor.read_optional_cstring().unwrap().as_deref(), Some("abc"));
        assert_eq!(cursor.read_string_table().unwrap(), vec!["hi".to_string(), String::new()]);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_unterminated_string_is_truncated() {
        let mut cursor = MemoryCursor::from_bytes(b"abc".to_vec());
        assert!(cursor.read_cstring().unwrap_err().is_truncated());
    }

    #[test]
    fn test_sub_cursor_keeps_absolute_offsets() {
        let mut cursor = MemoryCursor::from_bytes(vec![0xAA, 0x01, 0x02, 0x03, 0xBB]);
        cursor.read_u8().unwrap();
        let mut sub = cursor.sub_cursor(3).unwrap();
        assert_eq!(sub.position(), 1);
        assert_eq!(sub.read_u8().unwrap(), 0x01);
        // Leaving bytes unread in the sub cursor does not affect the parent.
        assert_eq!(cursor.read_u8().unwrap(), 0xBB);
        let err = sub.read_u32().unwrap_err();
        assert!(matches!(err, Error::Truncated { offset: 2, .. }));
    }

    #[test]
    fn test_skip() {
        let mut cursor = MemoryCursor::from_bytes(vec![0, 1, 2, 3, 4, 5]);
        cursor.skip(4).unwrap();
        assert_eq!(cursor.read_u8().unwrap(), 4);
        assert!(cursor.skip(2).unwrap_err().is_truncated());
    }

    #[test]
    fn test_open_file_at_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [9u8, 8, 7, 6, 5]).unwrap();

        let mut cursor = FileCursor::open(&path, 2).unwrap();
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.remaining(), 3);
        assert_eq!(cursor.read_u8().unwrap(), 7);

        let past_end = FileCursor::open(&path, 10).unwrap();
        assert!(past_end.is_empty());
    }
}

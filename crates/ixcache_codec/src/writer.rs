//! Primitive little-endian writer.

use crate::error::{CodecError, CodecResult};
use bytes::{BufMut, BytesMut};

/// Writes primitive values into a borrowed buffer.
///
/// All integers are little-endian. Variable-length fields carry an explicit
/// length prefix where zero means "absent". Regions reserve a `u32` length
/// prefix that is backpatched once the body has been written.
pub struct PrimitiveWriter<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> PrimitiveWriter<'a> {
    /// Create a writer appending to `buf`.
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    /// Number of bytes in the underlying buffer.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..]
    }

    /// Write a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Write a boolean as one byte.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    /// Write a `u16`.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    /// Write an `i16`.
    #[inline]
    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16_le(value);
    }

    /// Write a `u32`.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Write an `i32`.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    /// Write a `u64`.
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    /// Write an `i64`.
    #[inline]
    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64_le(value);
    }

    /// Write an `f64`.
    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    /// Write raw bytes without a prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a byte field with a `u16` length prefix.
    pub fn write_bytes_u16(&mut self, field: &'static str, bytes: &[u8]) -> CodecResult<()> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| CodecError::length_overflow(field, bytes.len(), u16::MAX as usize))?;
        self.write_u16(len);
        self.write_raw(bytes);
        Ok(())
    }

    /// Write a byte field with an `i32` length prefix.
    pub fn write_bytes_i32(&mut self, field: &'static str, bytes: &[u8]) -> CodecResult<()> {
        self.write_count_i32(field, bytes.len())?;
        self.write_raw(bytes);
        Ok(())
    }

    /// Write a UTF-8 string with a `u32` length prefix. Empty means absent.
    pub fn write_string(&mut self, field: &'static str, value: &str) -> CodecResult<()> {
        let len = u32::try_from(value.len())
            .map_err(|_| CodecError::length_overflow(field, value.len(), u32::MAX as usize))?;
        self.write_u32(len);
        self.write_raw(value.as_bytes());
        Ok(())
    }

    /// Write an element count as a single byte.
    pub fn write_count_u8(&mut self, field: &'static str, count: usize) -> CodecResult<()> {
        let count = u8::try_from(count)
            .map_err(|_| CodecError::length_overflow(field, count, u8::MAX as usize))?;
        self.write_u8(count);
        Ok(())
    }

    /// Write an element count as a `u16`.
    pub fn write_count_u16(&mut self, field: &'static str, count: usize) -> CodecResult<()> {
        let count = u16::try_from(count)
            .map_err(|_| CodecError::length_overflow(field, count, u16::MAX as usize))?;
        self.write_u16(count);
        Ok(())
    }

    /// Write an element count as an `i32`.
    pub fn write_count_i32(&mut self, field: &'static str, count: usize) -> CodecResult<()> {
        let count = i32::try_from(count)
            .map_err(|_| CodecError::length_overflow(field, count, i32::MAX as usize))?;
        self.write_i32(count);
        Ok(())
    }

    /// Write a length-prefixed region whose body is produced by `body`.
    ///
    /// The `u32` prefix is reserved up front and patched with the body
    /// length once `body` returns.
    pub fn region<F>(&mut self, body: F) -> CodecResult<()>
    where
        F: FnOnce(&mut PrimitiveWriter<'_>) -> CodecResult<()>,
    {
        let start = self.buf.len();
        self.buf.put_u32_le(0);
        body(&mut PrimitiveWriter::new(&mut *self.buf))?;
        let body_len = self.buf.len() - start - 4;
        let len = u32::try_from(body_len)
            .map_err(|_| CodecError::length_overflow("region", body_len, u32::MAX as usize))?;
        self.buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_little_endian() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.write_u16(0x0102);
        w.write_i32(-2);
        assert_eq!(&buf[..], &[0x02, 0x01, 0xfe, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn region_backpatches_length() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.region(|body| {
            body.write_u8(7);
            body.write_u16(9);
            Ok(())
        })
        .unwrap();
        assert_eq!(&buf[..4], &3u32.to_le_bytes());
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn nested_regions() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.region(|outer| {
            outer.write_u8(1);
            outer.region(|inner| {
                inner.write_u32(5);
                Ok(())
            })
        })
        .unwrap();
        assert_eq!(&buf[..4], &9u32.to_le_bytes());
        assert_eq!(&buf[5..9], &4u32.to_le_bytes());
    }

    #[test]
    fn oversized_u16_field_is_rejected() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        let big = vec![0u8; u16::MAX as usize + 1];
        let err = w.write_bytes_u16("item_id", &big).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthOverflow {
                field: "item_id",
                ..
            }
        ));
    }

    #[test]
    fn tag_count_limited_to_one_byte() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        assert!(w.write_count_u8("tags", 255).is_ok());
        assert!(w.write_count_u8("tags", 256).is_err());
    }
}

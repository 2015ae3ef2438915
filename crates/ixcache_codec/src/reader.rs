//! Primitive little-endian reader.

use crate::error::{CodecError, CodecResult};

/// Maximum length accepted for a single byte or string field.
/// Bounds allocations driven by untrusted length prefixes.
pub const MAX_FIELD_LENGTH: u64 = 256 * 1024 * 1024;

/// Reads primitive values from a byte slice.
///
/// The reader never allocates for fixed-width values and validates every
/// length prefix against the remaining input before slicing.
#[derive(Debug, Clone)]
pub struct PrimitiveReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PrimitiveReader<'a> {
    /// Create a reader over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Fail unless every byte has been consumed.
    pub fn expect_end(&self) -> CodecResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CodecError::malformed(format!(
                "{} trailing bytes after message",
                self.remaining()
            )))
        }
    }

    /// Read raw bytes without a prefix.
    #[inline]
    pub fn read_raw(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let bytes = self.read_raw(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a boolean. Only 0 and 1 are accepted.
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(CodecError::InvalidBool { value }),
        }
    }

    /// Read a `u16`.
    pub fn read_u16(&mut self) -> CodecResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read an `i16`.
    pub fn read_i16(&mut self) -> CodecResult<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    /// Read a `u32`.
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read an `i32`.
    pub fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read a `u64`.
    pub fn read_u64(&mut self) -> CodecResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read an `i64`.
    pub fn read_i64(&mut self) -> CodecResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read an `f64`.
    pub fn read_f64(&mut self) -> CodecResult<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    fn checked_len(&self, claimed: u64) -> CodecResult<usize> {
        if claimed > MAX_FIELD_LENGTH {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed: MAX_FIELD_LENGTH,
            });
        }
        let len = claimed as usize;
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(len)
    }

    /// Read a byte field with a `u16` length prefix.
    pub fn read_bytes_u16(&mut self) -> CodecResult<Vec<u8>> {
        let len = self.read_u16()?;
        Ok(self.read_raw(usize::from(len))?.to_vec())
    }

    /// Read a byte field with an `i32` length prefix.
    pub fn read_bytes_i32(&mut self, field: &'static str) -> CodecResult<Vec<u8>> {
        let len = self.read_count_i32(field)?;
        let len = self.checked_len(len as u64)?;
        Ok(self.read_raw(len)?.to_vec())
    }

    /// Read a UTF-8 string with a `u32` length prefix.
    pub fn read_string(&mut self, field: &'static str) -> CodecResult<String> {
        let claimed = self.read_u32()?;
        let len = self.checked_len(u64::from(claimed))?;
        let bytes = self.read_raw(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 { field })
    }

    /// Read a single-byte element count.
    pub fn read_count_u8(&mut self) -> CodecResult<usize> {
        Ok(usize::from(self.read_u8()?))
    }

    /// Read a `u16` element count.
    pub fn read_count_u16(&mut self) -> CodecResult<usize> {
        Ok(usize::from(self.read_u16()?))
    }

    /// Read an `i32` element count. Negative counts are malformed.
    pub fn read_count_i32(&mut self, field: &'static str) -> CodecResult<usize> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(CodecError::malformed(format!(
                "negative count {count} for field '{field}'"
            )));
        }
        if count as u64 > MAX_FIELD_LENGTH {
            return Err(CodecError::SizeLimitExceeded {
                claimed: count as u64,
                max_allowed: MAX_FIELD_LENGTH,
            });
        }
        Ok(count as usize)
    }

    /// Capacity hint for a collection of `count` elements that each take at
    /// least `min_element_size` bytes. Never trusts the prefix beyond what
    /// the remaining input could hold.
    pub fn capacity_hint(&self, count: usize, min_element_size: usize) -> usize {
        count.min(self.remaining() / min_element_size.max(1))
    }

    /// Read a length-prefixed region and decode its body with `body`.
    ///
    /// The body decoder sees only the bytes inside the region and must
    /// consume all of them. Reading past the region end is reported as
    /// [`CodecError::RegionOverrun`]; bytes left unread make the region
    /// [`CodecError::Malformed`].
    pub fn region<T, F>(&mut self, type_name: &'static str, body: F) -> CodecResult<T>
    where
        F: FnOnce(&mut PrimitiveReader<'a>) -> CodecResult<T>,
    {
        let mut sub = self.enter_region()?;
        let value = body(&mut sub).map_err(|e| match e {
            CodecError::UnexpectedEof => CodecError::RegionOverrun { type_name },
            other => other,
        })?;
        if !sub.is_empty() {
            return Err(CodecError::malformed(format!(
                "{} unread bytes at the end of {type_name}",
                sub.remaining()
            )));
        }
        Ok(value)
    }

    /// Split off the next region as an independent reader.
    ///
    /// This reader advances past the whole region immediately; the returned
    /// reader can then be consumed lazily, e.g. one entry at a time. Whatever
    /// the caller leaves unread is skipped.
    pub fn enter_region(&mut self) -> CodecResult<PrimitiveReader<'a>> {
        let claimed = self.read_u32()?;
        let len = self.checked_len(u64::from(claimed))?;
        let sub = PrimitiveReader::new(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        Ok(sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::PrimitiveWriter;
    use bytes::BytesMut;

    #[test]
    fn reads_what_writer_wrote() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.write_u8(3);
        w.write_bool(true);
        w.write_i16(-5);
        w.write_u32(77);
        w.write_i64(-9);
        w.write_f64(1.5);
        w.write_string("name", "héllo").unwrap();
        w.write_bytes_u16("id", &[1, 2, 3]).unwrap();

        let mut r = PrimitiveReader::new(&buf);
        assert_eq!(r.read_u8().unwrap(), 3);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_i16().unwrap(), -5);
        assert_eq!(r.read_u32().unwrap(), 77);
        assert_eq!(r.read_i64().unwrap(), -9);
        assert_eq!(r.read_f64().unwrap(), 1.5);
        assert_eq!(r.read_string("name").unwrap(), "héllo");
        assert_eq!(r.read_bytes_u16().unwrap(), vec![1, 2, 3]);
        assert!(r.expect_end().is_ok());
    }

    #[test]
    fn bool_rejects_other_bytes() {
        let mut r = PrimitiveReader::new(&[2]);
        assert_eq!(r.read_bool(), Err(CodecError::InvalidBool { value: 2 }));
    }

    #[test]
    fn truncated_input() {
        let mut r = PrimitiveReader::new(&[1, 2]);
        assert_eq!(r.read_u32(), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn region_rejects_unread_tail() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.region(|b| {
            b.write_u16(42);
            b.write_u64(0xdead_beef);
            Ok(())
        })
        .unwrap();
        w.write_u8(9);

        let mut r = PrimitiveReader::new(&buf);
        let err = r.region("Test", |b| b.read_u16()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn entered_region_skips_unread_tail() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.region(|b| {
            b.write_u16(42);
            b.write_u64(0xdead_beef);
            Ok(())
        })
        .unwrap();
        w.write_u8(9);

        let mut r = PrimitiveReader::new(&buf);
        let mut body = r.enter_region().unwrap();
        assert_eq!(body.read_u16().unwrap(), 42);
        assert_eq!(r.read_u8().unwrap(), 9);
        assert!(r.expect_end().is_ok());
    }

    #[test]
    fn region_overrun_is_malformed() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.region(|b| {
            b.write_u8(1);
            Ok(())
        })
        .unwrap();
        w.write_u32(123);

        let mut r = PrimitiveReader::new(&buf);
        let err = r.region("Test", |b| b.read_u32()).unwrap_err();
        assert_eq!(err, CodecError::RegionOverrun { type_name: "Test" });
    }

    #[test]
    fn region_length_beyond_input() {
        let data = 100u32.to_le_bytes();
        let mut r = PrimitiveReader::new(&data);
        assert_eq!(
            r.region("Test", |b| b.read_u8()),
            Err(CodecError::UnexpectedEof)
        );
    }

    #[test]
    fn negative_count_is_malformed() {
        let data = (-1i32).to_le_bytes();
        let mut r = PrimitiveReader::new(&data);
        assert!(matches!(
            r.read_count_i32("items"),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn invalid_utf8_names_field() {
        let mut data = 2u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0xff, 0xfe]);
        let mut r = PrimitiveReader::new(&data);
        assert_eq!(
            r.read_string("target_index_name"),
            Err(CodecError::InvalidUtf8 {
                field: "target_index_name"
            })
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn region_with_extra_bytes_is_malformed(
                name in ".{0,40}",
                extra in prop::collection::vec(any::<u8>(), 1..64),
                trailer in any::<u8>(),
            ) {
                let mut buf = BytesMut::new();
                let mut w = PrimitiveWriter::new(&mut buf);
                w.region(|body| {
                    body.write_string("name", &name)?;
                    body.write_raw(&extra);
                    Ok(())
                })
                .unwrap();
                w.write_u8(trailer);

                let mut r = PrimitiveReader::new(&buf);
                let read = r.region("Test", |b| b.read_string("name"));
                prop_assert!(
                    matches!(read, Err(CodecError::Malformed { .. })),
                    "unexpected {:?}",
                    read
                );

                let mut r = PrimitiveReader::new(&buf);
                let mut body = r.enter_region().unwrap();
                prop_assert_eq!(body.read_string("name").unwrap(), name);
                prop_assert_eq!(r.read_u8().unwrap(), trailer);
            }

            #[test]
            fn arbitrary_input_never_panics(data in prop::collection::vec(any::<u8>(), 0..128)) {
                let mut r = PrimitiveReader::new(&data);
                let _ = r.region("Test", |b| {
                    let _ = b.read_string("name")?;
                    b.read_bytes_i32("value")
                });
                let _ = r.read_count_i32("items");
            }
        }
    }
}

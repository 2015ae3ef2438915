//! Version-gated serialization contract.
//!
//! Every entity that crosses a process boundary implements
//! [`VersionSerializable`]. Nested entities are written as
//! `u16 version` followed by a region, so a reader always learns the
//! version that *produced* the bytes and can gate fields on it. A version
//! above [`VersionSerializable::CURRENT_VERSION`] is refused outright, and
//! a region whose body does not match its declared version is malformed.

use crate::error::{CodecError, CodecResult};
use crate::pool::BufferPool;
use crate::reader::PrimitiveReader;
use crate::writer::PrimitiveWriter;
use bytes::Bytes;

/// A type with a versioned binary encoding.
pub trait VersionSerializable: Sized {
    /// Name used in error messages.
    const TYPE_NAME: &'static str;

    /// Highest version this build writes and reads.
    const CURRENT_VERSION: u16;

    /// Write the body of this value as it looked at `version`.
    ///
    /// Fields introduced after `version` are omitted.
    fn serialize_as(&self, writer: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()>;

    /// Read a body produced by a writer at `version`.
    fn deserialize(reader: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self>;

    /// Write the body at [`Self::CURRENT_VERSION`].
    fn serialize(&self, writer: &mut PrimitiveWriter<'_>) -> CodecResult<()> {
        self.serialize_as(writer, Self::CURRENT_VERSION)
    }
}

/// Reject versions this build cannot interpret.
pub fn check_version<T: VersionSerializable>(version: u16) -> CodecResult<()> {
    if version == 0 || version > T::CURRENT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            type_name: T::TYPE_NAME,
            version,
            max: T::CURRENT_VERSION,
        });
    }
    Ok(())
}

impl PrimitiveWriter<'_> {
    /// Write `value` as a nested object at its current version.
    pub fn write_nested<T: VersionSerializable>(&mut self, value: &T) -> CodecResult<()> {
        self.write_nested_as(value, T::CURRENT_VERSION)
    }

    /// Write `value` as a nested object at an explicit version.
    pub fn write_nested_as<T: VersionSerializable>(
        &mut self,
        value: &T,
        version: u16,
    ) -> CodecResult<()> {
        check_version::<T>(version)?;
        self.write_u16(version);
        self.region(|body| value.serialize_as(body, version))
    }

    /// Write an optional nested object behind a presence flag.
    pub fn write_optional<T: VersionSerializable>(&mut self, value: Option<&T>) -> CodecResult<()> {
        match value {
            Some(value) => {
                self.write_bool(true);
                self.write_nested(value)
            }
            None => {
                self.write_bool(false);
                Ok(())
            }
        }
    }
}

impl PrimitiveReader<'_> {
    /// Read a nested object written by [`PrimitiveWriter::write_nested`].
    pub fn read_nested<T: VersionSerializable>(&mut self) -> CodecResult<T> {
        let version = self.read_u16()?;
        check_version::<T>(version)?;
        self.region(T::TYPE_NAME, |body| T::deserialize(body, version))
    }

    /// Read an optional nested object behind a presence flag.
    pub fn read_optional<T: VersionSerializable>(&mut self) -> CodecResult<Option<T>> {
        if self.read_bool()? {
            self.read_nested().map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Encode `value` as a standalone nested object (version + region).
///
/// A pooled scratch buffer is used for the write and handed back before
/// returning, whatever the outcome.
pub fn to_versioned_bytes<T: VersionSerializable>(value: &T) -> CodecResult<Bytes> {
    let mut scratch = BufferPool::global().acquire();
    PrimitiveWriter::new(&mut scratch).write_nested(value)?;
    Ok(Bytes::copy_from_slice(&scratch))
}

/// Decode a standalone nested object, requiring every byte to be consumed.
pub fn from_versioned_bytes<T: VersionSerializable>(bytes: &[u8]) -> CodecResult<T> {
    let mut reader = PrimitiveReader::new(bytes);
    let value = reader.read_nested()?;
    reader.expect_end()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[derive(Debug, PartialEq)]
    struct Sample {
        id: u16,
        label: String,
        weight: i32,
    }

    impl VersionSerializable for Sample {
        const TYPE_NAME: &'static str = "Sample";
        const CURRENT_VERSION: u16 = 2;

        fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, version: u16) -> CodecResult<()> {
            w.write_u16(self.id);
            w.write_string("label", &self.label)?;
            if version >= 2 {
                w.write_i32(self.weight);
            }
            Ok(())
        }

        fn deserialize(r: &mut PrimitiveReader<'_>, version: u16) -> CodecResult<Self> {
            let id = r.read_u16()?;
            let label = r.read_string("label")?;
            let weight = if version >= 2 { r.read_i32()? } else { 0 };
            Ok(Self { id, label, weight })
        }
    }

    fn sample() -> Sample {
        Sample {
            id: 7,
            label: "seven".into(),
            weight: 70,
        }
    }

    #[test]
    fn current_version_roundtrip() {
        let bytes = to_versioned_bytes(&sample()).unwrap();
        let decoded: Sample = from_versioned_bytes(&bytes).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn older_version_drops_newer_fields() {
        let mut buf = BytesMut::new();
        PrimitiveWriter::new(&mut buf)
            .write_nested_as(&sample(), 1)
            .unwrap();
        let decoded: Sample = from_versioned_bytes(&buf).unwrap();
        assert_eq!(decoded.weight, 0);
        assert_eq!(decoded.label, "seven");
    }

    #[test]
    fn field_count_must_match_declared_version() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.write_u16(1);
        w.region(|body| sample().serialize_as(body, 2)).unwrap();
        assert!(matches!(
            from_versioned_bytes::<Sample>(&buf),
            Err(CodecError::Malformed { .. })
        ));

        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.write_u16(2);
        w.region(|body| sample().serialize_as(body, 1)).unwrap();
        assert_eq!(
            from_versioned_bytes::<Sample>(&buf),
            Err(CodecError::RegionOverrun { type_name: "Sample" })
        );
    }

    #[test]
    fn future_version_rejected() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.write_u16(3);
        w.region(|_| Ok(())).unwrap();
        let err = from_versioned_bytes::<Sample>(&buf).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnsupportedVersion {
                type_name: "Sample",
                version: 3,
                max: 2
            }
        );
        assert!(err.is_unsupported());
    }

    #[test]
    fn version_zero_rejected() {
        assert!(check_version::<Sample>(0).is_err());
        assert!(check_version::<Sample>(1).is_ok());
    }

    #[test]
    fn optional_roundtrip() {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.write_optional(Some(&sample())).unwrap();
        w.write_optional::<Sample>(None).unwrap();

        let mut r = PrimitiveReader::new(&buf);
        assert_eq!(r.read_optional::<Sample>().unwrap(), Some(sample()));
        assert_eq!(r.read_optional::<Sample>().unwrap(), None);
        assert!(r.is_empty());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = to_versioned_bytes(&sample()).unwrap().to_vec();
        bytes.push(0);
        assert!(matches!(
            from_versioned_bytes::<Sample>(&bytes),
            Err(CodecError::Malformed { .. })
        ));
    }
}

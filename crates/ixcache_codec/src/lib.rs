//! # IXCache Codec
//!
//! Versioned binary encoding for every entity that crosses a process
//! boundary in IXCache.
//!
//! This crate provides:
//! - Little-endian primitive writer and reader
//! - Length-prefixed regions checked for overrun and unread bytes
//! - The [`VersionSerializable`] contract with version-gated fields
//! - Batch framing for multi-message requests
//! - A scratch buffer pool with guard-based return
//!
//! ## Encoding Rules
//!
//! - Integers are little-endian and fixed width
//! - Byte and string fields carry a length prefix; zero length means absent
//! - Optional nested objects carry a one-byte presence flag
//! - Nested objects are `u16 version` followed by a `u32`-length region
//! - A reader decodes with the version that produced the bytes
//!
//! ## Usage
//!
//! ```
//! use bytes::BytesMut;
//! use ixcache_codec::{PrimitiveReader, PrimitiveWriter};
//!
//! let mut buf = BytesMut::new();
//! let mut writer = PrimitiveWriter::new(&mut buf);
//! writer.write_i32(42);
//! writer.write_string("name", "idx").unwrap();
//!
//! let mut reader = PrimitiveReader::new(&buf);
//! assert_eq!(reader.read_i32().unwrap(), 42);
//! assert_eq!(reader.read_string("name").unwrap(), "idx");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod pool;
mod reader;
mod version;
mod writer;

pub use error::{CodecError, CodecResult};
pub use frame::{decode_batch, encode_batch, MAX_BATCH_MESSAGES};
pub use pool::{BufferPool, PooledBuffer};
pub use reader::{PrimitiveReader, MAX_FIELD_LENGTH};
pub use version::{check_version, from_versioned_bytes, to_versioned_bytes, VersionSerializable};
pub use writer::PrimitiveWriter;

//! Multi-message batch framing.
//!
//! A batch is a `u32` message count followed by each message as a `u32`
//! length and its bytes. Messages themselves are opaque here.

use crate::error::{CodecError, CodecResult};
use crate::reader::PrimitiveReader;
use crate::writer::PrimitiveWriter;
use bytes::{Bytes, BytesMut};

/// Maximum number of messages accepted in one batch.
pub const MAX_BATCH_MESSAGES: usize = 64 * 1024;

/// Concatenate individually encoded messages into one batch.
pub fn encode_batch<I, M>(messages: I) -> CodecResult<Bytes>
where
    I: IntoIterator<Item = M>,
    M: AsRef<[u8]>,
{
    let messages: Vec<M> = messages.into_iter().collect();
    if messages.len() > MAX_BATCH_MESSAGES {
        return Err(CodecError::length_overflow(
            "batch",
            messages.len(),
            MAX_BATCH_MESSAGES,
        ));
    }
    let total: usize = messages.iter().map(|m| m.as_ref().len() + 4).sum();
    let mut buf = BytesMut::with_capacity(total + 4);
    let mut w = PrimitiveWriter::new(&mut buf);
    w.write_u32(messages.len() as u32);
    for message in &messages {
        let message = message.as_ref();
        let len = u32::try_from(message.len())
            .map_err(|_| CodecError::length_overflow("message", message.len(), u32::MAX as usize))?;
        w.write_u32(len);
        w.write_raw(message);
    }
    Ok(buf.freeze())
}

/// Split a batch back into its messages.
pub fn decode_batch(data: &[u8]) -> CodecResult<Vec<&[u8]>> {
    let mut r = PrimitiveReader::new(data);
    let count = r.read_u32()? as usize;
    if count > MAX_BATCH_MESSAGES {
        return Err(CodecError::SizeLimitExceeded {
            claimed: count as u64,
            max_allowed: MAX_BATCH_MESSAGES as u64,
        });
    }
    let mut messages = Vec::with_capacity(r.capacity_hint(count, 4));
    for _ in 0..count {
        let len = r.read_u32()? as usize;
        messages.push(r.read_raw(len)?);
    }
    r.expect_end()?;
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_roundtrip() {
        let batch = encode_batch([&b"one"[..], &b""[..], &b"three"[..]]).unwrap();
        let messages = decode_batch(&batch).unwrap();
        assert_eq!(messages, vec![&b"one"[..], &b""[..], &b"three"[..]]);
    }

    #[test]
    fn empty_batch() {
        let batch = encode_batch(Vec::<Vec<u8>>::new()).unwrap();
        assert_eq!(&batch[..], &[0, 0, 0, 0]);
        assert!(decode_batch(&batch).unwrap().is_empty());
    }

    #[test]
    fn truncated_batch_fails() {
        let batch = encode_batch([b"abcdef".to_vec()]).unwrap();
        assert_eq!(
            decode_batch(&batch[..batch.len() - 1]),
            Err(CodecError::UnexpectedEof)
        );
    }

    #[test]
    fn count_mismatch_fails() {
        let mut batch = encode_batch([b"ab".to_vec()]).unwrap().to_vec();
        batch[0] = 2;
        assert!(decode_batch(&batch).is_err());
    }
}

//! Decode command implementation.

use ixcache_codec::decode_batch;
use ixcache_core::from_hex;
use ixcache_protocol::{Request, Response};
use serde::Serialize;

/// One decoded message.
#[derive(Debug, Serialize)]
pub struct DecodedMessage {
    /// "request" or "response".
    pub kind: &'static str,
    /// Message type tag.
    pub tag: u8,
    /// Short message name.
    pub name: &'static str,
    /// Debug rendering of the body.
    pub detail: String,
}

fn as_request(bytes: &[u8]) -> Option<DecodedMessage> {
    let request = Request::decode(bytes).ok()?;
    Some(DecodedMessage {
        kind: "request",
        tag: request.type_tag(),
        name: request.name(),
        detail: format!("{request:#?}"),
    })
}

fn as_response(bytes: &[u8]) -> Option<DecodedMessage> {
    let response = Response::decode(bytes).ok()?;
    Some(DecodedMessage {
        kind: "response",
        tag: response.type_tag(),
        name: response.name(),
        detail: format!("{response:#?}"),
    })
}

fn as_single(bytes: &[u8]) -> Option<DecodedMessage> {
    as_request(bytes).or_else(|| as_response(bytes))
}

/// Decodes `hex` as `kind`: `request`, `response`, `batch`, or `auto`
/// (a single message first, then a batch).
pub fn decode(hex: &str, kind: &str) -> Result<Vec<DecodedMessage>, Box<dyn std::error::Error>> {
    let bytes = from_hex(hex.trim_start_matches("0x")).ok_or("input is not valid hex")?;

    let single = match kind {
        "request" => Some(as_request(&bytes).ok_or("not a valid request")?),
        "response" => Some(as_response(&bytes).ok_or("not a valid response")?),
        "auto" => as_single(&bytes),
        "batch" => None,
        other => return Err(format!("unknown message kind: {other}").into()),
    };
    if let Some(message) = single {
        return Ok(vec![message]);
    }

    decode_batch(&bytes)?
        .into_iter()
        .enumerate()
        .map(|(i, message)| {
            as_single(message).ok_or_else(|| format!("batch message {i} is not decodable").into())
        })
        .collect()
}

/// Runs the decode command.
pub fn run(hex: &str, kind: &str) -> Result<(), Box<dyn std::error::Error>> {
    let messages = decode(hex, kind)?;
    for (i, message) in messages.iter().enumerate() {
        if messages.len() > 1 {
            println!("--- message {i} ---");
        }
        println!("{} {} (tag {})", message.kind, message.name, message.tag);
        println!("{}", message.detail);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ixcache_codec::encode_batch;
    use ixcache_core::{to_hex, IndexId};
    use ixcache_protocol::{RangeQuery, Rejected, TagQuery};

    #[test]
    fn decodes_single_messages() {
        let request = Request::Range(RangeQuery::new(IndexId::from(3), 1, 10));
        let hex = to_hex(&request.encode().unwrap());
        let decoded = decode(&hex, "auto").unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].kind, "request");
        assert_eq!(decoded[0].name, "range");
        assert!(decoded[0].detail.contains("item_num: 10"));
        assert!(decode(&hex, "response").is_err());
    }

    #[test]
    fn decodes_batches() {
        let request = Request::Tag(TagQuery).encode().unwrap();
        let reply = Response::Rejected(Rejected {
            reason: "busy".into(),
        })
        .encode()
        .unwrap();
        let hex = to_hex(&encode_batch([request, reply]).unwrap());
        let decoded = decode(&hex, "batch").unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].kind, "request");
        assert_eq!(decoded[1].kind, "response");
        assert!(decoded[1].detail.contains("busy"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("zz", "auto").is_err());
        assert!(decode("ee00", "auto").is_err());
        assert!(decode("01", "bogus").is_err());
    }
}

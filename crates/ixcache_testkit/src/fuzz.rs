//! Fuzz harnesses.
//!
//! Each harness takes arbitrary bytes and panics only when a decoder or
//! the node misbehaves: a decoder may reject input, but anything it
//! accepts must survive a re-encode.

use ixcache_codec::{decode_batch, PrimitiveReader};
use ixcache_core::read_filter;
use ixcache_protocol::{Request, Response};
use ixcache_server::CacheNode;

/// Fuzz the request decoder.
pub fn fuzz_request_decode(data: &[u8]) {
    if let Ok(request) = Request::decode(data) {
        let encoded = request.encode().expect("decoded request must re-encode");
        let again = Request::decode(&encoded).expect("re-encoded request must decode");
        assert_eq!(request, again);
    }
}

/// Fuzz the response decoder.
pub fn fuzz_response_decode(data: &[u8]) {
    if let Ok(response) = Response::decode(data) {
        let encoded = response.encode().expect("decoded response must re-encode");
        let again = Response::decode(&encoded).expect("re-encoded response must decode");
        assert_eq!(response, again);
    }
}

/// Fuzz batch framing; accepted batches must account for every byte.
pub fn fuzz_batch_decode(data: &[u8]) {
    if let Ok(messages) = decode_batch(data) {
        let framed: usize = messages.iter().map(|m| m.len() + 4).sum::<usize>() + 4;
        assert_eq!(framed, data.len());
    }
}

/// Fuzz the filter decoder.
pub fn fuzz_filter_decode(data: &[u8]) {
    let mut reader = PrimitiveReader::new(data);
    let _ = read_filter(&mut reader);
}

/// Fuzz a node's batch entry point. Garbage may be refused as a whole or
/// answered with rejections, but any reply must be a well-formed batch.
pub fn fuzz_node(node: &CacheNode, data: &[u8]) {
    if let Ok(reply) = node.handle_batch(data) {
        let replies = decode_batch(&reply).expect("node reply must be a batch");
        for message in replies {
            Response::decode(message).expect("node reply must hold responses");
        }
    }
    let reply = node.handle(data).expect("single-message entry point always answers");
    Response::decode(&reply).expect("single reply must decode");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestNode;
    use crate::generators::fuzz_bytes_strategy;
    use ixcache_codec::encode_batch;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn decoders_survive_random_bytes(data in fuzz_bytes_strategy()) {
            fuzz_request_decode(&data);
            fuzz_response_decode(&data);
            fuzz_batch_decode(&data);
            fuzz_filter_decode(&data);
        }

        #[test]
        fn node_survives_random_batches(messages in prop::collection::vec(fuzz_bytes_strategy(), 0..4)) {
            let node = TestNode::new();
            let batch = encode_batch(&messages).unwrap();
            fuzz_node(&node, &batch);
            for message in &messages {
                fuzz_node(&node, message);
            }
        }
    }
}

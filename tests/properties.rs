//! Property tests for framing.

use std::sync::Arc;

use abci_socket::codec::{RawCodec, RawResponse};
use abci_socket::protocol::{build_frame, decode_length, encode_length, FrameReader};
use abci_socket::{handler_fn, Connection, HandlerError};
use bytes::Bytes;
use proptest::prelude::*;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

const MAX_MESSAGE_SIZE: usize = 104_857_600;

/// Split `bytes` at the given cut points.
fn split_at_points(bytes: &[u8], mut cuts: Vec<usize>) -> Vec<&[u8]> {
    cuts.iter_mut().for_each(|c| *c %= bytes.len() + 1);
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(&bytes[start..cut]);
        start = cut;
    }
    chunks.push(&bytes[start..]);
    chunks
}

proptest! {
    #[test]
    fn prop_length_prefix_round_trip(len in 0usize..=MAX_MESSAGE_SIZE) {
        let prefix = encode_length(len);
        let decoded = decode_length(prefix.as_bytes()).unwrap();
        prop_assert_eq!(decoded, Some((len as u64, prefix.len())));
    }

    #[test]
    fn prop_chunking_does_not_change_frames(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..300), 1..5),
        cuts in prop::collection::vec(any::<usize>(), 0..16),
    ) {
        let mut wire = Vec::new();
        for payload in &payloads {
            wire.extend(build_frame(payload));
        }

        let mut reader = FrameReader::new();
        let mut extracted = Vec::new();
        for chunk in split_at_points(&wire, cuts) {
            reader.extend(chunk);
            while let Some(frame) = reader.try_extract().unwrap() {
                extracted.push(frame.payload().to_vec());
            }
        }

        prop_assert_eq!(extracted, payloads);
        prop_assert!(reader.is_empty());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_connection_chunking_independence(
        payload in prop::collection::vec(any::<u8>(), 0..512),
        cuts in prop::collection::vec(any::<usize>(), 0..8),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let echoed = runtime.block_on(async {
            let (client, mut peer) = duplex(4096);
            let handler = handler_fn(|request: Bytes| async move {
                Ok::<_, HandlerError<RawResponse>>(RawResponse::new(request))
            });
            let conn = Connection::new(client, Arc::new(RawCodec), Arc::new(handler));
            let task = tokio::spawn(conn.run());

            let wire = build_frame(&payload);
            for chunk in split_at_points(&wire, cuts) {
                peer.write_all(chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
            peer.shutdown().await.unwrap();

            let mut echoed = Vec::new();
            peer.read_to_end(&mut echoed).await.unwrap();
            let closed = task.await.unwrap().unwrap();
            assert!(closed.is_clean());
            echoed
        });

        prop_assert_eq!(echoed, build_frame(&payload));
    }
}

use std::io::Read;
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use tokio::sync::mpsc;
use tracing::debug;

use super::{ReplyMessage, RpcChannel};
use crate::error::{Error, Result};
use crate::util::text_to_bytes;

const REPLY_KIND: &str = "INFLATE";

/// Request record crossing into the executor. Payload bytes are owned
/// copies; nothing is shared with the caller's context.
#[derive(Debug)]
pub struct InflateRequest {
    pub id: u64,
    pub method: u16,
    pub payload: Vec<u8>,
    pub expected_len: u64,
}

/// Reply record posted back by the executor, correlated by id.
#[derive(Debug)]
pub struct InflateReply {
    pub id: u64,
    pub error: bool,
    pub payload: Vec<u8>,
}

/// Out-of-line decompression unit.
///
/// Two tasks back each instance: the executor loop, which serves requests
/// one at a time, and the reply router, which matches inbound replies to
/// pending operations through the [`RpcChannel`]. Callers only see
/// [`decompress`](Self::decompress); the message traffic stays internal.
pub struct InflateExecutor {
    requests: mpsc::UnboundedSender<InflateRequest>,
    channel: Arc<RpcChannel<Vec<u8>>>,
}

impl InflateExecutor {
    pub fn spawn() -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<InflateRequest>();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<InflateReply>();

        tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                let reply = serve(request);
                if reply_tx.send(reply).is_err() {
                    break;
                }
            }
        });

        let channel = Arc::new(RpcChannel::new());
        let router = Arc::clone(&channel);
        tokio::spawn(async move {
            while let Some(reply) = reply_rx.recv().await {
                let message = if reply.error {
                    ReplyMessage::fault(REPLY_KIND, reply.payload)
                } else {
                    ReplyMessage::ok(REPLY_KIND, reply.payload)
                };
                router.complete(reply.id, message);
            }
        });

        Self {
            requests: request_tx,
            channel,
        }
    }

    /// Decompress `payload` with the given ZIP compression method.
    ///
    /// Dispatches a request message and suspends on the pending handle
    /// until the matching reply arrives.
    pub async fn decompress(
        &self,
        method: u16,
        payload: Vec<u8>,
        expected_len: u64,
    ) -> Result<Vec<u8>> {
        let (id, handle) = self.channel.register();
        debug!(id, method, len = payload.len(), "dispatching to inflate executor");

        let request = InflateRequest {
            id,
            method,
            payload,
            expected_len,
        };
        self.requests
            .send(request)
            .map_err(|_| Error::Inflate("executor is gone".into()))?;

        handle
            .wait()
            .await
            .map_err(|rejection| Error::Inflate(rejection.0))
    }
}

fn serve(request: InflateRequest) -> InflateReply {
    match inflate(request.method, &request.payload, request.expected_len) {
        Ok(bytes) => InflateReply {
            id: request.id,
            error: false,
            payload: bytes,
        },
        Err(reason) => InflateReply {
            id: request.id,
            error: true,
            payload: text_to_bytes(&reason),
        },
    }
}

/// The decompression capability: `inflate(bytes, method) -> bytes`.
fn inflate(method: u16, payload: &[u8], expected_len: u64) -> std::result::Result<Vec<u8>, String> {
    match method {
        0 => Ok(payload.to_vec()),
        8 => {
            let mut decoder = DeflateDecoder::new(payload);
            let mut out = Vec::with_capacity(expected_len as usize);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| format!("deflate stream error: {e}"))?;
            Ok(out)
        },
        other => Err(format!("unsupported compression method: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::DeflateEncoder;
    use flate2::Compression;

    use super::*;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn deflated_payload_round_trips() {
        let executor = InflateExecutor::spawn();
        let plain = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = deflate(&plain);

        let out = executor
            .decompress(8, compressed, plain.len() as u64)
            .await
            .unwrap();
        assert_eq!(out, plain);
    }

    #[tokio::test]
    async fn stored_payload_passes_through() {
        let executor = InflateExecutor::spawn();
        let plain = b"already flat".to_vec();

        let out = executor
            .decompress(0, plain.clone(), plain.len() as u64)
            .await
            .unwrap();
        assert_eq!(out, plain);
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected() {
        let executor = InflateExecutor::spawn();
        let err = executor.decompress(12, vec![1, 2, 3], 3).await.unwrap_err();

        assert_eq!(err, Error::Inflate(String::new()));
        assert!(err.to_string().contains("unsupported compression method: 12"));
    }

    #[tokio::test]
    async fn broken_deflate_stream_is_rejected() {
        let executor = InflateExecutor::spawn();
        let err = executor
            .decompress(8, vec![0xFF; 16], 1024)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Inflate(_)));
    }

    #[tokio::test]
    async fn concurrent_requests_resolve_independently() {
        let executor = Arc::new(InflateExecutor::spawn());
        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let executor = Arc::clone(&executor);
            tasks.push(tokio::spawn(async move {
                let plain = vec![i; 1000 + i as usize];
                let out = executor
                    .decompress(8, deflate(&plain), plain.len() as u64)
                    .await
                    .unwrap();
                assert_eq!(out, plain);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }
}

//! Match engine: runs embedding comparisons off the request-handling path.
//!
//! Matching is CPU-bound and linear in the gallery size, so requests are
//! funneled through a bounded channel into a dedicated OS thread. The
//! channel bound gives callers backpressure instead of letting concurrent
//! API traffic pile up behind matching latency.

use rollcall_core::{DistanceMatcher, Embedding, EnrolledFace, MatchHit, Matcher};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Messages sent from request handlers to the engine thread.
enum EngineRequest {
    Identify {
        probe: Embedding,
        gallery: Vec<EnrolledFace>,
        tolerance: f32,
        reply: oneshot::Sender<Option<MatchHit>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Resolve a probe against a gallery; `None` means no student within
    /// tolerance.
    pub async fn identify(
        &self,
        probe: Embedding,
        gallery: Vec<EnrolledFace>,
        tolerance: f32,
    ) -> Result<Option<MatchHit>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Identify {
                probe,
                gallery,
                tolerance,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread.
pub fn spawn_engine(queue_depth: usize) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            let matcher = DistanceMatcher;
            tracing::info!("match engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Identify {
                        probe,
                        gallery,
                        tolerance,
                        reply,
                    } => {
                        let _ = reply.send(matcher.identify(&probe, &gallery, tolerance));
                    }
                }
            }
            tracing::info!("match engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

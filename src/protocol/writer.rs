//! Backend writer task.
//!
//! Receives [`RequestEnvelope`]s from an unbounded tokio [`mpsc`] channel, serializes
//! each to one compact JSON line and writes it to the backend's stdin through
//! a [`FramedWrite`] backed by [`BridgeCodec`].
//!
//! Writes are fire-and-forget: the backend never acknowledges a request.
//! When a write fails the task stops and drops its receiver, so later sends
//! on the channel fail and callers learn the backend is gone.

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::codec::BridgeCodec;
use crate::protocol::envelope::RequestEnvelope;
use crate::Result;

/// Writer task: serialize requests and write them to `stdin`.
///
/// The task exits cleanly when:
/// - `cancel` is triggered, or
/// - `msg_rx` is closed (all senders dropped).
///
/// # Errors
///
/// - [`AppError::Protocol`](crate::AppError::Protocol) if a request cannot be
///   serialized.
/// - [`AppError::Io`](crate::AppError::Io) if the write to `stdin` fails
///   (e.g. the backend process has exited).
pub async fn run_writer<W>(
    stdin: W,
    mut msg_rx: mpsc::UnboundedReceiver<RequestEnvelope>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut framed = FramedWrite::new(stdin, BridgeCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("backend writer: cancellation received, stopping");
                break;
            }

            msg = msg_rx.recv() => {
                let Some(request) = msg else {
                    debug!("backend writer: request channel closed, stopping");
                    break;
                };

                let line = request.to_line()?;
                framed.send(line).await.map_err(|err| {
                    warn!(id = %request.id, error = %err, "backend writer: write to stdin failed");
                    err
                })?;
                debug!(id = %request.id, "request written to backend");
            }
        }
    }

    Ok(())
}

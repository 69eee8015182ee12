//! Backend reader task.
//!
//! Drives a [`FramedRead`] backed by [`BridgeCodec`] over the backend's
//! stdout and hands each line to the [`ResponseRouter`].

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::codec::BridgeCodec;
use crate::protocol::router::ResponseRouter;

/// Why the reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// The backend closed its stdout; any unterminated remainder was flushed.
    Eof,
    /// The cancellation token fired.
    Cancelled,
    /// The underlying stream failed.
    Failed(String),
}

/// Summary of a finished reader run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderReport {
    /// Why the loop ended.
    pub exit: ReaderExit,
    /// Framed lines read, including ones the router dropped.
    pub lines: usize,
    /// Messages the router dispatched.
    pub dispatched: usize,
}

/// Read NDJSON lines from `stdout` until EOF or cancellation.
///
/// Malformed lines are dropped by the router and do not stop the loop. When
/// `cancel` fires, no further lines are routed even if some are buffered.
pub async fn run_reader<R>(
    stdout: R,
    router: ResponseRouter,
    cancel: CancellationToken,
) -> ReaderReport
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stdout, BridgeCodec::new());
    let mut lines = 0usize;
    let mut dispatched = 0usize;

    let exit = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("backend reader: cancellation received, stopping");
                break ReaderExit::Cancelled;
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!("backend reader: EOF detected");
                        break ReaderExit::Eof;
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "backend reader: stream error, stopping");
                        break ReaderExit::Failed(err.to_string());
                    }
                    Some(Ok(line)) => {
                        lines += 1;
                        if router.route(&line) {
                            dispatched += 1;
                        }
                    }
                }
            }
        }
    };

    ReaderReport {
        exit,
        lines,
        dispatched,
    }
}

//! Backend wire protocol.
//!
//! The host and the backend process exchange newline-delimited JSON over the
//! backend's stdio. One request or response object per line.
//!
//! Submodules:
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based framing plus
//!   a push-style [`LineFramer`](codec::LineFramer) for raw chunks.
//! - `envelope`: request/response envelopes and correlation id helpers.
//! - `router`: turns framed response lines into assistant chat messages and
//!   publishes them to observers.
//! - `reader`: async read task driving the codec over the backend's stdout.
//! - `writer`: async write task serializing requests to the backend's stdin.

pub mod codec;
pub mod envelope;
pub mod reader;
pub mod router;
pub mod writer;

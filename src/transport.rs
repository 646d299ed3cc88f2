//! Transport seam between the session engine and the streaming backend

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::SessionResult;
use crate::types::{ApiRequest, StreamFrame};

/// Ordered, non-restartable stream of inbound frames; ends when the
/// connection terminates.
pub type FrameStream = Pin<Box<dyn Stream<Item = StreamFrame> + Send>>;

/// Outbound half of the duplex channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand one request to the backend, returning its acknowledgement. The
    /// actual response, if any, arrives later on the frame stream.
    async fn send(&self, request: ApiRequest) -> SessionResult<String>;
}

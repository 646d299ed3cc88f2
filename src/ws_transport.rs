//! JSON-over-WebSocket transport to the streaming backend
//!
//! Each outbound [`ApiRequest`] is written as one text message; each inbound
//! text message is one [`StreamFrame`]. Reconnection is left to the caller:
//! the frame stream simply ends when the socket closes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, stream};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::transport::{FrameStream, Transport};
use crate::types::{ApiRequest, StreamFrame};

const OUTBOUND_CAPACITY: usize = 256;
const INBOUND_CAPACITY: usize = 1024;

/// Outbound half of a WebSocket connection
#[derive(Clone)]
pub struct WsTransport {
    outbound: mpsc::Sender<ApiRequest>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, request: ApiRequest) -> SessionResult<String> {
        let ack = request.request_id.clone();
        self.outbound
            .send(request)
            .await
            .map_err(|_| SessionError::Transport("connection closed".to_string()))?;
        Ok(ack)
    }
}

/// Open the stream endpoint and return the transport with its frame stream
pub async fn connect(config: &SessionConfig) -> Result<(WsTransport, FrameStream)> {
    let mut request = config
        .endpoint
        .as_str()
        .into_client_request()
        .with_context(|| format!("Invalid endpoint {}", config.endpoint))?;
    let headers = request.headers_mut();
    headers.insert(
        "token",
        HeaderValue::from_str(&config.token).context("Token is not a valid header value")?,
    );
    headers.insert(
        "name",
        HeaderValue::from_str(&config.name).context("Name is not a valid header value")?,
    );

    let (socket, _) = connect_async(request)
        .await
        .with_context(|| format!("Failed to connect to {}", config.endpoint))?;
    info!("Connected to {}", config.endpoint);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<ApiRequest>(OUTBOUND_CAPACITY);
    let (frames_tx, frames_rx) = mpsc::channel::<StreamFrame>(INBOUND_CAPACITY);

    tokio::spawn(async move {
        while let Some(request) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&request) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize {:?} request: {}", request.api_type, e);
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(json)).await {
                warn!("WebSocket send failed: {}", e);
                break;
            }
        }
        let _ = ws_tx.close().await;
        debug!("Outbound task finished");
    });

    let debug_mode = config.debug_mode;
    tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<StreamFrame>(&text) {
                    Ok(frame) => {
                        if frames_tx.send(frame).await.is_err() {
                            debug!("Frame consumer dropped");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Invalid frame: {}", e);
                        if debug_mode {
                            debug!("Invalid frame payload: {}", text);
                        }
                    }
                },
                Ok(Message::Close(frame)) => {
                    info!("Backend closed the stream: {:?}", frame);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("WebSocket receive failed: {}", e);
                    break;
                }
            }
        }
    });

    let frames = stream::unfold(frames_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    });

    Ok((WsTransport { outbound }, Box::pin(frames)))
}

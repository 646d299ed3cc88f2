//! Request client - issues backend requests and awaits correlated responses

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::correlator::PendingRequests;
use crate::error::{SessionError, SessionResult};
use crate::session::LoginSession;
use crate::transport::Transport;
use crate::types::{ApiRequest, ApiType, OperationResponse};

#[derive(Clone)]
pub struct RequestClient {
    transport: Arc<dyn Transport>,
    pending: Arc<PendingRequests>,
    session: Arc<LoginSession>,
    timeout: Duration,
}

impl RequestClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        pending: Arc<PendingRequests>,
        session: Arc<LoginSession>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            pending,
            session,
            timeout,
        }
    }

    fn build(&self, api_type: ApiType, data: Option<Value>) -> ApiRequest {
        ApiRequest {
            request_id: Uuid::new_v4().to_string(),
            api_type,
            uin: self.session.uin(),
            data: data.map(|d| d.to_string()),
        }
    }

    /// Send without waiting for a response; the effect arrives as a push
    pub async fn notify(&self, api_type: ApiType, data: Option<Value>) -> SessionResult<()> {
        let request = self.build(api_type, data);
        debug!("Sending {:?} ({})", api_type, request.request_id);
        self.transport.send(request).await?;
        Ok(())
    }

    /// Send and wait for the `REQUEST_RESPONSE` carrying the same request id
    pub async fn request(&self, api_type: ApiType, data: Option<Value>) -> SessionResult<String> {
        let request = self.build(api_type, data);
        let id = request.request_id.clone();
        self.send_correlated(&id, request).await
    }

    /// Send and wait for a response correlated by `key` instead of the
    /// request id (media fetches are answered by message id)
    pub async fn request_keyed(
        &self,
        key: &str,
        api_type: ApiType,
        data: Option<Value>,
    ) -> SessionResult<String> {
        let request = self.build(api_type, data);
        self.send_correlated(key, request).await
    }

    async fn send_correlated(&self, key: &str, request: ApiRequest) -> SessionResult<String> {
        let api_type = request.api_type;
        let rx = self.pending.issue(key)?;

        debug!("Sending {:?} awaiting {}", api_type, key);
        if let Err(e) = self.transport.send(request).await {
            self.pending.remove(key);
            warn!("Failed to send {:?}: {}", api_type, e);
            return Err(e);
        }

        self.pending.wait(key, rx, self.timeout).await
    }

    /// Correlated request whose response is a status envelope; non-zero
    /// status is an error
    pub async fn operation(
        &self,
        api_type: ApiType,
        data: Option<Value>,
    ) -> SessionResult<OperationResponse> {
        let raw = self.request(api_type, data).await?;
        let response: OperationResponse = parse_response(api_type, &raw)?;
        if response.status != 0 {
            return Err(SessionError::Operation {
                api: api_type,
                status: response.status,
                message: response.message,
            });
        }
        Ok(response)
    }
}

pub fn parse_response<T: DeserializeOwned>(api_type: ApiType, raw: &str) -> SessionResult<T> {
    serde_json::from_str(raw)
        .map_err(|e| SessionError::Malformed(format!("{api_type:?} response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySessionStore;
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    fn client(timeout: Duration) -> (RequestClient, Arc<MockTransport>, Arc<PendingRequests>) {
        let transport = Arc::new(MockTransport::new());
        let pending = Arc::new(PendingRequests::new());
        let session = Arc::new(LoginSession::new(Arc::new(MemorySessionStore::new())));
        let client = RequestClient::new(transport.clone(), pending.clone(), session, timeout);
        (client, transport, pending)
    }

    #[tokio::test]
    async fn test_request_resolved_by_response() {
        let (client, transport, pending) = client(Duration::from_secs(5));

        let waiter = tokio::spawn({
            let client = client.clone();
            async move { client.request(ApiType::SearchContact, Some(json!({"wxid": "a"}))).await }
        });

        while transport.last().is_none() {
            tokio::task::yield_now().await;
        }
        let sent = transport.last().unwrap();
        assert_eq!(sent.data.as_deref(), Some(r#"{"wxid":"a"}"#));
        assert!(pending.resolve(&sent.request_id, "{\"ok\":true}".to_string()));

        assert_eq!(waiter.await.unwrap().unwrap(), "{\"ok\":true}");
        assert_eq!(pending.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_removes_pending() {
        let (client, transport, pending) = client(Duration::from_secs(5));
        transport.set_failing(true);

        let result = client.request(ApiType::GetAllLabel, None).await;
        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert_eq!(pending.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_pending() {
        let (client, _, pending) = client(Duration::from_secs(1));

        let result = client.request(ApiType::GetAllLabel, None).await;
        assert!(matches!(result, Err(SessionError::Timeout { .. })));
        assert_eq!(pending.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_operation_status_checked() {
        let (client, transport, pending) = client(Duration::from_secs(5));

        let waiter = tokio::spawn({
            let client = client.clone();
            async move { client.operation(ApiType::AddLabel, None).await }
        });
        while transport.last().is_none() {
            tokio::task::yield_now().await;
        }
        let id = transport.last().unwrap().request_id;
        pending.resolve(&id, r#"{"status":-1,"message":"denied"}"#.to_string());

        match waiter.await.unwrap() {
            Err(SessionError::Operation { status, .. }) => assert_eq!(status, -1),
            other => panic!("unexpected {other:?}"),
        }
    }
}

//! Session manager - ties the frame dispatcher, login state, caches and
//! request client together for one account
//!
//! All collaborators are session scoped and injected at construction, so
//! several managers can run side by side in one process.

mod contact;
mod dispatch;
mod friendship;
mod message;
mod room;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cache::CacheManager;
use crate::config::SessionConfig;
use crate::correlator::PendingRequests;
use crate::error::{SessionError, SessionResult};
use crate::event::SessionEvent;
use crate::message_cache::MessageCache;
use crate::request::RequestClient;
use crate::session::{LoginSession, LoginState};
use crate::storage::{SessionIdentity, SessionStore};
use crate::transport::Transport;
use crate::types::ApiType;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct SessionManager {
    config: Arc<SessionConfig>,
    session: Arc<LoginSession>,
    pending: Arc<PendingRequests>,
    client: RequestClient,
    /// Created at login; absent until then
    cache: Arc<RwLock<Option<Arc<CacheManager>>>>,
    messages: Arc<Mutex<MessageCache>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let session = Arc::new(LoginSession::new(store));
        let pending = Arc::new(PendingRequests::new());
        let client = RequestClient::new(
            transport,
            pending.clone(),
            session.clone(),
            config.request_timeout(),
        );
        let messages = MessageCache::new(config.message_cache_max, config.message_cache_age());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config: Arc::new(config),
            session,
            pending,
            client,
            cache: Arc::new(RwLock::new(None)),
            messages: Arc::new(Mutex::new(messages)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            debug!("No subscribers for {} event", name);
        }
    }

    pub fn login_state(&self) -> LoginState {
        self.session.state()
    }

    pub fn identity(&self) -> SessionIdentity {
        self.session.identity()
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.pending_count()
    }

    /// Cache of the logged-in account
    pub fn cache(&self) -> SessionResult<Arc<CacheManager>> {
        self.cache
            .read()
            .clone()
            .ok_or(SessionError::NoCache("operation requires a logged-in session"))
    }

    fn init_cache(&self, user_name: &str) -> Arc<CacheManager> {
        let mut guard = self.cache.write();
        if let Some(cache) = guard.as_ref()
            && cache.owner() == user_name
        {
            return cache.clone();
        }

        info!("Initializing cache for {}", user_name);
        let cache = Arc::new(CacheManager::new(user_name));
        *guard = Some(cache.clone());
        cache
    }

    /// Begin the login flow: resume a stored session or request a QR code
    pub async fn start(&self) -> SessionResult<()> {
        match self.session.restore()? {
            Some(identity) => {
                info!("Resuming session for uin {}", identity.uin);
                tokio::time::sleep(self.config.resume_delay()).await;
                self.client.notify(ApiType::Init, None).await
            }
            None => self.request_qrcode(None).await,
        }
    }

    /// Ask the backend for a new login QR code, optionally hinting the last
    /// known account
    async fn request_qrcode(&self, hints: Option<(String, String)>) -> SessionResult<()> {
        let data = hints.map(|(uin, wxid)| json!({ "uin": uin, "wxid": wxid }));
        self.client.notify(ApiType::GetQrcode, data).await
    }

    /// Log the account out on the backend
    pub async fn logout(&self) -> SessionResult<()> {
        self.client.operation(ApiType::Logout, None).await?;
        Ok(())
    }
}

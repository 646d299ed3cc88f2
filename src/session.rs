//! Login state machine and the durable session identity
//!
//! ```text
//! Unauthenticated ──QR issued──▶ QrIssued ──Scanned──▶ Waiting ──Confirmed──▶ Scanned
//!        ▲                          │                    │                       │
//!        └──── Canceled/Expired ◀───┴────────────────────┘                  login frame
//!                                                                                ▼
//!                                              LoggedOut ◀──logout frame── LoggedIn
//! ```
//!
//! Transition methods only update state and persist the identity; the
//! manager performs the emissions and requests they call for.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SessionResult;
use crate::storage::{MEMORY_SLOT_NAME, SessionIdentity, SessionStore};
use crate::types::{LoginUser, QrcodeStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    QrIssued,
    Waiting,
    Scanned,
    LoggedIn,
    LoggedOut,
}

/// Status attached to `scan` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Fresh code, awaiting scan
    Cancel,
    Waiting,
    Scanned,
    Confirmed,
    Timeout,
}

/// What the manager should do after a scan status frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTransition {
    Emit(ScanStatus),
    /// Code expired or canceled; request a new one with these hints
    Reissue { uin: String, user_name: String },
    Ignore,
}

pub struct LoginSession {
    state: RwLock<LoginState>,
    identity: RwLock<SessionIdentity>,
    store: Arc<dyn SessionStore>,
}

impl LoginSession {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            state: RwLock::new(LoginState::Unauthenticated),
            identity: RwLock::new(SessionIdentity::default()),
            store,
        }
    }

    pub fn state(&self) -> LoginState {
        *self.state.read()
    }

    pub fn identity(&self) -> SessionIdentity {
        self.identity.read().clone()
    }

    pub fn uin(&self) -> String {
        self.identity.read().uin.clone()
    }

    pub fn user_name(&self) -> String {
        self.identity.read().user_name.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == LoginState::LoggedIn
    }

    /// Load the persisted identity. Returns it when it allows skipping QR
    /// login.
    pub fn restore(&self) -> SessionResult<Option<SessionIdentity>> {
        let Some(stored) = self.store.get(MEMORY_SLOT_NAME)? else {
            debug!("No stored session identity");
            return Ok(None);
        };

        let resumable = stored.is_resumable();
        *self.identity.write() = stored.clone();
        if resumable {
            info!("Restored session for uin {}", stored.uin);
            Ok(Some(stored))
        } else {
            Ok(None)
        }
    }

    pub fn qrcode_issued(&self, qrcode_id: &str) -> ScanStatus {
        self.identity.write().qrcode_id = qrcode_id.to_string();
        *self.state.write() = LoginState::QrIssued;
        ScanStatus::Cancel
    }

    pub fn scan_status(&self, status: QrcodeStatus) -> ScanTransition {
        let mut state = self.state.write();
        match status {
            QrcodeStatus::Scanned => {
                if *state == LoginState::Waiting {
                    return ScanTransition::Ignore;
                }
                *state = LoginState::Waiting;
                ScanTransition::Emit(ScanStatus::Waiting)
            }
            QrcodeStatus::Confirmed => {
                if *state == LoginState::Scanned {
                    return ScanTransition::Ignore;
                }
                *state = LoginState::Scanned;
                ScanTransition::Emit(ScanStatus::Scanned)
            }
            QrcodeStatus::Canceled | QrcodeStatus::Expired => {
                *state = LoginState::Unauthenticated;
                let identity = self.identity.read();
                ScanTransition::Reissue {
                    uin: identity.uin.clone(),
                    user_name: identity.user_name.clone(),
                }
            }
            QrcodeStatus::Waiting | QrcodeStatus::Other(_) => ScanTransition::Ignore,
        }
    }

    /// Adopt `user` as the logged-in account and persist it
    pub fn login(&self, user: &LoginUser) -> SessionResult<()> {
        let identity = {
            let mut identity = self.identity.write();
            identity.qrcode_id.clear();
            identity.user_name = user.user_name.clone();
            if !user.uin.is_empty() {
                identity.uin = user.uin.clone();
            }
            identity.clone()
        };
        self.persist(identity)?;
        *self.state.write() = LoginState::LoggedIn;

        info!("Logged in as {}", user.user_name);
        Ok(())
    }

    /// Forget the stored account; returns the previous `(uin, user_name)`
    /// as hints for the next QR request.
    pub fn clear(&self) -> SessionResult<(String, String)> {
        let previous = std::mem::take(&mut *self.identity.write());
        *self.state.write() = LoginState::Unauthenticated;
        self.persist(SessionIdentity::default())?;
        Ok((previous.uin, previous.user_name))
    }

    pub fn logged_out(&self) {
        *self.state.write() = LoginState::LoggedOut;
    }

    fn persist(&self, identity: SessionIdentity) -> SessionResult<()> {
        self.store.set(MEMORY_SLOT_NAME, identity)?;
        self.store.save()?;
        Ok(())
    }
}

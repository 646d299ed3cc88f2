//! PadPlus Session Library
//!
//! Session, request-correlation and cache engine for a streaming WeChat
//! automation backend.
//!
//! # Architecture
//!
//! ```text
//! Consumer ──operations──▶ SessionManager ──ApiRequest──▶ Transport ──▶ Backend
//!    ▲                         │   ▲                                      │
//!    └──── SessionEvent ───────┘   └──────────── StreamFrame ─────────────┘
//!                              │
//!                              ├── LoginSession   (login state, stored identity)
//!                              ├── PendingRequests (request/response correlation)
//!                              ├── CacheManager   (contacts, rooms, members, friendships)
//!                              └── MessageCache   (recent messages)
//! ```
//!
//! # Usage
//!
//! ```bash
//! export PADPLUS_TOKEN=your_token
//! export PADPLUS_STORAGE_PATH=./data/session.db   # optional
//!
//! padplus-session
//! ```
//!
//! Library consumers build a [`SessionManager`] from a [`Transport`] and a
//! [`SessionStore`], call [`SessionManager::start`], then drive it with
//! [`SessionManager::run`] over the frame stream while listening on
//! [`SessionManager::subscribe`].

pub mod cache;
pub mod config;
pub mod convert;
pub mod correlator;
pub mod error;
pub mod event;
pub mod manager;
pub mod message_cache;
pub mod payload;
pub mod request;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;
pub mod ws_transport;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use event::SessionEvent;
pub use manager::SessionManager;
pub use storage::{MemorySessionStore, SessionStore, SqliteSessionStore};
pub use transport::{FrameStream, Transport};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::event::{QrCode, SessionEvent};
    pub use crate::manager::SessionManager;
    pub use crate::payload::*;
    pub use crate::session::{LoginState, ScanStatus};
    pub use crate::storage::{MemorySessionStore, SessionStore, SqliteSessionStore};
    pub use crate::transport::{FrameStream, Transport};
}

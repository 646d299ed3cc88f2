//! Persisted session models

use serde::{Deserialize, Serialize};

/// Identity that survives process restarts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    /// QR code of an in-progress login; cleared once login completes
    #[serde(default)]
    pub qrcode_id: String,
    #[serde(default)]
    pub uin: String,
    #[serde(default)]
    pub user_name: String,
}

impl SessionIdentity {
    pub fn logged_in(uin: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            qrcode_id: String::new(),
            uin: uin.into(),
            user_name: user_name.into(),
        }
    }

    /// A stored `uin` lets the next start skip QR login
    pub fn is_resumable(&self) -> bool {
        !self.uin.is_empty()
    }
}

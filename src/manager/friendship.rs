use serde_json::json;
use tracing::info;

use super::SessionManager;
use crate::error::{SessionError, SessionResult};
use crate::payload::FriendshipPayload;
use crate::types::ApiType;

impl SessionManager {
    pub fn save_friendship(&self, friendship: FriendshipPayload) -> SessionResult<()> {
        let cache = self.cache()?;
        cache.set_friendship(&friendship.id.clone(), friendship);
        Ok(())
    }

    pub fn friendship(&self, friendship_id: &str) -> SessionResult<Option<FriendshipPayload>> {
        Ok(self.cache()?.friendship(friendship_id))
    }

    /// Accept a received friend request. The request is dropped from the
    /// cache once the backend accepts it.
    pub async fn confirm_friendship(&self, friendship_id: &str) -> SessionResult<()> {
        let cache = self.cache()?;
        let friendship = cache
            .friendship(friendship_id)
            .ok_or_else(|| SessionError::NotFound(format!("friendship {friendship_id}")))?;

        self.client
            .operation(
                ApiType::AcceptUser,
                Some(json!({
                    "stranger": friendship.stranger,
                    "ticket": friendship.ticket,
                })),
            )
            .await?;

        cache.delete_friendship(friendship_id);
        info!("Accepted friend request from {}", friendship.contact_id);
        Ok(())
    }
}

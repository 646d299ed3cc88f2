//! Room operations

use serde_json::json;
use tracing::{debug, info, warn};

use super::SessionManager;
use crate::cache::CacheKey;
use crate::error::{SessionError, SessionResult};
use crate::payload::{RoomInvitationPayload, RoomMemberMap, RoomPayload};
use crate::request::parse_response;
use crate::types::{ApiType, CreateRoomResponse};

impl SessionManager {
    /// Cached room, pulling it on a miss
    pub async fn get_room(&self, room_id: &str) -> SessionResult<Option<RoomPayload>> {
        let cache = self.cache()?;
        let upserts = cache.subscribe();
        if let Some(room) = cache.room(room_id) {
            return Ok(Some(room));
        }

        debug!("Room {} not cached, pulling", room_id);
        self.pull_contact(room_id).await?;

        let key = CacheKey::Room(room_id.to_string());
        Ok(cache
            .wait_for(&key, upserts, self.config.cache_wait(), |c| c.room(room_id))
            .await)
    }

    pub async fn room_info(&self, room_id: &str) -> SessionResult<RoomPayload> {
        self.get_room(room_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("room {room_id}")))
    }

    pub fn room_id_list(&self) -> SessionResult<Vec<String>> {
        Ok(self.cache()?.room_ids())
    }

    /// Cached member map of a room, requesting the roster on a miss
    pub async fn get_room_members(&self, room_id: &str) -> SessionResult<Option<RoomMemberMap>> {
        let cache = self.cache()?;
        let upserts = cache.subscribe();
        if let Some(members) = cache.room_member(room_id) {
            return Ok(Some(members));
        }

        debug!("Members of {} not cached, pulling", room_id);
        self.client
            .notify(
                ApiType::GetChatroomMember,
                Some(json!({ "roomId": room_id })),
            )
            .await?;

        let key = CacheKey::RoomMember(room_id.to_string());
        Ok(cache
            .wait_for(&key, upserts, self.config.cache_wait(), |c| {
                c.room_member(room_id)
            })
            .await)
    }

    /// Member ids of a room; empty when the roster never arrives
    pub async fn room_member_id_list(&self, room_id: &str) -> SessionResult<Vec<String>> {
        Ok(self
            .get_room_members(room_id)
            .await?
            .map(|members| members.into_keys().collect())
            .unwrap_or_default())
    }

    pub async fn set_room_topic(&self, room_id: &str, topic: &str) -> SessionResult<()> {
        self.client
            .operation(
                ApiType::RoomTopic,
                Some(json!({ "roomId": room_id, "topic": topic })),
            )
            .await?;
        info!("Set topic of {} to {:?}", room_id, topic);
        Ok(())
    }

    pub async fn set_announcement(&self, room_id: &str, announcement: &str) -> SessionResult<()> {
        self.client
            .operation(
                ApiType::RoomAnnouncement,
                Some(json!({ "roomId": room_id, "announcement": announcement })),
            )
            .await?;
        Ok(())
    }

    pub async fn add_room_member(&self, room_id: &str, contact_id: &str) -> SessionResult<()> {
        if let Some(room) = self.cache()?.room(room_id)
            && room.has_member(contact_id)
        {
            debug!("{} is already a member of {}", contact_id, room_id);
            return Ok(());
        }
        self.client
            .operation(
                ApiType::AddChatroomMember,
                Some(json!({ "roomId": room_id, "memberId": contact_id })),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_room_member(&self, room_id: &str, contact_id: &str) -> SessionResult<()> {
        if let Some(room) = self.cache()?.room(room_id)
            && !room.is_owner(&self.session.user_name())
        {
            warn!("Removing {} from {} without owning the room", contact_id, room_id);
        }
        self.client
            .operation(
                ApiType::DeleteChatroomMember,
                Some(json!({ "roomId": room_id, "memberId": contact_id })),
            )
            .await?;
        Ok(())
    }

    /// Create a room with `contact_ids` and return its id
    pub async fn create_room(&self, topic: &str, contact_ids: &[String]) -> SessionResult<String> {
        let raw = self
            .client
            .request(
                ApiType::CreateRoom,
                Some(json!({ "name": topic, "memberList": contact_ids })),
            )
            .await?;
        let response: CreateRoomResponse = parse_response(ApiType::CreateRoom, &raw)?;
        if response.status != 0 || response.room_id.is_empty() {
            return Err(SessionError::Operation {
                api: ApiType::CreateRoom,
                status: response.status,
                message: "room not created".to_string(),
            });
        }
        info!("Created room {} with {} members", response.room_id, contact_ids.len());
        Ok(response.room_id)
    }

    pub async fn quit_room(&self, room_id: &str) -> SessionResult<()> {
        self.client
            .operation(ApiType::QuitRoom, Some(json!({ "roomId": room_id })))
            .await?;
        if let Ok(cache) = self.cache() {
            cache.delete_room(room_id);
        }
        Ok(())
    }

    // =========================================================================
    // Invitations
    // =========================================================================

    pub fn save_room_invitation(&self, invitation: RoomInvitationPayload) -> SessionResult<()> {
        debug!(
            "Saving room invitation {} to {:?}",
            invitation.id, invitation.room_name
        );
        self.cache()?.set_room_invitation(invitation);
        Ok(())
    }

    /// Cached room invitation; a miss is an error
    pub fn room_invitation(&self, invitation_id: &str) -> SessionResult<RoomInvitationPayload> {
        self.cache()?
            .room_invitation(invitation_id)
            .ok_or_else(|| SessionError::NotFound(format!("room invitation {invitation_id}")))
    }

    /// Forget a handled invitation; `false` if it was not cached
    pub fn delete_room_invitation(&self, invitation_id: &str) -> SessionResult<bool> {
        Ok(self.cache()?.delete_room_invitation(invitation_id))
    }
}

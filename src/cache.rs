//! Session cache for contacts, rooms, room members, room invitations and
//! friendships
//!
//! Pushes and pulls both land in the same upsert path. Every upsert is
//! announced on a broadcast channel so readers waiting for a key that has not
//! arrived yet are woken instead of polling.

use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use crate::payload::{
    ContactPayload, FriendshipPayload, RoomInvitationPayload, RoomMemberMap, RoomPayload,
};

/// Identity of a cached entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Contact(String),
    Room(String),
    RoomMember(String),
    RoomInvitation(String),
    Friendship(String),
}

const UPSERT_CHANNEL_CAPACITY: usize = 256;

/// Cache for one logged-in account
pub struct CacheManager {
    owner: String,
    contacts: DashMap<String, ContactPayload>,
    rooms: DashMap<String, RoomPayload>,
    room_members: DashMap<String, RoomMemberMap>,
    room_invitations: DashMap<String, RoomInvitationPayload>,
    friendships: DashMap<String, FriendshipPayload>,
    upserts: broadcast::Sender<CacheKey>,
}

impl CacheManager {
    pub fn new(owner: impl Into<String>) -> Self {
        let (upserts, _) = broadcast::channel(UPSERT_CHANNEL_CAPACITY);
        Self {
            owner: owner.into(),
            contacts: DashMap::new(),
            rooms: DashMap::new(),
            room_members: DashMap::new(),
            room_invitations: DashMap::new(),
            friendships: DashMap::new(),
            upserts,
        }
    }

    /// User name of the account this cache belongs to
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Subscribe to upsert notifications. Subscribe before the first lookup so
    /// an upsert between lookup and wait is not missed.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.upserts.subscribe()
    }

    fn announce(&self, key: CacheKey) {
        // No receivers is the common case
        let _ = self.upserts.send(key);
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    pub fn set_contact(&self, contact: ContactPayload) {
        let id = contact.user_name.clone();
        self.contacts.insert(id.clone(), contact);
        self.announce(CacheKey::Contact(id));
    }

    pub fn contact(&self, id: &str) -> Option<ContactPayload> {
        self.contacts.get(id).map(|c| c.clone())
    }

    pub fn delete_contact(&self, id: &str) -> bool {
        self.contacts.remove(id).is_some()
    }

    pub fn contact_ids(&self) -> Vec<String> {
        self.contacts.iter().map(|c| c.key().clone()).collect()
    }

    // =========================================================================
    // Rooms
    // =========================================================================

    pub fn set_room(&self, room: RoomPayload) {
        let id = room.chatroom_id.clone();
        self.rooms.insert(id.clone(), room);
        self.announce(CacheKey::Room(id));
    }

    pub fn room(&self, id: &str) -> Option<RoomPayload> {
        self.rooms.get(id).map(|r| r.clone())
    }

    /// Remove a room together with its member map
    pub fn delete_room(&self, id: &str) -> bool {
        self.room_members.remove(id);
        self.rooms.remove(id).is_some()
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.iter().map(|r| r.key().clone()).collect()
    }

    pub fn set_room_member(&self, room_id: &str, members: RoomMemberMap) {
        self.room_members.insert(room_id.to_string(), members);
        self.announce(CacheKey::RoomMember(room_id.to_string()));
    }

    pub fn room_member(&self, room_id: &str) -> Option<RoomMemberMap> {
        self.room_members.get(room_id).map(|m| m.clone())
    }

    pub fn set_room_invitation(&self, invitation: RoomInvitationPayload) {
        let id = invitation.id.clone();
        self.room_invitations.insert(id.clone(), invitation);
        self.announce(CacheKey::RoomInvitation(id));
    }

    pub fn room_invitation(&self, id: &str) -> Option<RoomInvitationPayload> {
        self.room_invitations.get(id).map(|i| i.clone())
    }

    pub fn delete_room_invitation(&self, id: &str) -> bool {
        self.room_invitations.remove(id).is_some()
    }

    // =========================================================================
    // Friendships
    // =========================================================================

    pub fn set_friendship(&self, id: &str, friendship: FriendshipPayload) {
        self.friendships.insert(id.to_string(), friendship);
        self.announce(CacheKey::Friendship(id.to_string()));
    }

    pub fn friendship(&self, id: &str) -> Option<FriendshipPayload> {
        self.friendships.get(id).map(|f| f.clone())
    }

    pub fn delete_friendship(&self, id: &str) -> bool {
        self.friendships.remove(id).is_some()
    }

    // =========================================================================
    // Waiting
    // =========================================================================

    /// Wait up to `window` for `lookup` to yield a value, re-checking whenever
    /// `key` is upserted.
    pub async fn wait_for<T>(
        &self,
        key: &CacheKey,
        mut upserts: broadcast::Receiver<CacheKey>,
        window: Duration,
        lookup: impl Fn(&Self) -> Option<T>,
    ) -> Option<T> {
        let deadline = Instant::now() + window;
        if let Some(value) = lookup(self) {
            return Some(value);
        }

        loop {
            match tokio::time::timeout_at(deadline, upserts.recv()).await {
                Ok(Ok(upserted)) if &upserted == key => {
                    if let Some(value) = lookup(self) {
                        return Some(value);
                    }
                }
                Ok(Ok(_)) => {}
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    debug!("Cache waiter for {:?} lagged by {}", key, skipped);
                    if let Some(value) = lookup(self) {
                        return Some(value);
                    }
                }
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => {
                    return lookup(self);
                }
            }
        }
    }

    /// Wait up to `window` for the next upsert of `key`, ignoring the value
    /// currently cached.
    pub async fn next_upsert(
        &self,
        key: &CacheKey,
        mut upserts: broadcast::Receiver<CacheKey>,
        window: Duration,
    ) -> bool {
        let deadline = Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, upserts.recv()).await {
                Ok(Ok(upserted)) if &upserted == key => return true,
                Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => {}
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return false,
            }
        }
    }
}

//! Internal payload schema held by the caches and handed to consumers

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Room ids carry this suffix; everything else is a contact
pub const ROOM_ID_SUFFIX: &str = "@chatroom";

pub fn is_room_id(id: &str) -> bool {
    id.ends_with(ROOM_ID_SUFFIX)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactGender {
    #[default]
    Unknown,
    Male,
    Female,
}

impl From<u8> for ContactGender {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Male,
            2 => Self::Female,
            _ => Self::Unknown,
        }
    }
}

/// Contact record, keyed by `user_name`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPayload {
    pub user_name: String,
    pub alias: String,
    pub remark: String,
    pub nick_name: String,
    pub big_head_url: String,
    pub small_head_url: String,
    pub gender: ContactGender,
    pub signature: String,
    pub city: String,
    pub province: String,
    pub country: String,
    /// Comma separated tag ids
    pub tag_list: String,
    pub contact_type: i64,
    pub contact_flag: i64,
    pub verify_flag: i64,
    /// Encrypted user name; set for contacts that are not friends
    pub stranger: String,
    pub ticket: String,
}

/// Room record, keyed by `chatroom_id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPayload {
    pub chatroom_id: String,
    pub topic: String,
    pub owner: String,
    pub big_head_url: String,
    pub small_head_url: String,
    pub member_ids: Vec<String>,
    pub member_count: u32,
}

impl RoomPayload {
    pub fn is_owner(&self, user_name: &str) -> bool {
        !self.owner.is_empty() && self.owner == user_name
    }

    pub fn has_member(&self, user_name: &str) -> bool {
        self.member_ids.iter().any(|id| id == user_name)
    }
}

/// Brief member record stored per room
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMemberBrief {
    pub user_name: String,
    pub nick_name: String,
    pub display_name: String,
    pub avatar: String,
    pub inviter: String,
}

/// member user name -> brief record
pub type RoomMemberMap = HashMap<String, RoomMemberBrief>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipKind {
    Receive,
}

/// Friend request, keyed by `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendshipPayload {
    pub id: String,
    pub kind: FriendshipKind,
    pub contact_id: String,
    pub hello: String,
    pub stranger: String,
    pub ticket: String,
    pub timestamp: i64,
}

/// Invitation to join a room, keyed by `id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInvitationPayload {
    pub id: String,
    pub from_user: String,
    pub receiver: String,
    pub room_name: String,
    pub thumb_url: String,
    pub url: String,
    pub timestamp: i64,
}

/// Message kinds understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Text,
    Image,
    Voice,
    FriendRequest,
    ContactCard,
    Video,
    Emoticon,
    Location,
    App,
    System,
    Recalled,
    Other(u32),
}

impl From<u32> for MessageType {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::Text,
            3 => Self::Image,
            34 => Self::Voice,
            37 => Self::FriendRequest,
            42 => Self::ContactCard,
            43 => Self::Video,
            47 => Self::Emoticon,
            48 => Self::Location,
            49 => Self::App,
            10000 => Self::System,
            10002 => Self::Recalled,
            other => Self::Other(other),
        }
    }
}

impl MessageType {
    pub fn code(self) -> u32 {
        match self {
            Self::Text => 1,
            Self::Image => 3,
            Self::Voice => 34,
            Self::FriendRequest => 37,
            Self::ContactCard => 42,
            Self::Video => 43,
            Self::Emoticon => 47,
            Self::Location => 48,
            Self::App => 49,
            Self::System => 10000,
            Self::Recalled => 10002,
            Self::Other(code) => code,
        }
    }
}

/// Received message; never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub msg_id: String,
    pub from_user_name: String,
    pub to_user_name: String,
    pub msg_type: MessageType,
    pub content: String,
    pub create_time: i64,
    pub status: i64,
    pub img_status: i64,
    pub img_buf: String,
    pub msg_source: String,
    pub push_content: String,
    pub new_msg_id: String,
}

impl MessagePayload {
    pub fn room_id(&self) -> Option<&str> {
        [&self.from_user_name, &self.to_user_name]
            .into_iter()
            .find(|id| is_room_id(id))
            .map(String::as_str)
    }
}

/// Descriptor for loading the media behind a received message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichMediaData {
    pub msg_id: String,
    pub content: String,
    pub msg_type: u32,
    pub content_type: String,
    pub src: String,
    pub app_msg_type: Option<u32>,
    pub file_name: Option<String>,
    pub create_time: i64,
    pub from_user_name: String,
    pub to_user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlLinkPayload {
    pub url: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

//! Mapping from wire payloads to the internal schema

use tracing::warn;

use crate::payload::{
    ContactGender, ContactPayload, FriendshipKind, FriendshipPayload, MessagePayload,
    MessageType, RoomMemberBrief, RoomMemberMap, RoomPayload, Tag,
};
use crate::types::{
    FriendRequestMsg, LoginUser, RawContact, RawMessage, RawRoom, RawRoomMember, RawTag,
};

impl From<RawContact> for ContactPayload {
    fn from(raw: RawContact) -> Self {
        Self {
            contact_type: raw.contact_type.trim().parse().unwrap_or_default(),
            user_name: raw.user_name,
            alias: raw.alias,
            remark: raw.remark_name,
            nick_name: raw.nick_name,
            big_head_url: raw.big_head_img_url,
            small_head_url: raw.small_head_img_url,
            gender: ContactGender::from(raw.sex),
            signature: raw.signature,
            city: raw.city,
            province: raw.province,
            country: String::new(),
            tag_list: raw.label_lists,
            contact_flag: raw.contact_flag,
            verify_flag: raw.verify_flag,
            stranger: raw.encrypt_username,
            ticket: String::new(),
        }
    }
}

impl From<&RawRoom> for RoomPayload {
    fn from(raw: &RawRoom) -> Self {
        let member_ids: Vec<String> = raw.ext_info.iter().map(|m| m.user_name.clone()).collect();
        Self {
            chatroom_id: raw.user_name.clone(),
            topic: raw.nick_name.clone(),
            owner: raw.chat_room_owner.clone(),
            big_head_url: raw.big_head_img_url.clone(),
            small_head_url: raw.small_head_img_url.clone(),
            member_count: raw.member_count.max(member_ids.len() as u32),
            member_ids,
        }
    }
}

impl From<RawMessage> for MessagePayload {
    fn from(raw: RawMessage) -> Self {
        Self {
            msg_id: raw.msg_id,
            from_user_name: raw.from_user_name,
            to_user_name: raw.to_user_name,
            msg_type: MessageType::from(raw.msg_type),
            content: raw.content,
            create_time: raw.create_time,
            status: raw.status,
            img_status: raw.img_status,
            img_buf: raw.img_buf,
            msg_source: raw.msg_source,
            push_content: raw.push_content,
            new_msg_id: raw.new_msg_id,
        }
    }
}

impl From<RawTag> for Tag {
    fn from(raw: RawTag) -> Self {
        Self {
            id: raw.label_id,
            name: raw.label_name,
        }
    }
}

pub fn brief_room_members(members: &[RawRoomMember]) -> RoomMemberMap {
    members
        .iter()
        .map(|m| {
            (
                m.user_name.clone(),
                RoomMemberBrief {
                    user_name: m.user_name.clone(),
                    nick_name: m.nick_name.clone(),
                    display_name: m.display_name.clone(),
                    avatar: m.head_img_url.clone(),
                    inviter: m.invited_by.clone(),
                },
            )
        })
        .collect()
}

/// Minimal contact built from a room membership entry
pub fn contact_from_member(member: &RawRoomMember) -> ContactPayload {
    ContactPayload {
        user_name: member.user_name.clone(),
        nick_name: member.nick_name.clone(),
        remark: member.display_name.clone(),
        big_head_url: member.head_img_url.clone(),
        small_head_url: member.head_img_url.clone(),
        ..ContactPayload::default()
    }
}

/// Self contact seeded at login, before the full record is pulled
pub fn self_contact(user: &LoginUser) -> ContactPayload {
    ContactPayload {
        user_name: user.user_name.clone(),
        nick_name: user.nick_name.clone(),
        big_head_url: user.head_img_url.clone(),
        ..ContactPayload::default()
    }
}

/// Friend request carried by a verify message (`<msg fromusername="..." .../>`)
pub fn friendship_from_message(message: &MessagePayload) -> Option<FriendshipPayload> {
    if message.msg_type != MessageType::FriendRequest {
        return None;
    }
    let request: FriendRequestMsg = match serde_xml_rs::from_str(&message.content) {
        Ok(request) => request,
        Err(e) => {
            warn!("Unreadable friend request {}: {}", message.msg_id, e);
            return None;
        }
    };
    if request.from_user_name.is_empty() {
        return None;
    }
    Some(FriendshipPayload {
        id: message.msg_id.clone(),
        kind: FriendshipKind::Receive,
        contact_id: request.from_user_name,
        hello: request.content,
        stranger: request.encrypt_user_name,
        ticket: request.ticket,
        timestamp: message.create_time,
    })
}

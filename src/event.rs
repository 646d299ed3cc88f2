//! Inbound frame decoding and outbound session events

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{SessionError, SessionResult};
use crate::payload::{MessagePayload, is_room_id};
use crate::session::ScanStatus;
use crate::types::*;

// =============================================================================
// Inbound
// =============================================================================

/// `CONTACT_MODIFY` carries either kind of record
#[derive(Debug, Clone)]
pub enum ContactOrRoom {
    Contact(RawContact),
    Room(RawRoom),
}

/// Decoded frame, one variant per response type
#[derive(Debug, Clone)]
pub enum InboundEvent {
    QrcodeIssued(QrcodeIssued),
    ScanStatus(ScanData),
    LoginComplete(LoginUser),
    AutoLogin(AutoLoginData),
    Logout(LogoutData),
    ContactList(RawContact),
    ContactModify(ContactOrRoom),
    ContactDelete(ContactDeleted),
    MessageReceived(RawMessage),
    RoomMemberList {
        room_id: String,
        members: Vec<RawRoomMember>,
    },
    RoomMemberModify {
        room_id: String,
        members: Vec<RawRoomMember>,
    },
    StatusNotify(String),
    MediaFetched {
        msg_id: String,
        data: String,
    },
    RequestResponse {
        request_id: String,
        data: String,
    },
}

fn parse<T: DeserializeOwned>(what: &str, data: &str) -> SessionResult<T> {
    serde_json::from_str(data).map_err(|e| SessionError::Malformed(format!("{what}: {e}")))
}

impl InboundEvent {
    /// Decode a frame. Unknown response types and frames without data yield
    /// `Ok(None)`; unparseable data is an error for this frame only.
    pub fn decode(frame: StreamFrame) -> SessionResult<Option<Self>> {
        let Some(data) = frame.data.filter(|d| !d.is_empty()) else {
            return Ok(None);
        };

        let event = match frame.response_type {
            ResponseType::LoginQrcode => Self::QrcodeIssued(parse("LOGIN_QRCODE", &data)?),
            ResponseType::QrcodeScan => Self::ScanStatus(parse("QRCODE_SCAN", &data)?),
            ResponseType::QrcodeLogin => Self::LoginComplete(parse("QRCODE_LOGIN", &data)?),
            ResponseType::AutoLogin => Self::AutoLogin(parse("AUTO_LOGIN", &data)?),
            ResponseType::AccountLogout => Self::Logout(parse("ACCOUNT_LOGOUT", &data)?),
            ResponseType::ContactList => Self::ContactList(parse("CONTACT_LIST", &data)?),
            ResponseType::ContactModify => {
                let value: serde_json::Value = parse("CONTACT_MODIFY", &data)?;
                let is_room = value
                    .get("UserName")
                    .and_then(|v| v.as_str())
                    .is_some_and(is_room_id);
                if is_room {
                    Self::ContactModify(ContactOrRoom::Room(serde_json::from_value(value)?))
                } else {
                    Self::ContactModify(ContactOrRoom::Contact(serde_json::from_value(value)?))
                }
            }
            ResponseType::ContactDelete => Self::ContactDelete(parse("CONTACT_DELETE", &data)?),
            ResponseType::MessageReceive => {
                Self::MessageReceived(parse("MESSAGE_RECEIVE", &data)?)
            }
            ResponseType::RoomMemberList => {
                let (room_id, members) = decode_members("ROOM_MEMBER_LIST", &data)?;
                Self::RoomMemberList { room_id, members }
            }
            ResponseType::RoomMemberModify => {
                let (room_id, members) = decode_members("ROOM_MEMBER_MODIFY", &data)?;
                Self::RoomMemberModify { room_id, members }
            }
            ResponseType::StatusNotify => Self::StatusNotify(data),
            ResponseType::MessageMediaSrc => {
                let media: MediaData = parse("MESSAGE_MEDIA_SRC", &data)?;
                Self::MediaFetched {
                    msg_id: media.msg_id,
                    data,
                }
            }
            ResponseType::RequestResponse => {
                let request_id = frame.request_id.ok_or_else(|| {
                    SessionError::Malformed("REQUEST_RESPONSE without request id".to_string())
                })?;
                Self::RequestResponse { request_id, data }
            }
            ResponseType::Unknown => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn decode_members(what: &str, data: &str) -> SessionResult<(String, Vec<RawRoomMember>)> {
    let list: RoomMemberList = parse(what, data)?;
    let members = parse(what, &list.members_json)?;
    Ok((list.room_id, members))
}

// =============================================================================
// Outbound
// =============================================================================

/// QR code issued for login
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrCode {
    pub qrcode_id: String,
    /// PNG image bytes
    pub image: Vec<u8>,
}

impl QrCode {
    pub fn decode(issued: &QrcodeIssued) -> SessionResult<Self> {
        let image = general_purpose::STANDARD
            .decode(issued.qrcode.trim())
            .map_err(|e| SessionError::Malformed(format!("qrcode image: {e}")))?;
        Ok(Self {
            qrcode_id: issued.qrcode_id.clone(),
            image,
        })
    }
}

/// Events emitted to the consumer
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Scan {
        status: ScanStatus,
        qrcode: Option<QrCode>,
    },
    Login(LoginUser),
    Logout(LogoutData),
    Message(Arc<MessagePayload>),
    ContactList(String),
    ContactModify(String),
    ContactDelete(String),
    RoomMemberList(String),
    RoomMemberModify(String),
    StatusNotify(String),
}

impl SessionEvent {
    /// Event name as seen by consumers
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scan { .. } => "scan",
            Self::Login(_) => "login",
            Self::Logout(_) => "logout",
            Self::Message(_) => "message",
            Self::ContactList(_) => "contact-list",
            Self::ContactModify(_) => "contact-modify",
            Self::ContactDelete(_) => "contact-delete",
            Self::RoomMemberList(_) => "room-member-list",
            Self::RoomMemberModify(_) => "room-member-modify",
            Self::StatusNotify(_) => "status-notify",
        }
    }
}

//! Wire protocol types exchanged with the streaming backend
//!
//! Every payload travels as a JSON string inside a [`StreamFrame`]; the
//! structs below mirror the backend's field labels and are mapped into the
//! internal schema by [`crate::convert`].

use serde::{Deserialize, Serialize};

// =============================================================================
// Frames
// =============================================================================

/// Response type tag carried by every inbound frame
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseType {
    LoginQrcode,
    QrcodeScan,
    QrcodeLogin,
    AutoLogin,
    AccountLogout,
    ContactList,
    ContactModify,
    ContactDelete,
    MessageReceive,
    RoomMemberList,
    RoomMemberModify,
    StatusNotify,
    MessageMediaSrc,
    RequestResponse,
    /// Tags added by newer backends
    #[serde(other)]
    Unknown,
}

/// One frame read from the duplex stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFrame {
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl StreamFrame {
    pub fn new(response_type: ResponseType, data: impl Into<String>) -> Self {
        Self {
            response_type,
            request_id: None,
            data: Some(data.into()),
        }
    }

    pub fn response(request_id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::RequestResponse,
            request_id: Some(request_id.into()),
            data: Some(data.into()),
        }
    }
}

/// Backend API selector for outbound requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiType {
    GetQrcode,
    Init,
    Logout,
    GetContact,
    SearchContact,
    SyncContact,
    ContactAlias,
    CreateLabel,
    GetAllLabel,
    AddLabel,
    ModifyLabel,
    DeleteLabel,
    SendMessage,
    SendContact,
    SendFile,
    GetMessageMedia,
    CreateRoom,
    QuitRoom,
    RoomTopic,
    RoomAnnouncement,
    AddChatroomMember,
    DeleteChatroomMember,
    GetChatroomMember,
    AcceptUser,
}

/// Outbound request handed to the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    pub request_id: String,
    pub api_type: ApiType,
    pub uin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

// =============================================================================
// Login payloads
// =============================================================================

/// `LOGIN_QRCODE` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrcodeIssued {
    pub qrcode_id: String,
    /// Base64 encoded PNG
    pub qrcode: String,
}

/// Scan progress reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum QrcodeStatus {
    Waiting,
    Scanned,
    Confirmed,
    Canceled,
    Expired,
    Other(u8),
}

impl From<u8> for QrcodeStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Waiting,
            1 => Self::Scanned,
            2 => Self::Confirmed,
            4 => Self::Canceled,
            3 => Self::Expired,
            other => Self::Other(other),
        }
    }
}

impl From<QrcodeStatus> for u8 {
    fn from(value: QrcodeStatus) -> Self {
        match value {
            QrcodeStatus::Waiting => 0,
            QrcodeStatus::Scanned => 1,
            QrcodeStatus::Confirmed => 2,
            QrcodeStatus::Expired => 3,
            QrcodeStatus::Canceled => 4,
            QrcodeStatus::Other(other) => other,
        }
    }
}

/// `QRCODE_SCAN` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanData {
    pub status: QrcodeStatus,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub head_url: String,
    #[serde(default)]
    pub msg: Option<String>,
}

/// Logged-in account as reported by `QRCODE_LOGIN` and `AUTO_LOGIN`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    #[serde(default)]
    pub uin: String,
    pub user_name: String,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub head_img_url: String,
}

/// `AUTO_LOGIN` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoLoginData {
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub wechat_user: Option<LoginUser>,
}

/// `ACCOUNT_LOGOUT` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutData {
    #[serde(default)]
    pub uin: String,
    #[serde(default)]
    pub message: String,
}

// =============================================================================
// Contact and room payloads
// =============================================================================

/// Contact record as pushed by `CONTACT_LIST` / `CONTACT_MODIFY`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawContact {
    pub user_name: String,
    pub alias: String,
    pub big_head_img_url: String,
    pub small_head_img_url: String,
    pub city: String,
    pub province: String,
    pub contact_flag: i64,
    pub contact_type: String,
    pub label_lists: String,
    pub nick_name: String,
    pub remark_name: String,
    pub sex: u8,
    pub signature: String,
    pub encrypt_username: String,
    pub verify_flag: i64,
}

/// Room member entry inside a room push or member list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawRoomMember {
    pub user_name: String,
    pub nick_name: String,
    pub display_name: String,
    pub head_img_url: String,
    pub invited_by: String,
}

/// Room record as pushed by `CONTACT_MODIFY`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawRoom {
    pub user_name: String,
    pub nick_name: String,
    pub chat_room_owner: String,
    pub big_head_img_url: String,
    pub small_head_img_url: String,
    pub member_count: u32,
    pub ext_info: Vec<RawRoomMember>,
}

/// `CONTACT_DELETE` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactDeleted {
    #[serde(rename = "UserName")]
    pub user_name: String,
}

/// `ROOM_MEMBER_LIST` / `ROOM_MEMBER_MODIFY` payload; members arrive as a
/// nested JSON string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMemberList {
    pub room_id: String,
    pub members_json: String,
}

/// Result of a `SEARCH_CONTACT` request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SearchContact {
    pub user_name: String,
    pub nick_name: String,
    pub big_head_img_url: String,
    pub small_head_img_url: String,
    pub sex: u8,
    pub signature: String,
    pub alias: String,
    pub ticket: String,
    pub status: i64,
}

// =============================================================================
// Message payloads
// =============================================================================

/// `MESSAGE_RECEIVE` payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawMessage {
    pub msg_id: String,
    pub from_user_name: String,
    pub to_user_name: String,
    pub msg_type: u32,
    pub content: String,
    pub create_time: i64,
    pub status: i64,
    pub img_status: i64,
    pub img_buf: String,
    pub msg_source: String,
    pub push_content: String,
    pub new_msg_id: String,
}

/// Content of a friend request message, an XML element whose attributes
/// carry the request (`<msg fromusername="..." ticket="..." .../>`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FriendRequestMsg {
    #[serde(rename = "fromusername")]
    pub from_user_name: String,
    #[serde(rename = "fromnickname")]
    pub from_nick_name: String,
    #[serde(rename = "encryptusername")]
    pub encrypt_user_name: String,
    pub content: String,
    pub ticket: String,
}

/// `MESSAGE_MEDIA_SRC` payload; also the result of a rich media load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaData {
    pub msg_id: String,
    pub src: String,
    pub thumb: String,
    pub status: i64,
}

// =============================================================================
// Request responses
// =============================================================================

/// Generic status envelope returned for most requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationResponse {
    pub status: i64,
    pub message: String,
    pub msg_id: Option<String>,
}

/// Single tag (label) entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTag {
    #[serde(rename = "LabelID")]
    pub label_id: String,
    #[serde(rename = "LabelName")]
    pub label_name: String,
}

/// Response to `CREATE_LABEL` and `GET_ALL_LABEL`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagListResponse {
    pub count: u32,
    pub label_list: Vec<RawTag>,
    pub status: i64,
    pub message: String,
}

/// Response to `CREATE_ROOM`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    #[serde(alias = "chatroomId")]
    pub room_id: String,
    #[serde(default)]
    pub status: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_type_tags() {
        let frame: StreamFrame =
            serde_json::from_str(r#"{"responseType":"MESSAGE_MEDIA_SRC","data":"{}"}"#).unwrap();
        assert_eq!(frame.response_type, ResponseType::MessageMediaSrc);
        assert!(frame.request_id.is_none());

        let frame: StreamFrame =
            serde_json::from_str(r#"{"responseType":"SOMETHING_NEW"}"#).unwrap();
        assert_eq!(frame.response_type, ResponseType::Unknown);
    }

    #[test]
    fn test_api_request_serialize() {
        let request = ApiRequest {
            request_id: "r1".to_string(),
            api_type: ApiType::GetQrcode,
            uin: String::new(),
            data: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"apiType\":\"GET_QRCODE\""));
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_qrcode_status_codes() {
        let scan: ScanData = serde_json::from_str(r#"{"status":1,"user_name":"wxid_a"}"#).unwrap();
        assert_eq!(scan.status, QrcodeStatus::Scanned);
        assert_eq!(QrcodeStatus::from(9), QrcodeStatus::Other(9));
        assert_eq!(u8::from(QrcodeStatus::Canceled), 4);
    }

    #[test]
    fn test_raw_contact_defaults() {
        let contact: RawContact =
            serde_json::from_str(r#"{"UserName":"wxid_1","NickName":"Alice","Sex":2}"#).unwrap();
        assert_eq!(contact.user_name, "wxid_1");
        assert_eq!(contact.nick_name, "Alice");
        assert!(contact.encrypt_username.is_empty());
    }
}

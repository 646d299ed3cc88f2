//! Outbound messaging and media loading

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use super::SessionManager;
use crate::error::{SessionError, SessionResult};
use crate::payload::{MessagePayload, MessageType, RichMediaData, UrlLinkPayload};
use crate::request::parse_response;
use crate::types::{ApiType, MediaData};

impl SessionManager {
    async fn send(
        &self,
        api_type: ApiType,
        data: serde_json::Value,
    ) -> SessionResult<Option<String>> {
        let response = self.client.operation(api_type, Some(data)).await?;
        if let Some(msg_id) = &response.msg_id {
            debug!("{:?} delivered as {}", api_type, msg_id);
        }
        Ok(response.msg_id)
    }

    /// Send a message of `msg_type` to `receiver`. `mentions` are user names
    /// to @ in a room. Returns the backend message id when reported.
    pub async fn send_message(
        &self,
        receiver: &str,
        content: &str,
        msg_type: MessageType,
        mentions: &[String],
    ) -> SessionResult<Option<String>> {
        let mut data = json!({
            "fromUserName": self.session.user_name(),
            "toUserName": receiver,
            "content": content,
            "type": msg_type.code(),
        });
        if !mentions.is_empty() {
            data["mentionListStr"] = json!(mentions.join(","));
        }
        self.send(ApiType::SendMessage, data).await
    }

    pub async fn send_text(&self, receiver: &str, text: &str) -> SessionResult<Option<String>> {
        self.send_message(receiver, text, MessageType::Text, &[]).await
    }

    /// Share the card of `contact_id` with `receiver`
    pub async fn send_contact(
        &self,
        receiver: &str,
        contact_id: &str,
    ) -> SessionResult<Option<String>> {
        let contact = self
            .get_contact(contact_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("contact card {contact_id}")))?;

        let card = json!({
            "headImgUrl": contact.small_head_url,
            "nickName": contact.nick_name,
            "userName": contact.user_name,
        });
        self.send(
            ApiType::SendContact,
            json!({
                "fromUserName": self.session.user_name(),
                "toUserName": receiver,
                "content": card.to_string(),
            }),
        )
        .await
    }

    /// Send a file already uploaded to `url`
    pub async fn send_file(
        &self,
        receiver: &str,
        url: &str,
        file_name: &str,
        sub_type: &str,
    ) -> SessionResult<Option<String>> {
        info!("Sending file {} to {}", file_name, receiver);
        self.send(
            ApiType::SendFile,
            json!({
                "fromUserName": self.session.user_name(),
                "toUserName": receiver,
                "url": url,
                "fileName": file_name,
                "subType": sub_type,
            }),
        )
        .await
    }

    pub async fn send_url_link(
        &self,
        receiver: &str,
        link: &UrlLinkPayload,
    ) -> SessionResult<Option<String>> {
        let card = json!({
            "des": link.description,
            "thumburl": link.thumbnail_url,
            "title": link.title,
            "type": 5,
            "url": link.url,
        });
        self.send_message(receiver, &card.to_string(), MessageType::App, &[])
            .await
    }

    /// Fetch the media source behind a received message. The answer arrives
    /// as a media frame keyed by the message id.
    pub async fn load_rich_media_data(&self, media: &RichMediaData) -> SessionResult<MediaData> {
        let data = serde_json::to_value(media)?;
        let raw = self
            .client
            .request_keyed(&media.msg_id, ApiType::GetMessageMedia, Some(data))
            .await?;
        parse_response(ApiType::GetMessageMedia, &raw)
    }

    /// Recently received message, if still in the recency cache
    pub fn message_payload(&self, msg_id: &str) -> Option<Arc<MessagePayload>> {
        self.messages.lock().get(msg_id)
    }
}

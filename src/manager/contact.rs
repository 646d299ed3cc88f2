//! Contact and tag operations

use serde_json::json;
use tracing::{debug, info};

use super::SessionManager;
use crate::cache::CacheKey;
use crate::error::{SessionError, SessionResult};
use crate::payload::{ContactPayload, Tag};
use crate::request::parse_response;
use crate::types::{ApiType, SearchContact, TagListResponse};

impl SessionManager {
    /// Ask the backend to push the contact (or room) record for `id`
    pub(crate) async fn pull_contact(&self, id: &str) -> SessionResult<()> {
        self.client
            .notify(ApiType::GetContact, Some(json!({ "userName": id })))
            .await
    }

    /// Cached contact, pulling it from the backend on a miss. `None` when no
    /// push arrives within the cache wait window.
    pub async fn get_contact(&self, contact_id: &str) -> SessionResult<Option<ContactPayload>> {
        let cache = self.cache()?;
        let upserts = cache.subscribe();
        if let Some(contact) = cache.contact(contact_id) {
            return Ok(Some(contact));
        }

        debug!("Contact {} not cached, pulling", contact_id);
        self.pull_contact(contact_id).await?;

        let key = CacheKey::Contact(contact_id.to_string());
        Ok(cache
            .wait_for(&key, upserts, self.config.cache_wait(), |c| {
                c.contact(contact_id)
            })
            .await)
    }

    /// Like [`get_contact`](Self::get_contact) but a miss is an error
    pub async fn contact_payload(&self, contact_id: &str) -> SessionResult<ContactPayload> {
        self.get_contact(contact_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("contact {contact_id}")))
    }

    pub fn contact_id_list(&self) -> SessionResult<Vec<String>> {
        Ok(self.cache()?.contact_ids())
    }

    pub async fn set_contact_alias(&self, contact_id: &str, alias: &str) -> SessionResult<()> {
        self.client
            .operation(
                ApiType::ContactAlias,
                Some(json!({ "userName": contact_id, "newRemarkName": alias })),
            )
            .await?;
        info!("Set alias of {} to {:?}", contact_id, alias);
        Ok(())
    }

    /// Ask the backend to push the full contact list again
    pub async fn sync_contacts(&self) -> SessionResult<()> {
        self.client.notify(ApiType::SyncContact, None).await
    }

    /// Look up an account that is not necessarily a friend
    pub async fn search_contact(&self, contact_id: &str) -> SessionResult<SearchContact> {
        let raw = self
            .client
            .request(ApiType::SearchContact, Some(json!({ "wxid": contact_id })))
            .await?;
        parse_response(ApiType::SearchContact, &raw)
    }

    // =========================================================================
    // Tags
    // =========================================================================

    async fn tag_request(
        &self,
        api_type: ApiType,
        data: Option<serde_json::Value>,
    ) -> SessionResult<Vec<Tag>> {
        let raw = self.client.request(api_type, data).await?;
        let response: TagListResponse = parse_response(api_type, &raw)?;
        if response.status != 0 {
            return Err(SessionError::Operation {
                api: api_type,
                status: response.status,
                message: response.message,
            });
        }
        Ok(response.label_list.into_iter().map(Tag::from).collect())
    }

    /// Create the tag `name`, or return the existing one. Returns the tag
    /// ids, comma separated.
    pub async fn get_or_create_tag(&self, name: &str) -> SessionResult<String> {
        let tags = self
            .tag_request(ApiType::CreateLabel, Some(json!({ "labelName": name })))
            .await?;
        if tags.is_empty() {
            return Err(SessionError::Malformed(format!("no tag returned for {name:?}")));
        }
        Ok(tags
            .into_iter()
            .map(|t| t.id)
            .collect::<Vec<_>>()
            .join(","))
    }

    pub async fn tag_list(&self) -> SessionResult<Vec<Tag>> {
        self.tag_request(ApiType::GetAllLabel, None).await
    }

    /// Attach the tags in `tag_ids` (comma separated) to a contact
    pub async fn add_tag(&self, tag_ids: &str, contact_id: &str) -> SessionResult<()> {
        self.client
            .operation(
                ApiType::AddLabel,
                Some(json!({ "labelIds": tag_ids, "userName": contact_id })),
            )
            .await?;
        Ok(())
    }

    pub async fn modify_tag(&self, tag_id: &str, name: &str) -> SessionResult<()> {
        self.client
            .operation(
                ApiType::ModifyLabel,
                Some(json!({ "labelId": tag_id, "labelName": name })),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_tag(&self, tag_ids: &str) -> SessionResult<()> {
        self.client
            .operation(ApiType::DeleteLabel, Some(json!({ "labelIds": tag_ids })))
            .await?;
        Ok(())
    }
}

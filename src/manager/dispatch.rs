//! Frame dispatch loop and per-frame handlers

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use super::SessionManager;
use crate::cache::{CacheKey, CacheManager};
use crate::convert;
use crate::error::{SessionError, SessionResult};
use crate::event::{ContactOrRoom, InboundEvent, QrCode, SessionEvent};
use crate::payload::{ContactPayload, MessagePayload, RoomPayload, is_room_id};
use crate::session::ScanTransition;
use crate::types::{LoginUser, LogoutData, QrcodeIssued, RawRoomMember, ScanData, StreamFrame};

impl SessionManager {
    /// Drive the session from `frames` until the stream ends or the backend
    /// logs the account out. Per-frame failures are logged and skipped.
    pub async fn run<S>(&self, mut frames: S) -> SessionResult<()>
    where
        S: Stream<Item = StreamFrame> + Unpin,
    {
        while let Some(frame) = frames.next().await {
            match self.handle_frame(frame).await {
                Ok(()) => {}
                Err(SessionError::RemoteLogout(reason)) => {
                    return Err(SessionError::RemoteLogout(reason));
                }
                Err(e) => error!("Failed to handle frame: {}", e),
            }
        }

        info!("Frame stream ended");
        Ok(())
    }

    /// Apply one frame. Returns once its cache and state effects are done.
    pub async fn handle_frame(&self, frame: StreamFrame) -> SessionResult<()> {
        if self.config.debug_mode {
            debug!("Frame {:?}: {:?}", frame.response_type, frame.data);
        }

        let Some(event) = InboundEvent::decode(frame)? else {
            return Ok(());
        };

        match event {
            InboundEvent::QrcodeIssued(issued) => self.on_qrcode_issued(&issued),
            InboundEvent::ScanStatus(scan) => self.on_scan_status(scan).await,
            InboundEvent::LoginComplete(user) => self.complete_login(user),
            InboundEvent::AutoLogin(auto) => match auto.wechat_user {
                Some(user) if auto.online => self.complete_login(user),
                _ => self.on_auto_login_offline().await,
            },
            InboundEvent::Logout(data) => self.on_logout(data),
            InboundEvent::ContactList(raw) => {
                let contact = ContactPayload::from(raw);
                let id = contact.user_name.clone();
                self.cache()?.set_contact(contact);
                self.emit(SessionEvent::ContactList(id));
                Ok(())
            }
            InboundEvent::ContactModify(record) => self.on_contact_modify(record),
            InboundEvent::ContactDelete(deleted) => {
                let cache = self.cache()?;
                let id = deleted.user_name;
                let removed = if is_room_id(&id) {
                    cache.delete_room(&id)
                } else {
                    cache.delete_contact(&id)
                };
                debug!("Deleted {} from cache: {}", id, removed);
                self.emit(SessionEvent::ContactDelete(id));
                Ok(())
            }
            InboundEvent::MessageReceived(raw) => self.on_message(MessagePayload::from(raw)),
            InboundEvent::RoomMemberList { room_id, members } => {
                self.on_room_members(&room_id, &members)?;
                self.emit(SessionEvent::RoomMemberList(room_id));
                Ok(())
            }
            InboundEvent::RoomMemberModify { room_id, members } => {
                self.on_room_members(&room_id, &members)?;
                self.emit(SessionEvent::RoomMemberModify(room_id));
                Ok(())
            }
            InboundEvent::StatusNotify(data) => {
                self.emit(SessionEvent::StatusNotify(data));
                Ok(())
            }
            InboundEvent::MediaFetched { msg_id, data } => {
                self.pending.resolve(&msg_id, data);
                Ok(())
            }
            InboundEvent::RequestResponse { request_id, data } => {
                self.pending.resolve(&request_id, data);
                Ok(())
            }
        }
    }

    // =========================================================================
    // Login
    // =========================================================================

    fn on_qrcode_issued(&self, issued: &QrcodeIssued) -> SessionResult<()> {
        let qrcode = QrCode::decode(issued)?;
        let status = self.session.qrcode_issued(&issued.qrcode_id);
        info!("QR code {} issued, awaiting scan", issued.qrcode_id);
        self.emit(SessionEvent::Scan {
            status,
            qrcode: Some(qrcode),
        });
        Ok(())
    }

    async fn on_scan_status(&self, scan: ScanData) -> SessionResult<()> {
        info!(
            "QR scan status {:?} by {:?}: {}",
            scan.status,
            scan.user_name,
            scan.msg.as_deref().unwrap_or_default()
        );

        match self.session.scan_status(scan.status) {
            ScanTransition::Emit(status) => {
                self.emit(SessionEvent::Scan {
                    status,
                    qrcode: None,
                });
                Ok(())
            }
            ScanTransition::Reissue { uin, user_name } => {
                let unresolved = self.pending.pending_count();
                if unresolved > 0 {
                    warn!(
                        "QR code expired with {} unresolved request(s), oldest waiting {:?}",
                        unresolved,
                        self.pending.oldest_age()
                    );
                }
                self.request_qrcode(Some((uin, user_name))).await
            }
            ScanTransition::Ignore => Ok(()),
        }
    }

    fn complete_login(&self, user: LoginUser) -> SessionResult<()> {
        self.session.login(&user)?;

        let cache = self.init_cache(&user.user_name);
        cache.set_contact(convert::self_contact(&user));

        self.emit(SessionEvent::Login(user.clone()));
        self.spawn_self_refresh(cache, user.user_name);
        Ok(())
    }

    /// Pull the full self contact; the push it triggers replaces the seed
    fn spawn_self_refresh(&self, cache: Arc<CacheManager>, user_name: String) {
        let manager = self.clone();
        tokio::spawn(async move {
            match manager.refresh_contact(&cache, &user_name).await {
                Ok(true) => debug!("Self contact {} refreshed", user_name),
                Ok(false) => debug!("Self contact {} not refreshed in time", user_name),
                Err(e) => warn!("Failed to refresh self contact {}: {}", user_name, e),
            }
        });
    }

    async fn on_auto_login_offline(&self) -> SessionResult<()> {
        info!("Stored session is offline, falling back to QR login");
        let hints = self.session.clear()?;
        self.request_qrcode(Some(hints)).await
    }

    fn on_logout(&self, data: LogoutData) -> SessionResult<()> {
        warn!("Backend logged out {}: {}", data.uin, data.message);
        let reason = data.message.clone();
        self.emit(SessionEvent::Logout(data));
        self.session.logged_out();

        let unresolved = self.pending.pending_count();
        if unresolved > 0 {
            warn!("{} request(s) unresolved at logout", unresolved);
        }
        Err(SessionError::RemoteLogout(reason))
    }

    // =========================================================================
    // Contacts and rooms
    // =========================================================================

    fn on_contact_modify(&self, record: ContactOrRoom) -> SessionResult<()> {
        let cache = self.cache()?;
        let id = match record {
            ContactOrRoom::Contact(raw) => {
                let contact = ContactPayload::from(raw);
                let id = contact.user_name.clone();
                cache.set_contact(contact);
                id
            }
            ContactOrRoom::Room(raw) => {
                let room = RoomPayload::from(&raw);
                let id = room.chatroom_id.clone();
                cache.set_room_member(&id, convert::brief_room_members(&raw.ext_info));
                cache.set_room(room);
                id
            }
        };
        self.emit(SessionEvent::ContactModify(id));
        Ok(())
    }

    /// Replace the member map and back-fill contacts the cache does not know
    fn on_room_members(&self, room_id: &str, members: &[RawRoomMember]) -> SessionResult<()> {
        let cache = self.cache()?;
        cache.set_room_member(room_id, convert::brief_room_members(members));

        let self_id = self.session.user_name();
        let mut filled = 0;
        for member in members {
            // the account's own record comes from login and its refresh
            if member.user_name == self_id {
                continue;
            }
            let known = cache
                .contact(&member.user_name)
                .is_some_and(|c| !c.stranger.is_empty());
            if !known {
                cache.set_contact(convert::contact_from_member(member));
                filled += 1;
            }
        }
        debug!(
            "Room {} has {} members, back-filled {} contacts",
            room_id,
            members.len(),
            filled
        );
        Ok(())
    }

    // =========================================================================
    // Messages
    // =========================================================================

    fn on_message(&self, message: MessagePayload) -> SessionResult<()> {
        let message = Arc::new(message);
        {
            let mut messages = self.messages.lock();
            if messages.contains(&message.msg_id) {
                debug!("Message {} received again", message.msg_id);
            }
            messages.insert(message.clone());
        }

        if let Some(friendship) = convert::friendship_from_message(&message) {
            match self.cache() {
                Ok(cache) => {
                    info!("Friend request from {}", friendship.contact_id);
                    cache.set_friendship(&friendship.id.clone(), friendship);
                }
                Err(e) => warn!("Dropping friend request {}: {}", message.msg_id, e),
            }
        }

        self.emit(SessionEvent::Message(message));
        Ok(())
    }

    /// Pull `id` and wait for the resulting push; `Ok(true)` if it arrived
    pub(crate) async fn refresh_contact(
        &self,
        cache: &CacheManager,
        id: &str,
    ) -> SessionResult<bool> {
        let key = CacheKey::Contact(id.to_string());
        let upserts = cache.subscribe();
        self.pull_contact(id).await?;
        Ok(cache
            .next_upsert(&key, upserts, self.config.cache_wait())
            .await)
    }
}

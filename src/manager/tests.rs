use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose;
use futures_util::stream;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::SessionManager;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::payload::{RichMediaData, RoomInvitationPayload, RoomPayload, is_room_id};
use crate::session::{LoginState, ScanStatus};
use crate::storage::{MEMORY_SLOT_NAME, MemorySessionStore, SessionIdentity, SessionStore};
use crate::transport::mock::MockTransport;
use crate::types::{ApiRequest, ApiType, ResponseType, StreamFrame};

fn manager_with(store: Arc<MemorySessionStore>) -> (SessionManager, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let manager = SessionManager::new(SessionConfig::new("test-token"), transport.clone(), store);
    (manager, transport)
}

fn manager() -> (SessionManager, Arc<MockTransport>) {
    manager_with(Arc::new(MemorySessionStore::new()))
}

fn login_frame() -> StreamFrame {
    StreamFrame::new(
        ResponseType::QrcodeLogin,
        json!({ "uin": "U1", "userName": "wxid_self", "nickName": "Me" }).to_string(),
    )
}

fn contact_frame(id: &str, nick: &str, stranger: &str) -> StreamFrame {
    StreamFrame::new(
        ResponseType::ContactList,
        json!({ "UserName": id, "NickName": nick, "EncryptUsername": stranger }).to_string(),
    )
}

fn message_frame(msg_id: &str, msg_type: u32, content: &str) -> StreamFrame {
    StreamFrame::new(
        ResponseType::MessageReceive,
        json!({
            "MsgId": msg_id,
            "FromUserName": "wxid_1",
            "ToUserName": "wxid_self",
            "MsgType": msg_type,
            "Content": content,
            "CreateTime": 1_600_000_000,
        })
        .to_string(),
    )
}

fn members_frame(room_id: &str, members: serde_json::Value) -> StreamFrame {
    StreamFrame::new(
        ResponseType::RoomMemberList,
        json!({ "roomId": room_id, "membersJson": members.to_string() }).to_string(),
    )
}

async fn logged_in() -> (SessionManager, Arc<MockTransport>) {
    let (manager, transport) = manager();
    manager.handle_frame(login_frame()).await.unwrap();
    (manager, transport)
}

/// Wait until a request of `api_type` has been handed to the transport
async fn sent(transport: &MockTransport, api_type: ApiType) -> ApiRequest {
    loop {
        if let Some(request) = transport.sent_of(api_type).pop() {
            return request;
        }
        tokio::task::yield_now().await;
    }
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test(start_paused = true)]
async fn test_contact_visible_once_pushed() {
    let (manager, _) = logged_in().await;

    let pusher = manager.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        pusher
            .handle_frame(contact_frame("wxid_1", "Alice", ""))
            .await
            .unwrap();
    });

    let contact = manager.get_contact("wxid_1").await.unwrap();
    assert_eq!(contact.map(|c| c.nick_name), Some("Alice".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_contact_not_found_after_window() {
    let (manager, transport) = logged_in().await;

    let started = Instant::now();
    let result = manager.contact_payload("wxid_missing").await;

    assert!(matches!(result, Err(SessionError::NotFound(_))));
    assert!(started.elapsed() >= Duration::from_secs(5));
    let pulls = transport.sent_of(ApiType::GetContact);
    assert!(
        pulls
            .iter()
            .any(|r| r.data.as_deref() == Some(r#"{"userName":"wxid_missing"}"#))
    );
}

#[tokio::test]
async fn test_cached_contact_skips_pull() {
    let (manager, transport) = logged_in().await;
    manager
        .handle_frame(contact_frame("wxid_1", "Alice", ""))
        .await
        .unwrap();
    let pulls_before = transport.sent_of(ApiType::GetContact).len();

    let contact = manager.contact_payload("wxid_1").await.unwrap();
    assert_eq!(contact.nick_name, "Alice");
    assert_eq!(transport.sent_of(ApiType::GetContact).len(), pulls_before);
}

#[tokio::test]
async fn test_duplicate_scan_status_emits_once() {
    let (manager, _) = manager();
    let mut events = manager.subscribe();

    let qrcode = json!({
        "qrcodeId": "qr-1",
        "qrcode": general_purpose::STANDARD.encode(b"png"),
    });
    manager
        .handle_frame(StreamFrame::new(ResponseType::LoginQrcode, qrcode.to_string()))
        .await
        .unwrap();
    for status in [1, 1, 2] {
        manager
            .handle_frame(StreamFrame::new(
                ResponseType::QrcodeScan,
                json!({ "status": status }).to_string(),
            ))
            .await
            .unwrap();
    }

    let scans: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Scan { status, qrcode } => Some((status, qrcode.is_some())),
            _ => None,
        })
        .collect();
    assert_eq!(
        scans,
        vec![
            (ScanStatus::Cancel, true),
            (ScanStatus::Waiting, false),
            (ScanStatus::Scanned, false),
        ]
    );
    assert_eq!(manager.login_state(), LoginState::Scanned);
}

#[tokio::test]
async fn test_expired_qrcode_reissued_with_hints() {
    let store = Arc::new(MemorySessionStore::new());
    store
        .set(MEMORY_SLOT_NAME, SessionIdentity::logged_in("U1", "wxid_self"))
        .unwrap();
    let (manager, transport) = manager_with(store);
    manager.session.restore().unwrap();

    manager
        .handle_frame(StreamFrame::new(
            ResponseType::QrcodeScan,
            json!({ "status": 3 }).to_string(),
        ))
        .await
        .unwrap();

    let request = sent(&transport, ApiType::GetQrcode).await;
    let hints: serde_json::Value = serde_json::from_str(request.data.as_deref().unwrap()).unwrap();
    assert_eq!(hints, json!({ "uin": "U1", "wxid": "wxid_self" }));
}

#[tokio::test]
async fn test_pending_request_survives_qrcode_expiry() {
    let (manager, transport) = manager();

    let client = manager.client.clone();
    let waiter = tokio::spawn(async move {
        client
            .request(ApiType::SearchContact, Some(json!({ "wxid": "wxid_x" })))
            .await
    });
    let request = sent(&transport, ApiType::SearchContact).await;
    assert_eq!(manager.pending_requests(), 1);

    manager
        .handle_frame(StreamFrame::new(
            ResponseType::QrcodeScan,
            json!({ "status": 3 }).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(transport.sent_of(ApiType::GetQrcode).len(), 1);
    assert_eq!(manager.pending_requests(), 1);

    manager
        .handle_frame(StreamFrame::response(request.request_id, r#"{"status":0}"#))
        .await
        .unwrap();
    assert_eq!(waiter.await.unwrap().unwrap(), r#"{"status":0}"#);
    assert_eq!(manager.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_self_contact_refreshed_after_login() {
    let (manager, transport) = logged_in().await;
    assert_eq!(
        manager.cache().unwrap().contact("wxid_self").unwrap().nick_name,
        "Me"
    );

    let pull = sent(&transport, ApiType::GetContact).await;
    assert_eq!(pull.data.as_deref(), Some(r#"{"userName":"wxid_self"}"#));
    manager
        .handle_frame(contact_frame("wxid_self", "Me-full", ""))
        .await
        .unwrap();

    let refreshed = manager.cache().unwrap().contact("wxid_self").unwrap();
    assert_eq!(refreshed.nick_name, "Me-full");
}

#[tokio::test(start_paused = true)]
async fn test_login_persists_and_restart_skips_qrcode() {
    let store = Arc::new(MemorySessionStore::new());
    let (first, first_transport) = manager_with(store.clone());
    first.start().await.unwrap();
    assert_eq!(first_transport.sent_of(ApiType::GetQrcode).len(), 1);

    let mut events = first.subscribe();
    first.handle_frame(login_frame()).await.unwrap();
    let emitted = drain(&mut events);
    assert!(matches!(emitted.as_slice(), [SessionEvent::Login(_)]));
    assert_eq!(
        store.saved(MEMORY_SLOT_NAME),
        Some(SessionIdentity::logged_in("U1", "wxid_self"))
    );
    assert_eq!(
        first.cache().unwrap().contact("wxid_self").unwrap().nick_name,
        "Me"
    );

    let (second, second_transport) = manager_with(store);
    second.start().await.unwrap();
    let init = second_transport.sent_of(ApiType::Init);
    assert_eq!(init.len(), 1);
    assert_eq!(init[0].uin, "U1");
    assert!(second_transport.sent_of(ApiType::GetQrcode).is_empty());
}

#[tokio::test]
async fn test_offline_auto_login_clears_identity() {
    let store = Arc::new(MemorySessionStore::new());
    store
        .set(MEMORY_SLOT_NAME, SessionIdentity::logged_in("U1", "wxid_self"))
        .unwrap();
    let (manager, transport) = manager_with(store.clone());
    manager.session.restore().unwrap();

    manager
        .handle_frame(StreamFrame::new(
            ResponseType::AutoLogin,
            json!({ "online": false }).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(store.saved(MEMORY_SLOT_NAME), Some(SessionIdentity::default()));
    assert_eq!(transport.sent_of(ApiType::GetQrcode).len(), 1);
    assert_eq!(manager.login_state(), LoginState::Unauthenticated);
}

#[tokio::test]
async fn test_online_auto_login_completes() {
    let (manager, _) = manager();
    manager
        .handle_frame(StreamFrame::new(
            ResponseType::AutoLogin,
            json!({
                "online": true,
                "wechatUser": { "uin": "U1", "userName": "wxid_self" },
            })
            .to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(manager.login_state(), LoginState::LoggedIn);
    assert_eq!(manager.cache().unwrap().owner(), "wxid_self");
}

#[tokio::test]
async fn test_room_members_back_fill_contacts() {
    let (manager, _) = logged_in().await;
    manager
        .handle_frame(contact_frame("wxid_b", "Bob", "v1_bob"))
        .await
        .unwrap();

    let members = json!([
        { "UserName": "wxid_a", "NickName": "A", "DisplayName": "Ann", "HeadImgUrl": "http://a" },
        { "UserName": "wxid_b", "NickName": "B-in-room" },
    ]);
    manager
        .handle_frame(members_frame("1@chatroom", members))
        .await
        .unwrap();

    let cache = manager.cache().unwrap();
    let filled = cache.contact("wxid_a").unwrap();
    assert_eq!(filled.nick_name, "A");
    assert_eq!(filled.remark, "Ann");
    assert_eq!(filled.small_head_url, "http://a");
    assert_eq!(cache.contact("wxid_b").unwrap().nick_name, "Bob");

    let mut ids = manager.room_member_id_list("1@chatroom").await.unwrap();
    ids.sort();
    assert_eq!(ids, vec!["wxid_a", "wxid_b"]);
}

#[tokio::test]
async fn test_room_members_leave_self_contact() {
    let (manager, _) = logged_in().await;
    manager
        .handle_frame(contact_frame("wxid_self", "Me-full", ""))
        .await
        .unwrap();

    let members = json!([
        { "UserName": "wxid_self", "NickName": "Me-in-room" },
        { "UserName": "wxid_a", "NickName": "A" },
    ]);
    manager
        .handle_frame(members_frame("1@chatroom", members))
        .await
        .unwrap();

    let cache = manager.cache().unwrap();
    assert_eq!(cache.contact("wxid_self").unwrap().nick_name, "Me-full");
    assert_eq!(cache.contact("wxid_a").unwrap().nick_name, "A");
}

#[tokio::test]
async fn test_add_existing_room_member_skips_request() {
    let (manager, transport) = logged_in().await;
    manager.cache().unwrap().set_room(RoomPayload {
        chatroom_id: "1@chatroom".to_string(),
        member_ids: vec!["wxid_b".to_string()],
        member_count: 1,
        ..RoomPayload::default()
    });

    manager.add_room_member("1@chatroom", "wxid_b").await.unwrap();
    assert!(transport.sent_of(ApiType::AddChatroomMember).is_empty());
}

#[tokio::test]
async fn test_room_invitation_saved_and_looked_up() {
    let (manager, _) = manager();
    let invitation = RoomInvitationPayload {
        id: "inv-1".to_string(),
        from_user: "wxid_a".to_string(),
        receiver: "wxid_self".to_string(),
        room_name: "Team".to_string(),
        url: "http://invite/1".to_string(),
        timestamp: 1_600_000_000,
        ..RoomInvitationPayload::default()
    };
    assert!(matches!(
        manager.save_room_invitation(invitation.clone()),
        Err(SessionError::NoCache(_))
    ));

    manager.handle_frame(login_frame()).await.unwrap();
    manager.save_room_invitation(invitation.clone()).unwrap();

    assert_eq!(manager.room_invitation("inv-1").unwrap(), invitation);
    assert!(matches!(
        manager.room_invitation("inv-2"),
        Err(SessionError::NotFound(_))
    ));
    assert!(manager.delete_room_invitation("inv-1").unwrap());
    assert!(matches!(
        manager.room_invitation("inv-1"),
        Err(SessionError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_room_modify_replaces_member_map() {
    let (manager, _) = logged_in().await;
    manager
        .handle_frame(members_frame("1@chatroom", json!([{ "UserName": "wxid_old" }])))
        .await
        .unwrap();

    let room = json!({
        "UserName": "1@chatroom",
        "NickName": "Team",
        "ChatRoomOwner": "wxid_self",
        "ExtInfo": [{ "UserName": "wxid_a" }, { "UserName": "wxid_b" }],
    });
    manager
        .handle_frame(StreamFrame::new(ResponseType::ContactModify, room.to_string()))
        .await
        .unwrap();

    let info = manager.room_info("1@chatroom").await.unwrap();
    assert_eq!(info.topic, "Team");
    assert!(info.is_owner("wxid_self"));
    let members = manager.get_room_members("1@chatroom").await.unwrap().unwrap();
    assert_eq!(members.len(), 2);
    assert!(!members.contains_key("wxid_old"));
    assert_eq!(manager.room_id_list().unwrap(), vec!["1@chatroom"]);
}

#[tokio::test]
async fn test_contact_delete_removes_room() {
    let (manager, _) = logged_in().await;
    let mut events = manager.subscribe();
    let room = json!({ "UserName": "1@chatroom", "ExtInfo": [{ "UserName": "wxid_a" }] });
    manager
        .handle_frame(StreamFrame::new(ResponseType::ContactModify, room.to_string()))
        .await
        .unwrap();

    manager
        .handle_frame(StreamFrame::new(
            ResponseType::ContactDelete,
            json!({ "UserName": "1@chatroom" }).to_string(),
        ))
        .await
        .unwrap();

    let cache = manager.cache().unwrap();
    assert!(cache.room("1@chatroom").is_none());
    assert!(cache.room_member("1@chatroom").is_none());
    let deleted: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::ContactDelete(id) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(deleted, vec!["1@chatroom"]);
    assert!(is_room_id(&deleted[0]));
}

#[tokio::test]
async fn test_cache_required_before_login() {
    let (manager, _) = manager();

    assert!(matches!(
        manager.get_contact("wxid_1").await,
        Err(SessionError::NoCache(_))
    ));
    assert!(matches!(
        manager.handle_frame(contact_frame("wxid_1", "Alice", "")).await,
        Err(SessionError::NoCache(_))
    ));
    assert!(matches!(manager.room_id_list(), Err(SessionError::NoCache(_))));
}

#[tokio::test]
async fn test_run_survives_bad_frames_and_ends_on_logout() {
    let (manager, _) = manager();
    let mut events = manager.subscribe();

    let frames = vec![
        StreamFrame::new(ResponseType::Unknown, "{}"),
        StreamFrame::new(ResponseType::QrcodeLogin, "not json"),
        contact_frame("wxid_1", "Alice", ""),
        login_frame(),
        message_frame("m1", 1, "hello"),
        StreamFrame::new(
            ResponseType::AccountLogout,
            json!({ "uin": "U1", "message": "kicked" }).to_string(),
        ),
        message_frame("m2", 1, "after logout"),
    ];

    let result = manager.run(stream::iter(frames)).await;
    match result {
        Err(SessionError::RemoteLogout(reason)) => assert_eq!(reason, "kicked"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(manager.login_state(), LoginState::LoggedOut);

    let names: Vec<_> = drain(&mut events).iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["login", "message", "logout"]);
    assert!(manager.message_payload("m2").is_none());
}

#[tokio::test]
async fn test_run_returns_when_stream_ends() {
    let (manager, _) = manager();
    let frames = vec![login_frame(), message_frame("m1", 1, "hi")];
    manager.run(stream::iter(frames)).await.unwrap();
    assert!(manager.message_payload("m1").is_some());
}

#[tokio::test]
async fn test_every_message_emitted() {
    let (manager, _) = logged_in().await;
    let mut events = manager.subscribe();

    for _ in 0..2 {
        manager
            .handle_frame(message_frame("m1", 1, "hello"))
            .await
            .unwrap();
    }

    let messages = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Message(_)))
        .count();
    assert_eq!(messages, 2);
    assert_eq!(manager.message_payload("m1").unwrap().content, "hello");
}

#[tokio::test]
async fn test_rich_media_correlated_by_msg_id() {
    let (manager, transport) = logged_in().await;

    let loader = manager.clone();
    let waiter = tokio::spawn(async move {
        let media = RichMediaData {
            msg_id: "m-img".to_string(),
            msg_type: 3,
            ..RichMediaData::default()
        };
        loader.load_rich_media_data(&media).await
    });

    sent(&transport, ApiType::GetMessageMedia).await;
    assert_eq!(manager.pending_requests(), 1);
    manager
        .handle_frame(StreamFrame::new(
            ResponseType::MessageMediaSrc,
            json!({ "msgId": "m-img", "src": "http://media/1", "status": 0 }).to_string(),
        ))
        .await
        .unwrap();

    let media = waiter.await.unwrap().unwrap();
    assert_eq!(media.src, "http://media/1");
    assert_eq!(manager.pending_requests(), 0);
}

#[tokio::test]
async fn test_unmatched_response_is_noop() {
    let (manager, _) = logged_in().await;
    manager
        .handle_frame(StreamFrame::response("nobody-waits", r#"{"status":0}"#))
        .await
        .unwrap();
    assert_eq!(manager.pending_requests(), 0);
}

#[tokio::test]
async fn test_friend_request_saved_and_confirmed() {
    let (manager, transport) = logged_in().await;
    let content = r#"<msg fromusername="wxid_new" encryptusername="v1_new" content="hi there" ticket="v2_ticket" />"#;
    manager
        .handle_frame(message_frame("fr-1", 37, content))
        .await
        .unwrap();

    let friendship = manager.friendship("fr-1").unwrap().unwrap();
    assert_eq!(friendship.contact_id, "wxid_new");
    assert_eq!(friendship.hello, "hi there");

    let confirmer = manager.clone();
    let waiter = tokio::spawn(async move { confirmer.confirm_friendship("fr-1").await });

    let request = sent(&transport, ApiType::AcceptUser).await;
    let data: serde_json::Value = serde_json::from_str(request.data.as_deref().unwrap()).unwrap();
    assert_eq!(data, json!({ "stranger": "v1_new", "ticket": "v2_ticket" }));
    manager
        .handle_frame(StreamFrame::response(request.request_id, r#"{"status":0}"#))
        .await
        .unwrap();

    waiter.await.unwrap().unwrap();
    assert!(manager.friendship("fr-1").unwrap().is_none());
}

#[tokio::test]
async fn test_send_message_with_mentions() {
    let (manager, transport) = logged_in().await;

    let sender = manager.clone();
    let waiter = tokio::spawn(async move {
        sender
            .send_message(
                "1@chatroom",
                "@A hello",
                crate::payload::MessageType::Text,
                &["wxid_a".to_string()],
            )
            .await
    });

    let request = sent(&transport, ApiType::SendMessage).await;
    let data: serde_json::Value = serde_json::from_str(request.data.as_deref().unwrap()).unwrap();
    assert_eq!(data["fromUserName"], "wxid_self");
    assert_eq!(data["mentionListStr"], "wxid_a");
    assert_eq!(data["type"], 1);
    manager
        .handle_frame(StreamFrame::response(
            request.request_id,
            r#"{"status":0,"msgId":"srv-1"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(waiter.await.unwrap().unwrap(), Some("srv-1".to_string()));
}

#[tokio::test]
async fn test_tag_create_returns_ids() {
    let (manager, transport) = logged_in().await;

    let tagger = manager.clone();
    let waiter = tokio::spawn(async move { tagger.get_or_create_tag("vip").await });

    let request = sent(&transport, ApiType::CreateLabel).await;
    let response = json!({
        "count": 1,
        "labelList": [{ "LabelID": "7", "LabelName": "vip" }],
        "status": 0,
    });
    manager
        .handle_frame(StreamFrame::response(request.request_id, response.to_string()))
        .await
        .unwrap();

    assert_eq!(waiter.await.unwrap().unwrap(), "7");
}

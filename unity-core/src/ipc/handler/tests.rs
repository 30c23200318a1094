// Hindu Unity - A community platform for members, volunteers and leaders
// Copyright (C) 2025 Hindu Unity Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::models::error_codes;
use crate::realtime::TableChange;

async fn handler(server: &MockServer) -> (TempDir, MessageHandler) {
    handler_with_realtime(server, false).await
}

async fn handler_with_realtime(server: &MockServer, realtime: bool) -> (TempDir, MessageHandler) {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::load_from(&[]).unwrap();
    settings.backend.url = server.uri();
    settings.backend.anon_key = "anon-key".to_string();
    settings.backend.upload_api_url = server.uri();
    settings.realtime.enabled = realtime;
    settings.storage.data_dir = Some(dir.path().display().to_string());

    let cache = Arc::new(CacheManager::open(&settings.cache_path()).await.unwrap());
    let (shutdown_tx, _) = broadcast::channel(1);
    let handler = MessageHandler::new(settings, cache, shutdown_tx).unwrap();
    (dir, handler)
}

async fn call(handler: &MessageHandler, method: &str, params: Value) -> IpcMessage {
    handler
        .handle_message(IpcMessage::request(method, Some(params)))
        .await
}

fn profile(id: &str, role: &str, suspended: bool) -> Value {
    json!({
        "id": id,
        "email": format!("{}@example.org", id),
        "full_name": "Asha Rao",
        "role": role,
        "is_approved": true,
        "is_suspended": suspended,
        "created_at": "2025-01-01T00:00:00Z"
    })
}

async fn mount_sign_in(server: &MockServer, profile: Value) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": { "id": "u1", "email": "u1@example.org" }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([profile])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/user_roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

/// Put a signed-in member session in place without going through sign in
async fn install_session(handler: &MessageHandler, access_token: &str, expires_at: chrono::DateTime<chrono::Utc>) {
    let member: Profile = serde_json::from_value(profile("u1", "member", false)).unwrap();
    *handler.session.write().await = Some(ActiveSession {
        client: handler.anon.with_token(access_token),
        stored: StoredSession {
            user_id: "u1".to_string(),
            email: None,
            access_token: access_token.to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            created_at: chrono::Utc::now(),
        },
        viewer: Viewer::from_profile(&member, Vec::new()),
        profile: member,
    });
}

async fn mount_follow_state(server: &MockServer, following: bool) {
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/follows"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/3"))
        .mount(server)
        .await;
    let rows = if following {
        json!([{ "follower_id": "u1" }])
    } else {
        json!([])
    };
    Mock::given(method("GET"))
        .and(path("/rest/v1/follows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

fn feed_post(id: &str) -> Value {
    json!({
        "id": id,
        "user_id": "u2",
        "content": "Diya lighting at the temple",
        "post_type": "text",
        "media_url": null,
        "created_at": "2025-03-01T10:00:00Z",
        "profiles": { "full_name": "Meera", "avatar_url": null }
    })
}

fn sign_in_params() -> Value {
    json!({ "email": "u1@example.org", "password": "secret1" })
}

#[tokio::test]
async fn ping_and_unknown_methods() {
    let server = MockServer::start().await;
    let (_dir, handler) = handler(&server).await;

    let pong = call(&handler, methods::PING, Value::Null).await;
    assert_eq!(pong.result.unwrap()["pong"], true);

    let unknown = call(&handler, "nope.nothing", Value::Null).await;
    assert_eq!(unknown.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn bad_params_are_invalid() {
    let server = MockServer::start().await;
    let (_dir, handler) = handler(&server).await;

    let response = call(&handler, methods::POST_GET, json!({ "wrong": 1 })).await;
    assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
}

#[tokio::test]
async fn guests_are_sent_to_auth() {
    let server = MockServer::start().await;
    let (_dir, handler) = handler(&server).await;

    let response = call(&handler, methods::ROUTE_CHECK, json!({ "path": "/admin" })).await;
    assert_eq!(response.result.unwrap()["decision"], "redirect_to_auth");

    let nav = call(&handler, methods::NAV_ITEMS, Value::Null).await;
    assert_eq!(nav.result.unwrap(), json!([]));
}

#[tokio::test]
async fn suspended_accounts_cannot_sign_in() {
    let server = MockServer::start().await;
    mount_sign_in(&server, profile("u1", "member", true)).await;
    let (_dir, handler) = handler(&server).await;

    let response = call(&handler, methods::AUTH_SIGN_IN, sign_in_params()).await;
    assert_eq!(response.error.unwrap().code, error_codes::ACCOUNT_SUSPENDED);
    assert!(handler.session_info().await.is_none());
    assert!(handler.cache.load_session().await.unwrap().is_none());
}

#[tokio::test]
async fn sign_in_persists_session() {
    let server = MockServer::start().await;
    mount_sign_in(&server, profile("u1", "volunteer", false)).await;
    let (_dir, handler) = handler(&server).await;

    let response = call(&handler, methods::AUTH_SIGN_IN, sign_in_params()).await;
    let info = response.result.unwrap();
    assert_eq!(info["user_id"], "u1");
    assert_eq!(info["roles"], json!(["volunteer"]));

    let stored = handler.cache.load_session().await.unwrap().unwrap();
    assert_eq!(stored.access_token, "user-token");

    let nav = call(&handler, methods::NAV_ITEMS, Value::Null).await;
    assert_eq!(nav.result.unwrap()[0]["label"], "Events");
}

#[tokio::test]
async fn suspension_found_on_profile_fetch_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([profile("u1", "member", true)])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    let (_dir, handler) = handler(&server).await;

    // signed in before the suspension happened
    let client = handler.anon.with_token("user-token");
    let member: Profile = serde_json::from_value(profile("u1", "member", false)).unwrap();
    *handler.session.write().await = Some(ActiveSession {
        client,
        stored: StoredSession {
            user_id: "u1".to_string(),
            email: None,
            access_token: "user-token".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
            created_at: chrono::Utc::now(),
        },
        viewer: Viewer::from_profile(&member, Vec::new()),
        profile: member,
    });
    let mut events_rx = handler.subscribe_events();

    let response = call(&handler, methods::PROFILE_ME, Value::Null).await;
    assert_eq!(response.error.unwrap().code, error_codes::ACCOUNT_SUSPENDED);
    assert!(handler.session_info().await.is_none());

    let event = events_rx.recv().await.unwrap();
    assert_eq!(event.method.as_deref(), Some(events::SESSION_ENDED));
}

#[tokio::test]
async fn second_vote_is_refused_without_request() {
    let server = MockServer::start().await;
    mount_sign_in(&server, profile("u1", "member", false)).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/poll_options"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "o1", "post_id": "p1", "option_text": "Yes" },
            { "id": "o2", "post_id": "p1", "option_text": "No" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/poll_votes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "poll_option_id": "o1" }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/poll_votes"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    let (_dir, handler) = handler(&server).await;
    call(&handler, methods::AUTH_SIGN_IN, sign_in_params()).await;

    let response = call(
        &handler,
        methods::POST_VOTE,
        json!({ "post_id": "p1", "option_id": "o2" }),
    )
    .await;
    assert_eq!(response.error.unwrap().code, error_codes::CONFLICT);
}

#[tokio::test]
async fn unfollowing_a_stranger_keeps_counts() {
    let server = MockServer::start().await;
    mount_follow_state(&server, false).await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/follows"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    let (_dir, handler) = handler(&server).await;
    install_session(&handler, "user-token", chrono::Utc::now() + chrono::Duration::hours(1)).await;

    let response = call(&handler, methods::USER_UNFOLLOW, json!({ "user_id": "u2" })).await;
    let result = response.result.unwrap();
    assert_eq!(result["following"], false);
    assert_eq!(result["counts"]["followers"], 3);
}

#[tokio::test]
async fn following_twice_keeps_counts() {
    let server = MockServer::start().await;
    mount_follow_state(&server, true).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/follows"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    let (_dir, handler) = handler(&server).await;
    install_session(&handler, "user-token", chrono::Utc::now() + chrono::Duration::hours(1)).await;

    let response = call(&handler, methods::USER_FOLLOW, json!({ "user_id": "u2" })).await;
    let result = response.result.unwrap();
    assert_eq!(result["following"], true);
    assert_eq!(result["counts"]["followers"], 3);
}

#[tokio::test]
async fn unfollow_adjusts_counts_when_row_removed() {
    let server = MockServer::start().await;
    mount_follow_state(&server, true).await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/follows"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let (_dir, handler) = handler(&server).await;
    install_session(&handler, "user-token", chrono::Utc::now() + chrono::Duration::hours(1)).await;

    let response = call(&handler, methods::USER_UNFOLLOW, json!({ "user_id": "u2" })).await;
    assert_eq!(response.result.unwrap()["counts"]["followers"], 2);
}

#[tokio::test]
async fn token_refresh_rejoins_realtime_with_new_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-2",
            "user": { "id": "u1", "email": "u1@example.org" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([profile("u1", "member", false)])))
        .mount(&server)
        .await;
    let (_dir, handler) = handler_with_realtime(&server, true).await;
    install_session(&handler, "stale-token", chrono::Utc::now() - chrono::Duration::minutes(1)).await;
    handler.restart_realtime("stale-token").await;

    let response = call(&handler, methods::PROFILE_ME, Value::Null).await;
    assert!(response.error.is_none());

    let state = handler.realtime.lock().await;
    assert_eq!(state.manager.as_ref().unwrap().access_token(), "fresh-token");
    drop(state);

    let stored = handler.cache.load_session().await.unwrap().unwrap();
    assert_eq!(stored.access_token, "fresh-token");
}

#[tokio::test]
async fn inserted_post_refetches_first_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([feed_post("p1")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    let (_dir, handler) = handler(&server).await;

    // the feed already holds p1; only a reset lets it come back in the new page
    let first = call(&handler, methods::FEED_REFRESH, Value::Null).await;
    assert_eq!(first.result.unwrap()["items"][0]["id"], "p1");

    let mut events_rx = handler.subscribe_events();
    handler
        .on_realtime_event(RealtimeEvent::Change(
            "realtime:posts-changes".to_string(),
            TableChange {
                table: "posts".to_string(),
                change_type: ChangeType::Insert,
                record: Some(feed_post("p1")),
                old_record: None,
            },
        ))
        .await;

    let changed = events_rx.recv().await.unwrap();
    assert_eq!(changed.method.as_deref(), Some(events::TABLE_CHANGED));
    assert_eq!(changed.params.unwrap()["table"], "posts");

    let refreshed = events_rx.recv().await.unwrap();
    assert_eq!(refreshed.method.as_deref(), Some(events::FEED_REFRESHED));
    let page = refreshed.params.unwrap();
    assert_eq!(page["page"], 0);
    assert_eq!(page["items"][0]["id"], "p1");
    assert_eq!(page["items"][0]["kind"], "post");

    let snapshot = handler.cache.load_feed_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
}

#[tokio::test]
async fn updated_post_only_reports_the_change() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    let (_dir, handler) = handler(&server).await;
    let mut events_rx = handler.subscribe_events();

    handler
        .on_realtime_event(RealtimeEvent::Change(
            "realtime:posts-changes".to_string(),
            TableChange {
                table: "posts".to_string(),
                change_type: ChangeType::Update,
                record: Some(feed_post("p1")),
                old_record: None,
            },
        ))
        .await;

    let changed = events_rx.recv().await.unwrap();
    assert_eq!(changed.method.as_deref(), Some(events::TABLE_CHANGED));
    assert_eq!(changed.params.unwrap()["type"], "UPDATE");
    assert!(events_rx.try_recv().is_err());
}

#[tokio::test]
async fn recovery_email_has_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/recover"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    let (_dir, handler) = handler(&server).await;

    let params = json!({ "email": "u1@example.org" });
    let first = call(&handler, methods::AUTH_FORGOT_PASSWORD, params.clone()).await;
    assert_eq!(first.result.unwrap()["sent"], true);

    let second = call(&handler, methods::AUTH_FORGOT_PASSWORD, params).await;
    let error = second.error.unwrap();
    assert_eq!(error.code, error_codes::RATE_LIMITED);
    assert!(error.data.unwrap()["remaining_secs"].as_u64().unwrap() <= 120);
}

#[tokio::test]
async fn members_cannot_create_events() {
    let server = MockServer::start().await;
    mount_sign_in(&server, profile("u1", "member", false)).await;
    let (_dir, handler) = handler(&server).await;
    call(&handler, methods::AUTH_SIGN_IN, sign_in_params()).await;

    let response = call(
        &handler,
        methods::EVENT_CREATE,
        json!({ "title": "Satsang", "event_date": "2025-06-01T10:00:00Z" }),
    )
    .await;
    assert_eq!(response.error.unwrap().code, error_codes::PERMISSION_DENIED);
}

#[tokio::test]
async fn mute_preference_persists() {
    let server = MockServer::start().await;
    let (_dir, handler) = handler(&server).await;

    let set = call(&handler, methods::PREFS_SET_MUTED, json!({ "muted": false })).await;
    assert_eq!(set.result.unwrap()["video_muted"], false);

    let get = call(&handler, methods::PREFS_GET, Value::Null).await;
    assert_eq!(get.result.unwrap()["video_muted"], false);
}

#[test]
fn password_rules() {
    assert!(validate_new_password("12345", "12345").is_err());
    assert!(validate_new_password("123456", "123457").is_err());
    assert!(validate_new_password("123456", "123456").is_ok());
}

#[test]
fn local_day_starts_before_now() {
    let start = start_of_local_day();
    let now = chrono::Utc::now();
    assert!(start <= now);
    assert!(now - start <= chrono::Duration::hours(25));
}

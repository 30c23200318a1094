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

//! IPC message handler
//!
//! Routes requests to the operation groups below and owns the state the UI
//! relies on between requests: the signed-in session, the feed pages loaded
//! so far and the realtime subscriptions.

mod account;
mod community;
mod content;
mod moderation;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::access::{guard, nav_items, Route, Viewer};
use crate::api::{BackendClient, GeocodeClient};
use crate::cache::CacheManager;
use crate::config::Settings;
use crate::error::{UnityError, UnityResult};
use crate::feed::FeedAssembler;
use crate::log_ipc;
use crate::models::{
    events, methods, IpcError, IpcMessage, MessageType, Profile, SessionInfo, StoredSession,
};
use crate::realtime::{ChangeType, RealtimeEvent, RealtimeManager, Subscription};

/// Capacity of the realtime change queue
const REALTIME_QUEUE: usize = 64;

/// The signed-in user
#[derive(Clone)]
pub struct ActiveSession {
    pub client: BackendClient,
    pub stored: StoredSession,
    pub profile: Profile,
    pub viewer: Viewer,
}

impl ActiveSession {
    pub fn user_id(&self) -> &str {
        &self.stored.user_id
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            user_id: self.stored.user_id.clone(),
            email: self.stored.email.clone(),
            profile: self.profile.clone(),
            roles: self.viewer.roles.to_vec(),
            expires_at: self.stored.expires_at,
        }
    }
}

#[derive(Default)]
struct RealtimeState {
    manager: Option<RealtimeManager>,
    comment_watches: HashMap<String, JoinHandle<()>>,
}

#[derive(Deserialize)]
struct PathParams {
    path: String,
}

#[derive(Deserialize)]
struct PostIdParams {
    post_id: String,
}

#[derive(Deserialize)]
struct MutedParams {
    muted: bool,
}

/// Handles incoming IPC messages and routes them to appropriate handlers
pub struct MessageHandler {
    settings: Settings,
    cache: Arc<CacheManager>,
    /// Client without a user token
    anon: BackendClient,
    geocode: GeocodeClient,
    session: RwLock<Option<ActiveSession>>,
    feed: FeedAssembler,
    events_tx: broadcast::Sender<IpcMessage>,
    realtime: Mutex<RealtimeState>,
    realtime_tx: mpsc::Sender<RealtimeEvent>,
    realtime_rx: Mutex<Option<mpsc::Receiver<RealtimeEvent>>>,
    last_reset_request: Mutex<Option<Instant>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl MessageHandler {
    /// Create a new message handler
    pub fn new(
        settings: Settings,
        cache: Arc<CacheManager>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> UnityResult<Self> {
        let anon = BackendClient::new(&settings.backend)?;
        let geocode = GeocodeClient::new(&settings.maps)?;
        let (events_tx, _) = broadcast::channel(128);
        let (realtime_tx, realtime_rx) = mpsc::channel(REALTIME_QUEUE);

        Ok(Self {
            feed: FeedAssembler::new(settings.feed.page_size),
            settings,
            cache,
            anon,
            geocode,
            session: RwLock::new(None),
            events_tx,
            realtime: Mutex::new(RealtimeState::default()),
            realtime_tx,
            realtime_rx: Mutex::new(Some(realtime_rx)),
            last_reset_request: Mutex::new(None),
            shutdown_tx,
        })
    }

    /// Receiver for events pushed to connected clients
    pub fn subscribe_events(&self) -> broadcast::Receiver<IpcMessage> {
        self.events_tx.subscribe()
    }

    /// Handle an incoming IPC message
    pub async fn handle_message(&self, msg: IpcMessage) -> IpcMessage {
        let method = msg.method.clone().unwrap_or_else(|| "unknown".to_string());
        log_ipc!(request, method.as_str(), &msg.id);

        if msg.message_type != MessageType::Request {
            return IpcMessage::response_err(
                &msg.id,
                IpcError::new(
                    crate::models::error_codes::INVALID_REQUEST,
                    "Only requests are accepted",
                ),
            );
        }

        let params = msg.params.unwrap_or(Value::Null);
        let response = match self.dispatch(&method, params).await {
            Ok(result) => IpcMessage::response_ok(&msg.id, result),
            Err(e) => {
                match &e {
                    UnityError::UnknownMethod(_) => warn!("Unknown method: {}", method),
                    _ => debug!("{} failed: {}", method, e),
                }
                IpcMessage::response_err(&msg.id, IpcError::from(&e))
            }
        };

        let success = response.error.is_none();
        log_ipc!(response, method.as_str(), &msg.id, success);

        response
    }

    async fn dispatch(&self, method: &str, params: Value) -> UnityResult<Value> {
        match method {
            // System
            methods::PING => Ok(json!({
                "pong": true,
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
            methods::SHUTDOWN => {
                info!("Shutdown requested via IPC");
                let _ = self.shutdown_tx.send(());
                Ok(json!({ "status": "shutting_down" }))
            }

            // Authentication
            methods::AUTH_SIGN_UP => reply(self.sign_up(parse(params)?).await),
            methods::AUTH_SIGN_IN => reply(self.sign_in(parse(params)?).await),
            methods::AUTH_SIGN_OUT => reply(self.sign_out().await),
            methods::AUTH_SESSION => reply(Ok(self.session_info().await)),
            methods::AUTH_RESTORE => reply(self.restore_session().await),
            methods::AUTH_FORGOT_PASSWORD => reply(self.forgot_password(parse(params)?).await),
            methods::AUTH_RESET_PASSWORD => reply(self.reset_password(parse(params)?).await),
            methods::AUTH_CHANGE_PASSWORD => reply(self.change_password(parse(params)?).await),

            // Navigation
            methods::ROUTE_CHECK => {
                let PathParams { path } = parse(params)?;
                let viewer = self.viewer().await;
                reply(Ok(guard(&Route::parse(&path), viewer.as_ref())))
            }
            methods::NAV_ITEMS => {
                let viewer = self.viewer().await;
                reply(Ok(nav_items(viewer.as_ref())))
            }

            // Feed
            methods::FEED_REFRESH => reply(self.feed_refresh().await),
            methods::FEED_LOAD_MORE => reply(self.feed_load_more().await),
            methods::FEED_CACHED => reply(self.cache.load_feed_snapshot().await.map_err(UnityError::from)),

            // Posts
            methods::POST_CREATE => reply(self.create_post(parse(params)?).await),
            methods::POST_GET => reply(self.get_post(parse(params)?).await),
            methods::POST_DELETE => reply(self.delete_post(parse(params)?).await),
            methods::POST_PIN => reply(self.pin_post(parse(params)?).await),
            methods::POST_ADMIN_PIN => reply(self.admin_pin_post(parse(params)?).await),
            methods::POST_LIKE => reply(self.toggle_like(parse(params)?).await),
            methods::POST_REACTIONS => reply(self.reactions(parse(params)?).await),
            methods::POST_COMMENTS => reply(self.comments(parse(params)?).await),
            methods::POST_COMMENT => reply(self.add_comment(parse(params)?).await),
            methods::POST_POLL => reply(self.poll(parse(params)?).await),
            methods::POST_VOTE => reply(self.vote(parse(params)?).await),

            // Profiles
            methods::PROFILE_ME => reply(self.own_profile().await),
            methods::PROFILE_GET => reply(self.public_profile(parse(params)?).await),
            methods::PROFILE_POSTS => reply(self.profile_posts(parse(params)?).await),
            methods::PROFILE_UPDATE_NAME => reply(self.update_name(parse(params)?).await),
            methods::PROFILE_UPDATE_BIO => reply(self.update_bio(parse(params)?).await),
            methods::PROFILE_UPLOAD_AVATAR => reply(self.upload_avatar(parse(params)?).await),
            methods::PROFILE_FOLLOW_COUNTS => reply(self.follow_counts(parse(params)?).await),
            methods::PROFILE_FOLLOWERS => reply(self.followers(parse(params)?).await),
            methods::PROFILE_FOLLOWING => reply(self.following(parse(params)?).await),
            methods::PROFILE_CLAIM_STATUS => reply(self.claim_status(parse(params)?).await),

            // Follows
            methods::USER_FOLLOW => reply(self.follow(parse(params)?).await),
            methods::USER_UNFOLLOW => reply(self.unfollow(parse(params)?).await),
            methods::USER_IS_FOLLOWING => reply(self.is_following(parse(params)?).await),

            // Events and protests
            methods::EVENTS_LIST => reply(self.list_events().await),
            methods::EVENT_CREATE => reply(self.create_event(parse(params)?).await),
            methods::EVENT_DELETE => reply(self.delete_event(parse(params)?).await),
            methods::PROTESTS_LIST => reply(self.list_protests().await),
            methods::PROTEST_CREATE => reply(self.create_protest(parse(params)?).await),
            methods::PROTEST_RESPOND => reply(self.respond_to_protest(parse(params)?).await),
            methods::PROTEST_RESPONSES => reply(self.protest_responses(parse(params)?).await),

            // Live streams
            methods::LIVE_START => reply(self.start_live(parse(params)?).await),
            methods::LIVE_END => reply(self.end_live(parse(params)?).await),
            methods::LIVE_LIST => reply(self.live_streams().await),

            // Moderation
            methods::ADMIN_USERS => reply(self.user_directory(parse(params)?).await),
            methods::ADMIN_SUSPEND => reply(self.set_suspended(parse(params)?).await),
            methods::ADMIN_APPROVE => reply(self.approve_executive(parse(params)?).await),
            methods::ADMIN_DELETE_USER => reply(self.delete_user(parse(params)?).await),
            methods::ADMIN_PENDING_EXECUTIVES => reply(self.pending_executives().await),
            methods::ADMIN_REJECT_EXECUTIVE => reply(self.reject_executive(parse(params)?).await),
            methods::ADMIN_PENDING_POSTS => reply(self.pending_posts().await),
            methods::ADMIN_ACCEPT_POST => reply(self.accept_pending_post(parse(params)?).await),
            methods::ADMIN_REJECT_POST => reply(self.reject_pending_post(parse(params)?).await),
            methods::ADMIN_IMPORTED_ACCOUNTS => reply(self.imported_accounts(parse(params)?).await),
            methods::ADMIN_TOGGLE_CLAIM => reply(self.toggle_claim(parse(params)?).await),
            methods::ADMIN_STATS => reply(self.platform_stats().await),
            methods::EXECUTIVE_DASHBOARD => reply(self.executive_dashboard().await),

            // Media
            methods::MEDIA_UPLOAD => reply(self.upload_media(parse(params)?).await),

            // Location
            methods::LOCATION_AUTOCOMPLETE => reply(self.autocomplete(parse(params)?).await),
            methods::LOCATION_RESOLVE => reply(self.resolve_place(parse(params)?).await),
            methods::LOCATION_REVERSE => reply(self.reverse_geocode(parse(params)?).await),

            // Realtime
            methods::REALTIME_WATCH_COMMENTS => {
                let PostIdParams { post_id } = parse(params)?;
                reply(self.watch_comments(&post_id).await)
            }
            methods::REALTIME_UNWATCH_COMMENTS => {
                let PostIdParams { post_id } = parse(params)?;
                reply(Ok(self.unwatch_comments(&post_id).await))
            }

            // Preferences
            methods::PREFS_GET => {
                let muted = self.cache.video_muted().await?;
                Ok(json!({ "video_muted": muted }))
            }
            methods::PREFS_SET_MUTED => {
                let MutedParams { muted } = parse(params)?;
                self.cache.set_video_muted(muted).await?;
                Ok(json!({ "video_muted": muted }))
            }

            _ => Err(UnityError::UnknownMethod(method.to_string())),
        }
    }

    // ===== SESSION HELPERS =====

    /// The signed-in session, refreshing its token when it is about to expire
    async fn current(&self) -> UnityResult<ActiveSession> {
        let session = self
            .session
            .read()
            .await
            .clone()
            .ok_or(UnityError::NotAuthenticated)?;

        if session.stored.is_expired() {
            return self.refresh_active(session).await;
        }
        Ok(session)
    }

    async fn viewer(&self) -> Option<Viewer> {
        self.session.read().await.as_ref().map(|s| s.viewer.clone())
    }

    async fn viewer_id(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.stored.user_id.clone())
    }

    /// Client of the signed-in user, or the anonymous client
    async fn client_or_anon(&self) -> BackendClient {
        match self.current().await {
            Ok(session) => session.client,
            Err(_) => self.anon.clone(),
        }
    }

    /// Replace the cached profile of the signed-in user
    async fn store_profile(&self, profile: Profile) {
        let mut guard = self.session.write().await;
        if let Some(session) = guard.as_mut() {
            if session.stored.user_id == profile.id {
                let extra = session.viewer.roles.to_vec();
                session.viewer = Viewer::from_profile(&profile, extra);
                session.profile = profile;
            }
        }
    }

    /// Drop the session and tell the UI why
    async fn end_session(&self, reason: &str) {
        let Some(session) = self.session.write().await.take() else {
            return;
        };

        info!("Ending session for {}: {}", session.stored.user_id, reason);
        if let Err(e) = session.client.sign_out().await {
            warn!("Sign out request failed: {}", e);
        }
        if let Err(e) = self.cache.clear_session().await {
            warn!("Failed to clear stored session: {:#}", e);
        }
        self.feed.clear().await;

        let anon_key = self.anon.anon_key().to_string();
        self.restart_realtime(&anon_key).await;
        self.emit(events::SESSION_ENDED, json!({ "reason": reason }));
    }

    /// Push an event to every connected client
    fn emit(&self, event: &str, params: Value) {
        log_ipc!(event, event);
        // no receivers just means no client is connected
        let _ = self.events_tx.send(IpcMessage::event(event, params));
    }

    // ===== REALTIME =====

    /// Relay realtime changes until the handler is dropped
    pub async fn run_realtime(self: Arc<Self>) {
        let Some(mut rx) = self.realtime_rx.lock().await.take() else {
            warn!("Realtime relay already running");
            return;
        };

        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.stored.access_token.clone())
            .unwrap_or_else(|| self.anon.anon_key().to_string());
        self.restart_realtime(&token).await;

        while let Some(event) = rx.recv().await {
            self.on_realtime_event(event).await;
        }
    }

    /// Reconnect the feed subscriptions with a new token
    async fn restart_realtime(&self, access_token: &str) {
        if !self.settings.realtime.enabled {
            return;
        }

        let mut state = self.realtime.lock().await;
        if state
            .manager
            .as_ref()
            .is_some_and(|m| m.access_token() == access_token)
        {
            return;
        }
        if let Some(manager) = state.manager.take() {
            manager.stop_all();
        }
        for (_, watch) in state.comment_watches.drain() {
            watch.abort();
        }

        let manager = RealtimeManager::new(
            self.anon.base_url(),
            self.anon.anon_key(),
            access_token,
            &self.settings.realtime,
        );
        manager.subscribe(
            vec![Subscription::posts(), Subscription::events()],
            self.realtime_tx.clone(),
        );
        state.manager = Some(manager);
    }

    async fn watch_comments(&self, post_id: &str) -> UnityResult<Value> {
        let mut state = self.realtime.lock().await;
        if state.comment_watches.contains_key(post_id) {
            return Ok(json!({ "watching": true }));
        }
        let manager = state
            .manager
            .as_ref()
            .ok_or_else(|| UnityError::validation("realtime updates are disabled"))?;

        let handle = manager.subscribe(
            vec![Subscription::comments_of(post_id)],
            self.realtime_tx.clone(),
        );
        state.comment_watches.insert(post_id.to_string(), handle);
        Ok(json!({ "watching": true }))
    }

    async fn unwatch_comments(&self, post_id: &str) -> Value {
        if let Some(handle) = self.realtime.lock().await.comment_watches.remove(post_id) {
            handle.abort();
        }
        json!({ "watching": false })
    }

    async fn on_realtime_event(&self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::Connected(topic) => {
                self.emit(events::REALTIME_CONNECTED, json!({ "topic": topic }));
            }
            RealtimeEvent::Disconnected(topic, reason) => {
                self.emit(
                    events::REALTIME_DISCONNECTED,
                    json!({ "topic": topic, "reason": reason }),
                );
            }
            RealtimeEvent::Change(topic, change) => {
                let refetch = change.change_type == ChangeType::Insert
                    && matches!(change.table.as_str(), "posts" | "events");

                self.emit(
                    events::TABLE_CHANGED,
                    json!({
                        "topic": topic,
                        "table": change.table,
                        "type": change.change_type,
                        "record": change.record,
                        "old_record": change.old_record,
                    }),
                );

                if refetch {
                    match self.feed_refresh().await {
                        Ok(page) => self.emit(events::FEED_REFRESHED, json!(page)),
                        Err(e) => {
                            warn!("Feed refetch after change failed: {}", e);
                            self.emit(events::ERROR, json!(IpcError::from(&e)));
                        }
                    }
                }
            }
        }
    }
}

/// Decode request params into a typed request
fn parse<T: DeserializeOwned>(params: Value) -> UnityResult<T> {
    serde_json::from_value(params)
        .map_err(|e| UnityError::validation(format!("invalid params: {}", e)))
}

fn reply<T: Serialize>(result: UnityResult<T>) -> UnityResult<Value> {
    Ok(serde_json::to_value(result?)?)
}

/// Password rules shared by sign up, reset and change
fn validate_new_password(password: &str, confirm: &str) -> UnityResult<()> {
    if password.chars().count() < 6 {
        return Err(UnityError::validation("Password must be at least 6 characters"));
    }
    if password != confirm {
        return Err(UnityError::validation("Passwords do not match"));
    }
    Ok(())
}

/// Trimmed text, or a validation error naming the field
fn required(value: &str, field: &str) -> UnityResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(UnityError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Start of today in local time
fn start_of_local_day() -> chrono::DateTime<chrono::Utc> {
    let now = chrono::Local::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(chrono::Local).earliest())
        .map(|midnight| midnight.with_timezone(&chrono::Utc))
        .unwrap_or_else(|| now.with_timezone(&chrono::Utc))
}

#[cfg(test)]
mod tests;

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

//! IPC message models for communication between the core and the UI shell

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of IPC message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Request,
    Response,
    Event,
}

/// An IPC message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcMessage {
    /// Unique message ID (UUID)
    pub id: String,

    /// Message type
    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// Method name for requests and events
    #[serde(default)]
    pub method: Option<String>,

    /// Parameters for requests
    #[serde(default)]
    pub params: Option<Value>,

    /// Result for responses
    #[serde(default)]
    pub result: Option<Value>,

    /// Error for failed responses
    #[serde(default)]
    pub error: Option<IpcError>,
}

impl IpcMessage {
    /// Create a new request message
    pub fn request(method: &str, params: Option<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_type: MessageType::Request,
            method: Some(method.to_string()),
            params,
            result: None,
            error: None,
        }
    }

    /// Create a success response
    pub fn response_ok(id: &str, result: Value) -> Self {
        Self {
            id: id.to_string(),
            message_type: MessageType::Response,
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn response_err(id: &str, error: IpcError) -> Self {
        Self {
            id: id.to_string(),
            message_type: MessageType::Response,
            method: None,
            params: None,
            result: None,
            error: Some(error),
        }
    }

    /// Create an event message
    pub fn event(method: &str, params: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_type: MessageType::Event,
            method: Some(method.to_string()),
            params: Some(params),
            result: None,
            error: None,
        }
    }
}

/// Error in an IPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    pub data: Option<Value>,
}

impl IpcError {
    /// Create a new error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Add data to the error
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Standard error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Application-specific errors
    pub const NOT_AUTHENTICATED: i32 = -1001;
    pub const RATE_LIMITED: i32 = -1002;
    pub const NETWORK_ERROR: i32 = -1003;
    pub const API_ERROR: i32 = -1004;
    pub const PERMISSION_DENIED: i32 = -1005;
    pub const NOT_FOUND: i32 = -1006;
    pub const CONFLICT: i32 = -1007;
    pub const ACCOUNT_SUSPENDED: i32 = -1008;
    pub const PENDING_APPROVAL: i32 = -1009;
}

/// IPC method names
pub mod methods {
    // Authentication
    pub const AUTH_SIGN_UP: &str = "auth.sign_up";
    pub const AUTH_SIGN_IN: &str = "auth.sign_in";
    pub const AUTH_SIGN_OUT: &str = "auth.sign_out";
    pub const AUTH_SESSION: &str = "auth.session";
    pub const AUTH_RESTORE: &str = "auth.restore";
    pub const AUTH_FORGOT_PASSWORD: &str = "auth.forgot_password";
    pub const AUTH_RESET_PASSWORD: &str = "auth.reset_password";
    pub const AUTH_CHANGE_PASSWORD: &str = "auth.change_password";

    // Navigation
    pub const ROUTE_CHECK: &str = "route.check";
    pub const NAV_ITEMS: &str = "nav.items";

    // Feed
    pub const FEED_REFRESH: &str = "feed.refresh";
    pub const FEED_LOAD_MORE: &str = "feed.load_more";
    pub const FEED_CACHED: &str = "feed.cached";

    // Posts
    pub const POST_CREATE: &str = "post.create";
    pub const POST_GET: &str = "post.get";
    pub const POST_DELETE: &str = "post.delete";
    pub const POST_PIN: &str = "post.pin";
    pub const POST_ADMIN_PIN: &str = "post.admin_pin";
    pub const POST_LIKE: &str = "post.like";
    pub const POST_REACTIONS: &str = "post.reactions";
    pub const POST_COMMENTS: &str = "post.comments";
    pub const POST_COMMENT: &str = "post.comment";
    pub const POST_POLL: &str = "post.poll";
    pub const POST_VOTE: &str = "post.vote";

    // Profiles
    pub const PROFILE_ME: &str = "profile.me";
    pub const PROFILE_GET: &str = "profile.get";
    pub const PROFILE_POSTS: &str = "profile.posts";
    pub const PROFILE_UPDATE_NAME: &str = "profile.update_name";
    pub const PROFILE_UPDATE_BIO: &str = "profile.update_bio";
    pub const PROFILE_UPLOAD_AVATAR: &str = "profile.upload_avatar";
    pub const PROFILE_FOLLOW_COUNTS: &str = "profile.follow_counts";
    pub const PROFILE_FOLLOWERS: &str = "profile.followers";
    pub const PROFILE_FOLLOWING: &str = "profile.following";
    pub const PROFILE_CLAIM_STATUS: &str = "profile.claim_status";

    // Users
    pub const USER_FOLLOW: &str = "user.follow";
    pub const USER_UNFOLLOW: &str = "user.unfollow";
    pub const USER_IS_FOLLOWING: &str = "user.is_following";

    // Events and protests
    pub const EVENTS_LIST: &str = "events.list";
    pub const EVENT_CREATE: &str = "event.create";
    pub const EVENT_DELETE: &str = "event.delete";
    pub const PROTESTS_LIST: &str = "protests.list";
    pub const PROTEST_CREATE: &str = "protest.create";
    pub const PROTEST_RESPOND: &str = "protest.respond";
    pub const PROTEST_RESPONSES: &str = "protest.responses";

    // Live streams
    pub const LIVE_START: &str = "live.start";
    pub const LIVE_END: &str = "live.end";
    pub const LIVE_LIST: &str = "live.list";

    // Moderation
    pub const ADMIN_USERS: &str = "admin.users";
    pub const ADMIN_SUSPEND: &str = "admin.suspend";
    pub const ADMIN_APPROVE: &str = "admin.approve";
    pub const ADMIN_DELETE_USER: &str = "admin.delete_user";
    pub const ADMIN_PENDING_EXECUTIVES: &str = "admin.pending_executives";
    pub const ADMIN_REJECT_EXECUTIVE: &str = "admin.reject_executive";
    pub const ADMIN_PENDING_POSTS: &str = "admin.pending_posts";
    pub const ADMIN_ACCEPT_POST: &str = "admin.accept_post";
    pub const ADMIN_REJECT_POST: &str = "admin.reject_post";
    pub const ADMIN_IMPORTED_ACCOUNTS: &str = "admin.imported_accounts";
    pub const ADMIN_TOGGLE_CLAIM: &str = "admin.toggle_claim";
    pub const ADMIN_STATS: &str = "admin.stats";
    pub const EXECUTIVE_DASHBOARD: &str = "executive.dashboard";

    // Media
    pub const MEDIA_UPLOAD: &str = "media.upload";

    // Location
    pub const LOCATION_AUTOCOMPLETE: &str = "location.autocomplete";
    pub const LOCATION_RESOLVE: &str = "location.resolve";
    pub const LOCATION_REVERSE: &str = "location.reverse";

    // Realtime
    pub const REALTIME_WATCH_COMMENTS: &str = "realtime.watch_comments";
    pub const REALTIME_UNWATCH_COMMENTS: &str = "realtime.unwatch_comments";

    // Preferences
    pub const PREFS_GET: &str = "prefs.get";
    pub const PREFS_SET_MUTED: &str = "prefs.set_muted";

    // System
    pub const PING: &str = "ping";
    pub const SHUTDOWN: &str = "shutdown";
}

/// Event names pushed to the UI
pub mod events {
    pub const FEED_REFRESHED: &str = "event.feed_refreshed";
    pub const TABLE_CHANGED: &str = "event.table_changed";
    pub const SESSION_ENDED: &str = "event.session_ended";
    pub const REALTIME_CONNECTED: &str = "event.realtime_connected";
    pub const REALTIME_DISCONNECTED: &str = "event.realtime_disconnected";
    pub const ERROR: &str = "event.error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_without_optional_fields_parses() {
        let msg: IpcMessage =
            serde_json::from_str(r#"{"id":"1","type":"request","method":"ping"}"#).unwrap();
        assert_eq!(msg.message_type, MessageType::Request);
        assert_eq!(msg.method.as_deref(), Some(methods::PING));
        assert!(msg.params.is_none());
    }

    #[test]
    fn error_response_serializes_type_tag() {
        let msg = IpcMessage::response_err("42", IpcError::new(error_codes::CONFLICT, "already voted"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "response");
        assert_eq!(json["id"], "42");
        assert_eq!(json["error"]["code"], error_codes::CONFLICT);
        assert!(json["result"].is_null());
    }
}

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

//! Session model for the signed-in user

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{UnityError, UnityResult};

/// Seconds before expiry at which a token is treated as stale
const EXPIRY_MARGIN_SECS: i64 = 60;

/// A persisted session for the signed-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Auth user id
    pub user_id: String,

    /// Email used to sign in
    pub email: Option<String>,

    /// Bearer token for the REST and realtime endpoints
    #[serde(skip_serializing, default)]
    pub access_token: String,

    /// Token used to obtain a new access token
    #[serde(skip_serializing, default)]
    pub refresh_token: String,

    /// When the access token expires
    pub expires_at: DateTime<Utc>,

    /// When this session was first created
    pub created_at: DateTime<Utc>,
}

impl StoredSession {
    /// Build a session from a token grant
    pub fn from_grant(grant: &TokenResponse) -> Self {
        let now = Utc::now();
        let expires_at = grant
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(|| now + chrono::Duration::seconds(grant.expires_in));

        Self {
            user_id: grant.user.id.clone(),
            email: grant.user.email.clone(),
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
            expires_at,
            created_at: now,
        }
    }

    /// Whether the access token needs refreshing
    pub fn is_expired(&self) -> bool {
        Utc::now() + chrono::Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

/// The auth user embedded in a token grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Token grant returned by the auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user: AuthUser,
}

/// Session details returned to the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: String,
    pub email: Option<String>,
    pub profile: super::Profile,
    pub roles: Vec<super::Role>,
    pub expires_at: DateTime<Utc>,
}

/// The claims the core reads from an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenClaims {
    /// Read the payload of a JWT without verifying its signature
    pub fn decode(token: &str) -> UnityResult<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| UnityError::validation("malformed token"))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| UnityError::validation("malformed token"))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Tokens carried in the fragment of a password recovery link
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryLink {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub link_type: Option<String>,
}

impl RecoveryLink {
    /// Parse a full link or a bare fragment
    pub fn parse(link: &str) -> UnityResult<Self> {
        let fragment = link
            .split_once('#')
            .map(|(_, fragment)| fragment)
            .unwrap_or(link);

        let mut access_token = None;
        let mut refresh_token = None;
        let mut link_type = None;
        let mut error_description = None;

        for pair in fragment.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = urlencoding::decode(&value.replace('+', " "))
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            match key {
                "access_token" => access_token = Some(value),
                "refresh_token" => refresh_token = Some(value),
                "type" => link_type = Some(value),
                "error_description" => error_description = Some(value),
                _ => {}
            }
        }

        if let Some(description) = error_description {
            return Err(UnityError::Validation(description));
        }

        let access_token = access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| UnityError::validation("invalid or expired reset link"))?;

        Ok(Self {
            access_token,
            refresh_token,
            link_type,
        })
    }
}

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

//! Profile model representing a community member

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Community role of a user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Volunteer,
    Executive,
    SuperAdmin,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Volunteer => "volunteer",
            Role::Executive => "executive",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Human readable label ("super_admin" becomes "Super Admin")
    pub fn label(&self) -> String {
        format_role(self.as_str())
    }

    /// Whether the role can be picked at sign up
    pub fn is_self_selectable(&self) -> bool {
        !matches!(self, Role::SuperAdmin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Member
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "volunteer" => Ok(Role::Volunteer),
            "executive" => Ok(Role::Executive),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Title-case a role name, replacing the first underscore with a space
pub fn format_role(role: &str) -> String {
    let spaced = role.replacen('_', " ", 1);
    let mut result = String::with_capacity(spaced.len());
    let mut at_word_start = true;

    for c in spaced.chars() {
        if at_word_start && c.is_alphanumeric() {
            result.extend(c.to_uppercase());
        } else {
            result.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }

    result
}

/// A user profile row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Unique identifier (same as the auth user id)
    pub id: String,

    /// Email address, only present on the owner's view
    #[serde(default)]
    pub email: Option<String>,

    /// Display name
    #[serde(default)]
    pub full_name: Option<String>,

    /// Primary role
    #[serde(default)]
    pub role: Role,

    /// Whether an executive account has been approved
    #[serde(default)]
    pub is_approved: bool,

    /// Whether the account is suspended
    #[serde(default)]
    pub is_suspended: bool,

    /// Short biography
    #[serde(default)]
    pub bio: Option<String>,

    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,

    /// When the profile was created
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Display name with the same fallback the feed uses
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Anonymous")
    }

    /// Executive whose account still needs approval
    pub fn is_pending_executive(&self) -> bool {
        self.role == Role::Executive && !self.is_approved
    }
}

/// Author summary embedded in posts, comments and events
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthorSummary {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A user in a followers / following list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FollowUser {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Follower and following totals for a profile
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}

impl FollowCounts {
    /// Adjust after a follow succeeded
    pub fn followed(self) -> Self {
        Self {
            followers: self.followers + 1,
            ..self
        }
    }

    /// Adjust after an unfollow succeeded, never going below zero
    pub fn unfollowed(self) -> Self {
        Self {
            followers: self.followers.saturating_sub(1),
            ..self
        }
    }
}

/// Request to create an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
    pub role: Role,
}

/// Request to sign in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Request to change the password of the signed-in user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Request to set a new password from a recovery link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    /// Full recovery link, or just its fragment
    pub recovery_link: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_labels() {
        assert_eq!(Role::SuperAdmin.label(), "Super Admin");
        assert_eq!(Role::Member.label(), "Member");
        assert_eq!(format_role("executive"), "Executive");
    }

    #[test]
    fn roles_parse_from_wire_names() {
        assert_eq!("super_admin".parse::<Role>(), Ok(Role::SuperAdmin));
        assert!("admin".parse::<Role>().is_err());
        let role: Role = serde_json::from_str("\"volunteer\"").unwrap();
        assert_eq!(role, Role::Volunteer);
    }

    #[test]
    fn super_admin_is_not_self_selectable() {
        assert!(Role::Executive.is_self_selectable());
        assert!(!Role::SuperAdmin.is_self_selectable());
    }

    #[test]
    fn unfollow_never_goes_negative() {
        let counts = FollowCounts::default().unfollowed();
        assert_eq!(counts.followers, 0);
        assert_eq!(counts.followed().followers, 1);
    }

    #[test]
    fn profile_row_with_sparse_columns_parses() {
        let profile: Profile = serde_json::from_value(serde_json::json!({
            "id": "u1",
            "role": "executive",
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(profile.is_pending_executive());
        assert_eq!(profile.display_name(), "Anonymous");
    }
}

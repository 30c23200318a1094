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

//! Moderation models: imported content, imported accounts and dashboards

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{LinkPreview, PostType, Profile};

/// Review state of an imported post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Accepted => "accepted",
            ImportStatus::Rejected => "rejected",
        }
    }
}

/// Content ingested from an external source awaiting review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPost {
    pub twitter_unique_id: String,
    pub user_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub post_type: PostType,
    #[serde(default, deserialize_with = "nullable_urls")]
    pub media_url: Vec<String>,
    pub twitter_username: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub status: ImportStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub link_preview: Option<LinkPreview>,
}

fn nullable_urls<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl PendingPost {
    /// Row to insert into `posts` when the import is accepted
    pub fn to_post_row(&self) -> serde_json::Value {
        serde_json::json!({
            "user_id": self.user_id,
            "content": self.content,
            "post_type": self.post_type,
            "media_url": self.media_url,
            "twitter_unique_id": self.twitter_unique_id,
            "twitter_username": self.twitter_username,
            "source": self.source,
            "location": self.location,
            "link_preview": self.link_preview,
        })
    }

    /// Whether a media URL points to a video file
    pub fn is_video_url(url: &str) -> bool {
        const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".ogg", ".mov", ".avi", ".mkv"];
        let lower = url.to_lowercase();
        VIDEO_EXTENSIONS.iter().any(|ext| lower.contains(ext))
    }
}

/// An externally-sourced account that can be claimed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedAccount {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub claimed: bool,
}

/// Filter for the imported account directory
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimFilter {
    #[default]
    All,
    Claimed,
    Unclaimed,
}

/// Claim state shown on a public profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimStatus {
    pub claimable: bool,
    pub username: Option<String>,
}

/// Search over the user directory (name, email or role)
pub fn filter_profiles<'a>(profiles: &'a [Profile], search: &str) -> Vec<&'a Profile> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return profiles.iter().collect();
    }

    profiles
        .iter()
        .filter(|p| {
            p.full_name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
                || p.email
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase().contains(&needle))
                || p.role.as_str().contains(&needle)
        })
        .collect()
}

/// A row of the user directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedUser {
    #[serde(flatten)]
    pub profile: Profile,
    pub role_label: String,
    /// Whether the viewer may suspend or delete this user
    pub can_manage: bool,
}

/// Search and claim filter over imported accounts
pub fn filter_imported_accounts<'a>(
    accounts: &'a [ImportedAccount],
    search: &str,
    filter: ClaimFilter,
) -> Vec<&'a ImportedAccount> {
    let needle = search.trim().to_lowercase();

    accounts
        .iter()
        .filter(|a| {
            needle.is_empty()
                || a.username.to_lowercase().contains(&needle)
                || a.email
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase().contains(&needle))
        })
        .filter(|a| match filter {
            ClaimFilter::All => true,
            ClaimFilter::Claimed => a.claimed,
            ClaimFilter::Unclaimed => !a.claimed,
        })
        .collect()
}

/// Platform totals for the super admin dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformStats {
    pub total_users: u64,
    pub total_posts: u64,
    pub posts_today: u64,
}

/// Today's posts split by type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostTypeCounts {
    pub text: u64,
    pub image: u64,
    pub video: u64,
    pub poll: u64,
    pub live: u64,
    pub total: u64,
}

impl PostTypeCounts {
    /// Count a list of post types
    pub fn tally(types: impl IntoIterator<Item = PostType>) -> Self {
        let mut counts = Self::default();
        for post_type in types {
            counts.total += 1;
            match post_type {
                PostType::Text => counts.text += 1,
                PostType::Image => counts.image += 1,
                PostType::Video => counts.video += 1,
                PostType::Poll => counts.poll += 1,
                PostType::Live => counts.live += 1,
            }
        }
        counts
    }
}

/// Executive dashboard figures
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_users: u64,
    /// Users active within the last five minutes
    pub live_users: u64,
    pub today_posts: PostTypeCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn profile(name: &str, email: &str, role: Role) -> Profile {
        serde_json::from_value(serde_json::json!({
            "id": name,
            "full_name": name,
            "email": email,
            "role": role,
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn directory_search_matches_name_email_and_role() {
        let users = vec![
            profile("Ravi", "ravi@example.org", Role::Member),
            profile("Meera", "meera@example.org", Role::Executive),
        ];
        assert_eq!(filter_profiles(&users, "RAVI").len(), 1);
        assert_eq!(filter_profiles(&users, "meera@").len(), 1);
        assert_eq!(filter_profiles(&users, "exec")[0].id, "Meera");
        assert_eq!(filter_profiles(&users, "  ").len(), 2);
    }

    #[test]
    fn imported_accounts_filter_by_claim() {
        let accounts = vec![
            ImportedAccount { user_id: "1".into(), username: "alpha".into(), email: None, claimed: true },
            ImportedAccount { user_id: "2".into(), username: "beta".into(), email: Some("b@x.in".into()), claimed: false },
        ];
        assert_eq!(filter_imported_accounts(&accounts, "", ClaimFilter::Unclaimed)[0].user_id, "2");
        assert_eq!(filter_imported_accounts(&accounts, "b@x", ClaimFilter::All).len(), 1);
        assert!(filter_imported_accounts(&accounts, "beta", ClaimFilter::Claimed).is_empty());
    }

    #[test]
    fn accepted_import_keeps_provenance() {
        let pending: PendingPost = serde_json::from_value(serde_json::json!({
            "twitter_unique_id": "t-9",
            "user_id": "u1",
            "content": "rally today",
            "post_type": "video",
            "media_url": null,
            "twitter_username": "handle",
            "source": "twitter",
            "status": "pending",
            "created_at": "2025-02-01T00:00:00Z"
        }))
        .unwrap();
        let row = pending.to_post_row();
        assert_eq!(row["twitter_unique_id"], "t-9");
        assert_eq!(row["post_type"], "video");
        assert_eq!(row["media_url"], serde_json::json!([]));
    }

    #[test]
    fn post_types_tally() {
        let counts = PostTypeCounts::tally([PostType::Text, PostType::Poll, PostType::Text]);
        assert_eq!(counts.text, 2);
        assert_eq!(counts.poll, 1);
        assert_eq!(counts.total, 3);
    }

    #[test]
    fn video_urls_detected_by_extension() {
        assert!(PendingPost::is_video_url("https://cdn/x/CLIP.MP4?tag=1"));
        assert!(!PendingPost::is_video_url("https://cdn/x/photo.jpg"));
    }
}

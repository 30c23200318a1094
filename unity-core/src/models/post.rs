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

//! Post model representing an item in the community feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::AuthorSummary;

/// Kind of post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Text,
    Image,
    Video,
    Poll,
    Live,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Text => "text",
            PostType::Image => "image",
            PostType::Video => "video",
            PostType::Poll => "poll",
            PostType::Live => "live",
        }
    }
}

impl Default for PostType {
    fn default() -> Self {
        PostType::Text
    }
}

/// Link card captured by the import pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkPreview {
    pub url: String,
    #[serde(default)]
    pub display_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
}

/// A post row with its embedded author
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: String,

    /// Author user id
    pub user_id: String,

    /// Text content
    #[serde(default)]
    pub content: Option<String>,

    /// Kind of post
    #[serde(default)]
    pub post_type: PostType,

    /// Media URLs (the column holds a string, an array or null)
    #[serde(default, deserialize_with = "deserialize_media_urls")]
    pub media_url: Vec<String>,

    /// Tagged location
    #[serde(default)]
    pub location: Option<String>,

    /// Pinned on the author's profile
    #[serde(default)]
    pub user_pinned: bool,

    #[serde(default)]
    pub user_pinned_at: Option<DateTime<Utc>>,

    /// Pinned by an administrator
    #[serde(default)]
    pub admin_pinned: bool,

    #[serde(default)]
    pub admin_pinned_at: Option<DateTime<Utc>>,

    /// When the post was created
    pub created_at: DateTime<Utc>,

    /// Identifier of the imported source item
    #[serde(default)]
    pub twitter_unique_id: Option<String>,

    /// Handle of the imported source account
    #[serde(default)]
    pub twitter_username: Option<String>,

    /// Name of the import source
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub link_preview: Option<LinkPreview>,

    /// Embedded author (`profiles` in the REST select)
    #[serde(default, alias = "profiles")]
    pub author: AuthorSummary,
}

impl Post {
    /// Whether the post carries any media
    pub fn has_media(&self) -> bool {
        !self.media_url.is_empty()
    }
}

/// Accept a single URL, a list of URLs, or null
fn deserialize_media_urls<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let urls = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(url)) => vec![url],
        Some(OneOrMany::Many(urls)) => urls,
    };

    Ok(urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect())
}

/// Request to create a new post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub post_type: PostType,
    /// Already-uploaded media URLs
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// Local files to upload before inserting the post
    #[serde(default)]
    pub media_files: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub poll_options: Vec<String>,
}

/// Result of a pin toggle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinState {
    pub post_id: String,
    pub pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(media: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": "p1",
            "user_id": "u1",
            "content": "hello",
            "post_type": "image",
            "media_url": media,
            "created_at": "2025-03-01T10:00:00Z",
            "profiles": { "full_name": "Asha", "avatar_url": null }
        })
    }

    #[test]
    fn media_url_accepts_string_array_or_null() {
        let single: Post = serde_json::from_value(row(serde_json::json!("https://a/1.jpg"))).unwrap();
        assert_eq!(single.media_url, vec!["https://a/1.jpg"]);

        let many: Post =
            serde_json::from_value(row(serde_json::json!(["https://a/1.jpg", "https://a/2.mp4"])))
                .unwrap();
        assert_eq!(many.media_url.len(), 2);

        let none: Post = serde_json::from_value(row(serde_json::Value::Null)).unwrap();
        assert!(!none.has_media());
    }

    #[test]
    fn embedded_profile_becomes_author() {
        let post: Post = serde_json::from_value(row(serde_json::Value::Null)).unwrap();
        assert_eq!(post.author.full_name.as_deref(), Some("Asha"));
        assert_eq!(post.post_type, PostType::Image);
        assert!(!post.user_pinned);
    }
}

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

//! Post queries

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{UnityError, UnityResult};
use crate::models::{PinState, Post, PostType};

use super::client::BackendClient;
use super::query::Query;

/// Post columns with the embedded author summary
pub const POST_SELECT: &str = "*, profiles(full_name, avatar_url)";

/// Columns of a post insert
#[derive(Debug, Clone)]
pub struct PostRow<'a> {
    pub user_id: &'a str,
    pub content: Option<&'a str>,
    pub post_type: PostType,
    pub media_urls: &'a [String],
    pub location: Option<&'a str>,
}

impl PostRow<'_> {
    fn to_json(&self) -> Value {
        json!({
            "user_id": self.user_id,
            "content": self.content,
            "post_type": self.post_type,
            "media_url": media_url_value(self.media_urls),
            "location": self.location,
        })
    }
}

/// A single URL is stored as a string, several as a list
pub fn media_url_value(urls: &[String]) -> Value {
    match urls {
        [] => Value::Null,
        [one] => Value::String(one.clone()),
        many => json!(many),
    }
}

#[derive(Deserialize)]
struct PostTypeRow {
    post_type: PostType,
}

impl BackendClient {
    /// One page of posts, newest first
    pub async fn list_posts(&self, page: u32, page_size: u32) -> UnityResult<Vec<Post>> {
        let query = Query::new()
            .select(POST_SELECT)
            .order("created_at", true)
            .page(page, page_size);
        self.select("posts", &query).await
    }

    pub async fn get_post(&self, post_id: &str) -> UnityResult<Option<Post>> {
        self.select_one("posts", &Query::new().select(POST_SELECT).eq("id", post_id))
            .await
    }

    /// A user's posts, pinned first then newest
    pub async fn user_posts(&self, user_id: &str) -> UnityResult<Vec<Post>> {
        let query = Query::new()
            .select(POST_SELECT)
            .eq("user_id", user_id)
            .order("user_pinned", true)
            .order("user_pinned_at", true)
            .order("created_at", true);
        self.select("posts", &query).await
    }

    pub async fn insert_post(&self, row: &PostRow<'_>) -> UnityResult<Post> {
        self.insert_one("posts", &row.to_json(), &Query::new().select(POST_SELECT))
            .await
    }

    /// Publish an already-built row, such as an accepted import
    pub async fn insert_post_row(&self, row: &Value) -> UnityResult<()> {
        self.insert_minimal("posts", row).await
    }

    pub async fn delete_post(&self, post_id: &str) -> UnityResult<()> {
        self.delete("posts", &Query::new().eq("id", post_id)).await
    }

    /// Pin or unpin on the owner's profile; only matches the owner's own post
    pub async fn set_user_pin(&self, post_id: &str, owner_id: &str, pinned: bool) -> UnityResult<PinState> {
        let pinned_at = pinned.then(Utc::now);
        let rows: Vec<Value> = self
            .update(
                "posts",
                &Query::new().eq("id", post_id).eq("user_id", owner_id),
                &json!({ "user_pinned": pinned, "user_pinned_at": pinned_at }),
            )
            .await?;

        if rows.is_empty() {
            return Err(UnityError::denied("only the author can pin this post"));
        }
        Ok(PinState {
            post_id: post_id.to_string(),
            pinned,
            pinned_at,
        })
    }

    /// Administrative pin; also sets the profile pin
    pub async fn set_admin_pin(&self, post_id: &str, pinned: bool) -> UnityResult<PinState> {
        let pinned_at = pinned.then(Utc::now);
        let rows: Vec<Value> = self
            .update(
                "posts",
                &Query::new().eq("id", post_id),
                &json!({
                    "admin_pinned": pinned,
                    "admin_pinned_at": pinned_at,
                    "user_pinned": pinned,
                    "user_pinned_at": pinned_at,
                }),
            )
            .await?;

        if rows.is_empty() {
            return Err(UnityError::NotFound(format!("post {}", post_id)));
        }
        Ok(PinState {
            post_id: post_id.to_string(),
            pinned,
            pinned_at,
        })
    }

    pub async fn count_posts(&self) -> UnityResult<u64> {
        self.count("posts", &Query::new()).await
    }

    pub async fn count_posts_since(&self, since: DateTime<Utc>) -> UnityResult<u64> {
        self.count("posts", &Query::new().since("created_at", since)).await
    }

    /// Types of the posts created since a moment
    pub async fn post_types_since(&self, since: DateTime<Utc>) -> UnityResult<Vec<PostType>> {
        let rows: Vec<PostTypeRow> = self
            .select(
                "posts",
                &Query::new().select("post_type").since("created_at", since),
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.post_type).collect())
    }
}

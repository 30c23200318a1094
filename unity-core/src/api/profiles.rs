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

//! Profile, role and follow queries

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::error::UnityResult;
use crate::models::{FollowCounts, FollowUser, Profile, Role};

use super::client::BackendClient;
use super::query::Query;

/// Columns readable on someone else's profile
const PUBLIC_PROFILE_COLUMNS: &str = "id, full_name, role, created_at, avatar_url, bio";

#[derive(Deserialize)]
struct RoleRow {
    role: Role,
}

#[derive(Deserialize)]
struct FollowRow {
    #[serde(default)]
    profiles: Option<FollowUser>,
}

impl BackendClient {
    /// Full profile row
    pub async fn get_profile(&self, user_id: &str) -> UnityResult<Option<Profile>> {
        self.select_one("profiles", &Query::new().select("*").eq("id", user_id))
            .await
    }

    /// Profile as visible to other users
    pub async fn get_public_profile(&self, user_id: &str) -> UnityResult<Option<Profile>> {
        self.select_one(
            "profiles",
            &Query::new().select(PUBLIC_PROFILE_COLUMNS).eq("id", user_id),
        )
        .await
    }

    /// Extra roles granted through `user_roles`
    pub async fn get_user_roles(&self, user_id: &str) -> UnityResult<Vec<Role>> {
        let rows: Vec<RoleRow> = self
            .select("user_roles", &Query::new().select("role").eq("user_id", user_id))
            .await?;
        Ok(rows.into_iter().map(|r| r.role).collect())
    }

    /// Every profile, newest first
    pub async fn list_profiles(&self) -> UnityResult<Vec<Profile>> {
        self.select(
            "profiles",
            &Query::new().select("*").order("created_at", true),
        )
        .await
    }

    /// Executives waiting for approval, newest first
    pub async fn pending_executives(&self) -> UnityResult<Vec<Profile>> {
        let query = Query::new()
            .select("*")
            .eq("role", Role::Executive.as_str())
            .eq("is_approved", false)
            .order("created_at", true);
        self.select("profiles", &query).await
    }

    /// Patch profile columns
    pub async fn update_profile(&self, user_id: &str, patch: &serde_json::Value) -> UnityResult<Profile> {
        let rows: Vec<Profile> = self
            .update("profiles", &Query::new().eq("id", user_id), patch)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| crate::error::UnityError::NotFound(format!("profile {}", user_id)))
    }

    /// Record activity for the live-user figure
    pub async fn touch_activity(&self, user_id: &str) -> UnityResult<()> {
        self.update_minimal(
            "profiles",
            &Query::new().eq("id", user_id),
            &json!({ "updated_at": Utc::now() }),
        )
        .await
    }

    pub async fn follow_counts(&self, user_id: &str) -> UnityResult<FollowCounts> {
        let followers_query = Query::new().eq("following_id", user_id);
        let following_query = Query::new().eq("follower_id", user_id);
        let (followers, following) = futures::try_join!(
            self.count("follows", &followers_query),
            self.count("follows", &following_query),
        )?;
        Ok(FollowCounts { followers, following })
    }

    pub async fn followers(&self, user_id: &str) -> UnityResult<Vec<FollowUser>> {
        let query = Query::new()
            .select("follower_id, profiles!follows_follower_id_fkey(id, full_name, avatar_url, bio)")
            .eq("following_id", user_id);
        let rows: Vec<FollowRow> = self.select("follows", &query).await?;
        Ok(rows.into_iter().filter_map(|r| r.profiles).collect())
    }

    pub async fn following(&self, user_id: &str) -> UnityResult<Vec<FollowUser>> {
        let query = Query::new()
            .select("following_id, profiles!follows_following_id_fkey(id, full_name, avatar_url, bio)")
            .eq("follower_id", user_id);
        let rows: Vec<FollowRow> = self.select("follows", &query).await?;
        Ok(rows.into_iter().filter_map(|r| r.profiles).collect())
    }

    pub async fn is_following(&self, follower_id: &str, following_id: &str) -> UnityResult<bool> {
        let query = Query::new()
            .select("follower_id")
            .eq("follower_id", follower_id)
            .eq("following_id", following_id);
        let row: Option<serde_json::Value> = self.select_one("follows", &query).await?;
        Ok(row.is_some())
    }

    pub async fn follow(&self, follower_id: &str, following_id: &str) -> UnityResult<()> {
        self.insert_minimal(
            "follows",
            &json!({ "follower_id": follower_id, "following_id": following_id }),
        )
        .await
    }

    pub async fn unfollow(&self, follower_id: &str, following_id: &str) -> UnityResult<()> {
        self.delete(
            "follows",
            &Query::new()
                .eq("follower_id", follower_id)
                .eq("following_id", following_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::api::client::tests::client;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn follow_lists_unwrap_embedded_profiles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/follows"))
            .and(query_param("following_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"follower_id": "u2", "profiles": {"id": "u2", "full_name": "Gita", "avatar_url": null, "bio": null}},
                {"follower_id": "u3", "profiles": null}
            ])))
            .mount(&server)
            .await;

        let followers = client(&server).followers("u1").await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].full_name.as_deref(), Some("Gita"));
    }

    #[tokio::test]
    async fn follow_counts_use_both_directions() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/follows"))
            .and(query_param("following_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/5"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/follows"))
            .and(query_param("follower_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/2"))
            .mount(&server)
            .await;

        let counts = client(&server).follow_counts("u1").await.unwrap();
        assert_eq!((counts.followers, counts.following), (5, 2));
    }

    #[tokio::test]
    async fn user_roles_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_roles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"role": "volunteer"}, {"role": "super_admin"}
            ])))
            .mount(&server)
            .await;

        let roles = client(&server).get_user_roles("u1").await.unwrap();
        assert_eq!(roles, vec![crate::models::Role::Volunteer, crate::models::Role::SuperAdmin]);
    }
}

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

//! Moderation queries: suspension, approvals, imported content and stats

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::UnityResult;
use crate::models::{ClaimStatus, ImportStatus, ImportedAccount, PendingPost};

use super::client::BackendClient;
use super::query::Query;

/// Columns of the imported account directory; credentials are never read
const IMPORTED_ACCOUNT_COLUMNS: &str = "user_id, username, email, claimed";

impl BackendClient {
    pub async fn set_suspended(&self, user_id: &str, suspended: bool) -> UnityResult<()> {
        self.update_minimal(
            "profiles",
            &Query::new().eq("id", user_id),
            &json!({ "is_suspended": suspended }),
        )
        .await
    }

    pub async fn approve_executive(&self, user_id: &str) -> UnityResult<()> {
        self.update_minimal(
            "profiles",
            &Query::new().eq("id", user_id),
            &json!({ "is_approved": true }),
        )
        .await
    }

    /// Imported posts awaiting review, newest first
    pub async fn pending_posts(&self) -> UnityResult<Vec<PendingPost>> {
        let query = Query::new()
            .select("*")
            .eq("status", ImportStatus::Pending.as_str())
            .order("created_at", true);
        self.select("twitter_posts", &query).await
    }

    pub async fn get_pending_post(&self, twitter_unique_id: &str) -> UnityResult<Option<PendingPost>> {
        self.select_one(
            "twitter_posts",
            &Query::new().select("*").eq("twitter_unique_id", twitter_unique_id),
        )
        .await
    }

    pub async fn set_import_status(&self, twitter_unique_id: &str, status: ImportStatus) -> UnityResult<()> {
        self.update_minimal(
            "twitter_posts",
            &Query::new().eq("twitter_unique_id", twitter_unique_id),
            &json!({ "status": status }),
        )
        .await
    }

    pub async fn imported_accounts(&self) -> UnityResult<Vec<ImportedAccount>> {
        self.select(
            "twitter_id_map",
            &Query::new()
                .select(IMPORTED_ACCOUNT_COLUMNS)
                .order("username", false),
        )
        .await
    }

    pub async fn set_claimed(&self, user_id: &str, claimed: bool) -> UnityResult<()> {
        self.update_minimal(
            "twitter_id_map",
            &Query::new().eq("user_id", user_id),
            &json!({ "claimed": claimed }),
        )
        .await
    }

    /// Whether a profile belongs to an unclaimed imported account
    pub async fn claim_status(&self, user_id: &str) -> UnityResult<ClaimStatus> {
        let account: Option<ImportedAccount> = self
            .select_one(
                "twitter_id_map",
                &Query::new()
                    .select(IMPORTED_ACCOUNT_COLUMNS)
                    .eq("user_id", user_id),
            )
            .await?;

        Ok(match account {
            Some(account) if !account.claimed => ClaimStatus {
                claimable: true,
                username: Some(account.username),
            },
            _ => ClaimStatus::default(),
        })
    }

    pub async fn count_profiles(&self) -> UnityResult<u64> {
        self.count("profiles", &Query::new()).await
    }

    /// Profiles with activity since a moment
    pub async fn count_active_profiles(&self, since: DateTime<Utc>) -> UnityResult<u64> {
        self.count("profiles", &Query::new().since("updated_at", since))
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::api::client::tests::client;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn imported_accounts_never_request_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/twitter_id_map"))
            .and(query_param("select", "user_id,username,email,claimed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"user_id": "u1", "username": "handle", "email": null, "claimed": false}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let accounts = client(&server).imported_accounts().await.unwrap();
        assert_eq!(accounts[0].username, "handle");
    }

    #[tokio::test]
    async fn claimed_accounts_are_not_claimable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/twitter_id_map"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"user_id": "u1", "username": "handle", "claimed": true}
            ])))
            .mount(&server)
            .await;

        let status = client(&server).claim_status("u1").await.unwrap();
        assert!(!status.claimable);
        assert!(status.username.is_none());
    }
}

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

//! Likes, comments and polls

use serde::Deserialize;
use serde_json::json;

use crate::error::{UnityError, UnityResult};
use crate::models::{Comment, PollOption, PollVoteCount, Reaction, REACTION_LIKE};

use super::client::BackendClient;
use super::query::Query;

const COMMENT_SELECT: &str = "*, profiles(full_name, avatar_url)";

#[derive(Deserialize)]
struct VoteRow {
    poll_option_id: String,
}

impl BackendClient {
    /// Like rows of a post
    pub async fn likes(&self, post_id: &str) -> UnityResult<Vec<Reaction>> {
        let query = Query::new()
            .select("*")
            .eq("post_id", post_id)
            .eq("reaction_type", REACTION_LIKE);
        self.select("post_reactions", &query).await
    }

    pub async fn add_like(&self, post_id: &str, user_id: &str) -> UnityResult<()> {
        self.insert_minimal(
            "post_reactions",
            &json!({
                "post_id": post_id,
                "user_id": user_id,
                "reaction_type": REACTION_LIKE,
            }),
        )
        .await
    }

    pub async fn remove_like(&self, post_id: &str, user_id: &str) -> UnityResult<()> {
        let query = Query::new()
            .eq("post_id", post_id)
            .eq("user_id", user_id)
            .eq("reaction_type", REACTION_LIKE);
        self.delete("post_reactions", &query).await
    }

    /// Comments of a post, oldest first
    pub async fn comments(&self, post_id: &str) -> UnityResult<Vec<Comment>> {
        let query = Query::new()
            .select(COMMENT_SELECT)
            .eq("post_id", post_id)
            .order("created_at", false);
        self.select("comments", &query).await
    }

    pub async fn comment_count(&self, post_id: &str) -> UnityResult<u64> {
        self.count("comments", &Query::new().eq("post_id", post_id))
            .await
    }

    pub async fn add_comment(&self, post_id: &str, user_id: &str, content: &str) -> UnityResult<Comment> {
        self.insert_one(
            "comments",
            &json!({ "post_id": post_id, "user_id": user_id, "content": content }),
            &Query::new().select(COMMENT_SELECT),
        )
        .await
    }

    pub async fn poll_options(&self, post_id: &str) -> UnityResult<Vec<PollOption>> {
        self.select("poll_options", &Query::new().select("*").eq("post_id", post_id))
            .await
    }

    pub async fn insert_poll_options(&self, post_id: &str, options: &[String]) -> UnityResult<Vec<PollOption>> {
        let rows: Vec<_> = options
            .iter()
            .map(|text| json!({ "post_id": post_id, "option_text": text }))
            .collect();
        self.insert("poll_options", &rows, &Query::new()).await
    }

    /// Pre-aggregated counts for the given options
    pub async fn poll_vote_counts(&self, option_ids: &[String]) -> UnityResult<Vec<PollVoteCount>> {
        if option_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            "poll_vote_counts",
            &Query::new().select("*").in_list("poll_option_id", option_ids),
        )
        .await
    }

    /// Option the user voted for among `option_ids`
    pub async fn user_poll_vote(&self, user_id: &str, option_ids: &[String]) -> UnityResult<Option<String>> {
        if option_ids.is_empty() {
            return Ok(None);
        }
        let query = Query::new()
            .select("poll_option_id")
            .eq("user_id", user_id)
            .in_list("poll_option_id", option_ids);
        let row: Option<VoteRow> = self.select_one("poll_votes", &query).await?;
        Ok(row.map(|r| r.poll_option_id))
    }

    /// Record a vote; a duplicate is reported as [`UnityError::AlreadyVoted`]
    pub async fn insert_vote(&self, option_id: &str, user_id: &str) -> UnityResult<()> {
        let result = self
            .insert_minimal(
                "poll_votes",
                &json!({ "poll_option_id": option_id, "user_id": user_id }),
            )
            .await;

        match result {
            Err(e) if e.is_conflict() => Err(UnityError::AlreadyVoted),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::client;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn duplicate_vote_is_already_voted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/poll_votes"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"poll_votes_pkey\""
            })))
            .mount(&server)
            .await;

        let err = client(&server).insert_vote("o1", "u1").await.unwrap_err();
        assert!(matches!(err, UnityError::AlreadyVoted));
    }

    #[tokio::test]
    async fn vote_counts_filter_by_options() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/poll_vote_counts"))
            .and(query_param("poll_option_id", "in.(o1,o2)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"poll_option_id": "o1", "vote_count": 3}
            ])))
            .mount(&server)
            .await;

        let counts = client(&server)
            .poll_vote_counts(&["o1".to_string(), "o2".to_string()])
            .await
            .unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].vote_count, 3);
    }

    #[tokio::test]
    async fn no_options_means_no_request() {
        let server = MockServer::start().await;
        let counts = client(&server).poll_vote_counts(&[]).await.unwrap();
        assert!(counts.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}

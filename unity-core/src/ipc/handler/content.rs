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

//! Feed, post, engagement and media operations

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{required, MessageHandler};
use crate::api::converter::tally_poll;
use crate::api::posts::PostRow;
use crate::error::{UnityError, UnityResult};
use crate::models::{
    Comment, FeedPage, LoadMoreResult, MediaKind, MediaUploadRequest, NewPost, PendingPost,
    PinState, Poll, Post, PostType, ReactionSummary, UploadTarget, UploadedMedia,
    MAX_POLL_OPTIONS, MIN_POLL_OPTIONS,
};

#[derive(Deserialize)]
pub(super) struct PostParams {
    post_id: String,
}

#[derive(Deserialize)]
pub(super) struct PinParams {
    post_id: String,
    pinned: bool,
}

#[derive(Deserialize)]
pub(super) struct CommentParams {
    post_id: String,
    content: String,
}

#[derive(Deserialize)]
pub(super) struct VoteParams {
    post_id: String,
    option_id: String,
}

/// Trimmed, non-empty poll options within the allowed range
pub(super) fn validate_poll_options(options: &[String]) -> UnityResult<Vec<String>> {
    let options: Vec<String> = options
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if options.len() < MIN_POLL_OPTIONS {
        return Err(UnityError::validation("A poll needs at least 2 options"));
    }
    if options.len() > MAX_POLL_OPTIONS {
        return Err(UnityError::validation("A poll can have at most 4 options"));
    }
    Ok(options)
}

/// Post type implied by attached media when none was chosen
fn infer_post_type(requested: PostType, uploaded: &[UploadedMedia], urls: &[String]) -> PostType {
    if requested != PostType::Text {
        return requested;
    }

    let video = uploaded.iter().any(|m| m.kind == MediaKind::Video)
        || urls.iter().any(|u| PendingPost::is_video_url(u));
    if video {
        PostType::Video
    } else if !urls.is_empty() || !uploaded.is_empty() {
        PostType::Image
    } else {
        PostType::Text
    }
}

impl MessageHandler {
    // ===== FEED =====

    pub(super) async fn feed_refresh(&self) -> UnityResult<FeedPage> {
        let client = self.client_or_anon().await;
        let page = self.feed.refresh(&client).await?;

        if let Err(e) = self.cache.save_feed_snapshot(&page.items).await {
            warn!("Failed to cache feed: {:#}", e);
        }
        Ok(page)
    }

    pub(super) async fn feed_load_more(&self) -> UnityResult<LoadMoreResult> {
        let client = self.client_or_anon().await;
        self.feed.load_more(&client).await
    }

    // ===== POSTS =====

    /// Upload attachments, insert the post and, for polls, its options
    pub(super) async fn create_post(&self, request: NewPost) -> UnityResult<Post> {
        let session = self.current().await?;
        let content = request
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let poll_options = if request.post_type == PostType::Poll {
            if content.is_none() {
                return Err(UnityError::validation("A poll needs a question"));
            }
            validate_poll_options(&request.poll_options)?
        } else {
            Vec::new()
        };

        if content.is_none() && request.media_urls.is_empty() && request.media_files.is_empty() {
            return Err(UnityError::validation("Write something or attach media"));
        }

        let mut uploaded = Vec::with_capacity(request.media_files.len());
        for file in &request.media_files {
            let media = session
                .client
                .upload_file(session.user_id(), &PathBuf::from(file), UploadTarget::Post)
                .await?;
            uploaded.push(media);
        }

        let post_type = infer_post_type(request.post_type, &uploaded, &request.media_urls);
        let media_urls: Vec<String> = request
            .media_urls
            .iter()
            .cloned()
            .chain(uploaded.iter().map(|m| m.public_url.clone()))
            .collect();
        let location = request
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());

        let post = session
            .client
            .insert_post(&PostRow {
                user_id: session.user_id(),
                content: content.as_deref(),
                post_type,
                media_urls: &media_urls,
                location,
            })
            .await?;

        if !poll_options.is_empty() {
            if let Err(e) = session.client.insert_poll_options(&post.id, &poll_options).await {
                // a poll without options is unusable
                warn!("Poll options failed, removing post {}: {}", post.id, e);
                if let Err(cleanup) = session.client.delete_post(&post.id).await {
                    warn!("Failed to remove post {}: {}", post.id, cleanup);
                }
                return Err(e);
            }
        }

        info!("Created {} post {}", post.post_type.as_str(), post.id);
        Ok(post)
    }

    pub(super) async fn get_post(&self, params: PostParams) -> UnityResult<Post> {
        self.client_or_anon()
            .await
            .get_post(&params.post_id)
            .await?
            .ok_or_else(|| UnityError::NotFound(format!("post {}", params.post_id)))
    }

    /// Delete a post, then its stored media
    pub(super) async fn delete_post(&self, params: PostParams) -> UnityResult<Value> {
        let session = self.current().await?;
        let post = session
            .client
            .get_post(&params.post_id)
            .await?
            .ok_or_else(|| UnityError::NotFound(format!("post {}", params.post_id)))?;

        session
            .viewer
            .require(session.viewer.can_delete_post(&post.user_id), "delete this post")?;

        session.client.delete_post(&post.id).await?;
        session.client.delete_media_best_effort(&post.media_url).await;

        Ok(json!({ "deleted": true, "post_id": post.id }))
    }

    pub(super) async fn pin_post(&self, params: PinParams) -> UnityResult<PinState> {
        let session = self.current().await?;
        session
            .client
            .set_user_pin(&params.post_id, session.user_id(), params.pinned)
            .await
    }

    pub(super) async fn admin_pin_post(&self, params: PinParams) -> UnityResult<PinState> {
        let session = self.current().await?;
        session
            .viewer
            .require(session.viewer.is_staff(), "pin posts for everyone")?;
        session
            .client
            .set_admin_pin(&params.post_id, params.pinned)
            .await
    }

    // ===== ENGAGEMENT =====

    /// Like or unlike, then report the fresh count
    pub(super) async fn toggle_like(&self, params: PostParams) -> UnityResult<ReactionSummary> {
        let session = self.current().await?;
        let user_id = session.user_id();

        let likes = session.client.likes(&params.post_id).await?;
        if ReactionSummary::from_reactions(&likes, Some(user_id)).liked {
            session.client.remove_like(&params.post_id, user_id).await?;
        } else {
            session.client.add_like(&params.post_id, user_id).await?;
        }

        let likes = session.client.likes(&params.post_id).await?;
        Ok(ReactionSummary::from_reactions(&likes, Some(user_id)))
    }

    pub(super) async fn reactions(&self, params: PostParams) -> UnityResult<Value> {
        let client = self.client_or_anon().await;
        let viewer_id = self.viewer_id().await;

        let (likes, comment_count) = tokio::try_join!(
            client.likes(&params.post_id),
            client.comment_count(&params.post_id),
        )?;

        Ok(json!({
            "likes": ReactionSummary::from_reactions(&likes, viewer_id.as_deref()),
            "comment_count": comment_count,
        }))
    }

    pub(super) async fn comments(&self, params: PostParams) -> UnityResult<Vec<Comment>> {
        self.client_or_anon().await.comments(&params.post_id).await
    }

    pub(super) async fn add_comment(&self, params: CommentParams) -> UnityResult<Comment> {
        let content = required(&params.content, "Comment")?;
        let session = self.current().await?;
        session
            .client
            .add_comment(&params.post_id, session.user_id(), &content)
            .await
    }

    pub(super) async fn poll(&self, params: PostParams) -> UnityResult<Poll> {
        let client = self.client_or_anon().await;
        let viewer_id = self.viewer_id().await;
        self.load_poll(&client, &params.post_id, viewer_id.as_deref())
            .await
    }

    async fn load_poll(
        &self,
        client: &crate::api::BackendClient,
        post_id: &str,
        viewer_id: Option<&str>,
    ) -> UnityResult<Poll> {
        let options = client.poll_options(post_id).await?;
        let ids: Vec<String> = options.iter().map(|o| o.id.clone()).collect();

        let own_vote = async {
            match viewer_id {
                Some(user_id) => client.user_poll_vote(user_id, &ids).await,
                None => Ok(None),
            }
        };
        let (counts, user_vote) = tokio::try_join!(client.poll_vote_counts(&ids), own_vote)?;

        Ok(tally_poll(post_id, &options, &counts, user_vote))
    }

    /// Record a vote; a second vote by the same user is refused
    pub(super) async fn vote(&self, params: VoteParams) -> UnityResult<Poll> {
        let session = self.current().await?;
        let user_id = session.user_id();

        let options = session.client.poll_options(&params.post_id).await?;
        if !options.iter().any(|o| o.id == params.option_id) {
            return Err(UnityError::validation("Unknown poll option"));
        }
        let ids: Vec<String> = options.iter().map(|o| o.id.clone()).collect();

        if session.client.user_poll_vote(user_id, &ids).await?.is_some() {
            return Err(UnityError::AlreadyVoted);
        }
        session.client.insert_vote(&params.option_id, user_id).await?;

        self.load_poll(&session.client, &params.post_id, Some(user_id))
            .await
    }

    // ===== MEDIA =====

    pub(super) async fn upload_media(&self, request: MediaUploadRequest) -> UnityResult<UploadedMedia> {
        let session = self.current().await?;
        session
            .client
            .upload_file(
                session.user_id(),
                &PathBuf::from(&request.file_path),
                request.target,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploaded(kind: MediaKind) -> UploadedMedia {
        UploadedMedia {
            public_url: "https://cdn/x".to_string(),
            kind,
            content_type: "x".to_string(),
            size: 1,
        }
    }

    #[test]
    fn poll_options_are_trimmed_and_bounded() {
        let opts = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(
            validate_poll_options(&opts(&[" Yes ", "No", "  "])).unwrap(),
            vec!["Yes", "No"]
        );
        assert!(validate_poll_options(&opts(&["Only", " "])).is_err());
        assert!(validate_poll_options(&opts(&["a", "b", "c", "d", "e"])).is_err());
        assert_eq!(validate_poll_options(&opts(&["a", "b", "c", "d"])).unwrap().len(), 4);
    }

    #[test]
    fn media_decides_text_post_type() {
        assert_eq!(infer_post_type(PostType::Text, &[], &[]), PostType::Text);
        assert_eq!(
            infer_post_type(PostType::Text, &[uploaded(MediaKind::Image)], &[]),
            PostType::Image
        );
        assert_eq!(
            infer_post_type(PostType::Text, &[], &["https://cdn/a.mp4".to_string()]),
            PostType::Video
        );
        assert_eq!(
            infer_post_type(PostType::Live, &[uploaded(MediaKind::Image)], &[]),
            PostType::Live
        );
    }
}

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

//! Home feed assembly
//!
//! Posts and events are fetched page by page in parallel, merged newest
//! first, and appended to a feed state that never holds the same item twice.

use std::cmp::Ordering;
use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::api::BackendClient;
use crate::error::UnityResult;
use crate::models::{Event, FeedItem, FeedPage, LoadMoreResult, Post};

/// Paged access to the two feed sources
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn posts_page(&self, page: u32, page_size: u32) -> UnityResult<Vec<Post>>;
    async fn events_page(&self, page: u32, page_size: u32) -> UnityResult<Vec<Event>>;
}

#[async_trait]
impl FeedSource for BackendClient {
    async fn posts_page(&self, page: u32, page_size: u32) -> UnityResult<Vec<Post>> {
        self.list_posts(page, page_size).await
    }

    async fn events_page(&self, page: u32, page_size: u32) -> UnityResult<Vec<Event>> {
        self.feed_events(page, page_size).await
    }
}

/// Newest first; posts before events on equal timestamps, then by id
pub fn compare_items(a: &FeedItem, b: &FeedItem) -> Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| a.source_rank().cmp(&b.source_rank()))
        .then_with(|| a.id().cmp(b.id()))
}

/// Merge one page of each source
pub fn merge(posts: Vec<Post>, events: Vec<Event>) -> Vec<FeedItem> {
    let mut items: Vec<FeedItem> = posts
        .into_iter()
        .map(FeedItem::Post)
        .chain(events.into_iter().map(FeedItem::Event))
        .collect();
    items.sort_by(compare_items);
    items
}

/// Items loaded so far
#[derive(Debug)]
pub struct FeedState {
    items: Vec<FeedItem>,
    seen: HashSet<String>,
    next_page: u32,
    has_more: bool,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            next_page: 0,
            has_more: true,
        }
    }
}

impl FeedState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Append a fetched page, skipping items already present
    pub fn append(&mut self, page: u32, items: Vec<FeedItem>, has_more: bool) -> FeedPage {
        let mut added = Vec::with_capacity(items.len());
        for item in items {
            if self.seen.insert(item.key()) {
                added.push(item);
            }
        }

        self.items.extend(added.iter().cloned());
        self.next_page = page + 1;
        self.has_more = has_more;

        FeedPage {
            page,
            items: added,
            has_more,
        }
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }
}

/// Loads pages into a shared feed state
pub struct FeedAssembler {
    page_size: u32,
    state: Mutex<FeedState>,
}

impl FeedAssembler {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            state: Mutex::new(FeedState::default()),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch both sources for one page
    async fn fetch(&self, source: &dyn FeedSource, page: u32) -> UnityResult<(Vec<FeedItem>, bool)> {
        let (posts, events) = tokio::try_join!(
            source.posts_page(page, self.page_size),
            source.events_page(page, self.page_size),
        )?;

        let full = self.page_size as usize;
        let has_more = posts.len() >= full || events.len() >= full;
        debug!(
            "Feed page {}: {} posts, {} events",
            page,
            posts.len(),
            events.len()
        );
        Ok((merge(posts, events), has_more))
    }

    /// Drop everything and load the first page again
    pub async fn refresh(&self, source: &dyn FeedSource) -> UnityResult<FeedPage> {
        let mut state = self.state.lock().await;
        let (items, has_more) = self.fetch(source, 0).await?;
        state.reset();
        let page = state.append(0, items, has_more);
        info!("Feed refreshed with {} items", page.items.len());
        Ok(page)
    }

    /// Load the next page unless a load is already running
    pub async fn load_more(&self, source: &dyn FeedSource) -> UnityResult<LoadMoreResult> {
        let Ok(mut state) = self.state.try_lock() else {
            debug!("Feed load already in flight");
            return Ok(LoadMoreResult::Busy);
        };

        if !state.has_more() {
            return Ok(LoadMoreResult::Exhausted);
        }

        let page = state.next_page();
        let (items, has_more) = self.fetch(source, page).await?;
        Ok(LoadMoreResult::Loaded(state.append(page, items, has_more)))
    }

    /// Everything loaded so far
    pub async fn snapshot(&self) -> Vec<FeedItem> {
        self.state.lock().await.items().to_vec()
    }

    /// Forget loaded pages, for example after signing out
    pub async fn clear(&self) {
        self.state.lock().await.reset();
    }
}

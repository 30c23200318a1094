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

//! Feed models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Event, Post};

/// Default number of rows fetched from each source per page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// An entry of the merged home feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedItem {
    Post(Post),
    Event(Event),
}

impl FeedItem {
    /// Identity used to deduplicate across pages
    pub fn key(&self) -> String {
        match self {
            FeedItem::Post(post) => format!("post:{}", post.id),
            FeedItem::Event(event) => format!("event:{}", event.id),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            FeedItem::Post(post) => &post.id,
            FeedItem::Event(event) => &event.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            FeedItem::Post(post) => post.created_at,
            FeedItem::Event(event) => event.created_at,
        }
    }

    /// Posts sort ahead of events on equal timestamps
    pub(crate) fn source_rank(&self) -> u8 {
        match self {
            FeedItem::Post(_) => 0,
            FeedItem::Event(_) => 1,
        }
    }
}

/// One page of the merged feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedPage {
    /// Page index, starting at 0
    pub page: u32,
    /// Items newly added by this page
    pub items: Vec<FeedItem>,
    /// Whether either source may have more rows
    pub has_more: bool,
}

/// Outcome of a load-more request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadMoreResult {
    Loaded(FeedPage),
    /// Another page load is in flight
    Busy,
    /// The feed has no more pages
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_serialize_with_kind_tag() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "title": "Satsang",
            "event_date": "2025-03-01T10:00:00Z",
            "created_at": "2025-02-01T10:00:00Z",
            "created_by": "u1"
        }))
        .unwrap();
        let item = FeedItem::Event(event);
        assert_eq!(item.key(), "event:e1");

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "event");
        assert_eq!(json["event_type"], "event");
    }

    #[test]
    fn busy_result_is_tagged() {
        let json = serde_json::to_value(LoadMoreResult::Busy).unwrap();
        assert_eq!(json["status"], "busy");
    }
}

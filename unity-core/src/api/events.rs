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

//! Events, protests and live streams

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::error::{UnityError, UnityResult};
use crate::models::{Event, LiveStream, LocationData, Protest, ProtestResponse, ResponseType};

use super::client::BackendClient;
use super::query::Query;

const EVENT_SELECT: &str = "*, profiles(full_name, avatar_url)";

/// Columns of an event insert
#[derive(Debug, Clone)]
pub struct EventRow<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub event_type: &'a str,
    pub location: Option<&'a str>,
    pub event_date: DateTime<Utc>,
    pub created_by: &'a str,
}

impl BackendClient {
    /// One page of events by creation time, for the home feed
    pub async fn feed_events(&self, page: u32, page_size: u32) -> UnityResult<Vec<Event>> {
        let query = Query::new()
            .select(EVENT_SELECT)
            .order("created_at", true)
            .page(page, page_size);
        self.select("events", &query).await
    }

    /// All events by date, soonest first
    pub async fn list_events(&self) -> UnityResult<Vec<Event>> {
        let query = Query::new()
            .select(EVENT_SELECT)
            .order("event_date", false);
        self.select("events", &query).await
    }

    pub async fn get_event(&self, event_id: &str) -> UnityResult<Option<Event>> {
        self.select_one("events", &Query::new().select(EVENT_SELECT).eq("id", event_id))
            .await
    }

    pub async fn insert_event(&self, row: &EventRow<'_>) -> UnityResult<Event> {
        let body = json!({
            "title": row.title,
            "description": row.description,
            "event_type": row.event_type,
            "location": row.location,
            "event_date": row.event_date,
            "created_by": row.created_by,
        });
        self.insert_one("events", &body, &Query::new().select(EVENT_SELECT))
            .await
    }

    pub async fn delete_event(&self, event_id: &str) -> UnityResult<()> {
        self.delete("events", &Query::new().eq("id", event_id)).await
    }

    /// Protests, newest first
    pub async fn list_protests(&self) -> UnityResult<Vec<Protest>> {
        self.select(
            "protests",
            &Query::new().select("*").order("created_at", true),
        )
        .await
    }

    pub async fn insert_protest(
        &self,
        user_id: &str,
        reason: &str,
        location: &LocationData,
    ) -> UnityResult<Protest> {
        let body = json!({
            "user_id": user_id,
            "reason": reason,
            "location": location.address,
            "location_lat": location.lat,
            "location_lng": location.lng,
        });
        self.insert_one("protests", &body, &Query::new()).await
    }

    pub async fn protest_responses(&self, protest_id: &str) -> UnityResult<Vec<ProtestResponse>> {
        self.select(
            "protest_responses",
            &Query::new()
                .select("protest_id, user_id, response_type")
                .eq("protest_id", protest_id),
        )
        .await
    }

    /// Set the user's response, replacing any earlier one
    pub async fn upsert_protest_response(
        &self,
        protest_id: &str,
        user_id: &str,
        response: ResponseType,
    ) -> UnityResult<()> {
        self.upsert(
            "protest_responses",
            &json!({
                "protest_id": protest_id,
                "user_id": user_id,
                "response_type": response,
            }),
            "protest_id,user_id",
        )
        .await
    }

    pub async fn delete_protest_response(&self, protest_id: &str, user_id: &str) -> UnityResult<()> {
        self.delete(
            "protest_responses",
            &Query::new().eq("protest_id", protest_id).eq("user_id", user_id),
        )
        .await
    }

    /// Create a live stream record with a fresh stream key
    pub async fn start_live_stream(
        &self,
        user_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> UnityResult<LiveStream> {
        let body = json!({
            "user_id": user_id,
            "title": title,
            "description": description,
            "stream_key": Uuid::new_v4().to_string(),
            "is_live": true,
            "started_at": Utc::now(),
        });
        self.insert_one("live_streams", &body, &Query::new()).await
    }

    /// Mark the user's stream as ended
    pub async fn end_live_stream(&self, stream_id: &str, user_id: &str) -> UnityResult<LiveStream> {
        let rows: Vec<LiveStream> = self
            .update(
                "live_streams",
                &Query::new().eq("id", stream_id).eq("user_id", user_id),
                &json!({ "is_live": false, "ended_at": Utc::now() }),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| UnityError::NotFound(format!("live stream {}", stream_id)))
    }

    /// Streams currently live, most recent first
    pub async fn live_streams(&self) -> UnityResult<Vec<LiveStream>> {
        let query = Query::new()
            .select("id, user_id, title, description, is_live, started_at, ended_at")
            .eq("is_live", true)
            .order("started_at", true);
        self.select("live_streams", &query).await
    }
}

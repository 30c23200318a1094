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

//! Event, protest and live stream models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuthorSummary;

/// Default event type when none is given
pub const DEFAULT_EVENT_TYPE: &str = "event";

/// A community event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub location: Option<String>,
    pub event_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default, alias = "profiles")]
    pub author: AuthorSummary,
}

fn default_event_type() -> String {
    DEFAULT_EVENT_TYPE.to_string()
}

/// Request to create an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub event_date: Option<DateTime<Utc>>,
}

/// RSVP answer to a protest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    WillCome,
    CantCome,
    NotNeeded,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::WillCome => "will_come",
            ResponseType::CantCome => "cant_come",
            ResponseType::NotNeeded => "not_needed",
        }
    }
}

/// A protest organised by a volunteer or above
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protest {
    pub id: String,
    pub user_id: String,
    pub reason: String,
    pub location: String,
    #[serde(default)]
    pub location_lat: Option<f64>,
    #[serde(default)]
    pub location_lng: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Protest {
    /// Map link for the protest location
    pub fn maps_url(&self) -> String {
        super::maps_url(&self.location, self.location_lat, self.location_lng)
    }
}

/// A protest response row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtestResponse {
    pub protest_id: String,
    pub user_id: String,
    pub response_type: ResponseType,
}

/// Number of responses of each kind
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseCounts {
    pub will_come: u64,
    pub cant_come: u64,
    pub not_needed: u64,
}

/// Response state of a protest for the viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtestResponseState {
    pub protest_id: String,
    pub counts: ResponseCounts,
    pub user_response: Option<ResponseType>,
}

/// A protest with its map link and the viewer's response state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtestView {
    #[serde(flatten)]
    pub protest: Protest,
    pub maps_url: String,
    pub responses: ProtestResponseState,
    /// False when the totals were withheld from the viewer
    pub counts_visible: bool,
}

impl ProtestResponseState {
    /// Drop the totals, keeping only the viewer's own response
    pub fn masked(self) -> Self {
        Self {
            counts: ResponseCounts::default(),
            ..self
        }
    }
}

/// Request to organise a protest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProtest {
    pub reason: String,
    pub location: String,
    /// Location picked from suggestions; required
    #[serde(default)]
    pub location_data: Option<super::LocationData>,
}

/// A live stream record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStream {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// Request to go live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLiveStream {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

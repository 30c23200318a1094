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

//! Events, protests, live streams and location lookups

use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{required, ActiveSession, MessageHandler};
use crate::api::converter::protest_response_state;
use crate::api::events::EventRow;
use crate::error::{UnityError, UnityResult};
use crate::models::{
    Event, LiveStream, LocationData, NewEvent, NewLiveStream, NewProtest, PlaceSuggestion, Protest,
    ProtestResponseState, ProtestView, ResponseType, DEFAULT_EVENT_TYPE,
};

#[derive(Deserialize)]
pub(super) struct EventParams {
    event_id: String,
}

#[derive(Deserialize)]
pub(super) struct ProtestParams {
    protest_id: String,
}

#[derive(Deserialize)]
pub(super) struct RespondParams {
    protest_id: String,
    response_type: ResponseType,
}

#[derive(Deserialize)]
pub(super) struct StreamParams {
    stream_id: String,
}

#[derive(Deserialize)]
pub(super) struct AutocompleteParams {
    input: String,
}

#[derive(Deserialize)]
pub(super) struct PlaceParams {
    place_id: String,
}

#[derive(Deserialize)]
pub(super) struct CoordinateParams {
    lat: f64,
    lng: f64,
}

/// What a respond request does given the viewer's current response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ResponseChange {
    Withdraw,
    Set(ResponseType),
}

/// The same answer again withdraws it; a member's first answer is final
pub(super) fn response_change(
    current: Option<ResponseType>,
    requested: ResponseType,
    can_change: bool,
) -> UnityResult<ResponseChange> {
    match current {
        Some(_) if !can_change => Err(UnityError::validation(
            "You have already responded to this protest",
        )),
        Some(existing) if existing == requested => Ok(ResponseChange::Withdraw),
        _ => Ok(ResponseChange::Set(requested)),
    }
}

impl MessageHandler {
    // ===== EVENTS =====

    pub(super) async fn list_events(&self) -> UnityResult<Vec<Event>> {
        self.current().await?.client.list_events().await
    }

    pub(super) async fn create_event(&self, request: NewEvent) -> UnityResult<Event> {
        let session = self.current().await?;
        session
            .viewer
            .require(session.viewer.is_volunteer_or_above(), "create events")?;

        let title = request.title.trim();
        let event_date = match request.event_date {
            Some(date) if !title.is_empty() => date,
            _ => return Err(UnityError::validation("Title and date are required")),
        };
        let event_type = request
            .event_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_EVENT_TYPE);

        let event = session
            .client
            .insert_event(&EventRow {
                title,
                description: request.description.as_deref().map(str::trim).filter(|d| !d.is_empty()),
                event_type,
                location: request.location.as_deref().map(str::trim).filter(|l| !l.is_empty()),
                event_date,
                created_by: session.user_id(),
            })
            .await?;

        info!("Created event {}", event.id);
        Ok(event)
    }

    pub(super) async fn delete_event(&self, params: EventParams) -> UnityResult<Value> {
        let session = self.current().await?;
        let event = session
            .client
            .get_event(&params.event_id)
            .await?
            .ok_or_else(|| UnityError::NotFound(format!("event {}", params.event_id)))?;

        session
            .viewer
            .require(session.viewer.can_delete_event(&event.created_by), "delete this event")?;
        session.client.delete_event(&event.id).await?;

        Ok(json!({ "deleted": true, "event_id": event.id }))
    }

    // ===== PROTESTS =====

    /// Response state as the viewer may see it
    async fn response_state(
        &self,
        session: &ActiveSession,
        protest_id: &str,
    ) -> UnityResult<(ProtestResponseState, bool)> {
        let responses = session.client.protest_responses(protest_id).await?;
        let state = protest_response_state(protest_id, &responses, Some(session.user_id()));

        if session.viewer.can_see_response_counts() {
            Ok((state, true))
        } else {
            Ok((state.masked(), false))
        }
    }

    pub(super) async fn list_protests(&self) -> UnityResult<Vec<ProtestView>> {
        let session = self.current().await?;
        let protests = session.client.list_protests().await?;

        let states = try_join_all(
            protests
                .iter()
                .map(|p| self.response_state(&session, &p.id)),
        )
        .await?;

        Ok(protests
            .into_iter()
            .zip(states)
            .map(|(protest, (responses, counts_visible))| ProtestView {
                maps_url: protest.maps_url(),
                protest,
                responses,
                counts_visible,
            })
            .collect())
    }

    pub(super) async fn create_protest(&self, request: NewProtest) -> UnityResult<Protest> {
        let session = self.current().await?;
        session
            .viewer
            .require(session.viewer.is_volunteer_or_above(), "organise protests")?;

        let reason = required(&request.reason, "Reason")?;
        let location = required(&request.location, "Location")?;
        let picked = request.location_data.ok_or_else(|| {
            UnityError::validation("Please select a location from the suggestions")
        })?;

        let place = LocationData {
            address: location,
            ..picked
        };
        let protest = session
            .client
            .insert_protest(session.user_id(), &reason, &place)
            .await?;

        info!("Organised protest {}", protest.id);
        Ok(protest)
    }

    pub(super) async fn respond_to_protest(&self, params: RespondParams) -> UnityResult<Value> {
        let session = self.current().await?;
        let user_id = session.user_id();

        let responses = session.client.protest_responses(&params.protest_id).await?;
        let current = protest_response_state(&params.protest_id, &responses, Some(user_id)).user_response;

        match response_change(
            current,
            params.response_type,
            session.viewer.is_volunteer_or_above(),
        )? {
            ResponseChange::Withdraw => {
                session
                    .client
                    .delete_protest_response(&params.protest_id, user_id)
                    .await?
            }
            ResponseChange::Set(response) => {
                session
                    .client
                    .upsert_protest_response(&params.protest_id, user_id, response)
                    .await?
            }
        }

        let (responses, counts_visible) = self.response_state(&session, &params.protest_id).await?;
        Ok(json!({ "responses": responses, "counts_visible": counts_visible }))
    }

    pub(super) async fn protest_responses(&self, params: ProtestParams) -> UnityResult<Value> {
        let session = self.current().await?;
        let (responses, counts_visible) = self.response_state(&session, &params.protest_id).await?;
        Ok(json!({ "responses": responses, "counts_visible": counts_visible }))
    }

    // ===== LIVE STREAMS =====

    pub(super) async fn start_live(&self, request: NewLiveStream) -> UnityResult<LiveStream> {
        let title = required(&request.title, "Title")?;
        let session = self.current().await?;
        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        session
            .client
            .start_live_stream(session.user_id(), &title, description)
            .await
    }

    pub(super) async fn end_live(&self, params: StreamParams) -> UnityResult<LiveStream> {
        let session = self.current().await?;
        session
            .client
            .end_live_stream(&params.stream_id, session.user_id())
            .await
    }

    pub(super) async fn live_streams(&self) -> UnityResult<Vec<LiveStream>> {
        self.client_or_anon().await.live_streams().await
    }

    // ===== LOCATION =====

    fn require_geocoding(&self) -> UnityResult<()> {
        if self.geocode.is_configured() {
            Ok(())
        } else {
            Err(UnityError::validation("Location search is not configured"))
        }
    }

    pub(super) async fn autocomplete(&self, params: AutocompleteParams) -> UnityResult<Vec<PlaceSuggestion>> {
        self.require_geocoding()?;
        let input = params.input.trim();
        if input.is_empty() {
            return Ok(Vec::new());
        }
        self.geocode.autocomplete(input).await
    }

    pub(super) async fn resolve_place(&self, params: PlaceParams) -> UnityResult<LocationData> {
        self.require_geocoding()?;
        self.geocode.place_details(&params.place_id).await
    }

    pub(super) async fn reverse_geocode(&self, params: CoordinateParams) -> UnityResult<LocationData> {
        self.require_geocoding()?;
        self.geocode.reverse_geocode(params.lat, params.lng).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_response_withdraws() {
        assert_eq!(
            response_change(Some(ResponseType::WillCome), ResponseType::WillCome, true).unwrap(),
            ResponseChange::Withdraw
        );
    }

    #[test]
    fn member_answers_are_final() {
        assert!(response_change(Some(ResponseType::WillCome), ResponseType::WillCome, false).is_err());
        assert!(response_change(Some(ResponseType::CantCome), ResponseType::WillCome, false).is_err());
    }

    #[test]
    fn first_response_is_set() {
        assert_eq!(
            response_change(None, ResponseType::CantCome, false).unwrap(),
            ResponseChange::Set(ResponseType::CantCome)
        );
    }

    #[test]
    fn only_volunteers_switch_answers() {
        assert_eq!(
            response_change(Some(ResponseType::WillCome), ResponseType::NotNeeded, true).unwrap(),
            ResponseChange::Set(ResponseType::NotNeeded)
        );
    }
}

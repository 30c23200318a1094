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

//! Geocoding and places lookups for location tagging

use std::time::Instant;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::MapsSettings;
use crate::error::{UnityError, UnityResult};
use crate::log_api_call;
use crate::models::{combine_place_address, LocationData, PlaceSuggestion};

#[derive(Debug, Deserialize)]
struct StructuredFormatting {
    #[serde(default)]
    main_text: Option<String>,
    #[serde(default)]
    secondary_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    place_id: String,
    description: String,
    #[serde(default)]
    structured_formatting: Option<StructuredFormatting>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct Place {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse<T> {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default = "Option::default")]
    predictions: Option<Vec<T>>,
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default = "Option::default")]
    results: Option<Vec<T>>,
}

impl<T> PlacesResponse<T> {
    /// Map the API status field to an error
    fn check(&self) -> UnityResult<()> {
        match self.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(()),
            other => Err(UnityError::Api {
                status: 200,
                code: Some(other.to_string()),
                message: self
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("places lookup failed: {}", other)),
            }),
        }
    }
}

/// Client for the geocoding and places API
#[derive(Clone)]
pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    region: String,
    language: String,
}

impl GeocodeClient {
    pub fn new(settings: &MapsSettings) -> UnityResult<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            region: settings.region.to_lowercase(),
            language: settings.language.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> UnityResult<PlacesResponse<T>> {
        if !self.is_configured() {
            return Err(UnityError::validation("location search is not configured"));
        }

        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| UnityError::validation(format!("invalid maps URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("language", &self.language);
            query.append_pair("key", &self.api_key);
        }

        let started = Instant::now();
        let response = self.http.get(url).send().await?;
        let status = response.status();
        log_api_call!("GET", path, status.as_u16(), started.elapsed().as_millis() as u64);

        if !status.is_success() {
            return Err(UnityError::Api {
                status: status.as_u16(),
                code: None,
                message: format!("places lookup failed with status {}", status),
            });
        }

        let body: PlacesResponse<T> = response.json().await?;
        body.check()?;
        Ok(body)
    }

    /// Place suggestions for free text, restricted to the configured region
    pub async fn autocomplete(&self, input: &str) -> UnityResult<Vec<PlaceSuggestion>> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let components = format!("country:{}", self.region);
        let body: PlacesResponse<Prediction> = self
            .get(
                "place/autocomplete/json",
                &[("input", input), ("components", &components)],
            )
            .await?;

        Ok(body
            .predictions
            .unwrap_or_default()
            .into_iter()
            .map(|p| {
                let (main_text, secondary_text) = p
                    .structured_formatting
                    .map(|f| (f.main_text, f.secondary_text))
                    .unwrap_or((None, None));
                PlaceSuggestion {
                    place_id: p.place_id,
                    description: p.description,
                    main_text,
                    secondary_text,
                }
            })
            .collect())
    }

    /// Resolve a suggestion into an address with coordinates
    pub async fn place_details(&self, place_id: &str) -> UnityResult<LocationData> {
        let body: PlacesResponse<Place> = self
            .get(
                "place/details/json",
                &[
                    ("place_id", place_id),
                    ("fields", "name,formatted_address,geometry"),
                ],
            )
            .await?;

        let place = body
            .result
            .ok_or_else(|| UnityError::NotFound(format!("place {}", place_id)))?;
        let formatted = place.formatted_address.unwrap_or_default();

        Ok(LocationData {
            address: combine_place_address(place.name.as_deref(), &formatted),
            lat: place.geometry.location.lat,
            lng: place.geometry.location.lng,
        })
    }

    /// Address of the given coordinates
    pub async fn reverse_geocode(&self, lat: f64, lng: f64) -> UnityResult<LocationData> {
        let latlng = format!("{},{}", lat, lng);
        let body: PlacesResponse<Place> = self
            .get("geocode/json", &[("latlng", &latlng)])
            .await?;

        let address = body
            .results
            .unwrap_or_default()
            .into_iter()
            .find_map(|p| p.formatted_address)
            .unwrap_or_else(|| format!("{:.6}, {:.6}", lat, lng));

        Ok(LocationData { address, lat, lng })
    }
}

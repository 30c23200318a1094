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

//! Location tagging models

use serde::{Deserialize, Serialize};

/// A geocoded place
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationData {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

/// An autocomplete suggestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceSuggestion {
    pub place_id: String,
    pub description: String,
    #[serde(default)]
    pub main_text: Option<String>,
    #[serde(default)]
    pub secondary_text: Option<String>,
}

/// Address shown for a picked place
///
/// The place name is prefixed unless the formatted address already starts
/// with it.
pub fn combine_place_address(name: Option<&str>, formatted: &str) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) if !formatted.starts_with(name) => format!("{}, {}", name, formatted),
        _ => formatted.to_string(),
    }
}

/// Map search link for a location
pub fn maps_url(address: &str, lat: Option<f64>, lng: Option<f64>) -> String {
    match (lat, lng) {
        (Some(lat), Some(lng)) => format!(
            "https://www.google.com/maps/search/?api=1&query={},{}",
            lat, lng
        ),
        _ => format!(
            "https://www.google.com/maps/search/?api=1&query={}",
            urlencoding::encode(address)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_name_prefixed_once() {
        assert_eq!(
            combine_place_address(Some("Azad Maidan"), "Fort, Mumbai, Maharashtra"),
            "Azad Maidan, Fort, Mumbai, Maharashtra"
        );
        assert_eq!(
            combine_place_address(Some("Mumbai"), "Mumbai, Maharashtra"),
            "Mumbai, Maharashtra"
        );
        assert_eq!(combine_place_address(None, "Pune"), "Pune");
    }

    #[test]
    fn maps_link_prefers_coordinates() {
        assert_eq!(
            maps_url("Pune", Some(18.52), Some(73.85)),
            "https://www.google.com/maps/search/?api=1&query=18.52,73.85"
        );
        assert_eq!(
            maps_url("Ram Nagar, Pune", None, Some(73.85)),
            "https://www.google.com/maps/search/?api=1&query=Ram%20Nagar%2C%20Pune"
        );
    }
}

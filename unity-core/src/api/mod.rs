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

//! Clients for the hosted backend, the companion upload API and geocoding

pub mod auth;
pub mod client;
pub mod converter;
pub mod engagement;
pub mod events;
pub mod geocode;
pub mod moderation;
pub mod posts;
pub mod profiles;
pub mod query;
pub mod upload;

pub use client::BackendClient;
pub use geocode::GeocodeClient;
pub use query::Query;

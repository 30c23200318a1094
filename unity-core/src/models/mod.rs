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

//! Data models for Hindu Unity
//!
//! These models represent the rows of the hosted backend and the payloads
//! exchanged with the UI over IPC.

mod profile;
mod post;
mod poll;
mod comment;
mod event;
mod feed;
mod location;
mod moderation;
mod session;
mod ipc_message;
mod media;

pub use profile::*;
pub use post::*;
pub use poll::*;
pub use comment::*;
pub use event::*;
pub use feed::*;
pub use location::*;
pub use moderation::*;
pub use session::*;
pub use ipc_message::*;
pub use media::*;

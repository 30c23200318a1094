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

//! Poll models

use serde::{Deserialize, Serialize};

/// Minimum number of non-empty options on a poll
pub const MIN_POLL_OPTIONS: usize = 2;
/// Maximum number of options on a poll
pub const MAX_POLL_OPTIONS: usize = 4;

/// A poll option row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollOption {
    pub id: String,
    pub post_id: String,
    pub option_text: String,
}

/// A row of the pre-aggregated vote count view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollVoteCount {
    pub poll_option_id: String,
    #[serde(default)]
    pub vote_count: u64,
}

/// One option with its tally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOptionTally {
    pub id: String,
    pub text: String,
    pub votes: u64,
    /// Share of all votes, 0 to 100
    pub percentage: f64,
}

/// A poll as shown to the viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub post_id: String,
    pub options: Vec<PollOptionTally>,
    pub total_votes: u64,
    /// Option the viewer voted for
    pub user_vote: Option<String>,
}

impl Poll {
    /// Whether the viewer has voted
    pub fn has_voted(&self) -> bool {
        self.user_vote.is_some()
    }
}

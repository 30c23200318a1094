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

//! Conversions from backend rows to the shapes the UI renders

use std::collections::HashMap;

use crate::models::{
    Poll, PollOption, PollOptionTally, PollVoteCount, ProtestResponse, ProtestResponseState,
    ResponseCounts,
};

/// Merge poll options with the aggregated vote counts
pub fn tally_poll(
    post_id: &str,
    options: &[PollOption],
    counts: &[PollVoteCount],
    user_vote: Option<String>,
) -> Poll {
    let by_option: HashMap<&str, u64> = counts
        .iter()
        .map(|c| (c.poll_option_id.as_str(), c.vote_count))
        .collect();

    let votes: Vec<u64> = options
        .iter()
        .map(|o| by_option.get(o.id.as_str()).copied().unwrap_or(0))
        .collect();
    let total_votes: u64 = votes.iter().sum();

    let options = options
        .iter()
        .zip(votes)
        .map(|(option, votes)| PollOptionTally {
            id: option.id.clone(),
            text: option.option_text.clone(),
            votes,
            percentage: percentage(votes, total_votes),
        })
        .collect();

    Poll {
        post_id: post_id.to_string(),
        options,
        total_votes,
        user_vote,
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Count responses per kind and find the viewer's own
pub fn protest_response_state(
    protest_id: &str,
    responses: &[ProtestResponse],
    viewer_id: Option<&str>,
) -> ProtestResponseState {
    let mut counts = ResponseCounts::default();
    let mut user_response = None;

    for response in responses {
        match response.response_type {
            crate::models::ResponseType::WillCome => counts.will_come += 1,
            crate::models::ResponseType::CantCome => counts.cant_come += 1,
            crate::models::ResponseType::NotNeeded => counts.not_needed += 1,
        }
        if Some(response.user_id.as_str()) == viewer_id {
            user_response = Some(response.response_type);
        }
    }

    ProtestResponseState {
        protest_id: protest_id.to_string(),
        counts,
        user_response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponseType;

    fn option(id: &str) -> PollOption {
        PollOption {
            id: id.into(),
            post_id: "p1".into(),
            option_text: format!("Option {}", id),
        }
    }

    #[test]
    fn tally_merges_view_counts() {
        let options = vec![option("a"), option("b"), option("c")];
        let counts = vec![
            PollVoteCount { poll_option_id: "a".into(), vote_count: 3 },
            PollVoteCount { poll_option_id: "c".into(), vote_count: 1 },
        ];

        let poll = tally_poll("p1", &options, &counts, Some("a".into()));
        assert_eq!(poll.total_votes, 4);
        assert_eq!(poll.options[0].percentage, 75.0);
        assert_eq!(poll.options[1].votes, 0);
        assert_eq!(poll.options[2].percentage, 25.0);
        assert!(poll.has_voted());
    }

    #[test]
    fn empty_poll_has_zero_percentages() {
        let poll = tally_poll("p1", &[option("a"), option("b")], &[], None);
        assert_eq!(poll.total_votes, 0);
        assert!(poll.options.iter().all(|o| o.percentage == 0.0));
    }

    #[test]
    fn response_counts_and_viewer_choice() {
        let row = |user: &str, kind| ProtestResponse {
            protest_id: "pr".into(),
            user_id: user.into(),
            response_type: kind,
        };
        let rows = vec![
            row("a", ResponseType::WillCome),
            row("b", ResponseType::WillCome),
            row("c", ResponseType::NotNeeded),
        ];

        let state = protest_response_state("pr", &rows, Some("c"));
        assert_eq!(state.counts.will_come, 2);
        assert_eq!(state.counts.cant_come, 0);
        assert_eq!(state.user_response, Some(ResponseType::NotNeeded));
    }
}

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

//! Comment and reaction models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuthorSummary;

/// The only reaction kind the platform uses
pub const REACTION_LIKE: &str = "like";

/// A comment on a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "profiles")]
    pub author: AuthorSummary,
}

/// A reaction row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub post_id: String,
    pub user_id: String,
    pub reaction_type: String,
}

/// Like state of a post for the viewer
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionSummary {
    pub like_count: u64,
    pub liked: bool,
}

impl ReactionSummary {
    /// Summarise like rows for a viewer
    pub fn from_reactions(reactions: &[Reaction], viewer_id: Option<&str>) -> Self {
        let likes = reactions
            .iter()
            .filter(|r| r.reaction_type == REACTION_LIKE);

        let mut like_count = 0;
        let mut liked = false;
        for reaction in likes {
            like_count += 1;
            if Some(reaction.user_id.as_str()) == viewer_id {
                liked = true;
            }
        }

        Self { like_count, liked }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn like(user: &str) -> Reaction {
        Reaction {
            post_id: "p".into(),
            user_id: user.into(),
            reaction_type: REACTION_LIKE.into(),
        }
    }

    #[test]
    fn summary_counts_likes_and_viewer() {
        let rows = vec![like("a"), like("b")];
        let summary = ReactionSummary::from_reactions(&rows, Some("b"));
        assert_eq!(summary, ReactionSummary { like_count: 2, liked: true });

        let anonymous = ReactionSummary::from_reactions(&rows, None);
        assert!(!anonymous.liked);
    }
}

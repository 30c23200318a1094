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

//! Filter and ordering parameters for REST table requests

use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;

/// Query parameters for a REST table request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<u32>,
    offset: Option<u32>,
    on_conflict: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to return, including embedded resources
    pub fn select(mut self, columns: &str) -> Self {
        let compact: String = columns.split_whitespace().collect::<Vec<_>>().join("");
        self.select = Some(compact);
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Display) -> Self {
        self.filters.push((column.to_string(), format!("gte.{}", value)));
        self
    }

    /// Timestamp lower bound
    pub fn since(self, column: &str, at: DateTime<Utc>) -> Self {
        self.gte(column, at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Column value is one of `values`
    pub fn in_list<S: AsRef<str>>(mut self, column: &str, values: &[S]) -> Self {
        let items: Vec<String> = values.iter().map(|v| quote_list_item(v.as_ref())).collect();
        self.filters
            .push((column.to_string(), format!("in.({})", items.join(","))));
        self
    }

    /// Append an ordering column; earlier calls take precedence
    pub fn order(mut self, column: &str, descending: bool) -> Self {
        let direction = if descending { "desc" } else { "asc" };
        self.order.push(format!("{}.{}", column, direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Page `page` of `page_size` rows
    pub fn page(self, page: u32, page_size: u32) -> Self {
        self.limit(page_size).offset(page.saturating_mul(page_size))
    }

    /// Conflict target for upserts
    pub fn on_conflict(mut self, columns: &str) -> Self {
        self.on_conflict = Some(columns.to_string());
        self
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Parameters in the order they are sent
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 5);
        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        pairs.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            pairs.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(on_conflict) = &self.on_conflict {
            pairs.push(("on_conflict".to_string(), on_conflict.clone()));
        }
        pairs
    }

    /// Append the parameters to a URL
    pub fn apply(&self, url: &mut Url) {
        let pairs = self.pairs();
        if pairs.is_empty() {
            return;
        }
        let mut query = url.query_pairs_mut();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
    }
}

/// Quote list members that contain reserved characters
fn quote_list_item(value: &str) -> String {
    if value.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn pairs_keep_filter_order() {
        let query = Query::new()
            .select("*, profiles ( full_name, avatar_url )")
            .eq("user_id", "u1")
            .order("user_pinned", true)
            .order("created_at", true)
            .page(2, 10);

        assert_eq!(
            query.pairs(),
            vec![
                ("select".into(), "*,profiles(full_name,avatar_url)".into()),
                ("user_id".into(), "eq.u1".into()),
                ("order".into(), "user_pinned.desc,created_at.desc".into()),
                ("limit".into(), "10".into()),
                ("offset".into(), "20".into()),
            ]
        );
    }

    #[test]
    fn in_list_quotes_reserved_values() {
        let query = Query::new().in_list("poll_option_id", &["a", "b,c"]);
        assert_eq!(query.pairs()[0].1, "in.(a,\"b,c\")");
    }

    #[test]
    fn url_encoding_of_timestamps() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let mut url = Url::parse("https://db.example/rest/v1/posts").unwrap();
        Query::new().select("post_type").since("created_at", at).apply(&mut url);
        assert_eq!(
            url.as_str(),
            "https://db.example/rest/v1/posts?select=post_type&created_at=gte.2025-01-02T03%3A04%3A05.000Z"
        );
    }

    #[test]
    fn upsert_target() {
        let query = Query::new().on_conflict("protest_id,user_id");
        assert_eq!(query.pairs(), vec![("on_conflict".into(), "protest_id,user_id".into())]);
        assert!(!query.has_filters());
    }
}

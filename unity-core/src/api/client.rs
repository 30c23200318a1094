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

//! Hosted backend client
//!
//! Wraps the auth service (`/auth/v1`) and the REST table endpoint
//! (`/rest/v1`). Table-specific calls live in the sibling modules as
//! further `impl BackendClient` blocks.

use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BackendSettings;
use crate::error::{UnityError, UnityResult};
use crate::log_api_call;

use super::query::Query;

/// User agent sent with every request
const USER_AGENT: &str = concat!("unity-core/", env!("CARGO_PKG_VERSION"));

/// Error body returned by the REST and auth endpoints
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiErrorBody {
    fn into_error(self, status: u16) -> UnityError {
        let code = self.error_code.or_else(|| {
            self.code.map(|c| match c {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
        });
        let message = self
            .message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| format!("request failed with status {}", status));

        UnityError::Api {
            status,
            code,
            message,
        }
    }
}

/// Client for the hosted backend
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    upload_api_url: String,
    access_token: Option<String>,
}

impl BackendClient {
    /// Create an anonymous client
    pub fn new(settings: &BackendSettings) -> UnityResult<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            base_url: normalize_url(&settings.url),
            anon_key: settings.anon_key.clone(),
            upload_api_url: normalize_url(&settings.upload_api_url),
            access_token: None,
        })
    }

    /// Copy of this client acting as the given user
    pub fn with_token(&self, access_token: &str) -> Self {
        Self {
            access_token: Some(access_token.to_string()),
            ..self.clone()
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn upload_api_url(&self, path: &str) -> String {
        format!("{}{}", self.upload_api_url, path)
    }

    pub(crate) fn auth_url(&self, path: &str) -> UnityResult<Url> {
        parse_url(&format!("{}/auth/v1/{}", self.base_url, path))
    }

    fn rest_url(&self, table: &str, query: &Query) -> UnityResult<Url> {
        let mut url = parse_url(&format!("{}/rest/v1/{}", self.base_url, table))?;
        query.apply(&mut url);
        Ok(url)
    }

    /// Request carrying the API key and bearer token
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, format!("Bearer {}", bearer))
    }

    /// Send a request and turn non-success statuses into errors
    pub(crate) async fn send(&self, label: &str, request: RequestBuilder) -> UnityResult<Response> {
        let started = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        log_api_call!(label, response.url().path(), status.as_u16(), started.elapsed().as_millis() as u64);

        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let error = body.into_error(status.as_u16());
        debug!("{} failed: {}", label, error);
        Err(error)
    }

    /// Rows of a table
    pub async fn select<T: DeserializeOwned>(&self, table: &str, query: &Query) -> UnityResult<Vec<T>> {
        let url = self.rest_url(table, query)?;
        let response = self
            .send(&format!("GET {}", table), self.request(Method::GET, url))
            .await?;
        Ok(response.json().await?)
    }

    /// First matching row, if any
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> UnityResult<Option<T>> {
        let rows = self.select(table, &query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Exact number of matching rows
    pub async fn count(&self, table: &str, query: &Query) -> UnityResult<u64> {
        let url = self.rest_url(table, query)?;
        let request = self
            .request(Method::HEAD, url)
            .header("Prefer", "count=exact");
        let response = self.send(&format!("HEAD {}", table), request).await?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .unwrap_or(0);
        Ok(total)
    }

    /// Insert rows and return them
    pub async fn insert<B, T>(&self, table: &str, body: &B, query: &Query) -> UnityResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.rest_url(table, query)?;
        let request = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.send(&format!("POST {}", table), request).await?;
        Ok(response.json().await?)
    }

    /// Insert a single row and return it
    pub async fn insert_one<B, T>(&self, table: &str, body: &B, query: &Query) -> UnityResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.insert::<B, T>(table, body, query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| UnityError::NotFound(format!("inserted {} row", table)))
    }

    /// Insert rows without reading them back
    pub async fn insert_minimal<B: Serialize + ?Sized>(&self, table: &str, body: &B) -> UnityResult<()> {
        let url = self.rest_url(table, &Query::new())?;
        let request = self
            .request(Method::POST, url)
            .header("Prefer", "return=minimal")
            .json(body);
        self.send(&format!("POST {}", table), request).await?;
        Ok(())
    }

    /// Insert or merge on the given conflict columns
    pub async fn upsert<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
        on_conflict: &str,
    ) -> UnityResult<()> {
        let url = self.rest_url(table, &Query::new().on_conflict(on_conflict))?;
        let request = self
            .request(Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(body);
        self.send(&format!("UPSERT {}", table), request).await?;
        Ok(())
    }

    /// Update matching rows and return them
    pub async fn update<B, T>(&self, table: &str, query: &Query, body: &B) -> UnityResult<Vec<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if !query.has_filters() {
            return Err(UnityError::validation("refusing to update without a filter"));
        }
        let url = self.rest_url(table, query)?;
        let request = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.send(&format!("PATCH {}", table), request).await?;
        Ok(response.json().await?)
    }

    /// Update matching rows, ignoring the result
    pub async fn update_minimal<B: Serialize + ?Sized>(
        &self,
        table: &str,
        query: &Query,
        body: &B,
    ) -> UnityResult<()> {
        let _: Vec<serde_json::Value> = self.update(table, query, body).await?;
        Ok(())
    }

    /// Delete matching rows
    pub async fn delete(&self, table: &str, query: &Query) -> UnityResult<()> {
        if !query.has_filters() {
            return Err(UnityError::validation("refusing to delete without a filter"));
        }
        let url = self.rest_url(table, query)?;
        self.send(&format!("DELETE {}", table), self.request(Method::DELETE, url))
            .await?;
        Ok(())
    }

    /// JSON request to the auth service
    pub(crate) async fn auth_json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> UnityResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.auth_url(path)?;
        let mut request = self.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self
            .send(&format!("{} auth/{}", method, path), request)
            .await?;
        Ok(response.json().await?)
    }

    /// Headers for a raw upload to a pre-signed URL
    pub(crate) fn upload_headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        headers
    }
}

/// Total from a `Content-Range` header such as `0-9/42` or `*/0`
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

fn parse_url(url: &str) -> UnityResult<Url> {
    Url::parse(url).map_err(|e| UnityError::validation(format!("invalid URL {}: {}", url, e)))
}

/// Normalize a base URL
fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let url = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };

    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn settings(server: &MockServer) -> BackendSettings {
        BackendSettings {
            url: server.uri(),
            anon_key: "anon-key".to_string(),
            upload_api_url: server.uri(),
        }
    }

    pub(crate) fn client(server: &MockServer) -> BackendClient {
        BackendClient::new(&settings(server)).unwrap().with_token("user-token")
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range_total("0-9/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("*/*"), None);
    }

    #[test]
    fn base_urls_normalized() {
        assert_eq!(normalize_url("db.example.org/"), "https://db.example.org");
        assert_eq!(normalize_url(" http://localhost:54321 "), "http://localhost:54321");
    }

    #[tokio::test]
    async fn select_sends_keys_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", "eq.u1"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "u1", "full_name": "Asha"}
            ])))
            .mount(&server)
            .await;

        let rows: Vec<serde_json::Value> = client(&server)
            .select("profiles", &Query::new().eq("id", "u1"))
            .await
            .unwrap();
        assert_eq!(rows[0]["full_name"], "Asha");
    }

    #[tokio::test]
    async fn count_reads_content_range() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/rest/v1/posts"))
            .and(header("prefer", "count=exact"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-range", "0-0/17"))
            .mount(&server)
            .await;

        let total = client(&server).count("posts", &Query::new()).await.unwrap();
        assert_eq!(total, 17);
    }

    #[tokio::test]
    async fn backend_errors_keep_code_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/poll_votes"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .insert_minimal("poll_votes", &serde_json::json!({"poll_option_id": "o1"}))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("duplicate key"));
    }

    #[tokio::test]
    async fn unfiltered_delete_refused() {
        let server = MockServer::start().await;
        let err = client(&server).delete("posts", &Query::new()).await.unwrap_err();
        assert!(matches!(err, UnityError::Validation(_)));
    }
}

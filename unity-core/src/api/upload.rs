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

//! Media upload through the companion API
//!
//! The companion API hands out a pre-signed URL, the file bytes are PUT
//! there, and the returned public URL is what gets stored on rows.

use std::path::Path;
use std::time::Instant;

use reqwest::Method;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{UnityError, UnityResult};
use crate::log_api_call;
use crate::models::{
    content_type_for, MediaKind, UploadTarget, UploadUrlRequest, UploadUrlResponse, UploadedMedia,
    MAX_AVATAR_BYTES, MAX_POST_MEDIA_BYTES,
};

use super::client::BackendClient;

/// Check an upload against the rules of its target
pub fn validate_upload(target: UploadTarget, content_type: &str, size: u64) -> UnityResult<MediaKind> {
    let kind = MediaKind::from_content_type(content_type);

    match target {
        UploadTarget::Avatar => {
            if kind != MediaKind::Image {
                return Err(UnityError::validation("Please upload an image file"));
            }
            if size > MAX_AVATAR_BYTES {
                return Err(UnityError::validation("Please upload an image smaller than 5MB"));
            }
        }
        UploadTarget::Post => {
            if kind == MediaKind::Unknown {
                return Err(UnityError::validation("Only images and videos can be attached"));
            }
            if size > MAX_POST_MEDIA_BYTES {
                return Err(UnityError::validation("Files must be smaller than 100MB"));
            }
        }
    }

    Ok(kind)
}

fn upload_endpoint(target: UploadTarget) -> &'static str {
    match target {
        UploadTarget::Post => "/api/get-upload-url",
        UploadTarget::Avatar => "/api/get-avatar-upload-url",
    }
}

impl BackendClient {
    /// Ask the companion API for a pre-signed upload URL
    pub async fn request_upload_url(
        &self,
        target: UploadTarget,
        request: &UploadUrlRequest,
    ) -> UnityResult<UploadUrlResponse> {
        let url = self.upload_api_url(upload_endpoint(target));
        let response = self
            .send(
                "POST upload-url",
                self.http().request(Method::POST, &url).json(request),
            )
            .await?;
        Ok(response.json().await?)
    }

    /// PUT raw bytes to a pre-signed URL
    pub async fn put_object(&self, upload_url: &str, bytes: Vec<u8>, content_type: &str) -> UnityResult<()> {
        let request = self
            .http()
            .request(Method::PUT, upload_url)
            .headers(Self::upload_headers(content_type))
            .body(bytes);
        self.send("PUT object", request).await?;
        Ok(())
    }

    /// Ask the companion API to remove a stored file
    pub async fn delete_media(&self, media_url: &str) -> UnityResult<()> {
        let url = self.upload_api_url("/delete-media");
        let request = self
            .http()
            .request(Method::POST, &url)
            .json(&json!({ "url": media_url }));
        self.send("POST delete-media", request).await?;
        Ok(())
    }

    /// Remove every file of a post; failures are logged only
    pub async fn delete_media_best_effort(&self, media_urls: &[String]) {
        for url in media_urls {
            if let Err(e) = self.delete_media(url).await {
                warn!("Failed to delete media {}: {}", url, e);
            }
        }
    }

    /// Validate, sign and upload a local file
    pub async fn upload_file(
        &self,
        user_id: &str,
        file_path: &Path,
        target: UploadTarget,
    ) -> UnityResult<UploadedMedia> {
        let started = Instant::now();
        let metadata = tokio::fs::metadata(file_path).await.map_err(|_| {
            UnityError::NotFound(format!("file {}", file_path.display()))
        })?;

        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UnityError::validation("file name is not valid UTF-8"))?
            .to_string();
        let content_type = content_type_for(&file_name);
        let size = metadata.len();
        let kind = validate_upload(target, content_type, size)?;

        let signed = self
            .request_upload_url(
                target,
                &UploadUrlRequest {
                    user_id: user_id.to_string(),
                    file_type: kind.as_str().to_string(),
                    file_name: file_name.clone(),
                    content_type: content_type.to_string(),
                },
            )
            .await?;

        let bytes = tokio::fs::read(file_path).await?;
        self.put_object(&signed.upload_url, bytes, content_type).await?;

        log_api_call!("UPLOAD", file_name.as_str(), 200u16, started.elapsed().as_millis() as u64);
        info!("Uploaded {} ({} bytes)", file_name, size);

        Ok(UploadedMedia {
            public_url: signed.public_url,
            kind,
            content_type: content_type.to_string(),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::client;
    use std::io::Write;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn avatar_rules() {
        assert_eq!(validate_upload(UploadTarget::Avatar, "image/png", 1024).unwrap(), MediaKind::Image);
        assert!(validate_upload(UploadTarget::Avatar, "video/mp4", 1024).is_err());
        assert!(validate_upload(UploadTarget::Avatar, "image/png", MAX_AVATAR_BYTES + 1).is_err());
    }

    #[test]
    fn post_media_rules() {
        assert_eq!(validate_upload(UploadTarget::Post, "video/mp4", MAX_POST_MEDIA_BYTES).unwrap(), MediaKind::Video);
        assert!(validate_upload(UploadTarget::Post, "application/pdf", 10).is_err());
        assert!(validate_upload(UploadTarget::Post, "image/jpeg", MAX_POST_MEDIA_BYTES + 1).is_err());
    }

    #[tokio::test]
    async fn upload_signs_then_puts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/get-avatar-upload-url"))
            .and(body_partial_json(serde_json::json!({
                "user_id": "u1",
                "file_type": "image",
                "content_type": "image/png"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "upload_url": format!("{}/bucket/avatar.png", server.uri()),
                "public_url": "https://cdn.example/avatar.png"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/bucket/avatar.png"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("avatar.png");
        std::fs::File::create(&file_path).unwrap().write_all(b"png-bytes").unwrap();

        let uploaded = client(&server)
            .upload_file("u1", &file_path, UploadTarget::Avatar)
            .await
            .unwrap();
        assert_eq!(uploaded.public_url, "https://cdn.example/avatar.png");
        assert_eq!(uploaded.size, 9);
    }

    #[tokio::test]
    async fn failed_media_delete_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/delete-media"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        client(&server)
            .delete_media_best_effort(&["a".to_string(), "b".to_string()])
            .await;
    }
}

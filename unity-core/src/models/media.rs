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

//! Media upload models

use serde::{Deserialize, Serialize};

/// Largest avatar accepted (5 MiB)
pub const MAX_AVATAR_BYTES: u64 = 5 * 1024 * 1024;
/// Largest post attachment accepted (100 MiB)
pub const MAX_POST_MEDIA_BYTES: u64 = 100 * 1024 * 1024;

/// Broad kind of a media file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

impl MediaKind {
    /// Classify a MIME type
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            MediaKind::Image
        } else if content_type.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Unknown => "unknown",
        }
    }
}

/// Where an upload is headed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadTarget {
    Post,
    Avatar,
}

/// Request to upload a local file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaUploadRequest {
    /// Path to the file to upload
    pub file_path: String,
    #[serde(default = "default_target")]
    pub target: UploadTarget,
}

fn default_target() -> UploadTarget {
    UploadTarget::Post
}

/// Body sent to the companion API for a pre-signed URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadUrlRequest {
    pub user_id: String,
    pub file_type: String,
    pub file_name: String,
    pub content_type: String,
}

/// Pre-signed URL pair returned by the companion API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub public_url: String,
}

/// A finished upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedMedia {
    pub public_url: String,
    pub kind: MediaKind,
    pub content_type: String,
    pub size: u64,
}

/// Content type for a file name, by extension
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "ogg" | "ogv" => "video/ogg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("me.JPG"), "image/jpeg");
        assert_eq!(content_type_for("clip.mov"), "video/quicktime");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
        assert_eq!(MediaKind::from_content_type("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_content_type("application/pdf"), MediaKind::Unknown);
    }
}

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

//! Layered settings for the core
//!
//! Built-in defaults are overridden by an optional `unity.toml` and then by
//! `UNITY__SECTION__KEY` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

/// Name of the optional settings file
pub const SETTINGS_FILE: &str = "unity.toml";

/// Hosted backend and companion API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    pub url: String,
    pub anon_key: String,
    pub upload_api_url: String,
}

/// Geocoding and places API
#[derive(Debug, Clone, Deserialize)]
pub struct MapsSettings {
    pub api_key: String,
    pub base_url: String,
    pub region: String,
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeSettings {
    pub enabled: bool,
    pub heartbeat_secs: u64,
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpcSettings {
    /// Unix socket path; defaults to the system temp directory
    #[serde(default)]
    pub socket_path: Option<String>,
    pub pipe_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    /// Data directory; defaults to the platform local data directory
    #[serde(default)]
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub console: bool,
    pub file: bool,
}

/// All settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub backend: BackendSettings,
    pub maps: MapsSettings,
    pub feed: FeedSettings,
    pub realtime: RealtimeSettings,
    pub ipc: IpcSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from the working directory, the data directory and the environment
    pub fn load() -> Result<Self> {
        let local = PathBuf::from(SETTINGS_FILE);
        let in_data_dir = default_data_dir().join(SETTINGS_FILE);
        Self::load_from(&[local.as_path(), in_data_dir.as_path()])
    }

    /// Load settings, layering the given files in order
    pub fn load_from(files: &[&Path]) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("backend.url", "http://localhost:54321")?
            .set_default("backend.anon_key", "")?
            .set_default("backend.upload_api_url", "http://localhost:3000")?
            .set_default("maps.api_key", "")?
            .set_default("maps.base_url", "https://maps.googleapis.com/maps/api")?
            .set_default("maps.region", "in")?
            .set_default("maps.language", "en")?
            .set_default("feed.page_size", 10)?
            .set_default("realtime.enabled", true)?
            .set_default("realtime.heartbeat_secs", 30)?
            .set_default("realtime.reconnect_delay_secs", 5)?
            .set_default("ipc.pipe_name", "HinduUnityCore")?
            .set_default("logging.level", "info")?
            .set_default("logging.console", true)?
            .set_default("logging.file", true)?;

        for file in files {
            builder = builder.add_source(
                File::from(*file)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let config = builder
            .add_source(Environment::with_prefix("UNITY").separator("__"))
            .build()
            .context("Failed to build settings")?;

        let settings: Settings = config
            .try_deserialize()
            .context("Failed to read settings")?;

        if settings.feed.page_size == 0 {
            anyhow::bail!("feed.page_size must be at least 1");
        }

        Ok(settings)
    }

    /// Directory holding the cache database and logs
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir().join("cache.db")
    }

    /// Unix socket the IPC server listens on
    pub fn socket_path(&self) -> PathBuf {
        self.ipc
            .socket_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("hindu-unity-core.sock"))
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("HinduUnity")
}

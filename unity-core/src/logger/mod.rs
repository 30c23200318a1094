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

//! Logging system for the core
//!
//! Console output on stderr plus daily-rotated JSON files in the data
//! directory. `RUST_LOG` takes precedence over the configured level.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::Settings;

/// Logger configuration
pub struct LoggerConfig {
    /// Log directory path
    pub log_dir: PathBuf,
    /// Log file prefix
    pub file_prefix: String,
    /// Maximum log level
    pub level: Level,
    /// Whether to log to console
    pub console_output: bool,
    /// Whether to log to file
    pub file_output: bool,
    /// Log rotation strategy
    pub rotation: Rotation,
}

impl LoggerConfig {
    /// Logger configuration from the `logging` settings section
    pub fn from_settings(settings: &Settings) -> Self {
        let level = Level::from_str(&settings.logging.level).unwrap_or(Level::INFO);

        Self {
            log_dir: settings.log_dir(),
            file_prefix: "unity-core".to_string(),
            level,
            console_output: settings.logging.console,
            file_output: settings.logging.file,
            rotation: Rotation::DAILY,
        }
    }

    fn filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let level = self.level.to_string().to_lowercase();
        Ok(EnvFilter::new(format!("unity_core={}", level))
            .add_directive(format!("api={}", level).parse()?)
            .add_directive(format!("ipc={}", level).parse()?)
            .add_directive(format!("realtime={}", level).parse()?))
    }
}

/// Main logger struct
pub struct Logger;

impl Logger {
    /// Initialize the logging system
    pub fn init_with_config(config: LoggerConfig) -> Result<()> {
        if config.file_output {
            std::fs::create_dir_all(&config.log_dir).with_context(|| {
                format!("Failed to create log directory {}", config.log_dir.display())
            })?;
        }

        let subscriber = tracing_subscriber::registry().with(config.filter()?);

        let file_layer = config.file_output.then(|| {
            let file_appender =
                RollingFileAppender::new(config.rotation.clone(), &config.log_dir, &config.file_prefix);

            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .json()
        });

        let console_layer = config.console_output.then(|| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_span_events(FmtSpan::CLOSE)
        });

        subscriber
            .with(file_layer)
            .with(console_layer)
            .try_init()
            .context("Failed to install the log subscriber")?;

        Ok(())
    }
}

/// Macro for logging backend calls with timing
#[macro_export]
macro_rules! log_api_call {
    ($method:expr, $url:expr) => {
        tracing::debug!(
            target: "api",
            method = $method,
            url = $url,
            "API call started"
        )
    };
    ($method:expr, $url:expr, $status:expr, $duration:expr) => {
        tracing::info!(
            target: "api",
            method = $method,
            url = $url,
            status = $status,
            duration_ms = $duration,
            "API call completed"
        )
    };
}

/// Macro for logging IPC messages
#[macro_export]
macro_rules! log_ipc {
    (request, $method:expr, $id:expr) => {
        tracing::debug!(
            target: "ipc",
            direction = "request",
            method = $method,
            id = $id,
            "IPC request received"
        )
    };
    (response, $method:expr, $id:expr, $success:expr) => {
        tracing::debug!(
            target: "ipc",
            direction = "response",
            method = $method,
            id = $id,
            success = $success,
            "IPC response sent"
        )
    };
    (event, $event:expr) => {
        tracing::debug!(
            target: "ipc",
            direction = "event",
            event = $event,
            "IPC event sent"
        )
    };
}

/// Macro for logging realtime channel events
#[macro_export]
macro_rules! log_realtime {
    (connected, $topic:expr) => {
        tracing::info!(
            target: "realtime",
            event = "connected",
            topic = $topic,
            "Realtime channel joined"
        )
    };
    (disconnected, $topic:expr, $reason:expr) => {
        tracing::warn!(
            target: "realtime",
            event = "disconnected",
            topic = $topic,
            reason = $reason,
            "Realtime channel disconnected"
        )
    };
    (change, $topic:expr, $table:expr, $change_type:expr) => {
        tracing::trace!(
            target: "realtime",
            event = "change",
            topic = $topic,
            table = $table,
            change_type = $change_type,
            "Realtime change received"
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_follows_settings() {
        let mut settings = Settings::load_from(&[]).unwrap();
        settings.logging.level = "warn".into();
        settings.logging.console = false;
        settings.storage.data_dir = Some("/tmp/unity-logs".into());

        let config = LoggerConfig::from_settings(&settings);
        assert_eq!(config.level, Level::WARN);
        assert!(!config.console_output);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/unity-logs/logs"));
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let mut settings = Settings::load_from(&[]).unwrap();
        settings.logging.level = "chatty".into();
        assert_eq!(LoggerConfig::from_settings(&settings).level, Level::INFO);
    }
}

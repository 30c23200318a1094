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

//! Hindu Unity Core - Rust backend for the Hindu Unity client
//!
//! This binary runs as a background process next to the UI shell and talks
//! to it over a local socket using a JSON-based IPC protocol.

mod access;
mod api;
mod cache;
mod config;
mod error;
mod feed;
mod ipc;
mod logger;
mod models;
mod realtime;

use std::sync::Arc;

use anyhow::{Context, Result};
use logger::{Logger, LoggerConfig};
use tracing::{error, info, warn};

/// Days a cached feed snapshot is kept
const FEED_CACHE_DAYS: u32 = 7;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = config::Settings::load()?;

    Logger::init_with_config(LoggerConfig::from_settings(&settings))?;

    info!("Hindu Unity Core starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let cache = cache::CacheManager::open(&settings.cache_path())
        .await
        .context("Failed to open the local cache")?;
    if let Err(e) = cache.cleanup(FEED_CACHE_DAYS).await {
        warn!("Cache cleanup failed: {:#}", e);
    }

    let server = Arc::new(ipc::IpcServer::new(settings, Arc::new(cache))?);

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            signal_server.shutdown();
        }
    });

    match server.run().await {
        Ok(()) => {
            info!("Hindu Unity Core shutting down gracefully");
        }
        Err(e) => {
            error!("Fatal error in IPC server: {:#}", e);
            return Err(e);
        }
    }

    Ok(())
}

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

//! IPC server: accepts UI connections and serves requests line by line

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::cache::CacheManager;
use crate::config::Settings;
use crate::models::{error_codes, IpcError, IpcMessage};

use super::handler::MessageHandler;

/// IPC server that listens for connections from the UI shell
pub struct IpcServer {
    settings: Settings,
    handler: Arc<MessageHandler>,
    shutdown_tx: broadcast::Sender<()>,
}

impl IpcServer {
    /// Create a new IPC server
    pub fn new(settings: Settings, cache: Arc<CacheManager>) -> Result<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        let handler = MessageHandler::new(settings.clone(), cache, shutdown_tx.clone())
            .context("Failed to create message handler")?;

        Ok(Self {
            settings,
            handler: Arc::new(handler),
            shutdown_tx,
        })
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Serve until a shutdown is requested
    pub async fn run(&self) -> Result<()> {
        let realtime = tokio::spawn(self.handler.clone().run_realtime());

        #[cfg(windows)]
        let result = {
            let pipe_name = format!(r"\\.\pipe\{}", self.settings.ipc.pipe_name);
            run_windows_pipe_server(&pipe_name, self.handler.clone(), self.shutdown_signal()).await
        };

        #[cfg(not(windows))]
        let result = {
            let socket_path = self.settings.socket_path();
            run_unix_socket_server(&socket_path, self.handler.clone(), self.shutdown_signal()).await
        };

        realtime.abort();
        result
    }
}

#[cfg(windows)]
async fn run_windows_pipe_server(
    pipe_name: &str,
    handler: Arc<MessageHandler>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    use tokio::net::windows::named_pipe::{PipeMode, ServerOptions};

    info!("Starting IPC server on {}", pipe_name);
    let mut first = true;

    loop {
        let pipe = ServerOptions::new()
            .first_pipe_instance(first)
            .pipe_mode(PipeMode::Byte)
            .create(pipe_name)
            .context("Failed to create named pipe")?;
        first = false;

        info!("Waiting for client connection...");

        tokio::select! {
            result = pipe.connect() => {
                match result {
                    Ok(()) => {
                        info!("Client connected");
                        let handler_clone = handler.clone();
                        tokio::spawn(async move {
                            let (reader, writer) = tokio::io::split(pipe);
                            if let Err(e) = serve_client(reader, writer, handler_clone).await {
                                error!("Client handler error: {:#}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(not(windows))]
async fn run_unix_socket_server(
    socket_path: &std::path::Path,
    handler: Arc<MessageHandler>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    use tokio::net::UnixListener;

    // stale socket from a previous run
    let _ = std::fs::remove_file(socket_path);

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind Unix socket {}", socket_path.display()))?;

    info!("Listening on {}", socket_path.display());

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        info!("Client connected");
                        let handler_clone = handler.clone();
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            if let Err(e) = serve_client(reader, writer, handler_clone).await {
                                error!("Client handler error: {:#}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);

    Ok(())
}

async fn write_message<W>(writer: &Mutex<W>, message: &IpcMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(message)?;
    let mut w = writer.lock().await;
    w.write_all(json.as_bytes()).await?;
    w.write_all(b"\n").await?;
    w.flush().await?;

    debug!("Sent message: {}", json);
    Ok(())
}

/// Serve one connection: requests in order, events pushed as they happen
async fn serve_client<R, W>(reader: R, writer: W, handler: Arc<MessageHandler>) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let writer = Arc::new(Mutex::new(writer));

    let mut events = handler.subscribe_events();
    let event_writer = writer.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = write_message(&event_writer, &event).await {
                        debug!("Stopped forwarding events: {:#}", e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Client lagged, dropped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut line = String::new();
    let result = loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("Client disconnected");
                break Ok(());
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                debug!("Received message: {}", trimmed);

                let response = match serde_json::from_str::<IpcMessage>(trimmed) {
                    Ok(msg) => handler.handle_message(msg).await,
                    Err(e) => {
                        warn!("Failed to parse message: {}", e);
                        IpcMessage::response_err(
                            "unknown",
                            IpcError::new(
                                error_codes::PARSE_ERROR,
                                format!("Failed to parse message: {}", e),
                            ),
                        )
                    }
                };

                if let Err(e) = write_message(&writer, &response).await {
                    break Err(e);
                }
            }
            Err(e) => {
                error!("Read error: {}", e);
                break Ok(());
            }
        }
    };

    forwarder.abort();
    result
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::io::AsyncBufReadExt;

    #[tokio::test]
    async fn serves_requests_over_a_socket() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::load_from(&[]).unwrap();
        settings.realtime.enabled = false;
        settings.storage.data_dir = Some(dir.path().display().to_string());
        settings.ipc.socket_path = Some(dir.path().join("core.sock").display().to_string());

        let cache = Arc::new(CacheManager::open(&settings.cache_path()).await.unwrap());
        let server = Arc::new(IpcServer::new(settings.clone(), cache).unwrap());
        let running = {
            let server = server.clone();
            tokio::spawn(async move { server.run().await })
        };

        let socket_path = settings.socket_path();
        let stream = loop {
            match tokio::net::UnixStream::connect(&socket_path).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(20)).await,
            }
        };
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(b"{\"id\":\"1\",\"type\":\"request\",\"method\":\"ping\"}\nnot json\n")
            .await
            .unwrap();

        let pong: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(pong["id"], "1");
        assert_eq!(pong["result"]["pong"], true);

        let bad: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(bad["error"]["code"], error_codes::PARSE_ERROR);

        server.shutdown();
        running.await.unwrap().unwrap();
        assert!(!socket_path.exists());
    }
}

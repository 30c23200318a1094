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

//! Realtime module for table change notifications via WebSocket
//!
//! Speaks the Phoenix channel protocol of the hosted realtime service:
//! one `phx_join` per subscription, a heartbeat on the `phoenix` topic, and
//! `postgres_changes` messages carrying the changed rows.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::RealtimeSettings;
use crate::log_realtime;

/// Protocol version sent when connecting
const PROTOCOL_VSN: &str = "1.0.0";

/// Kind of row change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Insert => "INSERT",
            ChangeType::Update => "UPDATE",
            ChangeType::Delete => "DELETE",
        }
    }
}

/// A changed row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableChange {
    pub table: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
}

/// A channel subscription on one table
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub topic: String,
    pub table: String,
    /// Row filter such as `post_id=eq.<id>`
    pub filter: Option<String>,
}

impl Subscription {
    pub fn table(channel: &str, table: &str) -> Self {
        Self {
            topic: format!("realtime:{}", channel),
            table: table.to_string(),
            filter: None,
        }
    }

    /// Every change on `posts`
    pub fn posts() -> Self {
        Self::table("posts-changes", "posts")
    }

    /// Every change on `events`
    pub fn events() -> Self {
        Self::table("events-changes", "events")
    }

    /// Comment changes of a single post
    pub fn comments_of(post_id: &str) -> Self {
        Self {
            topic: format!("realtime:comments-{}", post_id),
            table: "comments".to_string(),
            filter: Some(format!("post_id=eq.{}", post_id)),
        }
    }
}

/// Something that happened on the realtime connection
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    Connected(String),
    Disconnected(String, String),
    Change(String, TableChange),
}

/// A decoded server message
#[derive(Debug, Clone)]
pub enum ServerMessage {
    Change { topic: String, change: TableChange },
    Reply { topic: String, ok: bool },
    ChannelError { topic: String, message: String },
    Other,
}

#[derive(Deserialize)]
struct RawMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
}

/// WebSocket endpoint for a backend base URL
pub fn websocket_url(base_url: &str, anon_key: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };

    format!(
        "{}/realtime/v1/websocket?apikey={}&vsn={}",
        ws_base,
        urlencoding::encode(anon_key),
        PROTOCOL_VSN
    )
}

/// Join message for a subscription
pub fn join_message(subscription: &Subscription, access_token: &str, msg_ref: u64) -> String {
    let mut change = json!({
        "event": "*",
        "schema": "public",
        "table": subscription.table,
    });
    if let Some(filter) = &subscription.filter {
        change["filter"] = json!(filter);
    }

    json!({
        "topic": subscription.topic,
        "event": "phx_join",
        "payload": {
            "config": { "postgres_changes": [change] },
            "access_token": access_token,
        },
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

pub fn heartbeat_message(msg_ref: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

/// Decode a text frame
pub fn parse_message(text: &str) -> ServerMessage {
    let Ok(raw) = serde_json::from_str::<RawMessage>(text) else {
        return ServerMessage::Other;
    };

    match raw.event.as_str() {
        "postgres_changes" => {
            let data = raw.payload.get("data").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<TableChange>(data) {
                Ok(change) => ServerMessage::Change {
                    topic: raw.topic,
                    change,
                },
                Err(_) => ServerMessage::Other,
            }
        }
        "phx_reply" => ServerMessage::Reply {
            ok: raw.payload.get("status").and_then(Value::as_str) == Some("ok"),
            topic: raw.topic,
        },
        "phx_error" | "phx_close" => ServerMessage::ChannelError {
            message: raw.event,
            topic: raw.topic,
        },
        "system" if raw.payload.get("status").and_then(Value::as_str) == Some("error") => {
            ServerMessage::ChannelError {
                message: raw
                    .payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("channel error")
                    .to_string(),
                topic: raw.topic,
            }
        }
        _ => ServerMessage::Other,
    }
}

/// Realtime connection manager
pub struct RealtimeManager {
    ws_url: String,
    access_token: String,
    heartbeat: Duration,
    reconnect_delay: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl RealtimeManager {
    pub fn new(base_url: &str, anon_key: &str, access_token: &str, settings: &RealtimeSettings) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            ws_url: websocket_url(base_url, anon_key),
            access_token: access_token.to_string(),
            heartbeat: Duration::from_secs(settings.heartbeat_secs.max(1)),
            reconnect_delay: Duration::from_secs(settings.reconnect_delay_secs),
            shutdown_tx,
        }
    }

    /// Token sent when joining channels
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Keep the subscriptions joined until stopped, reconnecting after failures
    pub fn subscribe(
        &self,
        subscriptions: Vec<Subscription>,
        event_tx: mpsc::Sender<RealtimeEvent>,
    ) -> JoinHandle<()> {
        let url = self.ws_url.clone();
        let token = self.access_token.clone();
        let heartbeat = self.heartbeat;
        let reconnect_delay = self.reconnect_delay;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let label = subscriptions
                .iter()
                .map(|s| s.topic.as_str())
                .collect::<Vec<_>>()
                .join(",");

            loop {
                let result = tokio::select! {
                    result = run_connection(&url, &token, &subscriptions, heartbeat, &event_tx) => result,
                    _ = shutdown_rx.recv() => {
                        info!("Shutdown signal received, leaving {}", label);
                        return;
                    }
                };

                let reason = match result {
                    Ok(()) => "closed by server".to_string(),
                    Err(e) => format!("{:#}", e),
                };
                log_realtime!(disconnected, label.as_str(), reason.as_str());
                if event_tx
                    .send(RealtimeEvent::Disconnected(label.clone(), reason))
                    .await
                    .is_err()
                {
                    return;
                }

                tokio::select! {
                    _ = tokio::time::sleep(reconnect_delay) => {}
                    _ = shutdown_rx.recv() => return,
                }
            }
        })
    }

    /// Stop every subscription started by this manager
    pub fn stop_all(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// One connection lifetime: join, then relay changes until the socket ends
async fn run_connection(
    url: &str,
    access_token: &str,
    subscriptions: &[Subscription],
    heartbeat: Duration,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) -> Result<()> {
    let (socket, _) = tokio_tungstenite::connect_async(url)
        .await
        .context("Failed to connect to realtime service")?;
    let (mut write, mut read) = socket.split();

    let mut msg_ref = 0u64;
    for subscription in subscriptions {
        msg_ref += 1;
        write
            .send(Message::text(join_message(subscription, access_token, msg_ref)))
            .await
            .context("Failed to join channel")?;
    }

    let mut ticker = tokio::time::interval(heartbeat);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                msg_ref += 1;
                write
                    .send(Message::text(heartbeat_message(msg_ref)))
                    .await
                    .context("Failed to send heartbeat")?;
            }
            frame = read.next() => {
                let Some(frame) = frame else {
                    return Ok(());
                };
                match frame.context("Realtime socket error")? {
                    Message::Text(text) => match parse_message(text.as_str()) {
                        ServerMessage::Change { topic, change } => {
                            log_realtime!(change, topic.as_str(), change.table.as_str(), change.change_type.as_str());
                            if event_tx.send(RealtimeEvent::Change(topic, change)).await.is_err() {
                                return Ok(());
                            }
                        }
                        ServerMessage::Reply { topic, ok: true } => {
                            if subscriptions.iter().any(|s| s.topic == topic) {
                                log_realtime!(connected, topic.as_str());
                                let _ = event_tx.send(RealtimeEvent::Connected(topic)).await;
                            }
                        }
                        ServerMessage::Reply { topic, ok: false } => {
                            warn!("Join rejected for {}", topic);
                        }
                        ServerMessage::ChannelError { topic, message } => {
                            anyhow::bail!("channel {} failed: {}", topic, message);
                        }
                        ServerMessage::Other => {
                            debug!("Unhandled realtime message");
                        }
                    },
                    Message::Close(_) => return Ok(()),
                    _ => {}
                }
            }
        }
    }
}

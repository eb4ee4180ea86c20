// SPDX-License-Identifier: MIT

//! Realtime hub: broadcast channels per group plus a connection health check.
//!
//! Each group has a named channel; posting a message publishes an event that
//! every subscribed websocket receives. A periodic task re-subscribes a probe
//! channel and flips the connected flag on status change; last observed
//! status wins.

use crate::models::Message;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Per-channel buffer; lagged receivers drop events (broadcast semantics).
const CHANNEL_CAPACITY: usize = 256;

/// Name of the internal liveness-probe channel.
const PROBE_CHANNEL: &str = "_health_probe";

/// Event published on a group channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// A message was appended to the group's history.
    MessageCreated { message: Message },
    /// Internal liveness probe; never forwarded to clients.
    Probe,
}

/// Realtime hub shared across all handlers.
pub struct RealtimeHub {
    channels: DashMap<String, broadcast::Sender<ChannelEvent>>,
    connected: AtomicBool,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            connected: AtomicBool::new(true),
        }
    }

    /// Subscribe to a named channel, creating it if needed.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<ChannelEvent> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a named channel.
    ///
    /// Returns the number of receivers the event reached. A channel with no
    /// subscribers is dropped rather than kept around.
    pub fn publish(&self, channel: &str, event: ChannelEvent) -> usize {
        let Some(tx) = self.channels.get(channel).map(|e| e.value().clone()) else {
            return 0;
        };

        match tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                self.channels
                    .remove_if(channel, |_, tx| tx.receiver_count() == 0);
                0
            }
        }
    }

    /// Drop a channel that no longer has receivers.
    ///
    /// Called when a websocket disconnects; without it, channels for groups
    /// nobody publishes to again (deleted groups in particular) would stay in
    /// the map forever.
    pub fn prune(&self, channel: &str) {
        self.channels
            .remove_if(channel, |_, tx| tx.receiver_count() == 0);
    }

    /// Last observed connection status.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// One liveness check: re-subscribe the probe channel and verify an event
    /// makes it through.
    pub async fn probe(&self) -> bool {
        let mut rx = self.subscribe(PROBE_CHANNEL);
        if self.publish(PROBE_CHANNEL, ChannelEvent::Probe) == 0 {
            return false;
        }
        matches!(
            tokio::time::timeout(Duration::from_secs(1), rx.recv()).await,
            Ok(Ok(_))
        )
    }

    /// Spawn the periodic health-check task.
    pub fn spawn_health_check(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so startup is quiet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let alive = hub.probe().await;
                let was = hub.connected.swap(alive, Ordering::Relaxed);
                if was != alive {
                    if alive {
                        tracing::info!("Realtime channel reconnected");
                    } else {
                        tracing::warn!("Realtime channel lost");
                    }
                }
            }
        })
    }
}

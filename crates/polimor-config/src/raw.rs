//! The as-written YAML shape, deserialized directly with serde before
//! [`crate::view::ConfigView::load`] validates it into a read-only view.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub version: String,
    pub messaging_service: RawMessagingService,
    #[serde(default)]
    pub agents: HashMap<String, Vec<RawAgent>>,
}

#[derive(Debug, Deserialize)]
pub struct RawMessagingService {
    pub backend: String,
    pub config: RawMessagingConfig,
}

#[derive(Debug, Deserialize)]
pub struct RawMessagingConfig {
    #[serde(default)]
    pub servers: Vec<ServerEndpoint>,
    #[serde(default)]
    pub queues: HashMap<String, RawQueue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServerEndpoint {
    pub fn as_endpoint_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reserved keys are `stream_name`, `consumer_name`, `subject`; anything
/// else in a queue's property map lands in `extra`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQueue {
    pub stream_name: String,
    pub consumer_name: String,
    pub subject: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

/// Every agent type's schema is a free-form property map with at least an
/// `id`; `queue` is common but not universal (policy agents instead carry
/// `scan_queue`/`purge_queue`/`migration_queue` in `extra`).
#[derive(Debug, Clone, Deserialize)]
pub struct RawAgent {
    pub id: String,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl RawAgent {
    /// Every queue name this agent's property map references: `queue`
    /// itself plus any `extra` key ending in `_queue` whose value is a
    /// string (the policy agent's `scan_queue`/`purge_queue`/`migration_queue`
    /// triple).
    pub fn referenced_queues(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.queue.as_deref().into_iter().collect();
        for (key, value) in &self.extra {
            if key.ends_with("_queue") {
                if let Some(s) = value.as_str() {
                    names.push(s);
                }
            }
        }
        names
    }
}

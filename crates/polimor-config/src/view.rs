//! The validated, read-only configuration accessor agents are handed at
//! startup.

use crate::error::ConfigError;
use crate::raw::{RawAgent, RawConfig, ServerEndpoint};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct QueueProperties {
    pub name: String,
    pub stream_name: String,
    pub consumer_name: String,
    pub subject: String,
    pub extra: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone)]
pub struct AgentProperties {
    pub id: String,
    pub agent_type: String,
    pub queue: Option<String>,
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl AgentProperties {
    /// Reads a string-valued property out of `extra`, e.g. `scan_queue` or
    /// `directory`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }
}

pub struct ConfigView {
    version: String,
    backend: String,
    servers: Vec<ServerEndpoint>,
    queues: HashMap<String, QueueProperties>,
    agents_by_type: HashMap<String, Vec<AgentProperties>>,
    agents_by_id: HashMap<String, AgentProperties>,
}

impl ConfigView {
    /// Reads, parses, and validates a YAML config file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_str(&text)
    }

    /// Parses and validates a YAML document already in memory.
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let queues: HashMap<String, QueueProperties> = raw
            .messaging_service
            .config
            .queues
            .into_iter()
            .map(|(name, q)| {
                (
                    name.clone(),
                    QueueProperties {
                        name,
                        stream_name: q.stream_name,
                        consumer_name: q.consumer_name,
                        subject: q.subject,
                        extra: q.extra,
                    },
                )
            })
            .collect();

        let mut agents_by_type: HashMap<String, Vec<AgentProperties>> = HashMap::new();
        let mut agents_by_id: HashMap<String, AgentProperties> = HashMap::new();

        for (agent_type, raw_agents) in raw.agents {
            for raw_agent in raw_agents {
                Self::validate_agent(&agent_type, &raw_agent, &queues)?;

                if agents_by_id.contains_key(&raw_agent.id) {
                    return Err(ConfigError::DuplicateAgentId(raw_agent.id));
                }

                let props = AgentProperties {
                    id: raw_agent.id.clone(),
                    agent_type: agent_type.clone(),
                    queue: raw_agent.queue.clone(),
                    extra: raw_agent.extra.clone(),
                };
                agents_by_id.insert(raw_agent.id.clone(), props.clone());
                agents_by_type
                    .entry(agent_type.clone())
                    .or_default()
                    .push(props);
            }
        }

        Ok(Self {
            version: raw.version,
            backend: raw.messaging_service.backend,
            servers: raw.messaging_service.config.servers,
            queues,
            agents_by_type,
            agents_by_id,
        })
    }

    fn validate_agent(
        agent_type: &str,
        agent: &RawAgent,
        queues: &HashMap<String, QueueProperties>,
    ) -> Result<(), ConfigError> {
        let _ = agent_type;
        for queue_name in agent.referenced_queues() {
            if !queues.contains_key(queue_name) {
                return Err(ConfigError::UnknownQueue {
                    id: agent.id.clone(),
                    queue: queue_name.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn servers(&self) -> &[ServerEndpoint] {
        &self.servers
    }

    pub fn queue(&self, name: &str) -> Option<&QueueProperties> {
        self.queues.get(name)
    }

    pub fn agents_of_type(&self, kind: &str) -> &[AgentProperties] {
        self.agents_by_type
            .get(kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn agent(&self, id: &str) -> Option<&AgentProperties> {
        self.agents_by_id.get(id)
    }
}

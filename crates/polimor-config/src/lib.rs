//! YAML configuration loading and a read-only, validated [`ConfigView`] over
//! the result.

pub mod error;
pub mod raw;
pub mod view;

pub use error::ConfigError;
pub use raw::ServerEndpoint;
pub use view::{AgentProperties, ConfigView, QueueProperties};

/// CLI flags take precedence over config-file values: `over` wins when set.
pub fn merge_override<T>(base: Option<T>, over: Option<T>) -> Option<T> {
    over.or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: "1.0"
messaging_service:
  backend: nats
  config:
    servers:
      - host: nats1.example.com
        port: 4222
    queues:
      scan:
        stream_name: SCAN
        consumer_name: scan-consumer
        subject: polimor.scan
      purge:
        stream_name: PURGE
        consumer_name: purge-consumer
        subject: polimor.purge
      migrate:
        stream_name: MIGRATE
        consumer_name: migrate-consumer
        subject: polimor.migrate
agents:
  scan_agents:
    - id: scan0
      queue: scan
      directory: /lustre/fs1
      interval: 1h
  policy_agents:
    - id: policy0
      scan_queue: scan
      purge_queue: purge
      migration_queue: migrate
  purge_agents:
    - id: purge0
      queue: purge
"#;

    #[test]
    fn loads_version_and_backend() {
        let view = ConfigView::from_str(SAMPLE).unwrap();
        assert_eq!(view.version(), "1.0");
        assert_eq!(view.backend(), "nats");
    }

    #[test]
    fn resolves_queue_by_name() {
        let view = ConfigView::from_str(SAMPLE).unwrap();
        let queue = view.queue("purge").unwrap();
        assert_eq!(queue.stream_name, "PURGE");
        assert_eq!(queue.consumer_name, "purge-consumer");
        assert_eq!(queue.subject, "polimor.purge");
    }

    #[test]
    fn agent_lookup_is_augmented_with_type() {
        let view = ConfigView::from_str(SAMPLE).unwrap();
        let agent = view.agent("purge0").unwrap();
        assert_eq!(agent.agent_type, "purge_agents");
        assert_eq!(agent.queue.as_deref(), Some("purge"));
    }

    #[test]
    fn policy_agent_exposes_the_three_queue_refs() {
        let view = ConfigView::from_str(SAMPLE).unwrap();
        let agent = view.agent("policy0").unwrap();
        assert_eq!(agent.get("scan_queue"), Some("scan"));
        assert_eq!(agent.get("purge_queue"), Some("purge"));
        assert_eq!(agent.get("migration_queue"), Some("migrate"));
    }

    #[test]
    fn rejects_unknown_queue_reference() {
        let bad = SAMPLE.replace("queue: purge", "queue: nonexistent");
        let err = ConfigView::from_str(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownQueue { .. }));
    }

    #[test]
    fn rejects_duplicate_agent_id() {
        let bad = format!(
            "{SAMPLE}\n  migration_agents:\n    - id: purge0\n      queue: migrate\n"
        );
        let err = ConfigView::from_str(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAgentId(_)));
    }

    #[test]
    fn cli_override_wins_when_present() {
        assert_eq!(merge_override(Some("config"), Some("cli")), Some("cli"));
        assert_eq!(merge_override(Some("config"), None), Some("config"));
        assert_eq!(merge_override::<&str>(None, None), None);
    }
}

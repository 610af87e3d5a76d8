#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("agent '{id}' references unknown queue '{queue}'")]
    UnknownQueue { id: String, queue: String },
    #[error("duplicate agent id '{0}'")]
    DuplicateAgentId(String),
}

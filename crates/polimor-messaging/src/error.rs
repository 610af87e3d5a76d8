#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to messaging backend after exhausting retry schedule: {0}")]
    Connect(String),
    #[error("stream or consumer not found: {0}")]
    NotFound(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

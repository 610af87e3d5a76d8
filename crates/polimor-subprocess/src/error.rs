#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn '{argv0}': {source}")]
    Spawn {
        argv0: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait on child process: {0}")]
    Wait(#[source] std::io::Error),
    #[error("failed to signal child process: {0}")]
    Kill(#[source] std::io::Error),
    #[error("no child process is running")]
    NotRunning,
}

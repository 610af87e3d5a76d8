//! Retry schedules shared by connect, stream/consumer lookup, and publish.

use std::time::Duration;

/// The connect and stream/consumer lookup backoff schedule: 5s, 30s, 60s,
/// 120s, then give up.
pub const LOOKUP_SCHEDULE: &[Duration] = &[
    Duration::from_secs(5),
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(120),
];

/// Runs `attempt` against [`LOOKUP_SCHEDULE`], sleeping between failures and
/// returning the last error once the schedule is exhausted.
pub async fn with_lookup_schedule<T, E, F, Fut>(mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut last_err = None;
    match attempt().await {
        Ok(v) => return Ok(v),
        Err(e) => last_err = Some(e),
    }
    for delay in LOOKUP_SCHEDULE {
        tokio::time::sleep(*delay).await;
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.expect("at least one attempt was made"))
}

/// Broker failure classes the publisher's retry loop reacts to differently.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishFailure {
    /// Broker cannot persist the message right now.
    TransientStore,
    /// The publish/ack wait timed out.
    Timeout,
    /// No broker is reachable to respond.
    NoResponders,
    /// Broker reports the dedup id was already persisted.
    DuplicateAck,
    /// Any other broker/protocol failure; not retried.
    Other(String),
}

//! Durable pub-sub over an interchangeable backend: a transient in-memory
//! [`local`] implementation used by tests, and a production
//! [`nats`] JetStream-style implementation. Callers talk only to the
//! [`Service`], [`Publisher`], and [`Subscriber`] traits in [`service`].

pub mod error;
pub mod local;
pub mod nats;
pub mod retry;
pub mod service;

pub use error::Error;
pub use service::{Backend, Publisher, Service, Subscriber};

/// Constructs and connects a [`Service`] for `backend`. For [`Backend::Nats`],
/// `endpoints` are joined with commas and handed to the client, which
/// exhausts the 5/30/60/120s connect schedule before failing with
/// `Error::Connect`. For [`Backend::Local`], `endpoints` is ignored.
pub async fn open(backend: Backend, endpoints: &[String]) -> Result<Box<dyn Service>, Error> {
    match backend {
        Backend::Local => Ok(Box::new(local::LocalService::new())),
        Backend::Nats => {
            let servers = endpoints.join(",");
            let service = nats::NatsService::open(&servers).await?;
            Ok(Box::new(service))
        }
    }
}

//! The local backend: POSIX-mq-style in-memory queues, single host,
//! transient. Used only by tests and by the agent-loop fixtures in
//! `crates/polimor-agent` — never the production path.

use crate::error::Error;
use crate::service::{Publisher, Service, Subscriber};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Queue names are prefixed with `/`; messages are at most 8 KiB; queue
/// depth is 10 — matching the POSIX message queue semantics this backend
/// stands in for.
pub const MAX_MESSAGE_BYTES: usize = 8 * 1024;
pub const QUEUE_DEPTH: usize = 10;

type Queue = (mpsc::Sender<Vec<u8>>, Arc<Mutex<mpsc::Receiver<Vec<u8>>>>);

#[derive(Clone, Default)]
struct Broker {
    queues: Arc<Mutex<HashMap<String, Queue>>>,
}

impl Broker {
    fn queue(&self, name: &str) -> Queue {
        let mut queues = self.queues.lock().unwrap();
        queues
            .entry(name.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
                (tx, Arc::new(Mutex::new(rx)))
            })
            .clone()
    }
}

/// An in-memory [`Service`]. Each instance owns its own set of queues;
/// publishers/subscribers created from the same instance that name the same
/// `stream` talk to each other.
#[derive(Clone, Default)]
pub struct LocalService {
    broker: Broker,
}

impl LocalService {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_name(stream: &str) -> String {
        format!("/{stream}")
    }
}

#[async_trait]
impl Service for LocalService {
    async fn create_publisher(
        &self,
        stream: &str,
        _consumer: &str,
        _subject: &str,
    ) -> Result<Box<dyn Publisher>, Error> {
        let (tx, _rx) = self.broker.queue(&Self::queue_name(stream));
        Ok(Box::new(LocalPublisher {
            tx,
            client_id: uuid::Uuid::new_v4(),
            counter: AtomicU64::new(0),
        }))
    }

    async fn create_subscriber(
        &self,
        stream: &str,
        _consumer: &str,
        _subject: &str,
    ) -> Result<Box<dyn Subscriber>, Error> {
        let (_tx, rx) = self.broker.queue(&Self::queue_name(stream));
        Ok(Box::new(LocalSubscriber { rx }))
    }
}

pub struct LocalPublisher {
    tx: mpsc::Sender<Vec<u8>>,
    client_id: uuid::Uuid,
    counter: AtomicU64,
}

#[async_trait]
impl Publisher for LocalPublisher {
    async fn send(&mut self, payload: &[u8]) -> Result<String, Error> {
        if payload.len() > MAX_MESSAGE_BYTES {
            return Err(Error::Publish(format!(
                "message of {} bytes exceeds the {} byte local queue limit",
                payload.len(),
                MAX_MESSAGE_BYTES
            )));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let dedup_id = format!("{}-{n}", self.client_id);
        self.tx
            .send(payload.to_vec())
            .await
            .map_err(|_| Error::Publish("local queue closed".into()))?;
        Ok(dedup_id)
    }
}

pub struct LocalSubscriber {
    rx: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
}

#[async_trait]
impl Subscriber for LocalSubscriber {
    async fn receive(&mut self) -> Result<Vec<u8>, Error> {
        loop {
            let mut rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
            match tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv()).await {
                Ok(Some(payload)) => return Ok(payload),
                Ok(None) => return Err(Error::Subscribe("local queue closed".into())),
                Err(_) => {
                    tracing::debug!("local subscriber fetch deadline elapsed, retrying");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_receive_round_trips() {
        let svc = LocalService::new();
        let mut publisher = svc.create_publisher("scan", "c", "s").await.unwrap();
        let mut subscriber = svc.create_subscriber("scan", "c", "s").await.unwrap();

        publisher.send(b"hello").await.unwrap();
        let got = subscriber.receive().await.unwrap();
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn dedup_ids_are_monotonic_per_client() {
        let svc = LocalService::new();
        let mut publisher = svc.create_publisher("scan", "c", "s").await.unwrap();
        let a = publisher.send(b"one").await.unwrap();
        let b = publisher.send(b"two").await.unwrap();
        let c = publisher.send(b"three").await.unwrap();

        let client_id = a.rsplit_once('-').unwrap().0;
        assert_eq!(a, format!("{client_id}-0"));
        assert_eq!(b, format!("{client_id}-1"));
        assert_eq!(c, format!("{client_id}-2"));
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let svc = LocalService::new();
        let mut publisher = svc.create_publisher("scan", "c", "s").await.unwrap();
        let big = vec![0u8; MAX_MESSAGE_BYTES + 1];
        let err = publisher.send(&big).await.unwrap_err();
        assert!(matches!(err, Error::Publish(_)));
    }
}

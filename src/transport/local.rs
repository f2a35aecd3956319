//! In-process transport backed by tokio broadcast channels.
//!
//! Implements the gossip interface for tests and single-process runs; every
//! subscriber sees every message published on a topic.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Mutex};

use super::{DeliveryStatus, PriceMessage, Transport, TransportError};

const CHANNEL_CAPACITY: usize = 128;

pub struct LocalTransport {
    topics: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    subscribed: Mutex<HashSet<String>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            subscribed: Mutex::new(HashSet::new()),
        }
    }

    async fn sender(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        self.topics
            .lock()
            .await
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.sender(topic).await;
        self.subscribed.lock().await.insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        if !self.subscribed.lock().await.remove(topic) {
            return Err(TransportError::NotSubscribed(topic.to_string()));
        }
        Ok(())
    }

    async fn broadcast(
        &self,
        topic: &str,
        message: &PriceMessage,
    ) -> Result<(), TransportError> {
        let raw =
            serde_json::to_vec(message).map_err(|e| TransportError::Decode(e.to_string()))?;
        // A topic without receivers simply drops the message.
        let _ = self.sender(topic).await.send(raw);
        Ok(())
    }

    async fn wait_for(
        &self,
        topic: &str,
    ) -> Result<mpsc::Receiver<DeliveryStatus>, TransportError> {
        if !self.subscribed.lock().await.contains(topic) {
            return Err(TransportError::NotSubscribed(topic.to_string()));
        }
        let mut rx = self.sender(topic).await.subscribe();
        let (tx, out) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            loop {
                let status = match rx.recv().await {
                    Ok(raw) => serde_json::from_slice::<PriceMessage>(&raw)
                        .map_err(|e| TransportError::Decode(e.to_string())),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if tx.send(status).await.is_err() {
                    break;
                }
            }
        });
        Ok(out)
    }
}

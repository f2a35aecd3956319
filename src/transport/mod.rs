//! Abstract pub/sub transport the relayer collects prices from.

pub mod local;
pub mod messages;

pub use local::LocalTransport;
pub use messages::{PriceMessage, PRICE_TOPIC};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not subscribed to topic {0}")]
    NotSubscribed(String),
    #[error("failed to decode message: {0}")]
    Decode(String),
    #[error("transport channel closed")]
    Closed,
}

/// One delivery: either a decoded price message or the decode/transport error.
pub type DeliveryStatus = Result<PriceMessage, TransportError>;

/// Minimal pub/sub contract between the relayer and the gossip layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Register interest in a topic.
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Unregister interest in a topic.
    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Publish a signed price message; the feeder side of the contract.
    async fn broadcast(&self, topic: &str, message: &PriceMessage)
        -> Result<(), TransportError>;

    /// Channel yielding one status per message received on `topic`.
    /// Requires a prior `subscribe` for the topic.
    async fn wait_for(
        &self,
        topic: &str,
    ) -> Result<mpsc::Receiver<DeliveryStatus>, TransportError>;
}

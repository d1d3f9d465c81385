//! Maps a [`BrokerKind`] onto a concrete [`Peer`]/[`BrokerController`] pair
//! (ยง4.5, ยง4.6). The two reference adapters get real implementations;
//! every other kind gets [`UnimplementedPeer`], so the wire protocol and the
//! CLI surface stay complete even though this workspace only ships two
//! working backends.

use async_trait::async_trait;
use flotilla_core::BrokerKind;

use crate::beanstalkd::BeanstalkdPeer;
use crate::broker::{BrokerController, DockerBrokerController};
use crate::error::PeerError;
use crate::kafka::KafkaPeer;
use crate::peer::{Peer, UnimplementedPeer};

/// Connects a producer-side [`Peer`] for `kind` at `host` ("host:port").
pub async fn producer_peer(kind: BrokerKind, host: &str) -> Result<Box<dyn Peer>, PeerError> {
    match kind {
        BrokerKind::Beanstalkd => Ok(Box::new(BeanstalkdPeer::connect_producer(host).await?)),
        BrokerKind::Kafka => Ok(Box::new(KafkaPeer::connect_producer(host).await?)),
        other => Ok(Box::new(UnimplementedPeer::new(other.as_str()))),
    }
}

/// Connects a consumer-side [`Peer`] for `kind` at `host` ("host:port").
pub async fn consumer_peer(kind: BrokerKind, host: &str) -> Result<Box<dyn Peer>, PeerError> {
    match kind {
        BrokerKind::Beanstalkd => Ok(Box::new(BeanstalkdPeer::connect_consumer(host).await?)),
        BrokerKind::Kafka => Ok(Box::new(KafkaPeer::connect_consumer(host).await?)),
        other => Ok(Box::new(UnimplementedPeer::new(other.as_str()))),
    }
}

/// The [`BrokerController`] responsible for starting and stopping `kind`'s
/// container(s).
pub fn broker_controller(kind: BrokerKind) -> Box<dyn BrokerController> {
    Box::new(DockerBrokerController::new(kind))
}

/// Indirection over peer/controller construction so a daemon can be driven
/// by a real adapter stack in production and by an in-process mock in
/// tests, without the dispatcher knowing which (ยง10.4).
#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn producer(&self, kind: BrokerKind, host: &str) -> Result<Box<dyn Peer>, PeerError>;
    async fn consumer(&self, kind: BrokerKind, host: &str) -> Result<Box<dyn Peer>, PeerError>;
    fn broker_controller(&self, kind: BrokerKind) -> Box<dyn BrokerController>;
}

/// The production [`PeerFactory`]: real adapters for Beanstalkd/Kafka,
/// [`UnimplementedPeer`] for every other kind (ยง4.5).
#[derive(Default)]
pub struct DefaultPeerFactory;

#[async_trait]
impl PeerFactory for DefaultPeerFactory {
    async fn producer(&self, kind: BrokerKind, host: &str) -> Result<Box<dyn Peer>, PeerError> {
        producer_peer(kind, host).await
    }

    async fn consumer(&self, kind: BrokerKind, host: &str) -> Result<Box<dyn Peer>, PeerError> {
        consumer_peer(kind, host).await
    }

    fn broker_controller(&self, kind: BrokerKind) -> Box<dyn BrokerController> {
        broker_controller(kind)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unimplemented_kind_yields_an_unimplemented_peer() {
        let mut peer = producer_peer(BrokerKind::Activemq, "localhost:0").await.unwrap();
        assert!(peer.subscribe().await.is_err());
    }

    #[tokio::test]
    async fn default_factory_delegates_to_the_free_functions() {
        let factory = DefaultPeerFactory;
        let mut peer = factory.producer(BrokerKind::Activemq, "localhost:0").await.unwrap();
        assert!(peer.subscribe().await.is_err());
    }
}

//! Broker adapters: the uniform [`Peer`] façade, the two reference
//! backends (Kafka, Beanstalkd), broker lifecycle orchestration, and the
//! mock adapter used by this workspace's own tests (ยง4.5, ยง4.6, ยง10.4).

pub mod beanstalkd;
pub mod broker;
pub mod error;
pub mod factory;
pub mod kafka;
pub mod mock;
pub mod peer;

pub use beanstalkd::BeanstalkdPeer;
pub use broker::{BrokerController, DockerBrokerController, MockBrokerController};
pub use error::{BrokerError, BrokerResult, PeerError, PeerResult};
pub use factory::{DefaultPeerFactory, PeerFactory};
pub use kafka::KafkaPeer;
pub use mock::{MockBroker, MockPeer, MockPeerFactory};
pub use peer::{Peer, UnimplementedPeer, BATCH_BUFFER_SIZE, CHANNEL_CAPACITY, DESTINATION};

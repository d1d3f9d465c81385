//! Kafka peer adapter, backed by `rskafka`.
//!
//! Streaming adapter (ยง4.5): one `produce` call per channel receive on the
//! producer side, and an internal pull buffer refilled by `fetch_records`
//! on the consumer side so `recv` can still hand back one message at a
//! time.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use rskafka::record::{Record, RecordAndOffset};
use tokio::sync::mpsc;

use crate::error::PeerError;
use crate::peer::{Peer, DESTINATION};

const PARTITION: i32 = 0;
const FETCH_MAX_WAIT_MS: i32 = 1_000;
const FETCH_MAX_BYTES: i32 = 1_048_576;
const REPLICATION_FACTOR: i16 = 1;
const TOPIC_CREATE_TIMEOUT_MS: i32 = 5_000;

enum Role {
    Producer,
    Consumer {
        next_offset: i64,
        buffered: VecDeque<RecordAndOffset>,
    },
}

pub struct KafkaPeer {
    partition_client: Arc<PartitionClient>,
    role: Role,
    send_tx: mpsc::Sender<Vec<u8>>,
    send_rx: Option<mpsc::Receiver<Vec<u8>>>,
    errors_tx: mpsc::Sender<PeerError>,
    errors_rx: mpsc::Receiver<PeerError>,
    done_tx: Option<tokio::sync::oneshot::Sender<()>>,
    flushed_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    setup_task: Option<tokio::task::JoinHandle<()>>,
}

impl KafkaPeer {
    pub async fn connect_producer(host: &str) -> Result<Self, PeerError> {
        let partition_client = Self::partition_client(host).await?;
        Ok(Self::new(partition_client, Role::Producer))
    }

    pub async fn connect_consumer(host: &str) -> Result<Self, PeerError> {
        let partition_client = Self::partition_client(host).await?;
        Ok(Self::new(
            partition_client,
            Role::Consumer {
                next_offset: 0,
                buffered: VecDeque::new(),
            },
        ))
    }

    async fn partition_client(host: &str) -> Result<Arc<PartitionClient>, PeerError> {
        let client: Client = ClientBuilder::new(vec![host.to_string()])
            .build()
            .await
            .map_err(|e| PeerError::connect(host, e))?;

        let controller = client
            .controller_client()
            .map_err(|e| PeerError::connect(host, e))?;
        // Best-effort: the topic may already exist from a previous run.
        let _ = controller
            .create_topic(DESTINATION, 1, REPLICATION_FACTOR, TOPIC_CREATE_TIMEOUT_MS)
            .await;

        let partition_client = client
            .partition_client(DESTINATION, PARTITION, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| PeerError::connect(host, e))?;
        Ok(Arc::new(partition_client))
    }

    fn new(partition_client: Arc<PartitionClient>, role: Role) -> Self {
        let (send_tx, send_rx) = mpsc::channel(super::peer::CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        Self {
            partition_client,
            role,
            send_tx,
            send_rx: Some(send_rx),
            errors_tx,
            errors_rx,
            done_tx: None,
            flushed_rx: None,
            setup_task: None,
        }
    }
}

fn to_record(payload: Vec<u8>) -> Record {
    Record {
        key: None,
        value: Some(payload),
        headers: BTreeMap::new(),
        timestamp: rskafka::time::OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl Peer for KafkaPeer {
    async fn subscribe(&mut self) -> Result<(), PeerError> {
        // Nothing additional is required: fetch_records reads from the
        // partition directly, there is no consumer-group registration step.
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, PeerError> {
        let Role::Consumer { next_offset, buffered } = &mut self.role else {
            return Err(PeerError::recv("recv called on a producer peer"));
        };

        if let Some(record_and_offset) = buffered.pop_front() {
            *next_offset = record_and_offset.offset + 1;
            return Ok(record_and_offset.record.value.unwrap_or_default());
        }

        loop {
            let (records, _high_watermark) = self
                .partition_client
                .fetch_records(*next_offset, 1..FETCH_MAX_BYTES, FETCH_MAX_WAIT_MS)
                .await
                .map_err(|e| PeerError::recv(e))?;

            if let Some(first) = records.first() {
                *next_offset = first.offset + 1;
                let value = first.record.value.clone().unwrap_or_default();
                buffered.extend(records.into_iter().skip(1));
                return Ok(value);
            }
            // Nothing new yet; fetch_records already waited up to
            // FETCH_MAX_WAIT_MS, so loop straight back into the next poll.
        }
    }

    fn sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.send_tx.clone()
    }

    fn errors(&mut self) -> &mut mpsc::Receiver<PeerError> {
        &mut self.errors_rx
    }

    fn setup(&mut self) {
        let Some(mut send_rx) = self.send_rx.take() else {
            // Already set up; the sender loop is already running.
            return;
        };
        let (done_tx, mut done_rx) = tokio::sync::oneshot::channel();
        let (flushed_tx, flushed_rx) = tokio::sync::oneshot::channel();
        self.done_tx = Some(done_tx);
        self.flushed_rx = Some(flushed_rx);

        let errors_tx = self.errors_tx.clone();
        let partition_client = Arc::clone(&self.partition_client);
        self.setup_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut done_rx => break,
                    message = send_rx.recv() => {
                        let Some(message) = message else { break };
                        let record = to_record(message);
                        if let Err(error) = partition_client
                            .produce(vec![record], Compression::NoCompression)
                            .await
                        {
                            let _ = errors_tx.send(PeerError::send(error)).await;
                        }
                    }
                }
            }
            let _ = flushed_tx.send(());
        }));
    }

    async fn done(&mut self) {
        if let Some(done_tx) = self.done_tx.take() {
            let _ = done_tx.send(());
        }
        if let Some(flushed_rx) = self.flushed_rx.take() {
            let _ = flushed_rx.await;
        }
    }

    async fn teardown(&mut self) {
        if let Some(task) = self.setup_task.take() {
            task.abort();
        }
    }
}

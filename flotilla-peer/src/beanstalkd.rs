//! Beanstalkd peer adapter.
//!
//! Beanstalkd speaks a simple newline-terminated ASCII command protocol;
//! rather than pull in an unverified client crate for it, this adapter
//! drives the wire directly over a plain [`TcpStream`] (`put` / `reserve`
//! / `delete`), matching the streaming (one-message-per-channel-receive)
//! shape named for it in ยง4.5.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::PeerError;
use crate::peer::{Peer, DESTINATION};

const RESERVE_TIMEOUT_SECS: u64 = 5;
const JOB_PRIORITY: u32 = 1;
const JOB_DELAY_SECS: u32 = 0;
const JOB_TTR_SECS: u32 = 120;

enum Role {
    Producer { stream: Option<BufReader<TcpStream>> },
    Consumer { stream: BufReader<TcpStream> },
}

pub struct BeanstalkdPeer {
    role: Role,
    send_tx: mpsc::Sender<Vec<u8>>,
    send_rx: Option<mpsc::Receiver<Vec<u8>>>,
    errors_tx: mpsc::Sender<PeerError>,
    errors_rx: mpsc::Receiver<PeerError>,
    done_tx: Option<tokio::sync::oneshot::Sender<()>>,
    flushed_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    setup_task: Option<tokio::task::JoinHandle<()>>,
}

impl BeanstalkdPeer {
    /// Dials `host` ("host:port") and returns a producer-side peer, selecting
    /// [`DESTINATION`] as its tube so `put` does not fall through to the
    /// server's `default` tube.
    pub async fn connect_producer(host: &str) -> Result<Self, PeerError> {
        let mut stream = Self::dial(host).await?;
        use_destination(&mut stream).await?;
        Ok(Self::new(Role::Producer { stream: Some(stream) }))
    }

    /// Dials `host` ("host:port") and returns a consumer-side peer. Callers
    /// must still invoke `subscribe` before `recv`.
    pub async fn connect_consumer(host: &str) -> Result<Self, PeerError> {
        let stream = Self::dial(host).await?;
        Ok(Self::new(Role::Consumer { stream }))
    }

    async fn dial(host: &str) -> Result<BufReader<TcpStream>, PeerError> {
        let stream = TcpStream::connect(host)
            .await
            .map_err(|e| PeerError::connect(host, e))?;
        Ok(BufReader::new(stream))
    }

    fn new(role: Role) -> Self {
        let (send_tx, send_rx) = mpsc::channel(super::peer::CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        Self {
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

async fn read_line(stream: &mut BufReader<TcpStream>) -> Result<String, PeerError> {
    let mut line = String::new();
    stream
        .read_line(&mut line)
        .await
        .map_err(|e| PeerError::recv(e))?;
    if line.is_empty() {
        return Err(PeerError::recv("beanstalkd connection closed"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn put(stream: &mut BufReader<TcpStream>, data: &[u8]) -> Result<(), PeerError> {
    let header = format!(
        "put {JOB_PRIORITY} {JOB_DELAY_SECS} {JOB_TTR_SECS} {}\r\n",
        data.len()
    );
    stream
        .write_all(header.as_bytes())
        .await
        .map_err(|e| PeerError::send(e))?;
    stream.write_all(data).await.map_err(|e| PeerError::send(e))?;
    stream.write_all(b"\r\n").await.map_err(|e| PeerError::send(e))?;
    let response = read_line(stream).await.map_err(|e| PeerError::send(e.to_string()))?;
    if response.starts_with("INSERTED") {
        Ok(())
    } else {
        Err(PeerError::send(format!("unexpected beanstalkd reply: {response}")))
    }
}

async fn use_destination(stream: &mut BufReader<TcpStream>) -> Result<(), PeerError> {
    let command = format!("use {DESTINATION}\r\n");
    stream
        .write_all(command.as_bytes())
        .await
        .map_err(|e| PeerError::send(e))?;
    let response = read_line(stream).await.map_err(|e| PeerError::send(e.to_string()))?;
    if response.starts_with("USING") {
        Ok(())
    } else {
        Err(PeerError::send(format!("unexpected beanstalkd reply: {response}")))
    }
}

async fn watch_destination(stream: &mut BufReader<TcpStream>) -> Result<(), PeerError> {
    let command = format!("watch {DESTINATION}\r\n");
    stream
        .write_all(command.as_bytes())
        .await
        .map_err(|e| PeerError::subscribe(e))?;
    let response = read_line(stream).await.map_err(|e| PeerError::subscribe(e.to_string()))?;
    if response.starts_with("WATCHING") {
        Ok(())
    } else {
        Err(PeerError::subscribe(format!("unexpected beanstalkd reply: {response}")))
    }
}

async fn reserve_and_delete(stream: &mut BufReader<TcpStream>) -> Result<Vec<u8>, PeerError> {
    loop {
        let command = format!("reserve-with-timeout {RESERVE_TIMEOUT_SECS}\r\n");
        stream
            .write_all(command.as_bytes())
            .await
            .map_err(|e| PeerError::recv(e))?;
        let header = read_line(stream).await?;
        if header == "TIMED_OUT" || header == "DEADLINE_SOON" {
            continue;
        }
        let mut parts = header.split_whitespace();
        let status = parts.next().unwrap_or_default();
        if status != "RESERVED" {
            return Err(PeerError::recv(format!("unexpected beanstalkd reply: {header}")));
        }
        let id = parts.next().ok_or_else(|| PeerError::recv("missing job id"))?;
        let byte_count: usize = parts
            .next()
            .ok_or_else(|| PeerError::recv("missing byte count"))?
            .parse()
            .map_err(|_| PeerError::recv("non-numeric byte count"))?;

        let mut data = vec![0u8; byte_count + 2]; // payload + trailing \r\n
        tokio::io::AsyncReadExt::read_exact(stream, &mut data)
            .await
            .map_err(|e| PeerError::recv(e))?;
        data.truncate(byte_count);

        let delete_command = format!("delete {id}\r\n");
        stream
            .write_all(delete_command.as_bytes())
            .await
            .map_err(|e| PeerError::recv(e))?;
        let _ = read_line(stream).await?;

        return Ok(data);
    }
}

#[async_trait]
impl Peer for BeanstalkdPeer {
    async fn subscribe(&mut self) -> Result<(), PeerError> {
        match &mut self.role {
            Role::Consumer { stream } => watch_destination(stream).await,
            Role::Producer { .. } => Err(PeerError::subscribe("subscribe called on a producer peer")),
        }
    }

    async fn recv(&mut self) -> Result<Vec<u8>, PeerError> {
        match &mut self.role {
            Role::Consumer { stream } => reserve_and_delete(stream).await,
            Role::Producer { .. } => Err(PeerError::recv("recv called on a producer peer")),
        }
    }

    fn sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.send_tx.clone()
    }

    fn errors(&mut self) -> &mut mpsc::Receiver<PeerError> {
        &mut self.errors_rx
    }

    fn setup(&mut self) {
        let Role::Producer { stream } = &mut self.role else {
            return;
        };
        // Already set up if either half was already taken; the sender loop
        // is already running.
        let (Some(mut stream), Some(mut send_rx)) = (stream.take(), self.send_rx.take()) else {
            return;
        };
        let (done_tx, mut done_rx) = tokio::sync::oneshot::channel();
        let (flushed_tx, flushed_rx) = tokio::sync::oneshot::channel();
        self.done_tx = Some(done_tx);
        self.flushed_rx = Some(flushed_rx);

        let errors_tx = self.errors_tx.clone();
        self.setup_task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut done_rx => break,
                    message = send_rx.recv() => {
                        let Some(message) = message else { break };
                        if let Err(error) = put(&mut stream, &message).await {
                            let _ = errors_tx.send(error).await;
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

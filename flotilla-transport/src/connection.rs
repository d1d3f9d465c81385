//! Length-delimited JSON request/reply connection (ยง4.1).
//!
//! One [`Connection`] wraps exactly one TCP stream and carries strictly one
//! outstanding request at a time: callers drive it either as a client
//! (`request`) or as a daemon's per-connection handler (`recv_request` /
//! `send_response`), never both roles on the same connection.

use std::time::Duration;

use flotilla_core::{Request, Response};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::{TransportError, TransportResult};

pub struct Connection {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    deadline: Duration,
}

impl Connection {
    /// Dials `address`, applying `deadline` to the connect attempt itself.
    pub async fn connect(address: &str, deadline: Duration) -> TransportResult<Self> {
        let stream = timeout(deadline, TcpStream::connect(address))
            .await
            .map_err(|_| TransportError::timeout("connect", deadline.as_secs()))?
            .map_err(|e| TransportError::connect(address, e))?;
        Ok(Self::from_stream(stream, deadline))
    }

    pub fn from_stream(stream: TcpStream, deadline: Duration) -> Self {
        Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
            deadline,
        }
    }

    /// Client-side round trip: send one request, wait for the matching
    /// reply, both bounded by the connection's deadline.
    pub async fn request(&mut self, request: &Request) -> TransportResult<Response> {
        self.send_request(request).await?;
        self.recv_response().await
    }

    pub async fn send_request(&mut self, request: &Request) -> TransportResult<()> {
        self.send_frame(request).await
    }

    pub async fn recv_response(&mut self) -> TransportResult<Response> {
        self.recv_frame("recv response").await
    }

    pub async fn recv_request(&mut self) -> TransportResult<Request> {
        self.recv_frame("recv request").await
    }

    pub async fn send_response(&mut self, response: &Response) -> TransportResult<()> {
        self.send_frame(response).await
    }

    async fn send_frame<T: serde::Serialize>(&mut self, value: &T) -> TransportResult<()> {
        let bytes = serde_json::to_vec(value).map_err(TransportError::Encode)?;
        timeout(self.deadline, self.framed.send(bytes.into()))
            .await
            .map_err(|_| TransportError::timeout("send", self.deadline.as_secs()))?
            .map_err(TransportError::Io)
    }

    async fn recv_frame<T: serde::de::DeserializeOwned>(&mut self, operation: &'static str) -> TransportResult<T> {
        let frame = timeout(self.deadline, self.framed.next())
            .await
            .map_err(|_| TransportError::timeout(operation, self.deadline.as_secs()))?
            .ok_or(TransportError::Closed)?
            .map_err(TransportError::Io)?;
        serde_json::from_slice(&frame).map_err(TransportError::Decode)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flotilla_core::BrokerKind;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (Connection, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move {
            Connection::connect(&addr.to_string(), Duration::from_secs(5))
                .await
                .unwrap()
        });
        let (stream, _) = listener.accept().await.unwrap();
        let server = Connection::from_stream(stream, Duration::from_secs(5));
        (client.await.unwrap(), server)
    }

    #[tokio::test]
    async fn request_reply_round_trips() {
        let (mut client, mut server) = loopback_pair().await;
        let sent = Request::start(BrokerKind::Beanstalkd, "localhost:11300", 11300);

        let server_task = tokio::spawn(async move {
            let received = server.recv_request().await.unwrap();
            assert_eq!(received.host, "localhost:11300");
            server.send_response(&Response::ok()).await.unwrap();
        });

        let response = client.request(&sent).await.unwrap();
        assert!(response.success);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn recv_after_peer_closes_surfaces_closed_error() {
        let (mut client, server) = loopback_pair().await;
        drop(server);
        let err = client.recv_response().await.unwrap_err();
        assert!(matches!(err, TransportError::Closed | TransportError::Io(_)));
    }

    #[tokio::test]
    async fn recv_times_out_when_no_reply_arrives() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client_task = tokio::spawn(async move {
            let mut client = Connection::connect(&addr.to_string(), Duration::from_millis(50))
                .await
                .unwrap();
            client.recv_response().await
        });
        let (_stream, _) = listener.accept().await.unwrap();
        let result = client_task.await.unwrap();
        assert!(matches!(result, Err(TransportError::Timeout { .. })));
    }
}

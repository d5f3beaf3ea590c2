use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::{Duration, timeout};

use crate::network::codec;
use crate::utils::{P2PError, Result};

/// Runs `operation`, turning an expired deadline into `P2PError::Timeout`.
pub async fn with_timeout<F, T>(limit: Duration, what: &str, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    timeout(limit, operation)
        .await
        .map_err(|_| P2PError::Timeout(format!("{} after {:?}", what, limit)))?
}

/// An accepted inbound connection. Carries one request and at most one reply.
pub struct Connection {
    addr: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    io_timeout: Duration,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr, io_timeout: Duration) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            addr,
            reader: BufReader::new(read_half),
            writer: write_half,
            io_timeout,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The request line as raw JSON, or `None` if the client hung up first.
    pub async fn receive(&mut self) -> Result<Option<Value>> {
        let value = with_timeout(
            self.io_timeout,
            "receive",
            codec::read_value(&mut self.reader),
        )
        .await?;

        if value.is_none() {
            debug!("{} closed the connection without a request", self.addr);
        }
        Ok(value)
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        with_timeout(
            self.io_timeout,
            "send",
            codec::write_message(&mut self.writer, message),
        )
        .await
    }
}

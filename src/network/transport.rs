use log::{debug, info};
use serde::Serialize;
use serde::de::DeserializeOwned;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream, lookup_host};
use tokio::time::Duration;

use crate::network::codec;
use crate::network::connection::with_timeout;
use crate::utils::{P2PError, Result};

const LISTEN_BACKLOG: i32 = 128;

pub struct Transport;

impl Transport {
    pub async fn connect(addr: &str, io_timeout: Duration) -> Result<TcpStream> {
        let stream = with_timeout(io_timeout, &format!("connect to {}", addr), async {
            TcpStream::connect(addr).await.map_err(|e| {
                P2PError::ConnectionFailed(format!("Failed to connect to {}: {}", addr, e))
            })
        })
        .await?;

        stream
            .set_nodelay(true)
            .map_err(|e| P2PError::NetworkError(format!("Failed to set TCP_NODELAY: {}", e)))?;

        debug!("Connected to {}", addr);
        Ok(stream)
    }

    /// Binds a listener with `SO_REUSEADDR` so a restarted service can reclaim its port.
    pub async fn listen(addr: &str) -> Result<TcpListener> {
        let bind_addr: SocketAddr = lookup_host(addr)
            .await
            .map_err(|e| P2PError::NetworkError(format!("Invalid address {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| P2PError::NetworkError(format!("Invalid address {}", addr)))?;

        let domain = if bind_addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| P2PError::NetworkError(format!("Failed to create socket: {}", e)))?;

        socket
            .set_reuse_address(true)
            .map_err(|e| P2PError::NetworkError(format!("Failed to set reuse_address: {}", e)))?;
        socket
            .bind(&bind_addr.into())
            .map_err(|e| P2PError::NetworkError(format!("Failed to bind to {}: {}", addr, e)))?;
        socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| P2PError::NetworkError(format!("Failed to listen on {}: {}", addr, e)))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| P2PError::NetworkError(format!("Failed to set nonblocking: {}", e)))?;

        let listener = TcpListener::from_std(socket.into()).map_err(|e| {
            P2PError::NetworkError(format!("Failed to convert to tokio listener: {}", e))
        })?;

        info!("Listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Opens a fresh connection, sends one request and reads at most one reply.
    ///
    /// `Ok(None)` means the remote closed without answering.
    pub async fn request<Req, Resp>(
        addr: &str,
        request: &Req,
        io_timeout: Duration,
    ) -> Result<Option<Resp>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let stream = Self::connect(addr, io_timeout).await?;
        let (read_half, mut write_half) = stream.into_split();

        with_timeout(
            io_timeout,
            &format!("send to {}", addr),
            codec::write_message(&mut write_half, request),
        )
        .await?;

        let mut reader = BufReader::new(read_half);
        with_timeout(
            io_timeout,
            &format!("receive from {}", addr),
            codec::read_message(&mut reader),
        )
        .await
    }
}

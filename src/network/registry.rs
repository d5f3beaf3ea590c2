use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::Duration;

use crate::core::protocol::{UNSUPPORTED_ACTION, reply_value};
use crate::core::{Message, PeerList, PeerRecord, RegisterAck, RegistryConfig};
use crate::network::messaging::{self, RequestHandler};
use crate::network::Transport;
use crate::utils::Result;

/// The set of known peers in registration order. Entries are never removed.
#[derive(Default)]
pub struct PeerRegistry {
    peers: Mutex<Vec<PeerRecord>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `record` unless an identical one exists. Returns whether it was new.
    pub async fn register(&self, record: PeerRecord) -> bool {
        let mut peers = self.peers.lock().await;
        if peers.contains(&record) {
            return false;
        }
        peers.push(record);
        true
    }

    pub async fn snapshot(&self) -> Vec<PeerRecord> {
        self.peers.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.lock().await.is_empty()
    }

    /// Builds the reply for one registry request.
    pub async fn respond(&self, request: Value) -> Value {
        match serde_json::from_value::<Message>(request) {
            Ok(Message::Register { address, port }) => {
                let record = PeerRecord::new(address, port);
                if self.register(record.clone()).await {
                    info!("Registered peer: {}", record);
                } else {
                    debug!("Peer {} already registered", record);
                }
                reply_value(&RegisterAck::registered())
            }
            Ok(Message::GetPeers) => reply_value(&PeerList {
                peers: self.snapshot().await,
            }),
            Ok(other) => {
                warn!("Registry does not handle '{}' requests", other.action());
                reply_value(&Message::error(UNSUPPORTED_ACTION))
            }
            Err(e) => {
                warn!("Unrecognized registry request: {}", e);
                reply_value(&Message::error(UNSUPPORTED_ACTION))
            }
        }
    }
}

#[async_trait]
impl RequestHandler for PeerRegistry {
    async fn handle(&self, request: Value, from: SocketAddr) -> Option<Value> {
        debug!("Registry request from {}", from);
        Some(self.respond(request).await)
    }
}

/// The rendezvous service: a bound listener in front of one `PeerRegistry`.
pub struct RegistryServer {
    registry: Arc<PeerRegistry>,
    listener: TcpListener,
    io_timeout: Duration,
}

impl RegistryServer {
    pub async fn bind(config: &RegistryConfig) -> Result<Self> {
        let listener = Transport::listen(&config.bind_addr()).await?;
        Ok(Self {
            registry: Arc::new(PeerRegistry::new()),
            listener,
            io_timeout: config.io_timeout(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<PeerRegistry> {
        self.registry.clone()
    }

    /// Serves until `shutdown` resolves.
    pub async fn run_until<S>(self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Registry listening on {}", addr);
        }
        messaging::serve(self.listener, self.registry, self.io_timeout, shutdown).await;
    }

    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_fresh_registry_lists_nothing() {
        let registry = PeerRegistry::new();
        let reply = registry.respond(json!({"action": "get_peers"})).await;
        assert_eq!(reply, json!({"peers": []}));
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_idempotent() {
        let registry = PeerRegistry::new();
        let request = json!({"action": "register", "address": "127.0.0.1", "port": 10000});

        assert_eq!(registry.respond(request.clone()).await, json!({"status": "registered"}));
        assert_eq!(registry.respond(request).await, json!({"status": "registered"}));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_peers_are_all_listed() {
        let registry = PeerRegistry::new();
        assert!(registry.register(PeerRecord::new("127.0.0.1", 10000)).await);
        assert!(registry.register(PeerRecord::new("127.0.0.1", 10001)).await);
        assert!(!registry.register(PeerRecord::new("127.0.0.1", 10000)).await);

        let reply = registry.respond(json!({"action": "get_peers"})).await;
        let list: PeerList = serde_json::from_value(reply).unwrap();
        assert_eq!(list.peers.len(), 2);
        assert!(list.peers.contains(&PeerRecord::new("127.0.0.1", 10001)));
    }

    #[tokio::test]
    async fn test_unknown_action_gets_error_reply() {
        let registry = PeerRegistry::new();

        let reply = registry.respond(json!({"action": "unregister"})).await;
        assert_eq!(reply, json!({"action": "error", "message": UNSUPPORTED_ACTION}));

        let reply = registry
            .respond(json!({"action": "file_request", "filename": "a.txt"}))
            .await;
        assert_eq!(reply["action"], "error");

        let reply = registry.respond(json!({"address": "127.0.0.1"})).await;
        assert_eq!(reply["action"], "error");
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_registrations() {
        let registry = Arc::new(PeerRegistry::new());
        let mut tasks = Vec::new();
        for i in 0..20u16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                // every port registered twice
                registry.register(PeerRecord::new("10.0.0.1", 9000 + i % 10)).await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(registry.len().await, 10);
    }

    #[tokio::test]
    async fn test_non_json_line_closes_without_reply() {
        let config = RegistryConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            io_timeout_secs: 5,
        };
        let server = RegistryServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"garbage\n").await.unwrap();
        let mut reply = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
            .await
            .unwrap();
        assert!(read.is_ok());
        assert!(reply.is_empty());

        // the listener keeps serving well-formed requests
        let list: Option<PeerList> =
            Transport::request(&addr.to_string(), &Message::GetPeers, Duration::from_secs(5))
                .await
                .unwrap();
        assert_eq!(list.unwrap().peers, Vec::<PeerRecord>::new());
    }
}

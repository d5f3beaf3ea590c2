use log::{debug, info};
use tokio::time::Duration;

use crate::core::{Message, PeerList, PeerRecord, RegisterAck};
use crate::network::Transport;
use crate::utils::{P2PError, Result};

/// Talks to the rendezvous registry on behalf of a node.
#[derive(Clone, Debug)]
pub struct RegistryClient {
    registry_addr: String,
    io_timeout: Duration,
}

impl RegistryClient {
    pub fn new(registry_addr: impl Into<String>, io_timeout: Duration) -> Self {
        Self {
            registry_addr: registry_addr.into(),
            io_timeout,
        }
    }

    pub fn registry_addr(&self) -> &str {
        &self.registry_addr
    }

    pub async fn register(&self, record: &PeerRecord) -> Result<()> {
        let reply: Option<RegisterAck> = Transport::request(
            &self.registry_addr,
            &Message::register(record),
            self.io_timeout,
        )
        .await?;

        match reply {
            Some(ack) if ack.is_registered() => {
                info!("Registered {} with registry {}", record, self.registry_addr);
                Ok(())
            }
            Some(ack) => Err(P2PError::InvalidResponse(format!(
                "registry answered status '{}'",
                ack.status
            ))),
            None => Err(P2PError::NoResponse(self.registry_addr.clone())),
        }
    }

    pub async fn get_peers(&self) -> Result<Vec<PeerRecord>> {
        let reply: Option<PeerList> =
            Transport::request(&self.registry_addr, &Message::GetPeers, self.io_timeout).await?;

        let peers = reply
            .ok_or_else(|| P2PError::NoResponse(self.registry_addr.clone()))?
            .peers;

        debug!("Registry {} lists {} peers", self.registry_addr, peers.len());
        Ok(peers)
    }
}

use async_trait::async_trait;
use log::{debug, error, warn};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{Duration, sleep};

use crate::network::Connection;
use crate::utils::Result;

/// Answers one decoded request. Returning `None` closes the connection without a reply.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: Value, from: SocketAddr) -> Option<Value>;
}

/// Accepts connections until `shutdown` resolves, one task per connection.
pub async fn serve<H, S>(
    listener: TcpListener,
    handler: Arc<H>,
    io_timeout: Duration,
    shutdown: S,
) where
    H: RequestHandler,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!("New connection from: {}", addr);
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let conn = Connection::new(stream, addr, io_timeout);
                        if let Err(e) = handle_connection(conn, handler).await {
                            warn!("Failed to handle connection from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    sleep(Duration::from_secs(1)).await;
                }
            },
            _ = &mut shutdown => {
                debug!("Listener shutting down");
                break;
            }
        }
    }
}

async fn handle_connection<H>(mut conn: Connection, handler: Arc<H>) -> Result<()>
where
    H: RequestHandler,
{
    let Some(request) = conn.receive().await? else {
        return Ok(());
    };

    if let Some(reply) = handler.handle(request, conn.addr()).await {
        conn.send(&reply).await?;
    }
    Ok(())
}

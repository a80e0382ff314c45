//! WebSocket accept loop and per-connection plumbing.
//!
//! Each accepted socket gets a fresh [`ConnectionId`], an outbound
//! channel registered with the gateway, a writer task draining that
//! channel into the socket, and a read loop feeding decoded messages
//! into [`Gateway::dispatch`]. The gateway mutex is the single
//! serialization point: per-connection messages are dispatched in send
//! order, and no two operations ever interleave.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use undercover_protocol::{Codec, ConnectionId, JsonCodec, ServerEvent};

use crate::ServerError;
use crate::gateway::Gateway;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) gateway: Mutex<Gateway>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting the server.
pub struct UndercoverServerBuilder {
    bind_addr: String,
}

impl UndercoverServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:6002".to_string(),
        }
    }

    /// Sets the address to bind the listener to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Binds the listener and returns the runnable server.
    pub async fn build(self) -> Result<UndercoverServer, ServerError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "listening");
        Ok(UndercoverServer {
            listener,
            state: Arc::new(ServerState {
                gateway: Mutex::new(Gateway::new()),
                codec: JsonCodec,
            }),
        })
    }
}

impl Default for UndercoverServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running game server.
pub struct UndercoverServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl UndercoverServer {
    pub fn builder() -> UndercoverServerBuilder {
        UndercoverServerBuilder::new()
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await
                        {
                            tracing::debug!(
                                %addr, error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Handles a single connection from WebSocket handshake to close.
async fn handle_connection(
    stream: TcpStream,
    state: Arc<ServerState>,
) -> Result<(), ServerError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let conn = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%conn, "connection accepted");

    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.gateway.lock().await.register(conn, tx);

    // Writer task: drain the gateway's outbound channel into the socket.
    let codec = state.codec;
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let bytes = match codec.encode(&event) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Binary(bytes.into())).await.is_err() {
                break;
            }
        }
    });

    // Read loop: decode and dispatch until the socket closes.
    while let Some(msg) = source.next().await {
        let data = match msg {
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue, // ping/pong/frame
            Err(e) => {
                tracing::debug!(%conn, error = %e, "recv error");
                break;
            }
        };

        match state.codec.decode(&data) {
            Ok(client_msg) => {
                state.gateway.lock().await.dispatch(conn, client_msg);
            }
            Err(e) => {
                tracing::debug!(%conn, error = %e, "undecodable message skipped");
            }
        }
    }

    tracing::debug!(%conn, "connection closed");
    state.gateway.lock().await.disconnect(conn);
    writer.abort();
    Ok(())
}

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use uuid::Uuid;

use quizroom_common::protocol::{self, framed_transport, ServerMessage};

use crate::catalog::{default_categories, default_quiz_types};
use crate::config::LobbyConfig;
use crate::connection::{self, ConnectionHandle};
use crate::lobby::LobbyManager;
use crate::memory::MemoryStore;
use crate::notifier::Notifier;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct ServerState {
    pub lobby: LobbyManager<MemoryStore>,
    pub connections: RwLock<HashMap<Uuid, ConnectionHandle>>,
    pub max_connections: usize,
}

pub type SharedState = Arc<ServerState>;

impl ServerState {
    pub fn new(config: LobbyConfig, max_connections: usize) -> Self {
        let store = Arc::new(MemoryStore::with_catalog(
            default_quiz_types(),
            default_categories(),
        ));
        Self {
            lobby: LobbyManager::new(store, Arc::new(Notifier::new()), config),
            connections: RwLock::new(HashMap::new()),
            max_connections,
        }
    }
}

pub async fn run(addr: SocketAddr, max_connections: usize, config: LobbyConfig) -> anyhow::Result<()> {
    let state: SharedState = Arc::new(ServerState::new(config, max_connections));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    serve(listener, state).await;
    Ok(())
}

/// Accepts connections until the task is dropped. A failed accept is
/// logged and retried; it never takes the server down.
pub async fn serve(listener: TcpListener, state: SharedState) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!("Accept failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let conn_count = state.connections.read().await.len();
        if conn_count >= state.max_connections {
            tracing::warn!(
                "Rejecting connection from {} (max {} reached)",
                peer_addr,
                state.max_connections
            );
            tokio::spawn(turn_away(stream));
            continue;
        }

        tracing::info!(
            "New connection from {} ({}/{})",
            peer_addr,
            conn_count + 1,
            state.max_connections
        );

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = connection::handle_connection(stream, state).await {
                tracing::warn!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

async fn turn_away(stream: TcpStream) {
    let mut transport = framed_transport(stream);
    let full = ServerMessage::HandshakeError {
        reason: "Server is full, try again later".into(),
    };
    if let Err(e) = protocol::send_message(&mut transport, &full).await {
        tracing::debug!("Could not notify rejected client: {}", e);
    }
}

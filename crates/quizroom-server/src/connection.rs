use std::collections::HashMap;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use uuid::Uuid;

use quizroom_common::participant::Profile;
use quizroom_common::protocol::{
    self, ClientMessage, ServerMessage, framed_transport, serialize_message,
};
use quizroom_common::room::{RoomId, UserId};

use crate::handler;
use crate::notifier::Subscription;
use crate::server::SharedState;

pub struct ConnectionHandle {
    pub user_id: UserId,
    pub username: String,
}

/// Per-connection state owned by the reader loop.
pub struct Session {
    pub conn_id: Uuid,
    pub user_id: UserId,
    pub username: String,
    pub tx: mpsc::Sender<ServerMessage>,
    /// At most one live subscription per room; dropping one releases it.
    pub subscriptions: HashMap<RoomId, Subscription>,
}

impl Session {
    pub async fn reply(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg).await;
    }
}

pub async fn handle_connection(stream: TcpStream, state: SharedState) -> anyhow::Result<()> {
    let mut transport = framed_transport(stream);

    // Step 1: Handshake -- expect Hello
    let hello: ClientMessage = match protocol::recv_message(&mut transport).await? {
        Some(msg) => msg,
        None => return Ok(()),
    };

    let profile = match hello {
        ClientMessage::Hello {
            user_id,
            username,
            display_name,
            version,
        } => {
            tracing::info!(
                "User '{}' ({}) connected (client version: {})",
                username,
                user_id,
                version
            );
            Profile {
                user_id,
                username,
                display_name,
            }
        }
        _ => {
            protocol::send_message(
                &mut transport,
                &ServerMessage::HandshakeError {
                    reason: "Expected Hello message".into(),
                },
            )
            .await?;
            return Ok(());
        }
    };

    if let Err(e) = state.lobby.register_profile(profile.clone()).await {
        protocol::send_message(
            &mut transport,
            &ServerMessage::HandshakeError {
                reason: e.to_string(),
            },
        )
        .await?;
        return Ok(());
    }

    protocol::send_message(
        &mut transport,
        &ServerMessage::Welcome {
            user_id: profile.user_id,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        },
    )
    .await?;

    // Step 2: Outbound queue shared by replies and subscription forwarders
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);

    let conn_id = Uuid::new_v4();
    state.connections.write().await.insert(
        conn_id,
        ConnectionHandle {
            user_id: profile.user_id,
            username: profile.username.clone(),
        },
    );

    let mut session = Session {
        conn_id,
        user_id: profile.user_id,
        username: profile.username,
        tx,
        subscriptions: HashMap::new(),
    };

    // Step 3: Split transport for independent read/write
    let (mut sink, mut stream) = transport.split();

    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serialize_message(&msg) {
                Ok(bytes) => {
                    if sink.send(bytes).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                }
            }
        }
    });

    // Step 4: Reader loop
    loop {
        match stream.next().await {
            Some(Ok(frame)) => match protocol::deserialize_message::<ClientMessage>(&frame) {
                Ok(ClientMessage::Disconnect) => {
                    tracing::info!("User '{}' said goodbye", session.username);
                    break;
                }
                Ok(msg) => {
                    if let Err(e) = handler::handle_message(&mut session, msg, &state).await {
                        tracing::error!("Handler error for {}: {}", session.username, e);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to parse message from {}: {}", session.username, e);
                }
            },
            Some(Err(e)) => {
                tracing::warn!("Read error from {}: {}", session.username, e);
                break;
            }
            None => {
                tracing::info!("User '{}' disconnected", session.username);
                break;
            }
        }
    }

    // Cleanup: releases every subscription this connection held
    handler::handle_disconnect(session, &state).await;
    write_task.abort();
    Ok(())
}

use tokio::sync::mpsc;
use uuid::Uuid;

use quizroom_common::protocol::ClientMessage;

use crate::event::{self, AppEvent};
use crate::input::{self, Command};
use crate::lobby::{Intent, LobbyView, Phase};
use crate::network;

pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
}

pub async fn run(
    server: String,
    identity: Identity,
    intent: Intent,
    min_participants: u16,
) -> anyhow::Result<()> {
    let hello = ClientMessage::Hello {
        user_id: identity.user_id,
        username: identity.username,
        display_name: identity.display_name,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let network::Connection {
        tx: network_tx,
        rx: network_rx,
        server_version,
    } = network::connect(&server, hello).await?;
    println!("Connected to {} (server {})", server, server_version);

    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(64);
    let events = tokio::spawn(event::event_loop(network_rx, event_tx));

    let mut view = LobbyView::new(identity.user_id, min_participants);
    send_all(&network_tx, view.begin(intent)).await;
    println!("{}", input::HELP);
    let mut last_render = String::new();

    while let Some(event) = event_rx.recv().await {
        match event {
            AppEvent::Network(msg) => {
                tracing::debug!("<- {:?}", msg);
                let outbound = view.handle_server(msg);
                send_all(&network_tx, outbound).await;
            }
            AppEvent::Line(line) => match input::parse_command(&line) {
                Some(Command::Start) => {
                    if let Some(msg) = view.start() {
                        send_all(&network_tx, vec![msg]).await;
                    }
                }
                Some(Command::Refresh) => {
                    if let Some(msg) = view.refresh() {
                        send_all(&network_tx, vec![msg]).await;
                    }
                    last_render.clear();
                }
                Some(Command::Join(code)) => {
                    let outbound = view.join(&code);
                    send_all(&network_tx, outbound).await;
                }
                Some(Command::Leave) => {
                    let outbound = view.leave();
                    send_all(&network_tx, outbound).await;
                }
                Some(Command::Help) => println!("{}", input::HELP),
                Some(Command::Quit) => break,
                None => println!("? {}", input::HELP),
            },
            AppEvent::Disconnected => {
                eprintln!("Lost connection to server");
                break;
            }
            AppEvent::Tick => {
                if !keepalive(&network_tx).await {
                    eprintln!("Lost connection to server");
                    break;
                }
            }
        }

        for notice in view.take_notices() {
            println!("! {}", notice);
        }

        let rendered = view.render();
        if rendered != last_render {
            print!("{}", rendered);
            last_render = rendered;
        }

        if let Phase::InGame { room_id } = view.phase {
            tracing::info!("Leaving lobby for game {}", room_id);
            break;
        }
    }

    let _ = network_tx.send(ClientMessage::Disconnect).await;
    events.abort();
    Ok(())
}

/// False once the writer task is gone and nothing can reach the server.
async fn keepalive(tx: &mpsc::Sender<ClientMessage>) -> bool {
    if tx.send(ClientMessage::Ping).await.is_err() {
        tracing::warn!("Keepalive failed, outbound channel closed");
        return false;
    }
    true
}

async fn send_all(tx: &mpsc::Sender<ClientMessage>, messages: Vec<ClientMessage>) {
    for msg in messages {
        tracing::debug!("-> {:?}", msg);
        if tx.send(msg).await.is_err() {
            tracing::warn!("Outbound channel closed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keepalive_reports_closed_connection() {
        let (tx, mut rx) = mpsc::channel(4);
        assert!(keepalive(&tx).await);
        assert!(matches!(rx.recv().await, Some(ClientMessage::Ping)));

        drop(rx);
        assert!(!keepalive(&tx).await);
    }
}

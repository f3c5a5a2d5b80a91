use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use quizroom_common::protocol::ServerMessage;

#[derive(Debug)]
pub enum AppEvent {
    Line(String),
    Network(ServerMessage),
    /// The server side of the connection went away.
    Disconnected,
    Tick,
}

pub async fn event_loop(
    mut network_rx: mpsc::Receiver<ServerMessage>,
    event_tx: mpsc::Sender<AppEvent>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut tick_interval = tokio::time::interval(Duration::from_secs(15));

    loop {
        let event = tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => AppEvent::Line(line),
                _ => {
                    stdin_open = false;
                    continue;
                }
            },
            msg = network_rx.recv() => match msg {
                Some(msg) => AppEvent::Network(msg),
                None => {
                    let _ = event_tx.send(AppEvent::Disconnected).await;
                    break;
                }
            },
            _ = tick_interval.tick() => AppEvent::Tick,
        };

        if event_tx.send(event).await.is_err() {
            break;
        }
    }
}

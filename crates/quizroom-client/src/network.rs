use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use quizroom_common::protocol::{
    deserialize_message, framed_transport, recv_message, send_message, serialize_message,
    ClientMessage, ServerMessage, Transport,
};

/// A greeted connection: the outbound queue, the inbound stream and the
/// version the server reported in its `Welcome`.
pub struct Connection {
    pub tx: mpsc::Sender<ClientMessage>,
    pub rx: mpsc::Receiver<ServerMessage>,
    pub server_version: String,
}

/// Connects, sends `hello` and waits for the server's answer before any
/// other traffic is allowed through.
pub async fn connect(addr: &str, hello: ClientMessage) -> anyhow::Result<Connection> {
    let stream = TcpStream::connect(addr).await?;
    let mut transport = framed_transport(stream);
    let server_version = handshake(&mut transport, &hello).await?;
    tracing::info!("Connected to {} (server {})", addr, server_version);

    let (mut sink, mut stream) = transport.split();
    let (client_tx, mut client_rx) = mpsc::channel::<ClientMessage>(64);
    let (server_tx, server_rx) = mpsc::channel::<ServerMessage>(64);

    tokio::spawn(async move {
        while let Some(msg) = client_rx.recv().await {
            let bytes = match serialize_message(&msg) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!("Dropping unserializable {:?}: {}", msg, e);
                    continue;
                }
            };
            if let Err(e) = sink.send(bytes).await {
                tracing::warn!("Write to server failed: {}", e);
                break;
            }
        }
    });

    // Ends by dropping `server_tx`, which the event loop reports as a
    // disconnect.
    tokio::spawn(async move {
        loop {
            let frame = match stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    tracing::warn!("Read from server failed: {}", e);
                    break;
                }
                None => {
                    tracing::info!("Server closed the connection");
                    break;
                }
            };
            match deserialize_message::<ServerMessage>(&frame) {
                Ok(msg) => {
                    if server_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed server frame: {}", e),
            }
        }
    });

    Ok(Connection {
        tx: client_tx,
        rx: server_rx,
        server_version,
    })
}

async fn handshake(transport: &mut Transport, hello: &ClientMessage) -> anyhow::Result<String> {
    if !matches!(hello, ClientMessage::Hello { .. }) {
        anyhow::bail!("connection must open with Hello, not {:?}", hello);
    }
    send_message(transport, hello).await?;
    match recv_message::<ServerMessage>(transport).await? {
        Some(ServerMessage::Welcome { server_version, .. }) => Ok(server_version),
        Some(ServerMessage::HandshakeError { reason }) => {
            anyhow::bail!("handshake rejected: {}", reason)
        }
        Some(other) => anyhow::bail!("unexpected handshake reply: {:?}", other),
        None => anyhow::bail!("server closed the connection during handshake"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use uuid::Uuid;

    fn hello() -> ClientMessage {
        ClientMessage::Hello {
            user_id: Uuid::new_v4(),
            username: "bob".into(),
            display_name: "Bob".into(),
            version: "0.1.0".into(),
        }
    }

    /// Accepts one connection and answers its first frame with `reply`,
    /// then echoes a `Pong` for every later frame.
    async fn fake_server(reply: ServerMessage) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut transport = framed_transport(stream);
            let first: Option<ClientMessage> = recv_message(&mut transport).await.unwrap();
            assert!(matches!(first, Some(ClientMessage::Hello { .. })));
            send_message(&mut transport, &reply).await.unwrap();
            while let Ok(Some(_)) = recv_message::<ClientMessage>(&mut transport).await {
                send_message(&mut transport, &ServerMessage::Pong).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_connect_completes_handshake() {
        let addr = fake_server(ServerMessage::Welcome {
            user_id: Uuid::new_v4(),
            server_version: "9.9.9".into(),
        })
        .await;
        let mut conn = connect(&addr, hello()).await.unwrap();
        assert_eq!(conn.server_version, "9.9.9");

        conn.tx.send(ClientMessage::Ping).await.unwrap();
        assert!(matches!(conn.rx.recv().await, Some(ServerMessage::Pong)));
    }

    #[tokio::test]
    async fn test_connect_surfaces_rejection() {
        let addr = fake_server(ServerMessage::HandshakeError {
            reason: "Server full".into(),
        })
        .await;
        let err = connect(&addr, hello()).await.err().unwrap();
        assert!(err.to_string().contains("Server full"));
    }

    #[tokio::test]
    async fn test_closed_server_ends_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut transport = framed_transport(stream);
            let _: Option<ClientMessage> = recv_message(&mut transport).await.unwrap();
            send_message(
                &mut transport,
                &ServerMessage::Welcome {
                    user_id: Uuid::new_v4(),
                    server_version: "0.1.0".into(),
                },
            )
            .await
            .unwrap();
        });

        let mut conn = connect(&addr, hello()).await.unwrap();
        assert!(conn.rx.recv().await.is_none());
    }
}

use quizroom_common::error::{ErrorCode, LobbyError};
use quizroom_common::protocol::{ClientMessage, ServerMessage};
use quizroom_common::room::RoomStatus;

use crate::connection::Session;
use crate::server::SharedState;

pub async fn handle_message(
    session: &mut Session,
    msg: ClientMessage,
    state: &SharedState,
) -> anyhow::Result<()> {
    let user_id = session.user_id;
    let lobby = &state.lobby;

    let reply = match msg {
        ClientMessage::ListQuizTypes => lobby
            .quiz_types()
            .await
            .map(|quiz_types| ServerMessage::QuizTypes { quiz_types }),

        ClientMessage::ListCategories => lobby
            .categories()
            .await
            .map(|categories| ServerMessage::Categories { categories }),

        ClientMessage::CreateRoom {
            quiz_type_id,
            category_id,
        } => lobby
            .create_room(quiz_type_id, category_id, user_id)
            .await
            .map(|room| ServerMessage::RoomCreated { room }),

        ClientMessage::JoinRoom { code } => lobby
            .join_room(&code, user_id)
            .await
            .map(|room| ServerMessage::RoomJoined { room }),

        ClientMessage::GetRoom { room_id } => lobby
            .get_room(room_id)
            .await
            .map(|room| ServerMessage::Room { room }),

        ClientMessage::ListParticipants { room_id } => lobby
            .list_participants(room_id)
            .await
            .map(|participants| ServerMessage::Participants {
                room_id,
                participants,
            }),

        // Everyone, host included, learns about the transition through
        // their subscription; the direct reply is the refreshed room.
        ClientMessage::StartRoom { room_id } => lobby
            .start_room(room_id, user_id)
            .await
            .map(|room| ServerMessage::Room { room }),

        ClientMessage::EndRoom { room_id } => lobby
            .end_room(room_id, user_id)
            .await
            .map(|room| ServerMessage::Room { room }),

        // Attach before reading the room: a transition that lands in
        // between is then either in the read or delivered as an event.
        ClientMessage::Subscribe { room_id } => {
            let subscription = lobby.notifier().attach(room_id, session.tx.clone());
            match lobby.get_room(room_id).await {
                Ok(view) => {
                    // Replacing drops (and releases) any previous one for this room.
                    session.subscriptions.insert(room_id, subscription);
                    tracing::debug!(
                        "Room {} now has {} subscribers",
                        room_id,
                        lobby.notifier().subscriber_count(room_id)
                    );
                    session.reply(ServerMessage::Subscribed { room_id }).await;
                    let status = view.room.status;
                    if status != RoomStatus::Waiting {
                        session
                            .reply(ServerMessage::RoomStatusChanged { room_id, status })
                            .await;
                    }
                    return Ok(());
                }
                Err(e) => Err(e),
            }
        }

        ClientMessage::Unsubscribe { room_id } => {
            session.subscriptions.remove(&room_id);
            Ok(ServerMessage::Unsubscribed { room_id })
        }

        ClientMessage::Ping => Ok(ServerMessage::Pong),

        ClientMessage::Hello { .. } => {
            session
                .reply(ServerMessage::Error {
                    code: ErrorCode::InvalidAction,
                    message: "Already greeted".into(),
                })
                .await;
            return Ok(());
        }

        // Handled by the reader loop.
        ClientMessage::Disconnect => return Ok(()),
    };

    match reply {
        Ok(msg) => session.reply(msg).await,
        Err(e) => session.reply(error_message(&e)).await,
    }
    Ok(())
}

pub async fn handle_disconnect(session: Session, state: &SharedState) {
    let Session {
        conn_id,
        subscriptions,
        ..
    } = session;
    for subscription in subscriptions.into_values() {
        tracing::debug!("Releasing room {} for closed connection", subscription.room_id());
    }

    let mut conns = state.connections.write().await;
    if let Some(conn) = conns.remove(&conn_id) {
        tracing::info!(
            "Closed connection for '{}' ({}), {} remaining",
            conn.username,
            conn.user_id,
            conns.len()
        );
    }
}

fn error_message(e: &LobbyError) -> ServerMessage {
    if matches!(e, LobbyError::Persistence(_) | LobbyError::DuplicateMembership) {
        tracing::error!("Lobby failure: {}", e);
    }
    ServerMessage::Error {
        code: e.code(),
        message: e.to_string(),
    }
}

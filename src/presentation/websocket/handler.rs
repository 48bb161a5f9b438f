//! WebSocket Connection Handler
//!
//! Drives a single gateway session: authenticate-first-frame, auto-join,
//! then a select loop multiplexing inbound events, the bounded outbound
//! queue, the close signal and the idle clock.

use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout};
use uuid::Uuid;

use super::gateway::CloseReason;
use super::messages::{parse_wire_id, ClientEvent, ServerEvent};
use super::session::SessionState;
use crate::application::dto::{MessageResponse, RoomResponse};
use crate::application::events::{EventPublisher, RoomEvent};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let max_message_size = state.settings.websocket.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    let mut session = SessionState::new(connection_id.clone());

    tracing::debug!(connection_id = %connection_id, "New WebSocket connection");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // First frame must be `auth` within the configured window.
    let identity = match authenticate(&mut ws_rx, &state).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, error = %e, "Authentication failed");
            let _ = ws_tx
                .send(close_frame(CloseReason::Unauthenticated))
                .await;
            return;
        }
    };
    session.authenticate(identity.clone());

    // Resolve the caller's rooms; the gateway joins every one of them so
    // broadcasts start flowing before any explicit `join`.
    let rooms = match state.rooms.list_rooms_for(&identity).await {
        Ok(rooms) => rooms,
        Err(e) => {
            tracing::error!(connection_id = %connection_id, error = %e, "Room listing failed");
            let _ = ws_tx
                .send(close_frame(CloseReason::Unauthenticated))
                .await;
            return;
        }
    };

    let (tx, rx) = mpsc::channel::<ServerEvent>(state.settings.websocket.outbound_queue_size);
    let mut close_rx = state
        .gateway
        .register_session(&connection_id, &identity, tx.clone());

    for room in &rooms {
        state.gateway.join_room(&connection_id, room.id);
        session.join(room.id);
    }

    let ready = ServerEvent::Ready {
        rooms: rooms.into_iter().map(RoomResponse::from).collect(),
    };
    if tx.send(ready).await.is_err() {
        state.gateway.unregister_session(&connection_id);
        return;
    }

    // Forwarder task owns the sink: drains the bounded queue and emits the
    // close frame when the gateway signals a termination reason.
    let mut sender_task = tokio::spawn(forward_outbound(ws_tx, rx, close_rx.clone()));

    tracing::info!(identity = %identity, connection_id = %connection_id, "Session ready");

    let idle_window = Duration::from_secs(state.settings.websocket.idle_timeout_secs);
    let mut idle_check = interval(idle_window.div_f32(2.0).max(Duration::from_secs(1)));
    idle_check.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        session.touch();
                        handle_frame(&text, &mut session, &tx, &state).await;
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // Pong is handled by axum; still counts as activity.
                        session.touch();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %session.connection_id, "Connection closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %session.connection_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }

            _ = close_rx.changed() => {
                // Slow consumer or another server-side close; the forwarder
                // sends the close frame.
                break;
            }

            _ = idle_check.tick() => {
                if session.is_idle(idle_window) {
                    tracing::info!(
                        connection_id = %session.connection_id,
                        "Idle timeout, closing connection"
                    );
                    state.gateway.close(&session.connection_id, CloseReason::IdleTimeout);
                    break;
                }
            }
        }
    }

    // Cleanup: leave every fan-out list and drop typing state. Persisted
    // rooms and messages are untouched.
    state.gateway.unregister_session(&session.connection_id);
    let joined: Vec<i64> = session.joined_rooms.iter().copied().collect();
    state.presence.clear_rooms_for(&session.identity, &joined);
    session.close();

    drop(tx);
    if timeout(Duration::from_secs(1), &mut sender_task).await.is_err() {
        sender_task.abort();
    }

    tracing::info!(
        identity = %session.identity,
        connection_id = %session.connection_id,
        "Session closed"
    );
}

/// Wait for the `auth` frame and verify its token.
async fn authenticate(
    ws_rx: &mut SplitStream<WebSocket>,
    state: &AppState,
) -> Result<String, AppError> {
    let auth_window = Duration::from_secs(state.settings.websocket.auth_timeout_secs);

    let first_event = timeout(auth_window, async {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    return serde_json::from_str::<ClientEvent>(&text).ok();
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                _ => continue,
            }
        }
        None
    })
    .await
    .map_err(|_| AppError::Unauthenticated("Authentication timed out".into()))?;

    match first_event {
        Some(ClientEvent::Auth { token }) => state.verifier.verify(&token).await,
        _ => Err(AppError::Unauthenticated(
            "First frame must be an auth event".into(),
        )),
    }
}

/// Drain the outbound queue into the socket; on a close signal, emit the
/// close frame and stop.
async fn forward_outbound(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerEvent>,
    mut close_rx: watch::Receiver<Option<CloseReason>>,
) {
    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::error!("Failed to serialize event: {}", e);
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = close_rx.changed() => {
                let maybe_reason = *close_rx.borrow_and_update();
                if let Some(reason) = maybe_reason {
                    let _ = ws_tx.send(close_frame(reason)).await;
                }
                break;
            }
        }
    }
}

fn close_frame(reason: CloseReason) -> Message {
    Message::Close(Some(CloseFrame {
        code: reason.code(),
        reason: reason.label().into(),
    }))
}

/// Decode one inbound frame and dispatch it; operation failures become
/// `error` events and the session stays open.
async fn handle_frame(
    text: &str,
    session: &mut SessionState,
    tx: &mpsc::Sender<ServerEvent>,
    state: &AppState,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            let err = AppError::Validation(format!("Malformed event: {}", e));
            let _ = tx.send(ServerEvent::error(&err)).await;
            return;
        }
    };

    if let Err(e) = dispatch_event(event, session, tx, state).await {
        tracing::debug!(
            connection_id = %session.connection_id,
            error = %e,
            "Event rejected"
        );
        let _ = tx.send(ServerEvent::error(&e)).await;
        if e.is_fatal() {
            state
                .gateway
                .close(&session.connection_id, CloseReason::Unauthenticated);
        }
    }
}

/// Route one decoded event through Guard → Store/Tracker.
async fn dispatch_event(
    event: ClientEvent,
    session: &mut SessionState,
    tx: &mpsc::Sender<ServerEvent>,
    state: &AppState,
) -> Result<(), AppError> {
    let identity = session.identity.clone();

    match event {
        ClientEvent::Auth { .. } => Err(AppError::Validation("Already authenticated".into())),

        ClientEvent::Ping => {
            let _ = tx.send(ServerEvent::Pong).await;
            Ok(())
        }

        ClientEvent::Join { room_id } => {
            let room_id = parse_wire_id(&room_id)?;
            let room = state.guard.check_membership(&identity, room_id).await?;

            // Join before paging: a message committed in between is then
            // delivered twice (page + broadcast) rather than missed, and
            // clients dedupe by sequence.
            state.gateway.join_room(&session.connection_id, room_id);
            session.join(room_id);

            let page = state.messages.page(room_id, &identity, None, None).await?;

            let typers = state
                .presence
                .active_typers(room_id)
                .into_iter()
                .filter(|t| t != &identity)
                .collect();

            let _ = tx
                .send(ServerEvent::Joined {
                    room: room.into(),
                    messages: page.messages.into_iter().map(MessageResponse::from).collect(),
                    has_more: page.has_more,
                    typers,
                })
                .await;
            Ok(())
        }

        ClientEvent::Send {
            room_id,
            body,
            attachment_ref,
            client_msg_id,
        } => {
            let room_id = parse_wire_id(&room_id)?;
            let message = state
                .messages
                .append(
                    room_id,
                    &identity,
                    &body,
                    attachment_ref.as_deref(),
                    &client_msg_id,
                )
                .await?;
            // The room broadcast already carries the message; the ack ties
            // it back to the client's own id and assigned sequence.
            let _ = tx
                .send(ServerEvent::Sent {
                    client_msg_id,
                    message: message.into(),
                })
                .await;
            Ok(())
        }

        ClientEvent::Edit { message_id, body } => {
            let message_id = parse_wire_id(&message_id)?;
            state.messages.edit(message_id, &identity, &body).await?;
            Ok(())
        }

        ClientEvent::Delete { message_id } => {
            let message_id = parse_wire_id(&message_id)?;
            state.messages.soft_delete(message_id, &identity).await?;
            Ok(())
        }

        ClientEvent::TypingStart { room_id } => {
            let room_id = parse_wire_id(&room_id)?;
            state.guard.check_membership(&identity, room_id).await?;
            state.presence.set_typing(room_id, &identity);
            state.gateway.publish(RoomEvent::Typing {
                room_id,
                identity,
                active: true,
                ttl_secs: Some(state.presence.ttl().as_secs()),
            });
            Ok(())
        }

        ClientEvent::TypingStop { room_id } => {
            let room_id = parse_wire_id(&room_id)?;
            state.guard.check_membership(&identity, room_id).await?;
            if state.presence.clear_typing(room_id, &identity) {
                state.gateway.publish(RoomEvent::Typing {
                    room_id,
                    identity,
                    active: false,
                    ttl_secs: None,
                });
            }
            Ok(())
        }

        ClientEvent::Resync {
            room_id,
            last_seen_sequence,
        } => {
            let room_id = parse_wire_id(&room_id)?;
            let page = state
                .messages
                .page(room_id, &identity, Some(last_seen_sequence), None)
                .await?;
            let _ = tx
                .send(ServerEvent::Resync {
                    room_id: room_id.to_string(),
                    messages: page.messages.into_iter().map(MessageResponse::from).collect(),
                    has_more: page.has_more,
                })
                .await;
            Ok(())
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::access::{self, AccessDenial};
use crate::application::services::realtime::clock::now_ms;
use crate::application::services::realtime::protocol::{errors, ClientFrame, ServerFrame};
use crate::application::services::realtime::room::{ApplyOutcome, Outbound, Room};
use crate::bootstrap::app_context::AppContext;
use crate::domain::presence::PresenceEntry;

pub async fn ws_entry(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

struct Joined {
    doc_id: Uuid,
    room: Arc<Room>,
}

/// How often the writer task pings an idle socket at the transport layer.
/// Keeps a connection that sends no application frames (no `heartbeat`,
/// `cursor_update`, or `yjs_update`) from being evicted by the sweeper as
/// long as its underlying socket is still answering pongs.
const TRANSPORT_PING_INTERVAL: Duration = Duration::from_secs(5);

async fn handle_socket(socket: WebSocket, ctx: AppContext) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let conn_id = Uuid::new_v4();

    let writer = tokio::spawn(async move {
        let mut ping_ticker = tokio::time::interval(TRANSPORT_PING_INTERVAL);
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(Outbound::Frame(frame)) => {
                            let text = match serde_json::to_string(&frame) {
                                Ok(t) => t,
                                Err(_) => continue,
                            };
                            if sink.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(Outbound::Close) => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                        None => break,
                    }
                }
                _ = ping_ticker.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut joined: Option<Joined> = None;

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                let frame: ClientFrame = match serde_json::from_str(&text) {
                    Ok(f) => f,
                    Err(e) => {
                        tracing::debug!(conn = %conn_id, error = %e, "malformed_frame");
                        continue;
                    }
                };

                if let ClientFrame::JoinDocument {
                    document_id,
                    token,
                    share_token,
                    user,
                    cursor_position,
                    selection_range,
                } = frame
                {
                    if joined.is_some() {
                        tracing::debug!(conn = %conn_id, "duplicate_join_ignored");
                        continue;
                    }
                    let (name, avatar_color) = match user {
                        Some(u) => (u.name, u.avatar_color),
                        None => (None, None),
                    };
                    match handle_join(
                        &ctx,
                        conn_id,
                        &document_id,
                        &token,
                        share_token.as_deref(),
                        name,
                        avatar_color,
                        cursor_position,
                        selection_range,
                        tx.clone(),
                    )
                    .await
                    {
                        Ok(outcome) => joined = Some(outcome),
                        Err(message) => {
                            let _ = tx.send(Outbound::Frame(ServerFrame::Error { message }));
                            break;
                        }
                    }
                    continue;
                }

                let Some(Joined { doc_id, room }) = &joined else {
                    let _ = tx.send(Outbound::Frame(ServerFrame::Error {
                        message: errors::NOT_JOINED.to_string(),
                    }));
                    continue;
                };

                match frame {
                    ClientFrame::YjsUpdate { update } => {
                        match room.apply_update(conn_id, &update).await {
                            ApplyOutcome::Applied => {}
                            ApplyOutcome::ReadOnly => {
                                let _ = tx.send(Outbound::Frame(ServerFrame::Error {
                                    message: errors::READ_ONLY_ACCESS.to_string(),
                                }));
                            }
                            ApplyOutcome::Dropped => {
                                tracing::debug!(conn = %conn_id, "update_decode_or_apply_failed");
                            }
                        }
                    }
                    ClientFrame::CursorUpdate { update } => {
                        if let Some(users) =
                            room.update_presence(conn_id, &update, now_ms()).await
                        {
                            room.broadcast(ServerFrame::PresenceUpdate {
                                document_id: doc_id.to_string(),
                                users,
                            })
                            .await;
                        }
                    }
                    ClientFrame::Heartbeat {} => {
                        room.heartbeat(conn_id, now_ms()).await;
                    }
                    ClientFrame::LeaveDocument {} => {
                        let doc_id = *doc_id;
                        let room = room.clone();
                        leave_room(&ctx, conn_id, doc_id, &room).await;
                        joined = None;
                    }
                    ClientFrame::JoinDocument { .. } => unreachable!("handled above"),
                }
            }
            Message::Pong(_) => {
                if let Some(Joined { room, .. }) = &joined {
                    room.heartbeat(conn_id, now_ms()).await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    if let Some(Joined { doc_id, room }) = joined.take() {
        leave_room(&ctx, conn_id, doc_id, &room).await;
    }
    let _ = tx.send(Outbound::Close);
    let _ = writer.await;
}

async fn leave_room(ctx: &AppContext, conn_id: Uuid, doc_id: Uuid, room: &Arc<Room>) {
    let (users, empty) = room.leave(conn_id).await;
    if let Some(users) = users {
        room.broadcast(ServerFrame::PresenceUpdate {
            document_id: doc_id.to_string(),
            users,
        })
        .await;
    }
    if empty {
        ctx.registry().remove_if_empty(doc_id).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_join(
    ctx: &AppContext,
    conn_id: Uuid,
    document_id: &str,
    token: &str,
    share_token: Option<&str>,
    name: Option<String>,
    avatar_color: Option<String>,
    cursor_position: Option<u32>,
    selection_range: Option<crate::domain::presence::SelectionRange>,
    sender: mpsc::UnboundedSender<Outbound>,
) -> Result<Joined, String> {
    let identity = ctx
        .token_verifier()
        .verify(token)
        .ok_or_else(|| errors::UNAUTHORIZED.to_string())?;

    let access_repo = ctx.access_repo();
    let permission = access::resolve_document(
        access_repo.as_ref(),
        document_id,
        identity.user_id,
        share_token,
    )
    .await
    .map_err(|denial: AccessDenial| denial.client_message().to_string())?;

    // Already validated by resolve_document above; re-parsing here is
    // infallible.
    let doc_uuid = Uuid::parse_str(document_id.trim()).expect("validated by resolve_document");

    let document = access_repo
        .find_document_by_id(doc_uuid)
        .await
        .map_err(|_| errors::DOCUMENT_NOT_FOUND.to_string())?
        .ok_or_else(|| errors::DOCUMENT_NOT_FOUND.to_string())?;

    let room = ctx
        .registry()
        .get_or_create(doc_uuid, document.owner_id)
        .await
        .map_err(|_| errors::DOCUMENT_NOT_FOUND.to_string())?;

    let mut entry = PresenceEntry::new(
        identity.user_id,
        name.unwrap_or_else(|| identity.email.clone()),
        avatar_color.unwrap_or_else(|| default_avatar_color(identity.user_id)),
        now_ms(),
    );
    if let Some(pos) = cursor_position {
        entry.cursor_position = pos;
    }
    entry.selection_range = selection_range.filter(|range| range.is_valid());

    let (state, users) = room.join(conn_id, identity.user_id, permission, entry, sender.clone()).await;

    let state_b64 = {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(state)
    };
    let _ = sender.send(Outbound::Frame(ServerFrame::DocSync { update: state_b64 }));

    room.broadcast(ServerFrame::PresenceUpdate {
        document_id: doc_uuid.to_string(),
        users,
    })
    .await;

    Ok(Joined {
        doc_id: doc_uuid,
        room,
    })
}

fn default_avatar_color(user_id: Uuid) -> String {
    const PALETTE: [&str; 6] = ["#f87171", "#fb923c", "#facc15", "#4ade80", "#60a5fa", "#c084fc"];
    let idx = (user_id.as_u128() % PALETTE.len() as u128) as usize;
    PALETTE[idx].to_string()
}

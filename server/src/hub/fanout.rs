//! Side-Channel Fanout
//!
//! Room membership changes and roomwide broadcasts: join/leave notices,
//! media toggles, recording status, ephemeral chat echoes, and meeting
//! teardown. Join/leave notices go to everyone except the joiner/leaver
//! themselves.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ws::proto::{MediaKind, MediaState, ServerEvent};

use super::error::HubError;
use super::room::{Participant, Room};
use super::{ConnHandle, Hub};

/// Handle `join-room`: enter as a live participant. Requires prior
/// approval (or being the host).
pub async fn join_room(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    media_state: MediaState,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    let user_id = conn.user_id().to_string();
    let is_host = user_id == room.host_user_id;

    let mut state = room.state.lock().await;
    if !is_host && !state.approved_users.contains(&user_id) {
        return Err(HubError::Authorization(format!(
            "{user_id} is not admitted to room {room_id}"
        )));
    }

    let participant = Participant {
        conn_id: conn.conn_id,
        user_id: user_id.clone(),
        display_name: conn.display_name().to_string(),
        is_host,
        media_state,
        joined_at: Utc::now(),
    };
    let summary = participant.summary();

    // A reconnecting user replaces their stale connection; peers get a
    // hint to tear down the old peer connection.
    if let Some(stale) = state.add_participant(participant) {
        debug!(room_id = %room_id, user_id = %user_id, stale_conn = %stale.conn_id, "Stale connection replaced");
        hub.broadcast_room(
            &state,
            &ServerEvent::UserDisconnected {
                room_id: room_id.clone(),
                conn_id: stale.conn_id,
                user_id: stale.user_id,
            },
            Some(conn.conn_id),
        );
        if let Some(stale_conn) = hub.conn(stale.conn_id) {
            stale_conn.set_room(None);
        }
    }

    if is_host {
        state.host_conn_id = Some(conn.conn_id);
    }
    conn.set_room(Some(room_id.clone()));

    conn.send(ServerEvent::ExistingParticipants {
        room_id: room_id.clone(),
        participants: state.participant_summaries_except(conn.conn_id),
    });
    hub.broadcast_room(
        &state,
        &ServerEvent::UserJoined {
            room_id: room_id.clone(),
            participant: summary,
        },
        Some(conn.conn_id),
    );

    if is_host && !state.pending_requests.is_empty() {
        conn.send(ServerEvent::PendingJoinRequests {
            room_id: room_id.clone(),
            requests: state.pending_summaries(),
        });
    }

    info!(room_id = %room_id, user_id = %user_id, conn_id = %conn.conn_id, is_host, "User joined room");
    Ok(())
}

/// Handle `leave-room`.
pub async fn leave_room(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;

    let abandoned = depart(hub, &room, conn.conn_id).await;
    conn.set_room(None);

    if abandoned {
        hub.destroy_room(&room_id, "abandoned").await;
    }
    Ok(())
}

/// Remove a departing connection from a room and notify the remaining
/// participants. Shared between `leave-room` and socket disconnect.
/// Returns whether the room is now abandoned.
pub(crate) async fn depart(hub: &Hub, room: &Arc<Room>, conn_id: Uuid) -> bool {
    let mut state = room.state.lock().await;

    if let Some(participant) = state.remove_participant(conn_id) {
        info!(
            room_id = %room.room_id,
            user_id = %participant.user_id,
            conn_id = %conn_id,
            "User left room"
        );
        hub.broadcast_room(
            &state,
            &ServerEvent::UserLeft {
                room_id: room.room_id.clone(),
                conn_id,
                user_id: participant.user_id.clone(),
            },
            None,
        );
        if participant.is_host {
            hub.broadcast_room(
                &state,
                &ServerEvent::HostLeft {
                    room_id: room.room_id.clone(),
                    user_id: participant.user_id,
                },
                None,
            );
        }
    }

    // A waiting requester keeps its place in the queue with a null
    // connection; `update-waiting-socket` reattaches it.
    state.detach_conn(conn_id);
    hub.is_abandoned(&state)
}

/// Handle `end-meeting` (host only): evict everyone and destroy the room.
pub async fn end_meeting(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    if conn.user_id() != room.host_user_id {
        return Err(HubError::Authorization(
            "only the host may end the meeting".into(),
        ));
    }

    info!(room_id = %room_id, host_user_id = %conn.user_id(), "Meeting ended by host");
    hub.destroy_room(&room_id, "ended by host").await;
    Ok(())
}

/// Handle `toggle-media`: record the new track state and tell the peers.
pub async fn toggle_media(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    media_type: MediaKind,
    enabled: bool,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    let mut state = room.state.lock().await;

    let Some(user_id) = state.toggle_media(conn.conn_id, media_type, enabled) else {
        return Err(HubError::InvalidState(format!(
            "connection is not a participant of room {room_id}"
        )));
    };

    hub.broadcast_room(
        &state,
        &ServerEvent::UserMediaToggle {
            room_id,
            user_id,
            media_type,
            enabled,
        },
        Some(conn.conn_id),
    );
    Ok(())
}

/// Handle `recording-status`: tell the peers, and note the recording in
/// the store layer when one starts.
pub async fn recording_status(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    is_recording: bool,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    let state = room.state.lock().await;

    if !state.participants.contains_key(&conn.conn_id) {
        return Err(HubError::InvalidState(format!(
            "connection is not a participant of room {room_id}"
        )));
    }

    hub.broadcast_room(
        &state,
        &ServerEvent::RecordingStatusChanged {
            room_id: room_id.clone(),
            is_recording,
            user_name: conn.display_name().to_string(),
        },
        Some(conn.conn_id),
    );
    drop(state);

    if is_recording {
        let store = hub.store().clone();
        let recorded_by = conn.user_id().to_string();
        tokio::spawn(async move {
            if let Err(e) = store
                .persist_recording(&room_id, &recorded_by, Utc::now())
                .await
            {
                warn!(room_id = %room_id, error = %e, "Failed to persist recording metadata");
            }
        });
    }
    Ok(())
}

/// Handle `send-message`: ephemeral chat echo to the rest of the room.
/// Durable chat persistence is a REST concern.
pub async fn send_message(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    message: String,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    let state = room.state.lock().await;

    if !state.participants.contains_key(&conn.conn_id) {
        return Err(HubError::InvalidState(format!(
            "connection is not a participant of room {room_id}"
        )));
    }

    hub.broadcast_room(
        &state,
        &ServerEvent::ReceiveMessage {
            room_id,
            message,
            user_name: conn.display_name().to_string(),
            sent_at: Utc::now(),
        },
        Some(conn.conn_id),
    );
    Ok(())
}

async fn lookup(hub: &Hub, room_id: &str) -> Result<Arc<Room>, HubError> {
    hub.registry()
        .get(room_id)
        .await
        .ok_or_else(|| HubError::UnknownRoom(room_id.to_string()))
}

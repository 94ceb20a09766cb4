//! Transcription Coordinator
//!
//! Per-room transcript log (durable finals) and per-speaker interim
//! captions. Finals fan out to every other participant and are served to
//! late joiners on request; interims are overwrite-in-place and never
//! persisted. Speech recognition itself happens on clients.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::ws::proto::{ServerEvent, TranscriptEntry};

use super::error::HubError;
use super::room::Room;
use super::{ConnHandle, Hub};

/// Handle `transcription-entry`: a finalized utterance.
#[allow(clippy::too_many_arguments)]
pub async fn entry(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    entry_id: String,
    user_id: String,
    text: String,
    timestamp: DateTime<Utc>,
    seconds_into_meeting: f64,
    confidence: f64,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    let mut state = room.state.lock().await;

    if !state.participants.contains_key(&conn.conn_id) {
        return Err(HubError::InvalidState(format!(
            "connection is not a participant of room {room_id}"
        )));
    }
    // Reject spoofed speaker identities.
    if user_id.trim() != conn.user_id() {
        return Err(HubError::Authorization(
            "transcription user does not match the authenticated identity".into(),
        ));
    }

    let entry = TranscriptEntry {
        entry_id,
        user_id: conn.user_id().to_string(),
        user_name: conn.display_name().to_string(),
        text,
        timestamp,
        seconds_into_meeting,
        confidence,
    };

    if !state.append_final(entry.clone()) {
        debug!(room_id = %room_id, entry_id = %entry.entry_id, "Duplicate transcription entry ignored");
        return Ok(());
    }

    // The sender already has the entry locally.
    hub.broadcast_room(
        &state,
        &ServerEvent::TranscriptionUpdate { room_id, entry },
        Some(conn.conn_id),
    );
    Ok(())
}

/// Handle `transcription-interim`: a live caption, overwritten per
/// speaker. Empty text clears the slot.
pub async fn interim(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    user_id: String,
    text: String,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    let mut state = room.state.lock().await;

    if !state.participants.contains_key(&conn.conn_id) {
        return Err(HubError::InvalidState(format!(
            "connection is not a participant of room {room_id}"
        )));
    }
    if user_id.trim() != conn.user_id() {
        return Err(HubError::Authorization(
            "transcription user does not match the authenticated identity".into(),
        ));
    }

    state.set_interim(conn.user_id(), conn.display_name(), &text, Utc::now());
    hub.broadcast_room(
        &state,
        &ServerEvent::TranscriptionInterim {
            room_id,
            user_id: conn.user_id().to_string(),
            user_name: conn.display_name().to_string(),
            text,
        },
        Some(conn.conn_id),
    );
    Ok(())
}

/// Handle `request-transcription-history`: serve the full log. Entries
/// are immutable once appended, so this is safe at any time.
pub async fn history(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    let state = room.state.lock().await;

    if !state.participants.contains_key(&conn.conn_id) {
        return Err(HubError::InvalidState(format!(
            "connection is not a participant of room {room_id}"
        )));
    }

    let entries = state.transcript().to_vec();
    let count = entries.len();
    conn.send(ServerEvent::TranscriptionHistory {
        room_id,
        entries,
        count,
    });
    Ok(())
}

/// Handle `set-meeting-start-time` (host only). The first write wins;
/// repeats are ignored so the operation is idempotent.
pub async fn set_meeting_start_time(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    start_time: DateTime<Utc>,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    if conn.user_id() != room.host_user_id {
        return Err(HubError::Authorization(
            "only the host may set the meeting start time".into(),
        ));
    }

    let mut state = room.state.lock().await;
    if !state.set_meeting_start_time(start_time) {
        debug!(room_id = %room_id, "Meeting start time already set");
        return Ok(());
    }

    hub.broadcast_room(
        &state,
        &ServerEvent::MeetingStartTime {
            room_id,
            start_time,
        },
        None,
    );
    Ok(())
}

/// Handle `request-meeting-start-time`: reply if the host has set it.
pub async fn request_meeting_start_time(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    let state = room.state.lock().await;

    if let Some(start_time) = state.meeting_start_time {
        conn.send(ServerEvent::MeetingStartTime {
            room_id,
            start_time,
        });
    } else {
        debug!(room_id = %room_id, "Meeting start time not set yet");
    }
    Ok(())
}

async fn lookup(hub: &Hub, room_id: &str) -> Result<Arc<Room>, HubError> {
    hub.registry()
        .get(room_id)
        .await
        .ok_or_else(|| HubError::UnknownRoom(room_id.to_string()))
}

//! Signaling Broker
//!
//! Stateless relay of WebRTC negotiation messages (offer, answer, ICE
//! candidate, renegotiation request) between two connections of the same
//! room. Payloads are opaque; the broker never inspects SDP or ICE
//! contents, and offer/answer glare is a client concern. Ordering is
//! preserved per (sender, receiver) pair by the per-room serializer and
//! the receiver's FIFO egress queue.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::ws::proto::ServerEvent;

use super::error::HubError;
use super::{ConnHandle, Hub};

/// Relay one signaling event from `from` to `to` after verifying that
/// both endpoints are live participants of the sender's room.
pub async fn relay(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    to: Uuid,
    from: Uuid,
    event: ServerEvent,
) -> Result<(), HubError> {
    if from != conn.conn_id {
        return Err(HubError::Authorization(
            "signaling 'from' must be the sending connection".into(),
        ));
    }

    let room_id = conn
        .room_id()
        .ok_or_else(|| HubError::InvalidState("connection is not in a room".into()))?;
    let room = hub
        .registry()
        .get(&room_id)
        .await
        .ok_or_else(|| HubError::UnknownRoom(room_id.clone()))?;

    let state = room.state.lock().await;
    if !state.participants.contains_key(&from) {
        return Err(HubError::InvalidState(format!(
            "sender is not a participant of room {room_id}"
        )));
    }
    if !state.participants.contains_key(&to) {
        return Err(HubError::InvalidState(format!(
            "target connection is not a participant of room {room_id}"
        )));
    }

    debug!(room_id = %room_id, from = %from, to = %to, "Relaying signaling message");
    hub.send_to(to, event);
    Ok(())
}

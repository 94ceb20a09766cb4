//! Admission Controller
//!
//! Per-room state machine for join requests. Every host-only action
//! verifies both that the asserted approver matches the connection's
//! authenticated identity and that the authenticated identity is the
//! room's immutable host — the claim travels through the client, the
//! identity does not.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::ws::proto::{JoinAction, ServerEvent};

use super::error::HubError;
use super::room::{ApproveOutcome, DenyOutcome, JoinDecision, Room};
use super::{ConnHandle, Hub};

/// Default reason attached to denials that carry none.
const DEFAULT_DENY_REASON: &str = "Denied by host";

/// Handle `request-join-room`.
pub async fn request_join(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    is_rejoin: bool,
) -> Result<(), HubError> {
    let user_id = conn.user_id().to_string();
    let display_name = conn.display_name().to_string();

    let (room, created) = hub
        .registry()
        .get_or_create(&room_id, &user_id, conn.conn_id)
        .await;
    conn.set_room(Some(room_id.clone()));

    if created {
        info!(room_id = %room_id, host_user_id = %user_id, "Room created");
        spawn_meeting_lookup(hub, &room_id);
        conn.send(ServerEvent::JoinApproved {
            room_id,
            is_host: true,
            message: None,
            pending_requests: None,
        });
        return Ok(());
    }

    let mut state = room.state.lock().await;
    let decision = state.decide_join(
        &room.host_user_id,
        &user_id,
        &display_name,
        conn.conn_id,
        Utc::now(),
        hub.config().dedup_window(),
    );

    match decision {
        JoinDecision::Host { pending } => {
            info!(room_id = %room_id, user_id = %user_id, "Host reconnected");
            conn.send(ServerEvent::JoinApproved {
                room_id,
                is_host: true,
                message: None,
                pending_requests: Some(pending),
            });
        }
        JoinDecision::Approved { rejoin } => {
            conn.send(ServerEvent::JoinApproved {
                room_id,
                is_host: false,
                message: Some(if rejoin || is_rejoin {
                    "reconnected".into()
                } else {
                    "admitted".into()
                }),
                pending_requests: None,
            });
        }
        JoinDecision::Denied { reason } => {
            conn.send(ServerEvent::JoinDenied {
                room_id,
                reason,
                permanent: false,
            });
        }
        JoinDecision::DuplicateWait { position } => {
            debug!(room_id = %room_id, user_id = %user_id, "Duplicate join request suppressed");
            conn.send(ServerEvent::WaitingForApproval {
                room_id,
                position,
                is_duplicate: true,
            });
        }
        JoinDecision::Queued {
            position,
            requested_at,
            notify_host,
        } => {
            info!(room_id = %room_id, user_id = %user_id, position, "Join request queued");
            conn.send(ServerEvent::WaitingForApproval {
                room_id: room_id.clone(),
                position,
                is_duplicate: false,
            });
            if let Some(host_conn) = notify_host {
                hub.send_to(
                    host_conn,
                    ServerEvent::JoinRequest {
                        room_id,
                        user_id,
                        user_name: display_name,
                        requested_at,
                    },
                );
            }
        }
    }

    Ok(())
}

/// Handle `update-waiting-socket`: rebind a waiting request to the
/// caller's connection after a refresh. The request's age is untouched
/// and the host is not notified again.
pub async fn update_waiting_socket(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    let mut state = room.state.lock().await;

    if !state.update_waiting_conn(conn.user_id(), conn.conn_id) {
        return Err(HubError::InvalidState(format!(
            "no pending join request for {} in {room_id}",
            conn.user_id()
        )));
    }

    conn.set_room(Some(room_id.clone()));
    debug!(room_id = %room_id, user_id = %conn.user_id(), "Waiting connection rebound");
    Ok(())
}

/// Handle `approve-join-request` (host only).
pub async fn approve(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    target_user_id: String,
    approver_user_id: String,
) -> Result<(), HubError> {
    let target = target_user_id.trim().to_string();
    let room = lookup(hub, &room_id).await?;
    verify_host(conn, &room, &approver_user_id)?;

    let mut state = room.state.lock().await;
    match state.approve(&target) {
        Ok(ApproveOutcome::Approved { conn_id }) => {
            info!(room_id = %room_id, user_id = %target, "Join request approved");
            if let Some(target_conn) = conn_id {
                hub.send_to(
                    target_conn,
                    ServerEvent::JoinApproved {
                        room_id: room_id.clone(),
                        is_host: false,
                        message: Some("admitted".into()),
                        pending_requests: None,
                    },
                );
            }
            conn.send(ServerEvent::JoinRequestProcessed {
                room_id,
                user_id: target,
                action: JoinAction::Approved,
            });
            Ok(())
        }
        Ok(ApproveOutcome::AlreadyApproved) => {
            debug!(room_id = %room_id, user_id = %target, "Approve of approved user ignored");
            conn.send(ServerEvent::JoinRequestProcessed {
                room_id,
                user_id: target,
                action: JoinAction::Approved,
            });
            Ok(())
        }
        Err(e) => Err(HubError::InvalidState(e.to_string())),
    }
}

/// Handle `deny-join-request` (host only).
pub async fn deny(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    target_user_id: String,
    reason: Option<String>,
    approver_user_id: String,
) -> Result<(), HubError> {
    let target = target_user_id.trim().to_string();
    let reason = reason.unwrap_or_else(|| DEFAULT_DENY_REASON.into());
    let room = lookup(hub, &room_id).await?;
    verify_host(conn, &room, &approver_user_id)?;

    let mut state = room.state.lock().await;
    match state.deny(&target, reason.clone(), Utc::now()) {
        Ok(DenyOutcome::Denied { conn_id }) => {
            info!(room_id = %room_id, user_id = %target, "Join request denied");
            if let Some(target_conn) = conn_id {
                hub.send_to(
                    target_conn,
                    ServerEvent::JoinDenied {
                        room_id: room_id.clone(),
                        reason,
                        permanent: false,
                    },
                );
            }
            conn.send(ServerEvent::JoinRequestProcessed {
                room_id,
                user_id: target,
                action: JoinAction::Denied,
            });
            Ok(())
        }
        Ok(DenyOutcome::Ignored) => {
            // Approvals are terminal; an approved user cannot be denied.
            warn!(room_id = %room_id, user_id = %target, "Deny of approved user ignored");
            Ok(())
        }
        Err(e) => Err(HubError::InvalidState(e.to_string())),
    }
}

/// Handle `admit-all-waiting` (host only): approve the entire queue
/// atomically.
pub async fn admit_all(
    hub: &Hub,
    conn: &Arc<ConnHandle>,
    room_id: String,
    approver_user_id: String,
) -> Result<(), HubError> {
    let room = lookup(hub, &room_id).await?;
    verify_host(conn, &room, &approver_user_id)?;

    let mut state = room.state.lock().await;
    let admitted = state.admit_all();
    let count = admitted.len();

    for request in admitted {
        if let Some(target_conn) = request.conn_id {
            hub.send_to(
                target_conn,
                ServerEvent::JoinApproved {
                    room_id: room_id.clone(),
                    is_host: false,
                    message: Some("admitted".into()),
                    pending_requests: None,
                },
            );
        }
    }

    info!(room_id = %room_id, count, "All waiting users admitted");
    conn.send(ServerEvent::AllAdmitted { room_id, count });
    Ok(())
}

/// Look up a live room.
async fn lookup(hub: &Hub, room_id: &str) -> Result<Arc<Room>, HubError> {
    hub.registry()
        .get(room_id)
        .await
        .ok_or_else(|| HubError::UnknownRoom(room_id.to_string()))
}

/// The double authorization check for host-only admission actions: the
/// asserted approver must be the authenticated user, and the
/// authenticated user must be the room's host.
fn verify_host(conn: &ConnHandle, room: &Room, asserted_approver: &str) -> Result<(), HubError> {
    let asserted = asserted_approver.trim();
    if conn.user_id() != asserted {
        return Err(HubError::Authorization(
            "approver does not match the authenticated identity".into(),
        ));
    }
    if asserted != room.host_user_id {
        return Err(HubError::Authorization(
            "only the host may manage join requests".into(),
        ));
    }
    Ok(())
}

/// Confirm the meeting record exists in the store layer; purely
/// informational, the room does not depend on it.
fn spawn_meeting_lookup(hub: &Hub, room_id: &str) {
    let store = hub.store().clone();
    let room_id = room_id.to_string();
    tokio::spawn(async move {
        match store.fetch_meeting(&room_id).await {
            Ok(Some(meeting)) => {
                debug!(room_id = %room_id, title = ?meeting.title, "Meeting record found");
            }
            Ok(None) => {
                debug!(room_id = %room_id, "No meeting record in store");
            }
            Err(e) => {
                debug!(room_id = %room_id, error = %e, "Meeting record lookup failed");
            }
        }
    });
}

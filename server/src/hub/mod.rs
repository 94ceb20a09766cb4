//! Meeting Hub
//!
//! The stateful core of the server: routes every client event to the room
//! it concerns, owns the room registry and the connection index, and
//! contains failures so one poisoned room never affects another.
//!
//! Concurrency model: each room's mutex is its logical serializer — events
//! for one room are processed in arrival order, distinct rooms run in
//! parallel. All outbound delivery is a non-blocking enqueue onto the
//! target connection's bounded egress queue, so broadcasts performed under
//! the room lock give every recipient the same per-room event order. The
//! hub never blocks on a slow client; an overflowing queue force-closes
//! the connection.

pub mod admission;
pub mod error;
pub mod fanout;
pub mod registry;
pub mod room;
pub mod signaling;
pub mod sweeper;
pub mod transcript;


use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::Identity;
use crate::config::Config;
use crate::store::MeetingStore;
use crate::ws::proto::{ClientEvent, ServerEvent};

use self::error::HubError;
use self::registry::RoomRegistry;
use self::room::RoomState;

/// One registered client connection: the authenticated identity, the
/// egress queue, and the room the connection is currently bound to.
pub struct ConnHandle {
    /// Server-assigned connection ID; not stable across reconnects.
    pub conn_id: Uuid,
    identity: Identity,
    tx: mpsc::Sender<ServerEvent>,
    shutdown: CancellationToken,
    room_id: RwLock<Option<String>>,
}

impl ConnHandle {
    /// Authenticated user ID. Hub handlers trust this binding, never
    /// client-supplied user fields.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    /// Authenticated display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.identity.display_name
    }

    /// Room this connection is currently bound to (as participant or
    /// waiting requester).
    #[must_use]
    pub fn room_id(&self) -> Option<String> {
        self.room_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_room(&self, room_id: Option<String>) {
        *self
            .room_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = room_id;
    }

    /// Enqueue an event for delivery. Non-blocking: a full queue
    /// force-closes the connection, which the client sees as a lost
    /// connection and reconnects. This is the only place messages are
    /// dropped.
    pub fn send(&self, event: ServerEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    conn_id = %self.conn_id,
                    user_id = %self.identity.user_id,
                    "Egress queue overflow, force-closing connection"
                );
                self.shutdown.cancel();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// The signaling and admission-control hub.
pub struct Hub {
    config: Arc<Config>,
    store: MeetingStore,
    registry: RoomRegistry,
    conns: DashMap<Uuid, Arc<ConnHandle>>,
}

impl Hub {
    #[must_use]
    pub fn new(config: Arc<Config>, store: MeetingStore) -> Self {
        Self {
            config,
            store,
            registry: RoomRegistry::new(),
            conns: DashMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub(crate) fn store(&self) -> &MeetingStore {
        &self.store
    }

    /// Register a freshly authenticated connection. The `ready` event is
    /// enqueued before this returns, so it precedes any reply to inbound
    /// frames.
    pub fn connect(
        &self,
        conn_id: Uuid,
        identity: Identity,
        tx: mpsc::Sender<ServerEvent>,
        shutdown: CancellationToken,
    ) -> Arc<ConnHandle> {
        let conn = Arc::new(ConnHandle {
            conn_id,
            identity,
            tx,
            shutdown,
            room_id: RwLock::new(None),
        });
        self.conns.insert(conn_id, conn.clone());
        conn.send(ServerEvent::Ready {
            conn_id,
            user_id: conn.user_id().to_string(),
        });
        conn
    }

    /// Look up a live connection.
    #[must_use]
    pub fn conn(&self, conn_id: Uuid) -> Option<Arc<ConnHandle>> {
        self.conns.get(&conn_id).map(|entry| entry.value().clone())
    }

    /// Enqueue an event for one connection, if it is still live.
    pub fn send_to(&self, conn_id: Uuid, event: ServerEvent) {
        if let Some(conn) = self.conns.get(&conn_id) {
            conn.send(event);
        }
    }

    /// Enqueue an event for every participant of a room, optionally
    /// excluding one connection. Called under the room lock; enqueues are
    /// non-blocking, so all recipients observe the same per-room order.
    pub(crate) fn broadcast_room(
        &self,
        state: &RoomState,
        event: &ServerEvent,
        exclude: Option<Uuid>,
    ) {
        for conn_id in state.participants.keys() {
            if Some(*conn_id) == exclude {
                continue;
            }
            self.send_to(*conn_id, event.clone());
        }
    }

    /// A room is abandoned once it has no participants, no waiting
    /// requests, and no live host connection (a host that has requested
    /// to join but not yet entered still holds the room open).
    pub(crate) fn is_abandoned(&self, state: &RoomState) -> bool {
        state.is_empty()
            && !state
                .host_conn_id
                .is_some_and(|conn_id| self.conns.contains_key(&conn_id))
    }

    /// Route one client event. Handler errors go back to the offending
    /// connection as `error` events; a panic destroys only the room the
    /// event addressed.
    pub async fn dispatch(&self, conn: &Arc<ConnHandle>, event: ClientEvent) {
        let room_id = event.room_id().map(str::to_string).or_else(|| conn.room_id());

        match AssertUnwindSafe(self.dispatch_inner(conn, event))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(
                    conn_id = %conn.conn_id,
                    user_id = %conn.user_id(),
                    error = %err,
                    "Rejected client event"
                );
                conn.send(err.to_event());
            }
            Err(_panic) => {
                error!(
                    conn_id = %conn.conn_id,
                    room_id = ?room_id,
                    "Event handler panicked, destroying the affected room"
                );
                conn.send(HubError::Internal("internal error".into()).to_event());
                if let Some(room_id) = room_id {
                    self.destroy_room(&room_id, "internal error").await;
                }
            }
        }
    }

    async fn dispatch_inner(
        &self,
        conn: &Arc<ConnHandle>,
        event: ClientEvent,
    ) -> Result<(), HubError> {
        match event {
            ClientEvent::Ping => {
                conn.send(ServerEvent::Pong);
                Ok(())
            }

            // Admission: client-asserted user_id/user_name are ignored in
            // favor of the connection's authenticated identity.
            ClientEvent::RequestJoinRoom {
                room_id, is_rejoin, ..
            } => admission::request_join(self, conn, room_id, is_rejoin).await,
            ClientEvent::UpdateWaitingSocket { room_id, .. } => {
                admission::update_waiting_socket(self, conn, room_id).await
            }
            ClientEvent::ApproveJoinRequest {
                room_id,
                user_id,
                approver_user_id,
            } => admission::approve(self, conn, room_id, user_id, approver_user_id).await,
            ClientEvent::DenyJoinRequest {
                room_id,
                user_id,
                reason,
                approver_user_id,
            } => admission::deny(self, conn, room_id, user_id, reason, approver_user_id).await,
            ClientEvent::AdmitAllWaiting {
                room_id,
                approver_user_id,
            } => admission::admit_all(self, conn, room_id, approver_user_id).await,

            // Membership and side-channel fanout.
            ClientEvent::JoinRoom {
                room_id,
                media_state,
                ..
            } => fanout::join_room(self, conn, room_id, media_state).await,
            ClientEvent::LeaveRoom { room_id, .. } => {
                fanout::leave_room(self, conn, room_id).await
            }
            ClientEvent::EndMeeting { room_id } => fanout::end_meeting(self, conn, room_id).await,
            ClientEvent::ToggleMedia {
                room_id,
                media_type,
                enabled,
            } => fanout::toggle_media(self, conn, room_id, media_type, enabled).await,
            ClientEvent::RecordingStatus {
                room_id,
                is_recording,
                ..
            } => fanout::recording_status(self, conn, room_id, is_recording).await,
            ClientEvent::SendMessage {
                room_id, message, ..
            } => fanout::send_message(self, conn, room_id, message).await,

            // Signaling: relayed verbatim, attributed to the sender's
            // authenticated identity.
            ClientEvent::Offer {
                to, from, payload, ..
            } => {
                let event = ServerEvent::Offer {
                    from,
                    payload,
                    user_name: conn.display_name().to_string(),
                    user_id: conn.user_id().to_string(),
                };
                signaling::relay(self, conn, to, from, event).await
            }
            ClientEvent::Answer {
                to, from, payload, ..
            } => {
                let event = ServerEvent::Answer {
                    from,
                    payload,
                    user_name: conn.display_name().to_string(),
                    user_id: conn.user_id().to_string(),
                };
                signaling::relay(self, conn, to, from, event).await
            }
            ClientEvent::IceCandidate {
                to,
                from,
                candidate,
            } => {
                let event = ServerEvent::IceCandidate { from, candidate };
                signaling::relay(self, conn, to, from, event).await
            }
            ClientEvent::RequestRenegotiation { to, from } => {
                let event = ServerEvent::RenegotiationNeeded { from };
                signaling::relay(self, conn, to, from, event).await
            }

            // Transcription.
            ClientEvent::TranscriptionEntry {
                room_id,
                entry_id,
                user_id,
                text,
                timestamp,
                seconds_into_meeting,
                confidence,
                ..
            } => {
                transcript::entry(
                    self,
                    conn,
                    room_id,
                    entry_id,
                    user_id,
                    text,
                    timestamp,
                    seconds_into_meeting,
                    confidence,
                )
                .await
            }
            ClientEvent::TranscriptionInterim {
                room_id,
                user_id,
                text,
                ..
            } => transcript::interim(self, conn, room_id, user_id, text).await,
            ClientEvent::RequestTranscriptionHistory { room_id } => {
                transcript::history(self, conn, room_id).await
            }
            ClientEvent::SetMeetingStartTime {
                room_id,
                start_time,
            } => transcript::set_meeting_start_time(self, conn, room_id, start_time).await,
            ClientEvent::RequestMeetingStartTime { room_id } => {
                transcript::request_meeting_start_time(self, conn, room_id).await
            }
        }
    }

    /// Unregister a connection. Delivered exactly once per connection by
    /// the transport gateway; also invoked for logical disconnects.
    pub async fn disconnect(&self, conn_id: Uuid) {
        let Some((_, conn)) = self.conns.remove(&conn_id) else {
            return;
        };
        info!(conn_id = %conn_id, user_id = %conn.user_id(), "Connection unregistered");

        let Some(room_id) = conn.room_id() else {
            return;
        };
        let Some(room) = self.registry.get(&room_id).await else {
            return;
        };

        let abandoned = fanout::depart(self, &room, conn_id).await;
        if abandoned {
            self.destroy_room(&room_id, "abandoned").await;
        }
    }

    /// Tear a room down: notify every participant and waiting requester,
    /// drop the room from the registry, and hand the transcript to the
    /// meeting store. The store call runs on its own task; no room lock
    /// is held across it.
    pub async fn destroy_room(&self, room_id: &str, reason: &str) {
        let Some(room) = self.registry.remove(room_id).await else {
            return;
        };

        let (targets, transcript) = {
            let mut state = room.state.lock().await;
            let mut targets: Vec<Uuid> = state.participants.keys().copied().collect();
            targets.extend(state.pending_requests.iter().filter_map(|r| r.conn_id));
            (targets, state.take_transcript())
        };

        let event = ServerEvent::MeetingEnded {
            room_id: room.room_id.clone(),
            reason: reason.to_string(),
        };
        for conn_id in targets {
            if let Some(conn) = self.conns.get(&conn_id) {
                conn.set_room(None);
                conn.send(event.clone());
            }
        }

        info!(room_id = %room.room_id, reason = %reason, "Room destroyed");

        if !transcript.is_empty() {
            let store = self.store.clone();
            let room_id = room.room_id.clone();
            tokio::spawn(async move {
                if let Err(e) = store.persist_transcript(&room_id, &transcript).await {
                    warn!(room_id = %room_id, error = %e, "Failed to persist transcript");
                }
            });
        }
    }
}

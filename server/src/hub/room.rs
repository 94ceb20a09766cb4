//! Room State
//!
//! The aggregate state of one meeting and the admission state machine over
//! it. All mutations happen under the room's mutex, which is the room's
//! logical serializer; the methods here are pure state transitions that
//! return typed outcomes, leaving I/O to the handlers that drive them.
//!
//! Admission states for a (room, user) pair: Unknown -> Pending ->
//! {Approved | Denied | Expired}. Approved is terminal for the life of the
//! room. A user is in at most one of {approved, pending, denied} at any
//! time.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ws::proto::{MediaKind, MediaState, ParticipantSummary, PendingSummary, TranscriptEntry};

/// One meeting room. The host identity is fixed at creation; everything
/// else lives behind the state mutex.
pub struct Room {
    /// Room ID (opaque, UUID-shaped).
    pub room_id: String,
    /// The first user to enter; holds admission authority for the room's
    /// lifetime.
    pub host_user_id: String,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
    /// Mutable room state; the per-room serializer.
    pub state: Mutex<RoomState>,
}

impl Room {
    /// Create a room with its host already approved.
    #[must_use]
    pub fn new(room_id: String, host_user_id: String, host_conn_id: Uuid) -> Self {
        let state = RoomState {
            host_conn_id: Some(host_conn_id),
            waiting_room_enabled: true,
            approved_users: HashSet::from([host_user_id.clone()]),
            ..RoomState::default()
        };

        Self {
            room_id,
            host_user_id,
            created_at: Utc::now(),
            state: Mutex::new(state),
        }
    }
}

/// One live connection inside a room.
#[derive(Debug, Clone)]
pub struct Participant {
    pub conn_id: Uuid,
    pub user_id: String,
    pub display_name: String,
    pub is_host: bool,
    pub media_state: MediaState,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    #[must_use]
    pub fn summary(&self) -> ParticipantSummary {
        ParticipantSummary {
            conn_id: self.conn_id,
            user_id: self.user_id.clone(),
            user_name: self.display_name.clone(),
            is_host: self.is_host,
            media_state: self.media_state,
        }
    }
}

/// A user waiting for a host decision. Keyed by user ID so refreshes do
/// not duplicate queue entries; `conn_id` is `None` while the requester's
/// socket is down.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub user_id: String,
    pub display_name: String,
    pub conn_id: Option<Uuid>,
    pub requested_at: DateTime<Utc>,
}

impl PendingRequest {
    #[must_use]
    pub fn summary(&self) -> PendingSummary {
        PendingSummary {
            user_id: self.user_id.clone(),
            user_name: self.display_name.clone(),
            requested_at: self.requested_at,
        }
    }
}

/// A denial, sticky until the room is destroyed.
#[derive(Debug, Clone)]
pub struct DenyRecord {
    pub user_id: String,
    pub denied_at: DateTime<Utc>,
    pub reason: String,
}

/// An in-progress caption; one slot per speaker, overwritten in place.
#[derive(Debug, Clone)]
pub struct InterimEntry {
    pub user_id: String,
    pub display_name: String,
    pub text: String,
    pub last_update: DateTime<Utc>,
}

/// Mutable state of a room.
#[derive(Debug, Default)]
pub struct RoomState {
    /// Connection the host is currently on; stale (not in `participants`)
    /// while the host is disconnected.
    pub host_conn_id: Option<Uuid>,
    /// When false, unknown users are admitted without host approval.
    pub waiting_room_enabled: bool,
    /// Set once by the host; later writes are ignored.
    pub meeting_start_time: Option<DateTime<Utc>>,
    /// Users allowed into the room. Always contains the host.
    pub approved_users: HashSet<String>,
    /// Sticky denials, by user ID.
    pub denied_users: HashMap<String, DenyRecord>,
    /// Waiting queue in arrival order, at most one entry per user ID.
    pub pending_requests: Vec<PendingRequest>,
    /// Live participants by connection ID.
    pub participants: HashMap<Uuid, Participant>,
    transcript_log: Vec<TranscriptEntry>,
    transcript_ids: HashSet<String>,
    /// Live captions, one slot per speaker.
    pub interim_by_user: HashMap<String, InterimEntry>,
}

/// Outcome of a join request.
#[derive(Debug)]
pub enum JoinDecision {
    /// Caller is the host; its connection was rebound.
    Host { pending: Vec<PendingSummary> },
    /// Caller is approved and may enter.
    Approved { rejoin: bool },
    /// Caller was previously denied; denial is sticky.
    Denied { reason: String },
    /// Caller is already waiting and retried within the dedup window; the
    /// host is not notified again.
    DuplicateWait { position: usize },
    /// Caller was queued (or re-queued after the window elapsed).
    Queued {
        position: usize,
        requested_at: DateTime<Utc>,
        notify_host: Option<Uuid>,
    },
}

/// Outcome of a host approval.
#[derive(Debug)]
pub enum ApproveOutcome {
    /// Moved to approved; `conn_id` is the waiting connection, if any.
    Approved { conn_id: Option<Uuid> },
    /// Already approved; nothing changed.
    AlreadyApproved,
}

/// Outcome of a host denial.
#[derive(Debug)]
pub enum DenyOutcome {
    /// Moved to denied; `conn_id` is the waiting connection, if any.
    Denied { conn_id: Option<Uuid> },
    /// The user is approved; approvals are terminal and the denial is
    /// ignored.
    Ignored,
}

/// Invalid admission transitions.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("No join request from {0}")]
    NotPending(String),
}

impl RoomState {
    /// Decide a join request. The admission state machine entry point;
    /// callers pass the room's immutable host identity and the
    /// authenticated requester identity.
    pub fn decide_join(
        &mut self,
        host_user_id: &str,
        user_id: &str,
        display_name: &str,
        conn_id: Uuid,
        now: DateTime<Utc>,
        dedup_window: Duration,
    ) -> JoinDecision {
        if user_id == host_user_id {
            self.host_conn_id = Some(conn_id);
            self.approved_users.insert(user_id.to_string());
            return JoinDecision::Host {
                pending: self.pending_summaries(),
            };
        }

        if let Some(record) = self.denied_users.get(user_id) {
            return JoinDecision::Denied {
                reason: record.reason.clone(),
            };
        }

        if self.approved_users.contains(user_id) {
            let rejoin = self.participants.values().any(|p| p.user_id == user_id);
            return JoinDecision::Approved { rejoin };
        }

        if !self.waiting_room_enabled {
            self.approved_users.insert(user_id.to_string());
            return JoinDecision::Approved { rejoin: false };
        }

        if let Some(index) = self.pending_index(user_id) {
            let request = &mut self.pending_requests[index];
            request.conn_id = Some(conn_id);
            if now.signed_duration_since(request.requested_at) < dedup_window {
                return JoinDecision::DuplicateWait {
                    position: index + 1,
                };
            }
            request.requested_at = now;
            return JoinDecision::Queued {
                position: index + 1,
                requested_at: now,
                notify_host: self.host_conn_id,
            };
        }

        self.pending_requests.push(PendingRequest {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            conn_id: Some(conn_id),
            requested_at: now,
        });
        JoinDecision::Queued {
            position: self.pending_requests.len(),
            requested_at: now,
            notify_host: self.host_conn_id,
        }
    }

    /// Approve a user. Pending requests move to approved; a standing
    /// denial is cleared. Approving an approved user is a no-op.
    pub fn approve(&mut self, user_id: &str) -> Result<ApproveOutcome, AdmissionError> {
        if self.approved_users.contains(user_id) {
            return Ok(ApproveOutcome::AlreadyApproved);
        }

        if let Some(index) = self.pending_index(user_id) {
            let request = self.pending_requests.remove(index);
            self.denied_users.remove(user_id);
            self.approved_users.insert(request.user_id);
            return Ok(ApproveOutcome::Approved {
                conn_id: request.conn_id,
            });
        }

        if self.denied_users.remove(user_id).is_some() {
            self.approved_users.insert(user_id.to_string());
            return Ok(ApproveOutcome::Approved { conn_id: None });
        }

        Err(AdmissionError::NotPending(user_id.to_string()))
    }

    /// Deny a pending user. Approved users cannot be denied; the denial
    /// is ignored.
    pub fn deny(
        &mut self,
        user_id: &str,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<DenyOutcome, AdmissionError> {
        if self.approved_users.contains(user_id) {
            return Ok(DenyOutcome::Ignored);
        }

        let Some(index) = self.pending_index(user_id) else {
            return Err(AdmissionError::NotPending(user_id.to_string()));
        };

        let request = self.pending_requests.remove(index);
        self.denied_users.insert(
            request.user_id.clone(),
            DenyRecord {
                user_id: request.user_id,
                denied_at: now,
                reason,
            },
        );
        Ok(DenyOutcome::Denied {
            conn_id: request.conn_id,
        })
    }

    /// Approve every pending request at once. Returns the drained queue.
    pub fn admit_all(&mut self) -> Vec<PendingRequest> {
        let drained: Vec<PendingRequest> = self.pending_requests.drain(..).collect();
        for request in &drained {
            self.denied_users.remove(&request.user_id);
            self.approved_users.insert(request.user_id.clone());
        }
        drained
    }

    /// Rebind a waiting request to a new connection without resetting its
    /// age or notifying the host again.
    pub fn update_waiting_conn(&mut self, user_id: &str, conn_id: Uuid) -> bool {
        match self.pending_index(user_id) {
            Some(index) => {
                self.pending_requests[index].conn_id = Some(conn_id);
                true
            }
            None => false,
        }
    }

    /// Remove and return requests that have been pending for `ttl` or
    /// longer.
    pub fn expire_pending(&mut self, now: DateTime<Utc>, ttl: Duration) -> Vec<PendingRequest> {
        let mut expired = Vec::new();
        self.pending_requests.retain(|request| {
            if now.signed_duration_since(request.requested_at) >= ttl {
                expired.push(request.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Null the connection of any state owned by a disconnecting socket.
    /// The pending request itself survives for reattachment or expiry.
    pub fn detach_conn(&mut self, conn_id: Uuid) {
        for request in &mut self.pending_requests {
            if request.conn_id == Some(conn_id) {
                request.conn_id = None;
            }
        }
        if self.host_conn_id == Some(conn_id) {
            self.host_conn_id = None;
        }
    }

    /// Add a live participant, replacing any stale connection the same
    /// user had. Returns the replaced participant.
    pub fn add_participant(&mut self, participant: Participant) -> Option<Participant> {
        let stale_conn = self
            .participants
            .values()
            .find(|p| p.user_id == participant.user_id && p.conn_id != participant.conn_id)
            .map(|p| p.conn_id);

        let replaced = stale_conn.and_then(|conn_id| self.participants.remove(&conn_id));
        self.participants.insert(participant.conn_id, participant);
        replaced
    }

    /// Remove a participant by connection ID.
    pub fn remove_participant(&mut self, conn_id: Uuid) -> Option<Participant> {
        self.participants.remove(&conn_id)
    }

    /// Flip one media track of the participant on `conn_id`. Returns the
    /// participant's user ID.
    pub fn toggle_media(
        &mut self,
        conn_id: Uuid,
        media_type: MediaKind,
        enabled: bool,
    ) -> Option<String> {
        let participant = self.participants.get_mut(&conn_id)?;
        match media_type {
            MediaKind::Audio => participant.media_state.audio = enabled,
            MediaKind::Video => participant.media_state.video = enabled,
        }
        Some(participant.user_id.clone())
    }

    /// Summaries of everyone in the room except one connection.
    #[must_use]
    pub fn participant_summaries_except(&self, conn_id: Uuid) -> Vec<ParticipantSummary> {
        let mut summaries: Vec<ParticipantSummary> = self
            .participants
            .values()
            .filter(|p| p.conn_id != conn_id)
            .map(Participant::summary)
            .collect();
        summaries.sort_by_key(|s| s.conn_id);
        summaries
    }

    /// Waiting queue in arrival order.
    #[must_use]
    pub fn pending_summaries(&self) -> Vec<PendingSummary> {
        self.pending_requests
            .iter()
            .map(PendingRequest::summary)
            .collect()
    }

    /// Append a finalized transcription entry. Returns false for a
    /// duplicate `entry_id`. A final clears the speaker's interim slot.
    pub fn append_final(&mut self, entry: TranscriptEntry) -> bool {
        if !self.transcript_ids.insert(entry.entry_id.clone()) {
            return false;
        }
        self.interim_by_user.remove(&entry.user_id);
        self.transcript_log.push(entry);
        true
    }

    /// Overwrite (or clear, when `text` is empty) the speaker's interim
    /// caption slot.
    pub fn set_interim(
        &mut self,
        user_id: &str,
        display_name: &str,
        text: &str,
        now: DateTime<Utc>,
    ) {
        if text.is_empty() {
            self.interim_by_user.remove(user_id);
            return;
        }
        self.interim_by_user.insert(
            user_id.to_string(),
            InterimEntry {
                user_id: user_id.to_string(),
                display_name: display_name.to_string(),
                text: text.to_string(),
                last_update: now,
            },
        );
    }

    /// The transcript log, in server append order.
    #[must_use]
    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript_log
    }

    /// Drain the transcript log for persistence at room teardown.
    pub fn take_transcript(&mut self) -> Vec<TranscriptEntry> {
        self.transcript_ids.clear();
        self.interim_by_user.clear();
        std::mem::take(&mut self.transcript_log)
    }

    /// Record the meeting start time. Only the first write takes effect.
    pub fn set_meeting_start_time(&mut self, start_time: DateTime<Utc>) -> bool {
        if self.meeting_start_time.is_some() {
            return false;
        }
        self.meeting_start_time = Some(start_time);
        true
    }

    /// A room with no participants and no waiting requests is dead.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty() && self.pending_requests.is_empty()
    }

    fn pending_index(&self, user_id: &str) -> Option<usize> {
        self.pending_requests
            .iter()
            .position(|request| request.user_id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "host-user";
    const GUEST: &str = "guest-user";

    fn window() -> Duration {
        Duration::seconds(5)
    }

    /// Fresh room state as created by `Room::new`, unwrapped for
    /// synchronous state-machine tests.
    fn new_state() -> RoomState {
        Room::new("room-1".into(), HOST.into(), Uuid::new_v4())
            .state
            .into_inner()
    }

    /// A user ID must never appear in more than one admission set.
    fn assert_admission_exclusive(state: &RoomState, user_id: &str) {
        let sets = [
            state.approved_users.contains(user_id),
            state
                .pending_requests
                .iter()
                .any(|r| r.user_id == user_id),
            state.denied_users.contains_key(user_id),
        ];
        assert!(
            sets.iter().filter(|present| **present).count() <= 1,
            "{user_id} is in more than one admission set"
        );
    }

    #[test]
    fn test_new_room_approves_host() {
        let state = new_state();

        assert!(state.approved_users.contains(HOST));
        assert!(state.waiting_room_enabled);
        assert!(state.host_conn_id.is_some());
    }

    #[test]
    fn test_unknown_user_is_queued_and_host_notified() {
        let mut state = new_state();
        let host_conn = state.host_conn_id;

        let decision = state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), Utc::now(), window());

        match decision {
            JoinDecision::Queued {
                position,
                notify_host,
                ..
            } => {
                assert_eq!(position, 1);
                assert_eq!(notify_host, host_conn);
            }
            other => panic!("expected Queued, got {other:?}"),
        }
        assert_admission_exclusive(&state, GUEST);
    }

    #[test]
    fn test_retry_within_window_is_duplicate() {
        let mut state = new_state();
        let now = Utc::now();

        state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), now, window());
        let retry = state.decide_join(
            HOST,
            GUEST,
            "Guest",
            Uuid::new_v4(),
            now + Duration::seconds(2),
            window(),
        );

        assert!(matches!(
            retry,
            JoinDecision::DuplicateWait { position: 1 }
        ));
        assert_eq!(state.pending_requests.len(), 1);
    }

    #[test]
    fn test_retry_after_window_requeues_and_renotifies() {
        let mut state = new_state();
        let now = Utc::now();

        state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), now, window());
        let later = now + Duration::seconds(6);
        let retry = state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), later, window());

        match retry {
            JoinDecision::Queued {
                requested_at,
                notify_host,
                ..
            } => {
                assert_eq!(requested_at, later);
                assert!(notify_host.is_some());
            }
            other => panic!("expected Queued, got {other:?}"),
        }
        assert_eq!(state.pending_requests.len(), 1);
        assert_eq!(state.pending_requests[0].requested_at, later);
    }

    #[test]
    fn test_host_rejoin_rebinds_conn_and_snapshots_queue() {
        let mut state = new_state();
        state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), Utc::now(), window());

        let new_conn = Uuid::new_v4();
        let decision = state.decide_join(HOST, HOST, "Host", new_conn, Utc::now(), window());

        match decision {
            JoinDecision::Host { pending } => {
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].user_id, GUEST);
            }
            other => panic!("expected Host, got {other:?}"),
        }
        assert_eq!(state.host_conn_id, Some(new_conn));
    }

    #[test]
    fn test_approve_moves_pending_to_approved() {
        let mut state = new_state();
        let guest_conn = Uuid::new_v4();
        state.decide_join(HOST, GUEST, "Guest", guest_conn, Utc::now(), window());

        let outcome = state.approve(GUEST).unwrap();

        assert!(matches!(
            outcome,
            ApproveOutcome::Approved {
                conn_id: Some(c)
            } if c == guest_conn
        ));
        assert!(state.approved_users.contains(GUEST));
        assert!(state.pending_requests.is_empty());
        assert_admission_exclusive(&state, GUEST);
    }

    #[test]
    fn test_second_approve_is_noop() {
        let mut state = new_state();
        state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), Utc::now(), window());
        state.approve(GUEST).unwrap();

        let outcome = state.approve(GUEST).unwrap();

        assert!(matches!(outcome, ApproveOutcome::AlreadyApproved));
    }

    #[test]
    fn test_approve_unknown_user_is_invalid() {
        let mut state = new_state();

        assert!(matches!(
            state.approve("nobody"),
            Err(AdmissionError::NotPending(_))
        ));
    }

    #[test]
    fn test_approve_clears_standing_denial() {
        let mut state = new_state();
        state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), Utc::now(), window());
        state.deny(GUEST, "no".into(), Utc::now()).unwrap();

        let outcome = state.approve(GUEST).unwrap();

        assert!(matches!(outcome, ApproveOutcome::Approved { conn_id: None }));
        assert!(state.denied_users.is_empty());
        assert!(state.approved_users.contains(GUEST));
        assert_admission_exclusive(&state, GUEST);
    }

    #[test]
    fn test_denial_is_sticky_for_rejoin() {
        let mut state = new_state();
        state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), Utc::now(), window());
        state.deny(GUEST, "no".into(), Utc::now()).unwrap();

        let decision = state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), Utc::now(), window());

        assert!(matches!(
            decision,
            JoinDecision::Denied { reason } if reason == "no"
        ));
        assert_admission_exclusive(&state, GUEST);
    }

    #[test]
    fn test_deny_of_approved_user_is_ignored() {
        let mut state = new_state();
        state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), Utc::now(), window());
        state.approve(GUEST).unwrap();

        let outcome = state.deny(GUEST, "no".into(), Utc::now()).unwrap();

        assert!(matches!(outcome, DenyOutcome::Ignored));
        assert!(state.approved_users.contains(GUEST));
        assert!(state.denied_users.is_empty());
    }

    #[test]
    fn test_admit_all_drains_queue() {
        let mut state = new_state();
        let now = Utc::now();
        state.decide_join(HOST, "u1", "One", Uuid::new_v4(), now, window());
        state.decide_join(HOST, "u2", "Two", Uuid::new_v4(), now, window());
        state.decide_join(HOST, "u3", "Three", Uuid::new_v4(), now, window());

        let admitted = state.admit_all();

        assert_eq!(admitted.len(), 3);
        assert!(state.pending_requests.is_empty());
        for user in ["u1", "u2", "u3"] {
            assert!(state.approved_users.contains(user));
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let mut state = new_state();
        let ttl = Duration::minutes(5);
        let now = Utc::now();
        state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), now, window());

        // One second short of the TTL: still pending.
        let expired = state.expire_pending(now + ttl - Duration::seconds(1), ttl);
        assert!(expired.is_empty());
        assert_eq!(state.pending_requests.len(), 1);

        // Exactly at the TTL: expired.
        let expired = state.expire_pending(now + ttl, ttl);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user_id, GUEST);
        assert!(state.pending_requests.is_empty());
    }

    #[test]
    fn test_detach_keeps_pending_request() {
        let mut state = new_state();
        let guest_conn = Uuid::new_v4();
        state.decide_join(HOST, GUEST, "Guest", guest_conn, Utc::now(), window());

        state.detach_conn(guest_conn);

        assert_eq!(state.pending_requests.len(), 1);
        assert!(state.pending_requests[0].conn_id.is_none());

        let rebound = Uuid::new_v4();
        assert!(state.update_waiting_conn(GUEST, rebound));
        assert_eq!(state.pending_requests[0].conn_id, Some(rebound));
    }

    #[test]
    fn test_rejoining_participant_replaces_stale_conn() {
        let mut state = new_state();
        let old_conn = Uuid::new_v4();
        let new_conn = Uuid::new_v4();
        let participant = |conn_id| Participant {
            conn_id,
            user_id: GUEST.into(),
            display_name: "Guest".into(),
            is_host: false,
            media_state: MediaState::default(),
            joined_at: Utc::now(),
        };

        assert!(state.add_participant(participant(old_conn)).is_none());
        let replaced = state.add_participant(participant(new_conn));

        assert_eq!(replaced.map(|p| p.conn_id), Some(old_conn));
        assert_eq!(state.participants.len(), 1);
        assert!(state.participants.contains_key(&new_conn));
    }

    #[test]
    fn test_transcript_dedups_by_entry_id() {
        let mut state = new_state();
        let entry = TranscriptEntry {
            entry_id: "e1".into(),
            user_id: GUEST.into(),
            user_name: "Guest".into(),
            text: "hello".into(),
            timestamp: Utc::now(),
            seconds_into_meeting: 1.5,
            confidence: 0.9,
        };

        assert!(state.append_final(entry.clone()));
        assert!(!state.append_final(entry));
        assert_eq!(state.transcript().len(), 1);
    }

    #[test]
    fn test_final_clears_interim_slot() {
        let mut state = new_state();
        let now = Utc::now();
        state.set_interim(GUEST, "Guest", "hel...", now);
        assert!(state.interim_by_user.contains_key(GUEST));

        state.append_final(TranscriptEntry {
            entry_id: "e1".into(),
            user_id: GUEST.into(),
            user_name: "Guest".into(),
            text: "hello".into(),
            timestamp: now,
            seconds_into_meeting: 0.0,
            confidence: 1.0,
        });

        assert!(!state.interim_by_user.contains_key(GUEST));
    }

    #[test]
    fn test_empty_interim_text_clears_slot() {
        let mut state = new_state();
        let now = Utc::now();

        state.set_interim(GUEST, "Guest", "something", now);
        state.set_interim(GUEST, "Guest", "", now);

        assert!(state.interim_by_user.is_empty());
    }

    #[test]
    fn test_meeting_start_time_first_write_wins() {
        let mut state = new_state();
        let first = Utc::now();
        let second = first + Duration::minutes(1);

        assert!(state.set_meeting_start_time(first));
        assert!(!state.set_meeting_start_time(second));
        assert_eq!(state.meeting_start_time, Some(first));
    }

    #[test]
    fn test_waiting_room_disabled_admits_unknown_users() {
        let mut state = new_state();
        state.waiting_room_enabled = false;

        let decision = state.decide_join(HOST, GUEST, "Guest", Uuid::new_v4(), Utc::now(), window());

        assert!(matches!(decision, JoinDecision::Approved { rejoin: false }));
        assert!(state.approved_users.contains(GUEST));
        assert!(state.pending_requests.is_empty());
    }
}

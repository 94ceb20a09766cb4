//! Wire Protocol
//!
//! JSON events exchanged with meeting clients over the WebSocket. Each
//! frame is `{ "type": <event name>, ...payload }`; event names are
//! kebab-case. The `to`/`from` fields of signaling events address live
//! connection IDs, which clients learn from `ready`, `existing-participants`
//! and `user-joined`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audio/video mute state for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaState {
    /// Microphone enabled.
    pub audio: bool,
    /// Camera enabled.
    pub video: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Which media track a toggle applies to.
///
/// Carried as `media_type` on the wire because the frame envelope already
/// uses the `type` key for the event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// How a join request was resolved by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinAction {
    Approved,
    Denied,
}

/// Live participant, as seen by peers in the same room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub conn_id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub is_host: bool,
    pub media_state: MediaState,
}

/// Waiting join request, as shown to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSummary {
    pub user_id: String,
    pub user_name: String,
    pub requested_at: DateTime<Utc>,
}

/// A finalized transcription utterance.
///
/// Entries are immutable once appended to a room's transcript log;
/// `entry_id` deduplicates client retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub entry_id: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    /// Wall-clock time of the utterance.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub seconds_into_meeting: f64,
    #[serde(default)]
    pub confidence: f64,
}

/// Client-to-server events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Ping for keepalive
    Ping,
    /// Ask to enter a room; creates the room (and the host role) if unknown
    RequestJoinRoom {
        room_id: String,
        user_id: String,
        user_name: String,
        #[serde(default)]
        is_rejoin: bool,
    },
    /// Rebind a waiting join request to this connection after a refresh
    UpdateWaitingSocket { room_id: String, user_id: String },
    /// Host approves a waiting user
    ApproveJoinRequest {
        room_id: String,
        user_id: String,
        approver_user_id: String,
    },
    /// Host denies a waiting user
    DenyJoinRequest {
        room_id: String,
        user_id: String,
        #[serde(default)]
        reason: Option<String>,
        approver_user_id: String,
    },
    /// Host approves every waiting user at once
    AdmitAllWaiting {
        room_id: String,
        approver_user_id: String,
    },
    /// Enter the room as a live participant (requires prior approval)
    JoinRoom {
        room_id: String,
        user_id: String,
        user_name: String,
        #[serde(default)]
        media_state: MediaState,
    },
    /// Leave the room
    LeaveRoom { room_id: String, user_id: String },
    /// Host ends the meeting for everyone
    EndMeeting { room_id: String },
    /// WebRTC offer relayed to one peer
    Offer {
        to: Uuid,
        from: Uuid,
        payload: serde_json::Value,
        user_name: String,
        user_id: String,
    },
    /// WebRTC answer relayed to one peer
    Answer {
        to: Uuid,
        from: Uuid,
        payload: serde_json::Value,
        user_name: String,
        user_id: String,
    },
    /// ICE candidate relayed to one peer
    IceCandidate {
        to: Uuid,
        from: Uuid,
        candidate: serde_json::Value,
    },
    /// Ask a peer to renegotiate its connection
    RequestRenegotiation { to: Uuid, from: Uuid },
    /// Announce a mute/unmute of one media track
    ToggleMedia {
        room_id: String,
        media_type: MediaKind,
        enabled: bool,
    },
    /// Announce local recording started/stopped
    RecordingStatus {
        room_id: String,
        is_recording: bool,
        user_name: String,
    },
    /// Ephemeral chat message (durable persistence is a REST concern)
    SendMessage {
        room_id: String,
        message: String,
        user_name: String,
    },
    /// Finalized transcription utterance
    TranscriptionEntry {
        room_id: String,
        entry_id: String,
        user_id: String,
        user_name: String,
        text: String,
        timestamp: DateTime<Utc>,
        #[serde(default)]
        seconds_into_meeting: f64,
        #[serde(default)]
        confidence: f64,
    },
    /// Live caption, overwritten in place per speaker
    TranscriptionInterim {
        room_id: String,
        user_id: String,
        user_name: String,
        text: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Fetch the room's transcript log
    RequestTranscriptionHistory { room_id: String },
    /// Host records when the meeting actually started (first write wins)
    SetMeetingStartTime {
        room_id: String,
        start_time: DateTime<Utc>,
    },
    /// Fetch the recorded meeting start time
    RequestMeetingStartTime { room_id: String },
}

impl ClientEvent {
    /// Room targeted by this event, if it names one.
    ///
    /// Signaling events address connections instead; their room is the
    /// sender's current room.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::RequestJoinRoom { room_id, .. }
            | Self::UpdateWaitingSocket { room_id, .. }
            | Self::ApproveJoinRequest { room_id, .. }
            | Self::DenyJoinRequest { room_id, .. }
            | Self::AdmitAllWaiting { room_id, .. }
            | Self::JoinRoom { room_id, .. }
            | Self::LeaveRoom { room_id, .. }
            | Self::EndMeeting { room_id }
            | Self::ToggleMedia { room_id, .. }
            | Self::RecordingStatus { room_id, .. }
            | Self::SendMessage { room_id, .. }
            | Self::TranscriptionEntry { room_id, .. }
            | Self::TranscriptionInterim { room_id, .. }
            | Self::RequestTranscriptionHistory { room_id }
            | Self::SetMeetingStartTime { room_id, .. }
            | Self::RequestMeetingStartTime { room_id } => Some(room_id),
            Self::Ping
            | Self::Offer { .. }
            | Self::Answer { .. }
            | Self::IceCandidate { .. }
            | Self::RequestRenegotiation { .. } => None,
        }
    }
}

/// Server-to-client events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Connection authenticated; tells the client its connection ID
    Ready { conn_id: Uuid, user_id: String },
    /// Pong response
    Pong,
    /// The caller may enter the room
    JoinApproved {
        room_id: String,
        is_host: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pending_requests: Option<Vec<PendingSummary>>,
    },
    /// The caller was denied entry
    JoinDenied {
        room_id: String,
        reason: String,
        permanent: bool,
    },
    /// The caller is queued for host approval
    WaitingForApproval {
        room_id: String,
        position: usize,
        #[serde(default)]
        is_duplicate: bool,
    },
    /// A user is waiting for approval (sent to the host)
    JoinRequest {
        room_id: String,
        user_id: String,
        user_name: String,
        requested_at: DateTime<Utc>,
    },
    /// Acknowledges an approve/deny to the host
    JoinRequestProcessed {
        room_id: String,
        user_id: String,
        action: JoinAction,
    },
    /// A waiting request timed out (sent to the requester)
    JoinRequestExpired { room_id: String, message: String },
    /// Every waiting user was approved (sent to the host)
    AllAdmitted { room_id: String, count: usize },
    /// Current waiting queue (sent to a (re)joining host)
    PendingJoinRequests {
        room_id: String,
        requests: Vec<PendingSummary>,
    },
    /// Everyone already in the room (sent to a joiner)
    ExistingParticipants {
        room_id: String,
        participants: Vec<ParticipantSummary>,
    },
    /// A participant entered the room
    UserJoined {
        room_id: String,
        participant: ParticipantSummary,
    },
    /// A participant left the room
    UserLeft {
        room_id: String,
        conn_id: Uuid,
        user_id: String,
    },
    /// A stale connection for a re-joined user was cleared; peers should
    /// tear down the old peer connection
    UserDisconnected {
        room_id: String,
        conn_id: Uuid,
        user_id: String,
    },
    /// A participant toggled a media track
    UserMediaToggle {
        room_id: String,
        user_id: String,
        media_type: MediaKind,
        enabled: bool,
    },
    /// WebRTC offer from a peer
    Offer {
        from: Uuid,
        payload: serde_json::Value,
        user_name: String,
        user_id: String,
    },
    /// WebRTC answer from a peer
    Answer {
        from: Uuid,
        payload: serde_json::Value,
        user_name: String,
        user_id: String,
    },
    /// ICE candidate from a peer
    IceCandidate {
        from: Uuid,
        candidate: serde_json::Value,
    },
    /// A peer asked for renegotiation
    RenegotiationNeeded { from: Uuid },
    /// A participant started/stopped recording
    RecordingStatusChanged {
        room_id: String,
        is_recording: bool,
        user_name: String,
    },
    /// Ephemeral chat echo
    ReceiveMessage {
        room_id: String,
        message: String,
        user_name: String,
        sent_at: DateTime<Utc>,
    },
    /// A finalized transcription entry from another participant
    TranscriptionUpdate {
        room_id: String,
        entry: TranscriptEntry,
    },
    /// A live caption from another participant
    TranscriptionInterim {
        room_id: String,
        user_id: String,
        user_name: String,
        text: String,
    },
    /// Full transcript log
    TranscriptionHistory {
        room_id: String,
        entries: Vec<TranscriptEntry>,
        count: usize,
    },
    /// Recorded meeting start time
    MeetingStartTime {
        room_id: String,
        start_time: DateTime<Utc>,
    },
    /// The meeting is over; the room is gone
    MeetingEnded { room_id: String, reason: String },
    /// The host left the room (the room itself survives)
    HostLeft { room_id: String, user_id: String },
    /// Error
    Error { code: String, message: String },
}

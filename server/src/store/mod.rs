//! Meeting Store Adapter
//!
//! Narrow outbound interface to the REST/store layer: persist a finished
//! transcript, note recording metadata, read a meeting record. The hub
//! never talks to a database directly, and never holds a room lock across
//! a store call. Without a configured base URL the adapter is a logged
//! no-op, mirroring how optional external services are wired elsewhere.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::ws::proto::TranscriptEntry;

/// Store adapter errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP transport failure.
    #[error("Store request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Store answered with a non-success status.
    #[error("Store returned status {0}")]
    Status(StatusCode),
}

/// Meeting record as served by the REST layer.
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingRecord {
    pub room_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
}

/// Recording metadata handed to the store when a participant starts
/// recording. The media itself is uploaded by the client.
#[derive(Debug, Serialize)]
struct RecordingMetadata<'a> {
    room_id: &'a str,
    recorded_by: &'a str,
    started_at: DateTime<Utc>,
}

/// Outbound interface to the REST/store layer.
#[derive(Clone)]
pub enum MeetingStore {
    /// HTTP-backed store.
    Http(HttpMeetingStore),
    /// No store configured; every operation is a logged no-op.
    Disabled,
}

impl MeetingStore {
    /// Build the adapter from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        match &config.store_base_url {
            Some(base_url) => Self::Http(HttpMeetingStore::new(base_url.clone())),
            None => Self::Disabled,
        }
    }

    /// Persist a room's finished transcript.
    pub async fn persist_transcript(
        &self,
        room_id: &str,
        entries: &[TranscriptEntry],
    ) -> Result<(), StoreError> {
        match self {
            Self::Http(store) => store.persist_transcript(room_id, entries).await,
            Self::Disabled => {
                debug!(room_id = %room_id, count = entries.len(), "Store disabled, transcript dropped");
                Ok(())
            }
        }
    }

    /// Note that a recording started.
    pub async fn persist_recording(
        &self,
        room_id: &str,
        recorded_by: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self {
            Self::Http(store) => {
                store
                    .persist_recording(&RecordingMetadata {
                        room_id,
                        recorded_by,
                        started_at,
                    })
                    .await
            }
            Self::Disabled => {
                debug!(room_id = %room_id, "Store disabled, recording metadata dropped");
                Ok(())
            }
        }
    }

    /// Read the meeting record behind a room ID, if the store knows it.
    pub async fn fetch_meeting(&self, room_id: &str) -> Result<Option<MeetingRecord>, StoreError> {
        match self {
            Self::Http(store) => store.fetch_meeting(room_id).await,
            Self::Disabled => Ok(None),
        }
    }
}

/// `reqwest`-backed store client.
#[derive(Clone)]
pub struct HttpMeetingStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMeetingStore {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn persist_transcript(
        &self,
        room_id: &str,
        entries: &[TranscriptEntry],
    ) -> Result<(), StoreError> {
        let url = format!("{}/api/meetings/{room_id}/transcript", self.base_url);
        let response = self.client.post(&url).json(&entries).send().await?;
        Self::check_status(response.status())
    }

    async fn persist_recording(&self, metadata: &RecordingMetadata<'_>) -> Result<(), StoreError> {
        let url = format!("{}/api/recordings", self.base_url);
        let response = self.client.post(&url).json(metadata).send().await?;
        Self::check_status(response.status())
    }

    async fn fetch_meeting(&self, room_id: &str) -> Result<Option<MeetingRecord>, StoreError> {
        let url = format!("{}/api/meetings/{room_id}", self.base_url);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check_status(response.status())?;
        Ok(Some(response.json().await?))
    }

    fn check_status(status: StatusCode) -> Result<(), StoreError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::Status(status))
        }
    }
}

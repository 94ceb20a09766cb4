//! Pending Request Sweeper
//!
//! The hub's only polling loop: once per minute, drop join requests that
//! have waited past their TTL and notify requesters that are still
//! connected. Rooms left with no participants and no waiting requests are
//! destroyed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::ws::proto::ServerEvent;

use super::Hub;

/// Message delivered with `join-request-expired`.
const EXPIRED_MESSAGE: &str = "Your request to join timed out. Please try again.";

/// Start the background sweep task.
pub fn spawn(hub: Arc<Hub>) -> JoinHandle<()> {
    let period = Duration::from_secs(hub.config().sweep_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            sweep(&hub).await;
        }
    })
}

/// One sweep over all rooms.
pub async fn sweep(hub: &Hub) {
    let now = Utc::now();
    let ttl = hub.config().pending_ttl();

    for room in hub.registry().all().await {
        let (expired, abandoned) = {
            let mut state = room.state.lock().await;
            let expired = state.expire_pending(now, ttl);
            (expired, hub.is_abandoned(&state))
        };

        for request in expired {
            info!(
                room_id = %room.room_id,
                user_id = %request.user_id,
                "Pending join request expired"
            );
            if let Some(conn_id) = request.conn_id {
                hub.send_to(
                    conn_id,
                    ServerEvent::JoinRequestExpired {
                        room_id: room.room_id.clone(),
                        message: EXPIRED_MESSAGE.into(),
                    },
                );
            }
        }

        if abandoned {
            hub.destroy_room(&room.room_id, "abandoned").await;
        }
    }
}

//! Joining and leaving events.
//!
//! Participant counts are adjusted by the writer, so both operations need
//! the backend: they read the freshest event and membership from it and
//! are rejected outright while offline.

use tracing::{debug, info, warn};

use super::Repository;
use crate::error::{SyncError, SyncResult};
use crate::models::Event;

impl Repository {
    /// Join an event. Joining twice is a no-op; joining a full event fails
    /// with `EventFull` and leaves the count untouched.
    pub async fn join_event(&self, user_id: &str, event_id: &str) -> SyncResult<Event> {
        self.require_online("participation")?;
        let (event, joined) = self.fresh_membership(user_id, event_id).await?;

        if joined {
            debug!(user = user_id, event = event_id, "Already joined");
            self.mirror(&event).await;
            return Ok(event);
        }
        if event.is_full() {
            info!(user = user_id, event = event_id, capacity = event.max_participants, "Event is full");
            return Err(SyncError::EventFull(event_id.to_string()));
        }

        self.remote
            .add_participant(user_id, event_id)
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;

        let mut updated = event;
        updated.participant_count += 1;
        self.push_count(&updated).await?;
        self.refresh_joined_events(user_id).await;
        Ok(updated)
    }

    /// Leave an event. Leaving an event not joined is a no-op.
    pub async fn leave_event(&self, user_id: &str, event_id: &str) -> SyncResult<Event> {
        self.require_online("participation")?;
        let (event, joined) = self.fresh_membership(user_id, event_id).await?;

        if !joined {
            debug!(user = user_id, event = event_id, "Not joined, nothing to leave");
            self.mirror(&event).await;
            return Ok(event);
        }

        self.remote
            .remove_participant(user_id, event_id)
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;

        let mut updated = event;
        updated.participant_count = updated.participant_count.saturating_sub(1);
        self.push_count(&updated).await?;
        self.refresh_joined_events(user_id).await;
        Ok(updated)
    }

    /// Events the user has joined.
    pub async fn get_joined_events(&self, user_id: &str) -> SyncResult<Vec<Event>> {
        if self.is_online() {
            match self.remote.get_joined_events(user_id).await {
                Ok(events) => {
                    self.store_joined(user_id, &events).await;
                    return Ok(events);
                }
                Err(e) => warn!(user = user_id, error = %e, "Remote joined events read failed, using cache"),
            }
        }
        self.settle().await;
        match self.cache.get_joined_events(user_id).await {
            Ok(Some(events)) => Ok(events),
            Ok(None) => Err(SyncError::unavailable_offline("joined events", user_id)),
            Err(e) => {
                warn!(user = user_id, error = %e, "Failed to read cached joined events");
                Err(SyncError::unavailable_offline("joined events", user_id))
            }
        }
    }

    /// The event and whether the user is in it, both straight from the
    /// backend.
    async fn fresh_membership(&self, user_id: &str, event_id: &str) -> SyncResult<(Event, bool)> {
        let (event, joined) = futures::join!(
            self.remote.get_event(event_id),
            self.remote.get_joined_events(user_id)
        );
        let event = event.map_err(|e| SyncError::from_remote("event", event_id, e))?;
        let joined = joined.map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
        Ok((event, joined.iter().any(|e| e.id == event_id)))
    }

    /// Write the adjusted count. If this fails after the link write, the
    /// link stays in place: there is no cross-row transaction.
    async fn push_count(&self, event: &Event) -> SyncResult<()> {
        self.remote
            .set_event(event)
            .await
            .map_err(|e| SyncError::RemoteUnavailable(e.to_string()))?;
        self.mirror_in_background(event);
        Ok(())
    }

    async fn refresh_joined_events(&self, user_id: &str) {
        match self.remote.get_joined_events(user_id).await {
            Ok(events) => self.store_joined(user_id, &events).await,
            Err(e) => warn!(user = user_id, error = %e, "Failed to refresh joined events"),
        }
    }

    async fn store_joined(&self, user_id: &str, events: &[Event]) {
        if let Err(e) = self.cache.set_joined_events(user_id, events).await {
            warn!(user = user_id, error = %e, "Failed to mirror joined events into cache");
        }
    }
}

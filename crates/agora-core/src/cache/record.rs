use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Whether a cached row has been confirmed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// The row matches what the backend acknowledged at `last_synced_at`.
    #[default]
    Confirmed,
    /// Written locally while offline, not yet acknowledged by the backend.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecord<T> {
    pub data: T,
    pub last_synced_at: DateTime<Utc>,
    #[serde(default)]
    pub state: SyncState,
}

impl<T> CachedRecord<T> {
    pub fn new(data: T) -> Self {
        Self::at(data, Utc::now(), SyncState::Confirmed)
    }

    pub fn pending(data: T) -> Self {
        Self::at(data, Utc::now(), SyncState::Pending)
    }

    pub fn at(data: T, last_synced_at: DateTime<Utc>, state: SyncState) -> Self {
        Self {
            data,
            last_synced_at,
            state,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == SyncState::Pending
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.last_synced_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Negative ages come from clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self, window: Duration) -> bool {
        Utc::now() - self.last_synced_at > window
    }

    pub fn synced_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_synced_at < cutoff
    }
}

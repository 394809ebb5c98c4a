//! Outbox replay, eviction and background sync tasks.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Repository;
use crate::cache::{CacheEntity, JoinedEvents, TableListing, TagChildren};
use crate::error::{SyncError, SyncResult};
use crate::models::{Association, Event, Tag, UserProfile};

/// Rows removed by one eviction sweep, per table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub replayed: usize,
    pub events: usize,
    pub associations: usize,
    pub tags: usize,
    pub users: usize,
    pub views: usize,
}

impl SweepReport {
    pub fn total_removed(&self) -> usize {
        self.events + self.associations + self.tags + self.users + self.views
    }
}

impl Repository {
    /// Push one pending profile to the backend. Returns true once the
    /// backend has acknowledged it.
    pub(super) async fn replay_user(&self, user: &UserProfile) -> bool {
        if !self.is_online() {
            return false;
        }
        if let Err(e) = self.remote.set_user(user).await {
            warn!(id = %user.id, error = %e, "Failed to replay pending user profile");
            return false;
        }
        if let Err(e) = self.cache.mark_confirmed(user).await {
            warn!(id = %user.id, error = %e, "Failed to confirm replayed user profile");
        }
        true
    }

    /// Replay every pending write. Returns how many were acknowledged;
    /// rows that fail stay pending for the next attempt.
    pub async fn flush_pending(&self) -> SyncResult<usize> {
        if !self.is_online() {
            return Ok(0);
        }
        self.settle().await;
        let pending = self
            .cache
            .pending::<UserProfile>()
            .await
            .map_err(|e| SyncError::LocalStore(e.to_string()))?;

        let mut replayed = 0;
        for user in &pending {
            if self.replay_user(user).await {
                replayed += 1;
            }
        }
        if !pending.is_empty() {
            info!(pending = pending.len(), replayed, "Flushed pending writes");
        }
        Ok(replayed)
    }

    /// Evict rows last synced before `now - stale_window`.
    ///
    /// Pending rows are replayed first and never evicted; preferences are
    /// never evicted. Listing markers age out with the rows they cover.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        self.settle().await;
        let replayed = match self.flush_pending().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to replay pending writes before sweep");
                0
            }
        };

        let cutoff = now - self.settings.stale_window;
        let report = SweepReport {
            replayed,
            events: self.evict::<Event>(cutoff).await,
            associations: self.evict::<Association>(cutoff).await,
            tags: self.evict::<Tag>(cutoff).await,
            users: self.evict::<UserProfile>(cutoff).await,
            views: self.evict::<JoinedEvents>(cutoff).await
                + self.evict::<TagChildren>(cutoff).await
                + self.evict::<TableListing>(cutoff).await,
        };
        debug!(?report, %cutoff, "Cache sweep finished");
        report
    }

    async fn evict<E: CacheEntity>(&self, cutoff: DateTime<Utc>) -> usize {
        match self.cache.evict_synced_before::<E>(cutoff).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(table = E::TABLE, error = %e, "Failed to evict stale rows");
                0
            }
        }
    }

    /// Fetch everything a user needs to keep browsing offline.
    pub async fn prefetch_for_offline(&self, user_id: &str) -> SyncResult<()> {
        if !self.is_online() {
            return Err(SyncError::RemoteUnavailable("offline".to_string()));
        }
        let (events, associations, tags, joined, user) = futures::join!(
            self.get_all_events(),
            self.get_all_associations(),
            self.get_all_tags(),
            self.get_joined_events(user_id),
            self.get_user(user_id),
        );
        events?;
        associations?;
        let tags = tags?;
        joined?;
        user?;

        // Children views, so the tag navigator works offline
        let mut parents: Vec<&str> = vec![self.settings.root_tag_id.as_str()];
        parents.extend(tags.iter().map(|t| t.id.as_str()));
        for parent in parents {
            let children: Vec<Tag> = tags.iter().filter(|t| t.is_child_of(parent)).cloned().collect();
            if let Err(e) = self.cache.set_sub_tags(parent, &children).await {
                warn!(parent, error = %e, "Failed to cache sub tags");
            }
        }
        info!(user = user_id, "Prefetched data for offline use");
        Ok(())
    }

    /// Replay pending writes on every offline -> online transition. The task
    /// ends when the repository is dropped.
    pub fn spawn_reconnect_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let mut changes = Box::pin(self.connectivity.changes());
        tokio::spawn(async move {
            while let Some(online) = changes.next().await {
                if !online {
                    continue;
                }
                let Some(repo) = weak.upgrade() else {
                    break;
                };
                match repo.flush_pending().await {
                    Ok(replayed) => debug!(replayed, "Reconnect sync finished"),
                    Err(e) => warn!(error = %e, "Reconnect sync failed"),
                }
            }
        })
    }

    /// Run `sweep` every `every`. The task ends when the repository is
    /// dropped.
    pub fn spawn_periodic_sweep(self: &Arc<Self>, every: StdDuration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await; // first tick is immediate
            loop {
                ticker.tick().await;
                let Some(repo) = weak.upgrade() else {
                    break;
                };
                let report = repo.sweep(Utc::now()).await;
                if report.total_removed() > 0 {
                    info!(removed = report.total_removed(), "Evicted stale cache rows");
                }
            }
        })
    }
}

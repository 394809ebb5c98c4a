//! The single façade the application reads and writes through.
//!
//! Reads are read-through: when online the backend answers and the result
//! refreshes the cache; when offline, or when the backend fails, the cached
//! copy is returned, and a missing copy is `DataUnavailableOffline`.
//!
//! Writes are write-through: the backend must acknowledge before the cache
//! is touched. The cache mirror of a write then runs in the background, so
//! callers see the acknowledgement without waiting on the disk; every read
//! that falls back to the cache first waits for those mirrors to land. While offline, writes to events, associations, tags and
//! participation are rejected; user profiles are kept as pending rows and
//! replayed later; preferences are local only.

mod participation;
mod sync;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, warn};

pub use sync::SweepReport;

use crate::cache::{CacheEntity, CacheStore, CachedRecord};
use crate::config::SyncSettings;
use crate::connectivity::ConnectivityObserver;
use crate::error::{SyncError, SyncResult};
use crate::models::{Association, AssociationHeader, Event, Tag, UserPreferences, UserProfile};
use crate::remote::{RemoteError, RemoteSource};

pub struct Repository {
    remote: Arc<dyn RemoteSource>,
    cache: Arc<CacheStore>,
    connectivity: Arc<ConnectivityObserver>,
    settings: SyncSettings,
    mirrors: Mutex<JoinSet<()>>,
}

impl Repository {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        cache: Arc<CacheStore>,
        connectivity: Arc<ConnectivityObserver>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            remote,
            cache,
            connectivity,
            settings,
            mirrors: Mutex::new(JoinSet::new()),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn connectivity(&self) -> &ConnectivityObserver {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online_now()
    }

    /// Wait until every background cache mirror has landed.
    pub async fn settle(&self) {
        let mut running = std::mem::take(&mut *self.mirrors.lock().unwrap_or_else(PoisonError::into_inner));
        while running.join_next().await.is_some() {}
    }

    // ===== Read/write policy =====

    /// Read one row: backend first when online, cache otherwise.
    async fn read_one<E: CacheEntity>(
        &self,
        id: &str,
        fetch: impl Future<Output = Result<E, RemoteError>>,
    ) -> SyncResult<E> {
        if self.is_online() {
            match fetch.await {
                Ok(value) => {
                    self.mirror(&value).await;
                    return Ok(value);
                }
                Err(RemoteError::NotFound(_)) => {
                    self.forget::<E>(id).await;
                    return Err(SyncError::not_found(E::KIND, id));
                }
                Err(e) => {
                    warn!(entity = E::KIND, id, error = %e, "Remote read failed, using cache");
                }
            }
        }
        self.cached::<E>(id)
            .await
            .map(|record| record.data)
            .ok_or_else(|| SyncError::unavailable_offline(E::KIND, id))
    }

    /// Read a full listing. Offline, a listing fetched earlier is served
    /// from the cache even when empty; one never fetched is unavailable.
    async fn read_all<E: CacheEntity>(
        &self,
        fetch: impl Future<Output = Result<Vec<E>, RemoteError>>,
    ) -> SyncResult<Vec<E>> {
        if self.is_online() {
            match fetch.await {
                Ok(values) => {
                    if let Err(e) = self.cache.replace_all(&values).await {
                        warn!(table = E::TABLE, error = %e, "Failed to mirror listing into cache");
                    }
                    return Ok(values);
                }
                Err(e) => {
                    warn!(entity = E::KIND, error = %e, "Remote listing failed, using cache");
                }
            }
        }
        self.cached_listing::<E>()
            .await
            .ok_or_else(|| SyncError::unavailable_offline(E::KIND, "*"))
    }

    /// Write to the backend, then mirror into the cache. Rejected offline.
    async fn write_through<E: CacheEntity>(
        &self,
        value: &E,
        push: impl Future<Output = Result<(), RemoteError>>,
    ) -> SyncResult<()> {
        self.require_online(E::KIND)?;
        push.await
            .map_err(|e| SyncError::from_remote(E::KIND, value.cache_id(), e))?;
        self.mirror_in_background(value);
        Ok(())
    }

    fn require_online(&self, entity: &'static str) -> SyncResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            debug!(entity, "Rejecting write while offline");
            Err(SyncError::OfflineWriteRejected(entity))
        }
    }

    /// Copy a backend-confirmed value into the cache. The backend already
    /// holds the truth, so a failure here is only logged.
    async fn mirror<E: CacheEntity>(&self, value: &E) {
        if let Err(e) = self.cache.put(value).await {
            warn!(table = E::TABLE, id = value.cache_id(), error = %e, "Failed to mirror into cache");
        }
    }

    /// Mirror an acknowledged write without holding up the caller. A
    /// failure is only logged.
    fn mirror_in_background<E: CacheEntity>(&self, value: &E) {
        let cache = self.cache.clone();
        let value = value.clone();
        let mut mirrors = self.mirrors.lock().unwrap_or_else(PoisonError::into_inner);
        while mirrors.try_join_next().is_some() {}
        mirrors.spawn(async move {
            if let Err(e) = cache.put(&value).await {
                warn!(table = E::TABLE, id = value.cache_id(), error = %e, "Failed to mirror write into cache");
            }
        });
    }

    async fn cached<E: CacheEntity>(&self, id: &str) -> Option<CachedRecord<E>> {
        self.settle().await;
        match self.cache.get::<E>(id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(table = E::TABLE, id, error = %e, "Failed to read cache");
                None
            }
        }
    }

    async fn cached_listing<E: CacheEntity>(&self) -> Option<Vec<E>> {
        self.settle().await;
        match self.cache.get_listing::<E>().await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(table = E::TABLE, error = %e, "Failed to read cache");
                None
            }
        }
    }

    /// Drop a confirmed row the backend no longer has. Pending rows stay.
    async fn forget<E: CacheEntity>(&self, id: &str) {
        if self.cached::<E>(id).await.is_some_and(|r| r.is_pending()) {
            return;
        }
        if let Err(e) = self.cache.remove::<E>(&[id.to_string()]).await {
            warn!(table = E::TABLE, id, error = %e, "Failed to drop deleted row from cache");
        }
    }

    // ===== Events =====

    pub async fn get_event(&self, id: &str) -> SyncResult<Event> {
        self.read_one(id, self.remote.get_event(id)).await
    }

    pub async fn get_all_events(&self) -> SyncResult<Vec<Event>> {
        self.read_all(self.remote.get_all_events()).await
    }

    pub async fn set_event(&self, event: &Event) -> SyncResult<()> {
        event.validate().map_err(|reason| SyncError::InvalidEntity {
            entity: Event::KIND,
            reason,
        })?;
        self.write_through(event, self.remote.set_event(event)).await
    }

    // ===== Associations =====

    pub async fn get_association(&self, id: &str) -> SyncResult<Association> {
        self.read_one(id, self.remote.get_association(id)).await
    }

    pub async fn get_all_associations(&self) -> SyncResult<Vec<Association>> {
        self.read_all(self.remote.get_all_associations()).await
    }

    /// Id and name of every association. Offline, the headers are projected
    /// from cached associations; they are never cached on their own.
    pub async fn get_association_headers(&self) -> SyncResult<Vec<AssociationHeader>> {
        if self.is_online() {
            match self.remote.get_association_headers().await {
                Ok(headers) => return Ok(headers),
                Err(e) => warn!(error = %e, "Remote header listing failed, using cache"),
            }
        }
        self.cached_listing::<Association>()
            .await
            .map(|associations| associations.iter().map(Association::header).collect())
            .ok_or_else(|| SyncError::unavailable_offline(Association::KIND, "*"))
    }

    pub async fn set_association(&self, association: &Association) -> SyncResult<()> {
        self.write_through(association, self.remote.set_association(association))
            .await
    }

    // ===== Tags =====

    pub async fn get_tag(&self, id: &str) -> SyncResult<Tag> {
        self.read_one(id, self.remote.get_tag(id)).await
    }

    pub async fn get_all_tags(&self) -> SyncResult<Vec<Tag>> {
        self.read_all(self.remote.get_all_tags()).await
    }

    pub async fn get_sub_tags(&self, parent_id: &str) -> SyncResult<Vec<Tag>> {
        if self.is_online() {
            match self.remote.get_sub_tags(parent_id).await {
                Ok(tags) => {
                    if let Err(e) = self.cache.set_sub_tags(parent_id, &tags).await {
                        warn!(parent = parent_id, error = %e, "Failed to mirror sub tags into cache");
                    }
                    return Ok(tags);
                }
                Err(e) => warn!(parent = parent_id, error = %e, "Remote sub tag read failed, using cache"),
            }
        }
        self.settle().await;
        match self.cache.get_sub_tags(parent_id).await {
            Ok(Some(tags)) => Ok(tags),
            Ok(None) => Err(SyncError::unavailable_offline("sub tags", parent_id)),
            Err(e) => {
                warn!(parent = parent_id, error = %e, "Failed to read cached sub tags");
                Err(SyncError::unavailable_offline("sub tags", parent_id))
            }
        }
    }

    pub async fn set_tag(&self, tag: &Tag) -> SyncResult<()> {
        self.write_through(tag, self.remote.set_tag(tag)).await
    }

    // ===== Users =====

    /// Fetch a user profile. A pending local edit is replayed first when
    /// online; if that fails the local edit is returned, so a user always
    /// reads their own writes.
    pub async fn get_user(&self, id: &str) -> SyncResult<UserProfile> {
        if let Some(record) = self.cached::<UserProfile>(id).await {
            if record.is_pending() && !self.replay_user(&record.data).await {
                return Ok(record.data);
            }
        }
        self.read_one(id, self.remote.get_user(id)).await
    }

    pub async fn get_all_users(&self) -> SyncResult<Vec<UserProfile>> {
        self.read_all(self.remote.get_all_users()).await
    }

    /// Save a user profile. Offline, the profile is stored as a pending row
    /// and replayed by `flush_pending` once the backend is reachable.
    pub async fn set_user(&self, user: &UserProfile) -> SyncResult<()> {
        if self.is_online() {
            return self.write_through(user, self.remote.set_user(user)).await;
        }
        self.settle().await;
        self.cache.put_pending(user).await.map_err(|e| {
            warn!(id = %user.id, error = %e, "Failed to queue user profile");
            SyncError::OfflineWriteRejected(UserProfile::KIND)
        })?;
        debug!(id = %user.id, "Queued user profile for replay");
        Ok(())
    }

    // ===== Preferences =====

    /// Local-only settings. Missing preferences default rather than fail.
    pub async fn get_preferences(&self, user_id: &str) -> UserPreferences {
        match self.cache.get_preferences(user_id).await {
            Ok(Some(preferences)) => preferences,
            Ok(None) => UserPreferences::new(user_id),
            Err(e) => {
                warn!(user = user_id, error = %e, "Failed to read preferences, using defaults");
                UserPreferences::new(user_id)
            }
        }
    }

    pub async fn set_preferences(&self, preferences: &UserPreferences) -> SyncResult<()> {
        self.cache
            .set_preferences(preferences)
            .await
            .map_err(|e| SyncError::LocalStore(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::Repository;
    use crate::cache::CacheStore;
    use crate::config::SyncSettings;
    use crate::connectivity::{ConnectivityObserver, ManualMonitor};
    use crate::remote::memory::MemoryRemote;

    pub struct Harness {
        pub repo: Arc<Repository>,
        pub remote: Arc<MemoryRemote>,
        pub monitor: Arc<ManualMonitor>,
        _dir: TempDir,
    }

    impl Harness {
        pub fn new() -> Self {
            let dir = TempDir::new().expect("Failed to create temp directory");
            let cache = Arc::new(CacheStore::new(dir.path().join("cache")).unwrap());
            let remote = Arc::new(MemoryRemote::new());
            let monitor = Arc::new(ManualMonitor::new(true));
            let observer = Arc::new(ConnectivityObserver::new(monitor.clone()));
            let repo = Arc::new(Repository::new(
                remote.clone(),
                cache,
                observer,
                SyncSettings::default(),
            ));
            Self {
                repo,
                remote,
                monitor,
                _dir: dir,
            }
        }

        pub fn go_offline(&self) {
            self.monitor.set_reachable(false);
        }

        pub fn go_online(&self) {
            self.monitor.set_reachable(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use super::*;
    use crate::models::event::fixtures::event;

    #[tokio::test]
    async fn test_read_your_writes_online() {
        let h = Harness::new();
        let e = event("a", 1, 8);
        h.repo.set_event(&e).await.unwrap();
        assert_eq!(h.repo.get_event("a").await.unwrap(), e);

        h.go_offline();
        assert_eq!(h.repo.get_event("a").await.unwrap(), e);
    }

    #[tokio::test]
    async fn test_offline_read_returns_cached_copy() {
        let h = Harness::new();
        h.remote.seed_event(event("a", 2, 8));
        let fetched = h.repo.get_event("a").await.unwrap();

        h.go_offline();
        assert_eq!(h.repo.get_event("a").await.unwrap(), fetched);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_cache() {
        let h = Harness::new();
        h.remote.seed_event(event("a", 2, 8));
        h.repo.get_event("a").await.unwrap();

        h.remote.set_available(false);
        assert!(h.repo.is_online());
        assert_eq!(h.repo.get_event("a").await.unwrap(), event("a", 2, 8));
    }

    #[tokio::test]
    async fn test_never_fetched_offline_is_unavailable() {
        let h = Harness::new();
        h.remote.seed_event(event("a", 2, 8));
        h.go_offline();

        assert_eq!(
            h.repo.get_event("a").await.unwrap_err(),
            SyncError::unavailable_offline("event", "a")
        );
    }

    #[tokio::test]
    async fn test_remote_down_and_cache_empty_is_unavailable() {
        let h = Harness::new();
        h.remote.set_available(false);
        assert!(matches!(
            h.repo.get_all_events().await,
            Err(SyncError::DataUnavailableOffline { .. })
        ));
    }

    #[tokio::test]
    async fn test_not_found_online_drops_cached_copy() {
        let h = Harness::new();
        h.repo.cache().set_tag(&Tag::new("gone", "Gone", None)).await.unwrap();

        assert_eq!(
            h.repo.get_tag("gone").await.unwrap_err(),
            SyncError::not_found("tag", "gone")
        );
        assert!(h.repo.cache().get_tag("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_event_write_is_rejected() {
        let h = Harness::new();
        h.go_offline();

        let err = h.repo.set_event(&event("a", 0, 8)).await.unwrap_err();
        assert_eq!(err, SyncError::OfflineWriteRejected("event"));
        assert!(h.repo.cache().get_event("a").await.unwrap().is_none());
        assert_eq!(h.remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_remote_write_never_reaches_cache() {
        let h = Harness::new();
        h.remote.set_available(false);

        let err = h.repo.set_tag(&Tag::new("t", "T", None)).await.unwrap_err();
        assert!(matches!(err, SyncError::RemoteUnavailable(_)));
        assert!(h.repo.cache().get_tag("t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_event_is_rejected_before_write() {
        let h = Harness::new();
        let mut e = event("a", 0, 8);
        e.end_date = e.start_date - chrono::Duration::minutes(1);

        assert!(matches!(
            h.repo.set_event(&e).await,
            Err(SyncError::InvalidEntity { entity: "event", .. })
        ));
        assert_eq!(h.remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_get_all_refreshes_cache() {
        let h = Harness::new();
        h.remote.seed_event(event("a", 0, 8));
        h.remote.seed_event(event("b", 0, 8));
        assert_eq!(h.repo.get_all_events().await.unwrap().len(), 2);

        h.go_offline();
        assert_eq!(h.repo.get_all_events().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetched_empty_listing_reads_empty_offline() {
        let h = Harness::new();
        assert!(h.repo.get_all_events().await.unwrap().is_empty());

        h.go_offline();
        assert_eq!(h.repo.get_all_events().await, Ok(vec![]));
        assert_eq!(
            h.repo.get_all_tags().await,
            Err(SyncError::unavailable_offline("tag", "*"))
        );
    }

    #[tokio::test]
    async fn test_single_reads_do_not_make_a_listing() {
        let h = Harness::new();
        h.remote.seed_event(event("a", 0, 8));
        h.repo.get_event("a").await.unwrap();

        h.go_offline();
        assert!(matches!(
            h.repo.get_all_events().await,
            Err(SyncError::DataUnavailableOffline { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_returns_before_cache_mirror_lands() {
        let h = Harness::new();
        let e = event("a", 1, 8);

        let guard = h.repo.cache().hold_lock().await;
        tokio::time::timeout(std::time::Duration::from_secs(5), h.repo.set_event(&e))
            .await
            .expect("write waited on the cache")
            .unwrap();
        assert_eq!(h.remote.event("a"), Some(e.clone()));
        drop(guard);

        h.repo.settle().await;
        assert_eq!(h.repo.cache().get_event("a").await.unwrap().unwrap().data, e);
    }

    #[tokio::test]
    async fn test_association_headers_offline_are_projected() {
        let h = Harness::new();
        h.remote.seed_association(Association {
            id: "clic".to_string(),
            name: "CLIC".to_string(),
            description: String::new(),
            url: None,
            tags: vec![],
        });
        h.go_offline();
        assert!(h.repo.get_association_headers().await.is_err());

        h.go_online();
        h.repo.get_all_associations().await.unwrap();
        h.go_offline();
        let headers = h.repo.get_association_headers().await.unwrap();
        assert_eq!(
            headers,
            vec![AssociationHeader {
                id: "clic".to_string(),
                name: "CLIC".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_sub_tags_offline() {
        let h = Harness::new();
        h.remote.seed_tag(Tag::new("sport", "Sport", Some("root")));
        let online = h.repo.get_sub_tags("root").await.unwrap();

        h.go_offline();
        assert_eq!(h.repo.get_sub_tags("root").await.unwrap(), online);
        assert!(matches!(
            h.repo.get_sub_tags("sport").await,
            Err(SyncError::DataUnavailableOffline { .. })
        ));
    }

    #[tokio::test]
    async fn test_offline_user_write_is_queued_and_readable() {
        let h = Harness::new();
        h.go_offline();
        let user = UserProfile::new("u1", "Ada");

        h.repo.set_user(&user).await.unwrap();
        assert_eq!(h.repo.get_user("u1").await.unwrap(), user);
        assert!(h.repo.cache().get_user("u1").await.unwrap().unwrap().is_pending());
        assert!(h.remote.user("u1").is_none());
    }

    #[tokio::test]
    async fn test_online_read_replays_pending_user() {
        let h = Harness::new();
        h.go_offline();
        let user = UserProfile::new("u1", "Ada");
        h.repo.set_user(&user).await.unwrap();

        h.go_online();
        assert_eq!(h.repo.get_user("u1").await.unwrap(), user);
        assert_eq!(h.remote.user("u1"), Some(user));
        assert!(!h.repo.cache().get_user("u1").await.unwrap().unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_preferences_are_local_and_work_offline() {
        let h = Harness::new();
        h.go_offline();
        assert_eq!(h.repo.get_preferences("u1").await, UserPreferences::new("u1"));

        let mut prefs = UserPreferences::new("u1");
        prefs.dark_mode = true;
        h.repo.set_preferences(&prefs).await.unwrap();
        assert_eq!(h.repo.get_preferences("u1").await, prefs);
        assert_eq!(h.remote.write_count(), 0);
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::entity::{CacheEntity, JoinedEvents, TableListing, TagChildren};
use super::record::{CachedRecord, SyncState};
use crate::models::{Association, Event, Tag, UserPreferences, UserProfile};

type Table<E> = BTreeMap<String, CachedRecord<E>>;

/// On-device mirror of the backend entities.
///
/// Each table lives in its own JSON file. All access goes through one async
/// mutex, so concurrent callers never interleave a read-modify-write.
/// Missing rows are `None`/empty, never an error.
pub struct CacheStore {
    cache_dir: PathBuf,
    lock: Mutex<()>,
}

impl CacheStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache dir {}", cache_dir.display()))?;
        Ok(Self {
            cache_dir,
            lock: Mutex::new(()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Take the store lock, stalling every other access until dropped.
    #[cfg(test)]
    pub(crate) async fn hold_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", table))
    }

    async fn load_table<E: CacheEntity>(&self) -> Result<Table<E>> {
        let path = self.table_path(E::TABLE);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Table::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read cache table: {}", E::TABLE))
            }
        };
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache table: {}", E::TABLE))
    }

    async fn save_table<E: CacheEntity>(&self, table: &Table<E>) -> Result<()> {
        let path = self.table_path(E::TABLE);
        let tmp = path.with_extension(format!("json.{:016x}.tmp", rand::random::<u64>()));
        let contents = serde_json::to_string_pretty(table)?;
        let written = match tokio::fs::write(&tmp, contents).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("Failed to write cache table: {}", E::TABLE));
        }
        Ok(())
    }

    // ===== Generic table access =====

    pub async fn get<E: CacheEntity>(&self, id: &str) -> Result<Option<CachedRecord<E>>> {
        let _guard = self.lock.lock().await;
        Ok(self.load_table::<E>().await?.remove(id))
    }

    pub async fn get_all<E: CacheEntity>(&self) -> Result<Vec<CachedRecord<E>>> {
        let _guard = self.lock.lock().await;
        Ok(self.load_table::<E>().await?.into_values().collect())
    }

    /// Store a row confirmed by the backend, stamped with the current time.
    pub async fn put<E: CacheEntity>(&self, value: &E) -> Result<()> {
        self.put_record(CachedRecord::new(value.clone())).await
    }

    /// Store a row written locally and not yet acknowledged by the backend.
    pub async fn put_pending<E: CacheEntity>(&self, value: &E) -> Result<()> {
        self.put_record(CachedRecord::pending(value.clone())).await
    }

    pub async fn put_record<E: CacheEntity>(&self, record: CachedRecord<E>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut table = self.load_table::<E>().await?;
        debug!(table = E::TABLE, id = record.data.cache_id(), state = ?record.state, "Caching row");
        table.insert(record.data.cache_id().to_string(), record);
        self.save_table(&table).await
    }

    /// Store a full listing from the backend and remember that it was
    /// fetched, so an empty listing can be told apart from a missing one.
    ///
    /// Confirmed rows missing from `values` were deleted remotely and are
    /// dropped; pending rows are kept so they can still be replayed.
    pub async fn replace_all<E: CacheEntity>(&self, values: &[E]) -> Result<()> {
        let _guard = self.lock.lock().await;

        // Stamped before the rows, so a sweep never keeps the marker
        // while dropping rows of the same listing.
        let mut listings = self.load_table::<TableListing>().await?;
        listings.insert(
            E::TABLE.to_string(),
            CachedRecord::new(TableListing {
                table: E::TABLE.to_string(),
            }),
        );
        self.save_table(&listings).await?;

        let mut table = self.load_table::<E>().await?;
        table.retain(|_, record| record.is_pending());
        for value in values {
            let id = value.cache_id().to_string();
            if table.get(&id).is_some_and(|r| r.is_pending()) {
                continue;
            }
            table.insert(id, CachedRecord::new(value.clone()));
        }
        self.save_table(&table).await
    }

    /// Store several rows confirmed by the backend, keeping other rows.
    pub async fn put_many<E: CacheEntity>(&self, values: &[E]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        let mut table = self.load_table::<E>().await?;
        for value in values {
            table.insert(value.cache_id().to_string(), CachedRecord::new(value.clone()));
        }
        self.save_table(&table).await
    }

    /// Flip a pending row to confirmed and restamp it, provided it still
    /// holds `sent`. A row edited again since `sent` was read stays pending.
    pub async fn mark_confirmed<E: CacheEntity + PartialEq>(&self, sent: &E) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut table = self.load_table::<E>().await?;
        let Some(record) = table.get_mut(sent.cache_id()) else {
            return Ok(false);
        };
        if record.data != *sent {
            return Ok(false);
        }
        record.state = SyncState::Confirmed;
        record.last_synced_at = Utc::now();
        self.save_table(&table).await?;
        Ok(true)
    }

    pub async fn remove<E: CacheEntity>(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.lock().await;
        let mut table = self.load_table::<E>().await?;
        let before = table.len();
        for id in ids {
            table.remove(id);
        }
        let removed = before - table.len();
        if removed > 0 {
            self.save_table(&table).await?;
        }
        Ok(removed)
    }

    /// Every cached row of a table whose full listing was fetched, or
    /// `None` if it never was or the listing marker has been evicted.
    pub async fn get_listing<E: CacheEntity>(&self) -> Result<Option<Vec<E>>> {
        let _guard = self.lock.lock().await;
        if !self.load_table::<TableListing>().await?.contains_key(E::TABLE) {
            return Ok(None);
        }
        Ok(Some(
            self.load_table::<E>()
                .await?
                .into_values()
                .map(|record| record.data)
                .collect(),
        ))
    }

    /// Remove rows last synced before `cutoff`, except pending rows.
    ///
    /// Selection and removal happen under one lock, so a write landing
    /// during a sweep is never lost.
    pub async fn evict_synced_before<E: CacheEntity>(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut table = self.load_table::<E>().await?;
        let before = table.len();
        table.retain(|_, record| record.is_pending() || !record.synced_before(cutoff));
        let removed = before - table.len();
        if removed > 0 {
            debug!(table = E::TABLE, removed, "Evicted stale rows");
            self.save_table(&table).await?;
        }
        Ok(removed)
    }

    /// Ids of rows whose last sync happened strictly before `cutoff`.
    pub async fn ids_synced_before<E: CacheEntity>(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load_table::<E>()
            .await?
            .into_iter()
            .filter(|(_, record)| record.synced_before(cutoff))
            .map(|(id, _)| id)
            .collect())
    }

    pub async fn pending<E: CacheEntity>(&self) -> Result<Vec<E>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load_table::<E>()
            .await?
            .into_values()
            .filter(|record| record.is_pending())
            .map(|record| record.data)
            .collect())
    }

    // ===== Events =====

    pub async fn get_event(&self, id: &str) -> Result<Option<CachedRecord<Event>>> {
        self.get(id).await
    }

    pub async fn get_all_events(&self) -> Result<Vec<CachedRecord<Event>>> {
        self.get_all().await
    }

    pub async fn set_event(&self, event: &Event) -> Result<()> {
        self.put(event).await
    }

    pub async fn get_all_events_synced_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        self.ids_synced_before::<Event>(cutoff).await
    }

    // ===== Associations =====

    pub async fn get_association(&self, id: &str) -> Result<Option<CachedRecord<Association>>> {
        self.get(id).await
    }

    pub async fn get_all_associations(&self) -> Result<Vec<CachedRecord<Association>>> {
        self.get_all().await
    }

    pub async fn set_association(&self, association: &Association) -> Result<()> {
        self.put(association).await
    }

    pub async fn get_all_associations_synced_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.ids_synced_before::<Association>(cutoff).await
    }

    // ===== Tags =====

    pub async fn get_tag(&self, id: &str) -> Result<Option<CachedRecord<Tag>>> {
        self.get(id).await
    }

    pub async fn get_all_tags(&self) -> Result<Vec<CachedRecord<Tag>>> {
        self.get_all().await
    }

    pub async fn set_tag(&self, tag: &Tag) -> Result<()> {
        self.put(tag).await
    }

    pub async fn get_all_tags_synced_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        self.ids_synced_before::<Tag>(cutoff).await
    }

    /// Cached children of a tag, or `None` if they were never fetched or a
    /// child row has since been evicted.
    pub async fn get_sub_tags(&self, parent_id: &str) -> Result<Option<Vec<Tag>>> {
        let _guard = self.lock.lock().await;
        let Some(children) = self.load_table::<TagChildren>().await?.remove(parent_id) else {
            return Ok(None);
        };
        let mut tags = self.load_table::<Tag>().await?;
        let resolved: Option<Vec<Tag>> = children
            .data
            .tag_ids
            .iter()
            .map(|id| tags.remove(id).map(|r| r.data))
            .collect();
        Ok(resolved)
    }

    pub async fn set_sub_tags(&self, parent_id: &str, tags: &[Tag]) -> Result<()> {
        self.put_many(tags).await?;
        self.put(&TagChildren {
            parent_id: parent_id.to_string(),
            tag_ids: tags.iter().map(|t| t.id.clone()).collect(),
        })
        .await
    }

    // ===== Users =====

    pub async fn get_user(&self, id: &str) -> Result<Option<CachedRecord<UserProfile>>> {
        self.get(id).await
    }

    pub async fn get_all_users(&self) -> Result<Vec<CachedRecord<UserProfile>>> {
        self.get_all().await
    }

    pub async fn set_user(&self, user: &UserProfile) -> Result<()> {
        self.put(user).await
    }

    pub async fn get_all_users_synced_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        self.ids_synced_before::<UserProfile>(cutoff).await
    }

    // ===== Joined events =====

    /// Cached joined events of a user, or `None` if the view was never
    /// fetched or one of its events has since been evicted.
    pub async fn get_joined_events(&self, user_id: &str) -> Result<Option<Vec<Event>>> {
        let _guard = self.lock.lock().await;
        let Some(joined) = self.load_table::<JoinedEvents>().await?.remove(user_id) else {
            return Ok(None);
        };
        let mut events = self.load_table::<Event>().await?;
        let resolved: Option<Vec<Event>> = joined
            .data
            .event_ids
            .iter()
            .map(|id| events.remove(id).map(|r| r.data))
            .collect();
        Ok(resolved)
    }

    pub async fn set_joined_events(&self, user_id: &str, events: &[Event]) -> Result<()> {
        self.put_many(events).await?;
        self.put(&JoinedEvents {
            user_id: user_id.to_string(),
            event_ids: events.iter().map(|e| e.id.clone()).collect(),
        })
        .await
    }

    // ===== Preferences =====

    pub async fn get_preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        Ok(self.get::<UserPreferences>(user_id).await?.map(|r| r.data))
    }

    pub async fn set_preferences(&self, preferences: &UserPreferences) -> Result<()> {
        self.put(preferences).await
    }

    // ===== Cache Age Information =====

    /// Age of the most recently synced row in a table
    async fn newest_age<E: CacheEntity>(&self) -> Option<String> {
        match self.get_all::<E>().await {
            Ok(records) => records
                .into_iter()
                .max_by_key(|r| r.last_synced_at)
                .map(|r| r.age_display()),
            Err(e) => {
                debug!(table = E::TABLE, error = %e, "Failed to load cache for age display");
                None
            }
        }
    }

    pub async fn cache_ages(&self) -> CacheAges {
        CacheAges {
            events: self.newest_age::<Event>().await,
            associations: self.newest_age::<Association>().await,
            tags: self.newest_age::<Tag>().await,
            users: self.newest_age::<UserProfile>().await,
        }
    }

    /// Check whether any core table is missing or older than `window`
    pub async fn any_stale(&self, window: Duration) -> bool {
        let cutoff = Utc::now() - window;
        let newest = [
            self.newest_sync::<Event>().await,
            self.newest_sync::<Association>().await,
            self.newest_sync::<Tag>().await,
        ];
        newest.iter().any(|n| n.map_or(true, |at| at < cutoff))
    }

    async fn newest_sync<E: CacheEntity>(&self) -> Option<DateTime<Utc>> {
        match self.get_all::<E>().await {
            Ok(records) => records.into_iter().map(|r| r.last_synced_at).max(),
            Err(e) => {
                debug!(table = E::TABLE, error = %e, "Failed to load cache for staleness check");
                None
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheAges {
    pub events: Option<String>,
    pub associations: Option<String>,
    pub tags: Option<String>,
    pub users: Option<String>,
}

impl CacheAges {
    pub fn events_age(&self) -> String {
        self.events.clone().unwrap_or_else(|| "never".to_string())
    }

    /// Returns the first known age across the core tables
    pub fn last_updated(&self) -> String {
        [&self.events, &self.associations, &self.tags, &self.users]
            .into_iter()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "never".to_string())
    }
}

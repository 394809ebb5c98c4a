//! In-memory backend used by repository and navigator tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::source::{RemoteResult, RemoteSource};
use super::RemoteError;
use crate::models::{Association, AssociationHeader, Event, Tag, UserProfile};

#[derive(Default)]
struct Tables {
    events: BTreeMap<String, Event>,
    associations: BTreeMap<String, Association>,
    tags: BTreeMap<String, Tag>,
    users: BTreeMap<String, UserProfile>,
    participants: BTreeSet<(String, String)>,
}

pub struct MemoryRemote {
    tables: Mutex<Tables>,
    available: AtomicBool,
    writes: AtomicUsize,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            available: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        }
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going down (every call fails with a timeout).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn seed_event(&self, event: Event) {
        self.tables.lock().unwrap().events.insert(event.id.clone(), event);
    }

    pub fn seed_tag(&self, tag: Tag) {
        self.tables.lock().unwrap().tags.insert(tag.id.clone(), tag);
    }

    pub fn seed_user(&self, user: UserProfile) {
        self.tables.lock().unwrap().users.insert(user.id.clone(), user);
    }

    pub fn seed_association(&self, association: Association) {
        self.tables
            .lock()
            .unwrap()
            .associations
            .insert(association.id.clone(), association);
    }

    pub fn event(&self, id: &str) -> Option<Event> {
        self.tables.lock().unwrap().events.get(id).cloned()
    }

    pub fn user(&self, id: &str) -> Option<UserProfile> {
        self.tables.lock().unwrap().users.get(id).cloned()
    }

    pub fn participant_count(&self, event_id: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .participants
            .iter()
            .filter(|(_, e)| e == event_id)
            .count()
    }

    fn check(&self) -> RemoteResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Timeout)
        }
    }

    fn write(&self) -> RemoteResult<std::sync::MutexGuard<'_, Tables>> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.lock().unwrap())
    }

    fn read(&self) -> RemoteResult<std::sync::MutexGuard<'_, Tables>> {
        self.check()?;
        Ok(self.tables.lock().unwrap())
    }
}

fn not_found(table: &str, id: &str) -> RemoteError {
    RemoteError::NotFound(format!("{} {}", table, id))
}

#[async_trait]
impl RemoteSource for MemoryRemote {
    async fn get_event(&self, id: &str) -> RemoteResult<Event> {
        self.read()?
            .events
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("events", id))
    }

    async fn get_all_events(&self) -> RemoteResult<Vec<Event>> {
        Ok(self.read()?.events.values().cloned().collect())
    }

    async fn set_event(&self, event: &Event) -> RemoteResult<()> {
        self.write()?.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn get_association(&self, id: &str) -> RemoteResult<Association> {
        self.read()?
            .associations
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("associations", id))
    }

    async fn get_all_associations(&self) -> RemoteResult<Vec<Association>> {
        Ok(self.read()?.associations.values().cloned().collect())
    }

    async fn get_association_headers(&self) -> RemoteResult<Vec<AssociationHeader>> {
        Ok(self.read()?.associations.values().map(Association::header).collect())
    }

    async fn set_association(&self, association: &Association) -> RemoteResult<()> {
        self.write()?
            .associations
            .insert(association.id.clone(), association.clone());
        Ok(())
    }

    async fn get_tag(&self, id: &str) -> RemoteResult<Tag> {
        self.read()?
            .tags
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("tags", id))
    }

    async fn get_all_tags(&self) -> RemoteResult<Vec<Tag>> {
        Ok(self.read()?.tags.values().cloned().collect())
    }

    async fn get_sub_tags(&self, parent_id: &str) -> RemoteResult<Vec<Tag>> {
        Ok(self
            .read()?
            .tags
            .values()
            .filter(|t| t.is_child_of(parent_id))
            .cloned()
            .collect())
    }

    async fn set_tag(&self, tag: &Tag) -> RemoteResult<()> {
        self.write()?.tags.insert(tag.id.clone(), tag.clone());
        Ok(())
    }

    async fn get_user(&self, id: &str) -> RemoteResult<UserProfile> {
        self.read()?
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("users", id))
    }

    async fn get_all_users(&self) -> RemoteResult<Vec<UserProfile>> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    async fn set_user(&self, user: &UserProfile) -> RemoteResult<()> {
        self.write()?.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_joined_events(&self, user_id: &str) -> RemoteResult<Vec<Event>> {
        let tables = self.read()?;
        Ok(tables
            .participants
            .iter()
            .filter(|(u, _)| u == user_id)
            .filter_map(|(_, e)| tables.events.get(e).cloned())
            .collect())
    }

    async fn add_participant(&self, user_id: &str, event_id: &str) -> RemoteResult<()> {
        self.write()?
            .participants
            .insert((user_id.to_string(), event_id.to_string()));
        Ok(())
    }

    async fn remove_participant(&self, user_id: &str, event_id: &str) -> RemoteResult<()> {
        self.write()?
            .participants
            .remove(&(user_id.to_string(), event_id.to_string()));
        Ok(())
    }
}

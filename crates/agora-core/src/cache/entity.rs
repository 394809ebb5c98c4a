use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::{Association, Event, Tag, UserPreferences, UserProfile};

/// A value the `CacheStore` can persist, one table per implementing type.
pub trait CacheEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table (file) name in the cache directory.
    const TABLE: &'static str;

    /// Human-readable entity name used in errors and logs.
    const KIND: &'static str;

    /// Primary key within the table.
    fn cache_id(&self) -> &str;
}

/// Event ids a user has joined, as last seen on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedEvents {
    pub user_id: String,
    pub event_ids: Vec<String>,
}

/// Child tag ids of a tag, as last seen on the backend.
///
/// Kept separately from the tag rows so that "no children" can be told
/// apart from "children never fetched".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagChildren {
    pub parent_id: String,
    pub tag_ids: Vec<String>,
}

/// Marks that a table's full listing was fetched from the backend.
///
/// Lets an empty listing read offline as empty rather than as "never
/// fetched". Swept like any other row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableListing {
    pub table: String,
}

impl CacheEntity for Event {
    const TABLE: &'static str = "events";
    const KIND: &'static str = "event";

    fn cache_id(&self) -> &str {
        &self.id
    }
}

impl CacheEntity for Association {
    const TABLE: &'static str = "associations";
    const KIND: &'static str = "association";

    fn cache_id(&self) -> &str {
        &self.id
    }
}

impl CacheEntity for Tag {
    const TABLE: &'static str = "tags";
    const KIND: &'static str = "tag";

    fn cache_id(&self) -> &str {
        &self.id
    }
}

impl CacheEntity for UserProfile {
    const TABLE: &'static str = "users";
    const KIND: &'static str = "user";

    fn cache_id(&self) -> &str {
        &self.id
    }
}

impl CacheEntity for UserPreferences {
    const TABLE: &'static str = "preferences";
    const KIND: &'static str = "preferences";

    fn cache_id(&self) -> &str {
        &self.user_id
    }
}

impl CacheEntity for JoinedEvents {
    const TABLE: &'static str = "joined_events";
    const KIND: &'static str = "joined events";

    fn cache_id(&self) -> &str {
        &self.user_id
    }
}

impl CacheEntity for TagChildren {
    const TABLE: &'static str = "tag_children";
    const KIND: &'static str = "sub tags";

    fn cache_id(&self) -> &str {
        &self.parent_id
    }
}

impl CacheEntity for TableListing {
    const TABLE: &'static str = "listings";
    const KIND: &'static str = "listing";

    fn cache_id(&self) -> &str {
        &self.table
    }
}

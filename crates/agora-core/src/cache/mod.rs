//! Local caching module for offline data access.
//!
//! This module provides the `CacheStore`, an on-device mirror of the
//! remote entities, and the `BlobCache` for arbitrary binary payloads.
//! Entities are cached in JSON format, one file per table, and every row
//! carries the time it was last confirmed against the backend.
//!
//! Cached tables include:
//! - Events, Associations, Tags, User profiles
//! - Derived views: joined events per user, children per tag, fetched
//!   listings
//! - Local-only user preferences

pub mod blob;
pub mod entity;
pub mod record;
pub mod store;

pub use blob::BlobCache;
pub use entity::{CacheEntity, JoinedEvents, TableListing, TagChildren};
pub use record::{CachedRecord, SyncState};
pub use store::{CacheAges, CacheStore};

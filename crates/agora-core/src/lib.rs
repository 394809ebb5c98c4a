//! Agora core - offline-capable data synchronization for the Agora events app.
//!
//! The crate reconciles a hosted relational backend with an on-device cache
//! so the rest of the application can read and write events, associations,
//! tags and user profiles without reasoning about connectivity.
//!
//! - `connectivity`: reachability observer driving online/offline decisions
//! - `remote`: the authoritative backend (`RemoteSource`, `RestRemote`)
//! - `cache`: the local mirror (`CacheStore`) and the `BlobCache`
//! - `repository`: the read-through/write-through façade callers use
//! - `tags`: hierarchical tag navigation over the repository

pub mod auth;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod remote;
pub mod repository;
pub mod tags;

pub use cache::{BlobCache, CacheStore, CachedRecord, SyncState};
pub use config::{Config, SyncSettings};
pub use connectivity::{ConnectivityObserver, HttpPollMonitor, ManualMonitor, NetworkMonitor};
pub use error::{SyncError, SyncResult};
pub use remote::{RemoteError, RemoteSource, RestRemote};
pub use repository::{Repository, SweepReport};
pub use tags::{NavigatorState, TagNavigator};

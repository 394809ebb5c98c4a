//! Domain entities for the Agora sync layer.
//!
//! - `Event`, `Location`, `Coordinate`: scheduled events and where they happen
//! - `Association`, `AssociationHeader`: organizing associations
//! - `Tag`: the tag forest used to classify events and associations
//! - `UserProfile`, `Section`, `Semester`: user profiles and interests
//! - `UserPreferences`: device-local UI settings, never sent to the backend

pub mod association;
pub mod event;
pub mod preferences;
pub mod tag;
pub mod user;

pub use association::{Association, AssociationHeader};
pub use event::{Coordinate, Event, Location};
pub use preferences::UserPreferences;
pub use tag::{Tag, DEFAULT_MAX_DEPTH, ROOT_TAG_ID};
pub use user::{Section, Semester, UserProfile};

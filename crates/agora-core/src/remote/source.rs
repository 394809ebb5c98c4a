use async_trait::async_trait;

use super::RemoteError;
use crate::models::{Association, AssociationHeader, Event, Tag, UserProfile};

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// The authoritative backend.
///
/// `get_*` fails with `RemoteError::NotFound` when the row is absent;
/// `set_*` upserts by primary key, so repeating a call with identical
/// content changes nothing. Implementations serialize their own connection
/// access and are safe to call from several tasks at once.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch an event with its creator, organizer and tags resolved.
    async fn get_event(&self, id: &str) -> RemoteResult<Event>;
    async fn get_all_events(&self) -> RemoteResult<Vec<Event>>;
    /// Upsert an event and make its tag links match `event.tags` exactly.
    async fn set_event(&self, event: &Event) -> RemoteResult<()>;

    async fn get_association(&self, id: &str) -> RemoteResult<Association>;
    async fn get_all_associations(&self) -> RemoteResult<Vec<Association>>;
    async fn get_association_headers(&self) -> RemoteResult<Vec<AssociationHeader>>;
    async fn set_association(&self, association: &Association) -> RemoteResult<()>;

    async fn get_tag(&self, id: &str) -> RemoteResult<Tag>;
    async fn get_all_tags(&self) -> RemoteResult<Vec<Tag>>;
    async fn get_sub_tags(&self, parent_id: &str) -> RemoteResult<Vec<Tag>>;
    async fn set_tag(&self, tag: &Tag) -> RemoteResult<()>;

    async fn get_user(&self, id: &str) -> RemoteResult<UserProfile>;
    async fn get_all_users(&self) -> RemoteResult<Vec<UserProfile>>;
    async fn set_user(&self, user: &UserProfile) -> RemoteResult<()>;

    /// Events the user participates in.
    async fn get_joined_events(&self, user_id: &str) -> RemoteResult<Vec<Event>>;
    /// Insert a participation link. Inserting an existing link is a no-op.
    async fn add_participant(&self, user_id: &str, event_id: &str) -> RemoteResult<()>;
    /// Delete a participation link. Deleting a missing link is a no-op.
    async fn remove_participant(&self, user_id: &str, event_id: &str) -> RemoteResult<()>;
}

//! Typed wire rows exchanged with the backend, and their mapping into
//! domain entities.
//!
//! Rows mirror the backend tables column for column. Nested relations come
//! back as embedded objects; a relation that resolves to `null` maps to
//! `RemoteError::NotFound` instead of a decode failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::RemoteError;
use crate::models::{
    Association, AssociationHeader, Coordinate, Event, Location, Section, Semester, Tag,
    UserProfile,
};

pub const EVENTS: &str = "events";
pub const ASSOCIATIONS: &str = "associations";
pub const TAGS: &str = "tags";
pub const USERS: &str = "users";
pub const EVENT_TAGS: &str = "event_tags";
pub const ASSOCIATION_TAGS: &str = "association_tags";
pub const EVENT_PARTICIPANTS: &str = "event_participants";

/// Event projection with creator, organizer and tags inlined.
pub const EVENT_SELECT: &str = "*,creator:users!creator_id(*),organizer:associations!organizer_id(id,name),tags:event_tags(tag:tags(*))";

/// Association projection with tags inlined.
pub const ASSOCIATION_SELECT: &str = "*,tags:association_tags(tag:tags(*))";

// ===== Tags =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
        }
    }
}

impl From<&Tag> for TagRow {
    fn from(tag: &Tag) -> Self {
        TagRow {
            id: tag.id.clone(),
            name: tag.name.clone(),
            parent_id: tag.parent_id.clone(),
        }
    }
}

/// One row of a link table with the linked tag inlined.
#[derive(Debug, Deserialize)]
pub struct TagLinkRow {
    pub tag: Option<TagRow>,
}

fn resolve_tags(links: Vec<TagLinkRow>, owner: &str) -> Result<Vec<Tag>, RemoteError> {
    links
        .into_iter()
        .map(|link| {
            link.tag
                .map(Tag::from)
                .ok_or_else(|| RemoteError::NotFound(format!("tag linked from {}", owner)))
        })
        .collect()
}

// ===== Users =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub committees: Vec<String>,
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        let section = row.section.as_deref().and_then(|code| {
            let parsed = Section::from_code(code);
            if parsed.is_none() {
                warn!(user = %row.id, section = code, "Unknown section code");
            }
            parsed
        });
        let semester = row.semester.as_deref().and_then(|code| {
            let parsed = Semester::from_code(code);
            if parsed.is_none() {
                warn!(user = %row.id, semester = code, "Unknown semester code");
            }
            parsed
        });
        UserProfile {
            id: row.id,
            name: row.name,
            section,
            semester,
            interests: row.interests,
            committees: row.committees,
            subscriptions: row.subscriptions,
        }
    }
}

impl From<&UserProfile> for UserRow {
    fn from(user: &UserProfile) -> Self {
        UserRow {
            id: user.id.clone(),
            name: user.name.clone(),
            section: user.section.map(|s| s.code().to_string()),
            semester: user.semester.map(|s| s.code().to_string()),
            interests: user.interests.clone(),
            committees: user.committees.clone(),
            subscriptions: user.subscriptions.clone(),
        }
    }
}

// ===== Associations =====

#[derive(Debug, Deserialize)]
pub struct AssociationRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagLinkRow>,
}

impl AssociationRow {
    pub fn into_domain(self) -> Result<Association, RemoteError> {
        let tags = resolve_tags(self.tags, &self.id)?;
        Ok(Association {
            id: self.id,
            name: self.name,
            description: self.description.unwrap_or_default(),
            url: self.url,
            tags,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AssociationHeaderRow {
    pub id: String,
    pub name: String,
}

impl From<AssociationHeaderRow> for AssociationHeader {
    fn from(row: AssociationHeaderRow) -> Self {
        AssociationHeader {
            id: row.id,
            name: row.name,
        }
    }
}

/// Columns written when upserting an association.
#[derive(Debug, Serialize)]
pub struct AssociationRecord<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub url: Option<&'a str>,
}

impl<'a> From<&'a Association> for AssociationRecord<'a> {
    fn from(association: &'a Association) -> Self {
        AssociationRecord {
            id: &association.id,
            name: &association.name,
            description: &association.description,
            url: association.url.as_deref(),
        }
    }
}

// ===== Events =====

#[derive(Debug, Deserialize)]
pub struct EventRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub participant_count: u32,
    pub max_participants: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    pub creator: Option<UserRow>,
    pub organizer: Option<AssociationHeaderRow>,
    #[serde(default)]
    pub tags: Vec<TagLinkRow>,
}

impl EventRow {
    pub fn into_domain(self) -> Result<Event, RemoteError> {
        let creator = self
            .creator
            .ok_or_else(|| RemoteError::NotFound(format!("creator of event {}", self.id)))?;
        let organizer = self
            .organizer
            .ok_or_else(|| RemoteError::NotFound(format!("organizer of event {}", self.id)))?;
        let tags = resolve_tags(self.tags, &self.id)?;
        Ok(Event {
            id: self.id,
            creator: creator.into(),
            organizer: organizer.into(),
            title: self.title,
            description: self.description.unwrap_or_default(),
            location: Location {
                name: self.location_name,
                coordinate: Coordinate {
                    latitude: self.latitude,
                    longitude: self.longitude,
                },
            },
            start_date: self.start_date,
            end_date: self.end_date,
            tags,
            participant_count: self.participant_count,
            max_participants: self.max_participants,
            image_url: self.image_url,
        })
    }
}

/// Columns written when upserting an event. Relations are written as
/// foreign keys; tag links go through `EventTagLink`.
#[derive(Debug, Serialize)]
pub struct EventRecord<'a> {
    pub id: &'a str,
    pub creator_id: &'a str,
    pub organizer_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub location_name: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub participant_count: u32,
    pub max_participants: u32,
    pub image_url: Option<&'a str>,
}

impl<'a> From<&'a Event> for EventRecord<'a> {
    fn from(event: &'a Event) -> Self {
        EventRecord {
            id: &event.id,
            creator_id: &event.creator.id,
            organizer_id: &event.organizer.id,
            title: &event.title,
            description: &event.description,
            location_name: &event.location.name,
            latitude: event.location.coordinate.latitude,
            longitude: event.location.coordinate.longitude,
            start_date: event.start_date,
            end_date: event.end_date,
            participant_count: event.participant_count,
            max_participants: event.max_participants,
            image_url: event.image_url.as_deref(),
        }
    }
}

// ===== Link tables =====

#[derive(Debug, Serialize)]
pub struct EventTagLink<'a> {
    pub event_id: &'a str,
    pub tag_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AssociationTagLink<'a> {
    pub association_id: &'a str,
    pub tag_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ParticipantLink<'a> {
    pub user_id: &'a str,
    pub event_id: &'a str,
}

/// One `event_participants` row with the event inlined.
#[derive(Debug, Deserialize)]
pub struct ParticipationRow {
    pub event: Option<EventRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_JSON: &str = r#"{
        "id": "a",
        "creator_id": "u1",
        "organizer_id": "clic",
        "title": "Hackathon",
        "description": null,
        "location_name": "BC",
        "latitude": 46.5,
        "longitude": 6.5,
        "start_date": "2026-03-14T18:00:00+00:00",
        "end_date": "2026-03-15T18:00:00+00:00",
        "participant_count": 8,
        "max_participants": 8,
        "image_url": null,
        "creator": {"id": "u1", "name": "Ada", "section": "IN", "semester": "MA1",
                    "interests": ["code"], "committees": [], "subscriptions": ["clic"]},
        "organizer": {"id": "clic", "name": "CLIC"},
        "tags": [{"tag": {"id": "code", "name": "Code", "parent_id": "root"}}]
    }"#;

    #[test]
    fn test_event_row_resolves_relations() {
        let row: EventRow = serde_json::from_str(EVENT_JSON).unwrap();
        let event = row.into_domain().unwrap();

        assert_eq!(event.creator.name, "Ada");
        assert_eq!(event.creator.section, Some(Section::ComputerScience));
        assert_eq!(event.creator.semester, Some(Semester::MA1));
        assert_eq!(event.organizer.name, "CLIC");
        assert_eq!(event.tags, vec![Tag::new("code", "Code", Some("root"))]);
        assert_eq!(event.description, "");
        assert!(event.is_full());
    }

    #[test]
    fn test_missing_creator_is_not_found() {
        let mut value: serde_json::Value = serde_json::from_str(EVENT_JSON).unwrap();
        value["creator"] = serde_json::Value::Null;
        let row: EventRow = serde_json::from_value(value).unwrap();
        assert!(matches!(row.into_domain(), Err(RemoteError::NotFound(_))));
    }

    #[test]
    fn test_dangling_tag_link_is_not_found() {
        let json = r#"{"id": "agepoly", "name": "AGEPoly", "tags": [{"tag": null}]}"#;
        let row: AssociationRow = serde_json::from_str(json).unwrap();
        assert!(matches!(row.into_domain(), Err(RemoteError::NotFound(_))));
    }

    #[test]
    fn test_unknown_section_is_dropped() {
        let row: UserRow =
            serde_json::from_str(r#"{"id": "u", "name": "N", "section": "ZZ"}"#).unwrap();
        let user = UserProfile::from(row);
        assert_eq!(user.section, None);
        assert!(user.interests.is_empty());
    }

    #[test]
    fn test_event_record_writes_foreign_keys() {
        let row: EventRow = serde_json::from_str(EVENT_JSON).unwrap();
        let event = row.into_domain().unwrap();
        let value = serde_json::to_value(EventRecord::from(&event)).unwrap();
        assert_eq!(value["creator_id"], "u1");
        assert_eq!(value["organizer_id"], "clic");
        assert!(value.get("tags").is_none());
    }
}

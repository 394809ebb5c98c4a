use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AssociationHeader, Tag, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub creator: UserProfile,
    pub organizer: AssociationHeader,
    pub title: String,
    pub description: String,
    pub location: Location,
    #[serde(rename = "startDate")]
    pub start_date: DateTime<Utc>,
    #[serde(rename = "endDate")]
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(rename = "participantCount", default)]
    pub participant_count: u32,
    #[serde(rename = "maxParticipants")]
    pub max_participants: u32,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
}

impl Event {
    /// Check the domain invariants that must hold before a write is accepted.
    pub fn validate(&self) -> Result<(), String> {
        if self.start_date > self.end_date {
            return Err(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            ));
        }
        if self.participant_count > self.max_participants {
            return Err(format!(
                "{} participants exceeds capacity of {}",
                self.participant_count, self.max_participants
            ));
        }
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.participant_count >= self.max_participants
    }

    pub fn spots_left(&self) -> u32 {
        self.max_participants.saturating_sub(self.participant_count)
    }

    pub fn tag_ids(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.id.as_str()).collect()
    }

    pub fn formatted_date(&self) -> String {
        if self.start_date.date_naive() == self.end_date.date_naive() {
            format!(
                "{} {}-{}",
                self.start_date.format("%b %d, %Y"),
                self.start_date.format("%H:%M"),
                self.end_date.format("%H:%M")
            )
        } else {
            format!(
                "{} - {}",
                self.start_date.format("%b %d, %Y"),
                self.end_date.format("%b %d, %Y")
            )
        }
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.end_date < now
    }
}

//! Row types for the registration tables.
//!
//! DESIGN
//! ======
//! Field names mirror the REST column names so rows deserialize directly.
//! Embedded relations (`classes`, `events`, `teams`, ...) are modelled as
//! wrapper structs that flatten the base row.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// PROFILE
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub team_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Profile {
    /// "First Last", trimmed; empty when neither part is set.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_owned()
    }
}

/// Partial profile update. Unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    /// ISO date or timestamp, as stored.
    pub date_start: String,
    pub date_end: String,
    pub status: EventStatus,
    pub visibility: Visibility,
    pub venue: Option<String>,
    pub description: Option<String>,
    pub hero_image_url: Option<String>,
}

/// A class entrants can register for within an event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventClass {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub price: f64,
    pub capacity: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventWithClasses {
    #[serde(flatten)]
    pub event: Event,
    #[serde(default)]
    pub classes: Vec<EventClass>,
}

// =============================================================================
// ENTRIES
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Confirmed,
    Waitlist,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub event_id: Uuid,
    pub class_id: Uuid,
    pub profile: Uuid,
    pub status: EntryStatus,
    pub driver_name: String,
    pub driver_email: String,
    pub kart_number: Option<String>,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryWithEvent {
    #[serde(flatten)]
    pub entry: Entry,
    pub events: Event,
}

/// Insert payload for a new entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewEntry {
    pub event_id: Uuid,
    pub class_id: Uuid,
    pub profile: Uuid,
    pub driver_name: String,
    pub driver_email: String,
    pub kart_number: Option<String>,
    pub status: EntryStatus,
}

// =============================================================================
// TEAMS
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamStatus {
    Active,
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub logo: Option<String>,
    pub owner: Option<Uuid>,
    pub status: TeamStatus,
    pub created_at: String,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: Uuid,
    pub team: Uuid,
    pub profile: Uuid,
    #[serde(default)]
    pub role: Vec<String>,
    pub created_at: String,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

/// One of the caller's memberships, with its team embedded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(flatten)]
    pub member: TeamMember,
    pub teams: Team,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberWithProfile {
    #[serde(flatten)]
    pub member: TeamMember,
    pub profiles: Option<Profile>,
}

/// A team with its roster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamDetail {
    #[serde(flatten)]
    pub team: Team,
    #[serde(default)]
    pub team_members: Vec<MemberWithProfile>,
}

/// Partial team update. `updated_by` is stamped by the API layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TeamUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TeamStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<Uuid>,
}

// =============================================================================
// DOCUMENTS
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    License,
    Insurance,
    Medical,
    Tech,
}

impl DocumentType {
    pub const ALL: [Self; 4] = [Self::License, Self::Insurance, Self::Medical, Self::Tech];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::License => "license",
            Self::Insurance => "insurance",
            Self::Medical => "medical",
            Self::Tech => "tech",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::License => "Racing License",
            Self::Insurance => "Insurance",
            Self::Medical => "Medical Certificate",
            Self::Tech => "Tech Inspection",
        }
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown document type: {s}"))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub entry_id: Option<Uuid>,
    pub profile: Option<Uuid>,
    pub file_name: String,
    /// Object path inside the `documents` bucket.
    pub file_url: String,
    pub document_type: String,
    pub created_at: String,
}

/// Insert payload for a new document row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewDocument {
    pub profile: Uuid,
    pub document_type: DocumentType,
    pub file_name: String,
    pub file_url: String,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

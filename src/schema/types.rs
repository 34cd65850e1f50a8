//! Type definitions for the event-listing tables

use crate::record_id::RecordId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record type stored in its own table
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table the records live in
    const TABLE: &'static str;

    /// Record id, `None` before the record is created
    fn id(&self) -> Option<&RecordId>;
}

/// An event in the listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Title of the event
    pub title: String,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Start of the event
    pub date_start: DateTime<Utc>,
    /// End of the event, if it spans a period
    #[serde(default)]
    pub date_end: Option<DateTime<Utc>>,
    /// Venue
    #[serde(default)]
    pub location: Option<RecordId>,
    /// Organizer running the event
    #[serde(default)]
    pub organizer: Option<RecordId>,
    /// Topics the event is listed under
    #[serde(default)]
    pub topics: Vec<RecordId>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub more_info_link: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Event {
    /// Create an unsaved event with only a title and start time
    pub fn new(title: impl Into<String>, date_start: DateTime<Utc>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            date_start,
            date_end: None,
            location: None,
            organizer: None,
            topics: Vec::new(),
            price: None,
            more_info_link: None,
            image_url: None,
        }
    }

    /// Whether the event has not finished at `now`
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.date_end.unwrap_or(self.date_start) >= now
    }
}

impl Entity for Event {
    const TABLE: &'static str = "event";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }
}

/// A venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub plz: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    /// Latitude, WGS84
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude, WGS84
    #[serde(default)]
    pub lng: Option<f64>,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            street: None,
            plz: None,
            city: None,
            lat: None,
            lng: None,
        }
    }
}

impl Entity for Location {
    const TABLE: &'static str = "location";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }
}

/// A club, office or company that runs events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organizer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl Organizer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: None,
            phone: None,
            website: None,
        }
    }
}

impl Entity for Organizer {
    const TABLE: &'static str = "organizer";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }
}

/// A category events are grouped under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Display color as a CSS hex string
    #[serde(default)]
    pub color: Option<String>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            color: None,
        }
    }
}

impl Entity for Topic {
    const TABLE: &'static str = "topic";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }
}

//! Event queries
//!
//! [`EventService`] is the entity service for `event` plus the filtered
//! listings the public pages need. Every listing is a cached `query:` read,
//! so any write to any table drops them.

use crate::db::QueryParams;
use crate::error::Result;
use crate::record_id::RecordId;
use crate::repository::CachedRepository;
use crate::schema::service::EntityService;
use crate::schema::types::Event;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::ops::Deref;

pub const SEARCH_QUERY: &str =
    "SELECT * FROM event WHERE title @@ $term OR description @@ $term ORDER BY date_start ASC";
pub const BY_LOCATION_QUERY: &str =
    "SELECT * FROM event WHERE location = type::thing($location) ORDER BY date_start ASC";
pub const BY_ORGANIZER_QUERY: &str =
    "SELECT * FROM event WHERE organizer = type::thing($organizer) ORDER BY date_start ASC";
pub const BY_TOPIC_QUERY: &str =
    "SELECT * FROM event WHERE type::thing($topic) INSIDE topics ORDER BY date_start ASC";
pub const UPCOMING_QUERY: &str =
    "SELECT * FROM event WHERE (date_end ?? date_start) >= <datetime>$now ORDER BY date_start ASC";

/// Events with search and filtered listings
#[derive(Clone)]
pub struct EventService {
    entities: EntityService<Event>,
}

impl Deref for EventService {
    type Target = EntityService<Event>;

    fn deref(&self) -> &Self::Target {
        &self.entities
    }
}

impl EventService {
    pub fn new(repo: CachedRepository) -> Self {
        Self {
            entities: EntityService::new(repo),
        }
    }

    /// Fulltext search over title and description
    ///
    /// Results are kept for the shorter search TTL. A blank term lists
    /// every event.
    pub async fn search(&self, term: &str) -> Result<Vec<Event>> {
        let term = term.trim();
        if term.is_empty() {
            return self.list().await;
        }

        self.repository()
            .search_as(SEARCH_QUERY, &param("term", term))
            .await
    }

    pub async fn by_location(&self, location: &RecordId) -> Result<Vec<Event>> {
        self.filtered(BY_LOCATION_QUERY, "location", location).await
    }

    pub async fn by_organizer(&self, organizer: &RecordId) -> Result<Vec<Event>> {
        self.filtered(BY_ORGANIZER_QUERY, "organizer", organizer)
            .await
    }

    pub async fn by_topic(&self, topic: &RecordId) -> Result<Vec<Event>> {
        self.filtered(BY_TOPIC_QUERY, "topic", topic).await
    }

    /// Events that have not ended at `now`, soonest first
    ///
    /// `now` is truncated to the minute so calls within the same minute
    /// share one cached result.
    pub async fn upcoming(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let now = now.format("%Y-%m-%dT%H:%M:00Z").to_string();
        self.repository()
            .query_as(UPCOMING_QUERY, &param("now", &now))
            .await
    }

    async fn filtered(&self, sql: &str, name: &str, id: &RecordId) -> Result<Vec<Event>> {
        self.repository()
            .query_as(sql, &param(name, &id.to_string()))
            .await
    }
}

fn param(name: &str, value: &str) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert(name.to_string(), Value::String(value.to_string()));
    params
}

//! Event-listing schema module
//!
//! This module defines the record types of the listings (events, locations,
//! organizers and topics) and the cached services that read and write them.

pub mod event;
pub mod service;
pub mod types;

pub use event::EventService;
pub use service::{EntityService, LocationService, OrganizerService, TopicService};
pub use types::{Entity, Event, Location, Organizer, Topic};

//! Saved events
//!
//! The ids of events a visitor has saved are persisted as a JSON array
//! under [`SAVED_EVENTS_KEY`] and published through a single watch channel
//! that every favorites widget subscribes to.

use crate::error::Result;
use crate::record_id::RecordId;
use crate::storage::LocalStorage;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Storage key of the saved list
pub const SAVED_EVENTS_KEY: &str = "saved_events";

/// Ordered, duplicate-free list of saved events
#[derive(Clone)]
pub struct FavoriteService {
    storage: Arc<dyn LocalStorage>,
    saved: Arc<watch::Sender<Vec<RecordId>>>,
}

impl FavoriteService {
    /// Load the saved list from `storage`
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        let initial = load(storage.as_ref());
        debug!("Loaded {} saved events", initial.len());

        let (saved, _) = watch::channel(initial);
        Self {
            storage,
            saved: Arc::new(saved),
        }
    }

    /// Append `id` unless it is already saved
    pub fn save(&self, id: &RecordId) -> Result<()> {
        self.modify(|ids| {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        })
    }

    pub fn unsave(&self, id: &RecordId) -> Result<()> {
        self.modify(|ids| ids.retain(|saved| saved != id))
    }

    /// Flip the saved state of `id`, returning whether it is now saved
    pub fn toggle(&self, id: &RecordId) -> Result<bool> {
        let mut now_saved = false;
        self.modify(|ids| match ids.iter().position(|saved| saved == id) {
            Some(index) => {
                ids.remove(index);
            }
            None => {
                ids.push(id.clone());
                now_saved = true;
            }
        })?;
        Ok(now_saved)
    }

    pub fn is_saved(&self, id: &RecordId) -> bool {
        self.saved.borrow().contains(id)
    }

    pub fn saved(&self) -> Vec<RecordId> {
        self.saved.borrow().clone()
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove_item(SAVED_EVENTS_KEY)?;
        self.saved.send_replace(Vec::new());
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<RecordId>> {
        self.saved.subscribe()
    }

    /// Read the stored list, apply `change`, write it back and publish it
    fn modify(&self, change: impl FnOnce(&mut Vec<RecordId>)) -> Result<()> {
        let mut ids = load(self.storage.as_ref());
        change(&mut ids);

        let encoded = serde_json::to_string(&ids)?;
        self.storage.set_item(SAVED_EVENTS_KEY, &encoded)?;

        self.saved.send_replace(ids);
        Ok(())
    }
}

/// Stored list, empty when missing or unreadable
fn load(storage: &dyn LocalStorage) -> Vec<RecordId> {
    let raw = match storage.get_item(SAVED_EVENTS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Failed to read saved events: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<RecordId>>(&raw) {
        Ok(mut ids) => {
            let mut seen = std::collections::HashSet::new();
            ids.retain(|id| seen.insert(id.clone()));
            ids
        }
        Err(e) => {
            warn!("Discarding unreadable saved events: {}", e);
            Vec::new()
        }
    }
}

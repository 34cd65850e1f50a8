//! Current navigation path
//!
//! Reads made while the path is under `/admin` go straight to the database.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

const ADMIN_PREFIX: &str = "/admin";

/// The path the application is currently showing
///
/// Clones share the same channel, so a navigation through one handle is
/// seen by every other handle and subscriber.
#[derive(Debug, Clone)]
pub struct CurrentRoute {
    tx: Arc<watch::Sender<String>>,
}

impl CurrentRoute {
    pub fn new(path: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(path.into());
        Self { tx: Arc::new(tx) }
    }

    pub fn navigate(&self, path: impl Into<String>) {
        let path = path.into();
        debug!("Navigating to {}", path);
        self.tx.send_replace(path);
    }

    pub fn path(&self) -> String {
        self.tx.borrow().clone()
    }

    /// Whether the current path is part of the backoffice
    pub fn is_admin(&self) -> bool {
        self.tx.borrow().starts_with(ADMIN_PREFIX)
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for CurrentRoute {
    fn default() -> Self {
        Self::new("/")
    }
}

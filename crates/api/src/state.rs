//! Shared application state for the Axum API server.

use std::sync::Arc;

use confernet_notifier::{MailTransport, Notifier};
use confernet_store::DocumentStore;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, transport: Arc<dyn MailTransport>) -> Self {
        let notifier = Notifier::new(store.clone(), transport);
        Self { store, notifier }
    }
}

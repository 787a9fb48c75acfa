//! ConferNet HTTP API: registration, users, events and their notifications.

pub mod routes;
pub mod state;

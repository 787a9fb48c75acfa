//! Shared building blocks for the ConferNet backend: configuration, error
//! types, domain records and timestamp handling.

pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod types;

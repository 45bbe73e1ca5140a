//! HTTP client for the ohsome API and its response bodies.

pub mod client;
pub mod types;

pub use client::{DEFAULT_BASE_URL, OhsomeClient};

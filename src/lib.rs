//! Geocoding client for LocationIQ-style providers.
//!
//! Forward geocoding, reverse geocoding and autocomplete suggestions, each
//! normalized into validated result types with a typed error taxonomy.

pub mod geocoding;
pub mod server;

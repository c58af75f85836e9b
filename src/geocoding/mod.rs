//! Geocoding subsystem.
//!
//! Wraps a LocationIQ-style HTTP API for forward geocoding, reverse
//! geocoding and autocomplete, with validated results and typed errors.

pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod transport;
pub mod types;

pub use client::{CancelToken, GeocodingClient, DEFAULT_AUTOCOMPLETE_LIMIT, MAX_AUTOCOMPLETE_LIMIT};
pub use config::ClientConfig;
pub use error::{ErrorKind, GeocodeError};
pub use transport::{Request, Response, Transport, TransportError, UreqTransport};
pub use types::{AddressComponents, AutocompleteErrorPolicy, AutocompleteResult, GeocodingResult};

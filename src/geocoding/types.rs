//! Core types for the geocoding subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured address parts. Providers return sparse data depending on how
/// specific the location is, so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponents {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// ISO 3166-1 alpha-2 code as sent by the provider (usually lowercase).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl AddressComponents {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A forward or reverse geocoding result with validated coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingResult {
    pub latitude: f64,
    pub longitude: f64,
    /// Full formatted address from the provider.
    pub display_name: String,
    #[serde(default)]
    pub address_components: AddressComponents,
}

/// One autocomplete suggestion.
///
/// Unparseable or out-of-range provider coordinates are stored as `0.0`;
/// `coordinates_parsed` tells the origin apart from a missing position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteResult {
    pub place_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub coordinates_parsed: bool,
    pub display_name: String,
    /// Short label, e.g. the business or place name.
    pub display_place: String,
    /// Secondary line, e.g. street and city.
    pub display_address: String,
    #[serde(default)]
    pub address_components: AddressComponents,
}

impl AutocompleteResult {
    /// The coordinate pair, or `None` when the provider sent unusable values.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.coordinates_parsed
            .then_some((self.latitude, self.longitude))
    }
}

/// What autocomplete does when the provider call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutocompleteErrorPolicy {
    /// Log a warning and return no suggestions.
    #[default]
    Empty,
    /// Surface the failure like the other operations.
    Raise,
}

impl std::str::FromStr for AutocompleteErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "raise" => Ok(Self::Raise),
            _ => Err(format!("Unknown autocomplete error policy '{}'. Use 'empty' or 'raise'.", s)),
        }
    }
}

impl fmt::Display for AutocompleteErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Raise => write!(f, "raise"),
        }
    }
}

/// Returns true when both values are finite and inside the WGS84 ranges.
pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

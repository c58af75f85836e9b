//! LocationIQ wire types and their normalization into result types.

use super::error::GeocodeError;
use super::types::{valid_coordinates, AddressComponents, AutocompleteResult, GeocodingResult};
use serde::Deserialize;

pub const SEARCH_PATH: &str = "search.php";
pub const REVERSE_PATH: &str = "reverse.php";
pub const AUTOCOMPLETE_PATH: &str = "autocomplete";

// ─── Wire types ─────────────────────────────────────────────────

/// Coordinates arrive as strings, but some deployments send numbers.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RawCoordinate {
    Text(String),
    Number(f64),
}

impl RawCoordinate {
    fn parse(&self) -> Option<f64> {
        match self {
            Self::Text(s) => s.trim().parse().ok(),
            Self::Number(n) => Some(*n),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub house_number: Option<String>,
    #[serde(default)]
    pub road: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// A search or reverse candidate.
#[derive(Deserialize, Debug, Clone)]
pub struct RawPlace {
    #[serde(default)]
    pub lat: Option<RawCoordinate>,
    #[serde(default)]
    pub lon: Option<RawCoordinate>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub address: Option<RawAddress>,
    /// Set instead of a place when the provider found nothing.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RawSuggestion {
    #[serde(default)]
    pub place_id: Option<PlaceId>,
    #[serde(default)]
    pub lat: Option<RawCoordinate>,
    #[serde(default)]
    pub lon: Option<RawCoordinate>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub display_place: Option<String>,
    #[serde(default)]
    pub display_address: Option<String>,
    #[serde(default)]
    pub address: Option<RawAddress>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PlaceId {
    Text(String),
    Number(u64),
}

impl std::fmt::Display for PlaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

// ─── Normalization ──────────────────────────────────────────────

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn normalize_address(raw: Option<&RawAddress>) -> AddressComponents {
    let Some(a) = raw else {
        return AddressComponents::default();
    };
    AddressComponents {
        street_number: non_empty(&a.house_number),
        street: non_empty(&a.road),
        city: non_empty(&a.city)
            .or_else(|| non_empty(&a.town))
            .or_else(|| non_empty(&a.village)),
        state: non_empty(&a.state),
        postal_code: non_empty(&a.postcode),
        country: non_empty(&a.country),
        country_code: non_empty(&a.country_code),
    }
}

/// Parse a coordinate pair, rejecting missing, non-numeric, non-finite and
/// out-of-range values.
pub fn parse_coordinates(
    lat: Option<&RawCoordinate>,
    lon: Option<&RawCoordinate>,
) -> Result<(f64, f64), String> {
    let lat_raw = lat.ok_or("missing lat")?;
    let lon_raw = lon.ok_or("missing lon")?;
    let latitude = lat_raw
        .parse()
        .ok_or_else(|| format!("lat {:?} is not a number", lat_raw))?;
    let longitude = lon_raw
        .parse()
        .ok_or_else(|| format!("lon {:?} is not a number", lon_raw))?;
    if !valid_coordinates(latitude, longitude) {
        return Err(format!("coordinates ({}, {}) out of range", latitude, longitude));
    }
    Ok((latitude, longitude))
}

/// Take the first search candidate. Empty list means not found.
pub fn first_place(places: Vec<RawPlace>, query: &str) -> Result<GeocodingResult, GeocodeError> {
    let place = places.into_iter().next().ok_or_else(|| GeocodeError::NotFound {
        query: query.to_string(),
        status: None,
    })?;

    let (latitude, longitude) = parse_coordinates(place.lat.as_ref(), place.lon.as_ref())
        .map_err(GeocodeError::MalformedResponse)?;

    Ok(GeocodingResult {
        latitude,
        longitude,
        display_name: place.display_name.unwrap_or_default(),
        address_components: normalize_address(place.address.as_ref()),
    })
}

/// Reverse results echo the requested coordinates; the response only
/// contributes the address.
pub fn reverse_place(place: RawPlace, latitude: f64, longitude: f64) -> Result<GeocodingResult, GeocodeError> {
    if let Some(reason) = non_empty(&place.error) {
        tracing::debug!(lat = latitude, lon = longitude, %reason, "provider found no address");
        return Err(GeocodeError::NotFound {
            query: format!("{}, {}", latitude, longitude),
            status: None,
        });
    }
    let display_name = non_empty(&place.display_name).ok_or_else(|| {
        GeocodeError::MalformedResponse("reverse response has no display_name".into())
    })?;

    Ok(GeocodingResult {
        latitude,
        longitude,
        display_name,
        address_components: normalize_address(place.address.as_ref()),
    })
}

/// Suggestions are best-effort: bad coordinates become (0, 0), never a drop.
pub fn suggestion(raw: RawSuggestion) -> AutocompleteResult {
    let parsed = parse_coordinates(raw.lat.as_ref(), raw.lon.as_ref()).ok();
    let (latitude, longitude) = parsed.unwrap_or((0.0, 0.0));

    let display_name = raw.display_name.unwrap_or_default();
    let display_place = non_empty(&raw.display_place)
        .or_else(|| raw.address.as_ref().and_then(|a| non_empty(&a.name)))
        .unwrap_or_else(|| display_name.split(',').next().unwrap_or("").trim().to_string());

    AutocompleteResult {
        place_id: raw.place_id.map(|p| p.to_string()).unwrap_or_default(),
        latitude,
        longitude,
        coordinates_parsed: parsed.is_some(),
        display_place,
        display_address: raw.display_address.unwrap_or_default(),
        address_components: normalize_address(raw.address.as_ref()),
        display_name,
    }
}

//! The geocoding client: forward, reverse and autocomplete.
//!
//! Forward and reverse lookups fail loud with a typed error. Autocomplete
//! feeds a live text field, so by default its failures degrade to an empty
//! list with a warning; [`AutocompleteErrorPolicy::Raise`] opts out.

use super::config::ClientConfig;
use super::error::GeocodeError;
use super::provider::{self, RawPlace, RawSuggestion, AUTOCOMPLETE_PATH, REVERSE_PATH, SEARCH_PATH};
use super::transport::{Request, Response, Transport, UreqTransport};
use super::types::{valid_coordinates, AutocompleteErrorPolicy, AutocompleteResult, GeocodingResult};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Suggestions requested when the caller has no preference.
pub const DEFAULT_AUTOCOMPLETE_LIMIT: usize = 5;
/// Hard cap on suggestions per request.
pub const MAX_AUTOCOMPLETE_LIMIT: usize = 10;
/// Shorter (trimmed) queries never reach the provider.
pub const MIN_AUTOCOMPLETE_CHARS: usize = 2;

/// Cooperative cancellation flag shared between a caller and a request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Geocoding client. Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct GeocodingClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl GeocodingClient {
    /// Client on the default `ureq` transport.
    pub fn new(config: ClientConfig) -> Result<Self, GeocodeError> {
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(config, Arc::new(transport))
    }

    /// Client from the process environment.
    pub fn from_env() -> Result<Self, GeocodeError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Client on a caller-supplied transport (mocks, proxies).
    pub fn with_transport(
        mut config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, GeocodeError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ─── Forward ────────────────────────────────────────────────

    /// Resolve a free-text address to its best match.
    pub fn geocode_address(&self, address: &str) -> Result<GeocodingResult, GeocodeError> {
        self.geocode_address_with_cancel(address, &CancelToken::new())
    }

    pub fn geocode_address_with_cancel(
        &self,
        address: &str,
        cancel: &CancelToken,
    ) -> Result<GeocodingResult, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GeocodeError::InvalidInput("address must not be empty".into()));
        }

        let request = self.request(
            SEARCH_PATH,
            vec![
                ("q", address.to_string()),
                ("format", "json".into()),
                ("limit", "1".into()),
                ("addressdetails", "1".into()),
            ],
        );
        let response = self.send(&request, cancel)?;
        if !response.is_success() {
            return Err(GeocodeError::from_status(response.status, address, &response.body));
        }

        let places: Vec<RawPlace> = decode(&response.body)?;
        let result = provider::first_place(places, address)?;
        debug!(
            address,
            lat = result.latitude,
            lon = result.longitude,
            "geocoded address"
        );
        Ok(result)
    }

    // ─── Reverse ────────────────────────────────────────────────

    /// Resolve a coordinate pair to an address. The returned coordinates are
    /// the ones passed in.
    pub fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Result<GeocodingResult, GeocodeError> {
        self.reverse_geocode_with_cancel(latitude, longitude, &CancelToken::new())
    }

    pub fn reverse_geocode_with_cancel(
        &self,
        latitude: f64,
        longitude: f64,
        cancel: &CancelToken,
    ) -> Result<GeocodingResult, GeocodeError> {
        if !valid_coordinates(latitude, longitude) {
            return Err(GeocodeError::InvalidInput(format!(
                "coordinates ({}, {}) must be finite with lat in [-90, 90] and lon in [-180, 180]",
                latitude, longitude
            )));
        }

        let request = self.request(
            REVERSE_PATH,
            vec![
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("format", "json".into()),
                ("addressdetails", "1".into()),
            ],
        );
        let response = self.send(&request, cancel)?;
        if !response.is_success() {
            let query = format!("{}, {}", latitude, longitude);
            return Err(GeocodeError::from_status(response.status, &query, &response.body));
        }

        let place: RawPlace = decode(&response.body)?;
        let result = provider::reverse_place(place, latitude, longitude)?;
        debug!(lat = latitude, lon = longitude, display_name = %result.display_name, "reverse geocoded");
        Ok(result)
    }

    // ─── Autocomplete ───────────────────────────────────────────

    pub fn address_autocomplete_default(&self, query: &str) -> Result<Vec<AutocompleteResult>, GeocodeError> {
        self.address_autocomplete(query, DEFAULT_AUTOCOMPLETE_LIMIT)
    }

    /// Suggestions for a partial query. `limit` is clamped to
    /// `1..=MAX_AUTOCOMPLETE_LIMIT`.
    pub fn address_autocomplete(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AutocompleteResult>, GeocodeError> {
        self.address_autocomplete_with_cancel(query, limit, &CancelToken::new())
    }

    pub fn address_autocomplete_with_cancel(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<AutocompleteResult>, GeocodeError> {
        let query = query.trim();
        if query.chars().count() < MIN_AUTOCOMPLETE_CHARS {
            return Ok(Vec::new());
        }
        let limit = limit.clamp(1, MAX_AUTOCOMPLETE_LIMIT);

        let request = self.request(
            AUTOCOMPLETE_PATH,
            vec![
                ("q", query.to_string()),
                ("limit", limit.to_string()),
                ("normalizecity", "1".into()),
            ],
        );

        match self.fetch_suggestions(&request, query, cancel) {
            Ok(items) => {
                debug!(query, count = items.len(), "autocomplete suggestions");
                Ok(items)
            }
            Err(GeocodeError::Cancelled) => Err(GeocodeError::Cancelled),
            Err(e) => match self.config.autocomplete_errors {
                AutocompleteErrorPolicy::Raise => Err(e),
                AutocompleteErrorPolicy::Empty => {
                    warn!(query, kind = %e.kind(), error = %e, "autocomplete failed, returning no suggestions");
                    Ok(Vec::new())
                }
            },
        }
    }

    fn fetch_suggestions(
        &self,
        request: &Request,
        query: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<AutocompleteResult>, GeocodeError> {
        let response = self.send(request, cancel)?;
        if !response.is_success() {
            return Err(GeocodeError::from_status(response.status, query, &response.body));
        }
        let raw: Vec<RawSuggestion> = decode(&response.body)?;
        Ok(raw.into_iter().map(provider::suggestion).collect())
    }

    // ─── Plumbing ───────────────────────────────────────────────

    fn request(&self, path: &str, params: Vec<(&'static str, String)>) -> Request {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(("key", self.config.api_key.clone()));
        all.extend(params);
        Request {
            url: format!("{}/{}", self.config.base_url, path),
            params: all,
            user_agent: self.config.user_agent.clone(),
        }
    }

    fn send(&self, request: &Request, cancel: &CancelToken) -> Result<Response, GeocodeError> {
        if cancel.is_cancelled() {
            return Err(GeocodeError::Cancelled);
        }
        debug!(url = %request.redacted_url(), "provider request");

        let outcome = self.transport.get(request);
        if cancel.is_cancelled() {
            return Err(GeocodeError::Cancelled);
        }
        let response = outcome.map_err(|e| GeocodeError::Network(e.to_string()))?;
        debug!(status = response.status, "provider response");
        Ok(response)
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, GeocodeError> {
    serde_json::from_str(body).map_err(|e| GeocodeError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::error::ErrorKind;
    use crate::geocoding::transport::mock::MockTransport;
    use crate::geocoding::transport::TransportError;
    use approx::assert_relative_eq;

    const NYC: &str = r#"[{
        "place_id": "1001",
        "lat": "40.7128",
        "lon": "-74.0060",
        "display_name": "New York, New York, United States of America",
        "address": {"city": "New York", "state": "New York", "country": "United States of America", "country_code": "us"}
    }]"#;

    const REVERSE: &str = r#"{
        "lat": "59.32932",
        "lon": "18.06858",
        "display_name": "7, Drottninggatan, Norrmalm, Stockholm, 111 51, Sweden",
        "address": {"house_number": "7", "road": "Drottninggatan", "city": "Stockholm", "postcode": "111 51", "country": "Sweden", "country_code": "se"}
    }"#;

    const SUGGESTIONS: &str = r#"[
        {"place_id": "0", "lat": "41.8902", "lon": "12.4922", "display_name": "Colosseum, Piazza del Colosseo, Rome, Italy",
         "display_place": "Colosseum", "display_address": "Piazza del Colosseo, Rome, Italy",
         "address": {"name": "Colosseum", "road": "Piazza del Colosseo", "city": "Rome", "country": "Italy", "country_code": "it"}},
        {"place_id": "1", "lat": "not-a-number", "lon": "12.5", "display_name": "Colosseo, Rome, Italy",
         "display_place": "Colosseo", "display_address": "Rome, Italy", "address": {"city": "Rome"}}
    ]"#;

    fn mock_client(transport: MockTransport) -> (GeocodingClient, Arc<MockTransport>) {
        mock_client_with(ClientConfig::new("pk.test"), transport)
    }

    fn mock_client_with(config: ClientConfig, transport: MockTransport) -> (GeocodingClient, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let config = config.with_base_url("https://geo.test/v1/").with_user_agent("MarketplaceTest/1.0");
        let client = GeocodingClient::with_transport(config, transport.clone()).unwrap();
        (client, transport)
    }

    // ── Forward ──

    #[test]
    fn test_geocode_parses_coordinates() {
        let (client, transport) = mock_client(MockTransport::respond(200, NYC));
        let result = client.geocode_address("  New York  ").unwrap();

        assert_relative_eq!(result.latitude, 40.7128);
        assert_relative_eq!(result.longitude, -74.006);
        assert_eq!(result.display_name, "New York, New York, United States of America");
        assert_eq!(result.address_components.city.as_deref(), Some("New York"));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_geocode_request_shape() {
        let (client, transport) = mock_client(MockTransport::respond(200, NYC));
        client.geocode_address(" 350 5th Ave, New York ").unwrap();

        let req = transport.last_request().unwrap();
        assert_eq!(req.url, "https://geo.test/v1/search.php");
        assert_eq!(req.param("key"), Some("pk.test"));
        assert_eq!(req.param("q"), Some("350 5th Ave, New York"));
        assert_eq!(req.param("format"), Some("json"));
        assert_eq!(req.param("limit"), Some("1"));
        assert_eq!(req.param("addressdetails"), Some("1"));
        assert_eq!(req.user_agent, "MarketplaceTest/1.0");
    }

    #[test]
    fn test_geocode_empty_input_makes_no_call() {
        let (client, transport) = mock_client(MockTransport::respond(200, NYC));
        for input in ["", "   ", "\t\n"] {
            let err = client.geocode_address(input).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_geocode_empty_array_is_not_found() {
        let (client, _) = mock_client(MockTransport::respond(200, "[]"));
        let err = client.geocode_address("Atlantis").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_geocode_status_mapping() {
        let cases = [
            (401, ErrorKind::Unauthorized),
            (429, ErrorKind::RateLimited),
            (404, ErrorKind::NotFound),
            (500, ErrorKind::Upstream),
        ];
        for (status, kind) in cases {
            let (client, _) = mock_client(MockTransport::respond(status, r#"{"error":"nope"}"#));
            let err = client.geocode_address("somewhere").unwrap_err();
            assert_eq!(err.kind(), kind, "HTTP {}", status);
            assert_eq!(err.status(), Some(status));
        }
    }

    #[test]
    fn test_geocode_network_failure_raises() {
        let (client, _) = mock_client(MockTransport::fail("connection refused"));
        let err = client.geocode_address("Oslo").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_geocode_malformed_coordinates() {
        let body = r#"[{"lat":"not-a-number","lon":"-74.0060","display_name":"Broken"}]"#;
        let (client, _) = mock_client(MockTransport::respond(200, body));
        let err = client.geocode_address("Broken").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);

        let body = r#"[{"lat":"95.0","lon":"0","display_name":"Beyond the pole"}]"#;
        let (client, _) = mock_client(MockTransport::respond(200, body));
        let err = client.geocode_address("pole").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_geocode_undecodable_body() {
        let (client, _) = mock_client(MockTransport::respond(200, "<html>gateway</html>"));
        let err = client.geocode_address("Oslo").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    // ── Reverse ──

    #[test]
    fn test_reverse_echoes_input_coordinates() {
        let (client, transport) = mock_client(MockTransport::respond(200, REVERSE));
        let result = client.reverse_geocode(59.3293, 18.0686).unwrap();

        assert_eq!(result.latitude, 59.3293);
        assert_eq!(result.longitude, 18.0686);
        assert_eq!(result.address_components.street_number.as_deref(), Some("7"));
        assert_eq!(result.address_components.street.as_deref(), Some("Drottninggatan"));
        assert_eq!(result.address_components.postal_code.as_deref(), Some("111 51"));

        let req = transport.last_request().unwrap();
        assert_eq!(req.url, "https://geo.test/v1/reverse.php");
        assert_eq!(req.param("lat"), Some("59.3293"));
        assert_eq!(req.param("lon"), Some("18.0686"));
        assert_eq!(req.param("addressdetails"), Some("1"));
    }

    #[test]
    fn test_reverse_rejects_out_of_range_without_call() {
        let (client, transport) = mock_client(MockTransport::respond(200, REVERSE));
        let bad = [(91.0, 0.0), (0.0, 181.0), (-90.1, 0.0), (f64::NAN, 0.0), (0.0, f64::NEG_INFINITY)];
        for (lat, lon) in bad {
            let err = client.reverse_geocode(lat, lon).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_reverse_boundaries_accepted() {
        let (client, transport) = mock_client(MockTransport::respond(200, REVERSE));
        assert!(client.reverse_geocode(90.0, -180.0).is_ok());
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_reverse_failures() {
        let (client, _) = mock_client(MockTransport::respond(404, r#"{"error":"Unable to geocode"}"#));
        assert_eq!(client.reverse_geocode(0.0, 0.0).unwrap_err().kind(), ErrorKind::NotFound);

        let (client, _) = mock_client(MockTransport::fail("timed out"));
        assert_eq!(client.reverse_geocode(1.0, 1.0).unwrap_err().kind(), ErrorKind::Network);

        let (client, _) = mock_client(MockTransport::respond(200, "[]"));
        assert_eq!(
            client.reverse_geocode(1.0, 1.0).unwrap_err().kind(),
            ErrorKind::MalformedResponse
        );
    }

    // ── Autocomplete ──

    #[test]
    fn test_autocomplete_short_query_makes_no_call() {
        let (client, transport) = mock_client(MockTransport::respond(200, SUGGESTIONS));
        assert!(client.address_autocomplete("a", 5).unwrap().is_empty());
        assert!(client.address_autocomplete("  b  ", 5).unwrap().is_empty());
        assert!(client.address_autocomplete("ø", 5).unwrap().is_empty());
        assert_eq!(transport.calls(), 0);

        client.address_autocomplete("ab", 5).unwrap();
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_autocomplete_limit_clamped() {
        let (client, transport) = mock_client(MockTransport::respond(200, "[]"));
        client.address_autocomplete("Colos", 50).unwrap();
        assert_eq!(transport.last_request().unwrap().param("limit"), Some("10"));

        client.address_autocomplete("Colos", 0).unwrap();
        assert_eq!(transport.last_request().unwrap().param("limit"), Some("1"));

        client.address_autocomplete_default("Colos").unwrap();
        let req = transport.last_request().unwrap();
        assert_eq!(req.param("limit"), Some("5"));
        assert_eq!(req.param("normalizecity"), Some("1"));
        assert_eq!(req.url, "https://geo.test/v1/autocomplete");
    }

    #[test]
    fn test_autocomplete_maps_items_with_sentinel() {
        let (client, _) = mock_client(MockTransport::respond(200, SUGGESTIONS));
        let items = client.address_autocomplete("Colos", 5).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.place_id, "0");
        assert_eq!(first.display_place, "Colosseum");
        assert_eq!(first.display_address, "Piazza del Colosseo, Rome, Italy");
        assert_relative_eq!(first.latitude, 41.8902);
        assert!(first.coordinates().is_some());

        let second = &items[1];
        assert_eq!(second.display_place, "Colosseo");
        assert_eq!(second.latitude, 0.0);
        assert_eq!(second.longitude, 0.0);
        assert_eq!(second.coordinates(), None);
    }

    #[test]
    fn test_autocomplete_failures_are_empty_by_default() {
        let (client, _) = mock_client(MockTransport::fail("dns failure"));
        assert!(client.address_autocomplete("Oslo", 5).unwrap().is_empty());

        for status in [401, 404, 429, 500] {
            let (client, _) = mock_client(MockTransport::respond(status, ""));
            assert!(client.address_autocomplete("Oslo", 5).unwrap().is_empty());
        }

        let (client, _) = mock_client(MockTransport::respond(200, "not json"));
        assert!(client.address_autocomplete("Oslo", 5).unwrap().is_empty());
    }

    #[test]
    fn test_autocomplete_raise_policy() {
        let config = ClientConfig::new("pk.test").with_autocomplete_errors(AutocompleteErrorPolicy::Raise);
        let (client, _) = mock_client_with(config.clone(), MockTransport::fail("dns failure"));
        assert_eq!(client.address_autocomplete("Oslo", 5).unwrap_err().kind(), ErrorKind::Network);

        let (client, _) = mock_client_with(config, MockTransport::respond(429, ""));
        assert_eq!(client.address_autocomplete("Oslo", 5).unwrap_err().kind(), ErrorKind::RateLimited);
    }

    // ── Cancellation & config ──

    #[test]
    fn test_cancelled_before_dispatch() {
        let (client, transport) = mock_client(MockTransport::respond(200, NYC));
        let token = CancelToken::new();
        token.cancel();

        let err = client.geocode_address_with_cancel("New York", &token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        let err = client.reverse_geocode_with_cancel(1.0, 1.0, &token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        let err = client.address_autocomplete_with_cancel("New York", 5, &token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_cancelled_in_flight_discards_response() {
        let token = CancelToken::new();
        let in_flight = token.clone();
        let transport = MockTransport::with(move |_| {
            in_flight.cancel();
            Ok(Response { status: 200, body: NYC.to_string() })
        });
        let (client, _) = mock_client(transport);
        let err = client.geocode_address_with_cancel("New York", &token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_cancelled_in_flight_wins_over_transport_failure() {
        let token = CancelToken::new();
        let in_flight = token.clone();
        let (client, _) = mock_client(MockTransport::with(move |_| {
            in_flight.cancel();
            Err(TransportError("timed out".into()))
        }));

        let err = client.geocode_address_with_cancel("New York", &token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        let err = client.address_autocomplete_with_cancel("New York", 5, &token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_reverse_error_object_is_not_found() {
        let (client, _) = mock_client(MockTransport::respond(200, r#"{"error":"Unable to geocode"}"#));
        let err = client.reverse_geocode(0.0, -30.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_missing_key_rejected_at_construction() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::fail("unused"));
        let err = GeocodingClient::with_transport(ClientConfig::new(""), transport).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_concurrent_calls_share_client() {
        let (client, transport) = mock_client(MockTransport::with(|req: &Request| {
            if req.param("q") == Some("fail") {
                Err(TransportError("reset".into()))
            } else {
                Ok(Response { status: 200, body: NYC.to_string() })
            }
        }));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let client = client.clone();
                std::thread::spawn(move || {
                    let q = if i % 2 == 0 { "New York" } else { "fail" };
                    client.geocode_address(q).map(|r| r.latitude)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
        assert_eq!(transport.calls(), 8);
    }
}

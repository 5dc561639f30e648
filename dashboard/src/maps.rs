use crate::error::ApiError;
use common::types::booking::BookingDTO;
use reqwest::Client;
use serde::Deserialize;

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/?api=1&query=";
const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub formatted_address: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

/// Full address line for a booking. Falls back to the city when the street
/// address is hidden from the caller.
pub fn booking_address(booking: &BookingDTO) -> String {
    [
        booking.address.as_deref(),
        Some(booking.city.as_str()),
        booking.state.as_deref(),
        Some(booking.country.as_str()),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

pub fn search_url(address: &str) -> String {
    format!("{MAPS_SEARCH_URL}{}", urlencoding::encode(address.trim()))
}

fn first_point(response: GeocodeResponse) -> Result<Option<GeoPoint>, ApiError> {
    match response.status.as_str() {
        "OK" => Ok(response.results.into_iter().next().map(|r| GeoPoint {
            formatted_address: r.formatted_address,
            lat: r.geometry.location.lat,
            lng: r.geometry.location.lng,
        })),
        "ZERO_RESULTS" => Ok(None),
        other => Err(ApiError::Server {
            status: 502,
            message: response
                .error_message
                .unwrap_or_else(|| format!("geocoding failed: {other}")),
        }),
    }
}

pub async fn geocode(http: &Client, api_key: &str, address: &str) -> Result<Option<GeoPoint>, ApiError> {
    let response: GeocodeResponse = http
        .get(GEOCODE_URL)
        .query(&[("address", address), ("key", api_key)])
        .send()
        .await?
        .json()
        .await?;
    first_point(response)
}

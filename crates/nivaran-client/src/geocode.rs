use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use nivaran_types::models::GeoPoint;

/// Minimum query length before address suggestions are fetched.
pub const MIN_SUGGEST_CHARS: usize = 3;
pub const SUGGEST_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub location: GeoPoint,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReverseGeocode {
    pub display_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Address lookup. Every failure degrades to `None` or an empty list.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Option<GeocodeResult>;

    async fn reverse_geocode(&self, location: GeoPoint) -> Option<ReverseGeocode>;

    /// Autocomplete candidates for a partially typed address.
    async fn suggest(&self, query: &str) -> Vec<GeocodeResult>;
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ReverseHit {
    display_name: String,
    #[serde(default)]
    address: ReverseAddress,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

/// Geocoder backed by a Nominatim-compatible HTTP service.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<GeocodeResult>, String> {
        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("q", query), ("limit", &limit.to_string())])
            .send()
            .await
            .map_err(|e| format!("Geocode request failed: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("Geocode failed ({})", resp.status()));
        }
        let body = resp.text().await.map_err(|e| e.to_string())?;
        parse_search(&body)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Option<GeocodeResult> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }
        match self.search(address, 1).await {
            Ok(hits) => {
                let hit = hits.into_iter().next();
                if hit.is_none() {
                    debug!("No geocode result for '{}'", address);
                }
                hit
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    async fn reverse_geocode(&self, location: GeoPoint) -> Option<ReverseGeocode> {
        let resp = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "json".to_string()),
                ("lat", location.lat.to_string()),
                ("lon", location.lng.to_string()),
            ])
            .send()
            .await;

        let resp = match resp {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("Reverse geocode failed ({})", resp.status());
                return None;
            }
            Err(e) => {
                warn!("Reverse geocode request failed: {}", e);
                return None;
            }
        };

        match resp.text().await.map_err(|e| e.to_string()).and_then(|b| parse_reverse(&b)) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Bad reverse geocode response: {}", e);
                None
            }
        }
    }

    async fn suggest(&self, query: &str) -> Vec<GeocodeResult> {
        let query = query.trim();
        if query.chars().count() < MIN_SUGGEST_CHARS {
            return Vec::new();
        }
        self.search(query, SUGGEST_LIMIT).await.unwrap_or_else(|e| {
            warn!("{}", e);
            Vec::new()
        })
    }
}

/// Search responses carry coordinates as strings. Hits that do not parse are skipped.
fn parse_search(body: &str) -> Result<Vec<GeocodeResult>, String> {
    let hits: Vec<SearchHit> = serde_json::from_str(body).map_err(|e| format!("Bad geocode response: {}", e))?;
    Ok(hits
        .into_iter()
        .filter_map(|hit| {
            let lat = hit.lat.parse::<f64>().ok()?;
            let lng = hit.lon.parse::<f64>().ok()?;
            Some(GeocodeResult {
                location: GeoPoint::new(lat, lng),
                display_name: hit.display_name,
            })
        })
        .collect())
}

fn parse_reverse(body: &str) -> Result<ReverseGeocode, String> {
    let hit: ReverseHit = serde_json::from_str(body).map_err(|e| e.to_string())?;
    let address = hit.address;
    Ok(ReverseGeocode {
        display_name: hit.display_name,
        city: address.city.or(address.town).or(address.village),
        state: address.state,
        country: address.country,
    })
}

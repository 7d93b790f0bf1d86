use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::error::AppResult;
use crate::reference::Coordinates;

const SEARCH_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Candidate coordinates for a place name, best match first. Empty is a valid answer.
    async fn lookup(&self, place: &str) -> AppResult<Vec<Coordinates>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<GeoResult>,
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    latitude: f64,
    longitude: f64,
}

pub struct OpenMeteoGeocoder {
    http: reqwest::Client,
}

impl OpenMeteoGeocoder {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    async fn lookup(&self, place: &str) -> AppResult<Vec<Coordinates>> {
        debug!("Geocoding {:?}", place);
        let response = self
            .http
            .get(SEARCH_URL)
            .query(&[("name", place), ("count", "1"), ("language", "en"), ("format", "json")])
            .send()
            .await?
            .error_for_status()?
            .json::<SearchResponse>()
            .await?;

        Ok(response
            .results
            .into_iter()
            .map(|r| Coordinates {
                lat: r.latitude,
                lon: r.longitude,
            })
            .collect())
    }
}

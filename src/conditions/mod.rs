//! Weather and traffic for a named place.
//!
//! Each half of the panel is fetched and derived on its own: an upstream
//! failure or a short payload turns that half into `Unavailable` and leaves
//! the other alone.

pub mod geocode;
pub mod traffic;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::reference::{self, Coordinates};

use geocode::{Geocoder, OpenMeteoGeocoder};
use traffic::{TomTomClient, TrafficProvider, TrafficView};
use weather::{CachedWeather, OpenWeatherClient, WeatherProvider, WeatherView};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubPanel<T> {
    Ready(T),
    Unavailable { reason: String },
}

impl<T> SubPanel<T> {
    fn from_result(section: &str, place: &str, result: AppResult<T>) -> Self {
        match result {
            Ok(view) => SubPanel::Ready(view),
            Err(e) => {
                warn!("{} unavailable for {}: {}", section, place, e);
                SubPanel::Unavailable {
                    reason: "Data unavailable".to_string(),
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SubPanel::Ready(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComfortPanel {
    pub place: String,
    pub coordinates: Coordinates,
    pub location_notice: Option<String>,
    pub weather: SubPanel<WeatherView>,
    pub traffic: SubPanel<TrafficView>,
}

pub struct ComfortPanelService {
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherProvider>,
    traffic: Arc<dyn TrafficProvider>,
}

impl ComfortPanelService {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        weather: Arc<dyn WeatherProvider>,
        traffic: Arc<dyn TrafficProvider>,
    ) -> Self {
        Self {
            geocoder,
            weather,
            traffic,
        }
    }

    /// Open-Meteo geocoding, cached OpenWeather and TomTom, sharing one HTTP client.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder().timeout(UPSTREAM_TIMEOUT).build()?;

        let open_weather = Arc::new(OpenWeatherClient::new(http.clone(), config.openweather_api_key.clone()));
        Ok(Self::new(
            Arc::new(OpenMeteoGeocoder::new(http.clone())),
            Arc::new(CachedWeather::new(open_weather, config.weather_cache_ttl)),
            Arc::new(TomTomClient::new(http, config.tomtom_api_key.clone())),
        ))
    }

    /// Known coordinates first, then the geocoder. A miss lands on (0,0) with a notice.
    pub async fn resolve(&self, place: &str) -> (Coordinates, Option<String>) {
        if let Some(known) = reference::known_coordinates(place) {
            return (known, None);
        }

        let found = match self.geocoder.lookup(place).await {
            Ok(candidates) => candidates.into_iter().next(),
            Err(e) => {
                warn!("Geocoding {:?} failed: {}", place, e);
                None
            }
        };

        match found {
            Some(coordinates) => (coordinates, None),
            None => {
                info!("No coordinates for {:?}, using default location", place);
                (
                    Coordinates::ORIGIN,
                    Some(format!("Location \"{}\" not found, showing default conditions.", place)),
                )
            }
        }
    }

    pub async fn build(&self, place: &str) -> AppResult<ComfortPanel> {
        let place = place.trim();
        if place.is_empty() {
            return Err(AppError::InvalidInput("place must not be empty".to_string()));
        }

        let (coordinates, location_notice) = self.resolve(place).await;

        let (weather, traffic) = tokio::join!(self.weather.current(coordinates), self.traffic.flow(coordinates));

        let weather = weather.map(|report| WeatherView::from_report(&report));
        let traffic = traffic.and_then(|reading| TrafficView::from_reading(&reading));

        let panel = ComfortPanel {
            place: place.to_string(),
            coordinates,
            location_notice,
            weather: SubPanel::from_result("Weather", place, weather),
            traffic: SubPanel::from_result("Traffic", place, traffic),
        };
        debug!(
            "Comfort panel for {}: weather ready={}, traffic ready={}",
            place,
            panel.weather.is_ready(),
            panel.traffic.is_ready()
        );
        Ok(panel)
    }
}

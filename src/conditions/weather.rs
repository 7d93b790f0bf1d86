use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{AppError, AppResult};
use crate::reference::Coordinates;

const ONE_CALL_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";
const HOURLY_SHOWN: usize = 12;
const DAILY_SHOWN: usize = 5;
const COMPASS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

// One Call 3.0 payload, imperial units. Fields we don't display are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherReport {
    pub timezone: String,
    pub current: CurrentWeather,
    #[serde(default)]
    pub hourly: Vec<HourlyForecast>,
    #[serde(default)]
    pub daily: Vec<DailyForecast>,
    #[serde(default)]
    pub alerts: Vec<WeatherAlert>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    pub dt: i64,
    pub sunrise: i64,
    pub sunset: i64,
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: f64,
    pub humidity: f64,
    #[serde(default)]
    pub uvi: f64,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub rain: Option<Accumulation>,
    pub snow: Option<Accumulation>,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Accumulation {
    #[serde(rename = "1h", default)]
    pub last_hour: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HourlyForecast {
    pub dt: i64,
    pub temp: f64,
    #[serde(default)]
    pub pop: f64,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyForecast {
    pub dt: i64,
    pub temp: DayTemp,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayTemp {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub event: String,
    pub description: String,
    #[serde(default)]
    pub sender_name: String,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, at: Coordinates) -> AppResult<WeatherReport>;
}

pub struct OpenWeatherClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl OpenWeatherClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self, at: Coordinates) -> AppResult<WeatherReport> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(AppError::NotConfigured("OPENWEATHER_API_KEY"))?;

        debug!("Fetching weather for {},{}", at.lat, at.lon);
        let report = self
            .http
            .get(ONE_CALL_URL)
            .query(&[
                ("lat", at.lat.to_string()),
                ("lon", at.lon.to_string()),
                ("exclude", "minutely".to_string()),
                ("units", "imperial".to_string()),
                ("appid", key.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<WeatherReport>()
            .await?;
        Ok(report)
    }
}

struct CacheEntry {
    report: WeatherReport,
    expires_at: Instant,
}

/// Keeps each location's report for `ttl` before asking the inner provider again.
pub struct CachedWeather {
    inner: Arc<dyn WeatherProvider>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl CachedWeather {
    pub fn new(inner: Arc<dyn WeatherProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(at: Coordinates) -> String {
        format!("{:.4},{:.4}", at.lat, at.lon)
    }
}

#[async_trait]
impl WeatherProvider for CachedWeather {
    async fn current(&self, at: Coordinates) -> AppResult<WeatherReport> {
        let key = Self::cache_key(at);

        if let Some(entry) = self.cache.read().await.get(&key) {
            if entry.expires_at > Instant::now() {
                debug!("Weather cache hit for {}", key);
                return Ok(entry.report.clone());
            }
        }

        let report = self.inner.current(at).await?;
        let now = Instant::now();
        let mut cache = self.cache.write().await;
        cache.retain(|_, entry| entry.expires_at > now);
        cache.insert(
            key,
            CacheEntry {
                report: report.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineFact {
    pub label: &'static str,
    pub value: String,
    pub detail: &'static str,
}

/// Rain in the last hour, else snow, else humidity.
pub fn headline_fact(current: &CurrentWeather) -> HeadlineFact {
    let measurable = |acc: &Option<Accumulation>| acc.as_ref().map(|a| a.last_hour).filter(|mm| *mm > 0.0);

    if let Some(mm) = measurable(&current.rain) {
        HeadlineFact {
            label: "Rainfall (1h)",
            value: format!("{} mm", mm),
            detail: "Total accumulation in the past hour.",
        }
    } else if let Some(mm) = measurable(&current.snow) {
        HeadlineFact {
            label: "Snowfall (1h)",
            value: format!("{} mm", mm),
            detail: "Fresh snow depth from the last hour.",
        }
    } else {
        HeadlineFact {
            label: "Humidity",
            value: format!("{}%", current.humidity.round() as i64),
            detail: "Current relative moisture in the air.",
        }
    }
}

pub fn wind_direction(degrees: f64) -> &'static str {
    let index = (degrees.rem_euclid(360.0) / 45.0).round() as usize % COMPASS.len();
    COMPASS[index]
}

/// "3 mph SE"
pub fn wind_text(speed: f64, degrees: f64) -> String {
    format!("{} mph {}", speed.round() as i64, wind_direction(degrees))
}

/// Clock time in the report's timezone, e.g. "6:42 AM". Unknown zones fall back to UTC.
pub fn format_local_time(epoch_secs: i64, timezone: &str) -> String {
    let Some(instant) = Utc.timestamp_opt(epoch_secs, 0).single() else {
        return String::new();
    };
    let tz = timezone.parse::<Tz>().unwrap_or_else(|_| {
        warn!("Unknown timezone {:?}, showing UTC", timezone);
        Tz::UTC
    });
    instant.with_timezone(&tz).format("%-I:%M %p").to_string()
}

fn local_weekday(epoch_secs: i64, timezone: &str) -> String {
    let tz = timezone.parse::<Tz>().unwrap_or(Tz::UTC);
    Utc.timestamp_opt(epoch_secs, 0)
        .single()
        .map(|t| t.with_timezone(&tz).format("%a").to_string())
        .unwrap_or_default()
}

pub fn weather_emoji(description: &str) -> &'static str {
    match description.to_lowercase().as_str() {
        "clear sky" => "☀️",
        "few clouds" => "🌤️",
        "scattered clouds" | "broken clouds" | "overcast clouds" => "☁️",
        "shower rain" | "rain" => "🌧️",
        "thunderstorm" => "⛈️",
        "snow" => "❄️",
        "mist" => "🌫️",
        _ => "❓",
    }
}

fn icon_url(conditions: &[Condition]) -> String {
    let code = conditions.first().map(|c| c.icon.as_str()).unwrap_or("01d");
    format!("https://openweathermap.org/img/wn/{}@4x.png", code)
}

#[derive(Debug, Clone, Serialize)]
pub struct HourView {
    pub time: String,
    pub temp: i64,
    pub precipitation_chance: u32,
    pub icon_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayView {
    pub weekday: String,
    pub min: i64,
    pub max: i64,
    pub icon_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherView {
    pub temperature: i64,
    pub feels_like: i64,
    pub description: String,
    pub emoji: &'static str,
    pub icon_url: String,
    pub headline: HeadlineFact,
    pub wind: String,
    pub uv_index: f64,
    pub pressure: f64,
    pub sunrise: String,
    pub sunset: String,
    pub hourly: Vec<HourView>,
    pub daily: Vec<DayView>,
    pub alerts: Vec<WeatherAlert>,
}

impl WeatherView {
    pub fn from_report(report: &WeatherReport) -> Self {
        let current = &report.current;
        let tz = report.timezone.as_str();
        let description = current
            .weather
            .first()
            .map(|c| c.description.clone())
            .unwrap_or_default();

        let hourly = report
            .hourly
            .iter()
            .take(HOURLY_SHOWN)
            .map(|h| HourView {
                time: format_local_time(h.dt, tz),
                temp: h.temp.round() as i64,
                precipitation_chance: (h.pop.clamp(0.0, 1.0) * 100.0).round() as u32,
                icon_url: icon_url(&h.weather),
            })
            .collect();

        let daily = report
            .daily
            .iter()
            .take(DAILY_SHOWN)
            .map(|d| DayView {
                weekday: local_weekday(d.dt, tz),
                min: d.temp.min.round() as i64,
                max: d.temp.max.round() as i64,
                icon_url: icon_url(&d.weather),
            })
            .collect();

        Self {
            temperature: current.temp.round() as i64,
            feels_like: current.feels_like.round() as i64,
            emoji: weather_emoji(&description),
            description,
            icon_url: icon_url(&current.weather),
            headline: headline_fact(current),
            wind: wind_text(current.wind_speed, current.wind_deg),
            uv_index: current.uvi,
            pressure: current.pressure,
            sunrise: format_local_time(current.sunrise, tz),
            sunset: format_local_time(current.sunset, tz),
            hourly,
            daily,
            alerts: report.alerts.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn report(humidity: f64, rain: Option<f64>, snow: Option<f64>) -> WeatherReport {
        let json = serde_json::json!({
            "lat": 61.2181,
            "lon": -149.9003,
            "timezone": "America/Anchorage",
            "timezone_offset": -28800,
            "current": {
                "dt": 1684929490,
                "sunrise": 1684926645,
                "sunset": 1684977332,
                "temp": 54.6,
                "feels_like": 52.1,
                "pressure": 1014,
                "humidity": humidity,
                "uvi": 0.16,
                "wind_speed": 3.13,
                "wind_deg": 135,
                "rain": rain.map(|mm| serde_json::json!({ "1h": mm })),
                "snow": snow.map(|mm| serde_json::json!({ "1h": mm })),
                "weather": [{ "id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d" }]
            },
            "hourly": (0..48).map(|i| serde_json::json!({
                "dt": 1684926000 + i * 3600,
                "temp": 50.0 + i as f64,
                "pop": 0.15,
                "weather": [{ "id": 500, "main": "Rain", "description": "light rain", "icon": "10d" }]
            })).collect::<Vec<_>>(),
            "daily": (0..8).map(|i| serde_json::json!({
                "dt": 1684951200 + i * 86400,
                "temp": { "day": 60.0, "min": 45.2, "max": 63.7, "night": 48.0, "eve": 55.0, "morn": 46.0 },
                "weather": [{ "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }]
            })).collect::<Vec<_>>()
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn humidity_is_the_fallback_headline() {
        let fact = headline_fact(&report(62.0, None, None).current);
        assert_eq!(fact.label, "Humidity");
        assert_eq!(fact.value, "62%");
    }

    #[test]
    fn rain_outranks_snow_and_snow_outranks_humidity() {
        let rain = headline_fact(&report(80.0, Some(0.5), Some(2.0)).current);
        assert_eq!((rain.label, rain.value.as_str()), ("Rainfall (1h)", "0.5 mm"));

        let snow = headline_fact(&report(80.0, None, Some(2.0)).current);
        assert_eq!((snow.label, snow.value.as_str()), ("Snowfall (1h)", "2 mm"));

        let dry = headline_fact(&report(80.0, Some(0.0), None).current);
        assert_eq!(dry.label, "Humidity");
    }

    #[test]
    fn compass_points() {
        assert_eq!(wind_direction(0.0), "N");
        assert_eq!(wind_direction(22.4), "N");
        assert_eq!(wind_direction(22.5), "NE");
        assert_eq!(wind_direction(135.0), "SE");
        assert_eq!(wind_direction(350.0), "N");
        assert_eq!(wind_text(3.13, 135.0), "3 mph SE");
    }

    #[test]
    fn times_are_local_to_the_report() {
        // 2023-05-24 11:10:45 UTC
        assert_eq!(format_local_time(1684926645, "America/Chicago"), "6:10 AM");
        assert_eq!(format_local_time(1684926645, "UTC"), "11:10 AM");
        assert_eq!(format_local_time(1684926645, "Mars/Olympus"), "11:10 AM");
    }

    #[test]
    fn emoji_lookup() {
        assert_eq!(weather_emoji("Clear sky"), "☀️");
        assert_eq!(weather_emoji("overcast clouds"), "☁️");
        assert_eq!(weather_emoji("volcanic ash"), "❓");
    }

    #[test]
    fn view_trims_forecasts() {
        let view = WeatherView::from_report(&report(62.0, None, None));
        assert_eq!(view.hourly.len(), 12);
        assert_eq!(view.daily.len(), 5);
        assert_eq!(view.hourly[0].precipitation_chance, 15);
        assert_eq!((view.daily[0].min, view.daily[0].max), (45, 64));
        assert_eq!(view.temperature, 55);
        assert_eq!(view.wind, "3 mph SE");
        assert_eq!(view.emoji, "☁️");
    }

    #[test]
    fn missing_current_block_is_rejected() {
        let parsed = serde_json::from_value::<WeatherReport>(serde_json::json!({ "timezone": "UTC" }));
        assert!(parsed.is_err());
    }

    struct CountingWeather(AtomicUsize);

    #[async_trait]
    impl WeatherProvider for CountingWeather {
        async fn current(&self, _at: Coordinates) -> AppResult<WeatherReport> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(report(62.0, None, None))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cache_expires_after_ttl() {
        let inner = Arc::new(CountingWeather(AtomicUsize::new(0)));
        let cached = CachedWeather::new(inner.clone(), Duration::from_secs(900));
        let here = Coordinates { lat: 61.2181, lon: -149.9003 };

        cached.current(here).await.unwrap();
        cached.current(here).await.unwrap();
        assert_eq!(inner.0.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(901)).await;
        cached.current(here).await.unwrap();
        assert_eq!(inner.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_locations_are_dropped_on_write() {
        let inner = Arc::new(CountingWeather(AtomicUsize::new(0)));
        let cached = CachedWeather::new(inner, Duration::from_secs(900));

        for i in 0..10 {
            cached.current(Coordinates { lat: i as f64, lon: 0.0 }).await.unwrap();
        }
        assert_eq!(cached.cache.read().await.len(), 10);

        tokio::time::advance(Duration::from_secs(901)).await;
        cached.current(Coordinates { lat: 45.0, lon: 45.0 }).await.unwrap();
        assert_eq!(cached.cache.read().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let client = OpenWeatherClient::new(reqwest::Client::new(), None);
        let err = client.current(Coordinates::ORIGIN).await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured("OPENWEATHER_API_KEY")));
    }
}

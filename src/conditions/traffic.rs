use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::reference::Coordinates;

const FLOW_SEGMENT_URL: &str = "https://api.tomtom.com/traffic/services/4/flowSegmentData/relative0/10/json";

/// Speeds in mph. Either may be missing, which is not the same as zero.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficReading {
    pub current_speed: Option<f64>,
    pub free_flow_speed: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowResponse {
    flow_segment_data: Option<TrafficReading>,
}

#[async_trait]
pub trait TrafficProvider: Send + Sync {
    async fn flow(&self, at: Coordinates) -> AppResult<TrafficReading>;
}

pub struct TomTomClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl TomTomClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl TrafficProvider for TomTomClient {
    async fn flow(&self, at: Coordinates) -> AppResult<TrafficReading> {
        let key = self.api_key.as_deref().ok_or(AppError::NotConfigured("TOMTOM_API_KEY"))?;

        debug!("Fetching traffic flow for {},{}", at.lat, at.lon);
        let response = self
            .http
            .get(FLOW_SEGMENT_URL)
            .query(&[
                ("point", format!("{},{}", at.lat, at.lon)),
                ("unit", "MPH".to_string()),
                ("key", key.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<FlowResponse>()
            .await?;

        response
            .flow_segment_data
            .ok_or_else(|| AppError::IncompleteData("flowSegmentData missing".to_string()))
    }
}

/// Current speed as a share of free-flow speed, clamped to 0..=100.
pub fn traffic_efficiency(current_speed: f64, free_flow_speed: f64) -> u32 {
    if free_flow_speed <= 0.0 || !current_speed.is_finite() {
        return 0;
    }
    (current_speed / free_flow_speed * 100.0).round().clamp(0.0, 100.0) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrafficTier {
    Light,
    Moderate,
    Heavy,
}

impl TrafficTier {
    pub fn from_efficiency(efficiency: u32) -> Self {
        if efficiency >= 90 {
            TrafficTier::Light
        } else if efficiency >= 60 {
            TrafficTier::Moderate
        } else {
            TrafficTier::Heavy
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            TrafficTier::Light => "emerald",
            TrafficTier::Moderate => "amber",
            TrafficTier::Heavy => "rose",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            TrafficTier::Light => "CheckCircle",
            TrafficTier::Moderate => "AlertTriangle",
            TrafficTier::Heavy => "AlertOctagon",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            TrafficTier::Light => "Roads are clear. Great time to drive.",
            TrafficTier::Moderate => "Expect minor delays on major routes.",
            TrafficTier::Heavy => "Significant congestion detected.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrafficView {
    pub efficiency: u32,
    pub tier: TrafficTier,
    pub color: &'static str,
    pub icon: &'static str,
    pub summary: &'static str,
    pub speeds: String,
}

impl TrafficView {
    pub fn from_reading(reading: &TrafficReading) -> AppResult<Self> {
        let (current, free) = match (reading.current_speed, reading.free_flow_speed) {
            (Some(current), Some(free)) if free > 0.0 => (current.max(0.0), free),
            _ => return Err(AppError::IncompleteData("traffic speeds missing".to_string())),
        };

        let efficiency = traffic_efficiency(current, free);
        let tier = TrafficTier::from_efficiency(efficiency);
        if let Some(label) = reading.label.as_deref() {
            debug!("Provider labelled traffic {:?}, derived {:?}", label, tier);
        }

        Ok(Self {
            efficiency,
            tier,
            color: tier.color(),
            icon: tier.icon(),
            summary: tier.summary(),
            speeds: format!("{} mph vs {} mph free flow", current.round() as i64, free.round() as i64),
        })
    }
}

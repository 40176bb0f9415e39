//! Dashboard and location DTOs returned by the Zephra API.

use serde::{Deserialize, Serialize};

/// Query selecting which location the dashboard describes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DashboardQuery {
    pub fn named(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn coordinates(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            ..Self::default()
        }
    }

    /// Read a query out of a queued payload; unknown fields are ignored.
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }

    /// Query string pairs. Coordinates win over a location name.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                pairs.push(("lat", lat.to_string()));
                pairs.push(("lon", lon.to_string()));
                if let Some(name) = &self.name {
                    pairs.push(("name", name.clone()));
                }
            }
            _ => {
                if let Some(location) = &self.location {
                    pairs.push(("location", location.clone()));
                }
            }
        }
        pairs
    }
}

/// A predefined monitoring location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub timezone: String,
}

/// Response of `GET /api/locations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One hourly air-quality sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReading {
    #[serde(default)]
    pub timestamp: String,
    pub aqi: f64,
    #[serde(default)]
    pub pm25: Option<f64>,
    #[serde(default)]
    pub pm10: Option<f64>,
    #[serde(default)]
    pub o3: Option<f64>,
    #[serde(default)]
    pub no2: Option<f64>,
}

/// Location block of a dashboard response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub coordinates: Vec<f64>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Response of `GET /api/dashboard`.
///
/// Only the fields the client acts on are typed; weather, satellite and
/// forecast blocks are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub air_quality: Vec<AirQualityReading>,
    #[serde(default)]
    pub location_info: LocationInfo,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DashboardData {
    /// Most recent AQI sample, if any.
    pub fn latest_aqi(&self) -> Option<f64> {
        self.air_quality.last().map(|r| r.aqi)
    }
}

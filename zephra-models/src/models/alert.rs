//! AQI alert table, per-location alert settings, and the health profile.

use serde::{Deserialize, Serialize};

/// Six-tier AQI severity scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

/// Static notification content for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertDescriptor {
    pub level: AlertLevel,
    /// Tier index, 0 (Good) through 5 (Hazardous).
    pub index: u8,
    pub label: &'static str,
    pub icon: &'static str,
    pub severity: &'static str,
    pub color: &'static str,
    pub action: &'static str,
    pub pollutants: &'static [&'static str],
}

const DESCRIPTORS: [AlertDescriptor; 6] = [
    AlertDescriptor {
        level: AlertLevel::Good,
        index: 0,
        label: "Good",
        icon: "🟢",
        severity: "low",
        color: "#00E400",
        action: "Air quality is satisfactory. Enjoy outdoor activities.",
        pollutants: &[],
    },
    AlertDescriptor {
        level: AlertLevel::Moderate,
        index: 1,
        label: "Moderate",
        icon: "🟡",
        severity: "low",
        color: "#FFFF00",
        action: "Unusually sensitive people should consider limiting prolonged outdoor exertion.",
        pollutants: &["PM2.5", "O3"],
    },
    AlertDescriptor {
        level: AlertLevel::UnhealthyForSensitiveGroups,
        index: 2,
        label: "Unhealthy for Sensitive Groups",
        icon: "🟠",
        severity: "medium",
        color: "#FF7E00",
        action: "Sensitive groups should reduce prolonged or heavy outdoor exertion.",
        pollutants: &["PM2.5", "PM10", "O3"],
    },
    AlertDescriptor {
        level: AlertLevel::Unhealthy,
        index: 3,
        label: "Unhealthy",
        icon: "🔴",
        severity: "high",
        color: "#FF0000",
        action: "Everyone should reduce outdoor exertion. Sensitive groups should stay indoors.",
        pollutants: &["PM2.5", "PM10", "O3", "NO2"],
    },
    AlertDescriptor {
        level: AlertLevel::VeryUnhealthy,
        index: 4,
        label: "Very Unhealthy",
        icon: "🟣",
        severity: "very_high",
        color: "#99004C",
        action: "Avoid outdoor activity. Keep windows closed and run air filtration if available.",
        pollutants: &["PM2.5", "PM10", "O3", "NO2", "SO2"],
    },
    AlertDescriptor {
        level: AlertLevel::Hazardous,
        index: 5,
        label: "Hazardous",
        icon: "🟤",
        severity: "critical",
        color: "#7E0023",
        action: "Health emergency. Remain indoors and avoid all physical activity outdoors.",
        pollutants: &["PM2.5", "PM10", "O3", "NO2", "SO2", "CO"],
    },
];

impl AlertLevel {
    /// Bucket an AQI reading: ≤50, ≤100, ≤150, ≤200, ≤300, above.
    pub fn from_aqi(aqi: f64) -> Self {
        if aqi.is_nan() || aqi <= 50.0 {
            AlertLevel::Good
        } else if aqi <= 100.0 {
            AlertLevel::Moderate
        } else if aqi <= 150.0 {
            AlertLevel::UnhealthyForSensitiveGroups
        } else if aqi <= 200.0 {
            AlertLevel::Unhealthy
        } else if aqi <= 300.0 {
            AlertLevel::VeryUnhealthy
        } else {
            AlertLevel::Hazardous
        }
    }

    pub fn descriptor(&self) -> &'static AlertDescriptor {
        &DESCRIPTORS[*self as usize]
    }

    pub fn label(&self) -> &'static str {
        self.descriptor().label
    }

    /// Unhealthy and worse keep the notification on screen until dismissed.
    pub fn requires_interaction(&self) -> bool {
        *self >= AlertLevel::Unhealthy
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Alert preferences for one saved location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSetting {
    pub location: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// AQI above which this location alerts.
    pub threshold: f64,
}

fn default_enabled() -> bool {
    true
}

/// Health details used to tailor alert wording.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub activity_level: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
}

/// User preferences synced to the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub alert_settings: Vec<AlertSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_profile: Option<HealthProfile>,
}

/// Threshold for `location`, honoring an enabled per-location setting.
pub fn threshold_for(settings: &[AlertSetting], location: &str, fallback: f64) -> f64 {
    settings
        .iter()
        .find(|s| s.enabled && s.location.eq_ignore_ascii_case(location))
        .map(|s| s.threshold)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(AlertLevel::from_aqi(0.0), AlertLevel::Good);
        assert_eq!(AlertLevel::from_aqi(50.0).label(), "Good");
        assert_eq!(AlertLevel::from_aqi(51.0).label(), "Moderate");
        assert_eq!(AlertLevel::from_aqi(100.0), AlertLevel::Moderate);
        assert_eq!(AlertLevel::from_aqi(101.0), AlertLevel::UnhealthyForSensitiveGroups);
        assert_eq!(AlertLevel::from_aqi(150.0), AlertLevel::UnhealthyForSensitiveGroups);
        assert_eq!(AlertLevel::from_aqi(151.0).label(), "Unhealthy");
        assert_eq!(AlertLevel::from_aqi(200.0), AlertLevel::Unhealthy);
        assert_eq!(AlertLevel::from_aqi(201.0), AlertLevel::VeryUnhealthy);
        assert_eq!(AlertLevel::from_aqi(300.0), AlertLevel::VeryUnhealthy);
        assert_eq!(AlertLevel::from_aqi(301.0), AlertLevel::Hazardous);
    }

    #[test]
    fn test_descriptor_table_is_indexed_by_level() {
        for (i, d) in DESCRIPTORS.iter().enumerate() {
            assert_eq!(d.index as usize, i);
            assert_eq!(d.level.descriptor().index as usize, i);
        }
        assert_eq!(AlertLevel::Hazardous.descriptor().color, "#7E0023");
        assert_eq!(AlertLevel::UnhealthyForSensitiveGroups.descriptor().color, "#FF7E00");
    }

    #[test]
    fn test_requires_interaction() {
        assert!(!AlertLevel::UnhealthyForSensitiveGroups.requires_interaction());
        assert!(AlertLevel::Unhealthy.requires_interaction());
        assert!(AlertLevel::Hazardous.requires_interaction());
    }

    #[test]
    fn test_threshold_override() {
        let settings = vec![
            AlertSetting { location: "Delhi".into(), enabled: true, threshold: 150.0 },
            AlertSetting { location: "London".into(), enabled: false, threshold: 20.0 },
        ];
        assert_eq!(threshold_for(&settings, "delhi", 100.0), 150.0);
        assert_eq!(threshold_for(&settings, "London", 100.0), 100.0);
        assert_eq!(threshold_for(&settings, "Tokyo", 100.0), 100.0);
    }
}

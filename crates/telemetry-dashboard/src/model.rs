use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter;
use crate::error::{Error, Result};

/// Flat attribute mapping as received from an upstream endpoint.
pub type Record = serde_json::Map<String, Value>;

/// Entity id under which the device inventory is cached.
pub const DEVICE_INVENTORY: &str = "dispositivos";

/// Canonical attribute carrying the event time of every group.
pub const TIMESTAMP: &str = "timestampEvento";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Cameras,
    Environmental,
    Energy,
    Devices,
}

impl Group {
    /// Load order of a refresh cycle.
    pub const ALL: [Group; 4] = [
        Group::Cameras,
        Group::Environmental,
        Group::Energy,
        Group::Devices,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Group::Cameras => "cameras",
            Group::Environmental => "environmental",
            Group::Energy => "energy",
            Group::Devices => "devices",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Group::Cameras => "Cámaras LPR",
            Group::Environmental => "Monitor Ambiental",
            Group::Energy => "Monitor Energía",
            Group::Devices => "Dispositivos",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Group::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::msg(format!("unknown group '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Dashboard,
    Cameras,
    Environmental,
    Energy,
    Devices,
}

impl View {
    pub const ALL: [View; 5] = [
        View::Dashboard,
        View::Cameras,
        View::Environmental,
        View::Energy,
        View::Devices,
    ];

    pub fn group(self) -> Option<Group> {
        match self {
            View::Dashboard => None,
            View::Cameras => Some(Group::Cameras),
            View::Environmental => Some(Group::Environmental),
            View::Energy => Some(Group::Energy),
            View::Devices => Some(Group::Devices),
        }
    }

    pub fn for_group(group: Group) -> Self {
        match group {
            Group::Cameras => View::Cameras,
            Group::Environmental => View::Environmental,
            Group::Energy => View::Energy,
            Group::Devices => View::Devices,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            View::Dashboard => "Vista General",
            View::Cameras => "Cámaras LPR",
            View::Environmental => "Monitores Ambientales",
            View::Energy => "Monitores de Energía",
            View::Devices => "Lista de Dispositivos",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            View::Dashboard => "dashboard",
            View::Cameras => "cameras",
            View::Environmental => "environmental",
            View::Energy => "energy",
            View::Devices => "devices",
        }
    }
}

impl FromStr for View {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        View::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::msg(format!("unknown view '{s}'")))
    }
}

/// One history entry. The raw attributes are kept untouched; the event time
/// is resolved once through the group's field adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub attrs: Record,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl EventRecord {
    pub fn from_raw(group: Group, attrs: Record) -> Self {
        let timestamp = adapter::normalize(group, &attrs)
            .str(TIMESTAMP)
            .and_then(parse_timestamp);
        Self { attrs, timestamp }
    }
}

/// ISO-8601 with offset, or without one (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Camera history filter; an empty field places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub event_type: String,
    pub authorized: String,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.event_type.is_empty() && self.authorized.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub active_view: View,
    pub active_entity: BTreeMap<Group, String>,
    pub auto_refresh_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let a = parse_timestamp("2024-08-01T12:30:00Z").unwrap();
        let b = parse_timestamp("2024-08-01T12:30:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn view_and_group_names_round_trip() {
        for v in View::ALL {
            assert_eq!(v.as_str().parse::<View>().unwrap(), v);
        }
        assert_eq!("Energy".parse::<Group>().unwrap(), Group::Energy);
        assert!("lighting".parse::<Group>().is_err());
        assert_eq!(View::for_group(Group::Devices).group(), Some(Group::Devices));
    }
}

//! Validation of incoming sensor readings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wildcard accepted wherever a station id selects "all stations"
pub const ALL_STATIONS: &str = "*";

/// Rejection of client input before it reaches a backend
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("station id {0:?} contains illegal characters")]
    InvalidStationId(String),

    #[error("{field} value {value:?} is not a finite number")]
    InvalidNumericValue { field: &'static str, value: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Station identifier, one or more ASCII letters, digits or hyphens
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> ValidationResult<Self> {
        let id = id.into();
        if is_valid_station_id(&id) {
            Ok(Self(id))
        } else {
            Err(ValidationError::InvalidStationId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_station_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl FromStr for StationId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for StationId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StationId> for String {
    fn from(id: StationId) -> Self {
        id.0
    }
}

impl AsRef<str> for StationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which stations a query covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationSelector {
    All,
    One(StationId),
}

impl StationSelector {
    /// Interpret an optional query parameter; absent or `*` selects all stations
    pub fn from_param(param: Option<&str>) -> ValidationResult<Self> {
        match param {
            None | Some(ALL_STATIONS) => Ok(Self::All),
            Some(id) => Ok(Self::One(id.parse()?)),
        }
    }

    pub fn matches(&self, station_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::One(id) => id.as_str() == station_id,
        }
    }
}

impl FromStr for StationSelector {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_param(Some(s))
    }
}

impl From<StationId> for StationSelector {
    fn from(id: StationId) -> Self {
        Self::One(id)
    }
}

impl fmt::Display for StationSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_STATIONS),
            Self::One(id) => id.fmt(f),
        }
    }
}

/// A single temperature/humidity reading as reported by a station.
///
/// Carries no timestamp; backends assign one when the reading is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    station_id: StationId,
    temperature: f64,
    humidity: f64,
}

impl Measurement {
    /// Build a measurement from numeric values
    pub fn new(station_id: &str, temperature: f64, humidity: f64) -> ValidationResult<Self> {
        let station_id = station_id.parse()?;
        Ok(Self {
            station_id,
            temperature: finite("temperature", temperature)?,
            humidity: finite("humidity", humidity)?,
        })
    }

    /// Build a measurement from textual values, as found in a query string
    pub fn parse(station_id: &str, temperature: &str, humidity: &str) -> ValidationResult<Self> {
        let station_id = station_id.parse()?;
        Ok(Self {
            station_id,
            temperature: parse_number("temperature", temperature)?,
            humidity: parse_number("humidity", humidity)?,
        })
    }

    pub fn station_id(&self) -> &StationId {
        &self.station_id
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Measurement({:?}, {}, {})",
            self.station_id.as_str(),
            self.temperature,
            self.humidity
        )
    }
}

fn finite(field: &'static str, value: f64) -> ValidationResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::InvalidNumericValue {
            field,
            value: value.to_string(),
        })
    }
}

fn parse_number(field: &'static str, text: &str) -> ValidationResult<f64> {
    let invalid = || ValidationError::InvalidNumericValue {
        field,
        value: text.to_string(),
    };
    let value: f64 = text.trim().parse().map_err(|_| invalid())?;
    finite(field, value).map_err(|_| invalid())
}

// src/timesheet/mod.rs

mod hours;
pub mod normalize;

pub use hours::parse_hours;
pub use normalize::{Normalizer, RecoveredShape};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Reasons a single employee entry is rejected. The rest of the batch survives.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("entry is not a JSON object")]
    NotAnObject,
    #[error("entry does not match the timesheet shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("total_hours is missing")]
    MissingTotal,
    #[error("{field} is not a number of hours: {value:?}")]
    InvalidHours { field: String, value: String },
    #[error("{field} is negative: {value}")]
    NegativeHours { field: String, value: f64 },
    #[error("unknown weekday: {0:?}")]
    UnknownDay(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Self::Mon,
        Self::Tue,
        Self::Wed,
        Self::Thu,
        Self::Fri,
        Self::Sat,
        Self::Sun,
    ];

    /// Accepts the three-letter symbol or the full English name, any case.
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|day| {
            let symbol = day.as_str().to_ascii_lowercase();
            lower == symbol || lower == day.full_name()
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mon => "Mon",
            Self::Tue => "Tue",
            Self::Wed => "Wed",
            Self::Thu => "Thu",
            Self::Fri => "Fri",
            Self::Sat => "Sat",
            Self::Sun => "Sun",
        }
    }

    fn full_name(self) -> &'static str {
        match self {
            Self::Mon => "monday",
            Self::Tue => "tuesday",
            Self::Wed => "wednesday",
            Self::Thu => "thursday",
            Self::Fri => "friday",
            Self::Sat => "saturday",
            Self::Sun => "sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyHours {
    pub day: Weekday,
    pub hours: f64,
}

/// One person's hours for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeTimesheet {
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub employee_name: Option<String>,
    pub period: Option<String>,
    pub week_start: Option<String>,
    pub week_end: Option<String>,
    pub week_hours: Option<Vec<DailyHours>>,
    pub total_hours: f64,
}

impl EmployeeTimesheet {
    /// Build a record from one recovered employee object. When daily hours are
    /// present and their sum is further than `tolerance` from the declared
    /// total, the sum wins.
    pub fn from_value(record: &Value, tolerance: f64) -> Result<Self, RecordError> {
        if !record.is_object() {
            return Err(RecordError::NotAnObject);
        }
        let raw = RawTimesheet::deserialize(record)?;

        let week_hours = raw
            .week_hours
            .map(|days| {
                days.into_iter()
                    .map(RawDay::into_daily)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let declared = raw.total_hours.ok_or(RecordError::MissingTotal)?;
        let mut total_hours = declared.into_hours("total_hours")?;

        if let Some(days) = week_hours.as_deref().filter(|d: &&[DailyHours]| !d.is_empty()) {
            let computed: f64 = days.iter().map(|d| d.hours).sum();
            if !computed.is_finite() {
                return Err(RecordError::InvalidHours {
                    field: "total_hours".to_string(),
                    value: computed.to_string(),
                });
            }
            if (computed - total_hours).abs() > tolerance {
                debug!(
                    declared = total_hours,
                    computed, "Declared total replaced by sum of daily hours"
                );
                total_hours = computed;
            }
        }

        Ok(Self {
            client_id: raw.client_id.map(Scalar::into_string),
            client_name: raw.client_name.map(Scalar::into_string),
            employee_name: raw.employee_name.map(Scalar::into_string),
            period: raw.period.map(Scalar::into_string),
            week_start: raw.week_start.map(Scalar::into_string),
            week_end: raw.week_end.map(Scalar::into_string),
            week_hours,
            total_hours,
        })
    }

    /// How many identity/period fields were filled (out of the optional text ones).
    pub fn coverage(&self) -> (usize, usize) {
        let total = 6;
        let filled = [
            &self.client_id,
            &self.client_name,
            &self.employee_name,
            &self.period,
            &self.week_start,
            &self.week_end,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count();
        (filled, total)
    }
}

// ---------------------------------------------------------------------------
// Loose wire shapes. Models are inconsistent about strings vs numbers, so the
// raw layer accepts both and the conversion above enforces the real schema.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawTimesheet {
    #[serde(default)]
    client_id: Option<Scalar>,
    #[serde(default)]
    client_name: Option<Scalar>,
    #[serde(default)]
    employee_name: Option<Scalar>,
    #[serde(default)]
    period: Option<Scalar>,
    #[serde(default)]
    week_start: Option<Scalar>,
    #[serde(default)]
    week_end: Option<Scalar>,
    #[serde(default)]
    week_hours: Option<Vec<RawDay>>,
    #[serde(default)]
    total_hours: Option<HoursValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HoursValue {
    Number(f64),
    Text(String),
}

impl HoursValue {
    fn into_hours(self, field: &str) -> Result<f64, RecordError> {
        let hours = match self {
            Self::Number(n) => n,
            Self::Text(text) => parse_hours(&text).ok_or_else(|| RecordError::InvalidHours {
                field: field.to_string(),
                value: text,
            })?,
        };
        if !hours.is_finite() {
            return Err(RecordError::InvalidHours {
                field: field.to_string(),
                value: hours.to_string(),
            });
        }
        if hours < 0.0 {
            return Err(RecordError::NegativeHours {
                field: field.to_string(),
                value: hours,
            });
        }
        Ok(hours)
    }
}

#[derive(Debug, Deserialize)]
struct RawDay {
    day: String,
    hours: HoursValue,
}

impl RawDay {
    fn into_daily(self) -> Result<DailyHours, RecordError> {
        let day = Weekday::parse(&self.day).ok_or(RecordError::UnknownDay(self.day))?;
        let hours = self.hours.into_hours(&format!("hours for {day}"))?;
        Ok(DailyHours { day, hours })
    }
}

//! Domain models for the application
use crate::errors::ApiError;
use crate::utils::{format_date, parse_date};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar day, used as cache key and as the `date` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Calendar day of a timestamp, as seen in the timestamp's own zone
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self(dt.date_naive())
    }

    /// Today in the local calendar
    pub fn today() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_date(self.0))
    }
}

impl FromStr for DateKey {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_date(s).map(Self)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Astronomy Picture of the Day entry, as shown on screen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApodRecord {
    pub date: Option<DateKey>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

/// What the screen should display right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewState {
    /// A refresh is in flight; `shown` is the record kept on screen meanwhile
    Loading { shown: Option<ApodRecord> },
    /// The last refresh failed; `shown` is the stale record, if any
    Error {
        message: String,
        shown: Option<ApodRecord>,
    },
    Ready { data: ApodRecord },
}

impl ViewState {
    /// Record the UI should keep displaying for this state
    pub fn displayed(&self) -> Option<&ApodRecord> {
        match self {
            ViewState::Loading { shown } | ViewState::Error { shown, .. } => shown.as_ref(),
            ViewState::Ready { data } => Some(data),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ViewState::Loading { .. })
    }
}

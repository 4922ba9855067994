//! Utility functions
use crate::errors::{ApiError, ApiResult};
use chrono::NaiveDate;
use serde_json::Value;

/// Date format used by the APOD API
pub const APOD_DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a calendar day as `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format(APOD_DATE_FORMAT).to_string()
}

/// Parse strict `YYYY-MM-DD` text.
///
/// chrono alone accepts single-digit months and days, so the shape is
/// checked before handing off.
pub fn parse_date(text: &str) -> ApiResult<NaiveDate> {
    let bytes = text.as_bytes();
    let well_shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());

    if !well_shaped {
        return Err(ApiError::Format(text.to_string()));
    }

    NaiveDate::parse_from_str(text, APOD_DATE_FORMAT)
        .map_err(|_| ApiError::Format(text.to_string()))
}

/// Pick string value from a JSON object field.
///
/// Missing and null values are `None`; an empty string stays empty.
/// Numbers and booleans are taken as their text form.
pub fn s_pick(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Replace the `api_key` query value so URLs can be logged
pub fn redact_api_key(url: &str) -> String {
    let Ok(mut parsed) = reqwest::Url::parse(url) else {
        return url.to_string();
    };

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "api_key" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();

    if pairs.is_empty() {
        return parsed.to_string();
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

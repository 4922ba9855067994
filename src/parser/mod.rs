//! APOD response parsing
use crate::domain::{ApodRecord, DateKey};
use crate::errors::{ApiError, ApiResult};
use crate::utils::s_pick;
use serde::Serialize;
use serde_json::Value;

/// Wire shape of the APOD response fields we keep
#[derive(Debug, Serialize)]
struct ApodResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    copyright: Option<&'a str>,
}

/// Parse an APOD response body into a record
pub fn parse_apod(body: &str) -> ApiResult<ApodRecord> {
    let json: Value = serde_json::from_str(body)?;

    if !json.is_object() {
        return Err(ApiError::Parse("expected a JSON object".to_string()));
    }

    let date = s_pick(&json, "date")
        .filter(|text| !text.is_empty())
        .map(|text| text.parse::<DateKey>())
        .transpose()?;

    Ok(ApodRecord {
        date,
        title: s_pick(&json, "title"),
        description: s_pick(&json, "explanation"),
        media_type: s_pick(&json, "media_type"),
        url: s_pick(&json, "url"),
        copyright: s_pick(&json, "copyright"),
    })
}

/// Write a record back in the APOD response shape
pub fn to_json(record: &ApodRecord) -> ApiResult<String> {
    let response = ApodResponse {
        date: record.date.map(|d| d.to_string()),
        title: record.title.as_deref(),
        explanation: record.description.as_deref(),
        media_type: record.media_type.as_deref(),
        url: record.url.as_deref(),
        copyright: record.copyright.as_deref(),
    };
    Ok(serde_json::to_string(&response)?)
}

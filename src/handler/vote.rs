//! Vote submission
//!
//! Reads the chosen language from a urlencoded or multipart form, or from a
//! JSON body, and records it on the ballot.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::ballot::Tally;
use crate::config::AppState;
use crate::http;
use crate::logger;

const FIELD: &str = "language";

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("Invalid JSON body")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid multipart body")]
    InvalidMultipart(#[from] multer::Error),
}

#[derive(Serialize)]
struct VoteAccepted<'a> {
    message: String,
    votes: &'a Tally,
}

/// Handle `POST /vote`
pub async fn handle_vote<B>(headers: &HeaderMap, body: B, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(state.config.http.max_body_size).unwrap_or(usize::MAX);
    let bytes = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!("Vote body exceeds {limit} bytes"));
            return http::build_413_response();
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read vote body: {e}"));
            return http::build_error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let choice = match read_choice(content_type, &bytes).await {
        Ok(choice) => choice.unwrap_or_default(),
        Err(e) => return http::build_error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    match state.ballot.cast(&choice) {
        Ok(tally) => {
            logger::log_vote(&choice, tally.values().sum());
            let body = VoteAccepted {
                message: format!("Vote for {choice} recorded!"),
                votes: &tally,
            };
            http::build_json_response(StatusCode::OK, &body, false)
        }
        Err(e) => http::build_error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

/// Media type without parameters, lowercased
fn media_type(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Pull the chosen language out of a request body of any supported type
pub async fn read_choice(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Option<String>, BodyError> {
    match content_type {
        Some(ct) if media_type(content_type) == "multipart/form-data" => {
            multipart_choice(ct, body).await
        }
        _ => extract_choice(content_type, body),
    }
}

/// First `language` part of a multipart form; an empty part counts as missing
async fn multipart_choice(content_type: &str, body: &[u8]) -> Result<Option<String>, BodyError> {
    let boundary = multer::parse_boundary(content_type)?;
    let mut multipart = multer::Multipart::with_reader(body, boundary);

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FIELD) {
            let value = field.text().await?;
            return Ok(Some(value).filter(|v| !v.is_empty()));
        }
    }
    Ok(None)
}

/// Pull the chosen language out of a urlencoded or JSON body.
///
/// The form field wins; a JSON body is consulted only when the form carries
/// no non-empty value. Other content types yield no choice.
pub fn extract_choice(content_type: Option<&str>, body: &[u8]) -> Result<Option<String>, BodyError> {
    let media = media_type(content_type);

    if media == "application/x-www-form-urlencoded" {
        let from_form = url::form_urlencoded::parse(body)
            .find(|(key, _)| key == FIELD)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());
        return Ok(from_form);
    }

    if media == "application/json" || media.ends_with("+json") {
        let value: serde_json::Value = serde_json::from_slice(body)?;
        return Ok(value.get(FIELD).and_then(json_choice));
    }

    Ok(None)
}

/// Falsy JSON values (null, false, zero, empty string/array/object) are no
/// choice at all; any other non-string is reported back as an invalid choice
fn json_choice(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if matches!(n.as_f64(), Some(f) if f == 0.0) => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(fields) if fields.is_empty() => None,
        other => Some(other.to_string()),
    }
}

//! Stateless helpers for request headers

use axum::http::{HeaderMap, header::CONTENT_TYPE};

use crate::api::error::ApiError;

/// Require a JSON `Content-Type` header
///
/// Accepts `application/json` with optional parameters such as a charset.
/// Rejects look-alikes (`application/jsonp`, `application/json-patch+json`,
/// `text/json`) and malformed media types.
pub fn require_json(headers: &HeaderMap) -> Result<mime::Mime, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;

    parse_content_type(content_type)
}

pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

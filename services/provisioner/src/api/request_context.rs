//! Request-scoped context extracted from HTTP requests.

use std::net::SocketAddr;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header::CONTENT_LENGTH, request::Parts, HeaderMap};
use bytes::Bytes;

use crate::api::error::ApiError;

pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Caller address for audit logs: first `X-Forwarded-For` entry, then the
/// connection peer, then `"unknown"`.
pub fn client_ip(parts: &Parts) -> String {
    if let Some(forwarded) = header_str(&parts.headers, FORWARDED_FOR_HEADER) {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Buffer a request body, refusing anything over `limit` bytes.
///
/// A declared `Content-Length` over the limit is rejected before reading.
pub async fn read_body_limited(parts: &Parts, body: Body, limit: usize) -> Result<Bytes, ApiError> {
    let declared = header_str(&parts.headers, CONTENT_LENGTH.as_str())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(ApiError::payload_too_large(limit));
    }

    to_bytes(body, limit)
        .await
        .map_err(|_| ApiError::payload_too_large(limit))
}

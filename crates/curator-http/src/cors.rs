//! Minimal CORS header layer for the single-page frontend.

use hyper::header::{HeaderMap, HeaderValue};

pub struct CorsLayer;

impl CorsLayer {
    pub fn apply_cors_headers(headers: &mut HeaderMap) {
        headers.insert(
            "Access-Control-Allow-Origin",
            HeaderValue::from_static("*"),
        );
        headers.insert(
            "Access-Control-Allow-Methods",
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            "Access-Control-Allow-Headers",
            HeaderValue::from_static("Content-Type"),
        );
    }
}

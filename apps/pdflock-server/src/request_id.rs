//! X-Request-ID handling

use axum::http::{HeaderMap, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generates `req-<uuid>` ids for requests that arrive without one.
#[derive(Clone, Copy, Default)]
pub struct MakePrefixedRequestId;

impl MakeRequestId for MakePrefixedRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&format!("req-{}", Uuid::new_v4()))
            .ok()
            .map(RequestId::new)
    }
}

/// Request id for log correlation.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()))
}

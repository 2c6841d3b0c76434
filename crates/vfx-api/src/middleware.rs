//! # Request Metrics Middleware
//!
//! Records a request counter and a latency histogram through the `metrics`
//! facade. Paths are labelled with the matched route template
//! (`/v1/businesses/{id}/records`) so business and invoice ids do not
//! explode label cardinality.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Label used for requests that matched no route.
const UNMATCHED: &str = "unmatched";

fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string())
}

pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = route_label(&request);
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    let labels = [("method", method), ("path", path), ("status", status)];
    metrics::counter!("vfx_http_requests_total", &labels).increment(1);
    metrics::histogram!("vfx_http_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn unmatched_requests_share_one_label() {
        let request = Request::builder().uri("/v1/businesses/acme/records").body(Body::empty()).unwrap();
        assert_eq!(route_label(&request), UNMATCHED);
    }
}

//! Request metrics
//!
//! Counts requests per endpoint and method and records response time per
//! endpoint, rendered in the Prometheus text exposition format.

pub mod counter;
pub mod encode;
pub mod histogram;

use std::time::Duration;

pub use counter::CounterVec;
pub use encode::CONTENT_TYPE;
pub use histogram::HistogramVec;

const REQUEST_COUNT: &str = "voting_app_request_count";
const RESPONSE_TIME: &str = "voting_app_response_time_seconds";

/// Metric families exposed by the server
pub struct AppMetrics {
    pub request_count: CounterVec,
    pub response_time: HistogramVec,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            request_count: CounterVec::new(
                REQUEST_COUNT,
                "Total number of HTTP requests by endpoint and method",
                &["endpoint", "method"],
            ),
            response_time: HistogramVec::new(
                RESPONSE_TIME,
                "Response time in seconds by endpoint",
                &["endpoint"],
            ),
        }
    }

    /// Record one handled request
    pub fn track(&self, endpoint: &str, method: &str, elapsed: Duration) {
        self.request_count.inc(&[endpoint, method]);
        self.response_time
            .observe(&[endpoint], elapsed.as_secs_f64());
    }

    /// Render every family
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.request_count.encode(&mut out);
        self.response_time.encode(&mut out);
        out
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

//! HTTP protocol layer module
//!
//! Response builders shared by every route, decoupled from the voting logic.

pub mod response;

// Re-export commonly used types
pub use response::{
    build_404_response, build_405_response, build_413_response, build_error_response,
    build_health_response, build_html_response, build_json_response, build_metrics_response,
    build_options_response, insert_header,
};

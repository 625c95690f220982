//! Request handler module
//!
//! Routes requests to the voting form, vote submission, results, metrics and
//! health probes.

pub mod pages;
pub mod router;
pub mod vote;

// Re-export main entry point
pub use router::handle_request;

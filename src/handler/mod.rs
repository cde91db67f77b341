//! Request handler module
//!
//! Routing, path resolution and the per-file serving sequence.

pub mod file;
pub mod resolve;
pub mod router;

// Re-export main entry point
pub use router::handle_request;

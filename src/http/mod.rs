//! HTTP protocol layer module
//!
//! Everything needed to answer a request for one file: validators, ranges,
//! content types and the response writer the responder runs against.

pub mod cache;
pub mod conditional;
pub mod disposition;
pub mod mime;
pub mod range;
pub mod response;
pub mod serve;
pub mod sniff;
pub mod writer;

// Re-export commonly used types
pub use range::parse_range_header;
pub use response::{build_404_response, build_405_response, build_json_response};
pub use serve::{serve_content, ResponseOutcome};
pub use writer::{BufferedWriter, ResponseWriter, StatusResponseWriter};

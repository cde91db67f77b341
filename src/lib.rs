//! Single-file HTTP serving with conditional and byte-range support over
//! content that can only be read front to back.

pub mod config;
pub mod content;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod metrics;
pub mod server;

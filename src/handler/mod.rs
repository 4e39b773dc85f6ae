//! Request handler module
//!
//! Routing dispatch plus the three kinds of endpoints the site exposes:
//! rendered pages, static assets and the creek-data proxy.

pub mod pages;
pub mod proxy;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;

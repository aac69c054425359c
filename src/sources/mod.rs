/// Sources module
///
/// Resolve operations a keeper can be built from.
pub mod http;

pub use http::HttpSource;

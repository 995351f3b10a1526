/// Re-export `Config` from `folio-core` for use within this crate.
///
/// All environment-variable parsing lives in `folio-core` so the client crate
/// and integration tests can share it without depending on the server.
pub use folio_core::config::{Config, RateLimitConfig};

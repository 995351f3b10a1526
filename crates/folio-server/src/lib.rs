pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod providers;
pub mod rate_limit;
pub mod routes;
pub mod state;

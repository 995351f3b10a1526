pub mod config;
pub mod error;
pub mod event;
pub mod provider;
pub mod sanitize;

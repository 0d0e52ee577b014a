// src/lib.rs
pub mod types;
pub mod config;
pub mod market;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod publishing;
pub mod providers;
pub mod oracle;

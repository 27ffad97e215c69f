//! fredwatch library
//!
//! Response cache, retrying series client and dashboard loading for the FRED
//! macro dashboard API. The binary in `main.rs` is a thin CLI over these
//! modules; they are exposed here for integration tests.

pub mod cache;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod logging;
pub mod refresh;
pub mod report;

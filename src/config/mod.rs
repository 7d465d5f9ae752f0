//! # Configuration Module
//!
//! Console configuration shared by the CLI and the library: backend address,
//! pacing target, inactivity thresholds and the sensor extent.

pub mod config;

pub use config::{ConsoleConfig, PreviewPolicy};

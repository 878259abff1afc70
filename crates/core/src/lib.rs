//! Core utilities shared by every Trigon crate.
//!
//! This crate provides:
//! - Error types and result aliases
//! - Logging initialization
//! - Engine configuration (defaults plus environment overrides)
//! - Timer utilities for frame and startup timing

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use logging::{init_logging, try_init_logging};
pub use timer::Timer;

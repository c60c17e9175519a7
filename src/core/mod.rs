//! Core module for Packwright
//!
//! This module contains the central engine, configuration and error types.

pub mod config;
pub mod error;
pub mod engine;

pub use config::Config;
pub use error::{PackwrightError, PackwrightResult};
pub use engine::Engine;

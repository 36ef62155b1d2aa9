//! Nano Banana studio - application wiring.
//!
//! This crate provides the pieces the `studio` binary assembles:
//!
//! - Environment configuration for the image API and identity provider

pub mod config;

pub use config::{ConfigError, EnvConfig};

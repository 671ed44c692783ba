//! # Cadence Common Library
//!
//! Shared code for the Cadence content-marketing backend:
//! - Database bootstrap and row models
//! - Configuration loading
//! - Error types
//! - Day-granular time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};

//! # Write Aid Common Library
//!
//! Shared code for the Write Aid services:
//! - Error type and result alias
//! - Layered TOML configuration
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use config::TomlConfig;
pub use error::{Error, Result};

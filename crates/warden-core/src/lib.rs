//! warden-core: shared types and configuration for graphwarden.
//!
//! Everything a deploy or monitor invocation needs to know about the
//! managed instance lives in [`WardenConfig`]: the instance name, its port
//! mappings, the administrative credential and the readiness policy. The
//! config is resolved once at startup (defaults, then `warden.toml`, then
//! environment) and passed explicitly into every component.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigFile, WardenConfig, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use types::*;

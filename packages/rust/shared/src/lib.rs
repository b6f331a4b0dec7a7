//! Shared types, error model, and configuration for Harvest.
//!
//! This crate is the foundation depended on by all other Harvest crates.
//! It provides:
//! - [`HarvestError`] and [`GatewayError`], the unified error types
//! - Domain types ([`HeritageSite`], [`SiteType`], [`SchemaVersion`], [`YearRange`], [`RunId`])
//! - Configuration ([`AppConfig`], [`Credentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiKey, AppConfig, Credentials, DefaultsConfig, LlmConfig, config_dir, config_file_path,
    init_config, init_config_at, load_config, load_config_from,
};
pub use error::{GatewayError, HarvestError, Result};
pub use types::{HeritageSite, MIN_REGISTERED_YEAR, RunId, SchemaVersion, SiteType, YearRange};

pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{mail::SmtpNotifier, storage::LocalStorage};
pub use crate::app::pipelines::trials_pipeline::TrialsPipeline;
pub use crate::config::{toml_config::TomlConfig, CliConfig};
pub use crate::core::etl::EtlEngine;
pub use crate::utils::error::{EtlError, Result};

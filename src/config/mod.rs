pub mod toml_config;

use crate::config::toml_config::TomlConfig;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "trial-watch")]
#[command(about = "Fetch clinical trials from the registry, write a spreadsheet and email a summary")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "trial-watch.toml")]
    pub config: String,

    /// Override load.output_path from the config file
    #[arg(long)]
    pub output_path: Option<String>,

    /// Override source.max_pages from the config file
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Write the spreadsheet but do not send the email
    #[arg(long)]
    pub no_email: bool,

    /// Load and validate the configuration, then exit without fetching
    #[arg(long)]
    pub dry_run: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(output_path) = &self.output_path {
            config.load.output_path = output_path.clone();
            tracing::info!("🔧 Output path overridden to: {}", output_path);
        }
        if let Some(max_pages) = self.max_pages {
            config.source.max_pages = Some(max_pages);
            tracing::info!("🔧 Max pages overridden to: {}", max_pages);
        }
        if self.no_email {
            config.notify.enabled = false;
            tracing::info!("🔧 Email notification disabled");
        }
    }
}

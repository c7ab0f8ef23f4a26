use clap::Parser;
use trial_watch::core::RunSummary;
use trial_watch::utils::error::ErrorSeverity;
use trial_watch::utils::{logger, validation::Validate};
use trial_watch::{CliConfig, EtlEngine, LocalStorage, SmtpNotifier, TomlConfig, TrialsPipeline};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("📁 Loading configuration from: {}", cli.config);
    let mut config = match TomlConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };
    cli.apply_overrides(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    tracing::debug!("Configuration: {:?}", config.source);

    if cli.dry_run {
        display_config_summary(&config);
        return Ok(());
    }

    let storage = LocalStorage::new(config.load.output_path.clone());
    let notifier = SmtpNotifier::new(config.notify.clone());
    let pipeline = TrialsPipeline::new(config, storage, Some(notifier));
    let engine = EtlEngine::new(pipeline);

    match engine.run().await {
        Ok(summary) => {
            display_run_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

fn display_config_summary(config: &TomlConfig) {
    println!("🔍 Dry run, nothing will be fetched or sent");
    println!("  Endpoint:   {}", config.source.studies_url());
    println!("  Page size:  {}", config.source.page_size);
    if let Some(max_pages) = config.source.max_pages {
        println!("  Max pages:  {}", max_pages);
    }
    for (key, value) in &config.source.parameters {
        println!("  Parameter:  {} = {}", key, value);
    }
    println!("  Statuses:   {}", config.filter.allowed_statuses.join(", "));
    println!("  Columns:    {}", config.projection.header().len());
    println!(
        "  Output:     {}/{}",
        config.load.output_path, config.load.filename
    );
    if config.notify.enabled {
        println!(
            "  Email:      {} -> {} via {}:{}",
            config.notify.sender,
            config.notify.recipients.join(", "),
            config.notify.smtp_host,
            config.notify.smtp_port
        );
    } else {
        println!("  Email:      disabled");
    }
}

fn display_run_summary(summary: &RunSummary) {
    println!(
        "✅ Fetched {} studies from {} pages{}",
        summary.records_fetched,
        summary.pages_fetched,
        if summary.fetch_complete { "" } else { " (stopped early)" }
    );
    println!("✅ {} trials matched the status filter", summary.rows_retained);
    match &summary.output {
        Some(output) if output.formatted => println!("📁 Output saved to: {}", output.path.display()),
        Some(output) => println!(
            "📁 Output saved to: {} (unformatted)",
            output.path.display()
        ),
        None => println!("📭 No spreadsheet written"),
    }
    println!("📧 Notification: {:?}", summary.notification);
}

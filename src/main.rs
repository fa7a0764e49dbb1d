use clap::Parser;
use jsonp_etl::core::{ConfigProvider, Storage};
use jsonp_etl::utils::error::ErrorSeverity;
use jsonp_etl::utils::{logger, validation::Validate};
use jsonp_etl::{CliConfig, EtlEngine, FeedConfig, JsonpPipeline, LocalStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting jsonp-etl");
    tracing::debug!("CLI args: {:?}", args);

    let config = match args.resolve().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let storage = LocalStorage::new(config.output_path.clone());

    if args.dry_run {
        display_config_summary(&config);
        if storage.exists(config.output_file()).await? {
            println!("♻️ {} exists and would be replaced", config.output_file());
        }
        return Ok(());
    }

    let monitor_enabled = config.monitoring;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = JsonpPipeline::new(storage, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            let report = engine.pipeline().last_report();
            for skipped in report.skipped() {
                eprintln!("⚠️ Skipped {}", skipped.endpoint);
            }
            println!("✅ All done! CSV saved to {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &FeedConfig) {
    println!("🔍 Dry run, nothing will be fetched");
    println!("📡 Endpoints ({}):", config.endpoints().len());
    for endpoint in config.endpoints() {
        println!("   - {}", endpoint);
    }
    let columns: Vec<&str> = config.columns().iter().map(|c| c.as_str()).collect();
    println!("📋 Columns: {}", columns.join(","));
    println!(
        "📁 Output: {}/{}",
        config.output_path(),
        config.output_file()
    );
    println!("🔑 Records key: {}", config.records_key());
    if let Some(timeout) = config.timeout_seconds() {
        println!("⏱️ Timeout: {}s", timeout);
    }
    println!("🚦 On transport error: {:?}", config.transport_policy());
}

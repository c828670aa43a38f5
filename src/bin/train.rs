use anyhow::Context;
use clap::Parser;
use diabetes_risk::config::toml_config::TrainingConfig;
use diabetes_risk::utils::{logger, validation::Validate};
use diabetes_risk::{LocalStorage, PimaPipeline, TrainingEngine};
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "train-config.toml";

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train the diabetes risk classifier and save model.json / scaler.json")]
struct Args {
    /// Path to TOML configuration file (defaults to train-config.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the output directory for the artifacts
    #[arg(short, long)]
    output: Option<String>,

    /// Read the dataset from a local CSV instead of downloading it
    #[arg(long)]
    dataset_path: Option<String>,

    /// Override the number of training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Dry run - show the resolved configuration without training
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Starting diabetes risk training");

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(e.exit_code());
        }
    };

    // 應用命令列覆蓋設定
    if let Some(output) = &args.output {
        config.output.model_dir = output.clone();
        tracing::info!("🔧 Output directory overridden to: {}", output);
    }
    if let Some(path) = &args.dataset_path {
        config.dataset.path = Some(path.clone());
        tracing::info!("🔧 Dataset path overridden to: {}", path);
    }
    if let Some(epochs) = args.epochs {
        config.model.epochs = epochs;
        tracing::info!("🔧 Epochs overridden to: {}", epochs);
    }
    if let Some(monitor) = args.monitor {
        config.monitoring.enabled = monitor;
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No training will occur");
        let resolved =
            toml::to_string_pretty(&config).context("failed to render the resolved configuration")?;
        println!("{}", resolved);
        return Ok(());
    }

    let monitor_enabled = config.monitoring.enabled;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output.model_dir.clone());
    let pipeline = PimaPipeline::new(storage, config);
    let engine = TrainingEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(summary) => {
            println!("✅ Training completed in {} epochs", summary.epochs_run);
            println!(
                "📊 Test accuracy: {:.4} (precision {:.4}, recall {:.4}, f1 {:.4})",
                summary.metrics.accuracy,
                summary.metrics.precision,
                summary.metrics.recall,
                summary.metrics.f1
            );
            println!("📁 Model saved to: {}", summary.model_path);
            println!("📁 Scaler saved to: {}", summary.scaler_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Training failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> diabetes_risk::Result<TrainingConfig> {
    match path {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            TrainingConfig::from_file(path)
        }
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            tracing::info!("📁 Loading configuration from: {}", DEFAULT_CONFIG_FILE);
            TrainingConfig::from_file(DEFAULT_CONFIG_FILE)
        }
        None => {
            tracing::info!("📁 No configuration file, using defaults");
            Ok(TrainingConfig::default())
        }
    }
}

fn display_config_summary(config: &TrainingConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    match &config.dataset.path {
        Some(path) => println!("  Dataset: {} (local)", path),
        None => println!("  Dataset: {}", config.dataset.url),
    }
    println!(
        "  Zero as missing: {}",
        config.preprocess.zero_as_missing.join(", ")
    );
    println!(
        "  Split: test_size {} (seed {})",
        config.preprocess.test_size, config.preprocess.seed
    );
    let layers: Vec<String> = config
        .model
        .hidden_layers
        .iter()
        .map(|l| format!("{}(dropout {})", l.units, l.dropout))
        .collect();
    println!("  Hidden layers: {}", layers.join(" -> "));
    println!(
        "  Epochs: {}, batch size: {}, learning rate: {}",
        config.model.epochs, config.model.batch_size, config.model.learning_rate
    );
    println!("  Output: {}", config.output.model_dir);

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

use clap::Parser;
use diabetes_risk::utils::logger::{self, LogFormat};
use diabetes_risk::utils::validation::Validate;
use diabetes_risk::{api, AppState, LocalStorage, Predictor, ServeConfig};

#[derive(Parser, Debug)]
#[command(name = "diabetes-risk")]
#[command(about = "HTTP service that scores diabetes risk from eight clinical features")]
struct Args {
    /// Bind address (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding model.json and scaler.json (overrides MODEL_DIR)
    #[arg(long)]
    model_dir: Option<String>,

    /// Built web client to serve at / (overrides STATIC_DIR)
    #[arg(long)]
    static_dir: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    logger::init_logger(format, args.verbose);

    let mut config = match ServeConfig::from_env() {
        Ok(config) => config,
        Err(e) => fail(e),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(model_dir) = args.model_dir {
        config.model_dir = model_dir;
    }
    if let Some(static_dir) = args.static_dir {
        config.static_dir = Some(static_dir);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        fail(e);
    }
    tracing::debug!("Service config: {:?}", config);

    // 模型只在啟動時載入一次
    let storage = LocalStorage::new(config.model_dir.clone());
    let predictor = match Predictor::load(&storage).await {
        Ok(predictor) => predictor,
        Err(e) => fail(e),
    };

    if let Err(e) = api::serve(&config, AppState::new(predictor)).await {
        fail(e);
    }

    Ok(())
}

fn fail(e: diabetes_risk::RiskError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    std::process::exit(e.exit_code().max(1))
}

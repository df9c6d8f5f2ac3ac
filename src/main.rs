use clap::Parser;
use medicine_finder::adapters::http::{self, AppState};
use medicine_finder::domain::ports::ConfigProvider;
use medicine_finder::utils::error::FinderError;
use medicine_finder::utils::{logger, validation::Validate};
use medicine_finder::{build_service, build_symptom_analyzer, CliConfig, TomlConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 有指定設定檔時以 TOML 為準
    let toml = match &cli.config {
        Some(path) => match TomlConfig::from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let verbose = cli.verbose || toml.as_ref().map(TomlConfig::verbose).unwrap_or(false);

    // 初始化日誌
    logger::init_cli_logger(verbose);

    tracing::info!("Starting medicine-finder server");
    if verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let result = match &toml {
        Some(config) => run(config, config.bind_address()).await,
        None => run(&cli, &cli.bind).await,
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ Server failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }

    Ok(())
}

async fn run<C: ConfigProvider + Validate>(config: &C, bind: &str) -> Result<(), FinderError> {
    // 驗證配置
    config.validate()?;
    let addr = medicine_finder::utils::validation::validate_socket_addr("bind", bind)?;

    let service = build_service(config)?;
    let symptoms = build_symptom_analyzer(config)?;
    http::serve(addr, AppState::new(service, symptoms)).await
}

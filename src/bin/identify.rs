use clap::Parser;
use medicine_finder::adapters::api_client::IdentifyClient;
use medicine_finder::core::conversation::{assistant_reply, render_transcript, Conversation};
use medicine_finder::core::identification::{build_prompt, IdentificationService};
use medicine_finder::core::schema;
use medicine_finder::domain::model::{Identification, IdentifyRequest, Message, Provenance};
use medicine_finder::domain::ports::{ConfigProvider, ContentPart, ProductIdentifier};
use medicine_finder::utils::error::{FinderError, MISSING_INPUT_MESSAGE};
use medicine_finder::utils::{image, logger, validation::Validate};
use medicine_finder::{build_service, AvailabilityFilter, CliConfig, RankView, SortKey, TomlConfig};

#[derive(Parser)]
#[command(name = "identify")]
#[command(about = "Identify a healthcare product once and print ranked retailer offers")]
struct Args {
    /// Product description, e.g. "something for a headache"
    #[arg(short, long)]
    query: Option<String>,

    /// Path to a product photo (png, jpeg, webp, gif)
    #[arg(short, long)]
    image: Option<String>,

    #[arg(long, default_value = "price-low")]
    sort: SortKey,

    #[arg(long, default_value = "all")]
    filter: AvailabilityFilter,

    /// Ask a running server instead of calling the model in-process
    #[arg(long)]
    endpoint: Option<String>,

    /// Print the raw identification JSON instead of the ranked listing
    #[arg(long)]
    json: bool,

    /// Show the prompt that would be sent without calling the model
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    config: CliConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let toml = match &args.config.config {
        Some(path) => match TomlConfig::from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    // 初始化日誌
    let verbose = args.config.verbose || toml.as_ref().map(TomlConfig::verbose).unwrap_or(false);
    logger::init_cli_logger(verbose);

    let result = match &toml {
        Some(config) => run(&args, config).await,
        None => run(&args, &args.config).await,
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ Identification failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }

    Ok(())
}

async fn run<C: ConfigProvider + Validate>(args: &Args, config: &C) -> Result<(), FinderError> {
    config.validate()?;

    let image = args.image.as_deref().map(image::load_data_uri).transpose()?;
    let request = IdentifyRequest::new(args.query.clone(), image);
    if request.is_empty() {
        return Err(FinderError::invalid_request(MISSING_INPUT_MESSAGE));
    }

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No model call will be made");
        perform_dry_run(config, &request)?;
        return Ok(());
    }

    // 經由端點時來源標記只記錄在日誌中
    let (result, provenance) = match &args.endpoint {
        Some(endpoint) => {
            let client = IdentifyClient::new(endpoint);
            tracing::info!("🌐 Using endpoint: {}", client.url());
            (client.identify(&request).await?, None)
        }
        None => {
            let service = build_service(config)?;
            let Identification { result, provenance } =
                IdentificationService::identify(&service, &request).await?;
            (result, Some(provenance))
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if provenance == Some(Provenance::Fallback) {
        println!("ℹ️  Showing sample data, the model could not be reached");
    }

    let view = RankView::new(args.sort, args.filter);
    println!("Sort: {}  |  Filter: {}", view.sort, view.filter);

    let conversation = Conversation::new()
        .append(Message::user(
            request.query_text().unwrap_or_default(),
            request.image_data().map(str::to_string),
        ))
        .append(assistant_reply(&result));
    print!("{}", render_transcript(&conversation, &view));

    Ok(())
}

fn perform_dry_run<C: ConfigProvider>(config: &C, request: &IdentifyRequest) -> Result<(), FinderError> {
    let parts = build_prompt(request);

    println!("🔍 Dry run analysis:");
    println!("  🤖 Model: {} via {}", config.model(), config.model_endpoint());
    println!("  🔑 API key configured: {}", config.api_key().is_some());
    println!("  📏 Max output tokens: {}", config.max_output_tokens());
    println!("  📐 Schema: {}", schema::SCHEMA_NAME);
    for (index, part) in parts.iter().enumerate() {
        match part {
            ContentPart::Text(text) => println!("  [{}] text: {}", index, text),
            ContentPart::Image(uri) => println!("  [{}] image: {} bytes", index, uri.len()),
        }
    }
    Ok(())
}

use clap::Parser;
use medicine_finder::adapters::api_client::IdentifyClient;
use medicine_finder::core::conversation::{render_transcript, ChatSession, Conversation, TurnOutcome};
use medicine_finder::domain::model::Role;
use medicine_finder::domain::ports::{ConfigProvider, ProductIdentifier};
use medicine_finder::utils::error::FinderError;
use medicine_finder::utils::{image, logger, validation::Validate};
use medicine_finder::{build_service, CliConfig, RankView, TomlConfig};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "chat")]
#[command(about = "Talk to the medicine finder from the terminal")]
struct Args {
    /// Base URL of a running server, e.g. http://127.0.0.1:3000
    #[arg(long)]
    endpoint: Option<String>,

    #[command(flatten)]
    config: CliConfig,
}

const HELP: &str = "Commands: /sort <price-low|price-high|rating>, /filter <all|in-stock|low-stock>, /image <path>, /quit";

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

    let identifier = match &toml {
        Some(config) => select_identifier(&args, config),
        None => select_identifier(&args, &args.config),
    };

    let identifier = match identifier {
        Ok(identifier) => identifier,
        Err(e) => {
            tracing::error!("❌ Failed to start chat: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    };

    chat_loop(ChatSession::new(identifier)).await?;
    Ok(())
}

/// 有 `--endpoint` 時經由 HTTP，否則在行程內直接呼叫模型
fn select_identifier<C: ConfigProvider + Validate>(
    args: &Args,
    config: &C,
) -> Result<Arc<dyn ProductIdentifier>, FinderError> {
    if let Some(endpoint) = &args.endpoint {
        let client = IdentifyClient::new(endpoint);
        tracing::info!("🌐 Using endpoint: {}", client.url());
        return Ok(Arc::new(client));
    }

    config.validate()?;
    let service: Arc<dyn ProductIdentifier> = build_service(config)?;
    Ok(service)
}

async fn chat_loop(session: ChatSession<Arc<dyn ProductIdentifier>>) -> std::io::Result<()> {
    let mut view = RankView::default();
    let mut pending_image: Option<String> = None;

    println!("{}", HELP);
    let mut shown = print_new_messages(&session.conversation(), 0, &view);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();

        if let Some(command) = line.strip_prefix('/') {
            let (name, value) = command.split_once(' ').unwrap_or((command, ""));
            let value = value.trim();
            match name {
                "quit" | "exit" => break,
                "sort" => match value.parse() {
                    Ok(sort) => {
                        view.sort = sort;
                        reprint_latest_results(&session.conversation(), &view);
                    }
                    Err(e) => println!("⚠️  {}", e),
                },
                "filter" => match value.parse() {
                    Ok(filter) => {
                        view.filter = filter;
                        reprint_latest_results(&session.conversation(), &view);
                    }
                    Err(e) => println!("⚠️  {}", e),
                },
                "image" => match image::load_data_uri(value) {
                    Ok(uri) => {
                        println!("📎 Image attached; send a message (or an empty line) to identify it");
                        pending_image = Some(uri);
                    }
                    Err(e) => println!("⚠️  {}", e),
                },
                _ => println!("{}", HELP),
            }
            continue;
        }

        if session.send_turn(line, pending_image.take()).await == TurnOutcome::Ignored {
            continue;
        }
        shown = print_new_messages(&session.conversation(), shown, &view);
    }

    println!("👋 Bye");
    Ok(())
}

/// 只輸出使用者還沒看過的訊息（使用者自己輸入的那則略過）
fn print_new_messages(conversation: &Conversation, shown: usize, view: &RankView) -> usize {
    let fresh = conversation
        .messages()
        .iter()
        .skip(shown)
        .filter(|message| message.role == Role::Assistant)
        .fold(Conversation::new(), |log, message| log.append(message.clone()));
    print!("{}", render_transcript(&fresh, view));
    conversation.len()
}

fn reprint_latest_results(conversation: &Conversation, view: &RankView) {
    println!("Sort: {}  |  Filter: {}", view.sort, view.filter);
    let latest = conversation
        .messages()
        .iter()
        .rev()
        .find(|message| message.results.is_some());
    match latest {
        Some(message) => print!(
            "{}",
            render_transcript(&Conversation::new().append(message.clone()), view)
        ),
        None => println!("(no results yet)"),
    }
}

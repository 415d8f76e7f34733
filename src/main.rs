use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voice_agent_gateway::{
    ServerConfig,
    core::llm::LlmProvider,
    core::media::MediaToolkit,
    core::session::{OutboundKind, OutboundMessage},
    core::tools::builtin_registry,
    routes,
    state::AppState,
};

/// Voice agent gateway - text and voice conversations with tool-driven media tasks
#[derive(Parser, Debug)]
#[command(name = "voice-agent-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Model backend: qwen, yuanbao or custom
    #[arg(long = "llm-type", value_name = "TYPE")]
    llm_type: Option<LlmProvider>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP/WebSocket server (default)
    Serve,

    /// Chat with the agent from the terminal
    Repl,

    /// List the registered tools
    Tools,
}

fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let config = if let Some(config_path) = &cli.config {
        println!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    match cli.llm_type {
        Some(provider) => config
            .with_llm_provider(provider)
            .map_err(|e| anyhow!(e.to_string())),
        None => Ok(config),
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize crypto provider for TLS connections
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    if let Some(Commands::Tools) = cli.command {
        let registry = builtin_registry(Arc::new(MediaToolkit::default()));
        println!("{}", registry.describe());
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_tracing(&config.log_level);

    let app_state = AppState::new(config).map_err(|e| anyhow!(e.to_string()))?;
    check_media_tools(&app_state).await;

    let shutdown = CancellationToken::new();
    let background = app_state.spawn_background(shutdown.clone());

    let result = match cli.command {
        Some(Commands::Repl) => run_repl(app_state, shutdown.clone()).await,
        _ => serve(app_state, shutdown.clone()).await,
    };

    shutdown.cancel();
    for handle in background {
        handle.abort();
    }
    result
}

async fn check_media_tools(app_state: &AppState) {
    match app_state.toolkit.version().await {
        Ok(version) => info!(version = %version, "ffmpeg available"),
        Err(e) => warn!("ffmpeg not usable, media tools will fail: {}", e),
    }
    println!("Available tools:\n{}", app_state.registry.describe());
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}

async fn serve(app_state: Arc<AppState>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let address = app_state.config.address();
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    let app = routes::create_app(app_state);

    println!("Server listening on http://{socket_addr}");
    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;

    Ok(())
}

fn print_outbound(message: &OutboundMessage) {
    match message.kind {
        OutboundKind::ChatCompletions => {
            println!("[{}] {}", message.user_id, message.content);
        }
        OutboundKind::ChatVoice => {
            if message.done == Some(true) {
                println!("[{}] <voice reply finished>", message.user_id);
            }
        }
    }
}

async fn run_repl(app_state: Arc<AppState>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let (tx, mut rx) =
        mpsc::channel::<OutboundMessage>(app_state.config.outbound_queue_capacity.max(1));
    let attachment = app_state.session.attach_outbound(tx);

    let printer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            print_outbound(&message);
        }
    });

    println!("Type a message, or 'exit' to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut turn: u64 = 0;

    loop {
        let line = tokio::select! {
            _ = shutdown_signal(shutdown.clone()) => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        turn += 1;
        let item_id = format!("repl-{turn}");
        app_state
            .session
            .handle_text("repl", &item_id, line, false)
            .await;
    }

    app_state.session.detach_outbound(attachment);
    printer.abort();
    Ok(())
}

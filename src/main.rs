use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use diaa_voice::speech::console::{ConsoleRecognizer, ConsoleSynthesizer};
use diaa_voice::{
    create_router, event_channel, AppState, Collaborators, Config, DialogflowAgent, HttpRelay,
    SessionController, Voice,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diaa", about = "Voice chat front-end and dialog relay")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/diaa")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the relay between the front-end and the dialog agent
    Relay(RelayArgs),
    /// Run a voice session in the terminal (typed lines stand in for speech)
    Chat(ChatArgs),
}

#[derive(Args)]
struct RelayArgs {
    #[arg(long)]
    bind: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long, env = "GOOGLE_PROJECT_ID")]
    project_id: Option<String>,

    #[arg(long, env = "GOOGLE_LOCATION")]
    location: Option<String>,

    #[arg(long, env = "GOOGLE_AGENT_ID")]
    agent_id: Option<String>,

    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[arg(long)]
    language_code: Option<String>,
}

#[derive(Args)]
struct ChatArgs {
    /// Relay endpoint receiving `{message}` posts
    #[arg(long)]
    relay_url: Option<String>,

    /// Start listening without waiting for /start
    #[arg(long)]
    auto_start: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("DIAA voice v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Relay(args) => serve_relay(cfg, args).await,
        Command::Chat(args) => run_chat(cfg, args).await,
    }
}

async fn serve_relay(mut cfg: Config, args: RelayArgs) -> Result<()> {
    let agent_cfg = &mut cfg.agent;
    agent_cfg.project_id = args.project_id.or(agent_cfg.project_id.take());
    agent_cfg.location = args.location.or(agent_cfg.location.take());
    agent_cfg.agent_id = args.agent_id.or(agent_cfg.agent_id.take());
    agent_cfg.access_token = args.access_token.or(agent_cfg.access_token.take());
    agent_cfg.language_code = args.language_code.or(agent_cfg.language_code.take());

    let agent = DialogflowAgent::from_config(&cfg.agent)?;
    let router = create_router(AppState::new(Arc::new(agent)));

    let bind = args.bind.unwrap_or(cfg.service.http.bind);
    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Relay listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Relay server failed")?;

    info!("Relay stopped");
    Ok(())
}

async fn run_chat(mut cfg: Config, args: ChatArgs) -> Result<()> {
    if args.auto_start {
        cfg.session.auto_start = true;
    }
    let relay_url = args.relay_url.unwrap_or(cfg.relay.url);

    let (events_tx, events_rx) = event_channel();
    let recognizer = Arc::new(ConsoleRecognizer::new(events_tx.clone()));
    let voices: Vec<Voice> = [&cfg.languages.primary, &cfg.languages.secondary]
        .iter()
        .map(|language| Voice::new(format!("console {}", language.lang), language.lang.clone()))
        .collect();
    let synthesizer = Arc::new(ConsoleSynthesizer::new(events_tx.clone(), voices));
    let relay = Arc::new(HttpRelay::new(
        relay_url,
        Duration::from_secs(cfg.relay.timeout_secs),
    )?);

    let collaborators = Collaborators {
        recognizer: recognizer.clone(),
        synthesizer,
        relay,
    };
    let (controller, handle) =
        SessionController::new(cfg.session, cfg.languages, collaborators, events_tx, events_rx);
    let controller_task = tokio::spawn(controller.run());

    // Status line printer
    let mut ui = handle.subscribe();
    tokio::spawn(async move {
        while ui.changed().await.is_ok() {
            let snapshot = ui.borrow_and_update().clone();
            println!("[{}] {}", snapshot.switch_label, snapshot.status_text);
        }
    });

    println!("Commands: /start /mute /stop /lang /quit; anything else is spoken input");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let sent = match line {
            "" => Ok(()),
            "/start" => handle.start(),
            "/mute" => handle.mute(),
            "/stop" => handle.stop(),
            "/lang" => handle.switch_language(),
            "/quit" => break,
            text => {
                recognizer.feed(text).await;
                Ok(())
            }
        };
        if let Err(e) = sent {
            warn!("{:#}", e);
            break;
        }
    }

    handle.shutdown().ok();
    controller_task.await.context("Session controller panicked")?;
    Ok(())
}

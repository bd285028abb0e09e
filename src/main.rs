use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use agent_chat::app::App;
use agent_chat::config::{Config, ENDPOINT_ENV};
use agent_chat::tui::{EventHandler, Tui};
use agent_chat::{handler, logging, tui, ui, AgentClient, ChatSession};

#[derive(Parser)]
#[command(name = "agent-chat", version)]
#[command(about = "Chat with a remote agent endpoint from the terminal")]
struct Cli {
    /// Agent endpoint URL (overrides AGENT_CHAT_URL and the config file)
    #[arg(short, long)]
    url: Option<String>,

    /// Save the resolved endpoint URL to the config file
    #[arg(long)]
    save: bool,

    /// Where to write logs (defaults to the user data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message, print the exchange and exit
    Send {
        /// Message text
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = cli.log_file.clone().or_else(logging::default_log_path);
    logging::init(log_path.as_deref())?;

    let mut config = match Config::config_path() {
        Ok(path) => Config::load_for_run(&path, cli.save)?,
        Err(e) if !cli.save => {
            warn!("ignoring config: {}", e);
            Config::new()
        }
        Err(e) => return Err(e.into()),
    };

    let env_url = std::env::var(ENDPOINT_ENV).ok();
    let endpoint = config.resolve_endpoint(cli.url.as_deref(), env_url.as_deref())?;

    if cli.save {
        config.endpoint_url = Some(endpoint.to_string());
        let path = config.save()?;
        info!("saved endpoint to {}", path.display());
    }

    info!(%endpoint, "using agent endpoint");
    let client = AgentClient::new(endpoint);

    match cli.command {
        Some(Commands::Send { query }) => send_once(&client, &query).await,
        None => run_tui(client).await,
    }
}

async fn send_once(client: &AgentClient, query: &str) -> Result<()> {
    let mut session = ChatSession::new();
    session.exchange(client, query).await;

    for line in session.transcript() {
        println!("{}", line);
    }
    Ok(())
}

async fn run_tui(client: AgentClient) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(client, events.sender());

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}

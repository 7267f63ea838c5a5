//! Hexlink - Unified CLI
//!
//! Runs the match server or acts as a terminal client for it.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use cli::{Cli, ClientArgs, Command, game_code, parse_move};
use hexlink_client::{ApiClient, ClientConfig, LocalStore, LocalView, Mode, SyncAgent, load_overview, resume_match};
use hexlink_core::{MatchId, Phase};
use hexlink_server::{Server, ServerConfig, StoreConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, instrument, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();
    initialize_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            public_origin,
            db,
        } => run_server(config, host, port, public_origin, db).await,
        Command::Create { client } => create_match(client).await,
        Command::Join { game, client } => join_match(game, client).await,
        Command::Play { game, client } => play(game, client).await,
        Command::Games { client } => list_games(client).await,
    }
}

fn initialize_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hexlink=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the match server
#[instrument(skip_all)]
async fn run_server(
    config_path: Option<std::path::PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    public_origin: Option<String>,
    db: Option<String>,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(origin) = public_origin {
        config = config.with_public_origin(origin);
    }
    if let Some(path) = db {
        config = config.with_store(StoreConfig::Sqlite { path });
    }

    info!(host = %config.host(), port = config.port(), "Starting match server");
    let server = Server::bind(config).await?;
    info!(addr = %server.local_addr()?, "Server ready");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            info!("Shutting down match server");
        })
        .await?;
    Ok(())
}

fn client_config(args: &ClientArgs) -> Result<ClientConfig> {
    let mut config = match &args.client_config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &args.server_url {
        config = config.with_server_url(url.clone());
    }
    if let Some(state) = &args.state {
        config = config.with_state_path(state.clone());
    }
    Ok(config)
}

fn match_id(game: &str) -> Result<MatchId> {
    let code = game_code(game);
    MatchId::parse(code).with_context(|| format!("'{}' is not a match code", code))
}

/// Create an online match
async fn create_match(args: ClientArgs) -> Result<()> {
    let config = client_config(&args)?;
    let mut store = LocalStore::open(config.state_path());
    let player_id = store.player_id()?;

    let api = ApiClient::new(config.server_url().clone());
    let created = api.create(&player_id).await?;
    store.remember_match(created.game_id.as_str(), &player_id, Utc::now())?;

    println!("Match:  {}", created.game_id);
    println!("Color:  {}", created.player_color);
    println!("Share:  {}", created.share_link);
    Ok(())
}

/// Take the second seat
async fn join_match(game: String, args: ClientArgs) -> Result<()> {
    let config = client_config(&args)?;
    let id = match_id(&game)?;
    let mut store = LocalStore::open(config.state_path());
    let player_id = store.player_id()?;

    let api = ApiClient::new(config.server_url().clone());
    let joined = api.join(&id, &player_id).await?;
    store.remember_match(id.as_str(), &player_id, Utc::now())?;

    println!("Joined {} as {}", id, joined.player_color);
    println!("{}", joined.game_state.board.display());
    Ok(())
}

/// Play interactively until stdin closes or the user quits
async fn play(game: Option<String>, args: ClientArgs) -> Result<()> {
    let config = client_config(&args)?;
    let agent = SyncAgent::spawn(&config);

    if let Some(game) = game {
        let id = match_id(&game)?;
        let mut store = LocalStore::open(config.state_path());
        resume_match(&agent, &mut store, id, Utc::now()).await?;
    }

    println!("Moves: 'row col' or 'e3'. Commands: sync, reset, quit.");
    let mut views = agent.subscribe();
    render(&views.borrow_and_update());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                render(&view);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "quit" | "exit" => break,
                    "sync" => {
                        if let Err(e) = agent.sync().await {
                            println!("{}", e);
                        }
                    }
                    "reset" => agent.reset().await?,
                    other => match parse_move(other) {
                        Some((row, col)) => {
                            if let Err(e) = agent.make_move(row, col).await {
                                println!("{}", e);
                            }
                        }
                        None => println!("Enter a move as 'row col' or 'e3'"),
                    },
                }
            }
        }
    }

    agent.shutdown().await.ok();
    Ok(())
}

fn render(view: &LocalView) {
    println!("\n{}", view.board().display());
    let status = match (view.phase(), view.winner()) {
        (Phase::Won, Some(winner)) => format!("{} wins", winner),
        (Phase::Waiting, _) => "Waiting for an opponent".to_string(),
        _ if *view.mode() == Mode::Local => format!("{} to move", view.current_player()),
        _ if *view.is_your_turn() => "Your move".to_string(),
        _ => format!("Waiting for {}", view.current_player()),
    };
    match (view.mode(), view.your_color()) {
        (Mode::Online, Some(color)) => println!("{} | you are {} | channel {}", status, color, view.connection()),
        _ => println!("{}", status),
    }
    if let Some(error) = view.last_error() {
        println!("! {}", error);
    }
}

/// List tracked matches
async fn list_games(args: ClientArgs) -> Result<()> {
    let config = client_config(&args)?;
    let mut store = LocalStore::open(config.state_path());
    let api = ApiClient::new(config.server_url().clone());

    let summaries = load_overview(&api, &mut store, Utc::now()).await?;
    if summaries.is_empty() {
        println!("No tracked matches");
        return Ok(());
    }
    for summary in summaries {
        let state = match (summary.phase, summary.winner) {
            (Phase::Won, Some(winner)) if winner == summary.your_color => "won".to_string(),
            (Phase::Won, _) => "lost".to_string(),
            (Phase::Waiting, _) => "waiting".to_string(),
            _ if summary.is_your_turn => "your move".to_string(),
            _ => "their move".to_string(),
        };
        println!(
            "{}  {:<5}  {:<10}  last move {}",
            summary.id,
            summary.your_color.to_string(),
            state,
            summary.last_move_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

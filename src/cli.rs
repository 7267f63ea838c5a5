//! Command-line interface for hexlink.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Hexlink - two-player hex connection game with an online match server
#[derive(Parser, Debug)]
#[command(name = "hexlink")]
#[command(about = "Hex connection game with authoritative online matches", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Where the client finds the server and its local state.
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Client config file (TOML)
    #[arg(long)]
    pub client_config: Option<PathBuf>,

    /// Server base URL, overriding the config file
    #[arg(long)]
    pub server_url: Option<String>,

    /// Local state file, overriding the config file
    #[arg(long)]
    pub state: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the match server
    Serve {
        /// Server config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Origin used in share links
        #[arg(long)]
        public_origin: Option<String>,

        /// Persist matches in this SQLite file instead of memory
        #[arg(long)]
        db: Option<String>,
    },

    /// Create an online match and print its share link
    Create {
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Take the second seat of a match
    Join {
        /// Match code or share link
        game: String,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Play a match interactively; without a code, play on this device
    Play {
        /// Match code or share link
        game: Option<String>,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// List tracked matches
    Games {
        #[command(flatten)]
        client: ClientArgs,
    },
}

/// Extracts a match code from a bare code or a `...?game=CODE` share link.
pub fn game_code(input: &str) -> &str {
    let input = input.trim();
    match input.split_once("game=") {
        Some((_, rest)) => rest.split('&').next().unwrap_or(rest),
        None => input,
    }
}

/// Parses a move typed as `row col` (`3 4`) or column letter then row (`e3`).
pub fn parse_move(input: &str) -> Option<(i64, i64)> {
    let input = input.trim();
    let mut parts = input.split_whitespace();
    if let (Some(row), Some(col), None) = (parts.next(), parts.next(), parts.next()) {
        return Some((row.parse().ok()?, col.parse().ok()?));
    }

    let mut chars = input.chars();
    let letter = chars.next()?.to_ascii_lowercase();
    if !letter.is_ascii_lowercase() {
        return None;
    }
    let row = chars.as_str().parse().ok()?;
    Some((row, i64::from(letter as u8 - b'a')))
}

mod catalog;
mod config;
mod connection;
mod handler;
mod lobby;
mod memory;
mod notifier;
mod participants;
mod server;
mod store;

use std::net::SocketAddr;

use clap::Parser;

use crate::config::LobbyConfig;

/// Quizroom Server - multiplayer trivia lobby server
#[derive(Parser, Debug)]
#[command(name = "quizroom-server", version, about)]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:9877")]
    bind: String,

    /// Maximum simultaneous connections allowed
    #[arg(short, long, default_value_t = 100)]
    max_connections: usize,

    /// Room capacity for quiz types that don't set their own
    #[arg(long, default_value_t = 8)]
    default_capacity: u16,

    /// Upper bound on any room's capacity
    #[arg(long, default_value_t = 16)]
    max_capacity: u16,

    /// Players needed before the host may start
    #[arg(long, default_value_t = 2)]
    min_participants: u16,

    /// Join codes to try before room creation gives up
    #[arg(long, default_value_t = 16)]
    code_attempts: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizroom_server=debug,quizroom_common=debug".into()),
        )
        .init();

    let args = Args::parse();

    let addr: SocketAddr = args.bind.parse()?;
    let config = LobbyConfig {
        default_capacity: args.default_capacity,
        max_capacity: args.max_capacity,
        min_participants: args.min_participants,
        code_attempts: args.code_attempts,
    };

    tracing::info!(
        "Starting quizroom server on {} (max {} connections, {:?})",
        addr,
        args.max_connections,
        config
    );
    server::run(addr, args.max_connections, config).await
}

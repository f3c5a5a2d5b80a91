mod app;
mod event;
mod input;
mod lobby;
mod network;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::app::Identity;
use crate::lobby::Intent;

/// Quizroom Client - join or host a multiplayer trivia lobby
#[derive(Parser, Debug)]
#[command(name = "quizroom-client", version, about)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:9877")]
    server: String,

    /// Stable user id; a fresh one is generated when omitted
    #[arg(long)]
    user_id: Option<Uuid>,

    /// Account handle shown as @username
    #[arg(short, long)]
    username: String,

    /// Name shown to other players (defaults to the username)
    #[arg(short, long)]
    display_name: Option<String>,

    /// Players the host needs before `start` is offered
    #[arg(long, default_value_t = 2)]
    min_players: u16,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Host a new room
    Create {
        /// Quiz type name or id
        #[arg(short, long, default_value = "Classic Trivia")]
        quiz_type: String,

        /// Category name or id
        #[arg(short, long, default_value = "General Knowledge")]
        category: String,
    },
    /// Join a waiting room by its six-character code
    Join { code: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizroom_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let identity = Identity {
        user_id: args.user_id.unwrap_or_else(Uuid::new_v4),
        display_name: args.display_name.unwrap_or_else(|| args.username.clone()),
        username: args.username,
    };
    let intent = match args.action {
        Action::Create {
            quiz_type,
            category,
        } => Intent::Create {
            quiz_type,
            category,
        },
        Action::Join { code } => Intent::Join { code },
    };

    if let Err(e) = app::run(args.server, identity, intent, args.min_players).await {
        eprintln!("Error: {}", e);
    }

    Ok(())
}

mod commands;

use clap::{Parser, Subcommand};
use commands::App;
use sealbox_core::{ClientConfig, ItemKind};
use sealbox_protocol::ProtocolError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sealbox")]
#[command(about = "Commit-reveal polls and sealed-bid auctions")]
#[command(version)]
struct Cli {
    /// Data directory for the local database and secrets
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Registry server URL; without it the registry lives in the local database
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Passphrase encrypting the local secrets file
    #[arg(long, global = true, env = "SEALBOX_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a new poll or auction
    Create {
        /// poll or auction
        kind: ItemKind,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Address of the creator
        #[arg(long)]
        creator: String,
        /// Length of the commit window in minutes
        #[arg(long, default_value_t = 60)]
        commit_minutes: i64,
        /// Length of the reveal window in minutes
        #[arg(long, default_value_t = 60)]
        reveal_minutes: i64,
    },
    /// List polls or auctions
    List { kind: ItemKind },
    /// Show one item
    Show { kind: ItemKind, id: i64 },
    /// Commit to a vote or bid
    Commit {
        kind: ItemKind,
        id: i64,
        /// Option index (yes/no accepted for polls) or bid amount
        value: String,
        /// Participant address
        #[arg(short = 'a', long = "as")]
        participant: String,
        /// Reuse a salt, e.g. when retrying a commit that never reached the ledger
        #[arg(long)]
        salt: Option<String>,
    },
    /// Reveal a previous commitment
    Reveal {
        kind: ItemKind,
        id: i64,
        /// Participant address
        #[arg(short = 'a', long = "as")]
        participant: String,
    },
    /// Show the current tally
    Tally { kind: ItemKind, id: i64 },
    /// List locally stored commitments
    Secrets {
        /// Participant address
        #[arg(short = 'a', long = "as")]
        participant: String,
        /// Print salts as well
        #[arg(long)]
        show_salts: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "sealbox={level},sealbox_core={level},sealbox_protocol={level}",
            level = log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sealbox")
    });

    let mut config = ClientConfig::new(data_dir);
    if let Some(server) = cli.server {
        config = config.with_registry(server);
    }

    let app = App::open(config, cli.passphrase).await?;

    let result = match cli.command {
        Commands::Create {
            kind,
            title,
            description,
            creator,
            commit_minutes,
            reveal_minutes,
        } => {
            commands::create_item(
                &app,
                kind,
                title,
                description,
                creator,
                commit_minutes,
                reveal_minutes,
            )
            .await
        }
        Commands::List { kind } => commands::list_items(&app, kind).await,
        Commands::Show { kind, id } => commands::show_item(&app, kind, id).await,
        Commands::Commit {
            kind,
            id,
            value,
            participant,
            salt,
        } => commands::commit(&app, kind, id, &value, &participant, salt).await,
        Commands::Reveal {
            kind,
            id,
            participant,
        } => commands::reveal(&app, kind, id, &participant).await,
        Commands::Tally { kind, id } => commands::show_tally(&app, kind, id).await,
        Commands::Secrets {
            participant,
            show_salts,
        } => commands::list_secrets(&app, &participant, show_salts).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if let Some(protocol_err) = e.downcast_ref::<ProtocolError>() {
            commands::explain(protocol_err);
        }
        std::process::exit(1);
    }

    Ok(())
}

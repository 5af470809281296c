//! Saldo CLI - Personal finance dashboard
//!
//! Usage:
//!   saldo init                      Initialize database
//!   saldo sync ITEM_ID              Link an aggregator item
//!   saldo transactions -a ACCOUNT   Show filtered transactions
//!   saldo browse                    Interactive transaction browser
//!   saldo serve --port 3000         Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
                &config,
            )
            .await
        }
        Commands::Sync { item_id } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let aggregator = commands::open_aggregator(&config)?;
            commands::cmd_sync(&db, &aggregator, &cli.user, &item_id).await
        }
        Commands::Connections { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(ConnectionsAction::List) => {
                    commands::cmd_connections_list(&db, &cli.user)
                }
                Some(ConnectionsAction::Remove { item_id }) => {
                    let aggregator = commands::open_aggregator(&config).ok();
                    commands::cmd_connections_remove(&db, aggregator.as_ref(), &cli.user, &item_id)
                        .await
                }
            }
        }
        Commands::Accounts => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_accounts(&db, &cli.user)
        }
        Commands::Categories => {
            let aggregator = commands::open_aggregator(&config)?;
            commands::cmd_categories(&aggregator).await
        }
        Commands::Transactions(args) => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let coordinator = commands::build_coordinator(&db, &config, &cli.user)?;
            commands::cmd_transactions(&coordinator, &args).await
        }
        Commands::Summary { json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let coordinator = commands::build_coordinator(&db, &config, &cli.user)?;
            commands::cmd_summary(&coordinator, json).await
        }
        Commands::Browse => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let coordinator = commands::build_coordinator(&db, &config, &cli.user)?;
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            commands::cmd_browse(&coordinator, input, std::io::stdout()).await
        }
        Commands::Ask { question } => {
            let assistant = saldo_core::assistant::ScriptedAssistant::default();
            commands::cmd_ask(&assistant, question.as_deref()).await
        }
    }
}

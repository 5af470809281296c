//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Saldo - See every bank account in one place
#[derive(Parser)]
#[command(name = "saldo")]
#[command(about = "Personal finance dashboard backed by an open-banking aggregator", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "saldo.db", global = true)]
    pub db: PathBuf,

    /// Config file (defaults to the data directory override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User owning the connections
    #[arg(long, default_value = "local-dev", global = true)]
    pub user: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set SALDO_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        #[arg(long)]
        no_auth: bool,

        /// Directory with the built dashboard to serve
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Link an aggregator item and store its accounts
    Sync {
        /// Item id returned by the connect widget
        item_id: String,
    },

    /// Manage linked connections
    Connections {
        #[command(subcommand)]
        action: Option<ConnectionsAction>,
    },

    /// List accounts under active connections
    Accounts,

    /// List transaction categories
    Categories,

    /// Show one filtered page of an account's transactions
    Transactions(TransactionsArgs),

    /// Recent activity across every account
    Summary {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Interactive transaction browser
    Browse,

    /// Ask the financial assistant a question
    Ask {
        /// Question text, or the number of a suggested question
        question: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConnectionsAction {
    /// List connections, including inactive ones
    List,
    /// Remove a connection and its accounts
    Remove {
        /// Item id
        item_id: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TransactionsArgs {
    /// Account id or name
    #[arg(short, long)]
    pub account: String,

    /// Description search
    #[arg(short, long)]
    pub search: Option<String>,

    /// Category id, or "all"
    #[arg(short, long)]
    pub category: Option<String>,

    /// Transaction type: all, CREDIT, DEBIT
    #[arg(short = 't', long = "type")]
    pub kind: Option<String>,

    /// Date range: all, today, week, month
    #[arg(short, long)]
    pub range: Option<String>,

    /// Page number
    #[arg(short, long, default_value = "1")]
    pub page: u32,

    /// Page size: 50, 100, 200, 300 or 500
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use saldo_core::config::SaldoConfig;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
    config: &SaldoConfig,
) -> Result<()> {
    println!("🚀 Starting Saldo web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!("   Aggregator: {}", config.aggregator.base_url);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    let api_keys =
        saldo_server::parse_api_keys(&std::env::var(saldo_server::API_KEYS_ENV).unwrap_or_default());

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        println!("   🔒 Authentication: Cloudflare Access header or API key");
        if !api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured ({})",
                api_keys.len(),
                saldo_server::API_KEYS_ENV
            );
        }
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let server_config = saldo_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins: vec![],
        api_keys,
        aggregator: config.aggregator.clone(),
    };

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("Static dir path must be valid UTF-8"))
        .transpose()?;
    saldo_server::serve_with_config(db, host, port, static_dir_str, server_config).await?;

    Ok(())
}

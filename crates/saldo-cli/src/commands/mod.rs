//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `assistant` - Scripted finance assistant (ask)
//! - `browse` - Interactive transaction browser
//! - `connections` - Linked banks (sync, connections, accounts)
//! - `core` - Core commands (init) and shared utilities (open_db, coordinator setup)
//! - `serve` - Web server command
//! - `transactions` - Transaction commands (categories, transactions, summary)

pub mod assistant;
pub mod browse;
pub mod connections;
pub mod core;
pub mod serve;
pub mod transactions;

// Re-export command functions for main.rs
pub use assistant::*;
pub use browse::*;
pub use connections::*;
pub use core::*;
pub use serve::*;
pub use transactions::*;

/// Truncate a string to a maximum length in characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an amount with two decimals and its currency code
pub fn format_amount(amount: f64, currency: &str) -> String {
    format!("{:.2} {}", amount, currency)
}

//! Saldo Core Library
//!
//! Shared functionality for the Saldo personal finance dashboard:
//! - Aggregator client (Pluggy REST API, in-memory mock)
//! - Per-account transaction view coordinator with search debounce
//! - Filter state, query construction and pagination
//! - Connection/account persistence (SQLite, optional SQLCipher encryption)
//! - Scripted financial assistant
//! - Configuration (embedded defaults, TOML override, environment)

pub mod aggregator;
pub mod assistant;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod debounce;
pub mod error;
pub mod filters;
pub mod models;
pub mod pagination;
pub mod query;

/// Test utilities including mock Pluggy server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregator::{
    AggregatorBackend, AggregatorClient, ConnectorFilter, MockBackend, MockCall, PluggyBackend,
};
pub use assistant::{ChatMessage, Conversation, ScriptedAssistant, Sender};
pub use config::{AggregatorConfig, SaldoConfig, ViewConfig};
pub use coordinator::{AccountView, SummaryGroup, TransactionCoordinator, ViewMode};
pub use db::Database;
pub use debounce::Debouncer;
pub use error::{Error, Result};
pub use filters::{DateRange, FilterState, FilterStore, PAGE_SIZE_OPTIONS};
pub use pagination::Pagination;
pub use query::TransactionQuery;

//! Transaction view coordinator
//!
//! Owns the per-account filter state, debounces search edits, fetches
//! filtered transaction pages and assembles the cross-account overview.
//!
//! # Flow
//!
//! ```text
//! setter ──▶ FilterStore ──▶ params_changed ──▶ fetch_account ──▶ AccountSlot
//! set_search ──▶ Debouncer (500 ms) ──▶ applied search ──▶ params_changed
//! show_overview ──▶ JoinSet (one task per account) ──▶ SummaryGroup
//! ```
//!
//! State lives behind a mutex that is never held across an await. Every fetch
//! is tagged with a sequence number; a response whose number is no longer the
//! latest issued for its account is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::aggregator::{AggregatorBackend, AggregatorClient};
use crate::config::ViewConfig;
use crate::debounce::Debouncer;
use crate::error::{Error, Result};
use crate::filters::{DateRange, FilterState, FilterStore, ALL};
use crate::models::{
    Account, Category, Transaction, TransactionPage, TransactionType, UNKNOWN_ACCOUNT,
};
use crate::pagination::Pagination;
use crate::query::TransactionQuery;

/// View-level message shown when any overview group failed
pub const FETCH_ERROR: &str = "Failed to load transactions";

/// View-level message when the account list can't be loaded
pub const ACCOUNTS_ERROR: &str = "Failed to load accounts";

/// Which view the coordinator is driving
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "mode", content = "accountId", rename_all = "camelCase")]
pub enum ViewMode {
    /// Recent activity across every account
    #[default]
    Overview,
    /// Filtered table for one account
    Account(String),
}

/// Fetched data for one account's table
#[derive(Debug, Clone, Default)]
struct AccountSlot {
    page: TransactionPage,
    loading: bool,
    error: Option<String>,
    fetched: bool,
    latest_seq: u64,
}

/// One account's block in the overview
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryGroup {
    pub account_id: String,
    pub account_name: String,
    /// Newest first
    pub transactions: Vec<Transaction>,
    pub loading: bool,
    pub error: Option<String>,
    #[serde(skip)]
    latest_seq: u64,
}

/// Snapshot of one account's table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub account_id: String,
    pub account_name: String,
    pub filters: FilterState,
    /// Search text the current data was fetched with
    pub applied_search: String,
    pub transactions: Vec<Transaction>,
    pub pagination: Pagination,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct ViewState {
    accounts: Vec<Account>,
    accounts_loaded: bool,
    accounts_error: Option<String>,
    filters: FilterStore,
    applied_search: HashMap<String, String>,
    slots: HashMap<String, AccountSlot>,
    summary: HashMap<String, SummaryGroup>,
    mode: ViewMode,
    categories: Vec<Category>,
    categories_loaded: bool,
    selected: Option<Transaction>,
    next_seq: u64,
}

impl ViewState {
    fn issue_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn account_name(&self, account_id: &str) -> String {
        self.accounts
            .iter()
            .find(|a| a.id == account_id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| UNKNOWN_ACCOUNT.to_string())
    }

    fn ensure_known(&self, account_id: &str) -> Result<()> {
        if self.filters.get(account_id).is_some() {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Account {}", account_id)))
        }
    }
}

type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Per-account transaction view coordinator
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TransactionCoordinator {
    aggregator: AggregatorClient,
    state: Arc<Mutex<ViewState>>,
    debouncer: Debouncer,
    config: ViewConfig,
    clock: Clock,
}

impl TransactionCoordinator {
    pub fn new(aggregator: AggregatorClient, config: ViewConfig) -> Self {
        let state = ViewState {
            filters: FilterStore::with_default_page_size(config.default_page_size),
            ..ViewState::default()
        };
        Self {
            aggregator,
            state: Arc::new(Mutex::new(state)),
            debouncer: Debouncer::new(config.debounce),
            config,
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Replace the clock used to resolve relative date ranges
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    // ----- accounts -----------------------------------------------------

    /// Install the account list
    ///
    /// New accounts get default filters; accounts seen before keep theirs.
    pub fn set_accounts(&self, accounts: Vec<Account>) {
        let mut state = self.lock();
        state
            .filters
            .ensure_accounts(accounts.iter().map(|a| a.id.as_str()));
        for account in &accounts {
            state
                .applied_search
                .entry(account.id.clone())
                .or_default();
        }
        state
            .summary
            .retain(|id, _| accounts.iter().any(|a| &a.id == id));
        info!(count = accounts.len(), "Accounts loaded");
        state.accounts = accounts;
        state.accounts_loaded = true;
        state.accounts_error = None;
    }

    /// Load the accounts of the given items from the aggregator
    pub async fn load_accounts(&self, item_ids: &[String]) -> Result<Vec<Account>> {
        let mut accounts = Vec::new();
        for item_id in item_ids {
            match self.aggregator.list_accounts(item_id).await {
                Ok(found) => accounts.extend(found),
                Err(e) => {
                    warn!(item_id = %item_id, error = %e, "Failed to load accounts");
                    let mut state = self.lock();
                    state.accounts_error = Some(ACCOUNTS_ERROR.to_string());
                    return Err(e);
                }
            }
        }
        self.set_accounts(accounts.clone());
        Ok(accounts)
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.lock().accounts.clone()
    }

    /// Accounts have loaded and the list is empty
    pub fn has_no_accounts(&self) -> bool {
        let state = self.lock();
        state.accounts_loaded && state.accounts.is_empty()
    }

    pub fn accounts_error(&self) -> Option<String> {
        self.lock().accounts_error.clone()
    }

    pub fn account_name(&self, account_id: &str) -> String {
        self.lock().account_name(account_id)
    }

    // ----- categories ---------------------------------------------------

    /// Fetch the category catalogue once; failures leave it empty
    pub async fn load_categories(&self) -> Vec<Category> {
        {
            let state = self.lock();
            if state.categories_loaded {
                return state.categories.clone();
            }
        }

        let categories = match self.aggregator.list_categories().await {
            Ok(categories) => categories,
            Err(e) => {
                warn!(error = %e, "Failed to load categories, continuing without");
                Vec::new()
            }
        };

        let mut state = self.lock();
        state.categories = categories.clone();
        state.categories_loaded = true;
        categories
    }

    pub fn categories(&self) -> Vec<Category> {
        self.lock().categories.clone()
    }

    /// Category selector options as (value, label), "all" first
    pub fn category_options(&self) -> Vec<(String, String)> {
        let state = self.lock();
        std::iter::once((ALL.to_string(), "All categories".to_string()))
            .chain(
                state
                    .categories
                    .iter()
                    .map(|c| (c.id.clone(), c.display_name().to_string())),
            )
            .collect()
    }

    // ----- mode ---------------------------------------------------------

    pub fn mode(&self) -> ViewMode {
        self.lock().mode.clone()
    }

    /// Switch to the overview and refresh every account's recent activity
    pub async fn show_overview(&self) {
        self.lock().mode = ViewMode::Overview;
        self.refresh_summary().await;
    }

    /// Switch to one account's table and fetch it
    pub async fn show_account(&self, account_id: &str) -> Result<()> {
        {
            let mut state = self.lock();
            state.ensure_known(account_id)?;
            state.mode = ViewMode::Account(account_id.to_string());
        }
        self.fetch_account(account_id).await;
        Ok(())
    }

    /// Re-run the fetch for whatever is on screen
    pub async fn reload(&self) {
        match self.mode() {
            ViewMode::Overview => self.refresh_summary().await,
            ViewMode::Account(id) => self.fetch_account(&id).await,
        }
    }

    // ----- filters ------------------------------------------------------

    pub fn filters(&self, account_id: &str) -> Option<FilterState> {
        self.lock().filters.get(account_id).cloned()
    }

    /// Search text the account's data was last fetched with
    pub fn applied_search(&self, account_id: &str) -> Option<String> {
        self.lock().applied_search.get(account_id).cloned()
    }

    /// Record a search edit; the fetch follows once typing pauses
    pub fn set_search(&self, account_id: &str, search: &str) -> Result<()> {
        {
            let mut state = self.lock();
            state.ensure_known(account_id)?;
            state.filters.set_search(account_id, search);
        }

        let this = self.clone();
        let id = account_id.to_string();
        self.debouncer.schedule(account_id, async move {
            this.apply_search(&id).await;
        });
        Ok(())
    }

    /// Promote the typed search to the applied search and refetch
    async fn apply_search(&self, account_id: &str) {
        {
            let mut state = self.lock();
            let typed = state.filters.get_or_default(account_id).search;
            debug!(account_id = %account_id, search = %typed, "Applying debounced search");
            state.applied_search.insert(account_id.to_string(), typed);
        }
        self.params_changed(account_id).await;
    }

    /// Apply the typed search now instead of waiting for the pause
    pub async fn submit_search(&self, account_id: &str) -> Result<()> {
        self.lock().ensure_known(account_id)?;
        self.debouncer.cancel(account_id);
        self.apply_search(account_id).await;
        Ok(())
    }

    pub async fn set_category(&self, account_id: &str, category: Option<String>) -> Result<()> {
        {
            let mut state = self.lock();
            state.ensure_known(account_id)?;
            state.filters.set_category(account_id, category);
        }
        self.params_changed(account_id).await;
        Ok(())
    }

    pub async fn set_type(
        &self,
        account_id: &str,
        transaction_type: Option<TransactionType>,
    ) -> Result<()> {
        {
            let mut state = self.lock();
            state.ensure_known(account_id)?;
            state.filters.set_type(account_id, transaction_type);
        }
        self.params_changed(account_id).await;
        Ok(())
    }

    pub async fn set_date_range(&self, account_id: &str, date_range: DateRange) -> Result<()> {
        {
            let mut state = self.lock();
            state.ensure_known(account_id)?;
            state.filters.set_date_range(account_id, date_range);
        }
        self.params_changed(account_id).await;
        Ok(())
    }

    pub async fn set_page_size(&self, account_id: &str, page_size: u32) -> Result<()> {
        {
            let mut state = self.lock();
            state.ensure_known(account_id)?;
            state.filters.set_page_size(account_id, page_size)?;
        }
        self.params_changed(account_id).await;
        Ok(())
    }

    /// Go to a page, clamped to the known page count
    ///
    /// Returns the page actually stored. No fetch is issued when it equals
    /// the current page.
    pub async fn set_page(&self, account_id: &str, page: u32) -> Result<u32> {
        let target = {
            let mut state = self.lock();
            state.ensure_known(account_id)?;
            let filters = state.filters.get_or_default(account_id);
            let target = match state.slots.get(account_id) {
                Some(slot) if slot.fetched => {
                    Pagination::new(filters.page, slot.page.total_pages, slot.page.total, filters.page_size)
                        .clamp(page)
                }
                _ => page.max(1),
            };
            if target == filters.page {
                return Ok(target);
            }
            state.filters.set_page(account_id, target);
            target
        };
        self.params_changed(account_id).await;
        Ok(target)
    }

    pub async fn next_page(&self, account_id: &str) -> Result<u32> {
        let current = self
            .filters(account_id)
            .ok_or_else(|| Error::NotFound(format!("Account {}", account_id)))?
            .page;
        self.set_page(account_id, current.saturating_add(1)).await
    }

    pub async fn previous_page(&self, account_id: &str) -> Result<u32> {
        let current = self
            .filters(account_id)
            .ok_or_else(|| Error::NotFound(format!("Account {}", account_id)))?
            .page;
        self.set_page(account_id, current.saturating_sub(1)).await
    }

    /// Reset every filter of one account except page size
    ///
    /// A pending search edit is dropped and the empty search applies at once.
    pub async fn clear_filters(&self, account_id: &str) -> Result<()> {
        {
            let mut state = self.lock();
            state.ensure_known(account_id)?;
            self.debouncer.cancel(account_id);
            state.filters.clear(account_id);
            state
                .applied_search
                .insert(account_id.to_string(), String::new());
        }
        self.params_changed(account_id).await;
        Ok(())
    }

    /// Fetch if the changed account is the one on screen
    async fn params_changed(&self, account_id: &str) {
        let active = matches!(self.mode(), ViewMode::Account(ref id) if id == account_id);
        if active {
            self.fetch_account(account_id).await;
        } else {
            debug!(account_id = %account_id, "Filters changed for inactive account");
        }
    }

    // ----- single-account fetch -----------------------------------------

    async fn fetch_account(&self, account_id: &str) {
        let (seq, query, account_name) = {
            let mut state = self.lock();
            let filters = state.filters.get_or_default(account_id);
            let search = state
                .applied_search
                .get(account_id)
                .cloned()
                .unwrap_or_default();
            let query = TransactionQuery::from_filters(account_id, &filters, &search, (self.clock)());
            let account_name = state.account_name(account_id);
            let seq = state.issue_seq();
            let slot = state.slots.entry(account_id.to_string()).or_default();
            slot.latest_seq = seq;
            slot.loading = true;
            (seq, query, account_name)
        };

        debug!(
            account_id = %account_id,
            seq,
            page = query.page,
            page_size = query.page_size,
            "Fetching account transactions"
        );
        let result = self.aggregator.list_transactions(&query).await;

        let mut state = self.lock();
        let slot = state.slots.entry(account_id.to_string()).or_default();
        if slot.latest_seq != seq {
            debug!(account_id = %account_id, seq, latest = slot.latest_seq, "Discarding stale response");
            return;
        }

        slot.loading = false;
        slot.fetched = true;
        match result {
            Ok(mut page) => {
                annotate(&mut page.transactions, &account_name);
                slot.page = page;
                slot.error = None;
            }
            Err(e) => {
                warn!(account_id = %account_id, error = %e, "Failed to fetch transactions");
                slot.page = TransactionPage::default();
                slot.error = Some(format!("{}: {}", FETCH_ERROR, e));
            }
        }
    }

    /// Snapshot of one account's table
    pub fn account_view(&self, account_id: &str) -> Option<AccountView> {
        let state = self.lock();
        let filters = state.filters.get(account_id)?.clone();
        let slot = state.slots.get(account_id).cloned().unwrap_or_default();
        Some(AccountView {
            account_id: account_id.to_string(),
            account_name: state.account_name(account_id),
            applied_search: state
                .applied_search
                .get(account_id)
                .cloned()
                .unwrap_or_default(),
            pagination: Pagination::from_page(&slot.page, filters.page_size),
            filters,
            transactions: slot.page.transactions,
            loading: slot.loading,
            error: slot.error,
        })
    }

    // ----- overview -----------------------------------------------------

    /// Fetch the most recent page of every account concurrently
    ///
    /// Each account's group is written as soon as its fetch completes.
    pub async fn refresh_summary(&self) {
        let jobs: Vec<(String, String, u64)> = {
            let mut state = self.lock();
            let accounts: Vec<(String, String)> = state
                .accounts
                .iter()
                .map(|a| (a.id.clone(), a.name.clone()))
                .collect();
            accounts
                .into_iter()
                .map(|(id, name)| {
                    let seq = state.issue_seq();
                    let group = state.summary.entry(id.clone()).or_default();
                    group.account_id = id.clone();
                    group.account_name = name.clone();
                    group.loading = true;
                    group.latest_seq = seq;
                    (id, name, seq)
                })
                .collect()
        };

        info!(accounts = jobs.len(), "Refreshing overview");
        let page_size = self.config.summary_page_size;
        let mut tasks = JoinSet::new();
        for (account_id, account_name, seq) in jobs {
            let this = self.clone();
            tasks.spawn(async move {
                let query = TransactionQuery::new(account_id.clone(), page_size);
                let result = this.aggregator.list_transactions(&query).await;
                this.store_summary(&account_id, &account_name, seq, result);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Overview fetch task failed");
            }
        }
    }

    fn store_summary(
        &self,
        account_id: &str,
        account_name: &str,
        seq: u64,
        result: Result<TransactionPage>,
    ) {
        let mut state = self.lock();
        let group = state.summary.entry(account_id.to_string()).or_default();
        if group.latest_seq != seq {
            debug!(account_id = %account_id, seq, "Discarding stale overview response");
            return;
        }

        group.loading = false;
        match result {
            Ok(page) => {
                let mut transactions = page.transactions;
                annotate(&mut transactions, account_name);
                transactions.sort_by(|a, b| b.date.cmp(&a.date));
                group.transactions = transactions;
                group.error = None;
            }
            Err(e) => {
                warn!(account_id = %account_id, error = %e, "Failed to fetch recent transactions");
                group.transactions.clear();
                group.error = Some(FETCH_ERROR.to_string());
            }
        }
    }

    /// Overview groups in account order
    pub fn summary_groups(&self) -> Vec<SummaryGroup> {
        let state = self.lock();
        state
            .accounts
            .iter()
            .filter_map(|a| state.summary.get(&a.id).cloned())
            .collect()
    }

    pub fn summary_group(&self, account_id: &str) -> Option<SummaryGroup> {
        self.lock().summary.get(account_id).cloned()
    }

    /// View-level error, only raised in the overview
    pub fn summary_error(&self) -> Option<&'static str> {
        let state = self.lock();
        let failed = state
            .accounts
            .iter()
            .filter_map(|a| state.summary.get(&a.id))
            .any(|g| g.error.is_some());
        (state.mode == ViewMode::Overview && failed).then_some(FETCH_ERROR)
    }

    // ----- detail selection ---------------------------------------------

    pub fn select_transaction(&self, transaction: Transaction) {
        debug!(transaction_id = %transaction.id, "Transaction selected");
        self.lock().selected = Some(transaction);
    }

    /// Select by id among the loaded transactions
    pub fn select_transaction_by_id(&self, transaction_id: &str) -> Result<Transaction> {
        let found = {
            let state = self.lock();
            let mut loaded = state
                .slots
                .values()
                .flat_map(|s| s.page.transactions.iter())
                .chain(state.summary.values().flat_map(|g| g.transactions.iter()));
            loaded.find(|t| t.id == transaction_id).cloned()
        };
        let transaction =
            found.ok_or_else(|| Error::NotFound(format!("Transaction {}", transaction_id)))?;
        self.select_transaction(transaction.clone());
        Ok(transaction)
    }

    pub fn close_detail(&self) {
        self.lock().selected = None;
    }

    pub fn selected(&self) -> Option<Transaction> {
        self.lock().selected.clone()
    }

    pub fn is_detail_open(&self) -> bool {
        self.lock().selected.is_some()
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("aggregator", &self.aggregator.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn annotate(transactions: &mut [Transaction], account_name: &str) {
    for tx in transactions {
        tx.account_name = Some(account_name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{MockBackend, MockCall};
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::time::Duration;

    fn account(id: &str, name: &str) -> Account {
        Account {
            id: id.into(),
            name: name.into(),
            balance: 0.0,
            currency: "BRL".into(),
            account_type: crate::models::AccountType::Bank,
            number: None,
            subtype: None,
            item_id: Some("item-1".into()),
        }
    }

    fn tx(id: &str, account_id: &str, day: u32, transaction_type: TransactionType) -> Transaction {
        Transaction {
            id: id.into(),
            description: format!("Purchase {}", id),
            description_raw: None,
            transaction_type,
            amount: if transaction_type == TransactionType::Credit { 10.0 } else { -10.0 },
            date: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            category: None,
            category_id: None,
            account_id: account_id.into(),
            account_name: None,
            currency_code: Some("BRL".into()),
            status: None,
            balance: None,
            operation_type: None,
            credit_card_metadata: None,
            payment_data: None,
            merchant: None,
        }
    }

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 28)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    /// Two accounts: acc1 with 250 transactions, acc2 with 30
    fn setup() -> (TransactionCoordinator, MockBackend) {
        let mock = MockBackend::new();
        mock.add_account(account("acc1", "Checking"))
            .add_account(account("acc2", "Card"));
        mock.add_transactions((0..250).map(|i| {
            let kind = if i % 2 == 0 { TransactionType::Debit } else { TransactionType::Credit };
            tx(&format!("a{:03}", i), "acc1", 1 + (i % 27) as u32, kind)
        }));
        mock.add_transactions(
            (0..30).map(|i| tx(&format!("b{:03}", i), "acc2", 1 + (i % 27) as u32, TransactionType::Debit)),
        );

        let coordinator =
            TransactionCoordinator::new(AggregatorClient::mock(mock.clone()), ViewConfig::default())
                .with_clock(fixed_now);
        coordinator.set_accounts(vec![account("acc1", "Checking"), account("acc2", "Card")]);
        (coordinator, mock)
    }

    #[tokio::test]
    async fn test_accounts_get_default_filters() {
        let (coordinator, _) = setup();
        assert_eq!(coordinator.filters("acc1"), Some(FilterState::default()));
        assert_eq!(coordinator.filters("acc2"), Some(FilterState::default()));
        assert!(!coordinator.has_no_accounts());
    }

    #[tokio::test]
    async fn test_reloading_accounts_keeps_existing_state() {
        let (coordinator, _) = setup();
        coordinator
            .set_date_range("acc1", DateRange::Week)
            .await
            .unwrap();
        coordinator.set_accounts(vec![
            account("acc1", "Checking"),
            account("acc2", "Card"),
            account("acc3", "Savings"),
        ]);
        assert_eq!(coordinator.filters("acc1").unwrap().date_range, DateRange::Week);
        assert_eq!(coordinator.filters("acc3"), Some(FilterState::default()));
    }

    #[tokio::test]
    async fn test_empty_account_list() {
        let coordinator = TransactionCoordinator::new(
            AggregatorClient::mock(MockBackend::new()),
            ViewConfig::default(),
        );
        assert!(!coordinator.has_no_accounts());
        coordinator.set_accounts(Vec::new());
        assert!(coordinator.has_no_accounts());
    }

    #[tokio::test]
    async fn test_unknown_account_rejected() {
        let (coordinator, _) = setup();
        assert!(matches!(
            coordinator.show_account("nope").await,
            Err(Error::NotFound(_))
        ));
        assert!(coordinator.set_search("nope", "x").is_err());
    }

    #[tokio::test]
    async fn test_filter_on_one_account_leaves_other_alone() {
        let (coordinator, mock) = setup();
        coordinator.show_account("acc1").await.unwrap();
        coordinator.set_page("acc2", 2).await.unwrap();
        let before = coordinator.filters("acc2").unwrap();
        mock.clear_calls();

        coordinator.set_category("acc1", Some("food".into())).await.unwrap();
        coordinator
            .set_type("acc1", Some(TransactionType::Credit))
            .await
            .unwrap();

        assert_eq!(coordinator.filters("acc2").unwrap(), before);
        // Only the active account was fetched
        assert!(mock
            .transaction_queries()
            .iter()
            .all(|q| q.account_id == "acc1"));
    }

    #[tokio::test]
    async fn test_single_account_fetch_annotates_and_paginates() {
        let (coordinator, _) = setup();
        coordinator.show_account("acc1").await.unwrap();

        let view = coordinator.account_view("acc1").unwrap();
        assert_eq!(view.transactions.len(), 100);
        assert!(view
            .transactions
            .iter()
            .all(|t| t.account_name.as_deref() == Some("Checking")));
        assert_eq!(view.pagination.total, 250);
        assert_eq!(view.pagination.total_pages, 3);
        assert!(!view.pagination.has_previous());
        assert!(view.pagination.has_next());
        assert!(!view.loading);
        assert!(view.error.is_none());
    }

    #[tokio::test]
    async fn test_page_beyond_total_is_clamped_without_fetch() {
        let (coordinator, mock) = setup();
        coordinator.show_account("acc1").await.unwrap();

        assert_eq!(coordinator.set_page("acc1", 3).await.unwrap(), 3);
        let view = coordinator.account_view("acc1").unwrap();
        assert!(!view.pagination.has_next());
        assert!(view.pagination.has_previous());
        assert_eq!(view.transactions.len(), 50);

        mock.clear_calls();
        assert_eq!(coordinator.set_page("acc1", 4).await.unwrap(), 3);
        assert_eq!(coordinator.next_page("acc1").await.unwrap(), 3);
        assert!(mock.transaction_queries().is_empty());

        assert_eq!(coordinator.previous_page("acc1").await.unwrap(), 2);
        assert_eq!(mock.transaction_queries().len(), 1);
    }

    #[tokio::test]
    async fn test_non_pagination_change_resets_page() {
        let (coordinator, _) = setup();
        coordinator.show_account("acc1").await.unwrap();
        coordinator.set_page("acc1", 2).await.unwrap();

        coordinator
            .set_type("acc1", Some(TransactionType::Debit))
            .await
            .unwrap();
        let view = coordinator.account_view("acc1").unwrap();
        assert_eq!(view.filters.page, 1);
        assert_eq!(view.pagination.total, 125);
        assert!(view
            .transactions
            .iter()
            .all(|t| t.transaction_type == TransactionType::Debit));
    }

    #[tokio::test]
    async fn test_date_range_sent_as_dates() {
        let (coordinator, mock) = setup();
        coordinator.show_account("acc1").await.unwrap();
        coordinator
            .set_date_range("acc1", DateRange::Week)
            .await
            .unwrap();

        let last = mock.transaction_queries().pop().unwrap();
        assert_eq!(last.from, NaiveDate::from_ymd_opt(2024, 3, 21));
        assert_eq!(last.to, NaiveDate::from_ymd_opt(2024, 3, 28));

        coordinator.set_date_range("acc1", DateRange::All).await.unwrap();
        let last = mock.transaction_queries().pop().unwrap();
        assert!(last.from.is_none() && last.to.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_debounced_to_single_fetch() {
        let (coordinator, mock) = setup();
        coordinator.show_account("acc1").await.unwrap();
        mock.clear_calls();

        coordinator.set_search("acc1", "c").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        coordinator.set_search("acc1", "co").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        coordinator.set_search("acc1", "cof").unwrap();

        // Typed text is stored immediately, applied search lags
        assert_eq!(coordinator.filters("acc1").unwrap().search, "cof");
        assert_eq!(coordinator.applied_search("acc1").unwrap(), "");
        assert!(mock.transaction_queries().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;

        let queries = mock.transaction_queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].search.as_deref(), Some("cof"));
        assert_eq!(coordinator.applied_search("acc1").unwrap(), "cof");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending_search() {
        let (coordinator, mock) = setup();
        coordinator.show_account("acc1").await.unwrap();
        coordinator.set_page_size("acc1", 50).await.unwrap();
        coordinator
            .set_category("acc1", Some("food".into()))
            .await
            .unwrap();
        coordinator.set_search("acc1", "pending").unwrap();
        mock.clear_calls();

        coordinator.clear_filters("acc1").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let queries = mock.transaction_queries();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].search.is_none());
        assert!(queries[0].category_id.is_none());
        assert_eq!(queries[0].page_size, 50);

        let filters = coordinator.filters("acc1").unwrap();
        assert_eq!(filters, FilterState::with_page_size(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_search_skips_the_pause() {
        let (coordinator, mock) = setup();
        coordinator.show_account("acc1").await.unwrap();
        mock.clear_calls();

        coordinator.set_search("acc1", "a00").unwrap();
        coordinator.submit_search("acc1").await.unwrap();
        assert_eq!(coordinator.applied_search("acc1").unwrap(), "a00");
        assert_eq!(mock.transaction_queries().len(), 1);

        // The pending debounce was dropped
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.transaction_queries().len(), 1);
        assert!(coordinator.submit_search("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_error_isolated_to_failing_account() {
        let (coordinator, mock) = setup();
        coordinator.show_account("acc1").await.unwrap();
        let acc1_before = coordinator.account_view("acc1").unwrap();

        mock.fail_account("acc2");
        coordinator.show_account("acc2").await.unwrap();

        let acc2 = coordinator.account_view("acc2").unwrap();
        assert!(acc2.error.unwrap().starts_with(FETCH_ERROR));
        assert!(acc2.transactions.is_empty());

        let acc1_after = coordinator.account_view("acc1").unwrap();
        assert_eq!(acc1_after.transactions, acc1_before.transactions);
        assert!(acc1_after.error.is_none());
        assert_eq!(acc1_after.filters, acc1_before.filters);

        // Manual reload recovers
        mock.recover_account("acc2");
        coordinator.reload().await;
        assert!(coordinator.account_view("acc2").unwrap().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_discarded() {
        let (coordinator, mock) = setup();
        coordinator.show_account("acc1").await.unwrap();

        mock.delay_next("acc1", Duration::from_millis(300));
        let slow = coordinator.clone();
        let handle = tokio::spawn(async move {
            slow.set_type("acc1", Some(TransactionType::Credit))
                .await
                .unwrap();
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        coordinator
            .set_type("acc1", Some(TransactionType::Debit))
            .await
            .unwrap();
        handle.await.unwrap();

        let view = coordinator.account_view("acc1").unwrap();
        assert!(view
            .transactions
            .iter()
            .all(|t| t.transaction_type == TransactionType::Debit));
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn test_overview_groups_are_independent() {
        let (coordinator, mock) = setup();
        mock.fail_account("acc2");
        coordinator.show_overview().await;

        let groups = coordinator.summary_groups();
        assert_eq!(groups.len(), 2);

        let acc1 = &groups[0];
        assert_eq!(acc1.account_id, "acc1");
        assert_eq!(acc1.transactions.len(), 20);
        assert!(acc1.transactions.windows(2).all(|w| w[0].date >= w[1].date));
        assert!(acc1.transactions.iter().all(|t| t.account_id == "acc1"));
        assert!(acc1.error.is_none());

        let acc2 = &groups[1];
        assert!(acc2.transactions.is_empty());
        assert_eq!(acc2.error.as_deref(), Some(FETCH_ERROR));

        assert_eq!(coordinator.summary_error(), Some(FETCH_ERROR));

        // Summary queries are unfiltered first pages of 20
        for query in mock.transaction_queries() {
            assert_eq!(query.page, 1);
            assert_eq!(query.page_size, 20);
            assert!(query.search.is_none());
        }
    }

    #[tokio::test]
    async fn test_summary_error_only_in_overview() {
        let (coordinator, mock) = setup();
        mock.fail_account("acc2");
        coordinator.show_overview().await;
        assert!(coordinator.summary_error().is_some());

        coordinator.show_account("acc1").await.unwrap();
        assert!(coordinator.summary_error().is_none());
    }

    #[tokio::test]
    async fn test_summary_error_forgets_removed_accounts() {
        let (coordinator, mock) = setup();
        mock.fail_account("acc2");
        coordinator.show_overview().await;
        assert_eq!(coordinator.summary_error(), Some(FETCH_ERROR));

        coordinator.set_accounts(vec![account("acc1", "Checking")]);
        coordinator.show_overview().await;

        assert!(coordinator.summary_error().is_none());
        let groups = coordinator.summary_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].account_id, "acc1");
    }

    #[tokio::test]
    async fn test_overview_sorts_unordered_page() {
        let mock = MockBackend::new();
        mock.unsorted();
        mock.add_transactions(
            [3, 17, 9, 25, 1]
                .into_iter()
                .map(|day| tx(&format!("d{:02}", day), "acc1", day, TransactionType::Debit)),
        );

        let page = mock
            .list_transactions(&TransactionQuery::new("acc1", 20))
            .await
            .unwrap();
        let returned: Vec<&str> = page.transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(returned, vec!["d03", "d17", "d09", "d25", "d01"]);

        let coordinator =
            TransactionCoordinator::new(AggregatorClient::mock(mock), ViewConfig::default())
                .with_clock(fixed_now);
        coordinator.set_accounts(vec![account("acc1", "Checking")]);
        coordinator.show_overview().await;

        let groups = coordinator.summary_groups();
        let ids: Vec<&str> = groups[0].transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["d25", "d17", "d09", "d03", "d01"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_overview_refresh_keeps_newest() {
        let (coordinator, mock) = setup();
        mock.delay_next("acc1", Duration::from_millis(300));

        let slow = coordinator.clone();
        let handle = tokio::spawn(async move { slow.refresh_summary().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The newer refresh fails, the older one will succeed late
        mock.fail_account("acc1");
        coordinator.refresh_summary().await;
        mock.recover_account("acc1");
        handle.await.unwrap();

        let queries = mock.transaction_queries();
        assert_eq!(queries.iter().filter(|q| q.account_id == "acc1").count(), 2);

        let groups = coordinator.summary_groups();
        let acc1 = &groups[0];
        assert_eq!(acc1.account_id, "acc1");
        assert_eq!(acc1.error.as_deref(), Some(FETCH_ERROR));
        assert!(acc1.transactions.is_empty());
        assert!(!acc1.loading);
    }

    #[tokio::test]
    async fn test_overview_ignores_account_filters() {
        let (coordinator, mock) = setup();
        coordinator
            .set_type("acc1", Some(TransactionType::Credit))
            .await
            .unwrap();
        mock.clear_calls();
        coordinator.show_overview().await;

        assert!(mock
            .transaction_queries()
            .iter()
            .all(|q| q.transaction_type.is_none()));
    }

    #[tokio::test]
    async fn test_categories_failure_is_silent() {
        let (coordinator, mock) = setup();
        mock.fail_categories();
        assert!(coordinator.load_categories().await.is_empty());
        assert_eq!(
            coordinator.category_options(),
            vec![("all".to_string(), "All categories".to_string())]
        );

        // Loaded once
        coordinator.load_categories().await;
        let category_calls = mock
            .calls()
            .into_iter()
            .filter(|c| *c == MockCall::ListCategories)
            .count();
        assert_eq!(category_calls, 1);
    }

    #[tokio::test]
    async fn test_load_accounts_from_items() {
        let mock = MockBackend::with_sample_data();
        let coordinator =
            TransactionCoordinator::new(AggregatorClient::mock(mock), ViewConfig::default());
        let accounts = coordinator
            .load_accounts(&["item-demo".to_string()])
            .await
            .unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(coordinator.account_name("acc-card"), "Cartão Platinum");
        assert_eq!(coordinator.account_name("missing"), UNKNOWN_ACCOUNT);
    }

    #[tokio::test]
    async fn test_detail_selection() {
        let (coordinator, _) = setup();
        coordinator.show_account("acc2").await.unwrap();
        assert!(!coordinator.is_detail_open());

        let selected = coordinator.select_transaction_by_id("b000").unwrap();
        assert_eq!(selected.account_name.as_deref(), Some("Card"));
        assert_eq!(coordinator.selected().unwrap().id, "b000");

        coordinator.close_detail();
        assert!(coordinator.selected().is_none());
        assert!(coordinator.select_transaction_by_id("zzz").is_err());
    }
}

//! Per-account filter and pagination state
//!
//! Each account owns an independent [`FilterState`]. The [`FilterStore`] maps
//! account ids to their state and replaces the whole value on every change, so
//! an update to one account can never leak into another.

use std::collections::HashMap;

use chrono::{Months, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::TransactionType;

/// Default number of transactions per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Page sizes offered by the pagination controls
pub const PAGE_SIZE_OPTIONS: &[u32] = &[50, 100, 200, 300, 500];

/// Selector value meaning "no filter" for category and type
pub const ALL: &str = "all";

/// Relative date window applied to a transaction query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl DateRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Resolve to an absolute `[from, to]` window ending at `now`
    ///
    /// - `today`: start of the current day
    /// - `week`: seven days back
    /// - `month`: one calendar month back (clamped to the end of shorter months)
    /// - `all`: no window
    pub fn bounds(&self, now: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let from = match self {
            Self::All => return None,
            Self::Today => now.date().and_time(NaiveTime::MIN),
            Self::Week => now - chrono::Duration::days(7),
            Self::Month => now.checked_sub_months(Months::new(1))?,
        };
        Some((from, now))
    }
}

impl std::str::FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(format!("Unknown date range: {}", s)),
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Filter, search and pagination state for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// Free-text search as typed (before debounce)
    pub search: String,
    /// Category id, `None` for "all"
    pub category: Option<String>,
    /// Direction filter, `None` for "all"
    pub transaction_type: Option<TransactionType>,
    pub date_range: DateRange,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: None,
            transaction_type: None,
            date_range: DateRange::All,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FilterState {
    /// Create a state with a non-default page size
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Whether any non-pagination filter is active
    pub fn has_filters(&self) -> bool {
        !self.search.trim().is_empty()
            || self.category.is_some()
            || self.transaction_type.is_some()
            || self.date_range != DateRange::All
    }

    /// Category selector value ("all" when unfiltered)
    pub fn category_selector(&self) -> &str {
        self.category.as_deref().unwrap_or(ALL)
    }

    /// Type selector value ("all" when unfiltered)
    pub fn type_selector(&self) -> &str {
        self.transaction_type.map(|t| t.as_str()).unwrap_or(ALL)
    }
}

/// Parse a category selector; "all" (or empty) clears the filter
pub fn parse_category_selector(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case(ALL) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a type selector; "all" (or empty) clears the filter
pub fn parse_type_selector(value: &str) -> Result<Option<TransactionType>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case(ALL) {
        return Ok(None);
    }
    value.parse().map(Some).map_err(Error::InvalidData)
}

/// Validate a page size against the offered options
pub fn validate_page_size(page_size: u32) -> Result<u32> {
    if PAGE_SIZE_OPTIONS.contains(&page_size) {
        Ok(page_size)
    } else {
        Err(Error::InvalidData(format!(
            "Page size {} not supported (expected one of {:?})",
            page_size, PAGE_SIZE_OPTIONS
        )))
    }
}

/// Keyed store of per-account filter state
#[derive(Debug, Clone, Default)]
pub struct FilterStore {
    states: HashMap<String, FilterState>,
    default_page_size: u32,
}

impl FilterStore {
    pub fn new() -> Self {
        Self::with_default_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store whose new entries start with `page_size`
    pub fn with_default_page_size(page_size: u32) -> Self {
        Self {
            states: HashMap::new(),
            default_page_size: page_size,
        }
    }

    fn fresh(&self) -> FilterState {
        FilterState::with_page_size(self.default_page_size.max(1))
    }

    /// Create default state for accounts seen for the first time.
    /// Accounts already tracked keep their state.
    pub fn ensure_accounts<'a>(&mut self, account_ids: impl IntoIterator<Item = &'a str>) {
        for id in account_ids {
            if !self.states.contains_key(id) {
                let fresh = self.fresh();
                self.states.insert(id.to_string(), fresh);
            }
        }
    }

    pub fn get(&self, account_id: &str) -> Option<&FilterState> {
        self.states.get(account_id)
    }

    /// State for an account, or the defaults if it is not tracked yet
    pub fn get_or_default(&self, account_id: &str) -> FilterState {
        self.states
            .get(account_id)
            .cloned()
            .unwrap_or_else(|| self.fresh())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Replace one account's state with `f(old)`
    fn replace(
        &mut self,
        account_id: &str,
        f: impl FnOnce(FilterState) -> FilterState,
    ) -> &FilterState {
        let current = self.get_or_default(account_id);
        let next = f(current);
        self.states.insert(account_id.to_string(), next);
        &self.states[account_id]
    }

    pub fn set_search(&mut self, account_id: &str, search: &str) -> &FilterState {
        self.replace(account_id, |s| FilterState {
            search: search.to_string(),
            page: 1,
            ..s
        })
    }

    pub fn set_category(&mut self, account_id: &str, category: Option<String>) -> &FilterState {
        self.replace(account_id, |s| FilterState {
            category,
            page: 1,
            ..s
        })
    }

    pub fn set_type(
        &mut self,
        account_id: &str,
        transaction_type: Option<TransactionType>,
    ) -> &FilterState {
        self.replace(account_id, |s| FilterState {
            transaction_type,
            page: 1,
            ..s
        })
    }

    pub fn set_date_range(&mut self, account_id: &str, date_range: DateRange) -> &FilterState {
        self.replace(account_id, |s| FilterState {
            date_range,
            page: 1,
            ..s
        })
    }

    /// Set the page; values below 1 store 1
    pub fn set_page(&mut self, account_id: &str, page: u32) -> &FilterState {
        self.replace(account_id, |s| FilterState {
            page: page.max(1),
            ..s
        })
    }

    pub fn set_page_size(&mut self, account_id: &str, page_size: u32) -> Result<&FilterState> {
        let page_size = validate_page_size(page_size)?;
        Ok(self.replace(account_id, |s| FilterState {
            page_size,
            page: 1,
            ..s
        }))
    }

    /// Reset search, category, type, date range and page. Page size is kept.
    pub fn clear(&mut self, account_id: &str) -> &FilterState {
        self.replace(account_id, |s| FilterState {
            page_size: s.page_size,
            ..FilterState::default()
        })
    }
}

//! Transaction query construction
//!
//! Translates an account's [`FilterState`] into the parameters the aggregator's
//! transaction listing accepts. Empty search and "all" selectors are omitted
//! rather than sent as sentinel values.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::filters::FilterState;
use crate::models::TransactionType;

/// Date format the aggregator expects for `from`/`to`
pub const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parameters for one transaction listing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub account_id: String,
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: u32,
    pub page_size: u32,
}

impl TransactionQuery {
    /// Unfiltered query for the first page of an account
    pub fn new(account_id: impl Into<String>, page_size: u32) -> Self {
        Self {
            account_id: account_id.into(),
            search: None,
            category_id: None,
            transaction_type: None,
            from: None,
            to: None,
            page: 1,
            page_size,
        }
    }

    /// Build the query for an account's current filters
    ///
    /// `search` is the debounced search text, which may lag behind
    /// `filters.search` while the user is typing. `now` anchors relative
    /// date ranges.
    pub fn from_filters(
        account_id: &str,
        filters: &FilterState,
        search: &str,
        now: NaiveDateTime,
    ) -> Self {
        let search = search.trim();
        let (from, to) = match filters.date_range.bounds(now) {
            Some((from, to)) => (Some(from.date()), Some(to.date())),
            None => (None, None),
        };

        Self {
            account_id: account_id.to_string(),
            search: (!search.is_empty()).then(|| search.to_string()),
            category_id: filters.category.clone(),
            transaction_type: filters.transaction_type,
            from,
            to,
            page: filters.page.max(1),
            page_size: filters.page_size,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = (!search.trim().is_empty()).then_some(search);
        self
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    pub fn with_dates(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Query-string pairs in the aggregator's parameter names
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("accountId", self.account_id.clone())];

        if let Some(from) = self.from {
            pairs.push(("from", from.format(QUERY_DATE_FORMAT).to_string()));
        }
        if let Some(to) = self.to {
            pairs.push(("to", to.format(QUERY_DATE_FORMAT).to_string()));
        }

        pairs.push(("page", self.page.to_string()));
        pairs.push(("pageSize", self.page_size.to_string()));

        if let Some(transaction_type) = self.transaction_type {
            pairs.push(("type", transaction_type.as_str().to_string()));
        }
        if let Some(ref category_id) = self.category_id {
            pairs.push(("categoryId", category_id.clone()));
        }
        if let Some(ref search) = self.search {
            pairs.push(("search", search.clone()));
        }

        pairs
    }
}

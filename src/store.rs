use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{SortBy, SortOrder, Stats, Transaction, TransactionFilters};

fn default_page_size() -> u32 {
    20
}

/// The slice of store state that survives across sessions: filters, sort,
/// and page size. Data is never persisted and is always re-fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub filters: TransactionFilters,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            filters: TransactionFilters::default(),
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            page_size: default_page_size(),
        }
    }
}

impl Preferences {
    /// Load preferences from a JSON file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Write preferences to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(self).context("failed to serialize preferences")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Single source of truth for the feed pipeline: transaction list, stats,
/// filters/sort/pagination, and connection state.
///
/// Single-writer by construction — the owner mutates it between event-loop
/// turns, so readers always observe a consistent snapshot.
pub struct TransactionStore {
    transactions: Vec<Transaction>,
    stats: Option<Stats>,

    loading: bool,
    error: Option<String>,

    filters: TransactionFilters,
    sort_by: SortBy,
    sort_order: SortOrder,

    page: u32,
    page_size: u32,
    total: u64,
    has_more: bool,

    connected: bool,
    last_update: Option<DateTime<Utc>>,
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::with_preferences(Preferences::default())
    }

    pub fn with_preferences(prefs: Preferences) -> Self {
        Self {
            transactions: Vec::new(),
            stats: None,
            loading: false,
            error: None,
            filters: prefs.filters,
            sort_by: prefs.sort_by,
            sort_order: prefs.sort_order,
            page: 1,
            page_size: prefs.page_size,
            total: 0,
            has_more: false,
            connected: false,
            last_update: None,
        }
    }

    // ── accessors ──────────────────────────────────────────────────

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    pub fn filters(&self) -> &TransactionFilters {
        &self.filters
    }

    pub fn sort_by(&self) -> SortBy {
        self.sort_by
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Snapshot of the persisted slice of state.
    pub fn preferences(&self) -> Preferences {
        Preferences {
            filters: self.filters.clone(),
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            page_size: self.page_size,
        }
    }

    // ── data ───────────────────────────────────────────────────────

    /// Replace the whole list (fresh fetch or page change).
    pub fn set_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
        self.touch();
    }

    /// Prepend a pushed transaction. Inserts are idempotent: a duplicate
    /// identifier leaves the list untouched and returns false.
    pub fn add_transaction(&mut self, transaction: Transaction) -> bool {
        if self.transactions.iter().any(|tx| tx.id == transaction.id) {
            return false;
        }
        self.transactions.insert(0, transaction);
        self.total += 1;
        self.touch();
        true
    }

    /// Replace the entry with the matching identifier in place. Updates for
    /// identifiers not currently loaded are dropped and return false.
    pub fn update_transaction(&mut self, transaction: Transaction) -> bool {
        match self
            .transactions
            .iter_mut()
            .find(|tx| tx.id == transaction.id)
        {
            Some(slot) => {
                *slot = transaction;
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Stats are replaced wholesale; there is no partial merge.
    pub fn set_stats(&mut self, stats: Stats) {
        self.stats = Some(stats);
    }

    // ── UI state ───────────────────────────────────────────────────

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Record a user-visible error and stop any loading indicator.
    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
        self.loading = false;
    }

    // ── filters / sorting / pagination ─────────────────────────────

    /// Merge a partial filter change and reset to page 1.
    pub fn set_filters(&mut self, partial: TransactionFilters) {
        self.filters.merge(partial);
        self.page = 1;
    }

    /// Drop all filters and reset to page 1.
    pub fn clear_filters(&mut self) {
        self.filters = TransactionFilters::default();
        self.page = 1;
    }

    /// Change sorting and reset to page 1.
    pub fn set_sorting(&mut self, sort_by: SortBy, sort_order: SortOrder) {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Change the page size and reset to page 1.
    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    pub fn set_pagination_meta(&mut self, total: u64, has_more: bool) {
        self.total = total;
        self.has_more = has_more;
    }

    /// Advance one page when the server reported more; returns whether the
    /// page changed.
    pub fn next_page(&mut self) -> bool {
        if self.has_more {
            self.page += 1;
            true
        } else {
            false
        }
    }

    /// Go back one page, stopping at page 1.
    pub fn prev_page(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    // ── connection ─────────────────────────────────────────────────

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Reset everything to the initial state (preferences included).
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn touch(&mut self) {
        self.last_update = Some(Utc::now());
    }
}

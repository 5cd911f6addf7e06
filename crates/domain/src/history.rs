//! Classification History Domain Model
//!
//! Records are stored and searched by the remote service; this module only
//! describes the shapes exchanged with it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    /// Server-assigned identifier.
    pub id: i64,
    /// Description the user classified.
    pub product_description: String,
    /// Resulting tariff code.
    pub hts_code: String,
    /// Country of origin sent with the request.
    #[serde(default)]
    pub country_of_origin: String,
    /// When the classification was made.
    pub created_at: DateTime<Utc>,
    /// Whether the user bookmarked it.
    #[serde(default)]
    pub is_bookmarked: bool,
    /// Free-form user notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Any further fields the service returns.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Partial update for a stored classification.
///
/// Fields left as `None` are omitted from the request body and stay unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClassificationUpdate {
    /// New bookmark state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_bookmarked: Option<bool>,
    /// New notes text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ClassificationUpdate {
    /// An update that only sets the bookmark flag.
    #[must_use]
    pub const fn bookmark(is_bookmarked: bool) -> Self {
        Self {
            is_bookmarked: Some(is_bookmarked),
            notes: None,
        }
    }

    /// An update that only replaces the notes.
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            is_bookmarked: None,
            notes: Some(notes.into()),
        }
    }

    /// Returns true if the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.is_bookmarked.is_none() && self.notes.is_none()
    }
}

/// Default page size for history listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Parameters for listing history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    /// One-based page number.
    pub page: u32,
    /// Items per page.
    pub limit: u32,
    /// Search text; empty means no filter.
    pub search: String,
    /// Only return bookmarked items.
    pub bookmarked_only: bool,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            search: String::new(),
            bookmarked_only: false,
        }
    }
}

impl HistoryQuery {
    /// Creates a query for the given page.
    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            ..Self::default()
        }
    }

    /// Sets the search text.
    #[must_use]
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Restricts results to bookmarked items.
    #[must_use]
    pub const fn bookmarked_only(mut self, bookmarked_only: bool) -> Self {
        self.bookmarked_only = bookmarked_only;
        self
    }

    /// Query-string pairs in the order the service expects.
    ///
    /// `page` and `limit` are always present; `search` only when non-empty;
    /// `bookmarked_only` only when set.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if !self.search.is_empty() {
            pairs.push(("search", self.search.clone()));
        }
        if self.bookmarked_only {
            pairs.push(("bookmarked_only", "true".to_string()));
        }
        pairs
    }
}

/// Wire shape of a history listing; paging fields are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct PagedResponse<T> {
    /// Items on this page.
    #[serde(alias = "items", default = "Vec::new")]
    pub history: Vec<T>,
    /// Total number of matching items.
    #[serde(default)]
    pub total: Option<u64>,
    /// Page returned.
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size used.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl<T> PagedResponse<T> {
    /// Fills missing paging fields from the query that produced the page.
    pub fn into_paged(self, query: &HistoryQuery) -> PagedResult<T> {
        let total = self.total.unwrap_or(self.history.len() as u64);
        PagedResult {
            items: self.history,
            total,
            page: self.page.unwrap_or(query.page),
            limit: self.limit.unwrap_or(query.limit),
        }
    }
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total number of matching items.
    pub total: u64,
    /// One-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl<T> PagedResult<T> {
    /// Returns true if the page holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of pages for the reported total.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }

    /// Returns true if later pages exist.
    #[must_use]
    pub fn has_more(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

/// Per-user usage statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserStats {
    /// Number of classifications made.
    #[serde(default)]
    pub total_classifications: Option<u64>,
    /// Number of bookmarked classifications.
    #[serde(default)]
    pub bookmarked_count: Option<u64>,
    /// Any further statistics the service reports.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

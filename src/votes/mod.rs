//! Vote listing domain
//!
//! Query parameters, records and batches returned by the vote-listing
//! backend, plus the lazy cursor that turns batches into displayable pages.

/// HTTP client for the vote-listing backend.
pub mod client;
/// Lazy, forward-only page producer.
pub mod cursor;
/// Page rendering (listing, summary, placeholders).
pub mod render;

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use client::{HttpVotesClient, VotesApi};
pub use cursor::{BatchCursor, Pull, RenderMode};
pub use render::{Page, PageKind};

/// Errors produced while fetching or decoding vote batches
#[derive(Debug, Error)]
pub enum VotesError {
    /// Connectivity problem or request timeout
    #[error("Network error: {0}")]
    Network(String),
    /// Backend answered with a non-success status
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        message: String,
    },
    /// Response did not match the expected batch shape
    #[error("Decode error: {0}")]
    Decode(String),
    /// Query parameters rejected before any request was made
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl VotesError {
    /// Whether the failed operation may be retried with unchanged state.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Api { .. })
    }
}

/// Kind of Lemmy object whose votes are listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A post
    Post,
    /// A comment
    Comment,
}

impl Resource {
    /// Backend path serving votes for this resource.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Post => "/votes/post",
            Self::Comment => "/votes/comment",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

/// Vote direction filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VoteFilter {
    /// Both directions
    #[default]
    All,
    /// Upvotes only
    Upvotes,
    /// Downvotes only
    Downvotes,
}

impl VoteFilter {
    /// Wire value of the `votes_filter` query parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Upvotes => "Upvotes",
            Self::Downvotes => "Downvotes",
        }
    }
}

impl fmt::Display for VoteFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteFilter {
    type Err = VotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "up" | "upvotes" => Ok(Self::Upvotes),
            "down" | "downvotes" => Ok(Self::Downvotes),
            other => Err(VotesError::InvalidQuery(format!(
                "unknown votes filter '{other}' (expected All, Upvotes or Downvotes)"
            ))),
        }
    }
}

/// Query sent to the backend.
///
/// Everything except `offset` is fixed at construction. The offset only moves
/// forward, and only to a value the backend reported as its next offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    resource: Resource,
    target_url: String,
    page_size: u32,
    offset: u64,
    username: Option<String>,
    vote_filter: VoteFilter,
}

impl QueryParams {
    /// Create a query starting at offset zero.
    ///
    /// # Errors
    ///
    /// Returns `VotesError::InvalidQuery` if `page_size` is zero or the URL is blank.
    pub fn new(
        resource: Resource,
        target_url: impl Into<String>,
        page_size: u32,
    ) -> Result<Self, VotesError> {
        let target_url = target_url.into();
        if page_size == 0 {
            return Err(VotesError::InvalidQuery(
                "page size must be greater than zero".to_string(),
            ));
        }
        if target_url.trim().is_empty() {
            return Err(VotesError::InvalidQuery("target url is empty".to_string()));
        }
        Ok(Self {
            resource,
            target_url,
            page_size,
            offset: 0,
            username: None,
            vote_filter: VoteFilter::All,
        })
    }

    /// Restrict results to a single voter.
    #[must_use]
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|name| !name.trim().is_empty());
        self
    }

    /// Set the vote direction filter.
    #[must_use]
    pub const fn with_filter(mut self, vote_filter: VoteFilter) -> Self {
        self.vote_filter = vote_filter;
        self
    }

    /// Start from a non-zero offset.
    #[must_use]
    pub const fn starting_at(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub const fn resource(&self) -> Resource {
        self.resource
    }

    #[must_use]
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub const fn vote_filter(&self) -> VoteFilter {
        self.vote_filter
    }

    /// Query string pairs in the order the backend documents them.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("url", self.target_url.clone()),
            ("limit", self.page_size.to_string()),
            ("offset", self.offset.to_string()),
            ("votes_filter", self.vote_filter.as_str().to_string()),
        ];
        if let Some(username) = &self.username {
            pairs.push(("username", username.clone()));
        }
        pairs
    }

    /// Move to the offset reported by the backend.
    pub(crate) fn advance_offset(&mut self, next_offset: u64) {
        if next_offset <= self.offset {
            tracing::warn!(
                current = self.offset,
                next = next_offset,
                "Backend reported a non-increasing next offset"
            );
        }
        self.offset = next_offset;
    }
}

/// One vote
#[derive(Debug, Clone, PartialEq)]
pub struct VoteRecord {
    /// Voter display name
    pub author_name: String,
    /// +1 / -1 (or weighted score)
    pub score: i64,
    /// Voter actor URI
    pub author_ref: String,
    /// When the vote was cast, if the backend knows
    pub created_at: Option<DateTime<Utc>>,
}

/// Totals reported by the aggregate variant of the backend response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteAggregate {
    pub upvotes: u64,
    pub downvotes: u64,
    pub total_score: i64,
}

impl VoteAggregate {
    /// Share of upvotes among `total_count` votes, `0.0` when there are none.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn upvote_ratio(&self, total_count: u64) -> f64 {
        if total_count == 0 {
            return 0.0;
        }
        self.upvotes as f64 / total_count as f64
    }
}

/// One backend response
#[derive(Debug, Clone, PartialEq)]
pub struct VoteBatch {
    pub records: Vec<VoteRecord>,
    /// Display hint only, never used to bound iteration
    pub total_count: u64,
    /// `None` means there is nothing left to fetch
    pub next_offset: Option<u64>,
    pub aggregate: Option<VoteAggregate>,
}

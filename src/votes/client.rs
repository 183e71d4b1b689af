//! Vote-listing backend client
//!
//! One stateless `GET` per batch; no connection state is carried between fetches.

use super::{QueryParams, VoteAggregate, VoteBatch, VoteRecord, VotesError};
use chrono::{DateTime, Utc};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

/// Longest backend error body kept in `VotesError::Api`.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Source of vote batches
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VotesApi: Send + Sync {
    /// Fetch the batch addressed by `query` (resource, filters and current offset).
    async fn fetch_votes(&self, query: &QueryParams) -> Result<VoteBatch, VotesError>;
}

/// `reqwest`-backed client for the vote-listing backend
#[derive(Clone)]
pub struct HttpVotesClient {
    http_client: HttpClient,
    base_url: String,
}

impl HttpVotesClient {
    /// Create a client for `base_url` (e.g. `https://haters.example.com`).
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, query: &QueryParams) -> String {
        format!("{}{}", self.base_url, query.resource().path())
    }
}

#[async_trait::async_trait]
impl VotesApi for HttpVotesClient {
    async fn fetch_votes(&self, query: &QueryParams) -> Result<VoteBatch, VotesError> {
        let url = self.endpoint(query);
        debug!(
            url = %url,
            offset = query.offset(),
            limit = query.page_size(),
            filter = %query.vote_filter(),
            "Fetching vote batch"
        );

        let response = self
            .http_client
            .get(&url)
            .query(&query.to_query_pairs())
            .send()
            .await
            .map_err(|e| VotesError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VotesError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(VotesError::Api {
                status: status.as_u16(),
                message: clean_error_body(&body),
            });
        }

        decode_batch(&body)
    }
}

/// Decode a backend response body into a `VoteBatch`.
///
/// # Errors
///
/// Returns `VotesError::Decode` when a required field is missing (including
/// `next_offset`, which must be present even when null) or has the wrong type.
pub fn decode_batch(body: &str) -> Result<VoteBatch, VotesError> {
    let wire: WireBatch =
        serde_json::from_str(body).map_err(|e| VotesError::Decode(e.to_string()))?;
    Ok(wire.into())
}

fn clean_error_body(body: &str) -> String {
    let trimmed = body.trim_start();
    if trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html") {
        return "server returned HTML error page".to_string();
    }
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        format!(
            "{}... (truncated)",
            crate::utils::truncate_str(body, MAX_ERROR_BODY_CHARS)
        )
    } else {
        body.to_string()
    }
}

#[derive(Deserialize)]
struct WireVote {
    name: String,
    score: i64,
    actor_id: String,
    #[serde(default)]
    created_utc: Option<f64>,
}

#[derive(Deserialize)]
struct WireBatch {
    votes: Vec<WireVote>,
    total_count: u64,
    #[serde(deserialize_with = "required_nullable")]
    next_offset: Option<u64>,
    #[serde(default)]
    total_score: Option<i64>,
    #[serde(default)]
    upvotes: Option<u64>,
    #[serde(default)]
    downvotes: Option<u64>,
}

// A plain `Option` field would silently accept a missing key; only an explicit
// `null` may signal exhaustion.
fn required_nullable<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer)
}

#[allow(clippy::cast_possible_truncation)]
fn timestamp_from_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos)
}

impl From<WireVote> for VoteRecord {
    fn from(vote: WireVote) -> Self {
        Self {
            author_name: vote.name,
            score: vote.score,
            author_ref: vote.actor_id,
            created_at: vote.created_utc.and_then(timestamp_from_secs),
        }
    }
}

impl From<WireBatch> for VoteBatch {
    fn from(wire: WireBatch) -> Self {
        let aggregate = match (wire.upvotes, wire.downvotes, wire.total_score) {
            (Some(upvotes), Some(downvotes), Some(total_score)) => Some(VoteAggregate {
                upvotes,
                downvotes,
                total_score,
            }),
            _ => None,
        };
        Self {
            records: wire.votes.into_iter().map(VoteRecord::from).collect(),
            total_count: wire.total_count,
            next_offset: wire.next_offset,
            aggregate,
        }
    }
}

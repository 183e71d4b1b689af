//! Lazy batch cursor
//!
//! Pulls pages one at a time, fetching a new batch from the backend only when
//! the in-memory batch has been fully consumed. The offset is never computed
//! locally: it always comes from the backend's `next_offset`.

use super::render::{render_empty, render_empty_batch, render_listing, render_summary};
use super::{Page, QueryParams, VoteBatch, VotesApi, VotesError};
use std::sync::Arc;
use tracing::{debug, warn};

/// How batches are turned into pages (fixed for the cursor's lifetime)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Individual votes, `records_per_page` at a time
    PerRecord,
    /// One totals page per fetched batch
    AggregateSummary,
}

/// Result of a successful `pull`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull {
    Page(Page),
    /// No further page will ever be produced
    Exhausted,
}

/// Forward-only, non-restartable page producer
pub struct BatchCursor {
    api: Arc<dyn VotesApi>,
    query: QueryParams,
    mode: RenderMode,
    records_per_page: usize,
    batch: Option<VoteBatch>,
    /// Offset the current batch was fetched at
    batch_offset: u64,
    consumed: usize,
    has_more: bool,
    pages_emitted: u64,
    fetch_count: u64,
}

impl BatchCursor {
    /// Create a cursor; one page per batch unless `with_records_per_page` says otherwise.
    #[must_use]
    pub fn new(api: Arc<dyn VotesApi>, query: QueryParams, mode: RenderMode) -> Self {
        let records_per_page = query.page_size() as usize;
        Self {
            api,
            query,
            mode,
            records_per_page,
            batch: None,
            batch_offset: 0,
            consumed: 0,
            has_more: true,
            pages_emitted: 0,
            fetch_count: 0,
        }
    }

    /// Split each fetched batch into pages of at most `records_per_page` votes.
    #[must_use]
    pub fn with_records_per_page(mut self, records_per_page: usize) -> Self {
        self.records_per_page = records_per_page.max(1);
        self
    }

    #[must_use]
    pub const fn query(&self) -> &QueryParams {
        &self.query
    }

    #[must_use]
    pub const fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Number of backend requests issued so far (successful or not).
    #[must_use]
    pub const fn fetch_count(&self) -> u64 {
        self.fetch_count
    }

    /// True once no further page can be produced.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        !self.has_more && self.remaining() == 0
    }

    fn remaining(&self) -> usize {
        match (self.mode, &self.batch) {
            (RenderMode::PerRecord, Some(batch)) => batch.records.len().saturating_sub(self.consumed),
            _ => 0,
        }
    }

    fn exhaust(&mut self) {
        self.has_more = false;
        self.batch = None;
        self.consumed = 0;
    }

    /// Produce the next page.
    ///
    /// `&mut self` keeps calls strictly sequential: a second pull cannot start
    /// before the previous one resolves.
    ///
    /// # Errors
    ///
    /// Transient errors (`Network`, `Api`) leave the cursor untouched so the
    /// pull can be retried. `Decode` errors exhaust the cursor.
    pub async fn pull(&mut self) -> Result<Pull, VotesError> {
        if let Some(page) = self.take_from_remainder() {
            return Ok(Pull::Page(page));
        }
        if !self.has_more {
            return Ok(Pull::Exhausted);
        }

        self.fetch_count += 1;
        let batch = match self.api.fetch_votes(&self.query).await {
            Ok(batch) => batch,
            Err(e) if e.is_transient() => {
                warn!(offset = self.query.offset(), error = %e, "Vote fetch failed, cursor unchanged");
                return Err(e);
            }
            Err(e) => {
                warn!(offset = self.query.offset(), error = %e, "Undecodable vote batch, cursor exhausted");
                self.exhaust();
                return Err(e);
            }
        };

        if self.mode == RenderMode::AggregateSummary && batch.aggregate.is_none() {
            self.exhaust();
            return Err(VotesError::Decode(
                "summary response is missing total_score/upvotes/downvotes".to_string(),
            ));
        }

        debug!(
            offset = self.query.offset(),
            records = batch.records.len(),
            total = batch.total_count,
            next_offset = ?batch.next_offset,
            "Vote batch received"
        );

        self.batch_offset = self.query.offset();
        self.has_more = batch.next_offset.is_some();
        if let Some(next_offset) = batch.next_offset {
            self.query.advance_offset(next_offset);
        }
        let first_page = self.pages_emitted == 0;
        let records = batch.records.len();
        self.consumed = 0;
        self.batch = Some(batch);

        match self.mode {
            RenderMode::AggregateSummary => Ok(Pull::Page(self.summarise_batch())),
            RenderMode::PerRecord if records == 0 && first_page => {
                self.pages_emitted += 1;
                Ok(Pull::Page(render_empty(&self.query)))
            }
            RenderMode::PerRecord if records == 0 && self.has_more => {
                debug!(offset = self.batch_offset, "Empty batch with more votes ahead");
                self.pages_emitted += 1;
                let total_count = self.batch.as_ref().map_or(0, |b| b.total_count);
                Ok(Pull::Page(render_empty_batch(
                    &self.query,
                    self.batch_offset,
                    total_count,
                )))
            }
            RenderMode::PerRecord => Ok(self
                .take_from_remainder()
                .map_or(Pull::Exhausted, Pull::Page)),
        }
    }

    fn take_from_remainder(&mut self) -> Option<Page> {
        if self.mode != RenderMode::PerRecord || self.remaining() == 0 {
            return None;
        }
        let batch = self.batch.as_ref()?;
        let start = self.consumed;
        let end = (start + self.records_per_page).min(batch.records.len());
        let page = render_listing(
            &self.query,
            &batch.records[start..end],
            self.batch_offset + start as u64,
            batch.total_count,
        );
        self.consumed = end;
        self.pages_emitted += 1;
        Some(page)
    }

    fn summarise_batch(&mut self) -> Page {
        self.pages_emitted += 1;
        match &self.batch {
            Some(batch) => {
                let aggregate = batch.aggregate.unwrap_or(super::VoteAggregate {
                    upvotes: 0,
                    downvotes: 0,
                    total_score: 0,
                });
                render_summary(
                    &self.query,
                    &aggregate,
                    batch.total_count,
                    self.batch_offset,
                    batch.records.len(),
                )
            }
            None => render_empty(&self.query),
        }
    }
}

//! Testing helpers: scripted backend and recording transport.

use crate::nav::{NavTransport, PagePayload};
use crate::votes::{QueryParams, VoteBatch, VoteRecord, VotesApi, VotesError};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Build `n` distinct vote records starting at `first`.
#[must_use]
pub fn records(first: usize, n: usize) -> Vec<VoteRecord> {
    (first..first + n)
        .map(|i| VoteRecord {
            author_name: format!("voter{i}"),
            score: if i % 3 == 0 { -1 } else { 1 },
            author_ref: format!("https://lemmy.ml/u/voter{i}"),
            created_at: None,
        })
        .collect()
}

/// A batch of `n` records with the given next offset.
#[must_use]
pub fn batch(first: usize, n: usize, next_offset: Option<u64>) -> VoteBatch {
    VoteBatch {
        records: records(first, n),
        total_count: 100,
        next_offset,
        aggregate: None,
    }
}

/// Backend that replays a fixed script of responses and records requested offsets.
#[derive(Clone, Default)]
pub struct ScriptedVotesApi {
    script: Arc<Mutex<VecDeque<Result<VoteBatch, VotesError>>>>,
    offsets: Arc<Mutex<Vec<u64>>>,
}

impl ScriptedVotesApi {
    #[must_use]
    pub fn new(script: Vec<Result<VoteBatch, VotesError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            offsets: Arc::default(),
        }
    }

    /// Offsets of every request made so far.
    #[must_use]
    pub fn offsets(&self) -> Vec<u64> {
        self.offsets.lock().expect("offsets lock").clone()
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.offsets.lock().expect("offsets lock").len()
    }
}

#[async_trait::async_trait]
impl VotesApi for ScriptedVotesApi {
    async fn fetch_votes(&self, query: &QueryParams) -> Result<VoteBatch, VotesError> {
        self.offsets.lock().expect("offsets lock").push(query.offset());
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Err(VotesError::Network("script exhausted".to_string())))
    }
}

/// A transport write observed by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Create(PagePayload),
    Edit(u32, PagePayload),
}

impl Write {
    #[must_use]
    pub const fn payload(&self) -> &PagePayload {
        match self {
            Self::Create(payload) | Self::Edit(_, payload) => payload,
        }
    }
}

/// Transport that records every write instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    writes: Arc<Mutex<Vec<Write>>>,
    fail_edits: Arc<Mutex<bool>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().expect("writes lock").clone()
    }

    #[must_use]
    pub fn last_payload(&self) -> Option<PagePayload> {
        self.writes().last().map(|w| w.payload().clone())
    }

    pub fn set_fail_edits(&self, fail: bool) {
        *self.fail_edits.lock().expect("fail lock") = fail;
    }
}

#[async_trait::async_trait]
impl NavTransport for RecordingTransport {
    type Handle = u32;

    async fn create_response(&self, payload: &PagePayload) -> Result<u32> {
        self.writes
            .lock()
            .expect("writes lock")
            .push(Write::Create(payload.clone()));
        Ok(7)
    }

    async fn edit_response(&self, handle: &u32, payload: &PagePayload) -> Result<()> {
        if *self.fail_edits.lock().expect("fail lock") {
            anyhow::bail!("message to edit not found");
        }
        self.writes
            .lock()
            .expect("writes lock")
            .push(Write::Edit(*handle, payload.clone()));
        Ok(())
    }
}

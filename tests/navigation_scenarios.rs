use anyhow::Result;
use async_trait::async_trait;
use lemmy_votes_bot::nav::{
    NavAction, NavError, NavOutcome, NavTransport, NavigatorSession, OpenOptions, PagePayload,
    SessionId,
};
use lemmy_votes_bot::votes::{
    BatchCursor, PageKind, QueryParams, RenderMode, Resource, VoteAggregate, VoteBatch,
    VoteRecord, VotesApi, VotesError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Backend that serves fixed batches by offset and counts requests.
struct FixedBackend {
    batches: HashMap<u64, VoteBatch>,
    offsets: Mutex<Vec<u64>>,
}

impl FixedBackend {
    fn new(batches: Vec<(u64, VoteBatch)>) -> Arc<Self> {
        Arc::new(Self {
            batches: batches.into_iter().collect(),
            offsets: Mutex::new(Vec::new()),
        })
    }

    fn offsets(&self) -> Vec<u64> {
        self.offsets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl VotesApi for FixedBackend {
    async fn fetch_votes(&self, query: &QueryParams) -> Result<VoteBatch, VotesError> {
        self.offsets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(query.offset());
        self.batches
            .get(&query.offset())
            .cloned()
            .ok_or_else(|| VotesError::Api {
                status: 500,
                message: "no such batch".to_string(),
            })
    }
}

/// Transport that keeps every payload it was asked to show.
#[derive(Clone, Default)]
struct MemoryTransport {
    shown: Arc<Mutex<Vec<PagePayload>>>,
}

impl MemoryTransport {
    fn shown(&self) -> Vec<PagePayload> {
        self.shown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NavTransport for MemoryTransport {
    type Handle = usize;

    async fn create_response(&self, payload: &PagePayload) -> Result<usize> {
        let mut shown = self
            .shown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        shown.push(payload.clone());
        Ok(1)
    }

    async fn edit_response(&self, _handle: &usize, payload: &PagePayload) -> Result<()> {
        self.shown
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(payload.clone());
        Ok(())
    }
}

fn votes(first: usize, n: usize) -> Vec<VoteRecord> {
    (first..first + n)
        .map(|i| VoteRecord {
            author_name: format!("user{i}"),
            score: 1,
            author_ref: format!("https://lemmy.world/u/user{i}"),
            created_at: None,
        })
        .collect()
}

fn listing(first: usize, n: usize, next_offset: Option<u64>) -> VoteBatch {
    VoteBatch {
        records: votes(first, n),
        total_count: 40,
        next_offset,
        aggregate: None,
    }
}

async fn open(
    backend: Arc<FixedBackend>,
    mode: RenderMode,
) -> Result<(NavigatorSession<MemoryTransport>, MemoryTransport), NavError> {
    let query = QueryParams::new(Resource::Post, "https://lemmy.world/post/42", 10)?;
    let transport = MemoryTransport::default();
    let session = NavigatorSession::open(
        SessionId::new(),
        BatchCursor::new(backend, query, mode),
        transport.clone(),
        OpenOptions::default(),
    )
    .await?;
    Ok((session, transport))
}

#[tokio::test]
async fn browsing_forward_and_back_fetches_each_batch_once() -> Result<(), NavError> {
    let backend = FixedBackend::new(vec![
        (0, listing(0, 10, Some(10))),
        (10, listing(10, 10, Some(20))),
        (20, listing(20, 10, None)),
    ]);
    let (mut session, transport) = open(backend.clone(), RenderMode::PerRecord).await?;

    for action in [NavAction::Next, NavAction::Next, NavAction::Prev, NavAction::Prev] {
        assert_eq!(session.handle_action(action).await?, NavOutcome::Rendered);
    }
    assert_eq!(backend.offsets(), vec![0, 10, 20]);

    // Forward again is served from the cache
    session.handle_action(NavAction::Next).await?;
    session.handle_action(NavAction::Next).await?;
    assert_eq!(backend.offsets(), vec![0, 10, 20]);

    let shown = transport.shown();
    assert_eq!(shown[0].page, shown[4].page);
    assert_eq!(shown[2].page, shown[6].page);

    // Last page known: indicator shows the total, next is off
    let last = shown.last().map(|p| p.controls.clone());
    let last = last.unwrap_or_else(|| panic!("pages were shown"));
    assert_eq!(last.indicator, "3/3");
    assert!(!last.next);
    Ok(())
}

#[tokio::test]
async fn null_next_offset_makes_next_a_no_op() -> Result<(), NavError> {
    let backend = FixedBackend::new(vec![(0, listing(0, 5, None))]);
    let (mut session, transport) = open(backend.clone(), RenderMode::PerRecord).await?;

    assert!(!transport.shown()[0].controls.next);
    assert_eq!(
        session.handle_action(NavAction::Next).await?,
        NavOutcome::NoFurtherPage
    );
    assert_eq!(session.current_index(), 0);
    assert_eq!(backend.offsets(), vec![0]);
    Ok(())
}

#[tokio::test]
async fn first_fetch_failure_sends_nothing() {
    let backend = FixedBackend::new(Vec::new());
    let result = open(backend, RenderMode::PerRecord).await;
    assert!(matches!(result, Err(NavError::Open(_))));
}

#[tokio::test]
async fn empty_result_shows_placeholder() -> Result<(), NavError> {
    let backend = FixedBackend::new(vec![(0, listing(0, 0, None))]);
    let (_session, transport) = open(backend, RenderMode::PerRecord).await?;

    let shown = transport.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].page.kind, PageKind::Empty);
    assert!(shown[0].html().contains("Nothing to see here."));
    Ok(())
}

#[tokio::test]
async fn summary_of_zero_votes_has_zero_ratio() -> Result<(), NavError> {
    let backend = FixedBackend::new(vec![(
        0,
        VoteBatch {
            records: Vec::new(),
            total_count: 0,
            next_offset: None,
            aggregate: Some(VoteAggregate {
                upvotes: 0,
                downvotes: 0,
                total_score: 0,
            }),
        },
    )]);
    let (_session, transport) = open(backend, RenderMode::AggregateSummary).await?;

    let page = &transport.shown()[0].page;
    assert_eq!(page.kind, PageKind::Summary);
    assert!(page.body.contains("Upvote ratio: 0.0%"));
    Ok(())
}

#[tokio::test]
async fn stop_disables_controls_and_keeps_content() -> Result<(), NavError> {
    let backend = FixedBackend::new(vec![(0, listing(0, 10, Some(10)))]);
    let (mut session, transport) = open(backend, RenderMode::PerRecord).await?;

    assert_eq!(session.handle_action(NavAction::Stop).await?, NavOutcome::Closed);
    assert_eq!(session.handle_action(NavAction::Next).await?, NavOutcome::Closed);

    let shown = transport.shown();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].page, shown[1].page);
    assert!(!shown[1].controls.is_interactive());
    Ok(())
}

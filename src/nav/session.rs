//! Navigation controller
//!
//! A session owns its cursor, an append-only cache of pages already produced
//! and the index of the page on display. Going back is always a cache hit;
//! going forward past the cache pulls exactly one page from the cursor.

use super::{ControlSet, NavAction, NavError, NavOutcome, NavTransport, PagePayload, SessionId};
use crate::votes::render::{render_empty, render_error};
use crate::votes::{BatchCursor, Page, Pull};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How long the host keeps an ephemeral response editable.
pub const EPHEMERAL_RESPONSE_WINDOW: Duration = Duration::from_secs(900);

/// Default idle timeout.
pub const DEFAULT_NAV_TIMEOUT: Duration = Duration::from_secs(120);

/// Session start parameters
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Requested start page, clamped to the pages available after the first pull
    pub start_at: usize,
    pub ephemeral: bool,
    /// Idle period after which the host calls `on_timeout`
    pub timeout: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            start_at: 0,
            ephemeral: false,
            timeout: DEFAULT_NAV_TIMEOUT,
        }
    }
}

enum SessionState {
    Live,
    /// Fatal error; every action re-displays this page
    Faulted(Page),
    Closed,
}

/// One user-facing navigation instance
pub struct NavigatorSession<T: NavTransport> {
    id: SessionId,
    cursor: BatchCursor,
    cache: Vec<Page>,
    current_index: usize,
    ephemeral: bool,
    timeout: Duration,
    transport: T,
    handle: T::Handle,
    state: SessionState,
    last_activity: Instant,
}

fn live_controls(
    id: &SessionId,
    current_index: usize,
    cache_len: usize,
    exhausted: bool,
) -> ControlSet {
    let has_cached_ahead = current_index + 1 < cache_len;
    let indicator = if exhausted {
        format!("{}/{}", current_index + 1, cache_len)
    } else {
        format!("{}/?", current_index + 1)
    };
    ControlSet {
        session: id.clone(),
        prev: current_index > 0,
        next: has_cached_ahead || !exhausted,
        stop: true,
        indicator,
    }
}

impl<T: NavTransport> NavigatorSession<T> {
    /// Pull the first page and send it as a new message.
    ///
    /// Nothing is sent and no session exists if the first pull fails.
    ///
    /// # Errors
    ///
    /// `NavError::Open` if the first fetch fails, `NavError::Transport` if
    /// sending fails.
    pub async fn open(
        id: SessionId,
        mut cursor: BatchCursor,
        transport: T,
        options: OpenOptions,
    ) -> Result<Self, NavError> {
        if options.ephemeral && options.timeout > EPHEMERAL_RESPONSE_WINDOW {
            warn!(
                session = %id,
                timeout_secs = options.timeout.as_secs(),
                "Ephemeral navigator timeout exceeds {}s; disabling controls on timeout may fail",
                EPHEMERAL_RESPONSE_WINDOW.as_secs()
            );
        }

        let first = match cursor.pull().await? {
            Pull::Page(page) => page,
            Pull::Exhausted => {
                // A fresh cursor always fetches, and the first batch is a page
                debug_assert!(false, "fresh cursor reported exhaustion");
                render_empty(cursor.query())
            }
        };
        let cache = vec![first];
        let current_index = options.start_at.min(cache.len() - 1);

        let payload = PagePayload {
            page: cache[current_index].clone(),
            notice: None,
            controls: live_controls(&id, current_index, cache.len(), cursor.is_exhausted()),
            ephemeral: options.ephemeral,
        };
        let handle = transport
            .create_response(&payload)
            .await
            .map_err(|e| NavError::Transport(e.to_string()))?;

        info!(session = %id, query = %cursor.query().target_url(), "Navigator opened");

        Ok(Self {
            id,
            cursor,
            cache,
            current_index,
            ephemeral: options.ephemeral,
            timeout: options.timeout,
            transport,
            handle,
            state: SessionState::Live,
            last_activity: Instant::now(),
        })
    }

    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn cached_page(&self, index: usize) -> Option<&Page> {
        self.cache.get(index)
    }

    #[must_use]
    pub const fn cursor(&self) -> &BatchCursor {
        &self.cursor
    }

    #[must_use]
    pub const fn handle(&self) -> &T::Handle {
        &self.handle
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub const fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    #[must_use]
    pub const fn is_faulted(&self) -> bool {
        matches!(self.state, SessionState::Faulted(_))
    }

    /// Time since the last user action (or since open).
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    #[must_use]
    pub const fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Dispatch a control press.
    ///
    /// # Errors
    ///
    /// Only transport failures; fetch errors are rendered, not returned.
    pub async fn handle_action(&mut self, action: NavAction) -> Result<NavOutcome, NavError> {
        match action {
            NavAction::Prev => self.go_prev().await,
            NavAction::Next => self.go_next().await,
            NavAction::Stop => self.stop().await,
            NavAction::Indicator => {
                self.last_activity = Instant::now();
                Ok(if self.is_closed() {
                    NavOutcome::Closed
                } else {
                    NavOutcome::Unchanged
                })
            }
        }
    }

    /// Show the next page, fetching it if it is not cached yet.
    ///
    /// # Errors
    ///
    /// Only transport failures.
    pub async fn go_next(&mut self) -> Result<NavOutcome, NavError> {
        self.last_activity = Instant::now();
        match self.state {
            SessionState::Closed => return Ok(NavOutcome::Closed),
            SessionState::Faulted(_) => return self.redisplay_fault().await,
            SessionState::Live => {}
        }

        if self.current_index + 1 < self.cache.len() {
            self.current_index += 1;
            self.render(None).await?;
            return Ok(NavOutcome::Rendered);
        }

        match self.cursor.pull().await {
            Ok(Pull::Page(page)) => {
                self.cache.push(page);
                self.current_index += 1;
                debug!(session = %self.id, page = self.current_index, "Fetched new page");
                self.render(None).await?;
                Ok(NavOutcome::Rendered)
            }
            Ok(Pull::Exhausted) => {
                debug!(session = %self.id, "No further page");
                self.render(None).await?;
                Ok(NavOutcome::NoFurtherPage)
            }
            Err(e) if e.is_transient() => {
                warn!(session = %self.id, error = %e, "Next page fetch failed");
                let notice = "⚠️ Could not load the next page. Press ▶ to try again.".to_string();
                self.render(Some(notice)).await?;
                Ok(NavOutcome::FetchFailed(e.to_string()))
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "Navigator faulted");
                self.state = SessionState::Faulted(render_error(&e.to_string()));
                self.render(None).await?;
                Ok(NavOutcome::Faulted)
            }
        }
    }

    /// Show the previous page. Never fetches.
    ///
    /// # Errors
    ///
    /// Only transport failures.
    pub async fn go_prev(&mut self) -> Result<NavOutcome, NavError> {
        self.last_activity = Instant::now();
        match self.state {
            SessionState::Closed => return Ok(NavOutcome::Closed),
            SessionState::Faulted(_) => return self.redisplay_fault().await,
            SessionState::Live => {}
        }

        self.current_index = self.current_index.saturating_sub(1);
        self.render(None).await?;
        Ok(NavOutcome::Rendered)
    }

    /// Disable every control, keep the content, finish the session.
    ///
    /// # Errors
    ///
    /// Only transport failures.
    pub async fn stop(&mut self) -> Result<NavOutcome, NavError> {
        self.last_activity = Instant::now();
        if self.is_closed() {
            return Ok(NavOutcome::Closed);
        }
        let payload = self.closing_payload();
        self.state = SessionState::Closed;
        info!(session = %self.id, pages = self.cache.len(), "Navigator stopped");
        self.write(&payload).await?;
        Ok(NavOutcome::Closed)
    }

    /// Host-originated stop after the idle period.
    ///
    /// Best-effort: a failed edit is logged and otherwise ignored, which is the
    /// expected outcome for ephemeral responses past the host's edit window.
    pub async fn on_timeout(&mut self) {
        if self.is_closed() {
            return;
        }
        let payload = self.closing_payload();
        self.state = SessionState::Closed;
        info!(session = %self.id, "Navigator timed out");
        if let Err(e) = self.write(&payload).await {
            warn!(
                session = %self.id,
                ephemeral = self.ephemeral,
                error = %e,
                "Failed to disable controls on timeout"
            );
        }
    }

    fn current_page(&self) -> &Page {
        match &self.state {
            SessionState::Faulted(page) => page,
            SessionState::Live | SessionState::Closed => &self.cache[self.current_index],
        }
    }

    fn controls(&self) -> ControlSet {
        match self.state {
            SessionState::Live => live_controls(
                &self.id,
                self.current_index,
                self.cache.len(),
                self.cursor.is_exhausted(),
            ),
            SessionState::Faulted(_) => ControlSet {
                stop: true,
                ..ControlSet::disabled(self.id.clone())
            },
            SessionState::Closed => ControlSet::disabled(self.id.clone()),
        }
    }

    fn closing_payload(&self) -> PagePayload {
        PagePayload {
            page: self.current_page().clone(),
            notice: None,
            controls: ControlSet::disabled(self.id.clone()),
            ephemeral: self.ephemeral,
        }
    }

    async fn redisplay_fault(&mut self) -> Result<NavOutcome, NavError> {
        self.render(None).await?;
        Ok(NavOutcome::Faulted)
    }

    async fn render(&self, notice: Option<String>) -> Result<(), NavError> {
        let payload = PagePayload {
            page: self.current_page().clone(),
            notice,
            controls: self.controls(),
            ephemeral: self.ephemeral,
        };
        self.write(&payload).await
    }

    async fn write(&self, payload: &PagePayload) -> Result<(), NavError> {
        self.transport
            .edit_response(&self.handle, payload)
            .await
            .map_err(|e| NavError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{batch, RecordingTransport, ScriptedVotesApi, Write};
    use crate::votes::{
        PageKind, QueryParams, RenderMode, Resource, VoteBatch, VotesApi, VotesError,
    };
    use std::sync::Arc;

    fn cursor(api: &ScriptedVotesApi, page_size: u32) -> BatchCursor {
        let query = QueryParams::new(Resource::Post, "https://lemmy.ml/post/9", page_size)
            .expect("valid query");
        let api: Arc<dyn VotesApi> = Arc::new(api.clone());
        BatchCursor::new(api, query, RenderMode::PerRecord)
    }

    async fn open(
        script: Vec<Result<VoteBatch, VotesError>>,
    ) -> (
        NavigatorSession<RecordingTransport>,
        ScriptedVotesApi,
        RecordingTransport,
    ) {
        let api = ScriptedVotesApi::new(script);
        let transport = RecordingTransport::default();
        let session = NavigatorSession::open(
            SessionId::from("test"),
            cursor(&api, 10),
            transport.clone(),
            OpenOptions::default(),
        )
        .await
        .expect("session opens");
        (session, api, transport)
    }

    #[tokio::test]
    async fn test_open_sends_first_page_once() {
        let (session, api, transport) = open(vec![Ok(batch(0, 10, Some(10)))]).await;

        let writes = transport.writes();
        assert_eq!(writes.len(), 1);
        let Write::Create(payload) = &writes[0] else {
            panic!("first write must create the message");
        };
        assert!(!payload.controls.prev);
        assert!(payload.controls.next);
        assert!(payload.controls.stop);
        assert_eq!(payload.controls.indicator, "1/?");
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.cache_len(), 1);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_next_next_prev_prev_fetches_once() -> Result<(), NavError> {
        let (mut session, api, transport) =
            open(vec![Ok(batch(0, 10, Some(10))), Ok(batch(10, 10, None))]).await;
        let first_html = transport
            .last_payload()
            .expect("first page rendered")
            .html();

        assert_eq!(session.go_next().await?, NavOutcome::Rendered);
        assert_eq!(session.go_next().await?, NavOutcome::NoFurtherPage);
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.go_prev().await?, NavOutcome::Rendered);
        assert_eq!(session.go_prev().await?, NavOutcome::Rendered);

        assert_eq!(api.offsets(), vec![0, 10]);
        assert_eq!(session.current_index(), 0);
        let last = transport.last_payload().expect("rendered");
        assert_eq!(last.html(), first_html);
        assert!(!last.controls.prev);
        // Exhausted cursor, but page 2 is cached ahead
        assert!(last.controls.next);
        assert_eq!(last.controls.indicator, "1/2");
        // One create plus one edit per action
        assert_eq!(transport.writes().len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_cache_replay_is_byte_identical() -> Result<(), NavError> {
        let (mut session, api, transport) = open(vec![
            Ok(batch(0, 10, Some(10))),
            Ok(batch(10, 10, Some(20))),
            Ok(batch(20, 10, None)),
        ])
        .await;
        session.go_next().await?;
        session.go_next().await?;
        let frontier_calls = api.calls();

        let mut seen: Vec<Option<String>> = vec![None; 3];
        for _ in 0..4 {
            for _ in 0..3 {
                session.go_prev().await?;
                let html = transport.last_payload().expect("rendered").page.to_html(None);
                let expected = seen[session.current_index()]
                    .get_or_insert_with(|| html.clone())
                    .clone();
                assert_eq!(expected, html);
            }
            session.go_next().await?;
            session.go_next().await?;
        }
        assert_eq!(api.calls(), frontier_calls);
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_first_batch_disables_next_without_fetch() -> Result<(), NavError> {
        let (mut session, api, transport) = open(vec![Ok(batch(0, 5, None))]).await;
        let opened = transport.last_payload().expect("rendered");
        assert!(!opened.controls.next);
        assert_eq!(opened.controls.indicator, "1/1");

        assert_eq!(session.go_next().await?, NavOutcome::NoFurtherPage);
        assert_eq!(session.current_index(), 0);
        assert_eq!(api.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_first_page_opens_placeholder() {
        let (session, _api, transport) = open(vec![Ok(batch(0, 0, None))]).await;
        let payload = transport.last_payload().expect("rendered");
        assert_eq!(payload.page.kind, PageKind::Empty);
        assert!(payload.html().contains("Nothing to see here."));
        assert!(!session.is_faulted());
    }

    #[tokio::test]
    async fn test_open_fails_without_sending_on_server_error() {
        let api = ScriptedVotesApi::new(vec![Err(VotesError::Api {
            status: 500,
            message: "boom".to_string(),
        })]);
        let transport = RecordingTransport::default();
        let result = NavigatorSession::open(
            SessionId::new(),
            cursor(&api, 10),
            transport.clone(),
            OpenOptions::default(),
        )
        .await;

        assert!(matches!(result, Err(NavError::Open(VotesError::Api { status: 500, .. }))));
        assert!(transport.writes().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_position_and_allows_retry() -> Result<(), NavError> {
        let (mut session, api, transport) = open(vec![
            Ok(batch(0, 10, Some(10))),
            Err(VotesError::Network("timed out".to_string())),
            Ok(batch(10, 3, None)),
        ])
        .await;

        let outcome = session.go_next().await?;
        assert!(matches!(outcome, NavOutcome::FetchFailed(_)));
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.cache_len(), 1);
        let payload = transport.last_payload().expect("rendered");
        assert!(payload.notice.is_some());
        assert!(payload.controls.next);

        assert_eq!(session.go_next().await?, NavOutcome::Rendered);
        assert_eq!(session.current_index(), 1);
        assert_eq!(api.offsets(), vec![0, 10, 10]);
        Ok(())
    }

    #[tokio::test]
    async fn test_decode_failure_faults_session() -> Result<(), NavError> {
        let (mut session, api, transport) = open(vec![
            Ok(batch(0, 10, Some(10))),
            Err(VotesError::Decode("missing field `next_offset`".to_string())),
        ])
        .await;

        assert_eq!(session.go_next().await?, NavOutcome::Faulted);
        let payload = transport.last_payload().expect("rendered");
        assert_eq!(payload.page.kind, PageKind::Error);
        assert!(payload.controls.stop);
        assert!(!payload.controls.next && !payload.controls.prev);

        // Further input re-displays the error state without fetching
        assert_eq!(session.go_prev().await?, NavOutcome::Faulted);
        assert_eq!(session.go_next().await?, NavOutcome::Faulted);
        assert_eq!(
            transport.last_payload().expect("rendered").page.kind,
            PageKind::Error
        );
        assert_eq!(api.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_disables_controls_and_is_terminal() -> Result<(), NavError> {
        let (mut session, api, transport) = open(vec![Ok(batch(0, 10, Some(10)))]).await;

        assert_eq!(session.stop().await?, NavOutcome::Closed);
        let payload = transport.last_payload().expect("rendered");
        assert!(!payload.controls.is_interactive());
        assert_eq!(payload.page.kind, PageKind::Listing);

        let writes = transport.writes().len();
        assert_eq!(session.go_next().await?, NavOutcome::Closed);
        assert_eq!(session.go_prev().await?, NavOutcome::Closed);
        assert_eq!(session.stop().await?, NavOutcome::Closed);
        session.on_timeout().await;
        assert_eq!(transport.writes().len(), writes);
        assert_eq!(api.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_timeout_is_best_effort() {
        let (mut session, _api, transport) = open(vec![Ok(batch(0, 10, Some(10)))]).await;
        transport.set_fail_edits(true);

        session.on_timeout().await;
        assert!(session.is_closed());
        assert_eq!(transport.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_indicator_press_writes_nothing() -> Result<(), NavError> {
        let (mut session, _api, transport) = open(vec![Ok(batch(0, 10, Some(10)))]).await;
        assert_eq!(
            session.handle_action(NavAction::Indicator).await?,
            NavOutcome::Unchanged
        );
        assert_eq!(transport.writes().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_start_at_is_clamped() {
        let api = ScriptedVotesApi::new(vec![Ok(batch(0, 10, Some(10)))]);
        let session = NavigatorSession::open(
            SessionId::new(),
            cursor(&api, 10),
            RecordingTransport::default(),
            OpenOptions {
                start_at: 5,
                ..OpenOptions::default()
            },
        )
        .await
        .expect("session opens");
        assert_eq!(session.current_index(), 0);
    }

    #[tokio::test]
    async fn test_ephemeral_long_timeout_is_kept() -> Result<(), NavError> {
        let api = ScriptedVotesApi::new(vec![
            Ok(batch(0, 10, Some(10))),
            Ok(batch(10, 10, None)),
        ]);
        let transport = RecordingTransport::default();
        let mut session = NavigatorSession::open(
            SessionId::new(),
            cursor(&api, 10),
            transport.clone(),
            OpenOptions {
                ephemeral: true,
                timeout: Duration::from_secs(1000),
                ..OpenOptions::default()
            },
        )
        .await?;

        // Past the ephemeral window: warned about, never shortened
        assert_eq!(session.timeout(), Duration::from_secs(1000));
        assert!(session.is_ephemeral());

        session.go_next().await?;
        session.go_prev().await?;
        session.stop().await?;

        let writes = transport.writes();
        assert_eq!(writes.len(), 4);
        assert!(writes.iter().all(|w| w.payload().ephemeral));
        let closing = writes.last().map(Write::payload).expect("closing write");
        assert!(!closing.controls.is_interactive());
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_summary_still_opens() -> Result<(), NavError> {
        let api = ScriptedVotesApi::new(vec![Ok(VoteBatch {
            aggregate: Some(crate::votes::VoteAggregate {
                upvotes: 0,
                downvotes: 0,
                total_score: 0,
            }),
            ..batch(0, 0, None)
        })]);
        let query = QueryParams::new(Resource::Comment, "https://lemmy.ml/comment/5", 10)
            .expect("valid query");
        let api_handle: Arc<dyn VotesApi> = Arc::new(api.clone());
        let transport = RecordingTransport::default();
        let session = NavigatorSession::open(
            SessionId::new(),
            BatchCursor::new(api_handle, query, RenderMode::AggregateSummary),
            transport.clone(),
            OpenOptions::default(),
        )
        .await?;

        assert_eq!(session.cache_len(), 1);
        let payload = transport.last_payload().expect("rendered");
        assert_eq!(payload.page.kind, PageKind::Summary);
        assert_eq!(api.calls(), 1);
        Ok(())
    }
}

//! Page navigation
//!
//! Transport-agnostic navigator: a session caches pages produced by a
//! [`BatchCursor`](crate::votes::BatchCursor) and maps prev/next/stop presses
//! to cache hits or fetches. Chat platforms plug in through [`NavTransport`].

/// Process-level registry of live sessions with idle timeouts.
pub mod registry;
/// The navigation controller.
pub mod session;

use crate::votes::{Page, VotesError};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use registry::SessionRegistry;
pub use session::{NavigatorSession, OpenOptions};

/// Prefix of callback data routed to the navigator.
pub const CALLBACK_PREFIX: &str = "nav";

/// Errors surfaced by the navigator to its host
#[derive(Debug, Error)]
pub enum NavError {
    /// The first page could not be loaded, no session was created
    #[error("failed to load the first page: {0}")]
    Open(#[from] VotesError),
    /// Writing to the display surface failed
    #[error("transport error: {0}")]
    Transport(String),
}

/// Identifies a navigator session inside callback data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random id, short enough for Telegram's 64-byte callback data.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Navigation controls, one handler each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    Prev,
    Next,
    Stop,
    /// Page indicator; pressing it does nothing
    Indicator,
}

impl NavAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prev => "prev",
            Self::Next => "next",
            Self::Stop => "stop",
            Self::Indicator => "ind",
        }
    }
}

impl FromStr for NavAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prev" => Ok(Self::Prev),
            "next" => Ok(Self::Next),
            "stop" => Ok(Self::Stop),
            "ind" => Ok(Self::Indicator),
            _ => Err(()),
        }
    }
}

/// Callback data for `action` in `session`.
#[must_use]
pub fn callback_data(session: &SessionId, action: NavAction) -> String {
    format!("{CALLBACK_PREFIX}:{session}:{}", action.as_str())
}

/// Parse callback data produced by [`callback_data`].
#[must_use]
pub fn parse_callback_data(data: &str) -> Option<(SessionId, NavAction)> {
    let mut parts = data.splitn(3, ':');
    if parts.next()? != CALLBACK_PREFIX {
        return None;
    }
    let session = parts.next().filter(|s| !s.is_empty())?;
    let action = parts.next()?.parse().ok()?;
    Some((SessionId::from(session), action))
}

/// One control as it should be displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlButton {
    pub action: NavAction,
    pub label: String,
    pub enabled: bool,
}

/// Enabled/disabled state of every control, re-derived on each render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSet {
    pub session: SessionId,
    pub prev: bool,
    pub next: bool,
    pub stop: bool,
    pub indicator: String,
}

impl ControlSet {
    /// Every control disabled (session finished).
    #[must_use]
    pub fn disabled(session: SessionId) -> Self {
        Self {
            session,
            prev: false,
            next: false,
            stop: false,
            indicator: String::new(),
        }
    }

    /// True if at least one control accepts presses.
    #[must_use]
    pub const fn is_interactive(&self) -> bool {
        self.prev || self.next || self.stop
    }

    /// Controls in display order: prev, indicator, next, stop.
    #[must_use]
    pub fn buttons(&self) -> Vec<ControlButton> {
        vec![
            ControlButton {
                action: NavAction::Prev,
                label: "◀".to_string(),
                enabled: self.prev,
            },
            ControlButton {
                action: NavAction::Indicator,
                label: self.indicator.clone(),
                enabled: false,
            },
            ControlButton {
                action: NavAction::Next,
                label: "▶".to_string(),
                enabled: self.next,
            },
            ControlButton {
                action: NavAction::Stop,
                label: "⏹".to_string(),
                enabled: self.stop,
            },
        ]
    }
}

/// Full replacement content for the display surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePayload {
    pub page: Page,
    /// Transient notice shown under the page (e.g. a failed fetch)
    pub notice: Option<String>,
    pub controls: ControlSet,
    pub ephemeral: bool,
}

impl PagePayload {
    /// Message HTML (page plus notice).
    #[must_use]
    pub fn html(&self) -> String {
        let html = self.page.to_html(self.notice.as_deref());
        debug_assert!(!html.is_empty(), "rendered page must not be empty");
        html
    }
}

/// What a navigation action did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// A page was (re)displayed
    Rendered,
    /// Next was pressed with nothing left to show
    NoFurtherPage,
    /// Fetching the next page failed; retrying is safe
    FetchFailed(String),
    /// The session hit a fatal error and shows the error page
    Faulted,
    /// Nothing to do (indicator press)
    Unchanged,
    /// The session is finished
    Closed,
}

/// Display surface used by the navigator
#[async_trait]
pub trait NavTransport: Send + Sync + 'static {
    /// Address of a displayed message
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;

    /// Send the first page, returning a handle for later edits.
    async fn create_response(&self, payload: &PagePayload) -> Result<Self::Handle>;

    /// Replace the displayed content in full.
    async fn edit_response(&self, handle: &Self::Handle, payload: &PagePayload) -> Result<()>;
}

//! Lemmy vote navigator.
//!
//! Browses who voted on a Lemmy post or comment, one page at a time, through
//! a Telegram message with ◀ ▶ ⏹ controls. Batches are fetched lazily from a
//! vote-listing backend and cached, so going back never refetches.

/// Telegram adapter
pub mod bot;
/// Configuration and settings management
pub mod config;
/// Transport-agnostic page navigation
pub mod nav;
/// Shared helpers
pub mod utils;
/// Vote backend client, batch cursor and page rendering
pub mod votes;

#[cfg(test)]
pub mod testing;

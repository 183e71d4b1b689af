//! Telegram adapter: commands, control callbacks and the navigator transport.

/// Command and callback handlers
pub mod handlers;
/// Telegram send/edit with retries
pub mod resilient;
/// Dispatcher setup
pub mod runner;
/// `NavTransport` backed by a Telegram message
pub mod transport;
/// Keyboards and user-facing text
pub mod views;

pub use runner::run_bot;
pub use transport::TelegramNavTransport;

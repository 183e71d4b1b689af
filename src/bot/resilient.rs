//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Wrappers around sending and editing navigator messages that retry on
//! transient network failures using exponential backoff with jitter.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::RequestError;
use teloxide::types::{ChatId, InlineKeyboardMarkup, Message, MessageId, ParseMode};
use tracing::debug;

const ERROR_NOT_MODIFIED: &str = "message is not modified";

/// Telegram rejects edits that change nothing; for a full re-render that is success.
fn is_not_modified(error: &str) -> bool {
    error.contains(ERROR_NOT_MODIFIED)
}

/// Send an HTML page with its keyboard, retrying on network failures.
///
/// `silent` sends without a notification sound.
///
/// # Errors
///
/// Returns the last Telegram error after all retries are exhausted.
pub async fn send_page_resilient(
    bot: &Bot,
    chat_id: ChatId,
    html: &str,
    keyboard: &InlineKeyboardMarkup,
    silent: bool,
) -> Result<Message> {
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot
            .send_message(chat_id, html.to_string())
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone());
        if silent {
            req = req.disable_notification(true);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// How a failed edit should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditFailure {
    /// Telegram already shows this content
    NotModified,
    /// Telegram rejected the edit; retrying cannot help
    Rejected,
    /// Network trouble or rate limiting; worth another attempt
    Transient,
}

fn classify_edit_error(error: &RequestError) -> EditFailure {
    if is_not_modified(&error.to_string()) {
        EditFailure::NotModified
    } else if matches!(error, RequestError::Api(_)) {
        EditFailure::Rejected
    } else {
        EditFailure::Transient
    }
}

/// Replace a page message's text and keyboard, retrying on network failures.
///
/// An edit that Telegram reports as "not modified" counts as done. API
/// rejections (e.g. "message to edit not found") fail at once without retries.
///
/// # Errors
///
/// Returns the Telegram error after a rejection or once all retries are exhausted.
pub async fn edit_page_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    html: &str,
    keyboard: &InlineKeyboardMarkup,
) -> Result<()> {
    let rejection = crate::utils::retry_telegram_operation(|| async {
        match bot
            .edit_message_text(chat_id, msg_id, html.to_string())
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => Ok(None),
            Err(e) => match classify_edit_error(&e) {
                EditFailure::NotModified => {
                    debug!("Message update skipped: {e}");
                    Ok(None)
                }
                EditFailure::Rejected => Ok(Some(e)),
                EditFailure::Transient => Err(anyhow::anyhow!("Telegram edit error: {e}")),
            },
        }
    })
    .await?;

    match rejection {
        Some(e) => Err(anyhow::anyhow!("Telegram edit rejected: {e}")),
        None => Ok(()),
    }
}

//! Navigator UI components
//!
//! Inline keyboards, help text and callback toasts.

use crate::nav::{callback_data, ControlSet, NavAction, NavOutcome};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Label for a disabled prev/next slot; Telegram has no disabled buttons.
const DISABLED_LABEL: &str = "·";

/// Usage text for `/start` and `/help`
pub const HELP_TEXT: &str = r#"🗳 <b>Lemmy vote navigator</b>

<code>/post_votes &lt;url&gt; [limit] [@username|-] [All|Upvotes|Downvotes]</code>
List who voted on a post (default limit 10).

<code>/comment_votes &lt;url&gt; [limit] [@username|-] [filter]</code>
List who voted on a comment (default limit 20).

Arguments keep this order; any of them may be left out. Use <code>-</code> for no username when a filter follows. A bare number is read as the limit, so write numeric usernames as <code>@123</code>.

<code>/post_summary</code>, <code>/comment_summary</code> take the same arguments and show vote totals per batch.

Use ◀ ▶ to browse and ⏹ to stop. Controls switch off after a while without use."#;

/// Build the inline keyboard for a control set.
///
/// Disabled prev/next keep their slot (as a no-op indicator press) so the
/// layout does not jump between pages. A fully disabled set removes the keyboard.
#[must_use]
pub fn nav_keyboard(controls: &ControlSet) -> InlineKeyboardMarkup {
    if !controls.is_interactive() {
        return InlineKeyboardMarkup::default();
    }

    let row = controls
        .buttons()
        .into_iter()
        .filter(|button| button.action != NavAction::Stop || button.enabled)
        .map(|button| {
            let (label, action) = if button.enabled || button.action == NavAction::Indicator {
                (button.label, button.action)
            } else {
                (DISABLED_LABEL.to_string(), NavAction::Indicator)
            };
            InlineKeyboardButton::callback(label, callback_data(&controls.session, action))
        })
        .collect::<Vec<_>>();

    InlineKeyboardMarkup::new(vec![row])
}

/// Toast shown when answering a control press, if any.
#[must_use]
pub fn outcome_toast(outcome: &NavOutcome) -> Option<&'static str> {
    match outcome {
        NavOutcome::Rendered | NavOutcome::Unchanged => None,
        NavOutcome::NoFurtherPage => Some("No further page."),
        NavOutcome::FetchFailed(_) => Some("⚠️ Could not load the next page, try again."),
        NavOutcome::Faulted => Some("❌ This navigator hit an error."),
        NavOutcome::Closed => Some("This navigator is closed."),
    }
}

/// Reply for a command whose navigator could not be opened.
#[must_use]
pub fn open_failed_message(error: &str) -> String {
    format!(
        "❌ Could not load votes: {}",
        html_escape::encode_text(error)
    )
}

use crate::bot::transport::TelegramNavTransport;
use crate::bot::views::{open_failed_message, outcome_toast, HELP_TEXT};
use crate::config::{Settings, MAX_RECORDS_PER_MESSAGE};
use crate::nav::{
    parse_callback_data, NavigatorSession, OpenOptions, SessionId, SessionRegistry,
};
use crate::votes::{BatchCursor, QueryParams, RenderMode, Resource, VoteFilter, VotesApi};
use anyhow::Result;
use std::sync::Arc;
use teloxide::{prelude::*, types::ParseMode, utils::command::BotCommands};
use tracing::{info, warn};

/// Registry of navigators shown through Telegram
pub type TelegramRegistry = SessionRegistry<TelegramNavTransport>;

/// Extracts user ID from message safely
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Bot commands
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage
    #[command(description = "Show usage.")]
    Help,
    #[command(description = "Browse votes on a post: <url> [limit] [@username|-] [filter]")]
    PostVotes(String),
    #[command(description = "Browse votes on a comment: <url> [limit] [@username|-] [filter]")]
    CommentVotes(String),
    #[command(description = "Vote totals for a post, batch by batch.")]
    PostSummary(String),
    #[command(description = "Vote totals for a comment, batch by batch.")]
    CommentSummary(String),
}

impl Command {
    /// Resource and render mode of a vote command, `None` for the rest.
    #[must_use]
    pub fn votes_target(&self) -> Option<(Resource, RenderMode, &str)> {
        match self {
            Self::Start | Self::Help => None,
            Self::PostVotes(args) => Some((Resource::Post, RenderMode::PerRecord, args)),
            Self::CommentVotes(args) => Some((Resource::Comment, RenderMode::PerRecord, args)),
            Self::PostSummary(args) => Some((Resource::Post, RenderMode::AggregateSummary, args)),
            Self::CommentSummary(args) => {
                Some((Resource::Comment, RenderMode::AggregateSummary, args))
            }
        }
    }
}

/// Arguments of a vote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotesArgs {
    pub url: String,
    pub limit: Option<u32>,
    pub username: Option<String>,
    pub filter: VoteFilter,
}

impl VotesArgs {
    /// Parse `<url> [limit] [@username|-] [filter]`.
    ///
    /// Each optional argument may be left out as long as the rest keep their
    /// order. `-` stands for "no username". A token starting with `@` is
    /// always a username, so `@123` names a numeric user where a bare `123`
    /// would be read as the limit.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the usage reply.
    pub fn parse(input: &str, max_limit: u32) -> Result<Self, String> {
        let mut tokens = input.split_whitespace().peekable();
        let url = tokens
            .next()
            .ok_or_else(|| "a post or comment URL is required".to_string())?
            .to_string();

        let mut limit = None;
        if let Some(token) = tokens.peek() {
            if !token.starts_with('@') && token.chars().all(|c| c.is_ascii_digit()) {
                let value: u32 = token
                    .parse()
                    .map_err(|_| format!("limit '{token}' is too large"))?;
                if value == 0 || value > max_limit {
                    return Err(format!("limit must be between 1 and {max_limit}"));
                }
                limit = Some(value);
                tokens.next();
            }
        }

        let rest: Vec<&str> = tokens.collect();
        let (username, filter) = match rest.as_slice() {
            [] => (None, VoteFilter::All),
            [single] if single.starts_with('@') => (parse_username(single), VoteFilter::All),
            [single] => match single.parse::<VoteFilter>() {
                Ok(filter) => (None, filter),
                Err(_) => (parse_username(single), VoteFilter::All),
            },
            [user, filter] => (
                parse_username(user),
                filter.parse::<VoteFilter>().map_err(|e| e.to_string())?,
            ),
            _ => return Err("too many arguments".to_string()),
        };

        Ok(Self {
            url,
            limit,
            username,
            filter,
        })
    }
}

fn parse_username(token: &str) -> Option<String> {
    let name = token.trim_start_matches('@');
    (name != "-" && !name.is_empty()).then(|| name.to_string())
}

/// Handler for /start and /help
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, HELP_TEXT)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Open a navigator for a vote command and register it.
///
/// # Errors
///
/// Returns an error if a reply to the user cannot be sent.
pub async fn open_votes(
    bot: Bot,
    msg: Message,
    target: (Resource, RenderMode, &str),
    settings: Arc<Settings>,
    api: Arc<dyn VotesApi>,
    registry: Arc<TelegramRegistry>,
) -> Result<()> {
    let (resource, mode, raw_args) = target;
    let user_id = get_user_id_safe(&msg);

    let args = match VotesArgs::parse(raw_args, settings.max_limit) {
        Ok(args) => args,
        Err(reason) => {
            info!(user_id, reason = %reason, "Rejected vote command arguments");
            bot.send_message(
                msg.chat.id,
                format!("⚠️ {}\n\n{HELP_TEXT}", html_escape::encode_text(&reason)),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            return Ok(());
        }
    };

    let default_limit = match resource {
        Resource::Post => settings.post_votes_limit,
        Resource::Comment => settings.comment_votes_limit,
    };
    let query = match QueryParams::new(resource, args.url, args.limit.unwrap_or(default_limit)) {
        Ok(query) => query
            .with_username(args.username)
            .with_filter(args.filter),
        Err(e) => {
            bot.send_message(msg.chat.id, open_failed_message(&e.to_string()))
                .await?;
            return Ok(());
        }
    };

    info!(
        user_id,
        resource = resource.label(),
        url = %query.target_url(),
        limit = query.page_size(),
        "Opening vote navigator"
    );

    let cursor =
        BatchCursor::new(api, query, mode).with_records_per_page(MAX_RECORDS_PER_MESSAGE);
    let transport = TelegramNavTransport::new(bot.clone(), msg.chat.id);
    let options = OpenOptions {
        start_at: 0,
        ephemeral: settings.ephemeral,
        timeout: settings.nav_timeout(),
    };

    match NavigatorSession::open(SessionId::new(), cursor, transport, options).await {
        Ok(session) => {
            registry.insert(session).await;
        }
        Err(e) => {
            warn!(user_id, error = %e, "Failed to open vote navigator");
            bot.send_message(msg.chat.id, open_failed_message(&e.to_string()))
                .await?;
        }
    }
    Ok(())
}

/// Handle presses on navigator controls
///
/// # Errors
///
/// Returns an error if the callback cannot be answered.
pub async fn handle_nav_callback(
    bot: Bot,
    q: CallbackQuery,
    registry: Arc<TelegramRegistry>,
) -> Result<()> {
    let Some((session, action)) = q.data.as_deref().and_then(parse_callback_data) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let toast = match registry.dispatch(&session, action).await {
        Ok(outcome) => outcome_toast(&outcome),
        Err(e) => {
            warn!(session = %session, error = %e, "Navigator action failed");
            Some("⚠️ Could not update the message.")
        }
    };

    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(text) = toast {
        answer = answer.text(text);
    }
    answer.await?;
    Ok(())
}

use crate::bot::handlers::{
    get_user_id_safe, handle_nav_callback, help, open_votes, Command, TelegramRegistry,
};
use crate::config::Settings;
use crate::nav::CALLBACK_PREFIX;
use crate::votes::{HttpVotesClient, VotesApi};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Run the Telegram bot until Ctrl-C.
pub async fn run_bot(settings: Arc<Settings>) {
    let api: Arc<dyn VotesApi> = Arc::new(HttpVotesClient::new(
        settings.backend_url.clone(),
        settings.http_timeout(),
    ));
    info!(backend = %settings.backend_url, "Votes client initialized.");

    let registry: Arc<TelegramRegistry> = Arc::new(TelegramRegistry::new());

    let bot = Bot::new(settings.telegram_token.clone());
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, api, registry])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/// Where a callback query goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallbackRoute {
    Navigate,
    Deny,
}

fn is_nav_callback(q: &CallbackQuery) -> bool {
    q.data
        .as_deref()
        .is_some_and(|data| data.starts_with(&format!("{CALLBACK_PREFIX}:")))
}

/// Route navigator presses; other callback data is ignored.
fn route_callback(q: &CallbackQuery, settings: &Settings) -> Option<CallbackRoute> {
    if !is_nav_callback(q) {
        return None;
    }
    if settings.is_allowed(q.from.id.0.cast_signed()) {
        Some(CallbackRoute::Navigate)
    } else {
        Some(CallbackRoute::Deny)
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .filter_map(|q: CallbackQuery, settings: Arc<Settings>| {
                    route_callback(&q, &settings)
                })
                .branch(dptree::case![CallbackRoute::Navigate].endpoint(handle_callback))
                .branch(dptree::case![CallbackRoute::Deny].endpoint(handle_denied_callback)),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<Settings>| {
                    settings.is_allowed(get_user_id_safe(&msg))
                })
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            // Commands from users outside the allow-list
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_unauthorized),
        )
}

async fn handle_unauthorized(bot: Bot, msg: Message) -> Result<(), teloxide::RequestError> {
    let user_id = get_user_id_safe(&msg);
    info!("⛔️ Unauthorized command from user {user_id}.");

    if let Err(e) = bot.send_message(msg.chat.id, "⛔️ Access denied").await {
        error!("Failed to send access denied message to {user_id}: {e}");
    }
    respond(())
}

async fn handle_denied_callback(
    bot: Bot,
    q: CallbackQuery,
) -> Result<(), teloxide::RequestError> {
    let user_id = q.from.id.0.cast_signed();
    info!("⛔️ Unauthorized navigator press from user {user_id}.");

    if let Err(e) = bot
        .answer_callback_query(q.id.clone())
        .text("⛔️ Access denied")
        .await
    {
        error!("Failed to answer denied callback from {user_id}: {e}");
    }
    respond(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    settings: Arc<Settings>,
    api: Arc<dyn VotesApi>,
    registry: Arc<TelegramRegistry>,
) -> Result<(), teloxide::RequestError> {
    let result = match cmd.votes_target() {
        Some(target) => open_votes(bot, msg, target, settings, api, registry).await,
        None => help(bot, msg).await,
    };
    if let Err(e) = result {
        error!("Command handler error: {e}");
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    registry: Arc<TelegramRegistry>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handle_nav_callback(bot, q, registry).await {
        error!("Navigator callback error: {e}");
    }
    respond(())
}

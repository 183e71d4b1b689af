use crate::bot::resilient::{edit_page_resilient, send_page_resilient};
use crate::bot::views::nav_keyboard;
use crate::nav::{NavTransport, PagePayload};
use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};

/// Telegram-specific navigator transport: one message per session, edited in place.
#[derive(Clone)]
pub struct TelegramNavTransport {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNavTransport {
    /// Create a Telegram transport bound to a chat.
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl NavTransport for TelegramNavTransport {
    type Handle = MessageId;

    async fn create_response(&self, payload: &PagePayload) -> Result<MessageId> {
        // Bots cannot send per-user hidden messages; ephemeral pages go out silently.
        let msg = send_page_resilient(
            &self.bot,
            self.chat_id,
            &payload.html(),
            &nav_keyboard(&payload.controls),
            payload.ephemeral,
        )
        .await?;
        Ok(msg.id)
    }

    async fn edit_response(&self, handle: &MessageId, payload: &PagePayload) -> Result<()> {
        edit_page_resilient(
            &self.bot,
            self.chat_id,
            *handle,
            &payload.html(),
            &nav_keyboard(&payload.controls),
        )
        .await
    }
}

//! One-shot messages carried across a redirect in the session cookie.
//!
//! A message is pushed before redirecting and taken (and cleared) by the
//! page that renders next.

use actix_session::Session;
use serde::{Deserialize, Serialize};

const FLASH_SESSION_KEY: &str = "flash_messages";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
}

impl Level {
    pub fn css_class(&self) -> &'static str {
        match self {
            Level::Success => "success",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub message: String,
}

/// Queue a message for the next rendered page.
///
/// A session that cannot be written only loses the message, never the
/// request, so failures are logged and swallowed.
pub fn push(session: &Session, level: Level, message: impl Into<String>) {
    let mut messages = peek(session);
    messages.push(FlashMessage {
        level,
        message: message.into(),
    });

    if let Err(e) = session.insert(FLASH_SESSION_KEY, messages) {
        log::warn!("Failed to store flash message: {}", e);
    }
}

/// Queued messages without clearing them.
pub fn peek(session: &Session) -> Vec<FlashMessage> {
    session
        .get::<Vec<FlashMessage>>(FLASH_SESSION_KEY)
        .unwrap_or_else(|e| {
            log::warn!("Discarding unreadable flash messages: {}", e);
            None
        })
        .unwrap_or_default()
}

/// Queued messages, clearing them from the session.
pub fn take(session: &Session) -> Vec<FlashMessage> {
    let messages = peek(session);
    if !messages.is_empty() {
        session.remove(FLASH_SESSION_KEY);
    }
    messages
}

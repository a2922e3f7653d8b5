//! Common helpers to be used by various bot modules.

use std::sync::Arc;

use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::config::Config;
use crate::directus::Directus;

/// Wrapper around [`teloxide::dispatching::UpdateHandler`] to be used in this
/// crate.
pub type UpdateHandler = teloxide::dispatching::UpdateHandler<anyhow::Error>;

pub type MyDialogue = Dialogue<State, InMemStorage<State>>;

/// Per-chat conversational mode. Held only in process memory: a restart
/// silently returns every user to [`State::Idle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Idle,
    /// Plain text messages are routed to the assistant until the user
    /// explicitly leaves the conversation.
    AwaitingQuestion,
}

/// Placeholder for chain segments that could not be resolved.
pub const UNKNOWN: &str = "Неизвестно";

/// Bot environment: global state shared between all handlers.
pub struct BotEnv {
    pub config: Arc<Config>,
    pub reqwest_client: reqwest::Client,
    pub directus: Directus,
}

/// Map a resolver failure to its user-facing fallback text. The full detail
/// stays in the log and never reaches the chat.
pub fn error_boundary(
    what: &str,
    fallback: &str,
    result: anyhow::Result<String>,
) -> String {
    result.unwrap_or_else(|e| {
        log::error!("Failed to resolve {what}: {e:#}");
        fallback.to_string()
    })
}

//! Free-text assistant mode backed by the question-answering service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InlineKeyboardButton, InlineKeyboardMarkup};

use crate::common::{BotEnv, MyDialogue, State, UpdateHandler};
use crate::utils::{BotExt, ResultExt};

pub const BUTTON: &str = "Задать вопрос";

const PROMPT: &str =
    "💬 Задайте ваш вопрос, и я постараюсь на него ответить.";
const ENDED: &str = "✅ Диалог завершён. Чтобы задать новый вопрос, нажмите \
                     кнопку ещё раз.";
const UNREACHABLE: &str = "Не удалось подключиться к серверу нейросети. \
                           Пожалуйста, попробуйте позже.";
const NO_ANSWER: &str =
    "К сожалению, я не смог найти ответ на ваш вопрос.";

const QA_DIRECTORY: &str = "instruction_documents";
/// The backend performs retrieval and generation, which can take minutes.
const QA_TIMEOUT: Duration = Duration::from_secs(300);

pub fn message_handler() -> UpdateHandler {
    dptree::filter(|msg: Message| msg.text() == Some(BUTTON))
        .endpoint(begin_conversation)
}

pub fn question_handler() -> UpdateHandler {
    dptree::case![State::AwaitingQuestion].endpoint(answer_question)
}

pub fn callback_handler() -> UpdateHandler {
    dptree::filter_map(|callback: CallbackQuery| {
        callback.data.as_deref().and_then(parse_callback)
    })
    .endpoint(handle_callback)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallbackData {
    Start,
    End,
}

fn parse_callback(data: &str) -> Option<CallbackData> {
    match data {
        "assistant:start" => Some(CallbackData::Start),
        "assistant:end" => Some(CallbackData::End),
        _ => None,
    }
}

fn end_button() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "❌ Завершить диалог",
        "assistant:end",
    )]])
}

fn start_button() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "💬 Задать вопрос",
        "assistant:start",
    )]])
}

async fn begin_conversation(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
) -> Result<()> {
    dialogue.update(State::AwaitingQuestion).await?;
    bot.reply_message(&msg, PROMPT).reply_markup(end_button()).await?;
    Ok(())
}

async fn answer_question(
    bot: Bot,
    env: Arc<BotEnv>,
    msg: Message,
) -> Result<()> {
    let Some(question) = msg.text() else {
        bot.reply_message(&msg, PROMPT).reply_markup(end_button()).await?;
        return Ok(());
    };
    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await
        .log_error("Failed to send chat action");
    let answer = ask(&env, question).await;
    bot.reply_message(&msg, answer).reply_markup(end_button()).await?;
    Ok(())
}

async fn handle_callback(
    bot: Bot,
    dialogue: MyDialogue,
    callback: CallbackQuery,
    data: CallbackData,
) -> Result<()> {
    match data {
        CallbackData::Start => {
            dialogue.update(State::AwaitingQuestion).await?;
            bot.answer_callback_query(&callback.id).await?;
            if let Some(message) = &callback.message {
                bot.send_message(message.chat.id, PROMPT)
                    .reply_markup(end_button())
                    .await?;
            }
        }
        CallbackData::End => {
            dialogue.update(State::Idle).await?;
            bot.answer_callback_query(&callback.id).await?;
            if let Some(message) = &callback.message {
                // Rewrite the old prompt in place; fall back to a fresh
                // message when the original is too old to edit.
                let edited = bot
                    .edit_message_text(message.chat.id, message.id, ENDED)
                    .reply_markup(start_button())
                    .await;
                if let Err(e) = edited {
                    log::warn!("Failed to edit message: {e}");
                    bot.send_message(message.chat.id, ENDED)
                        .reply_markup(start_button())
                        .await?;
                }
            }
        }
    }
    Ok(())
}

/// The backend does not commit to a single response shape; the variants are
/// tried in order.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum QaResponse {
    Error { error: String, detail: String },
    Detail { detail: String },
    Answer { answer: String },
    Response { response: String },
    Text { text: String },
    Raw(String),
}

impl QaResponse {
    fn into_text(self) -> String {
        match self {
            // The backend reports its own failures as user-facing text.
            Self::Error { error, detail } => {
                log::warn!("Assistant backend returned an error: {error}");
                detail
            }
            Self::Detail { detail } => detail,
            Self::Answer { answer } => answer,
            Self::Response { response } => response,
            Self::Text { text } => text,
            Self::Raw(raw) => raw,
        }
    }
}

fn normalize_answer(body: &str) -> Option<String> {
    match serde_json::from_str::<QaResponse>(body) {
        Ok(response) => Some(response.into_text()),
        // Valid JSON in a shape we do not recognize.
        Err(_) if serde_json::from_str::<serde_json::Value>(body).is_ok() => {
            None
        }
        // The backend is also allowed to answer in plain text.
        Err(_) => {
            let text = body.trim();
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        }
    }
}

/// Ask the question-answering backend. Always produces an answer string;
/// transport failures turn into a canned reply.
pub async fn ask(env: &BotEnv, question: &str) -> String {
    let url = format!(
        "{}/ask",
        env.config.services.assistant.url.trim_end_matches('/')
    );
    log::info!("Sending question to the assistant backend");

    let response = env
        .reqwest_client
        .post(&url)
        .timeout(QA_TIMEOUT)
        .json(&serde_json::json!({
            "question": question,
            "directory": QA_DIRECTORY,
        }))
        .send()
        .await;
    let response = match response {
        Ok(response) => response,
        Err(e) => {
            crate::metrics::update_service("assistant", false);
            log::error!("Assistant backend request failed: {e}");
            return UNREACHABLE.to_string();
        }
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            crate::metrics::update_service("assistant", false);
            log::error!("Failed to read assistant response: {e}");
            return UNREACHABLE.to_string();
        }
    };
    if !status.is_success() {
        crate::metrics::update_service("assistant", false);
        log::error!("Assistant backend returned {status}: {body}");
        return UNREACHABLE.to_string();
    }

    crate::metrics::update_service("assistant", true);
    normalize_answer(&body).unwrap_or_else(|| NO_ANSWER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_shapes_resolve_in_priority_order() {
        assert_eq!(
            normalize_answer(r#"{"answer": "X"}"#).unwrap(),
            "X"
        );
        assert_eq!(
            normalize_answer(r#"{"detail": "Y"}"#).unwrap(),
            "Y"
        );
        assert_eq!(
            normalize_answer(r#"{"error": "boom", "detail": "Z"}"#).unwrap(),
            "Z"
        );
        assert_eq!(
            normalize_answer(r#"{"response": "R"}"#).unwrap(),
            "R"
        );
        assert_eq!(normalize_answer(r#"{"text": "T"}"#).unwrap(), "T");
    }

    #[test]
    fn raw_bodies_pass_through() {
        assert_eq!(normalize_answer(r#""quoted""#).unwrap(), "quoted");
        assert_eq!(
            normalize_answer("plain text answer").unwrap(),
            "plain text answer"
        );
    }

    #[test]
    fn unrecognized_shapes_yield_no_answer() {
        assert_eq!(normalize_answer(r#"{"foo": 1}"#), None);
        assert_eq!(normalize_answer("[1, 2, 3]"), None);
        assert_eq!(normalize_answer(""), None);
        assert_eq!(normalize_answer("   "), None);
    }

    #[test]
    fn callback_ids_parse_exactly() {
        assert_eq!(parse_callback("assistant:start"), Some(CallbackData::Start));
        assert_eq!(parse_callback("assistant:end"), Some(CallbackData::End));
        assert_eq!(parse_callback("assistant:other"), None);
        assert_eq!(parse_callback(""), None);
    }
}

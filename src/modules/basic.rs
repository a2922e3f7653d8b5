//! Basic commands, the main keyboard and the default fallback.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup};
use teloxide::utils::command::BotCommands;

use crate::common::{MyDialogue, State, UpdateHandler};
use crate::modules::{assistant, bus_schedule, checkin, relocation};
use crate::utils::BotExt;

const GREETING: &str =
    "Привет! Я бот для помощи с общежитием. Выберите опцию:";
const USE_BUTTONS: &str =
    "Пожалуйста, используйте кнопки для взаимодействия с ботом.";
const HELP: &str = "Доступные команды:\n\
                    /start - Начать взаимодействие с ботом\n\
                    /help - Показать эту справку\n\n\
                    Кнопки:\n\
                    Заселение - Проверить статус заселения\n\
                    Переселение - Проверить статус переселения\n\
                    Расписание автобусов - Получить актуальное расписание \
                    автобусов\n\
                    Задать вопрос - Задать вопрос ассистенту общежития";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Help,
}

pub fn command_handler() -> UpdateHandler {
    dptree::entry().filter_command::<Command>().endpoint(handle_command)
}

async fn handle_command(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    command: Command,
) -> Result<()> {
    match command {
        Command::Start => {
            // A fresh /start unconditionally drops the user back to the
            // idle state.
            dialogue.update(State::Idle).await?;
            bot.reply_message(&msg, GREETING)
                .reply_markup(main_keyboard())
                .await?;
            if let Some(user) = msg.from() {
                log::info!("Start command received from user {}", user.id);
            }
        }
        Command::Help => {
            bot.reply_message(&msg, HELP).await?;
        }
    }
    Ok(())
}

/// Default handler for anything no other branch claimed.
pub async fn fallback(bot: Bot, msg: Message) -> Result<()> {
    bot.reply_message(&msg, USE_BUTTONS)
        .reply_markup(main_keyboard())
        .await?;
    Ok(())
}

pub fn main_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new(checkin::BUTTON),
            KeyboardButton::new(relocation::BUTTON),
        ],
        vec![
            KeyboardButton::new(bus_schedule::BUTTON),
            KeyboardButton::new(assistant::BUTTON),
        ],
    ])
    .resize_keyboard(true)
}

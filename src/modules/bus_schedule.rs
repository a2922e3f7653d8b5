//! The current bus schedule, served as a photo from the record store.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::common::{BotEnv, UpdateHandler};
use crate::directus::{fetch_first, Query, Records, RecordsError};
use crate::models::BusSchedule;
use crate::utils::BotExt;

pub const BUTTON: &str = "Расписание автобусов";

const CAPTION: &str = "Актуальное расписание автобусов";
const UNAVAILABLE: &str = "Расписание автобусов временно недоступно.";
const FAILED: &str = "Произошла ошибка при получении расписания автобусов. \
                      Пожалуйста, попробуйте позже.";

pub fn message_handler() -> UpdateHandler {
    dptree::filter(|msg: Message| msg.text() == Some(BUTTON))
        .endpoint(handle_schedule)
}

async fn handle_schedule(
    bot: Bot,
    env: Arc<BotEnv>,
    msg: Message,
) -> Result<()> {
    if let Some(user) = msg.from() {
        log::info!("Bus schedule request from user {}", user.id);
    }

    let schedule = match latest_schedule(&env.directus).await {
        Ok(schedule) => schedule,
        Err(e) => {
            log::error!("Failed to fetch bus schedule: {e:#}");
            bot.reply_message(&msg, FAILED).await?;
            return Ok(());
        }
    };

    let Some(image) = schedule.and_then(|s| s.image) else {
        bot.reply_message(&msg, UNAVAILABLE).await?;
        return Ok(());
    };

    // `?download` makes the record store serve the original file.
    let url = format!("{}?download", env.directus.asset_url(&image));
    match reqwest::Url::parse(&url) {
        Ok(url) => {
            let sent = bot
                .reply_photo(&msg, InputFile::url(url))
                .caption(CAPTION)
                .await;
            if let Err(e) = sent {
                log::error!("Failed to send bus schedule image: {e}");
                bot.reply_message(&msg, FAILED).await?;
            }
        }
        Err(e) => {
            log::error!("Invalid bus schedule asset url {url:?}: {e}");
            bot.reply_message(&msg, UNAVAILABLE).await?;
        }
    }
    Ok(())
}

async fn latest_schedule<R: Records + ?Sized>(
    records: &R,
) -> Result<Option<BusSchedule>, RecordsError> {
    fetch_first(
        records,
        "items/bus_schedule",
        Query::new()
            .fields(&["id", "date_created", "image", "description"])
            .sort("-date_created")
            .limit(1),
    )
    .await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::directus::testing::FakeRecords;

    #[tokio::test]
    async fn picks_the_first_returned_schedule() {
        let records = FakeRecords::new().with(
            "items/bus_schedule",
            json!([
                { "id": 2, "image": "file-new" },
                { "id": 1, "image": "file-old" },
            ]),
        );
        let schedule = latest_schedule(&records).await.unwrap().unwrap();
        assert_eq!(schedule.image.as_deref(), Some("file-new"));
    }

    #[tokio::test]
    async fn schedule_without_an_image_is_reported_as_such() {
        let records = FakeRecords::new()
            .with("items/bus_schedule", json!([{ "id": 2, "image": null }]));
        let schedule = latest_schedule(&records).await.unwrap().unwrap();
        assert_eq!(schedule.image, None);
    }

    #[tokio::test]
    async fn empty_collection_yields_no_schedule() {
        let records =
            FakeRecords::new().with("items/bus_schedule", json!([]));
        assert!(latest_schedule(&records).await.unwrap().is_none());
    }
}

//! Check-in status: resolves a Telegram user into their room, block, floor,
//! building and address records and renders one status message.

use std::fmt::Write;
use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::UserId;

use crate::common::{error_boundary, BotEnv, UpdateHandler, UNKNOWN};
use crate::directus::{
    eq_filter, fetch_by_id, fetch_first, Query, Records, RecordsError,
};
use crate::models::{
    Accommodation, AccommodationType, Address, Block, Floor, Room,
    RoomOccupation, Scalar, UserLink,
};
use crate::utils::BotExt;

pub const BUTTON: &str = "Заселение";

const NOT_LINKED: &str = "❌ Ваш Telegram аккаунт не привязан к системе. \
                          Пожалуйста, привяжите аккаунт.";
const NOT_CHECKED_IN: &str = "❌ Вы не заселены. Пожалуйста, обратитесь в \
                              администрацию общежития.";
const ROOM_UNAVAILABLE: &str = "⚠️ Не удалось получить информацию о комнате. \
                                Пожалуйста, попробуйте позже.";
const CHECKIN_FAILED: &str = "⚠️ Не удалось получить информацию о заселении. \
                              Пожалуйста, попробуйте позже.";

pub fn message_handler() -> UpdateHandler {
    dptree::filter(|msg: Message| msg.text() == Some(BUTTON))
        .endpoint(handle_status)
}

async fn handle_status(bot: Bot, env: Arc<BotEnv>, msg: Message) -> Result<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    log::info!("Check-in request from user {}", user.id);
    let text = error_boundary(
        "check-in status",
        CHECKIN_FAILED,
        checkin_status(&env.directus, user.id).await,
    );
    bot.reply_message(&msg, text).await?;
    Ok(())
}

/// Everything the status message can show. Each stage of the resolution
/// chain fills what it can; unresolved fields render as [`UNKNOWN`].
#[derive(Debug, Default, PartialEq, Eq)]
struct CheckinInfo {
    accommodation_name: Option<String>,
    accommodation_type: Option<String>,
    address: Option<String>,
    floor_number: Option<String>,
    block_label: Option<String>,
    room_number: Option<String>,
    max_capacity: Option<String>,
}

pub(crate) async fn linked_user<R: Records + ?Sized>(
    records: &R,
    user_id: UserId,
) -> Result<Option<UserLink>, RecordsError> {
    fetch_first(
        records,
        "items/telegram_user_links",
        Query::new()
            .filter(eq_filter("telegram_id", user_id.0))
            .fields(&["user_id"]),
    )
    .await
}

pub async fn checkin_status<R: Records + ?Sized>(
    records: &R,
    user_id: UserId,
) -> Result<String> {
    let Some(link) = linked_user(records, user_id).await? else {
        return Ok(NOT_LINKED.to_string());
    };

    let occupation: Option<RoomOccupation> = fetch_first(
        records,
        "items/student_accommodation_room_occupations",
        Query::new()
            .filter(eq_filter("user_id", &link.user_id))
            .fields(&["room_id"]),
    )
    .await?;
    let Some(occupation) = occupation else {
        return Ok(NOT_CHECKED_IN.to_string());
    };
    let Some(room_id) = occupation.room_id else {
        return Ok(ROOM_UNAVAILABLE.to_string());
    };

    let room: Option<Room> = fetch_by_id(
        records,
        "items/student_accommodation_rooms",
        &room_id,
        &["room_number", "max_capacity", "apartments_blocks_id", "floor_id"],
    )
    .await?;
    let Some(room) = room else {
        return Ok(ROOM_UNAVAILABLE.to_string());
    };

    let info = resolve_room_chain(records, room).await?;
    Ok(render_checkin(&info))
}

async fn resolve_room_chain<R: Records + ?Sized>(
    records: &R,
    room: Room,
) -> Result<CheckinInfo, RecordsError> {
    let mut info = CheckinInfo {
        room_number: room.room_number.map(|v| v.to_string()),
        max_capacity: room.max_capacity.map(|v| v.to_string()),
        ..CheckinInfo::default()
    };

    let mut floor_id = room.floor_id;
    if let Some(block_id) = room.apartments_blocks_id {
        let block: Option<Block> = fetch_by_id(
            records,
            "items/student_accommodation_apartments_blocks",
            &block_id,
            &["number", "floor_id"],
        )
        .await?;
        if let Some(block) = block {
            info.block_label = Some(
                block.number.map_or_else(|| UNKNOWN.to_string(), |n| n.to_string()),
            );
            // The block's floor reference wins over the room's, even when
            // the block has none.
            floor_id = block.floor_id;
        }
    }

    let mut accommodation_id = None;
    let mut address_id = None;
    if let Some(floor_id) = floor_id {
        let floor: Option<Floor> = fetch_by_id(
            records,
            "items/student_accommodation_floors",
            &floor_id,
            &["floor_number", "accommodation_id", "accommodation_address"],
        )
        .await?;
        if let Some(floor) = floor {
            info.floor_number = floor.floor_number.map(|v| v.to_string());
            accommodation_id = floor.accommodation_id;
            address_id = floor.accommodation_address;
        }
    }

    if let Some(accommodation_id) = accommodation_id {
        let accommodation: Option<Accommodation> = fetch_by_id(
            records,
            "items/student_accommodation",
            &accommodation_id,
            &["name", "type"],
        )
        .await?;
        if let Some(accommodation) = accommodation {
            info.accommodation_name = accommodation.name;
            if let Some(type_id) = accommodation.type_id {
                let kind: Option<AccommodationType> = fetch_by_id(
                    records,
                    "items/student_accommodation_type",
                    &type_id,
                    &["name"],
                )
                .await?;
                if let Some(kind) = kind {
                    info.accommodation_type = kind.name;
                }
            }
        }
    }

    if let Some(address_id) = address_id {
        let address: Option<Address> = fetch_by_id(
            records,
            "items/student_accommodation_addresses",
            &address_id,
            &["city", "street", "building_number", "house_structure", "corpus"],
        )
        .await?;
        if let Some(address) = address {
            info.address = compose_address(&address);
        }
    }

    Ok(info)
}

/// Compose a one-line address, skipping empty parts but keeping the fixed
/// order: city, street, house, structure, corpus.
fn compose_address(address: &Address) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(city) = non_empty_str(&address.city) {
        parts.push(city.to_string());
    }
    if let Some(street) = non_empty_str(&address.street) {
        parts.push(street.to_string());
    }
    if let Some(number) = non_empty(&address.building_number) {
        parts.push(format!("д. {number}"));
    }
    if let Some(structure) = non_empty(&address.house_structure) {
        parts.push(format!("стр. {structure}"));
    }
    if let Some(corpus) = non_empty(&address.corpus) {
        parts.push(format!("корп. {corpus}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn non_empty_str(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn non_empty(value: &Option<Scalar>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).map(|v| v.to_string())
}

fn render_checkin(info: &CheckinInfo) -> String {
    let mut text = String::from("✅ Вы заселены!\n\n");
    writeln!(
        text,
        "Общежитие: {}",
        info.accommodation_name.as_deref().unwrap_or(UNKNOWN)
    )
    .unwrap();
    writeln!(
        text,
        "Тип: {}",
        info.accommodation_type.as_deref().unwrap_or(UNKNOWN)
    )
    .unwrap();
    writeln!(text, "Адрес: {}", info.address.as_deref().unwrap_or(UNKNOWN))
        .unwrap();
    writeln!(text, "Этаж: {}", info.floor_number.as_deref().unwrap_or(UNKNOWN))
        .unwrap();
    if let Some(block) = &info.block_label {
        writeln!(text, "Квартира/Блок: {block}").unwrap();
    }
    writeln!(text, "Комната: {}", info.room_number.as_deref().unwrap_or(UNKNOWN))
        .unwrap();
    write!(
        text,
        "Вместимость комнаты: {} чел.",
        info.max_capacity.as_deref().unwrap_or(UNKNOWN)
    )
    .unwrap();
    text
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::directus::testing::FakeRecords;
    use crate::models::Scalar;

    fn linked(records: FakeRecords) -> FakeRecords {
        records.with("items/telegram_user_links", json!([{ "user_id": "u-1" }]))
    }

    #[tokio::test]
    async fn unlinked_account_stops_after_the_link_query() {
        let records =
            FakeRecords::new().with("items/telegram_user_links", json!([]));
        let text = checkin_status(&records, UserId(7)).await.unwrap();
        assert_eq!(text, NOT_LINKED);
        assert_eq!(records.request_count(), 1);
    }

    #[tokio::test]
    async fn missing_occupation_stops_before_room_lookups() {
        let records = linked(FakeRecords::new())
            .with("items/student_accommodation_room_occupations", json!([]));
        let text = checkin_status(&records, UserId(7)).await.unwrap();
        assert_eq!(text, NOT_CHECKED_IN);
        assert_eq!(records.request_count(), 2);
    }

    #[tokio::test]
    async fn missing_room_record_is_a_soft_stop() {
        let records = linked(FakeRecords::new()).with(
            "items/student_accommodation_room_occupations",
            json!([{ "room_id": 5 }]),
        );
        let text = checkin_status(&records, UserId(7)).await.unwrap();
        assert_eq!(text, ROOM_UNAVAILABLE);
    }

    #[tokio::test]
    async fn full_chain_renders_every_line_in_order() {
        let records = linked(FakeRecords::new())
            .with(
                "items/student_accommodation_room_occupations",
                json!([{ "room_id": 5 }]),
            )
            .with(
                "items/student_accommodation_rooms/5",
                json!({
                    "room_number": 12,
                    "max_capacity": 3,
                    "apartments_blocks_id": 2,
                    "floor_id": 9,
                }),
            )
            .with(
                "items/student_accommodation_apartments_blocks/2",
                json!({ "number": "2А", "floor_id": 4 }),
            )
            .with(
                "items/student_accommodation_floors/4",
                json!({
                    "floor_number": 3,
                    "accommodation_id": 1,
                    "accommodation_address": 8,
                }),
            )
            .with(
                "items/student_accommodation/1",
                json!({ "name": "Общежитие №1", "type": 6 }),
            )
            .with(
                "items/student_accommodation_type/6",
                json!({ "name": "Квартирный" }),
            )
            .with(
                "items/student_accommodation_addresses/8",
                json!({ "city": "Москва", "street": "ул. Ленина" }),
            );

        let text = checkin_status(&records, UserId(7)).await.unwrap();
        assert_eq!(
            text,
            "✅ Вы заселены!\n\n\
             Общежитие: Общежитие №1\n\
             Тип: Квартирный\n\
             Адрес: Москва, ул. Ленина\n\
             Этаж: 3\n\
             Квартира/Блок: 2А\n\
             Комната: 12\n\
             Вместимость комнаты: 3 чел."
        );
    }

    #[tokio::test]
    async fn missing_address_degrades_without_losing_the_rest() {
        let records = linked(FakeRecords::new())
            .with(
                "items/student_accommodation_room_occupations",
                json!([{ "room_id": 5 }]),
            )
            .with(
                "items/student_accommodation_rooms/5",
                json!({ "room_number": 12, "max_capacity": 3, "floor_id": 4 }),
            )
            .with(
                "items/student_accommodation_floors/4",
                json!({
                    "floor_number": 3,
                    "accommodation_id": 1,
                    "accommodation_address": 8,
                }),
            )
            .with(
                "items/student_accommodation/1",
                json!({ "name": "Общежитие №1" }),
            );

        let text = checkin_status(&records, UserId(7)).await.unwrap();
        assert!(text.contains("Общежитие: Общежитие №1\n"));
        assert!(text.contains("Этаж: 3\n"));
        assert!(text.contains("Адрес: Неизвестно\n"));
        // No block on the room, so no block line at all.
        assert!(!text.contains("Квартира/Блок"));
    }

    #[tokio::test]
    async fn block_floor_reference_wins_over_the_rooms() {
        let records = linked(FakeRecords::new())
            .with(
                "items/student_accommodation_room_occupations",
                json!([{ "room_id": 5 }]),
            )
            .with(
                "items/student_accommodation_rooms/5",
                json!({
                    "room_number": 12,
                    "max_capacity": 3,
                    "apartments_blocks_id": 2,
                    "floor_id": 9,
                }),
            )
            .with(
                "items/student_accommodation_apartments_blocks/2",
                json!({ "number": 7, "floor_id": 4 }),
            )
            .with(
                "items/student_accommodation_floors/4",
                json!({ "floor_number": 3 }),
            );

        let text = checkin_status(&records, UserId(7)).await.unwrap();
        assert!(text.contains("Этаж: 3\n"));
        assert!(text.contains("Квартира/Блок: 7\n"));
    }

    #[test]
    fn address_keeps_the_fixed_part_order() {
        let address = Address {
            city: Some("Москва".to_string()),
            street: Some("ул. Ленина".to_string()),
            building_number: Some(Scalar::Int(5)),
            house_structure: Some(Scalar::from("1")),
            corpus: Some(Scalar::from("Б")),
        };
        assert_eq!(
            compose_address(&address).unwrap(),
            "Москва, ул. Ленина, д. 5, стр. 1, корп. Б"
        );
    }

    #[test]
    fn address_with_only_city_and_corpus_has_no_stray_separators() {
        let address = Address {
            city: Some("City".to_string()),
            street: None,
            building_number: None,
            house_structure: None,
            corpus: Some(Scalar::from("X")),
        };
        assert_eq!(compose_address(&address).unwrap(), "City, корп. X");
    }

    #[test]
    fn address_with_no_parts_is_unknown() {
        let address = Address {
            city: Some(String::new()),
            street: None,
            building_number: None,
            house_structure: Some(Scalar::from(" ")),
            corpus: None,
        };
        assert_eq!(compose_address(&address), None);
    }

    #[test]
    fn empty_chain_renders_placeholders_everywhere() {
        assert_eq!(
            render_checkin(&CheckinInfo::default()),
            "✅ Вы заселены!\n\n\
             Общежитие: Неизвестно\n\
             Тип: Неизвестно\n\
             Адрес: Неизвестно\n\
             Этаж: Неизвестно\n\
             Комната: Неизвестно\n\
             Вместимость комнаты: Неизвестно чел."
        );
    }
}

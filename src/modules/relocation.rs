//! Relocation status: finds the user's most recent relocation application,
//! counts competing applications and, for a finished swap, resolves the
//! counterpart student and both accommodations.

use std::fmt::Write;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use teloxide::prelude::*;
use teloxide::types::UserId;

use crate::common::{error_boundary, BotEnv, UpdateHandler, UNKNOWN};
use crate::directus::{
    eq_filter, fetch_all, fetch_by_id, Query, Records, RecordsError,
};
use crate::models::{
    Accommodation, DirectusUser, Relocation, RelocationApplication,
    RelocationMatch, Scalar,
};
use crate::modules::checkin::linked_user;
use crate::utils::BotExt;

pub const BUTTON: &str = "Переселение";

const NOT_LINKED: &str = "❌ Ваш Telegram аккаунт не привязан к системе. \
                          Пожалуйста, привяжите аккаунт.";
const NO_APPLICATIONS: &str = "ℹ️ У вас нет активных заявок на переселение. \
                               Вы можете создать заявку в личном кабинете.";
const RELOCATION_FAILED: &str = "⚠️ Не удалось получить информацию о \
                                 переселении. Пожалуйста, попробуйте позже.";
const UNKNOWN_USER: &str = "Неизвестный пользователь";

pub fn message_handler() -> UpdateHandler {
    dptree::filter(|msg: Message| msg.text() == Some(BUTTON))
        .endpoint(handle_status)
}

async fn handle_status(bot: Bot, env: Arc<BotEnv>, msg: Message) -> Result<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    log::info!("Relocation request from user {}", user.id);
    let text = error_boundary(
        "relocation status",
        RELOCATION_FAILED,
        relocation_status(&env.directus, user.id).await,
    );
    bot.reply_message(&msg, text).await?;
    Ok(())
}

#[derive(Debug, Default)]
struct RelocationSummary {
    relocation_name: Option<String>,
    status: Option<String>,
    interest_count: usize,
    swap: Option<SwapPartner>,
}

#[derive(Debug, Default)]
struct SwapPartner {
    from_accommodation: Option<String>,
    to_accommodation: Option<String>,
    partner_name: Option<String>,
}

pub async fn relocation_status<R: Records + ?Sized>(
    records: &R,
    user_id: UserId,
) -> Result<String> {
    let Some(link) = linked_user(records, user_id).await? else {
        return Ok(NOT_LINKED.to_string());
    };

    let applications: Vec<RelocationApplication> = fetch_all(
        records,
        "items/student_relocation_applications",
        Query::new()
            .filter(eq_filter("user_created", &link.user_id))
            .fields(&[
                "id",
                "status",
                "student_relocation_id",
                "student_accommodation_id_from",
                "date_created",
            ])
            .sort("-date_created"),
    )
    .await?;
    let Some(application) = most_recent(&applications) else {
        return Ok(NO_APPLICATIONS.to_string());
    };

    let mut summary = RelocationSummary {
        status: application.status.clone(),
        ..RelocationSummary::default()
    };

    if let Some(relocation_id) = &application.student_relocation_id {
        let relocation: Option<Relocation> = fetch_by_id(
            records,
            "items/student_relocation",
            relocation_id,
            &["name"],
        )
        .await?;
        if let Some(relocation) = relocation {
            summary.relocation_name = relocation.name;
        }
    }

    let matches: Vec<RelocationMatch> = fetch_all(
        records,
        "items/student_relocation_applications_match",
        Query::new()
            .filter(eq_filter("relocation_applications_id_to", &application.id))
            .fields(&["id", "status"]),
    )
    .await?;
    summary.interest_count = matches.len();

    // The first approved match, in returned order, is the authoritative
    // pairing. It only matters once the application has ended.
    if summary.status.as_deref() == Some("ended") {
        if let Some(approved) =
            matches.iter().find(|m| m.status.as_deref() == Some("approved"))
        {
            summary.swap = resolve_swap(records, application, approved).await?;
        }
    }

    Ok(render_relocation(&summary))
}

async fn resolve_swap<R: Records + ?Sized>(
    records: &R,
    application: &RelocationApplication,
    approved: &RelocationMatch,
) -> Result<Option<SwapPartner>, RecordsError> {
    #[derive(Deserialize, Debug)]
    struct MatchDetail {
        relocation_applications_id_from: Option<Scalar>,
    }

    #[derive(Deserialize, Debug)]
    struct CounterApplication {
        student_accommodation_id_from: Option<Scalar>,
        user_created: Option<Scalar>,
    }

    let detail: Option<MatchDetail> = fetch_by_id(
        records,
        "items/student_relocation_applications_match",
        &approved.id,
        &["relocation_applications_id_from"],
    )
    .await?;
    let Some(counter_id) =
        detail.and_then(|d| d.relocation_applications_id_from)
    else {
        return Ok(None);
    };

    let counter: Option<CounterApplication> = fetch_by_id(
        records,
        "items/student_relocation_applications",
        &counter_id,
        &["student_accommodation_id_from", "user_created"],
    )
    .await?;
    let Some(counter) = counter else {
        return Ok(None);
    };

    let mut swap = SwapPartner::default();
    if let Some(id) = &counter.student_accommodation_id_from {
        swap.from_accommodation = accommodation_name(records, id).await?;
    }
    if let Some(id) = &application.student_accommodation_id_from {
        swap.to_accommodation = accommodation_name(records, id).await?;
    }
    if let Some(user_id) = &counter.user_created {
        let user: Option<DirectusUser> =
            fetch_by_id(records, "users", user_id, &["first_name", "last_name"])
                .await?;
        swap.partner_name = user.as_ref().and_then(display_name);
    }
    Ok(Some(swap))
}

async fn accommodation_name<R: Records + ?Sized>(
    records: &R,
    id: &Scalar,
) -> Result<Option<String>, RecordsError> {
    let accommodation: Option<Accommodation> =
        fetch_by_id(records, "items/student_accommodation", id, &["name"])
            .await?;
    Ok(accommodation.and_then(|a| a.name))
}

/// The store is asked to sort by `-date_created`, but the pick stays
/// deterministic even if it does not.
fn most_recent(
    applications: &[RelocationApplication],
) -> Option<&RelocationApplication> {
    applications.iter().reduce(|best, candidate| {
        if candidate.date_created > best.date_created {
            candidate
        } else {
            best
        }
    })
}

fn status_text(status: Option<&str>) -> &str {
    match status {
        Some("created") => "Создана заявка на переселение",
        Some("rejected") => "Отклонена заявка",
        Some("ended") => "Заявка на переселение закончена",
        Some("canceled") => "Заявка отменена пользователем",
        Some(other) => other,
        None => "В обработке",
    }
}

fn display_name(user: &DirectusUser) -> Option<String> {
    let name = format!(
        "{} {}",
        user.first_name.as_deref().unwrap_or(""),
        user.last_name.as_deref().unwrap_or("")
    );
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn render_relocation(summary: &RelocationSummary) -> String {
    let mut text = String::from("✅ У вас есть заявка на переселение\n\n");
    writeln!(
        text,
        "Переселение: {}",
        summary.relocation_name.as_deref().unwrap_or(UNKNOWN)
    )
    .unwrap();
    writeln!(text, "Статус: {}", status_text(summary.status.as_deref()))
        .unwrap();
    writeln!(
        text,
        "Количество заявок на вашу комнату: {}",
        summary.interest_count
    )
    .unwrap();
    if let Some(swap) = &summary.swap {
        write!(
            text,
            "\nВы переселяетесь из {} в {}",
            swap.from_accommodation.as_deref().unwrap_or(UNKNOWN),
            swap.to_accommodation.as_deref().unwrap_or(UNKNOWN)
        )
        .unwrap();
        write!(
            text,
            "\nВместе с: {}",
            swap.partner_name.as_deref().unwrap_or(UNKNOWN_USER)
        )
        .unwrap();
    }
    text
}

//! Push notifications delivered to users through the chat transport.

use std::fmt::Write;

use serde::Deserialize;
use teloxide::prelude::*;
use teloxide::types::ChatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Checkin,
    Relocation,
    General,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkin => "checkin",
            Self::Relocation => "relocation",
            Self::General => "general",
        }
    }

    const fn header(self) -> &'static str {
        match self {
            Self::Checkin => "📢 Уведомление о заселении",
            Self::Relocation => "📢 Уведомление о переселении",
            Self::General => "📢 Общее уведомление",
        }
    }
}

pub fn format_notification(
    kind: NotificationKind,
    message: &str,
    status: Option<&str>,
) -> String {
    let mut text = format!("{}\n\n{}", kind.header(), message);
    if let Some(status) = status {
        write!(text, "\n\nСтатус: {status}").unwrap();
    }
    text
}

/// Deliver one notification. Failures are contained here: the caller gets
/// the typed send error back and the chat transport is never retried.
pub async fn send_notification(
    bot: &Bot,
    user_id: ChatId,
    kind: NotificationKind,
    message: &str,
    status: Option<&str>,
) -> Result<(), teloxide::RequestError> {
    match bot
        .send_message(user_id, format_notification(kind, message, status))
        .await
    {
        Ok(_) => {
            log::info!(
                "Notification sent to user {user_id} (type: {})",
                kind.as_str()
            );
            crate::metrics::count_notification(kind.as_str(), true);
            Ok(())
        }
        Err(e) => {
            log::error!("Failed to send notification to user {user_id}: {e}");
            crate::metrics::count_notification(kind.as_str(), false);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_follow_the_category() {
        assert_eq!(
            format_notification(NotificationKind::Checkin, "Ваша комната готова", None),
            "📢 Уведомление о заселении\n\nВаша комната готова"
        );
        assert_eq!(
            format_notification(NotificationKind::Relocation, "Заявка одобрена", None),
            "📢 Уведомление о переселении\n\nЗаявка одобрена"
        );
        assert_eq!(
            format_notification(NotificationKind::General, "Собрание в 18:00", None),
            "📢 Общее уведомление\n\nСобрание в 18:00"
        );
    }

    #[test]
    fn status_line_is_appended_only_when_present() {
        assert_eq!(
            format_notification(
                NotificationKind::Relocation,
                "Заявка обработана",
                Some("approved"),
            ),
            "📢 Уведомление о переселении\n\nЗаявка обработана\n\n\
             Статус: approved"
        );
    }

    #[test]
    fn kinds_deserialize_from_their_wire_names() {
        for (wire, kind) in [
            ("\"checkin\"", NotificationKind::Checkin),
            ("\"relocation\"", NotificationKind::Relocation),
            ("\"general\"", NotificationKind::General),
        ] {
            assert_eq!(
                serde_json::from_str::<NotificationKind>(wire).unwrap(),
                kind
            );
        }
        assert!(serde_json::from_str::<NotificationKind>("\"other\"").is_err());
    }
}

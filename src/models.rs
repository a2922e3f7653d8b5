//! Typed views of the record-store collections. Only the fields the bot
//! actually reads are modelled; the store is free to return more.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A scalar field as returned by the record store. Collections are free to
/// store identifiers and display values as either numbers or strings, so
/// both are accepted and rendered through [`std::fmt::Display`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Str(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

impl Scalar {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Str(value) if value.trim().is_empty())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// Mapping between a Telegram account and a record-store user.
#[derive(Deserialize, Debug)]
pub struct UserLink {
    pub user_id: Scalar,
}

#[derive(Deserialize, Debug)]
pub struct RoomOccupation {
    pub room_id: Option<Scalar>,
}

#[derive(Deserialize, Debug)]
pub struct Room {
    pub room_number: Option<Scalar>,
    pub max_capacity: Option<Scalar>,
    pub apartments_blocks_id: Option<Scalar>,
    pub floor_id: Option<Scalar>,
}

#[derive(Deserialize, Debug)]
pub struct Block {
    pub number: Option<Scalar>,
    pub floor_id: Option<Scalar>,
}

#[derive(Deserialize, Debug)]
pub struct Floor {
    pub floor_number: Option<Scalar>,
    pub accommodation_id: Option<Scalar>,
    pub accommodation_address: Option<Scalar>,
}

#[derive(Deserialize, Debug)]
pub struct Accommodation {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_id: Option<Scalar>,
}

#[derive(Deserialize, Debug)]
pub struct AccommodationType {
    pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Address {
    pub city: Option<String>,
    pub street: Option<String>,
    pub building_number: Option<Scalar>,
    pub house_structure: Option<Scalar>,
    pub corpus: Option<Scalar>,
}

#[derive(Deserialize, Debug)]
pub struct RelocationApplication {
    pub id: Scalar,
    pub status: Option<String>,
    pub student_relocation_id: Option<Scalar>,
    pub student_accommodation_id_from: Option<Scalar>,
    #[serde(default, deserialize_with = "datetime_opt")]
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
pub struct Relocation {
    pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct RelocationMatch {
    pub id: Scalar,
    pub status: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct DirectusUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct BusSchedule {
    pub image: Option<String>,
}

/// The record store emits timestamps both with and without a timezone
/// suffix, depending on its version and configuration.
fn datetime_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        });
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_renders_both_forms() {
        assert_eq!(Scalar::Int(12).to_string(), "12");
        assert_eq!(Scalar::from("2А").to_string(), "2А");
        assert!(Scalar::from("  ").is_empty());
        assert!(!Scalar::Int(0).is_empty());
    }

    #[test]
    fn application_dates_parse_with_and_without_timezone() {
        let with_tz: RelocationApplication = serde_json::from_value(
            serde_json::json!({
                "id": 1,
                "date_created": "2024-03-01T10:00:00.000Z",
            }),
        )
        .unwrap();
        let without_tz: RelocationApplication = serde_json::from_value(
            serde_json::json!({
                "id": 2,
                "date_created": "2024-03-01T10:00:00",
            }),
        )
        .unwrap();
        assert_eq!(with_tz.date_created, without_tz.date_created);
        assert!(with_tz.date_created.is_some());
    }

    #[test]
    fn unparseable_date_degrades_to_none() {
        let application: RelocationApplication = serde_json::from_value(
            serde_json::json!({ "id": 3, "date_created": "yesterday" }),
        )
        .unwrap();
        assert_eq!(application.date_created, None);
    }
}

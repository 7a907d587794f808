//! Write-side row types and column decoders.
//!
//! Read models live in `foodshare_types::models`; the structs here carry the
//! values an insert or update needs and never leave the DB layer's callers.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;

use foodshare_types::enums::{
    AnnouncementStatus, AnnouncementType, ChallengeCategory, ChallengeStatus, ChallengeType,
    Priority, Role, UserStatus,
};
use foodshare_types::models::Attachment;

/// What login needs; the only read path that sees the password hash.
pub struct Credentials {
    pub user_id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
}

pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

pub struct UserUpdate {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

pub struct NewAnnouncement {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub kind: AnnouncementType,
    pub priority: Priority,
    pub status: AnnouncementStatus,
    pub is_pinned: bool,
    pub images: Vec<String>,
    pub attachments: Vec<Attachment>,
}

pub struct AnnouncementUpdate {
    pub title: String,
    pub content: String,
    pub kind: AnnouncementType,
    pub priority: Priority,
    pub status: AnnouncementStatus,
    pub is_pinned: bool,
    pub images: Vec<String>,
    pub attachments: Vec<Attachment>,
}

/// Fields shared by challenge create and update.
pub struct ChallengeInput {
    pub title: String,
    pub description: Option<String>,
    pub challenge_type: ChallengeType,
    pub category: ChallengeCategory,
    pub points: i64,
    pub target_value: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ChallengeStatus,
    pub prize_description: Option<String>,
}

/// Decode a text column into one of the closed enumerations.
pub fn text_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn opt_text_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        _ => Ok(None),
    }
}

/// JSON list column. NULL, blank or unparseable text reads as empty.
pub fn json_list<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<T>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default())
}

/// Serialize a list for a JSON column; an empty list is stored as NULL.
pub fn to_json_column<T: serde::Serialize>(items: &[T]) -> anyhow::Result<Option<String>> {
    if items.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(items)?))
    }
}

pub fn flag(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(row.get::<_, i64>(idx)? != 0)
}

/// Current UTC time, matching SQLite's `datetime('now')`.
pub fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn json_columns_tolerate_garbage() {
        let conn = Connection::open_in_memory().unwrap();
        for (raw, expected) in [
            (None, 0usize),
            (Some(""), 0),
            (Some("not json"), 0),
            (Some("[\"uploads/donations/a.png\",\"uploads/donations/b.png\"]"), 2),
        ] {
            let list: Vec<String> = conn
                .query_row("SELECT ?1", [raw], |row| json_list(row, 0))
                .unwrap();
            assert_eq!(list.len(), expected);
        }
    }

    #[test]
    fn empty_lists_store_null() {
        assert_eq!(to_json_column::<String>(&[]).unwrap(), None);
        assert_eq!(
            to_json_column(&["a".to_string()]).unwrap().as_deref(),
            Some("[\"a\"]")
        );
    }

    #[test]
    fn bad_enum_text_is_a_conversion_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 'superuser'", [], |row| text_enum::<Role>(row, 0))
            .unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(0, _, _)));

        let none: Option<Role> = conn
            .query_row("SELECT NULL", [], |row| opt_text_enum(row, 0))
            .unwrap();
        assert_eq!(none, None);
    }
}

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use foodshare_types::enums::{AnnouncementStatus, AnnouncementType, Priority};
use foodshare_types::models::{Announcement, Paged};
use foodshare_types::stats::AnnouncementStats;

use crate::filter::{Filter, ListQuery, Page};
use crate::models::{
    AnnouncementUpdate, NewAnnouncement, flag, json_list, text_enum, to_json_column,
};
use crate::table_exists;

const ANNOUNCEMENT_COLUMNS: &str = "a.id, a.user_id, u.full_name, a.title, a.content, a.type, \
     a.priority, a.status, a.is_pinned, a.images, a.attachments, a.likes_count, \
     a.comments_count, a.shares_count, a.created_at, a.updated_at";

const ANNOUNCEMENT_FROM: &str = "announcements a JOIN user_accounts u ON u.user_id = a.user_id";

fn map_announcement(row: &Row<'_>) -> rusqlite::Result<Announcement> {
    Ok(Announcement {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author_name: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        kind: text_enum(row, 5)?,
        priority: text_enum(row, 6)?,
        status: text_enum(row, 7)?,
        is_pinned: flag(row, 8)?,
        images: json_list(row, 9)?,
        attachments: json_list(row, 10)?,
        likes_count: row.get(11)?,
        comments_count: row.get(12)?,
        shares_count: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct AnnouncementFilter {
    pub status: Option<AnnouncementStatus>,
    pub kind: Option<AnnouncementType>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
}

impl AnnouncementFilter {
    fn build(&self) -> Filter {
        Filter::new()
            .eq_str("a.status", self.status.map(AnnouncementStatus::as_str))
            .eq_str("a.type", self.kind.map(AnnouncementType::as_str))
            .eq_str("a.priority", self.priority.map(Priority::as_str))
            .search(&["a.title", "a.content"], self.search.as_deref())
    }
}

pub fn list_announcements(
    conn: &Connection,
    filter: &AnnouncementFilter,
    page: Page,
) -> Result<Paged<Announcement>> {
    if !table_exists(conn, "announcements")? {
        return Ok(Paged::empty(page.number, page.size));
    }
    let filter = filter.build();
    ListQuery {
        select: ANNOUNCEMENT_COLUMNS,
        from: ANNOUNCEMENT_FROM,
        filter: &filter,
        order_by: "a.is_pinned DESC, a.created_at DESC, a.id DESC",
    }
    .fetch(conn, page, map_announcement)
}

pub fn announcement_stats(conn: &Connection) -> Result<AnnouncementStats> {
    if !table_exists(conn, "announcements")? {
        return Ok(AnnouncementStats::default());
    }
    let stats = conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(status = 'published'), 0),
            COALESCE(SUM(status = 'draft'), 0),
            COALESCE(SUM(status = 'archived'), 0),
            COALESCE(SUM(is_pinned != 0), 0),
            COALESCE(SUM(likes_count + comments_count + shares_count), 0),
            COALESCE(SUM(date(created_at) = date('now')), 0)
         FROM announcements",
        [],
        |row| {
            Ok(AnnouncementStats {
                total: row.get(0)?,
                published: row.get(1)?,
                draft: row.get(2)?,
                archived: row.get(3)?,
                pinned: row.get(4)?,
                total_engagement: row.get(5)?,
                today: row.get(6)?,
            })
        },
    )?;
    Ok(stats)
}

pub fn get_announcement(conn: &Connection, id: i64) -> Result<Option<Announcement>> {
    let found = conn
        .query_row(
            &format!("SELECT {ANNOUNCEMENT_COLUMNS} FROM {ANNOUNCEMENT_FROM} WHERE a.id = ?1"),
            [id],
            map_announcement,
        )
        .optional()?;
    Ok(found)
}

pub fn recent_for_user(conn: &Connection, user_id: i64, limit: u32) -> Result<Vec<Announcement>> {
    if !table_exists(conn, "announcements")? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT {ANNOUNCEMENT_COLUMNS} FROM {ANNOUNCEMENT_FROM}
         WHERE a.user_id = ?1 ORDER BY a.created_at DESC, a.id DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(params![user_id, limit], map_announcement)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_announcement(conn: &Connection, new: &NewAnnouncement) -> Result<i64> {
    conn.execute(
        "INSERT INTO announcements
            (user_id, title, content, type, priority, status, is_pinned, images, attachments)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            new.user_id,
            new.title,
            new.content,
            new.kind.as_str(),
            new.priority.as_str(),
            new.status.as_str(),
            new.is_pinned,
            to_json_column(&new.images)?,
            to_json_column(&new.attachments)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_announcement(conn: &Connection, id: i64, update: &AnnouncementUpdate) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE announcements
         SET title = ?1, content = ?2, type = ?3, priority = ?4, status = ?5, is_pinned = ?6,
             images = ?7, attachments = ?8, updated_at = datetime('now')
         WHERE id = ?9",
        params![
            update.title,
            update.content,
            update.kind.as_str(),
            update.priority.as_str(),
            update.status.as_str(),
            update.is_pinned,
            to_json_column(&update.images)?,
            to_json_column(&update.attachments)?,
            id,
        ],
    )?;
    Ok(changed > 0)
}

/// Flip the pin flag. Returns the new state, or `None` if there is no such row.
pub fn toggle_pin(conn: &Connection, id: i64) -> Result<Option<bool>> {
    let changed = conn.execute(
        "UPDATE announcements
         SET is_pinned = CASE WHEN is_pinned != 0 THEN 0 ELSE 1 END, updated_at = datetime('now')
         WHERE id = ?1",
        [id],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    let pinned: i64 =
        conn.query_row("SELECT is_pinned FROM announcements WHERE id = ?1", [id], |row| {
            row.get(0)
        })?;
    Ok(Some(pinned != 0))
}

pub fn set_status(conn: &Connection, id: i64, status: AnnouncementStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE announcements SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(changed > 0)
}

pub fn delete_announcement(conn: &Connection, id: i64) -> Result<Option<Announcement>> {
    let Some(found) = get_announcement(conn, id)? else {
        return Ok(None);
    };
    conn.execute("DELETE FROM announcements WHERE id = ?1", [id])?;
    Ok(Some(found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::users::tests::add as add_user;
    use foodshare_types::enums::{Role, UserStatus};
    use foodshare_types::models::Attachment;

    fn new(user_id: i64, title: &str, status: AnnouncementStatus, pinned: bool) -> NewAnnouncement {
        NewAnnouncement {
            user_id,
            title: title.to_string(),
            content: format!("{title} details"),
            kind: AnnouncementType::Announcement,
            priority: Priority::Medium,
            status,
            is_pinned: pinned,
            images: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn pinned_first_then_newest() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            let admin = add_user(c, "root", Role::Admin, UserStatus::Approved, None);
            let a = insert_announcement(c, &new(admin, "Old pinned", AnnouncementStatus::Published, true))?;
            let b = insert_announcement(c, &new(admin, "Newer", AnnouncementStatus::Published, false))?;
            let d = insert_announcement(c, &new(admin, "Draft", AnnouncementStatus::Draft, false))?;

            let page = list_announcements(c, &AnnouncementFilter::default(), Page::new(1))?;
            let ids: Vec<_> = page.rows.iter().map(|a| a.id).collect();
            assert_eq!(ids, vec![a, d, b]);

            let drafts = AnnouncementFilter {
                status: Some(AnnouncementStatus::Draft),
                ..Default::default()
            };
            assert_eq!(list_announcements(c, &drafts, Page::new(1))?.total, 1);

            assert_eq!(toggle_pin(c, a)?, Some(false));
            assert_eq!(toggle_pin(c, 999)?, None);

            let stats = announcement_stats(c)?;
            assert_eq!(stats.total, 3);
            assert_eq!(stats.published, 2);
            assert_eq!(stats.pinned, 0);
            assert_eq!(stats.today, 3);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn file_lists_round_trip_through_json_columns() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            let admin = add_user(c, "root", Role::Admin, UserStatus::Approved, None);
            let mut a = new(admin, "Cleanup drive", AnnouncementStatus::Published, false);
            a.images = vec!["uploads/announcements/one.png".into()];
            a.attachments = vec![Attachment {
                path: "uploads/announcements/files/minutes.pdf".into(),
                original_name: "minutes.pdf".into(),
                size: 1024,
                kind: "pdf".into(),
            }];
            let id = insert_announcement(c, &a)?;

            let removed = delete_announcement(c, id)?.unwrap();
            assert_eq!(removed.file_paths().len(), 2);
            assert!(get_announcement(c, id)?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn missing_table_degrades_to_empty() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            c.execute_batch("DROP TABLE announcements;")?;
            assert_eq!(announcement_stats(c)?, AnnouncementStats::default());
            assert!(list_announcements(c, &AnnouncementFilter::default(), Page::new(1))?.rows.is_empty());
            Ok(())
        })
        .unwrap();
    }
}

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use foodshare_types::enums::{ChallengeStatus, ProgressFilter};
use foodshare_types::models::{
    Challenge, ChallengeParticipant, Paged, ProgressEntry, ProgressLabel,
};
use foodshare_types::stats::ChallengeStats;

use crate::filter::{Filter, ListQuery, Page};
use crate::models::{ChallengeInput, flag, text_enum};
use crate::stats::{completion_rate, scalar};
use crate::table_exists;

const CHALLENGE_COLUMNS: &str = "c.challenge_id, c.title, c.description, c.challenge_type, \
     c.category, c.points, c.target_value, c.start_date, c.end_date, c.status, c.banner_image, \
     c.prize_description, c.created_by, u.full_name, \
     (SELECT COUNT(*) FROM challenge_participants p WHERE p.challenge_id = c.challenge_id), \
     (SELECT COUNT(*) FROM challenge_participants p \
        WHERE p.challenge_id = c.challenge_id AND p.completed != 0), \
     c.created_at";

const CHALLENGE_FROM: &str = "challenges c LEFT JOIN user_accounts u ON u.user_id = c.created_by";

fn map_challenge(row: &Row<'_>) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        challenge_id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        challenge_type: text_enum(row, 3)?,
        category: text_enum(row, 4)?,
        points: row.get(5)?,
        target_value: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        status: text_enum(row, 9)?,
        banner_image: row.get(10)?,
        prize_description: row.get(11)?,
        created_by: row.get(12)?,
        creator_name: row.get(13)?,
        participant_count: row.get(14)?,
        completed_count: row.get(15)?,
        created_at: row.get(16)?,
    })
}

const PARTICIPANT_COLUMNS: &str = "p.participant_id, p.challenge_id, p.user_id, u.full_name, \
     u.email, u.profile_img, p.progress, p.completed, p.completed_at, p.points_earned, \
     p.joined_at, c.target_value";

const PARTICIPANT_FROM: &str = "challenge_participants p \
     JOIN user_accounts u ON u.user_id = p.user_id \
     JOIN challenges c ON c.challenge_id = p.challenge_id";

fn map_participant(row: &Row<'_>) -> rusqlite::Result<ChallengeParticipant> {
    Ok(ChallengeParticipant {
        participant_id: row.get(0)?,
        challenge_id: row.get(1)?,
        user_id: row.get(2)?,
        full_name: row.get(3)?,
        email: row.get(4)?,
        profile_img: row.get(5)?,
        progress: row.get(6)?,
        completed: flag(row, 7)?,
        completed_at: row.get(8)?,
        points_earned: row.get(9)?,
        joined_at: row.get(10)?,
        target_value: row.get(11)?,
    })
}

const PROGRESS_COLUMNS: &str = "p.user_id, u.full_name, u.email, c.challenge_id, c.title, \
     c.category, c.target_value, c.points, p.progress, p.completed, p.points_earned, \
     p.joined_at, p.completed_at";

fn map_progress(row: &Row<'_>) -> rusqlite::Result<ProgressEntry> {
    let target_value: i64 = row.get(6)?;
    let progress: i64 = row.get(8)?;
    let completed = flag(row, 9)?;
    Ok(ProgressEntry {
        user_id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        challenge_id: row.get(3)?,
        challenge_title: row.get(4)?,
        category: text_enum(row, 5)?,
        target_value,
        challenge_points: row.get(7)?,
        progress,
        completed,
        points_earned: row.get(10)?,
        joined_at: row.get(11)?,
        completed_at: row.get(12)?,
        status: ProgressLabel::derive(completed, progress, target_value),
    })
}

fn challenge_tables_exist(conn: &Connection) -> Result<bool> {
    Ok(table_exists(conn, "challenges")? && table_exists(conn, "challenge_participants")?)
}

pub fn challenge_stats(conn: &Connection) -> Result<ChallengeStats> {
    if !challenge_tables_exist(conn)? {
        return Ok(ChallengeStats::default());
    }
    let (total, active, completed, draft): (i64, i64, i64, i64) = conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(status = 'active'), 0),
            COALESCE(SUM(status = 'completed'), 0),
            COALESCE(SUM(status = 'draft'), 0)
         FROM challenges",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;
    let participants = scalar(conn, "SELECT COUNT(*) FROM challenge_participants", [])?;
    let finished = scalar(
        conn,
        "SELECT COUNT(*) FROM challenge_participants WHERE completed != 0",
        [],
    )?;
    Ok(ChallengeStats {
        total,
        active,
        completed,
        draft,
        total_participants: participants,
        avg_completion: completion_rate(finished, participants),
    })
}

pub fn list_challenges(
    conn: &Connection,
    status: Option<ChallengeStatus>,
    page: Page,
) -> Result<Paged<Challenge>> {
    if !challenge_tables_exist(conn)? {
        return Ok(Paged::empty(page.number, page.size));
    }
    let filter = Filter::new().eq_str("c.status", status.map(ChallengeStatus::as_str));
    ListQuery {
        select: CHALLENGE_COLUMNS,
        from: CHALLENGE_FROM,
        filter: &filter,
        order_by: "c.created_at DESC, c.challenge_id DESC",
    }
    .fetch(conn, page, map_challenge)
}

pub fn get_challenge(conn: &Connection, challenge_id: i64) -> Result<Option<Challenge>> {
    let found = conn
        .query_row(
            &format!("SELECT {CHALLENGE_COLUMNS} FROM {CHALLENGE_FROM} WHERE c.challenge_id = ?1"),
            [challenge_id],
            map_challenge,
        )
        .optional()?;
    Ok(found)
}

pub fn insert_challenge(
    conn: &Connection,
    input: &ChallengeInput,
    banner_image: Option<&str>,
    created_by: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO challenges
            (title, description, challenge_type, category, points, target_value,
             start_date, end_date, status, banner_image, prize_description, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            input.title,
            input.description,
            input.challenge_type.as_str(),
            input.category.as_str(),
            input.points,
            input.target_value,
            input.start_date,
            input.end_date,
            input.status.as_str(),
            banner_image,
            input.prize_description,
            created_by,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Update a challenge. A `None` banner keeps the stored one.
pub fn update_challenge(
    conn: &Connection,
    challenge_id: i64,
    input: &ChallengeInput,
    banner_image: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE challenges
         SET title = ?1, description = ?2, challenge_type = ?3, category = ?4, points = ?5,
             target_value = ?6, start_date = ?7, end_date = ?8, status = ?9,
             banner_image = COALESCE(?10, banner_image), prize_description = ?11,
             updated_at = datetime('now')
         WHERE challenge_id = ?12",
        params![
            input.title,
            input.description,
            input.challenge_type.as_str(),
            input.category.as_str(),
            input.points,
            input.target_value,
            input.start_date,
            input.end_date,
            input.status.as_str(),
            banner_image,
            input.prize_description,
            challenge_id,
        ],
    )?;
    Ok(changed > 0)
}

pub fn set_status(conn: &Connection, challenge_id: i64, status: ChallengeStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE challenges SET status = ?1, updated_at = datetime('now') WHERE challenge_id = ?2",
        params![status.as_str(), challenge_id],
    )?;
    Ok(changed > 0)
}

/// Delete a challenge and, through the cascade, its participants.
pub fn delete_challenge(conn: &Connection, challenge_id: i64) -> Result<Option<Challenge>> {
    let Some(found) = get_challenge(conn, challenge_id)? else {
        return Ok(None);
    };
    conn.execute("DELETE FROM challenges WHERE challenge_id = ?1", [challenge_id])?;
    Ok(Some(found))
}

/// Completed first, then furthest along, then earliest to join.
pub fn participants(conn: &Connection, challenge_id: i64) -> Result<Vec<ChallengeParticipant>> {
    if !challenge_tables_exist(conn)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM {PARTICIPANT_FROM}
         WHERE p.challenge_id = ?1
         ORDER BY p.completed DESC, p.progress DESC, p.joined_at ASC, p.participant_id ASC"
    ))?;
    let rows = stmt
        .query_map([challenge_id], map_participant)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_participant(conn: &Connection, participant_id: i64) -> Result<Option<ChallengeParticipant>> {
    let found = conn
        .query_row(
            &format!("SELECT {PARTICIPANT_COLUMNS} FROM {PARTICIPANT_FROM} WHERE p.participant_id = ?1"),
            [participant_id],
            map_participant,
        )
        .optional()?;
    Ok(found)
}

/// Record a participant's progress.
///
/// Progress only moves forward. Reaching the target marks the participant
/// complete, stamps `completed_at` the first time, and awards the points.
pub fn record_progress(
    conn: &Connection,
    participant_id: i64,
    progress: i64,
) -> Result<Option<ChallengeParticipant>> {
    // Every SET expression sees the row as it was before this statement.
    let changed = conn.execute(
        "UPDATE challenge_participants
         SET progress = MAX(progress, ?1),
             completed = CASE
                 WHEN completed != 0 THEN 1
                 WHEN MAX(progress, ?1) >= (SELECT target_value FROM challenges c
                                            WHERE c.challenge_id = challenge_participants.challenge_id)
                 THEN 1 ELSE 0 END,
             completed_at = CASE
                 WHEN completed_at IS NOT NULL THEN completed_at
                 WHEN MAX(progress, ?1) >= (SELECT target_value FROM challenges c
                                            WHERE c.challenge_id = challenge_participants.challenge_id)
                 THEN datetime('now') ELSE NULL END,
             points_earned = CASE
                 WHEN completed != 0
                      OR MAX(progress, ?1) >= (SELECT target_value FROM challenges c
                                               WHERE c.challenge_id = challenge_participants.challenge_id)
                 THEN (SELECT points FROM challenges c
                       WHERE c.challenge_id = challenge_participants.challenge_id)
                 ELSE points_earned END
         WHERE participant_id = ?2",
        params![progress, participant_id],
    )?;
    if changed == 0 {
        return Ok(None);
    }

    debug!("Recorded progress {} for participant {}", progress, participant_id);
    get_participant(conn, participant_id)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressQuery {
    pub challenge_id: Option<i64>,
    pub status: Option<ProgressFilter>,
}

/// Every participation across challenges, newest joins first.
pub fn progress_entries(conn: &Connection, query: ProgressQuery) -> Result<Vec<ProgressEntry>> {
    if !challenge_tables_exist(conn)? {
        return Ok(Vec::new());
    }
    let mut filter = Filter::new().eq("c.challenge_id", query.challenge_id);
    filter = match query.status {
        Some(ProgressFilter::Completed) => filter.always("p.completed != 0"),
        Some(ProgressFilter::InProgress) => filter.always("p.completed = 0"),
        None => filter,
    };
    ListQuery {
        select: PROGRESS_COLUMNS,
        from: PARTICIPANT_FROM,
        filter: &filter,
        order_by: "p.joined_at DESC, p.participant_id DESC",
    }
    .fetch_all(conn, u32::MAX, map_progress)
}

pub fn recent_participations(conn: &Connection, user_id: i64, limit: u32) -> Result<Vec<ProgressEntry>> {
    if !challenge_tables_exist(conn)? {
        return Ok(Vec::new());
    }
    let filter = Filter::new().predicate("p.user_id = ?", vec![Value::Integer(user_id)]);
    ListQuery {
        select: PROGRESS_COLUMNS,
        from: PARTICIPANT_FROM,
        filter: &filter,
        order_by: "p.joined_at DESC, p.participant_id DESC",
    }
    .fetch_all(conn, limit, map_progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::users::tests::add as add_user;
    use chrono::NaiveDate;
    use foodshare_types::enums::{ChallengeCategory, ChallengeType, Role, UserStatus};

    fn input(title: &str, target_value: i64) -> ChallengeInput {
        ChallengeInput {
            title: title.to_string(),
            description: None,
            challenge_type: ChallengeType::Weekly,
            category: ChallengeCategory::WasteReduction,
            points: 25,
            target_value,
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 7).unwrap(),
            status: ChallengeStatus::Active,
            prize_description: None,
        }
    }

    fn join(conn: &Connection, challenge_id: i64, user_id: i64, progress: i64, joined_at: &str) -> i64 {
        conn.execute(
            "INSERT INTO challenge_participants (challenge_id, user_id, progress, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![challenge_id, user_id, progress, joined_at],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn progress_is_monotonic_and_completes_once() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            let admin = add_user(c, "root", Role::Admin, UserStatus::Approved, None);
            let ana = add_user(c, "ana", Role::Resident, UserStatus::Approved, None);
            let ch = insert_challenge(c, &input("Compost week", 5), None, admin)?;
            let p = join(c, ch, ana, 0, "2025-06-01 09:00:00");

            let step = record_progress(c, p, 3)?.unwrap();
            assert_eq!(step.progress, 3);
            assert!(!step.completed);
            assert_eq!(step.points_earned, 0);

            let back = record_progress(c, p, 1)?.unwrap();
            assert_eq!(back.progress, 3);

            let done = record_progress(c, p, 5)?.unwrap();
            assert!(done.completed);
            assert_eq!(done.points_earned, 25);
            let stamped = done.completed_at.unwrap();

            let again = record_progress(c, p, 9)?.unwrap();
            assert_eq!(again.completed_at, Some(stamped));
            assert_eq!(again.progress, 9);

            assert!(record_progress(c, 999, 1)?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn completing_writes_the_row_once() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            let admin = add_user(c, "root", Role::Admin, UserStatus::Approved, None);
            let ana = add_user(c, "ana", Role::Resident, UserStatus::Approved, None);
            let ch = insert_challenge(c, &input("Compost week", 5), None, admin)?;
            let p = join(c, ch, ana, 4, "2025-06-01 09:00:00");
            c.execute_batch(
                "CREATE TEMP TABLE participant_writes (n INTEGER);
                 CREATE TEMP TRIGGER count_participant_writes
                 AFTER UPDATE ON challenge_participants
                 BEGIN INSERT INTO participant_writes VALUES (1); END;",
            )?;

            let done = record_progress(c, p, 5)?.unwrap();
            assert!(done.completed);
            assert_eq!(done.points_earned, 25);
            let writes: i64 = c.query_row("SELECT COUNT(*) FROM participant_writes", [], |r| r.get(0))?;
            assert_eq!(writes, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn participants_order_and_stats() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            let admin = add_user(c, "root", Role::Admin, UserStatus::Approved, None);
            let ch = insert_challenge(c, &input("Share a meal", 4), None, admin)?;
            let a = add_user(c, "ana", Role::Resident, UserStatus::Approved, None);
            let b = add_user(c, "ben", Role::Resident, UserStatus::Approved, None);
            let d = add_user(c, "dan", Role::Resident, UserStatus::Approved, None);
            join(c, ch, a, 2, "2025-06-01 09:00:00");
            join(c, ch, b, 2, "2025-06-01 08:00:00");
            let pd = join(c, ch, d, 0, "2025-06-02 08:00:00");
            record_progress(c, pd, 4)?;

            let order: Vec<_> = participants(c, ch)?.iter().map(|p| p.user_id).collect();
            assert_eq!(order, vec![d, b, a]);

            let stats = challenge_stats(c)?;
            assert_eq!(stats.total, 1);
            assert_eq!(stats.active, 1);
            assert_eq!(stats.total_participants, 3);
            assert_eq!(stats.avg_completion, 33.3);

            let listed = list_challenges(c, Some(ChallengeStatus::Active), Page::new(1))?;
            assert_eq!(listed.rows[0].participant_count, 3);
            assert_eq!(listed.rows[0].completed_count, 1);
            assert_eq!(listed.rows[0].creator_name.as_deref(), Some("root Dela Cruz"));

            let done = progress_entries(
                c,
                ProgressQuery {
                    challenge_id: Some(ch),
                    status: Some(ProgressFilter::Completed),
                },
            )?;
            assert_eq!(done.len(), 1);
            assert_eq!(done[0].status, ProgressLabel::Completed);

            let open = progress_entries(
                c,
                ProgressQuery {
                    challenge_id: None,
                    status: Some(ProgressFilter::InProgress),
                },
            )?;
            assert_eq!(open.len(), 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn empty_challenges_report_zero_completion() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.with_conn(challenge_stats).unwrap();
        assert_eq!(stats.total_participants, 0);
        assert_eq!(stats.avg_completion, 0.0);
    }

    #[test]
    fn update_keeps_banner_unless_replaced() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            let admin = add_user(c, "root", Role::Admin, UserStatus::Approved, None);
            let ch = insert_challenge(c, &input("Banner", 1), Some("uploads/challenges/a.png"), admin)?;
            update_challenge(c, ch, &input("Renamed", 1), None)?;
            let found = get_challenge(c, ch)?.unwrap();
            assert_eq!(found.title, "Renamed");
            assert_eq!(found.banner_image.as_deref(), Some("uploads/challenges/a.png"));

            update_challenge(c, ch, &input("Renamed", 1), Some("uploads/challenges/b.png"))?;
            let found = get_challenge(c, ch)?.unwrap();
            assert_eq!(found.banner_image.as_deref(), Some("uploads/challenges/b.png"));
            Ok(())
        })
        .unwrap();
    }
}

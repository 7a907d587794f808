//! Queries behind the reports page and its exports.

use std::collections::HashMap;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use rusqlite::{Connection, Row, params};

use foodshare_types::reports::{
    ChallengeReportRow, DonationReportRow, EngagementReportRow, NewsfeedReportRow, UserReportRow,
};
use foodshare_types::stats::ReportStats;

use crate::models::text_enum;
use crate::stats::scalar;
use crate::table_exists;

/// Longest window, in days, the per-day engagement report will span.
pub const MAX_REPORT_DAYS: i64 = 366;

/// Inclusive report window; both ends are always set for exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportRange {
    /// Days covered, both ends included. Zero when `start` is after `end`.
    pub fn days(&self) -> i64 {
        if self.start > self.end {
            return 0;
        }
        self.end.signed_duration_since(self.start).num_days() + 1
    }

    fn bounds(&self) -> (String, String) {
        (
            self.start.format("%Y-%m-%d").to_string(),
            self.end.format("%Y-%m-%d").to_string(),
        )
    }
}

pub fn report_stats(conn: &Connection) -> Result<ReportStats> {
    let mut stats = ReportStats {
        total_users: scalar(
            conn,
            "SELECT COUNT(*) FROM user_accounts WHERE role = 'resident'",
            [],
        )?,
        total_donations: scalar(conn, "SELECT COUNT(*) FROM food_donations", [])?,
        ..Default::default()
    };
    if table_exists(conn, "recipes_tips")? {
        stats.total_posts = scalar(conn, "SELECT COUNT(*) FROM recipes_tips", [])?;
    }
    if table_exists(conn, "challenges")? {
        stats.total_challenges = scalar(conn, "SELECT COUNT(*) FROM challenges", [])?;
    }
    Ok(stats)
}

fn collect<T, F>(conn: &Connection, sql: &str, range: ReportRange, map: F) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let (start, end) = range.bounds();
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![start, end], map)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn users_report(conn: &Connection, range: ReportRange) -> Result<Vec<UserReportRow>> {
    collect(
        conn,
        "SELECT user_id, full_name, email, role, status, created_at, updated_at
         FROM user_accounts
         WHERE date(created_at) BETWEEN ?1 AND ?2
         ORDER BY created_at DESC, user_id DESC",
        range,
        |row| {
            Ok(UserReportRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                role: text_enum(row, 3)?,
                status: text_enum(row, 4)?,
                registered_at: row.get(5)?,
                last_activity: row.get(6)?,
            })
        },
    )
}

pub fn donations_report(conn: &Connection, range: ReportRange) -> Result<Vec<DonationReportRow>> {
    collect(
        conn,
        "SELECT d.id, d.title, u.full_name, d.food_type, d.status, d.views_count, d.created_at
         FROM food_donations d JOIN user_accounts u ON u.user_id = d.user_id
         WHERE date(d.created_at) BETWEEN ?1 AND ?2
         ORDER BY d.created_at DESC, d.id DESC",
        range,
        |row| {
            Ok(DonationReportRow {
                id: row.get(0)?,
                title: row.get(1)?,
                donor: row.get(2)?,
                food_type: row.get(3)?,
                status: text_enum(row, 4)?,
                views: row.get(5)?,
                created_at: row.get(6)?,
            })
        },
    )
}

pub fn newsfeeds_report(conn: &Connection, range: ReportRange) -> Result<Vec<NewsfeedReportRow>> {
    if !table_exists(conn, "recipes_tips")? {
        return Ok(Vec::new());
    }
    collect(
        conn,
        "SELECT r.id, r.post_type, r.title, u.full_name, r.likes_count, r.comments_count,
                r.shares_count, r.views_count, r.created_at
         FROM recipes_tips r JOIN user_accounts u ON u.user_id = r.user_id
         WHERE date(r.created_at) BETWEEN ?1 AND ?2
         ORDER BY r.created_at DESC, r.id DESC",
        range,
        |row| {
            Ok(NewsfeedReportRow {
                id: row.get(0)?,
                post_type: text_enum(row, 1)?,
                title: row.get(2)?,
                author: row.get(3)?,
                likes: row.get(4)?,
                comments: row.get(5)?,
                shares: row.get(6)?,
                views: row.get(7)?,
                created_at: row.get(8)?,
            })
        },
    )
}

pub fn challenges_report(conn: &Connection, range: ReportRange) -> Result<Vec<ChallengeReportRow>> {
    if !table_exists(conn, "challenges")? || !table_exists(conn, "challenge_participants")? {
        return Ok(Vec::new());
    }
    collect(
        conn,
        "SELECT c.challenge_id, c.title, c.challenge_type, c.category,
                (SELECT COUNT(*) FROM challenge_participants p WHERE p.challenge_id = c.challenge_id),
                (SELECT COUNT(*) FROM challenge_participants p
                   WHERE p.challenge_id = c.challenge_id AND p.completed != 0),
                c.points, c.status, c.start_date, c.end_date
         FROM challenges c
         WHERE date(c.created_at) BETWEEN ?1 AND ?2
         ORDER BY c.created_at DESC, c.challenge_id DESC",
        range,
        |row| {
            Ok(ChallengeReportRow {
                id: row.get(0)?,
                title: row.get(1)?,
                challenge_type: text_enum(row, 2)?,
                category: text_enum(row, 3)?,
                participants: row.get(4)?,
                completed: row.get(5)?,
                points: row.get(6)?,
                status: text_enum(row, 7)?,
                start_date: row.get(8)?,
                end_date: row.get(9)?,
            })
        },
    )
}

fn per_day(conn: &Connection, sql: &str, range: ReportRange) -> Result<HashMap<NaiveDate, i64>> {
    let pairs = collect(conn, sql, range, |row| {
        Ok((row.get::<_, NaiveDate>(0)?, row.get::<_, i64>(1)?))
    })?;
    Ok(pairs.into_iter().collect())
}

/// One row per calendar day in the range, zeros included.
pub fn engagement_report(conn: &Connection, range: ReportRange) -> Result<Vec<EngagementReportRow>> {
    if range.start > range.end {
        return Ok(Vec::new());
    }
    if range.days() > MAX_REPORT_DAYS {
        bail!("Report range cannot exceed {MAX_REPORT_DAYS} days");
    }

    let users = per_day(
        conn,
        "SELECT date(created_at) AS day, COUNT(*) FROM user_accounts
         WHERE date(created_at) BETWEEN ?1 AND ?2 GROUP BY day",
        range,
    )?;
    let donations = per_day(
        conn,
        "SELECT date(created_at) AS day, COUNT(*) FROM food_donations
         WHERE date(created_at) BETWEEN ?1 AND ?2 GROUP BY day",
        range,
    )?;
    let (posts, engagement) = if table_exists(conn, "recipes_tips")? {
        (
            per_day(
                conn,
                "SELECT date(created_at) AS day, COUNT(*) FROM recipes_tips
                 WHERE date(created_at) BETWEEN ?1 AND ?2 GROUP BY day",
                range,
            )?,
            per_day(
                conn,
                "SELECT date(created_at) AS day,
                        COALESCE(SUM(likes_count + comments_count + shares_count), 0)
                 FROM recipes_tips
                 WHERE date(created_at) BETWEEN ?1 AND ?2 GROUP BY day",
                range,
            )?,
        )
    } else {
        (HashMap::new(), HashMap::new())
    };

    let mut rows = Vec::new();
    let mut next = Some(range.start);
    while let Some(day) = next.filter(|d| *d <= range.end) {
        rows.push(EngagementReportRow {
            date: day,
            new_users: users.get(&day).copied().unwrap_or(0),
            new_donations: donations.get(&day).copied().unwrap_or(0),
            new_posts: posts.get(&day).copied().unwrap_or(0),
            engagement: engagement.get(&day).copied().unwrap_or(0),
        });
        next = day.succ_opt();
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::donations::tests::add as add_donation;
    use crate::feed::tests::add_post;
    use crate::users::tests::add as add_user;
    use foodshare_types::enums::{Role, UserStatus};

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> ReportRange {
        ReportRange {
            start: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        }
    }

    #[test]
    fn engagement_covers_every_day() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            let ana = add_user(c, "ana", Role::Resident, UserStatus::Approved, None);
            add_donation(c, ana, "Bread", "", "available", "2025-04-02 08:00:00");
            add_post(c, ana, "tip", "Freeze it", 4, "2025-04-02 09:00:00");
            add_post(c, ana, "recipe", "Soup", 1, "2025-04-03 09:00:00");

            let rows = engagement_report(c, range((2025, 4, 1), (2025, 4, 3)))?;
            assert_eq!(rows.len(), 3);
            assert_eq!(rows[0].new_donations, 0);
            assert_eq!(rows[1].new_donations, 1);
            assert_eq!(rows[1].new_posts, 1);
            assert_eq!(rows[1].engagement, 4);
            assert_eq!(rows[2].engagement, 1);

            assert!(engagement_report(c, range((2025, 4, 3), (2025, 4, 1)))?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn engagement_stops_at_the_last_representable_day() {
        let db = Database::open_in_memory().unwrap();
        let last = ReportRange {
            start: NaiveDate::MAX,
            end: NaiveDate::MAX,
        };
        let rows = db.with_conn(|c| engagement_report(c, last)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, NaiveDate::MAX);

        let tail = ReportRange {
            start: NaiveDate::MAX.pred_opt().unwrap(),
            end: NaiveDate::MAX,
        };
        assert_eq!(db.with_conn(|c| engagement_report(c, tail)).unwrap().len(), 2);

        // The connection is still usable afterwards.
        assert_eq!(db.with_conn(report_stats).unwrap().total_users, 0);
    }

    #[test]
    fn engagement_rejects_oversized_ranges() {
        let db = Database::open_in_memory().unwrap();
        let everything = ReportRange {
            start: NaiveDate::MIN,
            end: NaiveDate::MAX,
        };
        let err = db.with_conn(|c| engagement_report(c, everything)).unwrap_err();
        assert!(err.to_string().contains("cannot exceed 366 days"));

        let leap_year = range((2024, 1, 1), (2024, 12, 31));
        assert_eq!(leap_year.days(), MAX_REPORT_DAYS);
        assert_eq!(db.with_conn(|c| engagement_report(c, leap_year)).unwrap().len(), 366);
        assert!(db.with_conn(|c| engagement_report(c, range((2024, 1, 1), (2025, 1, 1)))).is_err());
        assert_eq!(db.with_conn(report_stats).unwrap().total_users, 0);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            let ana = add_user(c, "ana", Role::Resident, UserStatus::Approved, None);
            add_donation(c, ana, "First", "", "available", "2025-04-01 00:00:00");
            add_donation(c, ana, "Last", "", "claimed", "2025-04-30 23:59:59");
            add_donation(c, ana, "Outside", "", "claimed", "2025-05-01 00:00:00");

            let rows = donations_report(c, range((2025, 4, 1), (2025, 4, 30)))?;
            let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
            assert_eq!(titles, ["Last", "First"]);
            assert_eq!(rows[0].donor, "ana Dela Cruz");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn missing_tables_export_nothing() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            c.execute_batch("DROP TABLE recipes_tips; DROP TABLE challenge_participants; DROP TABLE challenges;")?;
            let r = range((2025, 1, 1), (2025, 12, 31));
            assert!(newsfeeds_report(c, r)?.is_empty());
            assert!(challenges_report(c, r)?.is_empty());
            let stats = report_stats(c)?;
            assert_eq!(stats.total_posts, 0);
            assert_eq!(stats.total_challenges, 0);
            Ok(())
        })
        .unwrap();
    }
}

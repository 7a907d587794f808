use anyhow::Result;
use chrono::{Duration, NaiveDate};
use rusqlite::{Connection, params};

use foodshare_types::enums::AnalyticsPeriod;
use foodshare_types::stats::{AnalyticsCharts, AnalyticsStats, DatedCount, LabelCount};

use crate::feed::top_contributors;
use crate::filter::DateRange;
use crate::stats::{growth_rate, scalar};
use crate::table_exists;

/// The reporting window ending today, `period.days()` calendar days long.
pub fn period_window(period: AnalyticsPeriod, today: NaiveDate) -> DateRange {
    DateRange::new(today - Duration::days(period.days() - 1), today)
}

/// The window of equal length immediately before `period_window`.
pub fn previous_window(period: AnalyticsPeriod, today: NaiveDate) -> DateRange {
    let days = period.days();
    let end = today - Duration::days(days);
    DateRange::new(end - Duration::days(days - 1), end)
}

fn bounds(range: DateRange) -> (Option<String>, Option<String>) {
    (
        range.start.map(|d| d.format("%Y-%m-%d").to_string()),
        range.end.map(|d| d.format("%Y-%m-%d").to_string()),
    )
}

fn new_users_between(conn: &Connection, range: DateRange) -> Result<i64> {
    let (start, end) = bounds(range);
    scalar(
        conn,
        "SELECT COUNT(*) FROM user_accounts
         WHERE role != 'admin' AND date(created_at) BETWEEN ?1 AND ?2",
        params![start, end],
    )
}

pub fn analytics_stats(
    conn: &Connection,
    period: AnalyticsPeriod,
    today: NaiveDate,
) -> Result<AnalyticsStats> {
    let mut stats = AnalyticsStats {
        total_users: scalar(
            conn,
            "SELECT COUNT(*) FROM user_accounts WHERE role != 'admin'",
            [],
        )?,
        active_users: scalar(
            conn,
            "SELECT COUNT(*) FROM user_accounts
             WHERE role != 'admin' AND datetime(updated_at) >= datetime('now', '-30 days')",
            [],
        )?,
        total_donations: scalar(conn, "SELECT COUNT(*) FROM food_donations", [])?,
        ..Default::default()
    };

    if table_exists(conn, "recipes_tips")? {
        stats.total_posts = scalar(conn, "SELECT COUNT(*) FROM recipes_tips", [])?;
        stats.total_engagement = scalar(
            conn,
            "SELECT SUM(likes_count + comments_count + shares_count) FROM recipes_tips",
            [],
        )?;
    }
    if table_exists(conn, "challenges")? {
        stats.total_challenges = scalar(conn, "SELECT COUNT(*) FROM challenges", [])?;
    }

    let current = new_users_between(conn, period_window(period, today))?;
    let previous = new_users_between(conn, previous_window(period, today))?;
    stats.growth_rate = growth_rate(current, previous);

    Ok(stats)
}

fn daily_counts(conn: &Connection, sql: &str, range: DateRange) -> Result<Vec<DatedCount>> {
    let (start, end) = bounds(range);
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![start, end], |row| {
            Ok(DatedCount {
                date: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn label_counts(conn: &Connection, sql: &str) -> Result<Vec<LabelCount>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(LabelCount {
                label: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn analytics_charts(
    conn: &Connection,
    period: AnalyticsPeriod,
    today: NaiveDate,
) -> Result<AnalyticsCharts> {
    let window = period_window(period, today);

    let mut post_types = Vec::new();
    if table_exists(conn, "recipes_tips")? {
        post_types = label_counts(
            conn,
            "SELECT post_type, COUNT(*) FROM recipes_tips GROUP BY post_type ORDER BY post_type",
        )?;
    }
    if table_exists(conn, "meal_plans")? {
        let plans = scalar(conn, "SELECT COUNT(*) FROM meal_plans", [])?;
        if plans > 0 {
            post_types.push(LabelCount {
                label: "meal_plan".to_string(),
                count: plans,
            });
        }
    }

    Ok(AnalyticsCharts {
        user_growth: daily_counts(
            conn,
            "SELECT date(created_at) AS day, COUNT(*) FROM user_accounts
             WHERE role != 'admin' AND date(created_at) BETWEEN ?1 AND ?2
             GROUP BY day ORDER BY day",
            window,
        )?,
        donation_trends: daily_counts(
            conn,
            "SELECT date(created_at) AS day, COUNT(*) FROM food_donations
             WHERE date(created_at) BETWEEN ?1 AND ?2
             GROUP BY day ORDER BY day",
            window,
        )?,
        user_types: label_counts(
            conn,
            "SELECT role, COUNT(*) FROM user_accounts
             WHERE status != 'inactive' GROUP BY role ORDER BY role",
        )?,
        donation_status: label_counts(
            conn,
            "SELECT status, COUNT(*) FROM food_donations GROUP BY status ORDER BY status",
        )?,
        post_types,
        top_contributors: top_contributors(conn, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::donations::tests::add as add_donation;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn register(conn: &Connection, name: &str, role: &str, created: &str) {
        conn.execute(
            "INSERT INTO user_accounts (full_name, username, email, password_hash, role, status, created_at)
             VALUES (?1, ?1, ?1 || '@example.com', 'x', ?2, 'approved', ?3)",
            params![name, role, created],
        )
        .unwrap();
    }

    #[test]
    fn windows_are_adjacent_and_equal_length() {
        let today = day(2025, 3, 31);
        let current = period_window(AnalyticsPeriod::Week, today);
        let previous = previous_window(AnalyticsPeriod::Week, today);
        assert_eq!(current.start, Some(day(2025, 3, 25)));
        assert_eq!(previous.end, Some(day(2025, 3, 24)));
        assert_eq!(previous.start, Some(day(2025, 3, 18)));
    }

    #[test]
    fn growth_compares_against_previous_window() {
        let db = Database::open_in_memory().unwrap();
        let today = day(2025, 3, 31);
        db.with_conn(|c| {
            register(c, "root", "admin", "2025-03-30 10:00:00");
            register(c, "a", "resident", "2025-03-20 10:00:00");
            register(c, "b", "resident", "2025-03-21 10:00:00");
            register(c, "c", "resident", "2025-03-26 10:00:00");
            register(c, "d", "resident", "2025-03-27 10:00:00");
            register(c, "e", "team officer", "2025-03-31 23:00:00");

            let stats = analytics_stats(c, AnalyticsPeriod::Week, today)?;
            assert_eq!(stats.total_users, 5);
            // 3 new this week against 2 the week before
            assert_eq!(stats.growth_rate, 50.0);

            let charts = analytics_charts(c, AnalyticsPeriod::Week, today)?;
            assert_eq!(charts.user_growth.len(), 3);
            assert_eq!(charts.user_growth[0].date, day(2025, 3, 26));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn empty_previous_window_means_zero_growth() {
        let db = Database::open_in_memory().unwrap();
        let today = day(2025, 3, 31);
        db.with_conn(|c| {
            register(c, "a", "resident", "2025-03-30 10:00:00");
            let stats = analytics_stats(c, AnalyticsPeriod::Month, today)?;
            assert_eq!(stats.growth_rate, 0.0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn charts_group_by_label() {
        let db = Database::open_in_memory().unwrap();
        let today = day(2025, 1, 10);
        db.with_conn(|c| {
            register(c, "ana", "resident", "2025-01-01 10:00:00");
            add_donation(c, 1, "Bread", "", "available", "2025-01-05 09:00:00");
            add_donation(c, 1, "Rice", "", "expired", "2025-01-05 11:00:00");
            add_donation(c, 1, "Milk", "", "available", "2025-01-07 11:00:00");

            let charts = analytics_charts(c, AnalyticsPeriod::Week, today)?;
            assert_eq!(
                charts.donation_trends,
                vec![
                    DatedCount { date: day(2025, 1, 5), count: 2 },
                    DatedCount { date: day(2025, 1, 7), count: 1 },
                ]
            );
            assert_eq!(
                charts.donation_status,
                vec![
                    LabelCount { label: "available".into(), count: 2 },
                    LabelCount { label: "expired".into(), count: 1 },
                ]
            );
            assert!(charts.post_types.is_empty());
            Ok(())
        })
        .unwrap();
    }
}

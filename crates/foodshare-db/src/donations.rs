use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use foodshare_types::enums::{ApprovalStatus, DonationStatus};
use foodshare_types::models::{FoodDonation, Paged};
use foodshare_types::stats::{DonationStats, ExpiredStats};

use crate::filter::{DateRange, Filter, ListQuery, Page};
use crate::models::{json_list, opt_text_enum, text_enum};
use crate::stats::scalar;

const DONATION_COLUMNS: &str = "d.id, d.user_id, u.full_name, d.title, d.description, \
     d.food_type, d.quantity, d.status, d.approval_status, d.expiry_date, d.images, \
     d.views_count, d.created_at, d.updated_at";

const DONATION_FROM: &str = "food_donations d JOIN user_accounts u ON u.user_id = d.user_id";

fn map_donation(row: &Row<'_>) -> rusqlite::Result<FoodDonation> {
    Ok(FoodDonation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        donor_name: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        food_type: row.get(5)?,
        quantity: row.get(6)?,
        status: text_enum(row, 7)?,
        approval_status: opt_text_enum(row, 8)?,
        expiry_date: row.get(9)?,
        images: json_list(row, 10)?,
        views_count: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct DonationFilter {
    pub status: Option<DonationStatus>,
    pub approval: Option<ApprovalStatus>,
    pub search: Option<String>,
    pub created: DateRange,
}

impl DonationFilter {
    fn build(&self) -> Filter {
        Filter::new()
            .eq_str("d.status", self.status.map(DonationStatus::as_str))
            .eq_str("d.approval_status", self.approval.map(ApprovalStatus::as_str))
            .search(&["d.title", "d.description"], self.search.as_deref())
            .date_range("d.created_at", self.created)
    }
}

pub fn list_donations(
    conn: &Connection,
    filter: &DonationFilter,
    page: Page,
) -> Result<Paged<FoodDonation>> {
    let filter = filter.build();
    ListQuery {
        select: DONATION_COLUMNS,
        from: DONATION_FROM,
        filter: &filter,
        order_by: "d.created_at DESC, d.id DESC",
    }
    .fetch(conn, page, map_donation)
}

/// Moderation queue, oldest submission first.
pub fn pending_approvals(conn: &Connection, page: Page) -> Result<Paged<FoodDonation>> {
    let filter = Filter::new().always("d.approval_status = 'pending'");
    ListQuery {
        select: DONATION_COLUMNS,
        from: DONATION_FROM,
        filter: &filter,
        order_by: "d.created_at ASC, d.id ASC",
    }
    .fetch(conn, page, map_donation)
}

pub fn donation_stats(conn: &Connection) -> Result<DonationStats> {
    let stats = conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(status = 'available'), 0),
            COALESCE(SUM(status = 'reserved'), 0),
            COALESCE(SUM(status = 'claimed'), 0),
            COALESCE(SUM(status = 'expired'), 0),
            COALESCE(SUM(date(created_at) = date('now')), 0),
            COALESCE(SUM(approval_status = 'pending'), 0),
            COALESCE(SUM(approval_status = 'approved'), 0),
            COALESCE(SUM(approval_status = 'rejected'), 0)
         FROM food_donations",
        [],
        |row| {
            Ok(DonationStats {
                total: row.get(0)?,
                available: row.get(1)?,
                reserved: row.get(2)?,
                claimed: row.get(3)?,
                expired: row.get(4)?,
                today: row.get(5)?,
                pending: row.get(6)?,
                approved: row.get(7)?,
                rejected: row.get(8)?,
            })
        },
    )?;
    Ok(stats)
}

pub fn expired_stats(conn: &Connection) -> Result<ExpiredStats> {
    Ok(ExpiredStats {
        expired_total: scalar(
            conn,
            "SELECT COUNT(*) FROM food_donations WHERE status = 'expired'",
            [],
        )?,
        expired_today: scalar(
            conn,
            "SELECT COUNT(*) FROM food_donations
             WHERE status = 'expired' AND date(updated_at) = date('now')",
            [],
        )?,
        expired_week: scalar(
            conn,
            "SELECT COUNT(*) FROM food_donations
             WHERE status = 'expired' AND datetime(updated_at) >= datetime('now', '-7 days')",
            [],
        )?,
        expired_month: scalar(
            conn,
            "SELECT COUNT(*) FROM food_donations
             WHERE status = 'expired' AND datetime(updated_at) >= datetime('now', '-30 days')",
            [],
        )?,
        expiring_soon: scalar(
            conn,
            "SELECT COUNT(*) FROM food_donations
             WHERE status = 'available' AND expiry_date IS NOT NULL
               AND datetime(expiry_date) BETWEEN datetime('now') AND datetime('now', '+24 hours')",
            [],
        )?,
    })
}

/// Expired donations, most recently expired first.
pub fn expired_donations(conn: &Connection, limit: u32) -> Result<Vec<FoodDonation>> {
    let filter = Filter::new().always("d.status = 'expired'");
    ListQuery {
        select: DONATION_COLUMNS,
        from: DONATION_FROM,
        filter: &filter,
        order_by: "d.updated_at DESC, d.id DESC",
    }
    .fetch_all(conn, limit, map_donation)
}

/// Available donations whose expiry falls within the next 24 hours.
pub fn expiring_soon(conn: &Connection, limit: u32) -> Result<Vec<FoodDonation>> {
    let filter = Filter::new().always(
        "d.status = 'available' AND d.expiry_date IS NOT NULL \
         AND datetime(d.expiry_date) BETWEEN datetime('now') AND datetime('now', '+24 hours')",
    );
    ListQuery {
        select: DONATION_COLUMNS,
        from: DONATION_FROM,
        filter: &filter,
        order_by: "d.expiry_date ASC, d.id ASC",
    }
    .fetch_all(conn, limit, map_donation)
}

pub fn recent_for_user(conn: &Connection, user_id: i64, limit: u32) -> Result<Vec<FoodDonation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DONATION_COLUMNS} FROM {DONATION_FROM}
         WHERE d.user_id = ?1 ORDER BY d.created_at DESC, d.id DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(params![user_id, limit], map_donation)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_donation(conn: &Connection, id: i64) -> Result<Option<FoodDonation>> {
    let donation = conn
        .query_row(
            &format!("SELECT {DONATION_COLUMNS} FROM {DONATION_FROM} WHERE d.id = ?1"),
            [id],
            map_donation,
        )
        .optional()?;
    Ok(donation)
}

pub fn set_approval(conn: &Connection, id: i64, approval: ApprovalStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE food_donations SET approval_status = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![approval.as_str(), id],
    )?;
    Ok(changed > 0)
}

pub fn set_status(conn: &Connection, id: i64, status: DonationStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE food_donations SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(changed > 0)
}

/// Delete one donation, returning it so its images can be removed afterwards.
pub fn delete_donation(conn: &Connection, id: i64) -> Result<Option<FoodDonation>> {
    let Some(donation) = get_donation(conn, id)? else {
        return Ok(None);
    };
    conn.execute("DELETE FROM food_donations WHERE id = ?1", [id])?;
    Ok(Some(donation))
}

/// Delete expired donations last touched more than `days` days ago.
///
/// Returns the image paths of the removed rows.
pub fn bulk_delete_expired(conn: &Connection, days: u32) -> Result<(usize, Vec<String>)> {
    let cutoff = format!("-{days} days");
    let mut stmt = conn.prepare(
        "SELECT images FROM food_donations
         WHERE status = 'expired' AND datetime(updated_at) < datetime('now', ?1)",
    )?;
    let images = stmt
        .query_map([&cutoff], |row| json_list::<String>(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect();

    let deleted = conn.execute(
        "DELETE FROM food_donations
         WHERE status = 'expired' AND datetime(updated_at) < datetime('now', ?1)",
        [&cutoff],
    )?;
    Ok((deleted, images))
}

/// Flip available donations past their expiry date to expired.
pub fn auto_expire(conn: &Connection) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE food_donations SET status = 'expired', updated_at = datetime('now')
         WHERE status = 'available' AND expiry_date IS NOT NULL
           AND datetime(expiry_date) < datetime('now')",
        [],
    )?;
    Ok(changed)
}

//! Rate helpers and the small COUNT/SUM primitives every stats card uses.

use anyhow::Result;
use rusqlite::{Connection, Params};

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percent change from `previous` to `current`, one decimal.
/// Zero when there is nothing to compare against.
pub fn growth_rate(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    round1((current - previous) as f64 / previous as f64 * 100.0)
}

/// Share of `total` that is `completed`, as a percentage with one decimal.
pub fn completion_rate(completed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(completed as f64 / total as f64 * 100.0)
}

/// Single integer aggregate. `SUM` over no rows yields NULL, read as 0.
pub fn scalar<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<i64> {
    let value: Option<i64> = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(value.unwrap_or(0))
}

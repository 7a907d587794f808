//! Parameterized list queries shared by every admin list page.
//!
//! A [`Filter`] collects AND-ed predicates together with their bound values.
//! Column names are `&'static str` so only compile-time SQL ever reaches the
//! statement text; user input is always bound through `?` placeholders.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params_from_iter};

use foodshare_types::models::Paged;

pub const PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32) -> Self {
        Self {
            number: number.max(1),
            size: PAGE_SIZE,
        }
    }

    /// Parse a `page` query parameter; anything unusable means page 1.
    pub fn parse(raw: Option<&str>) -> Self {
        let number = raw
            .and_then(|r| r.trim().parse::<u32>().ok())
            .unwrap_or(1);
        Self::new(number)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Inclusive calendar-date window. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Parse `YYYY-MM-DD` bounds; an unparseable bound is dropped.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Self {
        Self {
            start: start.and_then(parse_date),
            end: end.and_then(parse_date),
        }
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Escape `LIKE` wildcards so a search term matches literally.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    predicates: Vec<String>,
    params: Vec<Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constant predicate with no bound values.
    pub fn always(mut self, predicate: &'static str) -> Self {
        self.predicates.push(predicate.to_string());
        self
    }

    /// Predicate with `?` placeholders, one per value.
    pub fn predicate(mut self, sql: &'static str, values: Vec<Value>) -> Self {
        debug_assert_eq!(sql.matches('?').count(), values.len());
        self.predicates.push(format!("({sql})"));
        self.params.extend(values);
        self
    }

    /// `column = ?` when a value is present; nothing otherwise.
    pub fn eq<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => {
                let mut this = self;
                this.predicates.push(format!("{column} = ?"));
                this.params.push(v.into());
                this
            }
            None => self,
        }
    }

    pub fn eq_str(self, column: &'static str, value: Option<&str>) -> Self {
        self.eq(column, value.map(str::to_string))
    }

    /// Case-insensitive substring match over any of `columns`.
    pub fn search(mut self, columns: &[&'static str], term: Option<&str>) -> Self {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return self;
        };
        if columns.is_empty() {
            return self;
        }
        let pattern = like_pattern(term);
        let clause = columns
            .iter()
            .map(|c| format!("{c} LIKE ? ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.predicates.push(format!("({clause})"));
        for _ in columns {
            self.params.push(Value::Text(pattern.clone()));
        }
        self
    }

    /// Restrict `column`'s calendar date to the range, each bound inclusive.
    pub fn date_range(mut self, column: &'static str, range: DateRange) -> Self {
        if let Some(start) = range.start {
            self.predicates.push(format!("date({column}) >= ?"));
            self.params.push(Value::Text(start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = range.end {
            self.predicates.push(format!("date({column}) <= ?"));
            self.params.push(Value::Text(end.format("%Y-%m-%d").to_string()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// ` WHERE a AND b`, or an empty string when nothing is active.
    pub fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.predicates.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// A paginated SELECT and its matching COUNT over the same predicates.
pub struct ListQuery<'a> {
    pub select: &'static str,
    /// Table plus joins, without the `FROM` keyword.
    pub from: &'static str,
    pub filter: &'a Filter,
    pub order_by: &'static str,
}

impl ListQuery<'_> {
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}{}", self.from, self.filter.where_clause())
    }

    pub fn page_sql(&self) -> String {
        format!(
            "SELECT {} FROM {}{} ORDER BY {} LIMIT ? OFFSET ?",
            self.select,
            self.from,
            self.filter.where_clause(),
            self.order_by
        )
    }

    pub fn count(&self, conn: &Connection) -> Result<i64> {
        let total = conn.query_row(
            &self.count_sql(),
            params_from_iter(self.filter.params().iter()),
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Fetch every matching row without pagination, capped at `limit`.
    pub fn fetch_all<T, F>(&self, conn: &Connection, limit: u32, map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut params = self.filter.params().to_vec();
        params.push(Value::Integer(i64::from(limit)));
        params.push(Value::Integer(0));

        let mut stmt = conn.prepare(&self.page_sql())?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), map)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn fetch<T, F>(&self, conn: &Connection, page: Page, map: F) -> Result<Paged<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let total = self.count(conn)?;

        let mut params = self.filter.params().to_vec();
        params.push(Value::Integer(i64::from(page.size)));
        params.push(Value::Integer(page.offset() as i64));

        let mut stmt = conn.prepare(&self.page_sql())?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), map)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total_pages = if total <= 0 {
            0
        } else {
            ((total as u64).div_ceil(u64::from(page.size))) as u32
        };

        Ok(Paged {
            rows,
            total,
            page: page.number,
            per_page: page.size,
            total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (
                id INTEGER PRIMARY KEY,
                status TEXT NOT NULL,
                title TEXT NOT NULL,
                pinned INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );",
        )
        .unwrap();
        for i in 1..=45 {
            let status = if i % 3 == 0 { "expired" } else { "available" };
            let title = if i % 5 == 0 { format!("Fresh Bread #{i}") } else { format!("Rice #{i}") };
            conn.execute(
                "INSERT INTO items (id, status, title, pinned, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![i, status, title, (i == 7) as i64, format!("2025-01-{:02} 10:00:00", (i % 28) + 1)],
            )
            .unwrap();
        }
        conn
    }

    fn query(filter: &Filter) -> ListQuery<'_> {
        ListQuery {
            select: "id, title",
            from: "items",
            filter,
            order_by: "pinned DESC, created_at DESC, id DESC",
        }
    }

    #[test]
    fn absent_filters_add_no_predicates() {
        let f = Filter::new()
            .eq::<String>("status", None)
            .search(&["title"], Some("   "))
            .date_range("created_at", DateRange::default());
        assert!(f.is_empty());
        assert_eq!(f.where_clause(), "");
        assert!(f.params().is_empty());
    }

    #[test]
    fn each_active_filter_adds_one_predicate() {
        let f = Filter::new()
            .eq_str("status", Some("expired"))
            .search(&["title", "description"], Some("bread"));
        assert_eq!(
            f.where_clause(),
            " WHERE status = ? AND (title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')"
        );
        assert_eq!(f.params().len(), 3);
    }

    #[test]
    fn wildcards_in_search_terms_are_literal() {
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn page_numbers_clamp_and_parse() {
        assert_eq!(Page::parse(None).number, 1);
        assert_eq!(Page::parse(Some("0")).number, 1);
        assert_eq!(Page::parse(Some("-4")).number, 1);
        assert_eq!(Page::parse(Some("abc")).number, 1);
        assert_eq!(Page::parse(Some("3")).offset(), 40);
    }

    #[test]
    fn dates_outside_format_are_dropped() {
        let r = DateRange::parse(Some("2025-01-05"), Some("yesterday"));
        assert_eq!(r.start, NaiveDate::from_ymd_opt(2025, 1, 5));
        assert_eq!(r.end, None);
    }

    #[test]
    fn paged_total_matches_separate_count() {
        let conn = items_db();
        let filters = vec![
            Filter::new(),
            Filter::new().eq_str("status", Some("expired")),
            Filter::new().search(&["title"], Some("BREAD")),
            Filter::new()
                .eq_str("status", Some("expired"))
                .search(&["title"], Some("bread")),
            Filter::new().date_range(
                "created_at",
                DateRange::parse(Some("2025-01-03"), Some("2025-01-10")),
            ),
            Filter::new().eq_str("status", Some("nothing-matches")),
        ];

        for f in &filters {
            let q = query(f);
            let paged = q.fetch(&conn, Page::new(1), |row| row.get::<_, i64>(0)).unwrap();
            assert_eq!(paged.total, q.count(&conn).unwrap());
            let all = q.fetch_all(&conn, 1000, |row| row.get::<_, i64>(0)).unwrap();
            assert_eq!(all.len() as i64, paged.total);
            assert!(paged.rows.len() <= PAGE_SIZE as usize);
        }
    }

    #[test]
    fn expired_bread_matches_both_predicates() {
        let conn = items_db();
        let f = Filter::new()
            .eq_str("status", Some("expired"))
            .search(&["title"], Some("bread"));
        let q = query(&f);
        let paged = q
            .fetch(&conn, Page::new(1), |row| row.get::<_, String>(1))
            .unwrap();
        // ids divisible by both 3 and 5
        assert_eq!(paged.total, 3);
        assert!(paged.rows.iter().all(|t| t.to_lowercase().contains("bread")));
    }

    #[test]
    fn pinned_rows_sort_first_and_pages_split() {
        let conn = items_db();
        let f = Filter::new();
        let q = query(&f);
        let first = q.fetch(&conn, Page::new(1), |row| row.get::<_, i64>(0)).unwrap();
        assert_eq!(first.rows[0], 7);
        assert_eq!(first.total, 45);
        assert_eq!(first.total_pages, 3);

        let last = q.fetch(&conn, Page::new(3), |row| row.get::<_, i64>(0)).unwrap();
        assert_eq!(last.rows.len(), 5);

        let beyond = q.fetch(&conn, Page::new(9), |row| row.get::<_, i64>(0)).unwrap();
        assert!(beyond.rows.is_empty());
        assert_eq!(beyond.total, 45);
    }
}

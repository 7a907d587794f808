use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params};

use foodshare_types::enums::{Role, UserStatus};
use foodshare_types::models::{Paged, UserAccount};
use foodshare_types::stats::UserStats;

use crate::filter::{Filter, ListQuery, Page};
use crate::models::{Credentials, NewUser, UserUpdate, text_enum};

const USER_COLUMNS: &str = "user_id, full_name, username, email, role, status, phone_number, \
     address, profile_img, created_at, updated_at";

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserAccount> {
    Ok(UserAccount {
        user_id: row.get(0)?,
        full_name: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        role: text_enum(row, 4)?,
        status: text_enum(row, 5)?,
        phone_number: row.get(6)?,
        address: row.get(7)?,
        profile_img: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Which accounts the acting user may see on the users page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserScope {
    Everyone,
    /// Team officers see fellow officers plus residents of their purok.
    Purok(String),
}

impl UserScope {
    /// Whether an account falls inside this scope. Admins are only reachable
    /// from [`UserScope::Everyone`].
    pub fn covers(&self, user: &UserAccount) -> bool {
        match self {
            UserScope::Everyone => true,
            UserScope::Purok(purok) => match user.role {
                Role::Admin => false,
                Role::TeamOfficer => true,
                Role::Resident => user.address.as_deref() == Some(purok.as_str()),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub search: Option<String>,
}

impl UserFilter {
    fn build(&self, scope: &UserScope) -> Filter {
        let mut filter = match self.role {
            Some(role) => Filter::new().eq_str("role", Some(role.as_str())),
            None => Filter::new().always("role != 'admin'"),
        };
        filter = match self.status {
            Some(status) => filter.eq_str("status", Some(status.as_str())),
            None => filter.always("status != 'inactive'"),
        };
        if let UserScope::Purok(purok) = scope {
            filter = filter.predicate(
                "role = 'team officer' OR (role = 'resident' AND address = ?)",
                vec![Value::Text(purok.clone())],
            );
        }
        filter.search(&["full_name", "username", "email"], self.search.as_deref())
    }
}

pub fn list_users(
    conn: &Connection,
    filter: &UserFilter,
    scope: &UserScope,
    page: Page,
) -> Result<Paged<UserAccount>> {
    let filter = filter.build(scope);
    ListQuery {
        select: USER_COLUMNS,
        from: "user_accounts",
        filter: &filter,
        order_by: "created_at DESC, user_id DESC",
    }
    .fetch(conn, page, map_user)
}

pub fn user_stats(conn: &Connection) -> Result<UserStats> {
    let stats = conn.query_row(
        "SELECT
            COALESCE(SUM(status != 'inactive'), 0),
            COALESCE(SUM(role = 'admin' AND status != 'inactive'), 0),
            COALESCE(SUM(role = 'resident' AND status != 'inactive'), 0),
            COALESCE(SUM(role = 'team officer' AND status != 'inactive'), 0),
            COALESCE(SUM(status = 'approved'), 0),
            COALESCE(SUM(status = 'pending'), 0),
            COALESCE(SUM(status = 'inactive'), 0)
         FROM user_accounts",
        [],
        |row| {
            Ok(UserStats {
                total: row.get(0)?,
                admins: row.get(1)?,
                residents: row.get(2)?,
                officers: row.get(3)?,
                active: row.get(4)?,
                pending: row.get(5)?,
                archived: row.get(6)?,
            })
        },
    )?;
    Ok(stats)
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<UserAccount>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM user_accounts WHERE user_id = ?1"),
            [user_id],
            map_user,
        )
        .optional()?;
    Ok(user)
}

pub fn credentials_by_username(conn: &Connection, username: &str) -> Result<Option<Credentials>> {
    let creds = conn
        .query_row(
            "SELECT user_id, username, password_hash, role, status
             FROM user_accounts WHERE username = ?1",
            [username],
            |row| {
                Ok(Credentials {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    role: text_enum(row, 3)?,
                    status: text_enum(row, 4)?,
                })
            },
        )
        .optional()?;
    Ok(creds)
}

/// True when another account already uses this username or email.
pub fn identity_taken(
    conn: &Connection,
    username: &str,
    email: &str,
    except_user: Option<i64>,
) -> Result<bool> {
    let taken: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_accounts
         WHERE (username = ?1 OR email = ?2) AND user_id != COALESCE(?3, -1)",
        params![username, email, except_user],
        |row| row.get(0),
    )?;
    Ok(taken > 0)
}

pub fn insert_user(conn: &Connection, user: &NewUser) -> Result<i64> {
    conn.execute(
        "INSERT INTO user_accounts
            (full_name, username, email, password_hash, role, status, phone_number, address)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.full_name,
            user.username,
            user.email,
            user.password_hash,
            user.role.as_str(),
            user.status.as_str(),
            user.phone_number,
            user.address,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_user(conn: &Connection, user_id: i64, update: &UserUpdate) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE user_accounts
         SET full_name = ?1, username = ?2, email = ?3, role = ?4, status = ?5,
             phone_number = ?6, address = ?7, updated_at = datetime('now')
         WHERE user_id = ?8",
        params![
            update.full_name,
            update.username,
            update.email,
            update.role.as_str(),
            update.status.as_str(),
            update.phone_number,
            update.address,
            user_id,
        ],
    )?;
    Ok(changed > 0)
}

pub fn set_user_status(conn: &Connection, user_id: i64, status: UserStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE user_accounts SET status = ?1, updated_at = datetime('now') WHERE user_id = ?2",
        params![status.as_str(), user_id],
    )?;
    Ok(changed > 0)
}

pub fn set_profile_img(conn: &Connection, user_id: i64, path: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE user_accounts SET profile_img = ?1, updated_at = datetime('now') WHERE user_id = ?2",
        params![path, user_id],
    )?;
    Ok(changed > 0)
}

/// Hard delete. Returns the removed account so the caller can clean up its files.
pub fn delete_user(conn: &Connection, user_id: i64) -> Result<Option<UserAccount>> {
    let Some(user) = get_user(conn, user_id)? else {
        return Ok(None);
    };
    conn.execute("DELETE FROM user_accounts WHERE user_id = ?1", [user_id])?;
    Ok(Some(user))
}

/// Non-archived residents of one purok, alphabetical.
pub fn residents_in_purok(conn: &Connection, purok: &str) -> Result<Vec<UserAccount>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM user_accounts
         WHERE role = 'resident' AND address = ?1 AND status != 'inactive'
         ORDER BY full_name ASC, user_id ASC"
    ))?;
    let rows = stmt
        .query_map([purok], map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Change a resident's status only if they belong to `purok`.
pub fn update_resident_status(
    conn: &Connection,
    user_id: i64,
    purok: &str,
    status: UserStatus,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE user_accounts SET status = ?1, updated_at = datetime('now')
         WHERE user_id = ?2 AND address = ?3 AND role = 'resident'",
        params![status.as_str(), user_id, purok],
    )?;
    Ok(changed > 0)
}

pub fn admin_exists(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_accounts WHERE role = 'admin'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

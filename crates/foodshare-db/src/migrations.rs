use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Ordered schema steps. Each runs once and bumps `schema_version`.
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (
        1,
        "user accounts",
        "
        CREATE TABLE user_accounts (
            user_id         INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name       TEXT NOT NULL,
            username        TEXT NOT NULL UNIQUE,
            email           TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            role            TEXT NOT NULL DEFAULT 'resident',
            status          TEXT NOT NULL DEFAULT 'pending',
            phone_number    TEXT,
            address         TEXT,
            profile_img     TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_users_role_status ON user_accounts(role, status);
        CREATE INDEX idx_users_address ON user_accounts(address);
        ",
    ),
    (
        2,
        "food donations",
        "
        CREATE TABLE food_donations (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL REFERENCES user_accounts(user_id) ON DELETE CASCADE,
            title           TEXT NOT NULL,
            description     TEXT NOT NULL DEFAULT '',
            food_type       TEXT NOT NULL DEFAULT 'other',
            quantity        TEXT,
            status          TEXT NOT NULL DEFAULT 'available',
            approval_status TEXT DEFAULT 'pending',
            expiry_date     TEXT,
            images          TEXT,
            views_count     INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_donations_status ON food_donations(status, created_at);
        CREATE INDEX idx_donations_user ON food_donations(user_id);
        ",
    ),
    (
        3,
        "announcements",
        "
        CREATE TABLE announcements (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL REFERENCES user_accounts(user_id) ON DELETE CASCADE,
            title           TEXT NOT NULL,
            content         TEXT NOT NULL,
            type            TEXT NOT NULL DEFAULT 'announcement',
            priority        TEXT NOT NULL DEFAULT 'medium',
            status          TEXT NOT NULL DEFAULT 'published',
            is_pinned       INTEGER NOT NULL DEFAULT 0,
            images          TEXT,
            attachments     TEXT,
            likes_count     INTEGER NOT NULL DEFAULT 0,
            comments_count  INTEGER NOT NULL DEFAULT 0,
            shares_count    INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_announcements_listing ON announcements(is_pinned, created_at);
        ",
    ),
    (
        4,
        "challenges",
        "
        CREATE TABLE challenges (
            challenge_id      INTEGER PRIMARY KEY AUTOINCREMENT,
            title             TEXT NOT NULL,
            description       TEXT,
            challenge_type    TEXT NOT NULL DEFAULT 'weekly',
            category          TEXT NOT NULL DEFAULT 'donation',
            points            INTEGER NOT NULL DEFAULT 10,
            target_value      INTEGER NOT NULL DEFAULT 1,
            start_date        TEXT NOT NULL,
            end_date          TEXT NOT NULL,
            status            TEXT NOT NULL DEFAULT 'draft',
            banner_image      TEXT,
            prize_description TEXT,
            created_by        INTEGER REFERENCES user_accounts(user_id) ON DELETE SET NULL,
            created_at        TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE challenge_participants (
            participant_id  INTEGER PRIMARY KEY AUTOINCREMENT,
            challenge_id    INTEGER NOT NULL REFERENCES challenges(challenge_id) ON DELETE CASCADE,
            user_id         INTEGER NOT NULL REFERENCES user_accounts(user_id) ON DELETE CASCADE,
            progress        INTEGER NOT NULL DEFAULT 0,
            completed       INTEGER NOT NULL DEFAULT 0,
            completed_at    TEXT,
            points_earned   INTEGER NOT NULL DEFAULT 0,
            joined_at       TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(challenge_id, user_id)
        );
        ",
    ),
    (
        5,
        "newsfeed content",
        "
        CREATE TABLE recipes_tips (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL REFERENCES user_accounts(user_id) ON DELETE CASCADE,
            post_type       TEXT NOT NULL DEFAULT 'recipe',
            title           TEXT NOT NULL,
            content         TEXT NOT NULL DEFAULT '',
            is_public       INTEGER NOT NULL DEFAULT 1,
            featured        INTEGER NOT NULL DEFAULT 0,
            likes_count     INTEGER NOT NULL DEFAULT 0,
            comments_count  INTEGER NOT NULL DEFAULT 0,
            shares_count    INTEGER NOT NULL DEFAULT 0,
            views_count     INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE meal_plans (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL REFERENCES user_accounts(user_id) ON DELETE CASCADE,
            plan_name       TEXT NOT NULL,
            is_shared       INTEGER NOT NULL DEFAULT 0,
            total_calories  REAL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    ),
];

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    for (step, name, sql) in MIGRATIONS {
        if *step <= version {
            continue;
        }
        info!("Running migration v{} ({})", step, name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [step])?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rerunning_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i64);
    }
}

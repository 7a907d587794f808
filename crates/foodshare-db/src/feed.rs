//! The admin newsfeed: recipes/tips and shared meal plans merged into one
//! timeline.

use anyhow::Result;
use rusqlite::{Connection, Row, params};

use foodshare_types::enums::{FeedSource, PostType};
use foodshare_types::models::{Contributor, FeedItem};
use foodshare_types::stats::FeedStats;

use crate::models::{flag, text_enum};
use crate::stats::scalar;
use crate::table_exists;

pub const RECIPE_TIP_CAP: u32 = 100;
pub const MEAL_PLAN_CAP: u32 = 50;

fn map_recipe_tip(row: &Row<'_>) -> rusqlite::Result<FeedItem> {
    Ok(FeedItem {
        id: row.get(0)?,
        source: FeedSource::RecipeTip,
        post_type: text_enum(row, 1)?,
        user_id: row.get(2)?,
        author_name: row.get(3)?,
        title: row.get(4)?,
        is_public: flag(row, 5)?,
        featured: flag(row, 6)?,
        likes_count: row.get(7)?,
        comments_count: row.get(8)?,
        shares_count: row.get(9)?,
        views_count: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn map_meal_plan(row: &Row<'_>) -> rusqlite::Result<FeedItem> {
    Ok(FeedItem {
        id: row.get(0)?,
        source: FeedSource::MealPlan,
        post_type: PostType::MealPlan,
        user_id: row.get(1)?,
        author_name: row.get(2)?,
        title: row.get(3)?,
        is_public: flag(row, 4)?,
        featured: false,
        likes_count: 0,
        comments_count: 0,
        shares_count: 0,
        views_count: 0,
        created_at: row.get(5)?,
    })
}

/// Concatenate recipes/tips then meal plans and order newest first.
///
/// The sort is stable, so items with equal timestamps keep source order.
pub fn merge_feed(recipe_tips: Vec<FeedItem>, meal_plans: Vec<FeedItem>) -> Vec<FeedItem> {
    let mut merged = recipe_tips;
    merged.extend(meal_plans);
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

fn recipe_tips(conn: &Connection, post_type: Option<PostType>) -> Result<Vec<FeedItem>> {
    if !table_exists(conn, "recipes_tips")? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT r.id, r.post_type, r.user_id, u.full_name, r.title, r.is_public, r.featured,
                r.likes_count, r.comments_count, r.shares_count, r.views_count, r.created_at
         FROM recipes_tips r JOIN user_accounts u ON u.user_id = r.user_id
         WHERE ?1 IS NULL OR r.post_type = ?1
         ORDER BY r.created_at DESC, r.id DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(
            params![post_type.map(PostType::as_str), RECIPE_TIP_CAP],
            map_recipe_tip,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn meal_plans(conn: &Connection) -> Result<Vec<FeedItem>> {
    if !table_exists(conn, "meal_plans")? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT m.id, m.user_id, u.full_name, m.plan_name, m.is_shared, m.created_at
         FROM meal_plans m JOIN user_accounts u ON u.user_id = m.user_id
         ORDER BY m.created_at DESC, m.id DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([MEAL_PLAN_CAP], map_meal_plan)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Merged feed, optionally narrowed to a single post type.
pub fn feed_items(conn: &Connection, post_type: Option<PostType>) -> Result<Vec<FeedItem>> {
    let (tips, plans) = match post_type {
        None => (recipe_tips(conn, None)?, meal_plans(conn)?),
        Some(PostType::MealPlan) => (Vec::new(), meal_plans(conn)?),
        Some(kind) => (recipe_tips(conn, Some(kind))?, Vec::new()),
    };
    Ok(merge_feed(tips, plans))
}

pub fn feed_stats(conn: &Connection) -> Result<FeedStats> {
    let mut stats = FeedStats::default();
    if table_exists(conn, "recipes_tips")? {
        let (recipes, tips, engagement): (i64, i64, i64) = conn.query_row(
            "SELECT
                COALESCE(SUM(post_type = 'recipe'), 0),
                COALESCE(SUM(post_type = 'tip'), 0),
                COALESCE(SUM(likes_count + comments_count + shares_count), 0)
             FROM recipes_tips",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        stats.recipes = recipes;
        stats.tips = tips;
        stats.total_engagement = engagement;
    }
    if table_exists(conn, "meal_plans")? {
        stats.meal_plans = scalar(conn, "SELECT COUNT(*) FROM meal_plans", [])?;
    }
    stats.total_posts = stats.recipes + stats.tips + stats.meal_plans;
    Ok(stats)
}

/// Authors with the most recipes and tips.
pub fn top_contributors(conn: &Connection, limit: u32) -> Result<Vec<Contributor>> {
    if !table_exists(conn, "recipes_tips")? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT u.user_id, u.full_name, u.profile_img, COUNT(r.id),
                COALESCE(SUM(r.likes_count + r.comments_count + r.shares_count), 0)
         FROM recipes_tips r JOIN user_accounts u ON u.user_id = r.user_id
         GROUP BY u.user_id
         ORDER BY COUNT(r.id) DESC, 5 DESC, u.user_id ASC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(Contributor {
                user_id: row.get(0)?,
                full_name: row.get(1)?,
                profile_img: row.get(2)?,
                post_count: row.get(3)?,
                engagement: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_post(conn: &Connection, source: FeedSource, id: i64) -> Result<bool> {
    let sql = match source {
        FeedSource::RecipeTip => "DELETE FROM recipes_tips WHERE id = ?1",
        FeedSource::MealPlan => "DELETE FROM meal_plans WHERE id = ?1",
    };
    Ok(conn.execute(sql, [id])? > 0)
}

/// Flip public visibility (`is_shared` for meal plans). Returns the new state.
pub fn toggle_visibility(conn: &Connection, source: FeedSource, id: i64) -> Result<Option<bool>> {
    let (update, select) = match source {
        FeedSource::RecipeTip => (
            "UPDATE recipes_tips SET is_public = CASE WHEN is_public != 0 THEN 0 ELSE 1 END WHERE id = ?1",
            "SELECT is_public FROM recipes_tips WHERE id = ?1",
        ),
        FeedSource::MealPlan => (
            "UPDATE meal_plans SET is_shared = CASE WHEN is_shared != 0 THEN 0 ELSE 1 END WHERE id = ?1",
            "SELECT is_shared FROM meal_plans WHERE id = ?1",
        ),
    };
    if conn.execute(update, [id])? == 0 {
        return Ok(None);
    }
    let visible: i64 = conn.query_row(select, [id], |row| row.get(0))?;
    Ok(Some(visible != 0))
}

/// Flip the featured flag on a recipe or tip. Returns the new state.
pub fn toggle_featured(conn: &Connection, id: i64) -> Result<Option<bool>> {
    let changed = conn.execute(
        "UPDATE recipes_tips SET featured = CASE WHEN featured != 0 THEN 0 ELSE 1 END WHERE id = ?1",
        [id],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    let featured: i64 =
        conn.query_row("SELECT featured FROM recipes_tips WHERE id = ?1", [id], |row| row.get(0))?;
    Ok(Some(featured != 0))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Database;
    use crate::users::tests::add as add_user;
    use chrono::{NaiveDate, NaiveDateTime};
    use foodshare_types::enums::{Role, UserStatus};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn item(id: i64, source: FeedSource, created_at: NaiveDateTime) -> FeedItem {
        FeedItem {
            id,
            source,
            post_type: match source {
                FeedSource::RecipeTip => PostType::Recipe,
                FeedSource::MealPlan => PostType::MealPlan,
            },
            user_id: 1,
            author_name: "Ana".into(),
            title: format!("post {id}"),
            is_public: true,
            featured: false,
            likes_count: 0,
            comments_count: 0,
            shares_count: 0,
            views_count: 0,
            created_at,
        }
    }

    pub(crate) fn add_post(conn: &Connection, user_id: i64, post_type: &str, title: &str, likes: i64, created_at: &str) -> i64 {
        conn.execute(
            "INSERT INTO recipes_tips (user_id, post_type, title, likes_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, post_type, title, likes, created_at],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub(crate) fn add_plan(conn: &Connection, user_id: i64, name: &str, created_at: &str) -> i64 {
        conn.execute(
            "INSERT INTO meal_plans (user_id, plan_name, is_shared, created_at) VALUES (?1, ?2, 1, ?3)",
            params![user_id, name, created_at],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn merge_orders_newest_first_across_sources() {
        let tips = vec![item(1, FeedSource::RecipeTip, at(5, 9)), item(2, FeedSource::RecipeTip, at(3, 9))];
        let plans = vec![item(10, FeedSource::MealPlan, at(4, 9)), item(11, FeedSource::MealPlan, at(1, 9))];
        let merged = merge_feed(tips, plans);
        let ids: Vec<_> = merged.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 10, 2, 11]);
        assert!(merged.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn equal_timestamps_keep_source_order() {
        let tips = vec![item(1, FeedSource::RecipeTip, at(2, 9)), item(2, FeedSource::RecipeTip, at(2, 9))];
        let plans = vec![item(10, FeedSource::MealPlan, at(2, 9))];
        let merged = merge_feed(tips, plans);
        let tagged: Vec<_> = merged.iter().map(|i| (i.source, i.id)).collect();
        assert_eq!(
            tagged,
            vec![
                (FeedSource::RecipeTip, 1),
                (FeedSource::RecipeTip, 2),
                (FeedSource::MealPlan, 10),
            ]
        );
    }

    #[test]
    fn feed_queries_caps_filters_and_actions() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            let ana = add_user(c, "ana", Role::Resident, UserStatus::Approved, None);
            let ben = add_user(c, "ben", Role::Resident, UserStatus::Approved, None);
            for i in 0..105 {
                add_post(c, ana, if i % 2 == 0 { "recipe" } else { "tip" }, "post", 1, "2025-02-01 10:00:00");
            }
            add_post(c, ben, "tip", "ben tip", 7, "2025-02-03 10:00:00");
            let plan = add_plan(c, ben, "Week of greens", "2025-02-02 10:00:00");

            let all = feed_items(c, None)?;
            assert_eq!(all.len(), 100 + 1);
            assert_eq!(all[0].title, "ben tip");
            assert_eq!(all[1].source, FeedSource::MealPlan);

            let plans_only = feed_items(c, Some(PostType::MealPlan))?;
            assert_eq!(plans_only.len(), 1);
            let tips_only = feed_items(c, Some(PostType::Tip))?;
            assert!(tips_only.iter().all(|i| i.post_type == PostType::Tip));

            let stats = feed_stats(c)?;
            assert_eq!(stats.total_posts, 107);
            assert_eq!(stats.recipes, 53);
            assert_eq!(stats.tips, 53);
            assert_eq!(stats.meal_plans, 1);
            assert_eq!(stats.total_engagement, 112);

            let top = top_contributors(c, 5)?;
            assert_eq!(top[0].user_id, ana);
            assert_eq!(top[0].post_count, 105);

            assert_eq!(toggle_visibility(c, FeedSource::MealPlan, plan)?, Some(false));
            assert_eq!(toggle_featured(c, 1)?, Some(true));
            assert!(delete_post(c, FeedSource::MealPlan, plan)?);
            assert!(!delete_post(c, FeedSource::MealPlan, plan)?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn missing_tables_yield_empty_feed() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            c.execute_batch("DROP TABLE recipes_tips; DROP TABLE meal_plans;")?;
            assert!(feed_items(c, None)?.is_empty());
            assert_eq!(feed_stats(c)?, FeedStats::default());
            assert!(top_contributors(c, 5)?.is_empty());
            Ok(())
        })
        .unwrap();
    }
}

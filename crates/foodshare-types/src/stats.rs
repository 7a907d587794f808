//! Summary numbers shown on the stat cards of each admin page.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    /// Every account that is not archived.
    pub total: i64,
    pub admins: i64,
    pub residents: i64,
    pub officers: i64,
    pub active: i64,
    pub pending: i64,
    pub archived: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DonationStats {
    pub total: i64,
    pub available: i64,
    pub reserved: i64,
    pub claimed: i64,
    pub expired: i64,
    pub today: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpiredStats {
    pub expired_total: i64,
    pub expired_today: i64,
    pub expired_week: i64,
    pub expired_month: i64,
    pub expiring_soon: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementStats {
    pub total: i64,
    pub published: i64,
    pub draft: i64,
    pub archived: i64,
    pub pinned: i64,
    pub total_engagement: i64,
    pub today: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengeStats {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
    pub draft: i64,
    pub total_participants: i64,
    /// Percentage of participants who completed, one decimal.
    pub avg_completion: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedStats {
    pub total_posts: i64,
    pub recipes: i64,
    pub tips: i64,
    pub meal_plans: i64,
    pub total_engagement: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsStats {
    pub total_users: i64,
    pub active_users: i64,
    pub total_donations: i64,
    pub total_posts: i64,
    pub total_challenges: i64,
    pub total_engagement: i64,
    pub growth_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStats {
    pub total_users: i64,
    pub total_donations: i64,
    pub total_posts: i64,
    pub total_challenges: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

/// Series backing the analytics dashboard charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsCharts {
    pub user_growth: Vec<DatedCount>,
    pub donation_trends: Vec<DatedCount>,
    pub user_types: Vec<LabelCount>,
    pub donation_status: Vec<LabelCount>,
    pub post_types: Vec<LabelCount>,
    pub top_contributors: Vec<crate::models::Contributor>,
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::{AnalyticsPeriod, ReportType, Role};
use crate::models::{
    Announcement, Challenge, ChallengeParticipant, Contributor, FeedItem, FoodDonation, Paged,
    ProgressEntry, UserAccount,
};
use crate::stats::{
    AnalyticsCharts, AnalyticsStats, AnnouncementStats, ChallengeStats, DonationStats,
    ExpiredStats, FeedStats, ReportStats, UserStats,
};

// -- JWT Claims --

/// Bearer token claims. `sub` is the account's `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub token: String,
}

// -- Action envelope --

/// `{success, message, ...extra}` returned by every page action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            extra: Map::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            extra: Map::new(),
        }
    }

    /// Attach an extra top-level field to the envelope.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.extra.insert(key.to_string(), value);
        self
    }
}

// -- Page query strings --
//
// Every field is kept as raw text so a malformed value degrades to
// "no filter" instead of rejecting the request.

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DonationListQuery {
    pub status: Option<String>,
    pub approval: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnnouncementListQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChallengeListQuery {
    pub status: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgressQuery {
    pub challenge: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub export: Option<String>,
    pub report_type: Option<String>,
    pub format: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

// -- Page payloads --

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersPage {
    pub stats: UserStats,
    pub users: Paged<UserAccount>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub user: UserAccount,
    pub recent_donations: Vec<FoodDonation>,
    pub recent_announcements: Vec<Announcement>,
    pub recent_challenges: Vec<ProgressEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DonationsPage {
    pub stats: DonationStats,
    pub donations: Paged<FoodDonation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalsPage {
    pub pending: Paged<FoodDonation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpiredPage {
    pub stats: ExpiredStats,
    pub expired: Vec<FoodDonation>,
    pub expiring_soon: Vec<FoodDonation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnouncementsPage {
    pub stats: AnnouncementStats,
    pub announcements: Paged<Announcement>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengesPage {
    pub stats: ChallengeStats,
    pub challenges: Paged<Challenge>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParticipantsPage {
    pub challenge: Challenge,
    pub participants: Vec<ChallengeParticipant>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressPage {
    pub entries: Vec<ProgressEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedPage {
    pub stats: FeedStats,
    pub posts: Vec<FeedItem>,
    pub top_contributors: Vec<Contributor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyticsPage {
    pub period: AnalyticsPeriod,
    pub period_label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub stats: AnalyticsStats,
    pub charts: AnalyticsCharts,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportsPage {
    pub stats: ReportStats,
    pub report_types: Vec<ReportType>,
}

/// Body of a JSON report download.
#[derive(Debug, Serialize)]
pub struct ExportEnvelope<'a, T: Serialize> {
    pub report_type: ReportType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub generated_at: NaiveDateTime,
    pub total_records: usize,
    pub data: &'a [T],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_flattens_extras() {
        let resp = ActionResponse::ok("Donation approved successfully!").with("donation_id", 7);
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["message"], "Donation approved successfully!");
        assert_eq!(v["donation_id"], 7);
    }
}

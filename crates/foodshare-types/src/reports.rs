//! Row shapes of the exportable reports.
//!
//! Each row type fixes its column list once in [`ReportRecord::HEADERS`];
//! [`ReportRecord::fields`] must yield values in exactly that order.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::enums::{
    ChallengeCategory, ChallengeStatus, ChallengeType, DonationStatus, PostType, Role, UserStatus,
};

const DATE: &str = "%Y-%m-%d";
const DATE_TIME: &str = "%Y-%m-%d %H:%M";

pub trait ReportRecord: Serialize {
    const HEADERS: &'static [&'static str];

    fn fields(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Serialize)]
pub struct UserReportRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub registered_at: NaiveDateTime,
    pub last_activity: NaiveDateTime,
}

impl ReportRecord for UserReportRow {
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Name",
        "Email",
        "Role",
        "Status",
        "Registration Date",
        "Last Login",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.email.clone(),
            self.role.to_string(),
            self.status.to_string(),
            self.registered_at.format(DATE).to_string(),
            self.last_activity.format(DATE_TIME).to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DonationReportRow {
    pub id: i64,
    pub title: String,
    pub donor: String,
    pub food_type: String,
    pub status: DonationStatus,
    pub views: i64,
    pub created_at: NaiveDateTime,
}

impl ReportRecord for DonationReportRow {
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Title",
        "Donor",
        "Food Type",
        "Status",
        "Views",
        "Created Date",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            self.donor.clone(),
            self.food_type.clone(),
            self.status.to_string(),
            self.views.to_string(),
            self.created_at.format(DATE_TIME).to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsfeedReportRow {
    pub id: i64,
    pub post_type: PostType,
    pub title: String,
    pub author: String,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub views: i64,
    pub created_at: NaiveDateTime,
}

impl ReportRecord for NewsfeedReportRow {
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Type",
        "Title",
        "Author",
        "Likes",
        "Comments",
        "Shares",
        "Views",
        "Created Date",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.post_type.to_string(),
            self.title.clone(),
            self.author.clone(),
            self.likes.to_string(),
            self.comments.to_string(),
            self.shares.to_string(),
            self.views.to_string(),
            self.created_at.format(DATE_TIME).to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeReportRow {
    pub id: i64,
    pub title: String,
    pub challenge_type: ChallengeType,
    pub category: ChallengeCategory,
    pub participants: i64,
    pub completed: i64,
    pub points: i64,
    pub status: ChallengeStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ReportRecord for ChallengeReportRow {
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Title",
        "Type",
        "Category",
        "Participants",
        "Completed",
        "Points",
        "Status",
        "Start Date",
        "End Date",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            self.challenge_type.to_string(),
            self.category.to_string(),
            self.participants.to_string(),
            self.completed.to_string(),
            self.points.to_string(),
            self.status.to_string(),
            self.start_date.format(DATE).to_string(),
            self.end_date.format(DATE).to_string(),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngagementReportRow {
    pub date: NaiveDate,
    pub new_users: i64,
    pub new_donations: i64,
    pub new_posts: i64,
    pub engagement: i64,
}

impl ReportRecord for EngagementReportRow {
    const HEADERS: &'static [&'static str] = &[
        "Date",
        "New Users",
        "New Donations",
        "New Posts",
        "Total Engagement",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.date.format(DATE).to_string(),
            self.new_users.to_string(),
            self.new_donations.to_string(),
            self.new_posts.to_string(),
            self.engagement.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
    }

    #[test]
    fn every_row_matches_its_header_width() {
        let user = UserReportRow {
            id: 1,
            name: "Ana".into(),
            email: "ana@example.com".into(),
            role: Role::Resident,
            status: UserStatus::Approved,
            registered_at: ts(),
            last_activity: ts(),
        };
        assert_eq!(user.fields().len(), UserReportRow::HEADERS.len());

        let donation = DonationReportRow {
            id: 1,
            title: "Bread".into(),
            donor: "Ana".into(),
            food_type: "bakery".into(),
            status: DonationStatus::Available,
            views: 3,
            created_at: ts(),
        };
        assert_eq!(donation.fields().len(), DonationReportRow::HEADERS.len());

        let post = NewsfeedReportRow {
            id: 1,
            post_type: PostType::Tip,
            title: "Freeze bread".into(),
            author: "Ana".into(),
            likes: 1,
            comments: 2,
            shares: 3,
            views: 4,
            created_at: ts(),
        };
        assert_eq!(post.fields().len(), NewsfeedReportRow::HEADERS.len());

        let challenge = ChallengeReportRow {
            id: 1,
            title: "Zero waste week".into(),
            challenge_type: ChallengeType::Weekly,
            category: ChallengeCategory::WasteReduction,
            participants: 4,
            completed: 1,
            points: 10,
            status: ChallengeStatus::Active,
            start_date: day(),
            end_date: day(),
        };
        assert_eq!(challenge.fields().len(), ChallengeReportRow::HEADERS.len());

        let engagement = EngagementReportRow {
            date: day(),
            new_users: 1,
            new_donations: 2,
            new_posts: 3,
            engagement: 4,
        };
        assert_eq!(engagement.fields().len(), EngagementReportRow::HEADERS.len());
    }

    #[test]
    fn dates_use_report_formats() {
        let row = EngagementReportRow {
            date: day(),
            new_users: 0,
            new_donations: 0,
            new_posts: 0,
            engagement: 0,
        };
        assert_eq!(row.fields()[0], "2025-03-04");
    }
}

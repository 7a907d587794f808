use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::enums::{
    AnnouncementStatus, AnnouncementType, ApprovalStatus, ChallengeCategory, ChallengeStatus,
    ChallengeType, DonationStatus, FeedSource, PostType, Priority, Role, UserStatus,
};

// -- Users --

/// An account as shown to administrators. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: i64,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub phone_number: Option<String>,
    /// Purok the user lives in.
    pub address: Option<String>,
    pub profile_img: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// -- Donations --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodDonation {
    pub id: i64,
    pub user_id: i64,
    pub donor_name: String,
    pub title: String,
    pub description: String,
    pub food_type: String,
    pub quantity: Option<String>,
    pub status: DonationStatus,
    pub approval_status: Option<ApprovalStatus>,
    pub expiry_date: Option<NaiveDateTime>,
    pub images: Vec<String>,
    pub views_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// -- Announcements --

/// Metadata of a file attached to an announcement, stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub path: String,
    pub original_name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub user_id: i64,
    pub author_name: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: AnnouncementType,
    pub priority: Priority,
    pub status: AnnouncementStatus,
    pub is_pinned: bool,
    pub images: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub shares_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Announcement {
    pub fn engagement(&self) -> i64 {
        self.likes_count + self.comments_count + self.shares_count
    }

    /// Every stored file this announcement references.
    pub fn file_paths(&self) -> Vec<String> {
        self.images
            .iter()
            .cloned()
            .chain(self.attachments.iter().map(|a| a.path.clone()))
            .collect()
    }
}

// -- Challenges --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub challenge_type: ChallengeType,
    pub category: ChallengeCategory,
    pub points: i64,
    pub target_value: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ChallengeStatus,
    pub banner_image: Option<String>,
    pub prize_description: Option<String>,
    pub created_by: Option<i64>,
    pub creator_name: Option<String>,
    pub participant_count: i64,
    pub completed_count: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeParticipant {
    pub participant_id: i64,
    pub challenge_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub profile_img: Option<String>,
    pub progress: i64,
    pub completed: bool,
    pub completed_at: Option<NaiveDateTime>,
    pub points_earned: i64,
    pub joined_at: NaiveDateTime,
    pub target_value: i64,
}

/// Human label for a participant's standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressLabel {
    #[serde(rename = "Completed")]
    Completed,
    /// Reached the target but not yet flagged complete.
    #[serde(rename = "Pending Completion")]
    PendingCompletion,
    #[serde(rename = "In Progress")]
    InProgress,
}

impl ProgressLabel {
    pub fn derive(completed: bool, progress: i64, target_value: i64) -> Self {
        if completed {
            Self::Completed
        } else if progress >= target_value {
            Self::PendingCompletion
        } else {
            Self::InProgress
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub challenge_id: i64,
    pub challenge_title: String,
    pub category: ChallengeCategory,
    pub target_value: i64,
    pub challenge_points: i64,
    pub progress: i64,
    pub completed: bool,
    pub points_earned: i64,
    pub joined_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub status: ProgressLabel,
}

// -- Newsfeed --

/// A recipe, tip or meal plan on the merged newsfeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: i64,
    pub source: FeedSource,
    pub post_type: PostType,
    pub user_id: i64,
    pub author_name: String,
    pub title: String,
    pub is_public: bool,
    pub featured: bool,
    pub likes_count: i64,
    pub comments_count: i64,
    pub shares_count: i64,
    pub views_count: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub user_id: i64,
    pub full_name: String,
    pub profile_img: Option<String>,
    pub post_count: i64,
    pub engagement: i64,
}

// -- Pagination --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paged<T> {
    pub rows: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Paged<T> {
    pub fn empty(page: u32, per_page: u32) -> Self {
        Self {
            rows: Vec::new(),
            total: 0,
            page,
            per_page,
            total_pages: 0,
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned when a string does not name any variant of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Declares a closed enumeration stored as text in the database.
///
/// Generates `as_str`, `ALL`, `Display`, `FromStr` and serde impls that all
/// agree on the same wire strings.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum! {
    Role ("role") {
        Admin => "admin",
        Resident => "resident",
        TeamOfficer => "team officer",
    }
}

text_enum! {
    /// Account lifecycle. `Inactive` is the soft-delete ("archived") state.
    UserStatus ("user status") {
        Pending => "pending",
        Approved => "approved",
        Inactive => "inactive",
        Rejected => "rejected",
    }
}

text_enum! {
    DonationStatus ("donation status") {
        Available => "available",
        Reserved => "reserved",
        Claimed => "claimed",
        Expired => "expired",
    }
}

text_enum! {
    /// Moderation flag, independent of [`DonationStatus`].
    ApprovalStatus ("approval status") {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    AnnouncementStatus ("announcement status") {
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
}

text_enum! {
    AnnouncementType ("announcement type") {
        Announcement => "announcement",
        Guideline => "guideline",
        Reminder => "reminder",
        Alert => "alert",
    }
}

text_enum! {
    Priority ("priority") {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

text_enum! {
    ChallengeStatus ("challenge status") {
        Draft => "draft",
        Active => "active",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    ChallengeType ("challenge type") {
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
        Special => "special",
    }
}

text_enum! {
    ChallengeCategory ("challenge category") {
        Donation => "donation",
        WasteReduction => "waste_reduction",
        Recipe => "recipe",
        Community => "community",
        Sustainability => "sustainability",
    }
}

text_enum! {
    /// Post kinds shown on the merged newsfeed.
    PostType ("post type") {
        Recipe => "recipe",
        Tip => "tip",
        MealPlan => "meal_plan",
    }
}

text_enum! {
    /// Backing table of a merged feed item.
    FeedSource ("feed source") {
        RecipeTip => "recipe_tip",
        MealPlan => "meal_plan",
    }
}

text_enum! {
    ReportType ("report type") {
        Users => "users",
        Donations => "donations",
        Newsfeeds => "newsfeeds",
        Challenges => "challenges",
        Engagement => "engagement",
    }
}

text_enum! {
    ExportFormat ("export format") {
        Csv => "csv",
        Json => "json",
    }
}

text_enum! {
    AnalyticsPeriod ("period") {
        Week => "7days",
        Month => "30days",
        Quarter => "90days",
        Year => "year",
    }
}

text_enum! {
    /// Filter for the cross-challenge progress table.
    ProgressFilter ("progress filter") {
        Completed => "completed",
        InProgress => "in_progress",
    }
}

impl PostType {
    /// Which table stores posts of this kind.
    pub fn source(self) -> FeedSource {
        match self {
            Self::Recipe | Self::Tip => FeedSource::RecipeTip,
            Self::MealPlan => FeedSource::MealPlan,
        }
    }
}

impl AnalyticsPeriod {
    pub fn days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Week => "Last 7 Days",
            Self::Month => "Last 30 Days",
            Self::Quarter => "Last 90 Days",
            Self::Year => "Last Year",
        }
    }
}

impl Default for AnalyticsPeriod {
    fn default() -> Self {
        Self::Month
    }
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::Csv
    }
}

/// Parse an optional query-string filter.
///
/// Empty strings, `"all"` and values outside the enumeration all mean
/// "no filter".
pub fn parse_filter<T: FromStr>(raw: Option<&str>) -> Option<T> {
    let raw = raw?.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return None;
    }
    raw.parse().ok()
}

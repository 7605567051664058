use serde::{Deserialize, Serialize};
use std::fmt;

/// A registration row that passed the loader's field checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// 1-based position of the row in the input (header excluded)
    pub row_number: usize,
    pub name: String,
    pub email: String,
    pub skillsboost_email: String,
    pub phone: String,
    /// Public profile URL; `None` when the cell was blank
    pub profile_url: Option<String>,
    pub terms_accepted: bool,
}

/// Digits-only form of a phone number, used purely as a grouping key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPhone(String);

impl NormalizedPhone {
    /// Strip everything but ASCII digits. Returns `None` when no digit remains.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            None
        } else {
            Some(Self(digits))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Position of a record inside its duplicate group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateRole {
    /// Only member of its group
    Unique,
    /// First occurrence of a shared phone number
    Primary,
    /// Any later occurrence of a shared phone number
    Secondary,
}

/// Duplicate detector output for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateStatus {
    pub role: DuplicateRole,
    /// 1-based group ordinal in first-seen order; `None` when the phone has no digits
    pub group_id: Option<usize>,
    /// 1-based position inside the group
    pub position: usize,
}

impl DuplicateStatus {
    pub fn unique(group_id: Option<usize>) -> Self {
        Self {
            role: DuplicateRole::Unique,
            group_id,
            position: 1,
        }
    }

    /// True for every member of a group holding more than one record
    pub fn is_duplicate(&self) -> bool {
        self.role != DuplicateRole::Unique
    }

    pub fn is_secondary(&self) -> bool {
        self.role == DuplicateRole::Secondary
    }
}

/// Outcome of the profile fetch for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Ok,
    NotFound,
    FetchFailed,
    SkippedNoUrl,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Ok => "ok",
            FetchStatus::NotFound => "not_found",
            FetchStatus::FetchFailed => "fetch_failed",
            FetchStatus::SkippedNoUrl => "skipped_no_url",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a profile shows prior activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileEmptiness {
    /// No badges, no points, no league
    Empty,
    /// At least one badge, point or league membership
    Active,
    /// The page could not be read, so nothing is known
    Unknown,
}

/// Enrichment result for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub creation_year: Option<i32>,
    pub badge_count: u32,
    /// League name, empty when the profile shows none
    pub league: String,
    pub points: Option<u32>,
    /// Display identity shown on the profile page, if any
    pub identity: Option<String>,
    pub fetch_status: FetchStatus,
    /// External calls made while enriching; zero when none were attempted
    #[serde(default)]
    pub attempts: u32,
}

impl ProfileSnapshot {
    /// Snapshot carrying only a status; every profile field unknown or zero
    pub fn without_profile(fetch_status: FetchStatus) -> Self {
        Self {
            creation_year: None,
            badge_count: 0,
            league: String::new(),
            points: None,
            identity: None,
            fetch_status,
            attempts: 0,
        }
    }

    pub fn skipped_no_url() -> Self {
        Self::without_profile(FetchStatus::SkippedNoUrl)
    }

    pub fn emptiness(&self) -> ProfileEmptiness {
        if self.fetch_status != FetchStatus::Ok {
            return ProfileEmptiness::Unknown;
        }
        let has_points = self.points.map(|p| p > 0).unwrap_or(false);
        if self.badge_count > 0 || has_points || !self.league.trim().is_empty() {
            ProfileEmptiness::Active
        } else {
            ProfileEmptiness::Empty
        }
    }

    pub fn is_empty(&self) -> bool {
        self.emptiness() == ProfileEmptiness::Empty
    }
}

/// The ten mutually exclusive qualification tiers, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualificationStatus {
    IncompleteRegistration,
    TermsDeclined,
    DuplicateEntry,
    NoProfileUrl,
    Disqualified,
    HardQualified,
    QualifiedTier2,
    FlaggedDiffAccount,
    CautionPre2025,
    ReviewNeeded,
}

impl QualificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualificationStatus::IncompleteRegistration => "INCOMPLETE_REGISTRATION",
            QualificationStatus::TermsDeclined => "TERMS_DECLINED",
            QualificationStatus::DuplicateEntry => "DUPLICATE_ENTRY",
            QualificationStatus::NoProfileUrl => "NO_PROFILE_URL",
            QualificationStatus::Disqualified => "DISQUALIFIED",
            QualificationStatus::HardQualified => "HARD_QUALIFIED",
            QualificationStatus::QualifiedTier2 => "QUALIFIED_TIER2",
            QualificationStatus::FlaggedDiffAccount => "FLAGGED_DIFF_ACCOUNT",
            QualificationStatus::CautionPre2025 => "CAUTION_PRE2025",
            QualificationStatus::ReviewNeeded => "REVIEW_NEEDED",
        }
    }

    /// All tiers in precedence order
    pub fn all() -> [QualificationStatus; 10] {
        use QualificationStatus::*;
        [
            IncompleteRegistration,
            TermsDeclined,
            DuplicateEntry,
            NoProfileUrl,
            Disqualified,
            HardQualified,
            QualifiedTier2,
            FlaggedDiffAccount,
            CautionPre2025,
            ReviewNeeded,
        ]
    }

    /// Rows that never reach profile-based evaluation
    pub fn is_invalid_entry(&self) -> bool {
        matches!(
            self,
            QualificationStatus::IncompleteRegistration
                | QualificationStatus::TermsDeclined
                | QualificationStatus::NoProfileUrl
                | QualificationStatus::DuplicateEntry
        )
    }

    pub fn is_qualified(&self) -> bool {
        matches!(
            self,
            QualificationStatus::HardQualified | QualificationStatus::QualifiedTier2
        )
    }

    pub fn requires_action(&self) -> bool {
        matches!(
            self,
            QualificationStatus::FlaggedDiffAccount
                | QualificationStatus::ReviewNeeded
                | QualificationStatus::CautionPre2025
        )
    }
}

impl fmt::Display for QualificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final classification of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationResult {
    pub status: QualificationStatus,
    /// Names the specific condition that matched
    pub reason: String,
    pub is_duplicate: bool,
    pub duplicate_group_id: Option<usize>,
}

/// Column names of the registration export. Matching is by name, never position.
pub const COL_NAME: &str = "Name";
pub const COL_EMAIL: &str = "Email Address";
pub const COL_SKILLSBOOST_EMAIL: &str = "Skills Boost Email";
pub const COL_PHONE: &str = "Phone Number";
pub const COL_PROFILE_URL: &str = "Skills Boost Public Profile URL";
pub const COL_TERMS: &str = "Terms";

pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_NAME,
    COL_EMAIL,
    COL_SKILLSBOOST_EMAIL,
    COL_PHONE,
    COL_PROFILE_URL,
    COL_TERMS,
];

// Columns appended to every output row
pub const COL_IS_DUPLICATE: &str = "is_duplicate";
pub const COL_DUPLICATE_GROUP_ID: &str = "duplicate_group_id";
pub const COL_FETCH_STATUS: &str = "fetch_status";
pub const COL_CREATION_YEAR: &str = "creation_year";
pub const COL_BADGE_COUNT: &str = "badge_count";
pub const COL_LEAGUE: &str = "league";
pub const COL_POINTS: &str = "points";
pub const COL_STATUS: &str = "status";
pub const COL_REASON: &str = "reason";

// Progress export consumed by the badge-date table
pub const COL_USER_NAME: &str = "User Name";
pub const COL_USER_EMAIL: &str = "User Email";
pub const COL_PROGRESS_PROFILE_URL: &str = "Google Cloud Skills Boost Profile URL";
pub const COL_TOTAL_BADGES: &str = "Total Badges";
pub const COL_DISCORD_ID: &str = "Discord ID";

pub const DEFAULT_ACCEPTANCE_PHRASE: &str = "I accept the terms";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 1_000;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_CONCURRENCY: u32 = 1;

/// Placeholder written when a tracked badge is present but shows no earned date.
pub const DATE_NOT_FOUND: &str = "Date not found";

/// Badges tracked for the Study Jams completion table.
pub const DEFAULT_TRACKED_BADGES: [&str; 20] = [
    "The Basics of Google Cloud Compute",
    "Get Started with Cloud Storage",
    "Get Started with Pub/Sub",
    "Get Started with API Gateway",
    "Get Started with Looker",
    "Get Started with Dataplex",
    "Get Started with Google Workspace Tools",
    "App Building with AppSheet",
    "Develop with Apps Script and AppSheet",
    "Develop Gen AI Apps with Gemini and Streamlit",
    "Build a Website on Google Cloud",
    "Set Up a Google Cloud Network",
    "Store, Process, and Manage Data on Google Cloud - Console",
    "Cloud Run Functions: 3 Ways",
    "App Engine: 3 Ways",
    "Cloud Speech API: 3 Ways",
    "Analyze Speech and Language with Google APIs",
    "Monitoring in Google Cloud",
    "Prompt Design in Vertex AI",
    "Level 3: Generative AI",
];

/// Get the default tracked badge list as owned strings
pub fn default_tracked_badges() -> Vec<String> {
    DEFAULT_TRACKED_BADGES.iter().map(|b| b.to_string()).collect()
}

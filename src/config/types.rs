use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Main configuration structure for mp-spider
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub rule: RuleConfig,
    pub page: PageConfig,
    pub profile: ProfileConfig,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

/// Durable store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Switches for the response rules
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleConfig {
    /// Replace the visible article body with queue diagnostics
    #[serde(rename = "replace-post-body", default)]
    pub replace_post_body: bool,

    /// Extract and store comments
    #[serde(rename = "crawl-comments", default)]
    pub crawl_comments: bool,

    /// Answer image requests with a local placeholder
    #[serde(rename = "replace-images", default)]
    pub replace_images: bool,

    /// PNG file served when `replace-images` is on
    #[serde(rename = "replacement-image", default)]
    pub replacement_image: Option<String>,
}

/// Output format for saved article bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    #[default]
    Html,
    Text,
}

/// Forward (single-article) pagination configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PageConfig {
    /// Disables auto-advance between article pages
    #[serde(default)]
    pub disable: bool,

    /// Base delay before advancing to the next article (seconds)
    #[serde(rename = "jump-interval")]
    pub jump_interval: u64,

    /// Upper bound of the random delay added to `jump-interval` (seconds)
    #[serde(rename = "jump-random", default)]
    pub jump_random: u64,

    /// Earliest publish time of articles to visit
    #[serde(rename = "min-time")]
    pub min_time: DateTime<Utc>,

    /// Latest publish time of articles to visit, defaults to now
    #[serde(rename = "max-time", default)]
    pub max_time: Option<DateTime<Utc>>,

    /// Revisit articles whose metrics were already recorded
    #[serde(rename = "crawl-existing", default)]
    pub crawl_existing: bool,

    /// Revisit window measured from publish time (seconds)
    #[serde(rename = "crawl-existing-interval", default = "default_crawl_existing_interval")]
    pub crawl_existing_interval: u64,

    /// Restricts refills to these account ids when non-empty
    #[serde(rename = "target-accounts", default)]
    pub target_accounts: Vec<String>,

    /// Store the article body
    #[serde(rename = "save-content", default)]
    pub save_content: bool,

    /// Format of the stored article body
    #[serde(rename = "content-format", default)]
    pub content_format: ContentFormat,
}

/// Backward (account history) pagination configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Disables handing out account links to the history controller
    #[serde(default)]
    pub disable: bool,

    /// Earliest publish time the history walk has to reach
    #[serde(rename = "min-time")]
    pub min_time: DateTime<Utc>,

    /// Delay between scroll steps and between next-link polls (seconds)
    #[serde(rename = "jump-interval")]
    pub jump_interval: u64,

    /// Accounts opened more recently than this are not revisited (seconds)
    #[serde(rename = "revisit-interval", default = "default_revisit_interval")]
    pub revisit_interval: u64,

    /// Restricts account refills to these account ids when non-empty
    #[serde(rename = "target-accounts", default)]
    pub target_accounts: Vec<String>,
}

/// Proxy basic-auth credentials
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

fn default_crawl_existing_interval() -> u64 {
    24 * 60 * 60
}

fn default_revisit_interval() -> u64 {
    24 * 60 * 60
}

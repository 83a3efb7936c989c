use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use interfaces::CollaboratorError;

/// Minutes between "now" and the earliest slot a fresh run may book.
pub const SAFETY_MARGIN_MINUTES: u32 = 20;

/// Collections Instagram creates implicitly; they never carry directives.
pub const DEFAULT_IGNORED_COLLECTIONS: [&str; 2] = ["All posts", "All Posts"];

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub post_cron: String,
    pub story_cron: String,
    /// Symmetric random offset applied to each post slot, in minutes.
    pub post_jitter_minutes: u32,
    /// Symmetric random offset applied to each story slot, in minutes.
    pub story_jitter_minutes: u32,
    pub safety_margin_minutes: u32,
    pub caption_template: String,
    pub fallback_hashtags: Vec<String>,
    pub ignored_collections: HashSet<String>,
    /// Stop after this many successful schedules. `None` drains every collection.
    pub target_total: Option<u32>,
    /// Base delay of the retry backoff; the n-th consecutive failure waits `unit * 2^n`.
    pub backoff_unit: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            post_cron: "0 12 * * *".to_string(),
            story_cron: "0 18 * * *".to_string(),
            post_jitter_minutes: 0,
            story_jitter_minutes: 0,
            safety_margin_minutes: SAFETY_MARGIN_MINUTES,
            caption_template: "{caption}".to_string(),
            fallback_hashtags: Vec::new(),
            ignored_collections: DEFAULT_IGNORED_COLLECTIONS.iter().map(|s| s.to_string()).collect(),
            target_total: None,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaFetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Videos shorter than this are looped until they reach it.
    pub min_video_seconds: f64,
}

impl Default for MediaFetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) ig-mbs-scheduler/0.1".to_string(),
            timeout_seconds: 60,
            max_retries: 3,
            retry_delay_seconds: 2,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            min_video_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub webdriver_url: String,
    pub browser_binary: Option<String>,
    /// Persistent browser profile, so logins survive between runs.
    pub profile_dir: PathBuf,
    pub timeout: Duration,
    /// How long publishing may wait for uploads to finish.
    pub upload_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            browser_binary: None,
            profile_dir: PathBuf::from(".ig-mbs-scheduler"),
            timeout: Duration::from_secs(5),
            upload_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Progress of one scheduling run. Lives in memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub scheduled: u32,
    pub consecutive_failures: u32,
    pub target_total: Option<u32>,
}

impl RunState {
    pub fn new(target_total: Option<u32>) -> Self {
        Self {
            scheduled: 0,
            consecutive_failures: 0,
            target_total,
        }
    }

    pub fn record_success(&mut self) {
        self.scheduled += 1;
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn target_reached(&self) -> bool {
        matches!(self.target_total, Some(target) if self.scheduled >= target)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid cron spec '{expression}': {reason}")]
    InvalidCronSpec { expression: String, reason: String },

    #[error("Invalid caption template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cron spec '{expression}' has no occurrence after {after}")]
    ScheduleExhausted { expression: String, after: String },

    #[error("Collection '{name}' has no items")]
    EmptyCollection { name: String },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchedulerError {
    /// Configuration errors abort the run; everything else is retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::InvalidCronSpec { .. }
                | SchedulerError::InvalidTemplate(_)
                | SchedulerError::InvalidConfig(_)
                | SchedulerError::Collaborator(CollaboratorError::InvalidTemplate(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

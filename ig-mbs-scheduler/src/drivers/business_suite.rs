//! Meta Business Suite planner automation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone};
use interfaces::{CollaboratorError, PublishTarget, Result, Timestamp};
use tracing::info;

use super::locators::business_suite as xpaths;
use crate::types::DriverConfig;
use crate::webdriver::WebDriverSession;

/// Formats the scheduled-content tables have been seen to use.
const LABEL_FORMATS: [&str; 8] = [
    "%b %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%a, %b %d, %Y %I:%M %p",
    "%A, %B %d, %Y %I:%M %p",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M",
    "%d/%m/%Y, %H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a scheduled-date label such as `Oct 16, 2026 at 9:00 AM`.
pub fn parse_schedule_label(label: &str) -> Option<Timestamp> {
    let normalized = label
        .replace(" at ", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if normalized.is_empty() {
        return None;
    }

    LABEL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

/// Parse every non-blank label of a scheduled-content table, sorted ascending.
///
/// A label that matches no known format fails the whole listing: dropping it
/// would hide an existing booking from the caller.
pub fn parse_schedule_labels<S: AsRef<str>>(labels: &[S]) -> Result<Vec<Timestamp>> {
    let mut times = Vec::with_capacity(labels.len());
    for label in labels.iter().map(AsRef::as_ref) {
        if label.trim().is_empty() {
            continue;
        }
        let at = parse_schedule_label(label)
            .ok_or_else(|| CollaboratorError::Driver(format!("unrecognised schedule label '{}'", label)))?;
        times.push(at);
    }
    times.sort();
    Ok(times)
}

/// Pick the files one submission may carry.
///
/// The composer accepts either photos or videos, never both. Videos win when
/// there are no photos, or when there are videos and videos are preferred.
pub fn select_upload_files(files: &[PathBuf], prefer_video: bool) -> Vec<PathBuf> {
    let (mut videos, mut photos): (Vec<PathBuf>, Vec<PathBuf>) = files
        .iter()
        .cloned()
        .partition(|path| path.extension().is_some_and(|ext| ext == "mp4"));
    videos.sort();
    photos.sort();

    if photos.is_empty() || (!videos.is_empty() && prefer_video) {
        videos
    } else {
        photos
    }
}

pub struct BusinessSuiteDriver {
    session: WebDriverSession,
    asset_id: String,
    prefer_video: bool,
    timeout: Duration,
    upload_timeout: Duration,
}

impl BusinessSuiteDriver {
    pub async fn start(config: &DriverConfig, session_id: &str, asset_id: &str, prefer_video: bool) -> Result<Self> {
        let session = WebDriverSession::start(config, &format!("mbs/{}", session_id)).await?;
        Ok(Self {
            session,
            asset_id: asset_id.to_string(),
            prefer_video,
            timeout: config.timeout,
            upload_timeout: config.upload_timeout,
        })
    }

    pub async fn quit(&self) -> Result<()> {
        self.session.quit().await
    }

    fn home_url(&self) -> String {
        format!("https://business.facebook.com/latest/home?asset_id={}", self.asset_id)
    }

    async fn scheduled_times(&self, page: &str, xpath: &str, kind: &str) -> Result<Vec<Timestamp>> {
        let url = format!(
            "https://business.facebook.com/latest/posts/{}?asset_id={}",
            page, self.asset_id
        );
        self.session.goto(&url).await?;

        let spans = match self.session.wait_for_all(xpath, self.timeout).await {
            Ok(spans) => spans,
            Err(CollaboratorError::Timeout { .. }) => {
                info!("No {} scheduled", kind);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut labels = Vec::with_capacity(spans.len());
        for span in &spans {
            labels.push(self.session.text(span).await?);
        }
        let times = parse_schedule_labels(&labels)?;

        info!("Successfully got scheduled {} dates: {:?}", kind, times);
        Ok(times)
    }

    async fn pick_date(&self, at: Timestamp) -> Result<()> {
        let date_input = self
            .session
            .wait_for_clickable(xpaths::SCHEDULE_DATE_INPUT, self.timeout)
            .await?;
        self.session.click(&date_input).await?;
        self.session.clear(&date_input).await?;
        self.session
            .send_keys(&date_input, &at.format("%d/%m/%Y").to_string())
            .await?;

        for (xpath, format) in [
            (xpaths::SCHEDULE_HOUR_INPUT, "%I"),
            (xpaths::SCHEDULE_MINUTE_INPUT, "%M"),
            (xpaths::SCHEDULE_PERIOD_INPUT, "%p"),
        ] {
            let input = self.session.find(xpath).await?;
            self.session.click(&input).await?;
            self.session.send_keys(&input, &at.format(format).to_string()).await?;
        }

        let save = self.session.find(xpaths::SCHEDULE_SAVE_BUTTON).await?;
        self.session.click(&save).await
    }

    /// Toggle the Facebook and Instagram placement switches to the wanted state.
    async fn select_placement(&self, facebook: bool, instagram: bool) -> Result<()> {
        let switches = self.session.find_all(xpaths::SCHEDULE_PLACEMENT_INPUTS).await?;
        let [facebook_switch, instagram_switch] = switches.as_slice() else {
            return Err(CollaboratorError::ElementNotFound {
                locator: format!("{} (expected 2, found {})", xpaths::SCHEDULE_PLACEMENT_INPUTS, switches.len()),
            });
        };

        for (switch, wanted) in [(facebook_switch, facebook), (instagram_switch, instagram)] {
            let selected = self.session.attribute(switch, "aria-checked").await?.as_deref() == Some("true");
            if selected != wanted {
                self.session.click(switch).await?;
            }
        }
        Ok(())
    }

    async fn choose_files(&self, media_dir: &Path) -> Result<()> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(media_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            files.push(entry.path());
        }

        let selected = select_upload_files(&files, self.prefer_video);
        if selected.is_empty() {
            return Err(CollaboratorError::Submission(format!(
                "no media to upload in {}",
                media_dir.display()
            )));
        }
        let paths: Vec<String> = selected
            .iter()
            .map(|path| std::fs::canonicalize(path).map(|p| p.display().to_string()))
            .collect::<std::io::Result<_>>()?;

        let input = self.session.find(xpaths::SCHEDULE_FILE_INPUT).await?;
        self.session.send_keys(&input, &paths.join("\n")).await?;
        info!("Attached {} file(s) from {}", paths.len(), media_dir.display());
        Ok(())
    }

    async fn publish_schedule(&self) -> Result<()> {
        let publish = self
            .session
            .wait_for_clickable(xpaths::SCHEDULE_PUBLISH_DIV, self.upload_timeout)
            .await
            .map_err(|e| CollaboratorError::Submission(format!("upload did not finish: {}", e)))?;
        self.session.click(&publish).await
    }
}

#[async_trait]
impl PublishTarget for BusinessSuiteDriver {
    async fn list_scheduled_post_times(&self) -> Result<Vec<Timestamp>> {
        self.scheduled_times("scheduled_posts", xpaths::SCHEDULED_POST_DATE_SPANS, "post")
            .await
    }

    async fn list_scheduled_story_times(&self) -> Result<Vec<Timestamp>> {
        self.scheduled_times("scheduled_stories", xpaths::SCHEDULED_STORY_DATE_SPANS, "story")
            .await
    }

    async fn schedule_post(&self, at: Timestamp, media_dir: &Path, caption: &str) -> Result<()> {
        self.session.goto(&self.home_url()).await?;
        let create = self
            .session
            .wait_for_clickable(xpaths::PLANNER_SCHEDULE_POST_DIV, self.timeout)
            .await?;
        self.session.click(&create).await?;

        self.pick_date(at).await?;
        self.select_placement(false, true).await?;

        let caption_div = self.session.find(xpaths::SCHEDULE_CAPTION_DIV).await?;
        self.session.click(&caption_div).await?;
        self.session.send_keys(&caption_div, caption).await?;

        self.choose_files(media_dir).await?;
        self.publish_schedule().await?;

        info!("Successfully scheduled post for {}", at);
        Ok(())
    }

    async fn schedule_story(&self, at: Timestamp, media_dir: &Path) -> Result<()> {
        self.session.goto(&self.home_url()).await?;
        let dropdown = self
            .session
            .wait_for_clickable(xpaths::PLANNER_DROPDOWN_DIV, self.timeout)
            .await?;
        self.session.click(&dropdown).await?;
        let create_story = self.session.find(xpaths::PLANNER_SCHEDULE_STORY_DIV).await?;
        self.session.click(&create_story).await?;

        self.pick_date(at).await?;
        self.select_placement(false, true).await?;

        self.choose_files(media_dir).await?;
        self.publish_schedule().await?;

        info!("Successfully scheduled story for {}", at);
        Ok(())
    }
}

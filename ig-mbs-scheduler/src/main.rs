use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ig_mbs_scheduler::utils::{dedupe_preserving_order, normalize_hashtag};
use ig_mbs_scheduler::{
    BusinessSuiteDriver, CaptionTemplate, DriverConfig, HttpMediaFetcher, InstagramDriver, MediaFetchConfig,
    Orchestrator, OrchestratorConfig, ScheduleCursor, TemplateCaptionComposer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// A tool for scraping saved posts from Instagram, and scheduling them on Meta Business Suite.
#[derive(Parser, Debug)]
#[command(name = "ig-mbs-scheduler", version, about)]
struct Cli {
    /// Instagram account whose saved collections are re-posted.
    ig_username: String,

    /// Arbitrary identifier for the Business Suite browser profile (for example a Facebook email).
    mbs_session_id: String,

    /// Business Suite asset ID to schedule on.
    mbs_asset_id: String,

    /// Cron specification for posts, e.g. "0 12 * * *".
    post_cron_spec: String,

    /// Cron specification for stories.
    story_cron_spec: String,

    /// Caption template. Supports {caption}, {hashtags} and {user}.
    #[arg(short = 'c', long, default_value = "{caption}")]
    caption_template: String,

    /// Hashtags for {hashtags} when the original post's hashtags are not reused.
    #[arg(short = 's', long = "hashtags")]
    hashtags: Vec<String>,

    /// Saved collection names to ignore.
    #[arg(short = 'i', long = "ignore", default_values = ["All posts", "All Posts"])]
    ignore: Vec<String>,

    /// Browser element timeout (seconds).
    #[arg(short = 't', long, default_value_t = 5)]
    timeout: u64,

    /// Browser timeout when uploading content to Business Suite (seconds).
    #[arg(short = 'u', long, default_value_t = 60)]
    upload_timeout: u64,

    /// Prefer videos over photos when a carousel mixes both.
    #[arg(short = 'p', long)]
    prefer_video: bool,

    /// Random offset (+/- minutes) applied to each post slot.
    #[arg(long, default_value_t = 0)]
    post_jitter: u32,

    /// Random offset (+/- minutes) applied to each story slot.
    #[arg(long, default_value_t = 0)]
    story_jitter: u32,

    /// Number of items to schedule. Schedules everything when omitted.
    #[arg(short = 'a', long, value_parser = clap::value_parser!(u32).range(1..))]
    amount: Option<u32>,

    /// WebDriver server (e.g. chromedriver) to drive the browser through.
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    webdriver_url: String,

    /// Browser executable, when not the driver's default.
    #[arg(long, env = "BROWSER_BINARY")]
    browser_binary: Option<String>,

    /// Directory holding the persistent browser profiles.
    #[arg(long, env = "IG_MBS_PROFILE_ROOT")]
    profile_root: Option<PathBuf>,
}

impl Cli {
    fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            post_cron: self.post_cron_spec.clone(),
            story_cron: self.story_cron_spec.clone(),
            post_jitter_minutes: self.post_jitter,
            story_jitter_minutes: self.story_jitter,
            caption_template: self.caption_template.clone(),
            fallback_hashtags: dedupe_preserving_order(self.hashtags.iter().filter_map(|tag| normalize_hashtag(tag))),
            ignored_collections: self.ignore.iter().cloned().collect(),
            target_total: self.amount,
            ..OrchestratorConfig::default()
        }
    }

    fn driver_config(&self) -> anyhow::Result<DriverConfig> {
        let profile_dir = match &self.profile_root {
            Some(root) => root.clone(),
            None => dirs::home_dir()
                .context("could not determine the home directory, pass --profile-root")?
                .join(".ig-mbs-scheduler"),
        };

        Ok(DriverConfig {
            webdriver_url: self.webdriver_url.clone(),
            browser_binary: self.browser_binary.clone(),
            profile_dir,
            timeout: Duration::from_secs(self.timeout),
            upload_timeout: Duration::from_secs(self.upload_timeout),
            ..DriverConfig::default()
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.orchestrator_config();

    // Reject bad configuration before any browser is opened.
    ScheduleCursor::new(&config.post_cron).context("invalid post cron spec")?;
    ScheduleCursor::new(&config.story_cron).context("invalid story cron spec")?;
    CaptionTemplate::parse(&config.caption_template).context("invalid caption template")?;
    let driver_config = cli.driver_config()?;

    info!("Starting ig-mbs-scheduler for @{} on asset {}", cli.ig_username, cli.mbs_asset_id);

    let instagram = Arc::new(
        InstagramDriver::start(&driver_config, &cli.ig_username)
            .await
            .context("failed to start the Instagram browser session")?,
    );
    let business_suite = match BusinessSuiteDriver::start(
        &driver_config,
        &cli.mbs_session_id,
        &cli.mbs_asset_id,
        cli.prefer_video,
    )
    .await
    {
        Ok(driver) => Arc::new(driver),
        Err(e) => {
            if let Err(quit_error) = instagram.quit().await {
                warn!("Failed to close Instagram session: {}", quit_error);
            }
            return Err(e).context("failed to start the Business Suite browser session");
        }
    };

    let result = async {
        let fetcher = HttpMediaFetcher::new(MediaFetchConfig::default())?;
        let mut orchestrator = Orchestrator::new(
            instagram.clone(),
            business_suite.clone(),
            Arc::new(fetcher),
            Arc::new(TemplateCaptionComposer::new()),
            config,
        )?;
        anyhow::Ok(orchestrator.run().await?)
    }
    .await;

    if let Err(e) = instagram.quit().await {
        warn!("Failed to close Instagram session: {}", e);
    }
    if let Err(e) = business_suite.quit().await {
        warn!("Failed to close Business Suite session: {}", e);
    }

    match result {
        Ok(state) => {
            info!("Done: {} item(s) scheduled", state.scheduled);
            Ok(())
        }
        Err(e) => {
            error!("Scheduling aborted: {:#}", e);
            Err(e)
        }
    }
}

//! The scheduling loop.
//!
//! Each iteration picks a random saved item, materializes its media, composes
//! a caption, books the next post or story slot and acknowledges the item back
//! to the content source:
//!
//! ```text
//! INIT -> SELECT -> FETCH -> TRANSFORM -> SUBMIT -> CLEANUP -> SELECT | DONE
//!            ^                                          |
//!            +-------------- BACKOFF <------ (any failure)
//! ```
//!
//! Both cursors are checkpointed before every iteration and restored when it
//! fails, so a failed iteration never consumes a slot. Failures are retried
//! forever with an uncapped exponential delay; only configuration errors end
//! the run early.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use interfaces::{
    CaptionComposer, CollaboratorError, ComposedCaption, ContentItem, ContentSource, MediaFetcher, PublishTarget,
    Timestamp,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::caption::CaptionTemplate;
use crate::cursor::ScheduleCursor;
use crate::types::{OrchestratorConfig, Result, RunState, SchedulerError};
use crate::utils::time::format_duration;

/// What a single successful iteration produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Post { item_url: String, at: Timestamp },
    Story { item_url: String, at: Timestamp },
}

impl fmt::Display for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Submission::Post { item_url, at } => write!(f, "post of {} at {}", item_url, at),
            Submission::Story { item_url, at } => write!(f, "story of {} at {}", item_url, at),
        }
    }
}

#[derive(Debug)]
enum IterationOutcome {
    Scheduled(Submission),
    Exhausted,
}

/// Delay before retrying after `consecutive_failures` failures in a row.
///
/// Doubles with every failure and is never capped; the arithmetic saturates
/// at [`Duration::MAX`].
pub fn backoff_delay(unit: Duration, consecutive_failures: u32) -> Duration {
    2u32.checked_pow(consecutive_failures)
        .and_then(|factor| unit.checked_mul(factor))
        .unwrap_or(Duration::MAX)
}

pub struct Orchestrator {
    source: Arc<dyn ContentSource>,
    target: Arc<dyn PublishTarget>,
    fetcher: Arc<dyn MediaFetcher>,
    composer: Arc<dyn CaptionComposer>,
    config: OrchestratorConfig,
    post_cursor: ScheduleCursor,
    story_cursor: ScheduleCursor,
    rng: StdRng,
}

impl Orchestrator {
    /// Validate the configuration and wire the collaborators together.
    ///
    /// Fails with `InvalidCronSpec` or `InvalidTemplate` before anything
    /// remote is touched.
    pub fn new(
        source: Arc<dyn ContentSource>,
        target: Arc<dyn PublishTarget>,
        fetcher: Arc<dyn MediaFetcher>,
        composer: Arc<dyn CaptionComposer>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let post_cursor = ScheduleCursor::new(&config.post_cron)?;
        let story_cursor = ScheduleCursor::new(&config.story_cron)?;
        CaptionTemplate::parse(&config.caption_template)
            .map_err(|e| SchedulerError::InvalidTemplate(e.to_string()))?;
        if config.target_total == Some(0) {
            return Err(SchedulerError::InvalidConfig("target total must be at least 1".to_string()));
        }

        Ok(Self {
            source,
            target,
            fetcher,
            composer,
            config,
            post_cursor,
            story_cursor,
            rng: StdRng::from_entropy(),
        })
    }

    /// Replace the random source, e.g. with a seeded one for reproducible runs.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn post_cursor(&self) -> &ScheduleCursor {
        &self.post_cursor
    }

    pub fn story_cursor(&self) -> &ScheduleCursor {
        &self.story_cursor
    }

    /// Run until every eligible collection is drained or the target is reached.
    ///
    /// Only start-up failures (reading the remote queue) and configuration
    /// errors are returned; everything else is logged and retried.
    pub async fn run(&mut self) -> Result<RunState> {
        self.initialize_cursors().await?;

        let mut state = RunState::new(self.config.target_total);
        while !state.target_reached() {
            let post_checkpoint = self.post_cursor.checkpoint();
            let story_checkpoint = self.story_cursor.checkpoint();

            match self.run_iteration().await {
                Ok(IterationOutcome::Scheduled(submission)) => {
                    state.record_success();
                    info!("Scheduled {} so far ({})", state.scheduled, submission);
                }
                Ok(IterationOutcome::Exhausted) => {
                    info!("No eligible collections left");
                    break;
                }
                Err(e) if e.is_fatal() => {
                    error!("Aborting run: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    self.post_cursor.restore(post_checkpoint);
                    self.story_cursor.restore(story_checkpoint);

                    let delay = backoff_delay(self.config.backoff_unit, state.consecutive_failures);
                    match &e {
                        SchedulerError::Collaborator(CollaboratorError::MalformedCollectionName { name }) => {
                            warn!("Skipping iteration, collection '{}' needs renaming: {}", name, e)
                        }
                        SchedulerError::EmptyCollection { name } => {
                            warn!("Collection '{}' listed no items", name)
                        }
                        _ => warn!("An error occurred: {}", e),
                    }
                    warn!(
                        "Retrying in {} (consecutive failures: {})",
                        format_duration(delay),
                        state.consecutive_failures + 1
                    );

                    tokio::time::sleep(delay).await;
                    state.record_failure();
                }
            }
        }

        info!("Run finished with {} scheduled", state.scheduled);
        Ok(state)
    }

    async fn initialize_cursors(&mut self) -> Result<()> {
        let post_times = self.target.list_scheduled_post_times().await?;
        let post_anchor = self.post_cursor.initialize(
            &post_times,
            self.config.safety_margin_minutes,
            self.config.post_jitter_minutes,
        );
        info!("{} posts already scheduled, post schedule starts after {}", post_times.len(), post_anchor);

        let story_times = self.target.list_scheduled_story_times().await?;
        let story_anchor = self.story_cursor.initialize(
            &story_times,
            self.config.safety_margin_minutes,
            self.config.story_jitter_minutes,
        );
        info!("{} stories already scheduled, story schedule starts after {}", story_times.len(), story_anchor);

        Ok(())
    }

    async fn run_iteration(&mut self) -> Result<IterationOutcome> {
        // SELECT
        let Some((collection, item_url)) = self.select().await? else {
            return Ok(IterationOutcome::Exhausted);
        };

        // FETCH
        let item = ContentItem {
            media_urls: self.source.get_media_urls(&item_url).await?,
            caption: self.source.get_caption(&item_url).await?,
            author: self.source.get_author(&item_url).await?,
            collection,
            url: item_url,
        };
        debug!("Fetched {} ({} media, author {})", item.url, item.media_urls.len(), item.author);

        // TRANSFORM
        let media_dir = tempfile::Builder::new().prefix("ig-mbs-").tempdir()?;
        self.fetcher.fetch_all(&item.media_urls, media_dir.path()).await?;
        let composed = self.composer.compose(
            &item.collection,
            item.caption.as_deref(),
            &item.author,
            &self.config.caption_template,
            &self.config.fallback_hashtags,
        )?;

        // SUBMIT
        let submission = match composed {
            ComposedCaption::Story => {
                let at = self.story_cursor.peek_next()? + self.draw_jitter(self.config.story_jitter_minutes);
                info!("Scheduling story of {} for {}", item.url, at);
                self.target.schedule_story(at, media_dir.path()).await?;
                self.story_cursor.advance()?;
                Submission::Story { item_url: item.url.clone(), at }
            }
            ComposedCaption::Post(caption) => {
                let at = self.post_cursor.peek_next()? + self.draw_jitter(self.config.post_jitter_minutes);
                info!("Scheduling post of {} for {}", item.url, at);
                self.target.schedule_post(at, media_dir.path(), &caption).await?;
                self.post_cursor.advance()?;
                Submission::Post { item_url: item.url.clone(), at }
            }
        };

        // CLEANUP
        self.cleanup(&item).await?;
        drop(media_dir);

        Ok(IterationOutcome::Scheduled(submission))
    }

    /// Pick a random eligible collection and a random item in it.
    async fn select(&mut self) -> Result<Option<(String, String)>> {
        let mut eligible: Vec<String> = self
            .source
            .list_collections()
            .await?
            .into_iter()
            .filter(|name| !self.config.ignored_collections.contains(name))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        // Sorted so that a seeded rng picks deterministically.
        eligible.sort();

        let Some(collection) = eligible.choose(&mut self.rng).cloned() else {
            return Ok(None);
        };
        debug!("Picked collection '{}' out of {} eligible", collection, eligible.len());

        let items = self.source.list_items(&collection).await?;
        let Some(item_url) = items.choose(&mut self.rng).cloned() else {
            return Err(SchedulerError::EmptyCollection { name: collection });
        };
        info!("Selected {} from collection '{}'", item_url, collection);

        Ok(Some((collection, item_url)))
    }

    async fn cleanup(&self, item: &ContentItem) -> Result<()> {
        if let Err(e) = self.source.unsave(&item.url).await {
            warn!("Failed to unsave {}, continuing: {}", item.url, e);
        }
        if let Err(e) = self.source.like(&item.url).await {
            warn!("Failed to like {}, continuing: {}", item.url, e);
        }

        if self.source.list_items(&item.collection).await?.is_empty() {
            self.source.delete_collection(&item.collection).await?;
            info!("Deleted emptied collection '{}'", item.collection);
        }
        Ok(())
    }

    fn draw_jitter(&mut self, bound_minutes: u32) -> ChronoDuration {
        let bound = i64::from(bound_minutes);
        ChronoDuration::minutes(self.rng.gen_range(-bound..=bound))
    }
}

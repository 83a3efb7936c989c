//! In-memory implementations of the collaborator traits.
//!
//! They keep everything in process and record what the scheduler asked of
//! them, which makes them suitable for dry runs and for exercising the
//! scheduling loop without a browser.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::defs::ContentSource;
use crate::defs::MediaFetcher;
use crate::defs::PublishTarget;
use crate::defs::Timestamp;
use crate::error::CollaboratorError;
use crate::error::Result;

#[derive(Clone, Debug)]
struct ItemRecord {
    media_urls: Vec<String>,
    caption: Option<String>,
    author: String,
}

#[derive(Default)]
struct SourceState {
    collections: BTreeMap<String, Vec<String>>,
    items: HashMap<String, ItemRecord>,
    unavailable: HashSet<String>,
    liked: HashSet<String>,
    unsave_failures: HashSet<String>,
    calls: Vec<String>,
}

/// Saved collections held in memory.
#[derive(Default)]
pub struct InMemoryContentSource {
    state: RwLock<SourceState>,
}

impl InMemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection.
    pub fn with_collection(mut self, name: &str) -> Self {
        self.state.get_mut().collections.entry(name.to_owned()).or_default();
        self
    }

    /// Save an item into a collection, creating the collection if needed.
    pub fn with_item(
        mut self,
        collection: &str,
        url: &str,
        media_urls: &[&str],
        caption: Option<&str>,
        author: &str,
    ) -> Self {
        let state = self.state.get_mut();
        state.collections.entry(collection.to_owned()).or_default().push(url.to_owned());
        state.items.insert(
            url.to_owned(),
            ItemRecord {
                media_urls: media_urls.iter().map(|u| u.to_string()).collect(),
                caption: caption.map(str::to_owned),
                author: author.to_owned(),
            },
        );
        self
    }

    /// Make media lookups for `url` fail as if the post had been removed.
    pub fn with_unavailable_item(mut self, url: &str) -> Self {
        self.state.get_mut().unavailable.insert(url.to_owned());
        self
    }

    /// Make `unsave` fail for `url` with a driver error.
    pub fn with_failing_unsave(mut self, url: &str) -> Self {
        self.state.get_mut().unsave_failures.insert(url.to_owned());
        self
    }

    pub async fn collection_names(&self) -> Vec<String> {
        self.state.read().await.collections.keys().cloned().collect()
    }

    pub async fn is_saved(&self, url: &str) -> bool {
        let state = self.state.read().await;
        state.collections.values().any(|items| items.iter().any(|u| u == url))
    }

    pub async fn is_liked(&self, url: &str) -> bool {
        self.state.read().await.liked.contains(url)
    }

    /// Every call made so far, as `operation:argument`.
    pub async fn calls(&self) -> Vec<String> {
        self.state.read().await.calls.clone()
    }

    async fn record(&self, call: String) {
        self.state.write().await.calls.push(call);
    }

    async fn item(&self, url: &str) -> Result<ItemRecord> {
        let state = self.state.read().await;
        if state.unavailable.contains(url) {
            return Err(CollaboratorError::ItemUnavailable { url: url.to_owned() });
        }
        state
            .items
            .get(url)
            .cloned()
            .ok_or_else(|| CollaboratorError::ItemUnavailable { url: url.to_owned() })
    }
}

#[async_trait]
impl ContentSource for InMemoryContentSource {
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.record("list_collections".to_owned()).await;
        Ok(self.collection_names().await)
    }

    async fn list_items(&self, collection: &str) -> Result<Vec<String>> {
        self.record(format!("list_items:{}", collection)).await;
        let state = self.state.read().await;
        state
            .collections
            .get(collection)
            .cloned()
            .ok_or_else(|| CollaboratorError::ElementNotFound {
                locator: format!("collection '{}'", collection),
            })
    }

    async fn get_media_urls(&self, item_url: &str) -> Result<Vec<String>> {
        self.record(format!("get_media_urls:{}", item_url)).await;
        Ok(self.item(item_url).await?.media_urls)
    }

    async fn get_caption(&self, item_url: &str) -> Result<Option<String>> {
        self.record(format!("get_caption:{}", item_url)).await;
        Ok(self.item(item_url).await?.caption)
    }

    async fn get_author(&self, item_url: &str) -> Result<String> {
        self.record(format!("get_author:{}", item_url)).await;
        Ok(self.item(item_url).await?.author)
    }

    async fn unsave(&self, item_url: &str) -> Result<()> {
        self.record(format!("unsave:{}", item_url)).await;
        let mut state = self.state.write().await;
        if state.unsave_failures.contains(item_url) {
            return Err(CollaboratorError::Driver(format!("unsave button unresponsive for {}", item_url)));
        }
        for items in state.collections.values_mut() {
            items.retain(|u| u != item_url);
        }
        Ok(())
    }

    async fn like(&self, item_url: &str) -> Result<()> {
        self.record(format!("like:{}", item_url)).await;
        self.state.write().await.liked.insert(item_url.to_owned());
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.record(format!("delete_collection:{}", name)).await;
        let mut state = self.state.write().await;
        match state.collections.get(name) {
            Some(items) if !items.is_empty() => Err(CollaboratorError::General(format!(
                "refusing to delete non-empty collection '{}'",
                name
            ))),
            Some(_) => {
                state.collections.remove(name);
                Ok(())
            }
            None => Err(CollaboratorError::ElementNotFound {
                locator: format!("collection '{}'", name),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionKind {
    Post { caption: String },
    Story,
}

/// A submission accepted by [`InMemoryPublishTarget`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledSubmission {
    pub kind: SubmissionKind,
    pub at: Timestamp,
    /// File names present in the media directory at submission time, sorted.
    pub media_files: Vec<String>,
}

/// Publishing queue held in memory.
#[derive(Default)]
pub struct InMemoryPublishTarget {
    existing_posts: Vec<Timestamp>,
    existing_stories: Vec<Timestamp>,
    submissions: RwLock<Vec<ScheduledSubmission>>,
    failures_remaining: AtomicU32,
    attempts: AtomicU32,
}

impl InMemoryPublishTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the queue with posts scheduled before this run.
    pub fn with_existing_posts(mut self, mut times: Vec<Timestamp>) -> Self {
        times.sort();
        self.existing_posts = times;
        self
    }

    /// Seed the queue with stories scheduled before this run.
    pub fn with_existing_stories(mut self, mut times: Vec<Timestamp>) -> Self {
        times.sort();
        self.existing_stories = times;
        self
    }

    /// Reject the next `count` submissions with a submission error.
    pub fn failing_next(self, count: u32) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    pub async fn submissions(&self) -> Vec<ScheduledSubmission> {
        self.submissions.read().await.clone()
    }

    /// Number of submission attempts, including rejected ones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    async fn accept(&self, kind: SubmissionKind, at: Timestamp, media_dir: &Path) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let rejected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(CollaboratorError::Submission(format!("publish rejected for {}", at)));
        }

        let mut media_files = Vec::new();
        let mut entries = tokio::fs::read_dir(media_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            media_files.push(entry.file_name().to_string_lossy().into_owned());
        }
        media_files.sort();

        debug!("Accepted {:?} at {} with {} files", kind, at, media_files.len());
        self.submissions.write().await.push(ScheduledSubmission { kind, at, media_files });
        Ok(())
    }

    async fn times(&self, stories: bool) -> Vec<Timestamp> {
        let existing = if stories { &self.existing_stories } else { &self.existing_posts };
        let mut times: Vec<Timestamp> = existing.clone();
        times.extend(
            self.submissions
                .read()
                .await
                .iter()
                .filter(|s| matches!(s.kind, SubmissionKind::Story) == stories)
                .map(|s| s.at),
        );
        times.sort();
        times
    }
}

#[async_trait]
impl PublishTarget for InMemoryPublishTarget {
    async fn list_scheduled_post_times(&self) -> Result<Vec<Timestamp>> {
        Ok(self.times(false).await)
    }

    async fn list_scheduled_story_times(&self) -> Result<Vec<Timestamp>> {
        Ok(self.times(true).await)
    }

    async fn schedule_post(&self, at: Timestamp, media_dir: &Path, caption: &str) -> Result<()> {
        self.accept(SubmissionKind::Post { caption: caption.to_owned() }, at, media_dir).await
    }

    async fn schedule_story(&self, at: Timestamp, media_dir: &Path) -> Result<()> {
        self.accept(SubmissionKind::Story, at, media_dir).await
    }
}

/// Writes one placeholder file per URL instead of downloading anything.
#[derive(Default)]
pub struct LocalMediaFetcher {
    unfetchable: HashSet<String>,
}

impl LocalMediaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make fetching `url` fail.
    pub fn with_unfetchable(mut self, url: &str) -> Self {
        self.unfetchable.insert(url.to_owned());
        self
    }
}

#[async_trait]
impl MediaFetcher for LocalMediaFetcher {
    async fn fetch_all(&self, urls: &[String], dest_dir: &Path) -> Result<()> {
        for (index, url) in urls.iter().enumerate() {
            if self.unfetchable.contains(url) {
                return Err(CollaboratorError::Media {
                    url: url.clone(),
                    reason: "unreachable".to_owned(),
                });
            }
            tokio::fs::write(dest_dir.join(format!("{}.media", index)), url.as_bytes()).await?;
        }
        Ok(())
    }
}

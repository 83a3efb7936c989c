use std::path::Path;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Local;

use crate::error::Result;

/// Wall-clock instant in the operator's local timezone.
///
/// Cron rules and the publishing UI both speak local time, so every schedule
/// computation stays in it.
pub type Timestamp = DateTime<Local>;

/// A saved item picked for re-posting during one scheduling iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentItem {
    /// Name of the saved collection the item was picked from.
    pub collection: String,
    pub url: String,
    pub media_urls: Vec<String>,
    pub caption: Option<String>,
    pub author: String,
}

/// Result of composing a caption for a content item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComposedCaption {
    /// Publish as a feed post carrying this caption.
    Post(String),
    /// Publish as a story; stories carry no caption.
    Story,
}

impl ComposedCaption {
    pub fn is_story(&self) -> bool {
        matches!(self, ComposedCaption::Story)
    }
}

/// Where saved content is read from and acknowledged back to.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Names of all saved collections. May be empty, order is unspecified.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Item URLs currently in a collection. May be empty.
    async fn list_items(&self, collection: &str) -> Result<Vec<String>>;

    /// Media URLs of an item. Fails if the item is unavailable.
    async fn get_media_urls(&self, item_url: &str) -> Result<Vec<String>>;

    async fn get_caption(&self, item_url: &str) -> Result<Option<String>>;

    async fn get_author(&self, item_url: &str) -> Result<String>;

    /// Remove an item from saved content. An item that is not saved is a success.
    async fn unsave(&self, item_url: &str) -> Result<()>;

    /// Like an item. An item that is already liked is a success.
    async fn like(&self, item_url: &str) -> Result<()>;

    /// Delete a collection. Only called once the collection is known to be empty.
    async fn delete_collection(&self, name: &str) -> Result<()>;
}

/// Where scheduling requests are submitted.
#[async_trait]
pub trait PublishTarget: Send + Sync {
    /// Times of posts already queued, ascending. Empty if none.
    async fn list_scheduled_post_times(&self) -> Result<Vec<Timestamp>>;

    /// Times of stories already queued, ascending. Empty if none.
    async fn list_scheduled_story_times(&self) -> Result<Vec<Timestamp>>;

    async fn schedule_post(&self, at: Timestamp, media_dir: &Path, caption: &str) -> Result<()>;

    async fn schedule_story(&self, at: Timestamp, media_dir: &Path) -> Result<()>;
}

/// Materializes remote media into a local directory.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download every URL into `dest_dir`. Fails on the first unfetchable URL.
    async fn fetch_all(&self, urls: &[String], dest_dir: &Path) -> Result<()>;
}

/// Turns a collection's directives and the original post into a caption.
pub trait CaptionComposer: Send + Sync {
    /// Compose the caption for an item picked from `collection_name`.
    ///
    /// The collection name carries three comma-separated directives:
    /// `<story flag>,<reuse hashtags flag>,<custom caption>`. Fails with
    /// `MalformedCollectionName` when fewer than three fields are present.
    fn compose(
        &self,
        collection_name: &str,
        original_caption: Option<&str>,
        author: &str,
        template: &str,
        fallback_hashtags: &[String],
    ) -> Result<ComposedCaption>;
}

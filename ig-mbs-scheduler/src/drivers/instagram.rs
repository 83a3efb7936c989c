//! Instagram saved-content automation.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use interfaces::{CollaboratorError, ContentSource, Result};
use regex::Regex;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::locators::instagram as xpaths;
use crate::types::DriverConfig;
use crate::webdriver::WebDriverSession;

static POST_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)window\.__additionalDataLoaded\(.*?,(.*)\);").expect("post data pattern is valid")
});

const SCRIPTS_TEXT: &str = "return Array.from(document.scripts).map(function (s) { return s.text; });";

/// Pull the post object out of the page's embedded `__additionalDataLoaded` call.
pub fn extract_post_data(script_text: &str) -> Option<Value> {
    let payload = POST_DATA.captures(script_text)?.get(1)?.as_str();
    let data: Value = serde_json::from_str(payload).ok()?;
    data.get("items")?.get(0).cloned()
}

/// Media URLs of a post: photos (type 1), videos (type 2) and carousels (type 8).
pub fn media_urls_from_post(post: &Value) -> Vec<String> {
    match post.get("media_type").and_then(Value::as_i64) {
        Some(1) => post
            .pointer("/image_versions2/candidates/0/url")
            .and_then(Value::as_str)
            .map(|url| vec![url.to_string()])
            .unwrap_or_default(),
        Some(2) => post
            .pointer("/video_versions/0/url")
            .and_then(Value::as_str)
            .map(|url| vec![url.to_string()])
            .unwrap_or_default(),
        Some(8) => post
            .get("carousel_media")
            .and_then(Value::as_array)
            .map(|items| items.iter().flat_map(media_urls_from_post).collect())
            .unwrap_or_default(),
        other => {
            warn!("Unsupported media type: {:?}", other);
            Vec::new()
        }
    }
}

pub fn caption_from_post(post: &Value) -> Option<String> {
    post.pointer("/caption/text").and_then(Value::as_str).map(str::to_string)
}

pub fn author_from_post(post: &Value) -> Option<String> {
    post.pointer("/user/username").and_then(Value::as_str).map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PostField {
    Media,
    Caption,
    Author,
}

/// Post data of the last page loaded, and which fields have been read from it.
///
/// Each field is served from one load at most once; asking for it again
/// reloads the page, so a retried item never sees stale media URLs.
struct CachedPost {
    url: String,
    data: Value,
    served: HashSet<PostField>,
}

pub struct InstagramDriver {
    session: WebDriverSession,
    username: String,
    timeout: std::time::Duration,
    post_cache: Mutex<Option<CachedPost>>,
}

impl InstagramDriver {
    pub async fn start(config: &DriverConfig, username: &str) -> Result<Self> {
        let session = WebDriverSession::start(config, &format!("ig/{}", username)).await?;
        Ok(Self {
            session,
            username: username.to_string(),
            timeout: config.timeout,
            post_cache: Mutex::new(None),
        })
    }

    pub async fn quit(&self) -> Result<()> {
        self.session.quit().await
    }

    fn saved_url(&self) -> String {
        format!("https://www.instagram.com/{}/saved/", self.username)
    }

    async fn collection_div(&self, collection_name: &str) -> Result<crate::webdriver::Element> {
        self.session.goto(&self.saved_url()).await?;
        self.session
            .wait_for_clickable(&xpaths::collection_div(collection_name), self.timeout)
            .await
    }

    async fn open_collection(&self, collection_name: &str) -> Result<()> {
        let div = self.collection_div(collection_name).await?;
        self.session.click(&div).await
    }

    async fn is_collection_empty(&self, collection_name: &str) -> Result<bool> {
        let div = self.collection_div(collection_name).await?;
        let grandchildren = self
            .session
            .find_all_from(&div, xpaths::COLLECTION_DIV_GRANDCHILDREN)
            .await?;
        // An empty collection tile only holds its title.
        Ok(grandchildren.len() == 1)
    }

    async fn post_data(&self, post_url: &str, field: PostField) -> Result<Value> {
        let mut cache = self.post_cache.lock().await;
        if let Some(cached) = cache.as_mut() {
            if cached.url == post_url && cached.served.insert(field) {
                return Ok(cached.data.clone());
            }
        }

        // Always a fresh load: the page may already be open with expired media URLs.
        self.session.navigate(post_url).await?;
        let scripts = self.session.execute(SCRIPTS_TEXT, &[]).await?;
        let data = scripts
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .find_map(extract_post_data)
            .ok_or_else(|| CollaboratorError::ItemUnavailable {
                url: post_url.to_string(),
            })?;

        *cache = Some(CachedPost {
            url: post_url.to_string(),
            data: data.clone(),
            served: HashSet::from([field]),
        });
        Ok(data)
    }
}

#[async_trait]
impl ContentSource for InstagramDriver {
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.session.goto(&self.saved_url()).await?;

        let divs = match self.session.wait_for_all(xpaths::COLLECTION_DIVS, self.timeout).await {
            Ok(divs) => divs,
            Err(CollaboratorError::Timeout { .. }) => {
                info!("No saved collections");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut names = Vec::with_capacity(divs.len());
        for div in &divs {
            names.push(self.session.text(div).await?);
        }
        info!("Successfully got collection names: {:?}", names);
        Ok(names)
    }

    async fn list_items(&self, collection: &str) -> Result<Vec<String>> {
        if self.is_collection_empty(collection).await? {
            info!("No items in collection '{}'", collection);
            return Ok(Vec::new());
        }
        self.open_collection(collection).await?;

        let links = self
            .session
            .wait_for_all(xpaths::COLLECTION_ITEM_LINKS, self.timeout)
            .await?;
        let mut urls = Vec::with_capacity(links.len());
        for link in &links {
            if let Some(href) = self.session.attribute(link, "href").await? {
                urls.push(href);
            }
        }
        info!("Successfully got collection item URLs: {:?}", urls);
        Ok(urls)
    }

    async fn get_media_urls(&self, item_url: &str) -> Result<Vec<String>> {
        let urls = media_urls_from_post(&self.post_data(item_url, PostField::Media).await?);
        info!("Successfully got post media URLs ({}): {:?}", item_url, urls);
        Ok(urls)
    }

    async fn get_caption(&self, item_url: &str) -> Result<Option<String>> {
        let caption = caption_from_post(&self.post_data(item_url, PostField::Caption).await?);
        info!("Successfully got post caption ({}): {:?}", item_url, caption);
        Ok(caption)
    }

    async fn get_author(&self, item_url: &str) -> Result<String> {
        let author = author_from_post(&self.post_data(item_url, PostField::Author).await?).ok_or_else(|| {
            CollaboratorError::ItemUnavailable {
                url: item_url.to_string(),
            }
        })?;
        info!("Successfully got post user ({}): {}", item_url, author);
        Ok(author)
    }

    async fn unsave(&self, item_url: &str) -> Result<()> {
        self.session.goto(item_url).await?;

        match self.session.find(xpaths::POST_UNSAVE_BUTTON).await {
            Ok(button) => self.session.click(&button).await?,
            Err(CollaboratorError::ElementNotFound { .. }) => {
                info!("Post is not saved, continuing... ({})", item_url);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        // Items inside a collection ask for confirmation.
        match self.session.find(xpaths::POST_UNSAVE_PROMPT_BUTTON).await {
            Ok(prompt) => {
                self.session.click(&prompt).await?;
                info!("Successfully unsaved post from collection ({})", item_url);
            }
            Err(CollaboratorError::ElementNotFound { .. }) => {
                info!("Successfully unsaved post ({})", item_url);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn like(&self, item_url: &str) -> Result<()> {
        self.session.goto(item_url).await?;

        match self.session.find(xpaths::POST_LIKE_BUTTON).await {
            Ok(button) => {
                self.session.click(&button).await?;
                info!("Successfully liked post ({})", item_url);
                Ok(())
            }
            Err(CollaboratorError::ElementNotFound { .. }) => {
                info!("Post is already liked, continuing... ({})", item_url);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.open_collection(name).await?;

        let options = self
            .session
            .wait_for(xpaths::COLLECTION_OPTIONS_BUTTON, self.timeout)
            .await?;
        self.session.click(&options).await?;
        let delete = self.session.find(xpaths::COLLECTION_DELETE_BUTTON).await?;
        self.session.click(&delete).await?;
        let confirm = self.session.find(xpaths::COLLECTION_DELETE_CONFIRM_BUTTON).await?;
        self.session.click(&confirm).await?;

        info!("Successfully deleted collection: {}", name);
        Ok(())
    }
}

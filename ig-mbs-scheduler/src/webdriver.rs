//! Minimal W3C WebDriver client.
//!
//! Talks the JSON wire protocol of chromedriver (or any W3C compliant
//! driver) over HTTP. Only the commands the drivers need are implemented.

use crate::types::DriverConfig;
use interfaces::{CollaboratorError, Result};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Reference to an element in the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    id: String,
}

impl Element {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| Self { id: id.to_string() })
            .ok_or_else(|| CollaboratorError::Driver(format!("malformed element reference: {}", value)))
    }

    fn to_value(&self) -> Value {
        json!({ ELEMENT_KEY: self.id })
    }
}

fn transport_error(e: reqwest::Error) -> CollaboratorError {
    CollaboratorError::Driver(format!("WebDriver transport error: {}", e))
}

/// Map a W3C error code onto the collaborator taxonomy.
///
/// Wire-level timeouts carry no duration and surface as `Driver` errors;
/// `Timeout` is reserved for the polling waits, which know their bound.
pub fn wire_error(code: &str, message: &str) -> CollaboratorError {
    match code {
        "no such element" | "stale element reference" => CollaboratorError::ElementNotFound {
            locator: message.to_string(),
        },
        _ => CollaboratorError::Driver(format!("{}: {}", code, message)),
    }
}

pub struct WebDriverSession {
    client: Client,
    /// `<driver url>/session/<id>`
    base: String,
    poll_interval: Duration,
}

impl WebDriverSession {
    /// Open a browser session on the persistent profile `<profile_dir>/<profile>`.
    pub async fn start(config: &DriverConfig, profile: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(transport_error)?;

        let profile_path = config.profile_dir.join(profile);
        tokio::fs::create_dir_all(&profile_path).await?;

        let mut chrome_options = json!({
            "args": [format!("--user-data-dir={}", profile_path.display())],
        });
        if let Some(binary) = &config.browser_binary {
            chrome_options["binary"] = json!(binary);
        }
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": chrome_options,
                }
            }
        });

        let server = config.webdriver_url.trim_end_matches('/');
        let response = client
            .post(format!("{}/session", server))
            .json(&capabilities)
            .send()
            .await
            .map_err(transport_error)?;
        let value = unwrap_response(response).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| CollaboratorError::Driver(format!("no session id in response: {}", value)))?;

        info!("Started browser session {} (profile {})", session_id, profile_path.display());
        Ok(Self {
            client,
            base: format!("{}/session/{}", server, session_id),
            poll_interval: config.poll_interval,
        })
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base, path);
        let mut request = self.client.request(method.clone(), &url);
        if method == Method::POST {
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }
        let response = request.send().await.map_err(transport_error)?;
        unwrap_response(response).await
    }

    pub async fn current_url(&self) -> Result<String> {
        let value = self.command(Method::GET, "/url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Navigate to `url` unless the browser is already there.
    pub async fn goto(&self, url: &str) -> Result<()> {
        let current = self.current_url().await?;
        if current == url {
            debug!("Already at '{}', continuing...", url);
            return Ok(());
        }

        debug!("Navigating from '{}' to '{}'", current, url);
        self.navigate(url).await
    }

    /// Load `url`, even when it is the current page.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map_err(|e| CollaboratorError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub async fn find(&self, xpath: &str) -> Result<Element> {
        self.find_in("", xpath).await
    }

    pub async fn find_all(&self, xpath: &str) -> Result<Vec<Element>> {
        self.find_all_in("", xpath).await
    }

    /// Find the first match of `xpath` relative to `parent`.
    pub async fn find_from(&self, parent: &Element, xpath: &str) -> Result<Element> {
        self.find_in(&format!("/element/{}", parent.id), xpath).await
    }

    pub async fn find_all_from(&self, parent: &Element, xpath: &str) -> Result<Vec<Element>> {
        self.find_all_in(&format!("/element/{}", parent.id), xpath).await
    }

    async fn find_in(&self, scope: &str, xpath: &str) -> Result<Element> {
        let body = json!({ "using": "xpath", "value": xpath });
        match self.command(Method::POST, &format!("{}/element", scope), Some(body)).await {
            Ok(value) => Element::from_value(&value),
            Err(CollaboratorError::ElementNotFound { .. }) => Err(CollaboratorError::ElementNotFound {
                locator: xpath.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn find_all_in(&self, scope: &str, xpath: &str) -> Result<Vec<Element>> {
        let body = json!({ "using": "xpath", "value": xpath });
        let value = self.command(Method::POST, &format!("{}/elements", scope), Some(body)).await?;
        value
            .as_array()
            .map(|items| items.iter().map(Element::from_value).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// Poll until `xpath` is present, or fail with `Timeout`.
    pub async fn wait_for(&self, xpath: &str, timeout: Duration) -> Result<Element> {
        let started = Instant::now();
        loop {
            match self.find(xpath).await {
                Ok(element) => return Ok(element),
                Err(CollaboratorError::ElementNotFound { .. }) if started.elapsed() < timeout => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(CollaboratorError::ElementNotFound { .. }) => {
                    return Err(CollaboratorError::Timeout {
                        what: xpath.to_string(),
                        seconds: timeout.as_secs(),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Poll until at least one element matches `xpath`, or fail with `Timeout`.
    pub async fn wait_for_all(&self, xpath: &str, timeout: Duration) -> Result<Vec<Element>> {
        let started = Instant::now();
        loop {
            let elements = self.find_all(xpath).await?;
            if !elements.is_empty() {
                return Ok(elements);
            }
            if started.elapsed() >= timeout {
                return Err(CollaboratorError::Timeout {
                    what: xpath.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Poll until `xpath` is present, displayed and enabled.
    pub async fn wait_for_clickable(&self, xpath: &str, timeout: Duration) -> Result<Element> {
        let started = Instant::now();
        loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            let element = self.wait_for(xpath, remaining).await?;
            if self.is_displayed(&element).await? && self.is_enabled(&element).await? {
                return Ok(element);
            }
            if started.elapsed() >= timeout {
                return Err(CollaboratorError::Timeout {
                    what: format!("{} to become clickable", xpath),
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn click(&self, element: &Element) -> Result<()> {
        self.command(Method::POST, &format!("/element/{}/click", element.id), None).await?;
        Ok(())
    }

    pub async fn clear(&self, element: &Element) -> Result<()> {
        self.command(Method::POST, &format!("/element/{}/clear", element.id), None).await?;
        Ok(())
    }

    pub async fn send_keys(&self, element: &Element, text: &str) -> Result<()> {
        let body = json!({ "text": text });
        self.command(Method::POST, &format!("/element/{}/value", element.id), Some(body)).await?;
        Ok(())
    }

    pub async fn text(&self, element: &Element) -> Result<String> {
        let value = self.command(Method::GET, &format!("/element/{}/text", element.id), None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        let value = self
            .command(Method::GET, &format!("/element/{}/attribute/{}", element.id, name), None)
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn is_displayed(&self, element: &Element) -> Result<bool> {
        let value = self.command(Method::GET, &format!("/element/{}/displayed", element.id), None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn is_enabled(&self, element: &Element) -> Result<bool> {
        let value = self.command(Method::GET, &format!("/element/{}/enabled", element.id), None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Run a synchronous script; elements may be passed as arguments.
    pub async fn execute(&self, script: &str, args: &[&Element]) -> Result<Value> {
        let args: Vec<Value> = args.iter().map(|e| e.to_value()).collect();
        self.command(Method::POST, "/execute/sync", Some(json!({ "script": script, "args": args })))
            .await
    }

    /// End the session and close the browser.
    pub async fn quit(&self) -> Result<()> {
        self.command(Method::DELETE, "", None).await?;
        info!("Closed browser session");
        Ok(())
    }
}

async fn unwrap_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let payload: Value = response.json().await.map_err(transport_error)?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if let Some(code) = value.get("error").and_then(Value::as_str) {
        let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
        return Err(wire_error(code, message));
    }
    if !status.is_success() {
        return Err(CollaboratorError::Driver(format!("HTTP {} from WebDriver", status)));
    }
    Ok(value)
}

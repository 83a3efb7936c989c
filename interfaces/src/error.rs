/// Failures a collaborator can report back to the scheduler.
///
/// The set is closed so the scheduling loop can decide per kind how to react.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("Element not found: {locator}")]
    ElementNotFound { locator: String },

    #[error("Item unavailable: {url}")]
    ItemUnavailable { url: String },

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Media fetch failed for {url}: {reason}")]
    Media { url: String, reason: String },

    #[error("Malformed collection name '{name}': expected '<story>,<hashtags>,<caption>'")]
    MalformedCollectionName { name: String },

    #[error("Invalid caption template: {0}")]
    InvalidTemplate(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, CollaboratorError>;

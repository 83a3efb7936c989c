pub mod defs;
pub mod error;
pub mod memory;

pub use defs::{CaptionComposer, ComposedCaption, ContentItem, ContentSource, MediaFetcher, PublishTarget, Timestamp};
pub use error::{CollaboratorError, Result};
pub use memory::{InMemoryContentSource, InMemoryPublishTarget, LocalMediaFetcher, ScheduledSubmission, SubmissionKind};

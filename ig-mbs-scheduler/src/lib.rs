pub mod types;
pub mod cursor;
pub mod caption;
pub mod orchestrator;
pub mod fetcher;
pub mod webdriver;
pub mod drivers;
pub mod utils;

pub use types::*;
pub use cursor::{CursorCheckpoint, ScheduleCursor};
pub use caption::{CaptionTemplate, CollectionDirectives, TemplateCaptionComposer};
pub use orchestrator::{backoff_delay, Orchestrator, Submission};
pub use fetcher::HttpMediaFetcher;
pub use drivers::{BusinessSuiteDriver, InstagramDriver};

pub mod business_suite;
pub mod instagram;
pub mod locators;

pub use business_suite::BusinessSuiteDriver;
pub use instagram::InstagramDriver;

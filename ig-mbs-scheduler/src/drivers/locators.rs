//! XPath locators for the pages the drivers automate.
//!
//! These follow the markup of the web apps and are expected to need updating
//! whenever the front-ends change.

/// Quote `value` as an XPath string literal, whatever quotes it contains.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        format!("\"{}\"", value)
    } else if !value.contains('\'') {
        format!("'{}'", value)
    } else {
        let parts: Vec<String> = value.split('"').map(|part| format!("\"{}\"", part)).collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}

pub mod instagram {
    pub const COLLECTION_DIVS: &str = r#"//*[@id="react-root"]/section/main/div/div[*]/div[2]/div/div/div/div/div"#;
    /// `{collection_name}` is substituted before use.
    pub const COLLECTION_DIV: &str =
        r#"//*[@id="react-root"]/section/main/div/div[*]/div[2]/div/div/div/div/div[@aria-label={collection_name}]"#;
    pub const COLLECTION_DIV_GRANDCHILDREN: &str = "./div/div";
    pub const COLLECTION_ITEM_LINKS: &str = r#"//*[@id="react-root"]/section/main/div/div/div[3]/article/div[1]/div/div/div/a"#;
    pub const COLLECTION_OPTIONS_BUTTON: &str = r#"//*[@id="react-root"]/section/main/div/div/div[2]/div[2]/button"#;
    pub const COLLECTION_DELETE_BUTTON: &str = "/html/body/div[6]/div/div/div/div/button[1]";
    pub const COLLECTION_DELETE_CONFIRM_BUTTON: &str = "/html/body/div[6]/div/div/div/div[2]/button[1]";
    pub const POST_UNSAVE_BUTTON: &str = r#"//*[@id="react-root"]/section/main/div/div[*]/article/div/div[2]/div/div[2]/section[1]/span[4]/div/div/button/div/*[@aria-label="Remove"]"#;
    pub const POST_UNSAVE_PROMPT_BUTTON: &str = "/html/body/div[6]/div/div/div/div[2]/button[1]";
    pub const POST_LIKE_BUTTON: &str = r#"//*[@id="react-root"]/section/main/div/div[*]/article/div/div[2]/div/div[2]/section[1]/span[1]/button/div/span/*[@aria-label="Like"]"#;

    /// XPath for a collection tile by its (directive-carrying) name.
    pub fn collection_div(collection_name: &str) -> String {
        COLLECTION_DIV.replace("{collection_name}", &super::xpath_literal(collection_name))
    }
}

pub mod business_suite {
    pub const PLANNER_SCHEDULE_POST_DIV: &str = r#"//div[@role="button"][.//div[text()="Create post"]]"#;
    pub const PLANNER_DROPDOWN_DIV: &str = r#"//div[@role="button"][@aria-haspopup="menu"][.//div[text()="Create post"]]/following-sibling::div[@role="button"]"#;
    pub const PLANNER_SCHEDULE_STORY_DIV: &str = r#"//div[@role="menuitem"][.//span[text()="Create story"]]"#;
    pub const SCHEDULE_DATE_INPUT: &str = r#"//input[@placeholder="dd/mm/yyyy"]"#;
    pub const SCHEDULE_HOUR_INPUT: &str = r#"//input[@aria-label="hours"]"#;
    pub const SCHEDULE_MINUTE_INPUT: &str = r#"//input[@aria-label="minutes"]"#;
    pub const SCHEDULE_PERIOD_INPUT: &str = r#"//input[@aria-label="meridiem"]"#;
    pub const SCHEDULE_SAVE_BUTTON: &str = r#"//div[@role="button"][.//div[text()="Save"]]"#;
    pub const SCHEDULE_PLACEMENT_INPUTS: &str = r#"//div[@role="switch"][@aria-checked]"#;
    pub const SCHEDULE_CAPTION_DIV: &str = r#"//div[@role="combobox"][@contenteditable="true"]"#;
    pub const SCHEDULE_FILE_INPUT: &str = r#"//input[@type="file"]"#;
    pub const SCHEDULE_PUBLISH_DIV: &str = r#"//div[@role="button"][@aria-disabled="false"][.//div[text()="Schedule"]]"#;
    pub const SCHEDULED_POST_DATE_SPANS: &str = r#"//div[@role="table"]//div[@role="row"]//span[contains(@class, "scheduled-date")]"#;
    pub const SCHEDULED_STORY_DATE_SPANS: &str = r#"//div[@role="table"]//div[@role="row"]//span[contains(@class, "scheduled-date")]"#;
}

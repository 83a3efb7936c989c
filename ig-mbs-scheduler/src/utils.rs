use std::collections::HashSet;

/// Drop repeated entries, keeping the first occurrence of each.
pub fn dedupe_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

/// Normalise a user-supplied hashtag so it starts with a single `#`.
pub fn normalize_hashtag(tag: &str) -> Option<String> {
    let trimmed = tag.trim().trim_start_matches('#');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("#{}", trimmed))
    }
}

/// Time utilities
pub mod time {
    use std::time::Duration;

    /// Format duration in human-readable form
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();

        if total_seconds == 0 {
            format!("{}ms", duration.as_millis())
        } else if total_seconds < 60 {
            format!("{}s", total_seconds)
        } else if total_seconds < 3600 {
            format!("{}m{}s", total_seconds / 60, total_seconds % 60)
        } else if total_seconds < 86400 {
            format!("{}h{}m", total_seconds / 3600, (total_seconds % 3600) / 60)
        } else {
            format!("{}d{}h", total_seconds / 86400, (total_seconds % 86400) / 3600)
        }
    }
}

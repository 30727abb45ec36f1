//! Shared display helpers for ShelfLife.

use uuid::Uuid;

/// Short display prefix of an id, for table rows and status lines.
pub fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Truncate text to `max` characters, appending an ellipsis when cut.
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

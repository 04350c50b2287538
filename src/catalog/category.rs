//! Category derivation for discovery grouping

use catalog_core::OperationDescriptor;

/// Category used when neither a tag nor a known path segment applies
pub const DEFAULT_CATEGORY: &str = "general";

/// First path segment -> category
const SEGMENT_CATEGORIES: &[(&str, &str)] = &[
    ("pages", "content"),
    ("posts", "content"),
    ("blocks", "content"),
    ("comments", "content"),
    ("users", "users"),
    ("members", "users"),
    ("teams", "users"),
    ("files", "media"),
    ("media", "media"),
    ("uploads", "media"),
    ("assets", "media"),
    ("auth", "authentication"),
    ("oauth", "authentication"),
    ("tokens", "authentication"),
    ("webhooks", "integrations"),
    ("integrations", "integrations"),
    ("search", "search"),
];

/// Category of a descriptor: its first tag, else the lookup of its first
/// non-empty path segment, else [`DEFAULT_CATEGORY`].
#[must_use]
pub fn category_for(descriptor: &OperationDescriptor) -> String {
    if let Some(tag) = descriptor.tags.iter().find(|t| !t.trim().is_empty()) {
        return tag.clone();
    }

    category_from_path(&descriptor.path).to_string()
}

/// Category derived from the first non-empty path segment
#[must_use]
pub fn category_from_path(path: &str) -> &'static str {
    path.split('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_ascii_lowercase)
        .and_then(|segment| {
            SEGMENT_CATEGORIES
                .iter()
                .find(|(known, _)| *known == segment)
                .map(|(_, category)| *category)
        })
        .unwrap_or(DEFAULT_CATEGORY)
}

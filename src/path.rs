//! Depth arithmetic on slash-delimited archive paths.
//!
//! ZIP paths always use `/`, whatever OS made the archive,
//! and nothing stops them from having leading, trailing, or doubled slashes.
//! Everything here counts only the non-empty segments between them.

use std::borrow::Cow;

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Returns the number of non-empty segments in the path.
///
/// ```
/// # use zipview::path::depth_of;
/// assert_eq!(depth_of(""), 0);
/// assert_eq!(depth_of("a/b/"), 2);
/// assert_eq!(depth_of("/a//b"), 2);
/// ```
pub fn depth_of(path: &str) -> usize {
    segments(path).count()
}

/// Truncates a path to its first `max_depth` segments.
///
/// Paths that are already shallow enough come back untouched
/// (trailing slash and all), so clamping twice is the same as clamping once.
/// Truncated paths are rejoined without leading or trailing slashes.
pub fn clamp(path: &str, max_depth: usize) -> Cow<'_, str> {
    if depth_of(path) <= max_depth {
        return Cow::Borrowed(path);
    }
    let kept: Vec<&str> = segments(path).take(max_depth).collect();
    Cow::Owned(kept.join("/"))
}

/// Returns the last non-empty segment of the path,
/// which is what we suggest as a name when saving the entry.
pub fn file_name(path: &str) -> &str {
    segments(path).last().unwrap_or("")
}

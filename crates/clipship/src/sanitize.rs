//! Helpers for turning free-form record fields into filesystem-safe names.

/// Characters that are unsafe in file names on at least one supported
/// platform.
const UNSAFE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Maximum length of a slug in characters.
const MAX_SLUG_CHARS: usize = 60;

/// Reduces an account name (or any free-form label) to a string that is safe
/// to embed in a file name: unsafe characters become spaces, whitespace runs
/// collapse to a single space, and the result is trimmed and capped at 60
/// characters.
pub fn slugify(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

    collapsed.chars().take(MAX_SLUG_CHARS).collect()
}

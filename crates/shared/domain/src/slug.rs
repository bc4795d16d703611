//! Slug generation for pipeline types and stages.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::constants::MAX_SLUG_LENGTH;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Slug used when a name has no usable characters left after normalization.
const FALLBACK_SLUG: &str = "untitled";

/// Lowercase, ASCII-only, hyphen-separated form of `name`.
///
/// Accented letters are folded to their base letter ("Qualifié" becomes
/// "qualifie").
pub fn slugify(name: &str) -> String {
    let folded: String = name
        .nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_lowercase();

    let mut slug = NON_ALPHANUMERIC
        .replace_all(&folded, "-")
        .trim_matches('-')
        .to_string();

    if slug.len() > MAX_SLUG_LENGTH {
        slug.truncate(MAX_SLUG_LENGTH);
        slug = slug.trim_end_matches('-').to_string();
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// First of `base`, `base-1`, `base-2`, ... for which `is_taken` returns false.
pub fn unique_slug(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }

    let mut suffix = 1u32;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

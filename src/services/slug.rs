use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::convert::Infallible;
use unicode_normalization::UnicodeNormalization;

pub const MAX_SLUG_LENGTH: usize = 100;
pub const FALLBACK_SLUG: &str = "article";

static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid regex"));

/// Turns arbitrary title text into a lowercase, ASCII, hyphen-delimited token.
///
/// Accented letters fold to their base letter, anything else outside `[a-z0-9]` is dropped,
/// whitespace runs become a single hyphen. Never returns an empty string.
pub fn generate_slug(title: &str) -> String {
    let folded: String = title.nfkd().filter(char::is_ascii).collect();
    let lowered = folded.to_lowercase();

    let cleaned = DISALLOWED.replace_all(&lowered, "");
    let hyphenated = WHITESPACE.replace_all(&cleaned, "-");
    let collapsed = HYPHENS.replace_all(&hyphenated, "-");
    let mut slug = collapsed.trim_matches('-');

    if slug.len() > MAX_SLUG_LENGTH {
        slug = slug[..MAX_SLUG_LENGTH].trim_end_matches('-');
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

pub fn validate_slug(slug: &str) -> bool {
    if slug.is_empty() || slug.len() > MAX_SLUG_LENGTH {
        return false;
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return false;
    }
    slug.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Picks the token uniqueness probing starts from.
///
/// A non-blank explicit candidate wins over the title. Candidates that are not already
/// well-formed slugs go through [`generate_slug`] first.
pub fn base_slug(title: &str, explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(candidate) if validate_slug(candidate) => candidate.to_string(),
        Some(candidate) => generate_slug(candidate),
        None => generate_slug(title),
    }
}

fn with_suffix(base: &str, n: u64) -> String {
    let suffix = format!("-{}", n);
    let keep = MAX_SLUG_LENGTH.saturating_sub(suffix.len());
    let stem = if base.len() > keep {
        let mut end = keep;
        while !base.is_char_boundary(end) {
            end -= 1;
        }
        base[..end].trim_end_matches('-')
    } else {
        base
    };
    format!("{}{}", stem, suffix)
}

/// Returns `base` if unused, otherwise the first of `base-1`, `base-2`, ... that is.
///
/// `exists` is the membership predicate; callers updating an article must exclude that
/// article's own row from it.
pub fn make_unique<F, E>(base: &str, mut exists: F) -> Result<String, E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    if !exists(base)? {
        return Ok(base.to_string());
    }
    let mut n: u64 = 1;
    loop {
        let candidate = with_suffix(base, n);
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// [`make_unique`] against an in-memory set of tokens.
pub fn make_unique_among(base: &str, taken: &HashSet<String>) -> String {
    match make_unique(base, |candidate| Ok::<_, Infallible>(taken.contains(candidate))) {
        Ok(slug) => slug,
        Err(never) => match never {},
    }
}

//! Utilities for generating deterministic, URL-safe slugs.
//!
//! The helpers here bridge ASCII slugification (`slug` crate) with Chinese
//! transliteration (`pinyin` crate) so inputs like “São Paulo” become
//! `sao-paulo` and “基线对齐” becomes `ji-xian-dui-qi`. Collision handling is
//! expressed through a uniqueness predicate so the generation logic stays pure
//! while callers decide how existing slugs are looked up.

use std::collections::HashSet;
use std::future::Future;

use once_cell::sync::Lazy;
use pinyin::{Pinyin, ToPinyin};
use regex::Regex;
use slug::slugify;
use thiserror::Error;

/// Longest slug accepted anywhere in the system.
pub const MAX_SLUG_LEN: usize = 100;

const MAX_SUFFIX_ATTEMPTS: usize = 1000;

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("slug pattern must compile"));

/// Errors that can occur while generating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

/// Errors that can occur while generating a slug via an async uniqueness check.
#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a slug from the provided human-readable text.
pub fn generate(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = normalize(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Whether `slug` satisfies the slug invariants: non-empty, at most
/// [`MAX_SLUG_LEN`] characters, lowercase alphanumerics separated by single
/// hyphens.
pub fn validate(slug: &str) -> bool {
    !slug.is_empty() && slug.len() <= MAX_SLUG_LEN && SLUG_PATTERN.is_match(slug)
}

/// Best-effort cleanup of an externally supplied slug. Applies the same
/// character rules as [`generate`] but never fails; the result may be empty.
pub fn sanitize(slug: &str) -> String {
    normalize(slug)
}

/// Return `base` unchanged when it is not in `existing`, otherwise the first
/// `base-N` (N = 1, 2, …) that does not collide.
pub fn ensure_unique(base: &str, existing: &HashSet<String>) -> Result<String, SlugError> {
    ensure_unique_with(base, |candidate| !existing.contains(candidate))
}

/// Produce a slug that does not collide according to the supplied predicate.
///
/// The `is_unique` closure must return `true` when the provided slug does not
/// already exist (for example, after checking a repository).
pub fn ensure_unique_with<F>(base: &str, mut is_unique: F) -> Result<String, SlugError>
where
    F: FnMut(&str) -> bool,
{
    if is_unique(base) {
        return Ok(base.to_string());
    }

    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = suffixed(base, attempt);
        if is_unique(&candidate) {
            return Ok(candidate);
        }
    }

    Err(SlugError::Exhausted {
        base: base.to_string(),
    })
}

/// Async variant of [`ensure_unique_with`] that awaits the uniqueness predicate.
pub async fn ensure_unique_async<F, Fut, E>(
    base: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    if is_unique(base.to_string())
        .await
        .map_err(SlugAsyncError::Predicate)?
    {
        return Ok(base.to_string());
    }

    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = suffixed(base, attempt);
        if is_unique(candidate.clone())
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted {
        base: base.to_string(),
    }))
}

// Shortens the base so that `{base}-{attempt}` never exceeds the length cap.
fn suffixed(base: &str, attempt: usize) -> String {
    let suffix = format!("-{attempt}");
    let room = MAX_SLUG_LEN.saturating_sub(suffix.len());
    let head = if base.len() > room {
        base[..floor_char_boundary(base, room)].trim_end_matches('-')
    } else {
        base
    };
    format!("{head}{suffix}")
}

fn normalize(input: &str) -> String {
    let transliterated = transliterate_to_ascii(input);
    cap_length(slugify(&transliterated))
}

fn cap_length(mut slug: String) -> String {
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(floor_char_boundary(&slug, MAX_SLUG_LEN));
        let trimmed = slug.trim_end_matches('-').len();
        slug.truncate(trimmed);
    }
    slug
}

fn floor_char_boundary(value: &str, index: usize) -> usize {
    let mut index = index.min(value.len());
    while !value.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => {
                // Accented Latin letters are folded by `slugify` itself.
                output.push(ch);
            }
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_strips_diacritics_and_punctuation() {
        assert_eq!(generate("São Paulo!! 2024").expect("slug"), "sao-paulo-2024");
        assert_eq!(
            generate("  Ação & Reação -- Física  ").expect("slug"),
            "acao-reacao-fisica"
        );
    }

    #[test]
    fn generate_transliterates_chinese() {
        let slug = generate("Rust 基础教程").expect("slug");
        assert_eq!(slug, "rust-ji-chu-jiao-cheng");
    }

    #[test]
    fn generate_rejects_empty_and_symbol_only_input() {
        assert_eq!(generate("   "), Err(SlugError::EmptyInput));
        assert!(matches!(
            generate("!!! ???"),
            Err(SlugError::Unrepresentable { .. })
        ));
    }

    #[test]
    fn generate_caps_length_without_trailing_hyphen() {
        let title = format!("{} tail", "a".repeat(99));
        let slug = generate(&title).expect("slug");
        assert_eq!(slug, "a".repeat(99));
        assert!(validate(&slug));

        let long = "palavra ".repeat(40);
        let slug = generate(&long).expect("slug");
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert!(validate(&slug));
    }

    #[test]
    fn generated_slugs_always_validate() {
        let inputs = [
            "Hello, World",
            "Über große Straßen",
            "C++ & Rust: uma comparação",
            "--leading and trailing--",
            "多 语言 Mixed 内容",
            "2024/10/17 release notes",
        ];
        for input in inputs {
            let slug = generate(input).expect("slug");
            assert!(validate(&slug), "`{slug}` from `{input}` should validate");
        }
    }

    #[test]
    fn validate_enforces_pattern_and_length() {
        assert!(validate("post-1"));
        assert!(!validate(""));
        assert!(!validate("-post"));
        assert!(!validate("post-"));
        assert!(!validate("post--1"));
        assert!(!validate("Post"));
        assert!(!validate("post_1"));
        assert!(!validate(&"a".repeat(MAX_SLUG_LEN + 1)));
        assert!(validate(&"a".repeat(MAX_SLUG_LEN)));
    }

    #[test]
    fn sanitize_cleans_external_input() {
        assert_eq!(sanitize("  My--Weird__Slug!! "), "my-weird-slug");
        assert_eq!(sanitize("***"), "");
    }

    #[test]
    fn ensure_unique_returns_base_when_free() {
        let existing = HashSet::from(["other".to_string()]);
        assert_eq!(ensure_unique("post", &existing).expect("slug"), "post");
    }

    #[test]
    fn ensure_unique_appends_counter() {
        let existing = HashSet::from(["post".to_string(), "post-1".to_string()]);
        assert_eq!(ensure_unique("post", &existing).expect("slug"), "post-2");
    }

    #[test]
    fn ensure_unique_keeps_suffixed_slugs_within_cap() {
        let base = "a".repeat(MAX_SLUG_LEN);
        let existing = HashSet::from([base.clone()]);
        let slug = ensure_unique(&base, &existing).expect("slug");
        assert_eq!(slug.len(), MAX_SLUG_LEN);
        assert!(slug.ends_with("-1"));
        assert!(validate(&slug));
    }

    #[test]
    fn ensure_unique_exhausted() {
        let result = ensure_unique_with("example", |_| false).expect_err("should exhaust");
        assert_eq!(
            result,
            SlugError::Exhausted {
                base: "example".to_string()
            }
        );
    }

    #[tokio::test]
    async fn ensure_unique_async_works() {
        use std::sync::Arc;
        use tokio::sync::Mutex;

        let existing = Arc::new(Mutex::new(vec!["pattern-library".to_string()]));

        let slug = ensure_unique_async("pattern-library", |candidate| {
            let existing = existing.clone();
            async move {
                let mut guard = existing.lock().await;
                if guard.contains(&candidate) {
                    Ok::<bool, std::convert::Infallible>(false)
                } else {
                    guard.push(candidate);
                    Ok::<bool, std::convert::Infallible>(true)
                }
            }
        })
        .await
        .expect("unique slug");

        assert_eq!(slug, "pattern-library-1");
        let guard = existing.lock().await;
        assert!(guard.contains(&slug));
    }
}

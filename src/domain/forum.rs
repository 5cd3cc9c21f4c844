//! Forum content rules: title/body limits, HTML sanitizing, tag normalization,
//! `@handle` mentions and reputation awards.

use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::error::DomainError;

pub const MIN_TITLE_CHARS: usize = 3;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 20_000;
pub const MAX_COMMENT_CHARS: usize = 5_000;
pub const MAX_TAGS: usize = 5;
pub const MAX_TAG_CHARS: usize = 32;
/// Mentions beyond this many in one post or comment are ignored.
pub const MAX_MENTIONS: usize = 10;

/// Reputation awarded to the author of the content involved.
pub mod reputation {
    pub const POST_CREATED: i32 = 5;
    pub const COMMENT_ADDED: i32 = 2;
    pub const POST_LIKE_RECEIVED: i32 = 1;
    pub const COMMENT_LIKE_RECEIVED: i32 = 1;
    pub const FEATURED_POST: i32 = 10;
}

static SANITIZER: Lazy<AmmoniaBuilder<'static>> = Lazy::new(|| {
    let mut builder = AmmoniaBuilder::default();
    builder
        .add_generic_attributes(["class"])
        .link_rel(Some("noopener noreferrer nofollow"));
    builder
});

/// Strips scripts, event handlers and unknown tags from user-authored HTML.
pub fn sanitize_html(input: &str) -> String {
    SANITIZER.clean(input).to_string()
}

fn visible_text_is_empty(html: &str) -> bool {
    ammonia::Builder::empty()
        .clean(html)
        .to_string()
        .replace("&nbsp;", " ")
        .trim()
        .is_empty()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

impl PostDraft {
    pub fn new(title: &str, content: &str, tags: &[String]) -> Result<Self, DomainError> {
        let title = title.trim();
        let title_len = title.chars().count();
        if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&title_len) {
            return Err(DomainError::validation(format!(
                "title must be between {MIN_TITLE_CHARS} and {MAX_TITLE_CHARS} characters"
            )));
        }

        let content = sanitized_body(content, MAX_CONTENT_CHARS)?;
        let tags = normalize_tags(tags)?;

        Ok(Self {
            title: title.to_string(),
            content,
            tags,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub content: String,
}

impl CommentDraft {
    pub fn new(content: &str) -> Result<Self, DomainError> {
        Ok(Self {
            content: sanitized_body(content, MAX_COMMENT_CHARS)?,
        })
    }
}

fn sanitized_body(content: &str, max_chars: usize) -> Result<String, DomainError> {
    if content.chars().count() > max_chars {
        return Err(DomainError::validation(format!(
            "content must be at most {max_chars} characters"
        )));
    }
    let cleaned = sanitize_html(content.trim());
    if visible_text_is_empty(&cleaned) {
        return Err(DomainError::validation("content is required"));
    }
    Ok(cleaned)
}

/// Lowercases, trims and dedupes tag names, preserving first-seen order.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, DomainError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for raw in tags {
        let tag = raw.trim().trim_start_matches('#').to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(DomainError::validation(format!(
                "tag `{tag}` exceeds {MAX_TAG_CHARS} characters"
            )));
        }
        if seen.insert(tag.clone()) {
            normalized.push(tag);
        }
    }
    if normalized.len() > MAX_TAGS {
        return Err(DomainError::validation(format!(
            "a post may carry at most {MAX_TAGS} tags"
        )));
    }
    Ok(normalized)
}

// `@` must not follow a word character, so e-mail addresses are skipped.
static MENTION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w@])@(\w[\w.\-]{0,39})").ok());

/// Lowercased handles mentioned in `text`, deduped in first-seen order.
///
/// A handle is a display name with its whitespace removed, so "Anna Maria"
/// is mentioned as `@AnnaMaria`.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let Some(pattern) = MENTION.as_ref() else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', '-']).to_lowercase())
        .filter(|handle| !handle.is_empty() && seen.insert(handle.clone()))
        .take(MAX_MENTIONS)
        .collect()
}

/// The handle a display name is mentioned by.
pub fn mention_handle(display_name: &str) -> String {
    display_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizer_drops_scripts_and_handlers() {
        let cleaned = sanitize_html(r#"<p onclick="x()">Gloria</p><script>alert(1)</script>"#);
        assert_eq!(cleaned, "<p>Gloria</p>");
    }

    #[test]
    fn post_draft_requires_visible_content() {
        let err = PostDraft::new("Lenten hymns", "<p>&nbsp;</p><script>x</script>", &[])
            .expect_err("empty body rejected");
        assert!(err.to_string().contains("content is required"));
    }

    #[test]
    fn post_draft_bounds_title() {
        assert!(PostDraft::new("ab", "<p>text</p>", &[]).is_err());
        assert!(PostDraft::new("abc", "<p>text</p>", &[]).is_ok());
    }

    #[test]
    fn tags_are_normalized_and_deduped() {
        let tags = vec![
            " Advent ".to_string(),
            "#advent".to_string(),
            "Chant".to_string(),
            "".to_string(),
        ];
        assert_eq!(
            normalize_tags(&tags).expect("valid tags"),
            vec!["advent".to_string(), "chant".to_string()]
        );
    }

    #[test]
    fn mentions_are_collected_once_and_lowercased() {
        let text = "<p>Thanks @Anna and @BrotherTuck.</p><p>@anna, see mail@example.org</p>";
        assert_eq!(
            extract_mentions(text),
            vec!["anna".to_string(), "brothertuck".to_string()]
        );
    }

    #[test]
    fn mentions_at_start_of_text() {
        assert_eq!(extract_mentions("@Cantor_1 hello"), vec!["cantor_1".to_string()]);
        assert!(extract_mentions("no handles here @ all").is_empty());
    }

    #[test]
    fn mention_handle_strips_whitespace() {
        assert_eq!(mention_handle("Anna Maria"), "annamaria");
        assert_eq!(extract_mentions("hi @AnnaMaria"), vec![mention_handle("Anna Maria")]);
    }

    #[test]
    fn too_many_tags_rejected() {
        let tags: Vec<String> = (0..6).map(|i| format!("t{i}")).collect();
        assert!(normalize_tags(&tags).is_err());
    }
}

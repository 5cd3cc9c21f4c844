//! Catalog invariants: hymn, author and category field rules.

use crate::domain::error::DomainError;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_LYRICS_CHARS: usize = 20_000;
pub const MAX_NAME_CHARS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 2_000;
pub const RELATED_HYMNS_LIMIT: usize = 5;

/// A hymn draft with trimmed, validated fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HymnDraft {
    pub number: Option<i32>,
    pub title: String,
    pub lyrics: String,
}

impl HymnDraft {
    pub fn new(number: Option<i32>, title: &str, lyrics: &str) -> Result<Self, DomainError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("title is required"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(DomainError::validation(format!(
                "title must be at most {MAX_TITLE_CHARS} characters"
            )));
        }
        if lyrics.chars().count() > MAX_LYRICS_CHARS {
            return Err(DomainError::validation(format!(
                "lyrics must be at most {MAX_LYRICS_CHARS} characters"
            )));
        }
        if let Some(number) = number
            && number <= 0
        {
            return Err(DomainError::validation("hymn number must be positive"));
        }

        Ok(Self {
            number,
            title: title.to_string(),
            lyrics: normalize_lyrics(lyrics),
        })
    }
}

/// Normalizes line endings and strips trailing whitespace from every line.
pub fn normalize_lyrics(lyrics: &str) -> String {
    lyrics
        .replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorDraft {
    pub name: String,
    pub biography: Option<String>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
}

impl AuthorDraft {
    pub fn new(
        name: &str,
        biography: Option<&str>,
        birth_year: Option<i32>,
        death_year: Option<i32>,
    ) -> Result<Self, DomainError> {
        let name = required_name(name, "author name")?;
        if let (Some(born), Some(died)) = (birth_year, death_year)
            && died < born
        {
            return Err(DomainError::validation(
                "death year cannot precede birth year",
            ));
        }

        Ok(Self {
            name,
            biography: optional_text(biography, "biography")?,
            birth_year,
            death_year,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub description: Option<String>,
}

impl CategoryDraft {
    pub fn new(name: &str, description: Option<&str>) -> Result<Self, DomainError> {
        Ok(Self {
            name: required_name(name, "category name")?,
            description: optional_text(description, "description")?,
        })
    }
}

fn required_name(value: &str, field: &'static str) -> Result<String, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    if value.chars().count() > MAX_NAME_CHARS {
        return Err(DomainError::validation(format!(
            "{field} must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<&str>, field: &'static str) -> Result<Option<String>, DomainError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(DomainError::validation(format!(
            "{field} must be at most {MAX_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(Some(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hymn_draft_trims_and_normalizes() {
        let draft = HymnDraft::new(Some(12), "  Salve Regina ", "Salve, Regina,  \r\nmater misericordiae\r\n\r\n")
            .expect("valid draft");
        assert_eq!(draft.title, "Salve Regina");
        assert_eq!(draft.lyrics, "Salve, Regina,\nmater misericordiae");
    }

    #[test]
    fn hymn_draft_rejects_blank_title_and_bad_number() {
        assert!(HymnDraft::new(None, "   ", "").is_err());
        assert!(HymnDraft::new(Some(0), "Ave Maria", "").is_err());
    }

    #[test]
    fn author_years_must_be_ordered() {
        assert!(AuthorDraft::new("Thomas Aquinas", None, Some(1225), Some(1274)).is_ok());
        assert!(AuthorDraft::new("Thomas Aquinas", None, Some(1274), Some(1225)).is_err());
    }

    #[test]
    fn empty_description_collapses_to_none() {
        let draft = CategoryDraft::new("Marian", Some("   ")).expect("valid category");
        assert_eq!(draft.description, None);
    }
}

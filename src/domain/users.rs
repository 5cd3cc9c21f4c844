//! Profile, report and notification field rules.

use url::Url;

use crate::domain::error::DomainError;

pub const MAX_DISPLAY_NAME_CHARS: usize = 80;
pub const MAX_BIO_CHARS: usize = 1_000;
pub const MIN_REPORT_REASON_CHARS: usize = 5;
pub const MAX_REPORT_REASON_CHARS: usize = 1_000;
pub const MAX_NOTIFICATION_TITLE_CHARS: usize = 200;
pub const MAX_NOTIFICATION_MESSAGE_CHARS: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileDraft {
    pub fn new(
        display_name: &str,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Self, DomainError> {
        let display_name = display_name.trim();
        let len = display_name.chars().count();
        if len == 0 || len > MAX_DISPLAY_NAME_CHARS {
            return Err(DomainError::validation(format!(
                "display name must be between 1 and {MAX_DISPLAY_NAME_CHARS} characters"
            )));
        }

        let bio = bio.map(str::trim).filter(|b| !b.is_empty());
        if let Some(bio) = bio
            && bio.chars().count() > MAX_BIO_CHARS
        {
            return Err(DomainError::validation(format!(
                "bio must be at most {MAX_BIO_CHARS} characters"
            )));
        }

        let avatar_url = avatar_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| validate_http_url(u, "avatar url"))
            .transpose()?;

        Ok(Self {
            display_name: display_name.to_string(),
            bio: bio.map(str::to_string),
            avatar_url,
        })
    }
}

/// Accepts absolute `http`/`https` URLs and returns their normalized form.
pub fn validate_http_url(raw: &str, field: &'static str) -> Result<String, DomainError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|err| DomainError::validation(format!("{field} is not a valid URL: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(DomainError::validation(format!(
            "{field} must use http or https, not `{other}`"
        ))),
    }
}

/// Lowercases and checks the shape of an email address.
pub fn normalize_email(raw: &str) -> Result<String, DomainError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!(
            "`{email}` is not a valid email address"
        )));
    }
    Ok(email)
}

pub fn validate_report_reason(reason: &str) -> Result<String, DomainError> {
    let reason = reason.trim();
    let len = reason.chars().count();
    if !(MIN_REPORT_REASON_CHARS..=MAX_REPORT_REASON_CHARS).contains(&len) {
        return Err(DomainError::validation(format!(
            "reason must be between {MIN_REPORT_REASON_CHARS} and {MAX_REPORT_REASON_CHARS} characters"
        )));
    }
    Ok(reason.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl NotificationDraft {
    pub fn new(title: &str, message: &str, link: Option<&str>) -> Result<Self, DomainError> {
        let title = title.trim();
        let message = message.trim();
        if title.is_empty() || title.chars().count() > MAX_NOTIFICATION_TITLE_CHARS {
            return Err(DomainError::validation(format!(
                "title must be between 1 and {MAX_NOTIFICATION_TITLE_CHARS} characters"
            )));
        }
        if message.is_empty() || message.chars().count() > MAX_NOTIFICATION_MESSAGE_CHARS {
            return Err(DomainError::validation(format!(
                "message must be between 1 and {MAX_NOTIFICATION_MESSAGE_CHARS} characters"
            )));
        }
        let link = link
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| {
                if l.starts_with('/') {
                    Ok(l.to_string())
                } else {
                    validate_http_url(l, "link")
                }
            })
            .transpose()?;

        Ok(Self {
            title: title.to_string(),
            message: message.to_string(),
            link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_draft_validates_avatar_scheme() {
        assert!(ProfileDraft::new("Cecilia", None, Some("https://cdn.example/a.png")).is_ok());
        assert!(ProfileDraft::new("Cecilia", None, Some("javascript:alert(1)")).is_err());
    }

    #[test]
    fn blank_bio_becomes_none() {
        let draft = ProfileDraft::new(" Cecilia ", Some("  "), None).expect("valid profile");
        assert_eq!(draft.display_name, "Cecilia");
        assert_eq!(draft.bio, None);
    }

    #[test]
    fn email_is_lowercased() {
        assert_eq!(
            normalize_email(" Choir@Parish.ORG ").expect("valid email"),
            "choir@parish.org"
        );
        assert!(normalize_email("no-at-sign").is_err());
    }

    #[test]
    fn report_reason_is_bounded() {
        assert!(validate_report_reason("spam").is_err());
        assert!(validate_report_reason("spam link in comment").is_ok());
    }

    #[test]
    fn notification_links_may_be_relative() {
        let draft = NotificationDraft::new("New hymn", "Pange Lingua added", Some("/hymns/1"))
            .expect("valid notification");
        assert_eq!(draft.link.as_deref(), Some("/hymns/1"));
    }
}

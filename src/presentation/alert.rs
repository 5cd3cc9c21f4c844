use std::error::Error as StdError;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Success,
    Error,
    Warning,
    Info,
}

/// Inline message shown above a page section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertBanner {
    pub kind: AlertKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub message: String,
    pub dismissible: bool,
    #[serde(skip)]
    visible: bool,
}

impl AlertBanner {
    pub fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: None,
            message: message.into(),
            dismissible: true,
            visible: true,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(AlertKind::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(AlertKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(AlertKind::Warning, message)
    }

    /// An error banner carrying the error's top-level message. Error banners
    /// stay on screen until the condition clears.
    pub fn from_error(error: &dyn StdError) -> Self {
        Self {
            title: Some("Something went wrong".to_string()),
            dismissible: false,
            ..Self::new(AlertKind::Error, error.to_string())
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn dismissible(mut self, dismissible: bool) -> Self {
        self.dismissible = dismissible;
        self
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Hides the banner. Does nothing for banners that cannot be dismissed.
    pub fn dismiss(&mut self) {
        if self.dismissible {
            self.visible = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("database unavailable")]
    struct Unavailable;

    #[test]
    fn dismiss_hides_only_dismissible_banners() {
        let mut banner = AlertBanner::success("Saved");
        banner.dismiss();
        assert!(!banner.is_visible());

        let mut sticky = AlertBanner::info("Read only").dismissible(false);
        sticky.dismiss();
        assert!(sticky.is_visible());
    }

    #[test]
    fn from_error_uses_the_error_message() {
        let banner = AlertBanner::from_error(&Unavailable);
        assert_eq!(banner.kind, AlertKind::Error);
        assert_eq!(banner.message, "database unavailable");
        assert!(!banner.dismissible);
    }

    #[test]
    fn serializes_without_empty_title() {
        let json = serde_json::to_value(AlertBanner::warning("Careful")).unwrap();
        assert_eq!(json["kind"], "warning");
        assert!(json.get("title").is_none());
        assert!(json.get("visible").is_none());
    }
}

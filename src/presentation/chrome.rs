use std::sync::Arc;

use serde::Serialize;

use crate::presentation::alert::AlertBanner;
use crate::presentation::breadcrumbs::Breadcrumbs;

/// Site identity used to decorate every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteIdentity {
    pub name: Arc<str>,
    pub description: Arc<str>,
}

impl SiteIdentity {
    pub fn new(name: impl Into<Arc<str>>, description: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn chrome(&self, title: Option<&str>, description: Option<&str>) -> PageChrome {
        PageChrome {
            meta: PageMeta::new(self, title, description),
            breadcrumbs: Breadcrumbs::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
}

impl PageMeta {
    /// `"{title} | {site}"`, or the bare site name when the page has no
    /// title of its own. Blank descriptions fall back to the site's.
    pub fn new(site: &SiteIdentity, title: Option<&str>, description: Option<&str>) -> Self {
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => format!("{title} | {}", site.name),
            None => site.name.to_string(),
        };
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(&site.description)
            .to_string();
        Self { title, description }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageChrome {
    pub meta: PageMeta,
    pub breadcrumbs: Breadcrumbs,
}

impl PageChrome {
    pub fn with_breadcrumbs(mut self, breadcrumbs: Breadcrumbs) -> Self {
        self.breadcrumbs = breadcrumbs;
        self
    }
}

/// Page-level response: the data plus everything needed to frame it.
#[derive(Debug, Clone, Serialize)]
pub struct PageEnvelope<T> {
    pub page: PageChrome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<AlertBanner>,
    pub data: T,
}

impl<T> PageEnvelope<T> {
    pub fn new(page: PageChrome, data: T) -> Self {
        Self {
            page,
            alerts: Vec::new(),
            data,
        }
    }

    pub fn with_alert(mut self, alert: AlertBanner) -> Self {
        self.alerts.push(alert);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteIdentity {
        SiteIdentity::new("Hymnary", "Catholic hymns library")
    }

    #[test]
    fn title_is_suffixed_with_site_name() {
        let meta = PageMeta::new(&site(), Some("Ave Maria"), None);
        assert_eq!(meta.title, "Ave Maria | Hymnary");
        assert_eq!(meta.description, "Catholic hymns library");
    }

    #[test]
    fn blank_title_falls_back_to_site_name() {
        let meta = PageMeta::new(&site(), Some("  "), Some("Marian hymns"));
        assert_eq!(meta.title, "Hymnary");
        assert_eq!(meta.description, "Marian hymns");
    }

    #[test]
    fn envelope_omits_empty_alerts() {
        let envelope = PageEnvelope::new(site().chrome(Some("Hymns"), None), 3_u32);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["page"]["meta"]["title"], "Hymns | Hymnary");
        assert_eq!(json["data"], 3);
        assert!(json.get("alerts").is_none());
    }
}

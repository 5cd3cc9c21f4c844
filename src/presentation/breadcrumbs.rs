use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub label: String,
    pub href: Option<String>,
}

/// Ordered navigation trail. The final entry is the current page and is
/// never rendered as a link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breadcrumbs {
    items: Vec<(String, String)>,
}

impl Breadcrumbs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the trail at the library home.
    pub fn home() -> Self {
        Self::new().push("Home", "/")
    }

    pub fn push(mut self, label: impl Into<String>, href: impl Into<String>) -> Self {
        self.items.push((label.into(), href.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> Vec<Breadcrumb> {
        let last = self.items.len().saturating_sub(1);
        self.items
            .iter()
            .enumerate()
            .map(|(index, (label, href))| Breadcrumb {
                label: label.clone(),
                href: (index != last).then(|| href.clone()),
            })
            .collect()
    }
}

impl Serialize for Breadcrumbs {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_item_has_no_link() {
        let trail = Breadcrumbs::home()
            .push("Hymns", "/hymns")
            .push("Salve Regina", "/hymns/42");
        let items = trail.items();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].href.as_deref(), Some("/"));
        assert_eq!(items[1].href.as_deref(), Some("/hymns"));
        assert_eq!(items[2].label, "Salve Regina");
        assert!(items[2].href.is_none());
    }

    #[test]
    fn empty_trail_serializes_to_empty_list() {
        let json = serde_json::to_value(Breadcrumbs::new()).unwrap();
        assert_eq!(json, serde_json::json!([]));
    }
}

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tab {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    pub disabled: bool,
}

impl Tab {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            count: None,
            disabled: false,
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabStrip {
    tabs: Vec<Tab>,
    active: String,
}

impl TabStrip {
    /// The first enabled tab starts active.
    pub fn new(tabs: Vec<Tab>) -> Self {
        let active = tabs
            .iter()
            .find(|tab| !tab.disabled)
            .map(|tab| tab.id.clone())
            .unwrap_or_default();
        Self { tabs, active }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    /// Activates `id`. Unknown and disabled tabs leave the selection alone.
    pub fn select(&mut self, id: &str) -> bool {
        match self.tabs.iter().find(|tab| tab.id == id) {
            Some(tab) if !tab.disabled => {
                self.active = tab.id.clone();
                true
            }
            _ => false,
        }
    }

    pub fn with_active(mut self, id: &str) -> Self {
        self.select(id);
        self
    }
}

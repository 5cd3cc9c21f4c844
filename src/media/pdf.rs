//! Score viewer. Starts in the embedded renderer and falls back to a plain
//! iframe for good once the renderer fails.

use serde::Serialize;
use tracing::warn;

pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 2.5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ViewerMode {
    Primary,
    Fallback { iframe_url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfViewer {
    url: String,
    mode: ViewerMode,
    page: u32,
    page_count: u32,
    zoom: f64,
}

impl PdfViewer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: ViewerMode::Primary,
            page: 1,
            page_count: 1,
            zoom: 1.0,
        }
    }

    pub fn mode(&self) -> &ViewerMode {
        &self.mode
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.mode, ViewerMode::Fallback { .. })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// The renderer opened the document.
    pub fn loaded(&mut self, page_count: u32) {
        if self.is_fallback() {
            return;
        }
        self.page_count = page_count.max(1);
        self.page = self.page.min(self.page_count);
    }

    /// The renderer failed. Only the first failure is logged; later ones
    /// find the viewer already in fallback mode.
    pub fn load_failed(&mut self, error: &str) {
        if self.is_fallback() {
            return;
        }
        warn!(
            target: "hymnary::media",
            url = %self.url,
            error,
            "PDF renderer failed, switching to iframe fallback"
        );
        self.mode = ViewerMode::Fallback {
            iframe_url: format!("{}#view=FitH", self.url),
        };
    }

    /// Moves by `offset` pages; only the embedded renderer paginates.
    pub fn turn(&mut self, offset: i64) {
        if self.is_fallback() {
            return;
        }
        let target = (i64::from(self.page) + offset).clamp(1, i64::from(self.page_count));
        self.page = u32::try_from(target).unwrap_or(1);
    }

    pub fn next_page(&mut self) {
        self.turn(1);
    }

    pub fn previous_page(&mut self) {
        self.turn(-1);
    }

    pub fn zoom_by(&mut self, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_permanent() {
        let mut viewer = PdfViewer::new("https://cdn.example/score.pdf");
        viewer.load_failed("worker crashed");
        assert_eq!(
            viewer.mode(),
            &ViewerMode::Fallback {
                iframe_url: "https://cdn.example/score.pdf#view=FitH".to_string()
            }
        );

        viewer.loaded(4);
        viewer.load_failed("again");
        assert!(viewer.is_fallback());
        assert_eq!(viewer.page_count(), 1);
    }

    #[test]
    fn pages_are_bounded_by_the_document() {
        let mut viewer = PdfViewer::new("https://cdn.example/score.pdf");
        viewer.loaded(3);

        viewer.previous_page();
        assert_eq!(viewer.page(), 1);
        viewer.turn(10);
        assert_eq!(viewer.page(), 3);
        viewer.next_page();
        assert_eq!(viewer.page(), 3);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut viewer = PdfViewer::new("https://cdn.example/score.pdf");
        viewer.zoom_by(5.0);
        assert_eq!(viewer.zoom(), MAX_ZOOM);
        viewer.zoom_by(-5.0);
        assert_eq!(viewer.zoom(), MIN_ZOOM);
    }
}

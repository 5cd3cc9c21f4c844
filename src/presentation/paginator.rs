//! Numbered page links with ellipsis breaks.

use serde::Serialize;

use crate::application::pagination::Paginated;

pub const RANGE_DISPLAYED: u32 = 3;
pub const MARGIN_DISPLAYED: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "page", rename_all = "snake_case")]
pub enum PageItem {
    Page(u32),
    Break,
}

/// 1-based page control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paginator {
    current: u32,
    total_pages: u32,
    range_displayed: u32,
    margin_displayed: u32,
}

impl Paginator {
    pub fn new(current: u32, total_pages: u32) -> Self {
        Self {
            current: current.clamp(1, total_pages.max(1)),
            total_pages,
            range_displayed: RANGE_DISPLAYED,
            margin_displayed: MARGIN_DISPLAYED,
        }
    }

    pub fn for_page<T>(page: &Paginated<T>) -> Self {
        Self::new(page.page, page.total_pages())
    }

    pub fn with_range(mut self, range_displayed: u32, margin_displayed: u32) -> Self {
        self.range_displayed = range_displayed.max(1);
        self.margin_displayed = margin_displayed;
        self
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn is_visible(&self) -> bool {
        self.total_pages > 1
    }

    pub fn can_prev(&self) -> bool {
        self.current > 1
    }

    pub fn can_next(&self) -> bool {
        self.current < self.total_pages
    }

    /// Moves to `page`. Returns `false` and stays put for pages outside
    /// `1..=total_pages` or the page already shown.
    pub fn go(&mut self, page: u32) -> bool {
        if page == 0 || page > self.total_pages || page == self.current {
            return false;
        }
        self.current = page;
        true
    }

    pub fn prev(&mut self) -> bool {
        self.go(self.current.saturating_sub(1))
    }

    pub fn next(&mut self) -> bool {
        self.go(self.current.saturating_add(1))
    }

    /// Margin pages at both ends, a window of `range_displayed` pages around
    /// the current one, and a `Break` wherever pages are skipped.
    pub fn items(&self) -> Vec<PageItem> {
        if !self.is_visible() {
            return Vec::new();
        }
        let total = self.total_pages;
        let half = self.range_displayed / 2;
        let mut start = self.current.saturating_sub(half).max(1);
        let end = (start + self.range_displayed - 1).min(total);
        start = end.saturating_sub(self.range_displayed - 1).max(1);

        let mut shown: Vec<u32> = (1..=self.margin_displayed.min(total)).collect();
        shown.extend(start..=end);
        shown.extend(total.saturating_sub(self.margin_displayed) + 1..=total);
        shown.sort_unstable();
        shown.dedup();

        let mut items = Vec::with_capacity(shown.len() + 2);
        let mut previous = 0;
        for page in shown {
            if page > previous + 1 {
                items.push(PageItem::Break);
            }
            items.push(PageItem::Page(page));
            previous = page;
        }
        items
    }
}

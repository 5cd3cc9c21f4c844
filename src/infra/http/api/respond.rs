//! JSON response shapes shared by the public and admin handlers.

use std::sync::Arc;

use axum::Json;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::pagination::Paginated;
use crate::cache::Loaded;
use crate::infra::http::STALE_HEADER;
use crate::presentation::{AlertBanner, PageChrome, PageEnvelope, PageItem, Paginator};
use hymnary_api_types::PageResponse;

const STALE_NOTICE: &str = "Showing saved content; the latest refresh failed.";

/// A page of items together with the paginator strip for it.
#[derive(Debug, Serialize)]
pub struct Listing<T> {
    #[serde(flatten)]
    pub page: PageResponse<T>,
    pub pages: Vec<PageItem>,
}

impl<T> From<Paginated<T>> for Listing<T> {
    fn from(page: Paginated<T>) -> Self {
        let pages = Paginator::for_page(&page).items();
        Self {
            page: page.into_response(),
            pages,
        }
    }
}

/// Serializes a cached read, flagging stale copies with a header.
pub fn loaded_json<T: Serialize>(loaded: Loaded<T>) -> Response {
    let stale = loaded.is_stale();
    mark_stale(Json(loaded.value).into_response(), stale)
}

/// Serializes a cached page of results as a [`Listing`].
pub fn loaded_listing<T: Serialize + Clone>(loaded: Loaded<Paginated<T>>) -> Response {
    let stale = loaded.is_stale();
    let listing = Listing::from(Arc::unwrap_or_clone(loaded.value));
    mark_stale(Json(listing).into_response(), stale)
}

/// Wraps a cached read in page chrome; stale copies also carry a warning
/// banner.
pub fn loaded_page<T: Serialize>(chrome: PageChrome, loaded: Loaded<T>) -> Response {
    let stale = loaded.is_stale();
    let mut envelope = PageEnvelope::new(chrome, loaded.value);
    if stale {
        envelope = envelope.with_alert(
            AlertBanner::warning(STALE_NOTICE)
                .with_title("Offline copy")
                .dismissible(true),
        );
    }
    mark_stale(Json(envelope).into_response(), stale)
}

fn mark_stale(mut response: Response, stale: bool) -> Response {
    if stale {
        response
            .headers_mut()
            .insert(STALE_HEADER, HeaderValue::from_static("1"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::PageRequest;

    #[test]
    fn stale_reads_carry_header() {
        let fresh = loaded_json(Loaded::fresh(1_u32));
        assert!(fresh.headers().get(STALE_HEADER).is_none());

        let stale = loaded_json(Loaded {
            value: Arc::new(1_u32),
            stale_error: Some("database timeout".to_string()),
        });
        assert_eq!(
            stale.headers().get(STALE_HEADER).and_then(|v| v.to_str().ok()),
            Some("1")
        );
    }

    #[test]
    fn listing_includes_paginator_items() {
        let page = Paginated::new(vec![1_u32, 2], 60, PageRequest::new(1, 2));
        let listing = Listing::from(page);
        assert_eq!(listing.page.total_pages, 30);
        assert_eq!(listing.pages.first(), Some(&PageItem::Page(1)));
        assert!(listing.pages.contains(&PageItem::Break));
    }
}

//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use pageweave::{
    properties::{PageDraft, PageView},
    service::PageService,
    store::PageStore,
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A page draft titled after its slug.
#[allow(dead_code)]
pub fn draft(slug: &str, content: &str) -> PageDraft {
    PageDraft {
        slug: slug.to_string(),
        title: format!("Page {slug}"),
        content: content.to_string(),
        ..Default::default()
    }
}

/// Create one empty page per slug, in order.
#[allow(dead_code)]
pub async fn create_empty_pages<S: PageStore>(
    service: &PageService<S>,
    slugs: &[&str],
) -> Vec<PageView> {
    let mut views = Vec::with_capacity(slugs.len());
    for slug in slugs {
        views.push(service.create_page(draft(slug, "")).await.unwrap());
    }
    views
}

/// Slugs of `pages`, in order.
#[allow(dead_code)]
pub fn slugs(pages: &[pageweave::properties::Page]) -> Vec<&str> {
    pages.iter().map(|p| p.slug.as_str()).collect()
}

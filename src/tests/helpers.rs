//! Shared test utilities for page fixtures

use crate::{
    properties::{Page, PageId},
    store::PageRepository,
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A root page with the given id and slug, titled after the slug.
pub fn page(id: i64, slug: &str) -> Page {
    Page {
        id: PageId(id),
        slug: slug.to_string(),
        title: slug.to_uppercase(),
        ..Default::default()
    }
}

/// Insert one empty root page per slug and return the stored rows in argument order.
pub async fn insert_pages<R: PageRepository, const N: usize>(
    repo: &mut R,
    slugs: [&str; N],
) -> [Page; N] {
    let mut stored = Vec::with_capacity(N);
    for slug in slugs {
        stored.push(
            repo.insert_page(page(0, slug))
                .await
                .expect("fixture slugs are unique"),
        );
    }
    stored
        .try_into()
        .unwrap_or_else(|_| unreachable!("one page per slug"))
}

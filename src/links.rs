//! The derived link graph: one directed edge per distinct page a page's content references.
//!
//! Edges are never edited directly. [`sync_links`] recomputes a page's outgoing set from its
//! current content and replaces the stored set when it differs.
use std::collections::BTreeSet;

use crate::{
    error::PageweaveError,
    properties::{Page, PageId},
    references::extract_identifiers,
    store::{LinkRepository, PageRepository},
};

/// Resolve the pages `page` currently references, excluding itself.
pub async fn resolve_targets<R: PageRepository>(
    repo: &mut R,
    page: &Page,
) -> Result<BTreeSet<PageId>, PageweaveError> {
    let slugs = extract_identifiers(&page.content)
        .into_iter()
        .filter(|slug| slug != &page.slug)
        .collect::<BTreeSet<String>>();
    if slugs.is_empty() {
        return Ok(BTreeSet::new());
    }
    Ok(repo
        .pages_by_slugs(&slugs)
        .await?
        .into_iter()
        .map(|p| p.id)
        .filter(|id| *id != page.id)
        .collect())
}

/// Make `page`'s outgoing edges equal the set of pages its content resolves to.
///
/// Content with no resolvable references leaves the page without outgoing edges. When the stored
/// set already matches, nothing is written. Returns whether the stored set changed.
pub async fn sync_links<R: PageRepository + LinkRepository>(
    repo: &mut R,
    page: &Page,
) -> Result<bool, PageweaveError> {
    let targets = resolve_targets(repo, page).await?;
    let existing = repo
        .links_from(page.id)
        .await?
        .into_iter()
        .map(|link| link.to_page)
        .collect::<BTreeSet<PageId>>();
    if existing == targets {
        tracing::trace!("[sync_links] {} edges unchanged", page.slug);
        return Ok(false);
    }

    let removed = repo.delete_links_from(page.id).await?;
    let targets = targets.into_iter().collect::<Vec<_>>();
    if !targets.is_empty() {
        repo.insert_links(page.id, &targets).await?;
    }
    tracing::debug!(
        "[sync_links] {}: replaced {} outgoing edges with {}",
        page.slug,
        removed,
        targets.len()
    );
    Ok(true)
}

/// Remove every edge touching `page`, in either direction.
pub async fn remove_page_links<R: LinkRepository>(
    repo: &mut R,
    page: PageId,
) -> Result<u64, PageweaveError> {
    let outgoing = repo.delete_links_from(page).await?;
    let incoming = repo.delete_links_to(page).await?;
    Ok(outgoing + incoming)
}

/// Distinct pages whose content references `page`, ordered by id.
pub async fn backlinks<R: PageRepository + LinkRepository>(
    repo: &mut R,
    page: PageId,
) -> Result<Vec<Page>, PageweaveError> {
    let sources = repo
        .links_to(page)
        .await?
        .into_iter()
        .map(|link| link.from_page)
        .collect::<BTreeSet<PageId>>();
    load_pages(repo, sources).await
}

/// Distinct pages referenced by `page`'s content, ordered by id.
pub async fn outlinks<R: PageRepository + LinkRepository>(
    repo: &mut R,
    page: PageId,
) -> Result<Vec<Page>, PageweaveError> {
    let targets = repo
        .links_from(page)
        .await?
        .into_iter()
        .map(|link| link.to_page)
        .collect::<BTreeSet<PageId>>();
    load_pages(repo, targets).await
}

async fn load_pages<R: PageRepository>(
    repo: &mut R,
    ids: BTreeSet<PageId>,
) -> Result<Vec<Page>, PageweaveError> {
    let mut pages = Vec::with_capacity(ids.len());
    for id in ids {
        match repo.page_by_id(id).await? {
            Some(page) => pages.push(page),
            None => tracing::warn!("[links] edge points at missing page id {}", id),
        }
    }
    Ok(pages)
}

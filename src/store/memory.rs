use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LinkRepository, MediaRepository, PageRepository, PageStore, UnitOfWork};
use crate::{
    error::PageweaveError,
    properties::{MediaCandidate, MediaOwner, MediaReference, Page, PageId, PageLink},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    pages: BTreeMap<PageId, Page>,
    links: BTreeMap<i64, PageLink>,
    media: BTreeMap<i64, MediaReference>,
    last_page_id: i64,
    last_link_id: i64,
    last_media_id: i64,
    /// Rows inserted, updated or deleted by committed units of work.
    writes: u64,
}

/// In-process [`PageStore`].
///
/// A unit of work holds the store lock for its whole lifetime and edits a private copy of the
/// state, which replaces the shared state on commit. Writers are therefore serialized, the same
/// way SQLite serializes write transactions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of row writes published so far. Lets callers observe that a re-derivation over
    /// unchanged content wrote nothing.
    pub async fn write_count(&self) -> u64 {
        self.state.lock().await.writes
    }

    pub async fn page_count(&self) -> usize {
        self.state.lock().await.pages.len()
    }

    pub async fn link_count(&self) -> usize {
        self.state.lock().await.links.len()
    }

    pub async fn media_count(&self) -> usize {
        self.state.lock().await.media.len()
    }
}

impl PageStore for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> Result<MemoryUnit, PageweaveError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryUnit { guard, working })
    }
}

pub struct MemoryUnit {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryUnit {
    /// Writes made by this unit so far, including ones not yet committed.
    pub fn pending_writes(&self) -> u64 {
        self.working.writes - self.guard.writes
    }

    fn sorted_siblings<'a, I: Iterator<Item = &'a Page>>(pages: I) -> Vec<Page> {
        let mut siblings = pages.cloned().collect::<Vec<_>>();
        siblings.sort_by_key(|p| (p.order_index, p.id));
        siblings
    }

    fn check_unique_slug(&self, page: &Page) -> Result<(), PageweaveError> {
        let taken = self
            .working
            .pages
            .values()
            .any(|other| other.slug == page.slug && other.id != page.id);
        if taken {
            return Err(PageweaveError::InvariantViolation(format!(
                "slug '{}' already exists",
                page.slug
            )));
        }
        Ok(())
    }
}

impl PageRepository for MemoryUnit {
    async fn page_by_id(&mut self, id: PageId) -> Result<Option<Page>, PageweaveError> {
        Ok(self.working.pages.get(&id).cloned())
    }

    async fn page_by_slug(&mut self, slug: &str) -> Result<Option<Page>, PageweaveError> {
        Ok(self
            .working
            .pages
            .values()
            .find(|p| p.slug == slug)
            .cloned())
    }

    async fn pages_by_slugs(
        &mut self,
        slugs: &BTreeSet<String>,
    ) -> Result<Vec<Page>, PageweaveError> {
        Ok(self
            .working
            .pages
            .values()
            .filter(|p| slugs.contains(&p.slug))
            .cloned()
            .collect())
    }

    async fn children_of(&mut self, parent: PageId) -> Result<Vec<Page>, PageweaveError> {
        Ok(Self::sorted_siblings(
            self.working
                .pages
                .values()
                .filter(|p| p.parent_id == Some(parent)),
        ))
    }

    async fn root_pages(&mut self) -> Result<Vec<Page>, PageweaveError> {
        Ok(Self::sorted_siblings(
            self.working.pages.values().filter(|p| p.is_root()),
        ))
    }

    async fn all_pages(&mut self) -> Result<Vec<Page>, PageweaveError> {
        Ok(self.working.pages.values().cloned().collect())
    }

    async fn insert_page(&mut self, mut page: Page) -> Result<Page, PageweaveError> {
        self.working.last_page_id += 1;
        page.id = PageId(self.working.last_page_id);
        self.check_unique_slug(&page)?;
        self.working.pages.insert(page.id, page.clone());
        self.working.writes += 1;
        Ok(page)
    }

    async fn save_page(&mut self, page: &Page) -> Result<(), PageweaveError> {
        if !self.working.pages.contains_key(&page.id) {
            return Err(PageweaveError::NotFound(format!("page id {}", page.id)));
        }
        self.check_unique_slug(page)?;
        self.working.pages.insert(page.id, page.clone());
        self.working.writes += 1;
        Ok(())
    }

    async fn delete_page(&mut self, id: PageId) -> Result<(), PageweaveError> {
        if self.working.pages.remove(&id).is_some() {
            self.working.writes += 1;
        }
        Ok(())
    }
}

impl LinkRepository for MemoryUnit {
    async fn links_from(&mut self, from: PageId) -> Result<Vec<PageLink>, PageweaveError> {
        Ok(self
            .working
            .links
            .values()
            .filter(|l| l.from_page == from)
            .copied()
            .collect())
    }

    async fn links_to(&mut self, to: PageId) -> Result<Vec<PageLink>, PageweaveError> {
        Ok(self
            .working
            .links
            .values()
            .filter(|l| l.to_page == to)
            .copied()
            .collect())
    }

    async fn delete_links_from(&mut self, from: PageId) -> Result<u64, PageweaveError> {
        let before = self.working.links.len();
        self.working.links.retain(|_, l| l.from_page != from);
        let removed = (before - self.working.links.len()) as u64;
        self.working.writes += removed;
        Ok(removed)
    }

    async fn delete_links_to(&mut self, to: PageId) -> Result<u64, PageweaveError> {
        let before = self.working.links.len();
        self.working.links.retain(|_, l| l.to_page != to);
        let removed = (before - self.working.links.len()) as u64;
        self.working.writes += removed;
        Ok(removed)
    }

    async fn insert_links(&mut self, from: PageId, targets: &[PageId]) -> Result<(), PageweaveError> {
        for to in targets {
            let exists = self
                .working
                .links
                .values()
                .any(|l| l.from_page == from && l.to_page == *to);
            if exists {
                continue;
            }
            self.working.last_link_id += 1;
            let id = self.working.last_link_id;
            self.working.links.insert(
                id,
                PageLink {
                    id,
                    from_page: from,
                    to_page: *to,
                },
            );
            self.working.writes += 1;
        }
        Ok(())
    }
}

impl MediaRepository for MemoryUnit {
    async fn media_for(&mut self, owner: MediaOwner) -> Result<Vec<MediaReference>, PageweaveError> {
        let mut refs = self
            .working
            .media
            .values()
            .filter(|m| m.owner == owner)
            .cloned()
            .collect::<Vec<_>>();
        refs.sort_by_key(|m| (m.order_index, m.id));
        Ok(refs)
    }

    async fn delete_media(&mut self, owner: MediaOwner) -> Result<u64, PageweaveError> {
        let before = self.working.media.len();
        self.working.media.retain(|_, m| m.owner != owner);
        let removed = (before - self.working.media.len()) as u64;
        self.working.writes += removed;
        Ok(removed)
    }

    async fn insert_media(
        &mut self,
        owner: MediaOwner,
        candidates: &[MediaCandidate],
    ) -> Result<(), PageweaveError> {
        for (order_index, candidate) in candidates.iter().enumerate() {
            self.working.last_media_id += 1;
            let id = self.working.last_media_id;
            self.working.media.insert(
                id,
                MediaReference {
                    id,
                    owner,
                    provider: candidate.provider,
                    source_url: candidate.source_url.clone(),
                    embed_url: candidate.embed_url.clone(),
                    order_index: order_index as u32,
                },
            );
            self.working.writes += 1;
        }
        Ok(())
    }
}

impl UnitOfWork for MemoryUnit {
    async fn commit(mut self) -> Result<(), PageweaveError> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }
}

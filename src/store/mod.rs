//! Storage collaborators for the derivation engine.
//!
//! The engine never holds an in-memory page graph. Every parent, child and ancestor question is
//! answered by the store inside a unit of work:
//!
//! - [`PageRepository`]: page rows, lookups by id, slug, slug batch, parent, and root level
//! - [`LinkRepository`]: the derived link edge table
//! - [`MediaRepository`]: normalized media references keyed by owner
//!
//! A [`UnitOfWork`] implements all three and publishes its writes only on
//! [`UnitOfWork::commit`]. Dropping a unit without committing discards everything it wrote.
//!
//! Two stores ship with the crate: [`MemoryStore`] and, with the `service` feature,
//! [`crate::db::SqliteStore`].
use std::{collections::BTreeSet, future::Future};

use crate::{
    error::PageweaveError,
    properties::{MediaCandidate, MediaOwner, MediaReference, Page, PageId, PageLink},
};

mod memory;

pub use memory::{MemoryStore, MemoryUnit};

pub trait PageRepository: Send {
    fn page_by_id(
        &mut self,
        id: PageId,
    ) -> impl Future<Output = Result<Option<Page>, PageweaveError>> + Send;

    fn page_by_slug(
        &mut self,
        slug: &str,
    ) -> impl Future<Output = Result<Option<Page>, PageweaveError>> + Send;

    /// Batch lookup. Slugs without a page are absent from the result; order is unspecified.
    fn pages_by_slugs(
        &mut self,
        slugs: &BTreeSet<String>,
    ) -> impl Future<Output = Result<Vec<Page>, PageweaveError>> + Send;

    fn slug_exists(
        &mut self,
        slug: &str,
    ) -> impl Future<Output = Result<bool, PageweaveError>> + Send {
        async move { Ok(self.page_by_slug(slug).await?.is_some()) }
    }

    /// Direct children of `parent`, ordered by sibling order then id.
    fn children_of(
        &mut self,
        parent: PageId,
    ) -> impl Future<Output = Result<Vec<Page>, PageweaveError>> + Send;

    /// Pages without a parent, ordered by sibling order then id.
    fn root_pages(&mut self) -> impl Future<Output = Result<Vec<Page>, PageweaveError>> + Send;

    /// Every page, ordered by id.
    fn all_pages(&mut self) -> impl Future<Output = Result<Vec<Page>, PageweaveError>> + Send;

    /// Insert a new row. The `id` of the argument is ignored; the stored page is returned.
    fn insert_page(
        &mut self,
        page: Page,
    ) -> impl Future<Output = Result<Page, PageweaveError>> + Send;

    /// Overwrite the row with `page.id`.
    fn save_page(
        &mut self,
        page: &Page,
    ) -> impl Future<Output = Result<(), PageweaveError>> + Send;

    fn delete_page(&mut self, id: PageId)
        -> impl Future<Output = Result<(), PageweaveError>> + Send;
}

pub trait LinkRepository: Send {
    fn links_from(
        &mut self,
        from: PageId,
    ) -> impl Future<Output = Result<Vec<PageLink>, PageweaveError>> + Send;

    fn links_to(
        &mut self,
        to: PageId,
    ) -> impl Future<Output = Result<Vec<PageLink>, PageweaveError>> + Send;

    /// Returns the number of removed edges.
    fn delete_links_from(
        &mut self,
        from: PageId,
    ) -> impl Future<Output = Result<u64, PageweaveError>> + Send;

    /// Returns the number of removed edges.
    fn delete_links_to(
        &mut self,
        to: PageId,
    ) -> impl Future<Output = Result<u64, PageweaveError>> + Send;

    /// Insert one edge per target. An edge that already exists for `(from, to)` is kept as is.
    fn insert_links(
        &mut self,
        from: PageId,
        targets: &[PageId],
    ) -> impl Future<Output = Result<(), PageweaveError>> + Send;
}

pub trait MediaRepository: Send {
    /// Media references of `owner`, ordered by their order index.
    fn media_for(
        &mut self,
        owner: MediaOwner,
    ) -> impl Future<Output = Result<Vec<MediaReference>, PageweaveError>> + Send;

    /// Returns the number of removed references.
    fn delete_media(
        &mut self,
        owner: MediaOwner,
    ) -> impl Future<Output = Result<u64, PageweaveError>> + Send;

    /// Insert `candidates` for `owner`. Each candidate's order index is its position in the
    /// slice.
    fn insert_media(
        &mut self,
        owner: MediaOwner,
        candidates: &[MediaCandidate],
    ) -> impl Future<Output = Result<(), PageweaveError>> + Send;
}

pub trait UnitOfWork: PageRepository + LinkRepository + MediaRepository {
    fn commit(self) -> impl Future<Output = Result<(), PageweaveError>> + Send;
}

pub trait PageStore: Sync {
    type Unit: UnitOfWork;

    fn begin(&self) -> impl Future<Output = Result<Self::Unit, PageweaveError>> + Send;
}

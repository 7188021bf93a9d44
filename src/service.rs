//! [`PageService`] orchestrates every page mutation as one unit of work.
//!
//! A create or update runs, in order: validation, the page row write, structure inference for
//! the pages its content references, media reference sync, and link edge sync. Any error drops
//! the unit of work uncommitted, so no partial structural change is ever published. Moves only
//! validate and reparent; they do not re-derive anything from content.
use crate::{
    config::Settings,
    error::PageweaveError,
    links::{backlinks, outlinks, remove_page_links, sync_links},
    media,
    properties::{
        MediaOwner, MediaReference, MoveRequest, Page, PageDraft, PageTreeNode, PageUpdate,
        PageView,
    },
    references::extract_references,
    store::{MediaRepository, PageRepository, PageStore, UnitOfWork},
    tree::{build_page_tree, infer_structure, validate_parent},
};

pub struct PageService<S: PageStore> {
    store: S,
    settings: Settings,
}

impl<S: PageStore> PageService<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        PageService { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn reject_reserved(&self, slug: &str) -> Result<(), PageweaveError> {
        if self.settings.is_reserved(slug) {
            return Err(PageweaveError::InvariantViolation(format!(
                "slug '{}' is reserved",
                slug.trim()
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, draft), fields(slug = %draft.slug))]
    pub async fn create_page(&self, draft: PageDraft) -> Result<PageView, PageweaveError> {
        self.reject_reserved(&draft.slug)?;
        let slug = draft.slug.trim();
        if slug.is_empty() {
            return Err(PageweaveError::InvariantViolation(
                "slug is required".to_string(),
            ));
        }
        if draft.title.trim().is_empty() {
            return Err(PageweaveError::InvariantViolation(
                "title is required".to_string(),
            ));
        }

        let mut unit = self.store.begin().await?;
        if unit.slug_exists(slug).await? {
            return Err(PageweaveError::InvariantViolation(format!(
                "slug '{slug}' already exists"
            )));
        }
        if let Some(parent_id) = draft.parent_id {
            if unit.page_by_id(parent_id).await?.is_none() {
                return Err(PageweaveError::NotFound(format!("parent page id {parent_id}")));
            }
        }
        let page = unit
            .insert_page(Page {
                slug: slug.to_string(),
                title: draft.title,
                content: draft.content,
                parent_id: draft.parent_id,
                order_index: draft.order_index.unwrap_or_default(),
                ..Default::default()
            })
            .await?;

        derive(&mut unit, &page).await?;
        let view = page_view(&mut unit, page).await?;
        unit.commit().await?;
        tracing::info!("Created page {}", view.page);
        Ok(view)
    }

    /// Apply `update` to the page at `slug`. An update without a parent id makes the page a
    /// root.
    #[tracing::instrument(skip(self, update))]
    pub async fn update_page(
        &self,
        slug: &str,
        update: PageUpdate,
    ) -> Result<PageView, PageweaveError> {
        self.reject_reserved(slug)?;
        let mut unit = self.store.begin().await?;
        let mut page = require_page(&mut unit, slug).await?;

        if let Some(new_slug) = update.slug.as_deref().map(str::trim) {
            if !new_slug.is_empty() && new_slug != page.slug {
                self.reject_reserved(new_slug)?;
                if unit.slug_exists(new_slug).await? {
                    return Err(PageweaveError::InvariantViolation(format!(
                        "slug '{new_slug}' already exists"
                    )));
                }
                page.slug = new_slug.to_string();
            }
        }
        if let Some(title) = update.title {
            page.title = title;
        }
        if let Some(content) = update.content {
            page.content = content;
        }
        match update.parent_id {
            Some(parent_id) if page.parent_id != Some(parent_id) => {
                validate_parent(&mut unit, &page, Some(parent_id)).await?;
                page.parent_id = Some(parent_id);
            }
            Some(_) => {}
            None => page.parent_id = None,
        }
        if let Some(order_index) = update.order_index {
            page.order_index = order_index;
        }
        unit.save_page(&page).await?;

        derive(&mut unit, &page).await?;
        let view = page_view(&mut unit, page).await?;
        unit.commit().await?;
        tracing::info!("Updated page {}", view.page);
        Ok(view)
    }

    /// Reparent the page at `slug`. A request without a parent id moves it to the root level.
    #[tracing::instrument(skip(self))]
    pub async fn move_page(
        &self,
        slug: &str,
        request: MoveRequest,
    ) -> Result<PageView, PageweaveError> {
        let mut unit = self.store.begin().await?;
        let mut page = require_page(&mut unit, slug).await?;
        validate_parent(&mut unit, &page, request.parent_id).await?;
        page.parent_id = request.parent_id;
        if let Some(order_index) = request.order_index {
            page.order_index = order_index;
        }
        unit.save_page(&page).await?;
        let view = page_view(&mut unit, page).await?;
        unit.commit().await?;
        tracing::info!(
            "Moved page {} under {}",
            view.page.slug,
            view.page
                .parent_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "the root".to_string())
        );
        Ok(view)
    }

    /// Delete the page at `slug` together with its link edges (both directions) and its media
    /// references. Its children become roots.
    #[tracing::instrument(skip(self))]
    pub async fn delete_page(&self, slug: &str) -> Result<(), PageweaveError> {
        let mut unit = self.store.begin().await?;
        let page = require_page(&mut unit, slug).await?;

        let edges = remove_page_links(&mut unit, page.id).await?;
        let media = unit.delete_media(MediaOwner::page(page.id)).await?;
        let children = unit.children_of(page.id).await?;
        for mut child in children.iter().cloned() {
            child.parent_id = None;
            unit.save_page(&child).await?;
        }
        unit.delete_page(page.id).await?;
        unit.commit().await?;
        tracing::info!(
            "Deleted page {} ({} edges, {} media references, {} children promoted to roots)",
            page,
            edges,
            media,
            children.len()
        );
        Ok(())
    }

    pub async fn get_page(&self, slug: &str) -> Result<PageView, PageweaveError> {
        let mut unit = self.store.begin().await?;
        let page = require_page(&mut unit, slug).await?;
        page_view(&mut unit, page).await
    }

    pub async fn list_pages(&self) -> Result<Vec<PageView>, PageweaveError> {
        let mut unit = self.store.begin().await?;
        let pages = unit.all_pages().await?;
        let mut views = Vec::with_capacity(pages.len());
        for page in pages {
            views.push(page_view(&mut unit, page).await?);
        }
        Ok(views)
    }

    /// Distinct pages whose content references `slug`.
    pub async fn list_backlinks(&self, slug: &str) -> Result<Vec<Page>, PageweaveError> {
        let mut unit = self.store.begin().await?;
        let page = require_page(&mut unit, slug).await?;
        backlinks(&mut unit, page.id).await
    }

    /// Distinct pages referenced by `slug`'s content.
    pub async fn list_outlinks(&self, slug: &str) -> Result<Vec<Page>, PageweaveError> {
        let mut unit = self.store.begin().await?;
        let page = require_page(&mut unit, slug).await?;
        outlinks(&mut unit, page.id).await
    }

    pub async fn children(&self, slug: &str) -> Result<Vec<Page>, PageweaveError> {
        let mut unit = self.store.begin().await?;
        let page = require_page(&mut unit, slug).await?;
        unit.children_of(page.id).await
    }

    pub async fn roots(&self) -> Result<Vec<Page>, PageweaveError> {
        let mut unit = self.store.begin().await?;
        unit.root_pages().await
    }

    pub async fn page_tree(&self) -> Result<Vec<PageTreeNode>, PageweaveError> {
        let mut unit = self.store.begin().await?;
        Ok(build_page_tree(unit.all_pages().await?))
    }

    /// Re-derive the media references of a non-page owner, such as a post or the home profile.
    #[tracing::instrument(skip(self, content))]
    pub async fn sync_media(
        &self,
        owner: MediaOwner,
        content: &str,
    ) -> Result<Vec<MediaReference>, PageweaveError> {
        let mut unit = self.store.begin().await?;
        media::sync_media(&mut unit, owner, content).await?;
        let stored = unit.media_for(owner).await?;
        unit.commit().await?;
        Ok(stored)
    }

    pub async fn list_media(&self, owner: MediaOwner) -> Result<Vec<MediaReference>, PageweaveError> {
        let mut unit = self.store.begin().await?;
        unit.media_for(owner).await
    }

    pub async fn delete_media(&self, owner: MediaOwner) -> Result<u64, PageweaveError> {
        let mut unit = self.store.begin().await?;
        let removed = unit.delete_media(owner).await?;
        unit.commit().await?;
        Ok(removed)
    }
}

async fn require_page<R: PageRepository>(repo: &mut R, slug: &str) -> Result<Page, PageweaveError> {
    repo.page_by_slug(slug)
        .await?
        .ok_or_else(|| PageweaveError::page_not_found(slug))
}

/// Re-derive everything that hangs off `page`'s content.
async fn derive<U: UnitOfWork>(unit: &mut U, page: &Page) -> Result<(), PageweaveError> {
    let references = extract_references(&page.content);
    infer_structure(unit, page, &references).await?;
    media::sync_media(unit, MediaOwner::page(page.id), &page.content).await?;
    sync_links(unit, page).await?;
    Ok(())
}

async fn page_view<R: MediaRepository>(repo: &mut R, page: Page) -> Result<PageView, PageweaveError> {
    let media = repo.media_for(MediaOwner::page(page.id)).await?;
    Ok(PageView { page, media })
}

//! Page hierarchy: ancestry walks, structure inference from references, move validation, and
//! navigation tree assembly.
//!
//! Ancestry is always answered by walking the persisted `parent_id` chain through a
//! [`PageRepository`], never through in-memory back-pointers.
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::PageweaveError,
    properties::{Page, PageId, PageTreeNode},
    references::Reference,
    store::PageRepository,
};

/// Ids of `page`'s ancestors, nearest first.
///
/// A stored chain that loops back on itself is cut at the first repeated id.
pub async fn ancestor_chain<R: PageRepository>(
    repo: &mut R,
    page: &Page,
) -> Result<Vec<PageId>, PageweaveError> {
    let mut chain = Vec::new();
    let mut visited = BTreeSet::from([page.id]);
    let mut next = page.parent_id;
    while let Some(id) = next {
        if !visited.insert(id) {
            tracing::warn!(
                "[ancestor_chain] parent chain of {} loops back through page id {}",
                page.slug,
                id
            );
            break;
        }
        chain.push(id);
        next = match repo.page_by_id(id).await? {
            Some(parent) => parent.parent_id,
            None => {
                tracing::warn!(
                    "[ancestor_chain] page id {} referenced as parent but missing",
                    id
                );
                None
            }
        };
    }
    Ok(chain)
}

/// True if `candidate` is a proper ancestor of `page`.
pub async fn is_ancestor<R: PageRepository>(
    repo: &mut R,
    candidate: PageId,
    page: &Page,
) -> Result<bool, PageweaveError> {
    if page.parent_id.is_none() {
        return Ok(false);
    }
    Ok(ancestor_chain(repo, page).await?.contains(&candidate))
}

/// Make the pages named by `references` direct children of `page`, in reference order.
///
/// References that do not resolve, that resolve to `page` itself, or that resolve to one of
/// `page`'s ancestors are skipped. Each remaining page gets `page` as parent and the next
/// zero-based sibling index; pages already in that position are not rewritten. Pages that were
/// inferred children in an earlier pass and are no longer referenced keep their position.
pub async fn infer_structure<R: PageRepository>(
    repo: &mut R,
    page: &Page,
    references: &[Reference],
) -> Result<(), PageweaveError> {
    if references.is_empty() {
        return Ok(());
    }
    let slugs = references
        .iter()
        .map(|r| r.identifier.clone())
        .collect::<BTreeSet<String>>();
    let mut resolved = repo
        .pages_by_slugs(&slugs)
        .await?
        .into_iter()
        .map(|p| (p.slug.clone(), p))
        .collect::<BTreeMap<String, Page>>();

    let mut order_index = 0u32;
    let mut seen = BTreeSet::<&str>::new();
    let mut rewritten = 0usize;
    for reference in references {
        if !seen.insert(reference.identifier.as_str()) {
            continue;
        }
        let Some(child) = resolved.get_mut(&reference.identifier) else {
            tracing::trace!(
                "[infer_structure] {} references unknown page {:?}",
                page.slug,
                reference.identifier
            );
            continue;
        };
        if child.id == page.id {
            continue;
        }
        if is_ancestor(repo, child.id, page).await? {
            tracing::debug!(
                "[infer_structure] {} references its ancestor {}; not adopting it",
                page.slug,
                child.slug
            );
            continue;
        }

        if child.parent_id != Some(page.id) || child.order_index != order_index {
            child.parent_id = Some(page.id);
            child.order_index = order_index;
            repo.save_page(child).await?;
            rewritten += 1;
        }
        order_index += 1;
    }
    tracing::debug!(
        "[infer_structure] {} has {} inferred children, {} rewritten",
        page.slug,
        order_index,
        rewritten
    );
    Ok(())
}

/// Check that `moving` may be placed under `new_parent` and return the resolved parent.
///
/// A page may not become its own parent, and may not be placed beneath any of its own
/// descendants. Nothing is written here; callers apply the move after this returns `Ok`.
pub async fn validate_parent<R: PageRepository>(
    repo: &mut R,
    moving: &Page,
    new_parent: Option<PageId>,
) -> Result<Option<Page>, PageweaveError> {
    let Some(parent_id) = new_parent else {
        return Ok(None);
    };
    if parent_id == moving.id {
        return Err(PageweaveError::InvariantViolation(format!(
            "page '{}' cannot be its own parent",
            moving.slug
        )));
    }
    let parent = repo
        .page_by_id(parent_id)
        .await?
        .ok_or_else(|| PageweaveError::NotFound(format!("parent page id {parent_id}")))?;
    if is_ancestor(repo, moving.id, &parent).await? {
        return Err(PageweaveError::StructuralConflict(format!(
            "cannot move page '{}' under its descendant '{}'",
            moving.slug, parent.slug
        )));
    }
    Ok(Some(parent))
}

/// Assemble the navigation tree from a flat page list. Siblings are ordered by order index then
/// id; pages whose parent is not in `pages` are left out, as are pages on a parent loop.
pub fn build_page_tree(pages: Vec<Page>) -> Vec<PageTreeNode> {
    let mut by_parent = BTreeMap::<Option<PageId>, Vec<Page>>::new();
    for page in pages {
        by_parent.entry(page.parent_id).or_default().push(page);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by_key(|p| (p.order_index, p.id));
    }
    let roots = by_parent.remove(&None).unwrap_or_default();
    roots
        .into_iter()
        .map(|root| tree_node(root, &mut by_parent, 0))
        .collect()
}

fn tree_node(
    page: Page,
    by_parent: &mut BTreeMap<Option<PageId>, Vec<Page>>,
    depth: u32,
) -> PageTreeNode {
    let children = by_parent
        .remove(&Some(page.id))
        .unwrap_or_default()
        .into_iter()
        .map(|child| tree_node(child, by_parent, depth + 1))
        .collect();
    PageTreeNode {
        page,
        depth,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        references::extract_references,
        store::{MemoryStore, PageStore, UnitOfWork},
        tests::helpers::{insert_pages, page},
    };
    use test_log::test;

    #[test(tokio::test)]
    async fn test_references_become_ordered_children() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        let [hub, _a, _b, c] = insert_pages(&mut unit, ["hub", "a", "b", "c"]).await;

        let refs = extract_references("[[b]] then /pages/a and [[missing]] and [[hub]]");
        infer_structure(&mut unit, &hub, &refs).await.unwrap();

        let children = unit.children_of(hub.id).await.unwrap();
        assert_eq!(
            children
                .iter()
                .map(|p| (p.slug.as_str(), p.order_index))
                .collect::<Vec<_>>(),
            vec![("b", 0), ("a", 1)]
        );
        assert!(unit.page_by_id(hub.id).await.unwrap().unwrap().is_root());
        assert!(unit.page_by_id(c.id).await.unwrap().unwrap().is_root());
    }

    #[test(tokio::test)]
    async fn test_ancestors_are_never_adopted() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        let [top, mid, leaf] = insert_pages(&mut unit, ["top", "mid", "leaf"]).await;
        infer_structure(&mut unit, &top, &extract_references("[[mid]]"))
            .await
            .unwrap();
        let mid = unit.page_by_id(mid.id).await.unwrap().unwrap();
        infer_structure(&mut unit, &mid, &extract_references("[[leaf]]"))
            .await
            .unwrap();
        let leaf = unit.page_by_id(leaf.id).await.unwrap().unwrap();

        // leaf -> top would close the loop top -> mid -> leaf -> top
        infer_structure(&mut unit, &leaf, &extract_references("[[top]] [[mid]]"))
            .await
            .unwrap();
        let top = unit.page_by_id(top.id).await.unwrap().unwrap();
        assert!(top.parent_id.is_none());
        assert_eq!(ancestor_chain(&mut unit, &leaf).await.unwrap(), vec![mid.id, top.id]);
    }

    #[test(tokio::test)]
    async fn test_second_pass_writes_nothing() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        let [hub, ..] = insert_pages(&mut unit, ["hub", "a", "b"]).await;
        let refs = extract_references("[[a]] [[b]]");
        infer_structure(&mut unit, &hub, &refs).await.unwrap();
        let after_first = unit.pending_writes();
        infer_structure(&mut unit, &hub, &refs).await.unwrap();
        assert_eq!(unit.pending_writes(), after_first);
    }

    #[test(tokio::test)]
    async fn test_reordering_rewrites_order_only_where_changed() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        let [hub, ..] = insert_pages(&mut unit, ["hub", "a", "b", "c"]).await;
        infer_structure(&mut unit, &hub, &extract_references("[[a]] [[b]] [[c]]"))
            .await
            .unwrap();
        let before = unit.pending_writes();
        infer_structure(&mut unit, &hub, &extract_references("[[a]] [[c]] [[b]]"))
            .await
            .unwrap();
        assert_eq!(unit.pending_writes() - before, 2);
        let order = unit
            .children_of(hub.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    #[test(tokio::test)]
    async fn test_last_processed_parent_wins() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        let [left, right, shared] = insert_pages(&mut unit, ["left", "right", "shared"]).await;
        infer_structure(&mut unit, &left, &extract_references("[[shared]]"))
            .await
            .unwrap();
        infer_structure(&mut unit, &right, &extract_references("[[shared]]"))
            .await
            .unwrap();
        let shared = unit.page_by_id(shared.id).await.unwrap().unwrap();
        assert_eq!(shared.parent_id, Some(right.id));
        assert!(unit.children_of(left.id).await.unwrap().is_empty());
    }

    #[test(tokio::test)]
    async fn test_validate_parent_rejects_cycles() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        let [top, mid, leaf, other] = insert_pages(&mut unit, ["top", "mid", "leaf", "other"]).await;
        infer_structure(&mut unit, &top, &extract_references("[[mid]]"))
            .await
            .unwrap();
        let mid = unit.page_by_id(mid.id).await.unwrap().unwrap();
        infer_structure(&mut unit, &mid, &extract_references("[[leaf]]"))
            .await
            .unwrap();

        let err = validate_parent(&mut unit, &top, Some(leaf.id)).await.unwrap_err();
        assert!(matches!(err, PageweaveError::StructuralConflict(_)));
        let err = validate_parent(&mut unit, &top, Some(top.id)).await.unwrap_err();
        assert!(matches!(err, PageweaveError::InvariantViolation(_)));
        let err = validate_parent(&mut unit, &top, Some(PageId(999))).await.unwrap_err();
        assert!(matches!(err, PageweaveError::NotFound(_)));

        let parent = validate_parent(&mut unit, &leaf, Some(other.id)).await.unwrap();
        assert_eq!(parent.map(|p| p.id), Some(other.id));
        assert!(validate_parent(&mut unit, &mid, None).await.unwrap().is_none());
        unit.commit().await.unwrap();
    }

    #[test]
    fn test_build_page_tree_orders_and_nests() {
        let mut root_b = page(1, "b");
        root_b.order_index = 1;
        let root_a = page(2, "a");
        let mut child = page(3, "a-child");
        child.parent_id = Some(PageId(2));
        let mut grandchild = page(4, "a-grandchild");
        grandchild.parent_id = Some(PageId(3));
        let mut orphan = page(5, "orphan");
        orphan.parent_id = Some(PageId(42));

        let tree = build_page_tree(vec![root_b, root_a, child, grandchild, orphan]);
        assert_eq!(
            tree.iter().map(|n| n.page.slug.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert!(tree[0].has_children());
        assert!(!tree[1].has_children());
        let grand = &tree[0].children[0].children[0];
        assert_eq!(grand.page.slug, "a-grandchild");
        assert_eq!(grand.depth, 2);
    }
}

//! Integration tests for PageService over the SQLite store
//!
//! Run with: cargo test --features service
#![cfg(feature = "service")]

mod common;

use common::{create_empty_pages, draft, init_logging, slugs};
use pageweave::{
    config::Settings,
    db::SqliteStore,
    properties::{MediaOwner, MediaProvider, MoveRequest, OwnerKind, PageUpdate},
    service::PageService,
    PageweaveError,
};
use tempfile::TempDir;
use test_log::test;

async fn file_service(dir: &TempDir) -> PageService<SqliteStore> {
    init_logging();
    let path = dir.path().join("pages.db");
    let store = SqliteStore::open(&path).await.unwrap();
    PageService::new(
        store,
        Settings {
            database: path,
            ..Default::default()
        },
    )
}

#[test(tokio::test)]
async fn test_derived_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let service = file_service(&dir).await;
        create_empty_pages(&service, &["intro", "setup-guide"]).await;
        service
            .create_page(draft(
                "guide",
                "See [[intro]] and /pages/setup-guide for more.\n\
                 <iframe src=\"https://www.youtube.com/watch?v=abc123\"></iframe>",
            ))
            .await
            .unwrap();
    }

    let service = file_service(&dir).await;
    let guide = service.get_page("guide").await.unwrap();
    assert_eq!(guide.media.len(), 1);
    assert_eq!(guide.media[0].provider, MediaProvider::YouTube);
    assert_eq!(guide.media[0].embed_url, "https://www.youtube.com/embed/abc123");
    assert_eq!(
        slugs(&service.children("guide").await.unwrap()),
        vec!["intro", "setup-guide"]
    );
    assert_eq!(
        slugs(&service.list_backlinks("setup-guide").await.unwrap()),
        vec!["guide"]
    );
}

#[test(tokio::test)]
async fn test_cycle_rejection_rolls_back() {
    let dir = TempDir::new().unwrap();
    let service = file_service(&dir).await;
    create_empty_pages(&service, &["leaf"]).await;
    service.create_page(draft("top", "[[leaf]]")).await.unwrap();
    let leaf = service.get_page("leaf").await.unwrap().page;

    let err = service
        .update_page(
            "top",
            PageUpdate {
                content: Some("rewritten".to_string()),
                parent_id: Some(leaf.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PageweaveError::StructuralConflict(_)));

    let top = service.get_page("top").await.unwrap().page;
    assert_eq!(top.content, "[[leaf]]");
    assert!(top.is_root());

    let moved = service
        .move_page("leaf", MoveRequest::default())
        .await
        .unwrap();
    assert!(moved.page.is_root());
    assert_eq!(service.roots().await.unwrap().len(), 2);
}

#[test(tokio::test)]
async fn test_delete_cascade_in_sqlite() {
    let dir = TempDir::new().unwrap();
    let service = file_service(&dir).await;
    create_empty_pages(&service, &["target"]).await;
    service
        .create_page(draft("doomed", "[[target]] https://vimeo.com/555444"))
        .await
        .unwrap();
    service.create_page(draft("fan", "/pages/doomed")).await.unwrap();

    service.delete_page("doomed").await.unwrap();
    assert!(service.list_backlinks("target").await.unwrap().is_empty());
    assert!(service.list_outlinks("fan").await.unwrap().is_empty());
    assert!(service.get_page("target").await.unwrap().page.is_root());
    assert!(matches!(
        service.get_page("doomed").await,
        Err(PageweaveError::NotFound(_))
    ));
    assert_eq!(slugs(&service.roots().await.unwrap()), vec!["target", "fan"]);
}

#[test(tokio::test)]
async fn test_home_media_owner() {
    let dir = TempDir::new().unwrap();
    let service = file_service(&dir).await;
    let home = MediaOwner {
        kind: OwnerKind::Home,
        id: 1,
    };
    service
        .sync_media(home, "https://www.bilibili.com/video/BV1xx411c7mD")
        .await
        .unwrap();
    let stored = service
        .sync_media(home, "https://youtu.be/a https://vimeo.com/2")
        .await
        .unwrap();
    assert_eq!(
        stored
            .iter()
            .map(|m| (m.provider, m.order_index))
            .collect::<Vec<_>>(),
        vec![(MediaProvider::YouTube, 0), (MediaProvider::Vimeo, 1)]
    );
    assert_eq!(service.list_media(home).await.unwrap(), stored);
}

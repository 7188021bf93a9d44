//! # pageweave
//!
//! Derives a page hierarchy, a cross-reference graph, and embedded media from free-text page
//! content.
//!
//! ## Overview
//!
//! Authors write loosely structured text that names other pages with `[[slug]]` or
//! `/pages/slug` tokens and embeds video links. On every create or update pageweave re-derives:
//!
//! - the position of each referenced page in the tree (parent and sibling order)
//! - the directed link edges from the page to every page it references
//! - the page's media references, normalized into provider-specific embeddable URLs
//!
//! Every mutation runs as one unit of work against a [`store::PageStore`]: either all derived
//! changes commit together or none do. Ancestry is always answered by walking the stored parent
//! chain, so a page can never end up beneath one of its own descendants.
//!
//! ## Architecture
//!
//! - **[`references`]**: reference token extraction (pure)
//! - **[`media`]**: media URL recognition and normalization (pure), plus owner-level media sync
//! - **[`tree`]**: structure inference, ancestry walks, move validation, navigation tree
//! - **[`links`]**: link edge synchronization, backlinks and outlinks
//! - **[`store`]**: storage collaborator traits and the in-memory store
//! - **[`service`]**: [`service::PageService`], the orchestrating entry point
//! - **`db`** (`service` feature): the SQLite store
//!
//! ## Quick Start
//!
//! ```rust
//! use pageweave::{
//!     config::Settings, properties::PageDraft, service::PageService, store::MemoryStore,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), pageweave::PageweaveError> {
//!     let service = PageService::new(MemoryStore::new(), Settings::default());
//!     for slug in ["intro", "setup-guide"] {
//!         service
//!             .create_page(PageDraft {
//!                 slug: slug.to_string(),
//!                 title: slug.to_string(),
//!                 ..Default::default()
//!             })
//!             .await?;
//!     }
//!     service
//!         .create_page(PageDraft {
//!             slug: "guide".to_string(),
//!             title: "Guide".to_string(),
//!             content: "See [[intro]] and /pages/setup-guide for more".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let children = service.children("guide").await?;
//!     assert_eq!(children.len(), 2);
//!     assert_eq!(service.list_backlinks("intro").await?[0].slug, "guide");
//!     Ok(())
//! }
//! ```

pub mod config;
#[cfg(feature = "service")]
pub mod db;
pub mod error;
pub mod links;
pub mod media;
pub mod properties;
pub mod references;
pub mod service;
pub mod store;
#[cfg(test)]
mod tests;
pub mod tree;

pub use error::*;

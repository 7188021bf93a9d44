//! [crate::properties] holds the rows the derivation engine reads and writes: pages, the derived
//! link edges between them, and the media references recognized in their content.
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

#[cfg(feature = "service")]
use sqlx::{sqlite::SqliteRow, FromRow, Row};

use crate::error::PageweaveError;

/// Storage identity of a page.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct PageId(pub i64);

impl Display for PageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A hierarchical content node. `slug` is the natural key that reference tokens name.
///
/// The tree is stored as a nullable `parent_id` only; children and ancestor chains are always
/// queried from the store rather than held as back-pointers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub parent_id: Option<PageId>,
    pub order_index: u32,
}

impl Page {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl Display for Page {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, id {})", self.title, self.slug, self.id)
    }
}

#[cfg(feature = "service")]
impl FromRow<'_, SqliteRow> for Page {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let order_index: i64 = row.try_get("order_index")?;
        Ok(Page {
            id: PageId(row.try_get("id")?),
            slug: row.try_get("slug")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            parent_id: row.try_get::<Option<i64>, _>("parent_id")?.map(PageId),
            order_index: u32::try_from(order_index)
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
        })
    }
}

/// Input for creating a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDraft {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<PageId>,
    #[serde(default)]
    pub order_index: Option<u32>,
}

/// Input for updating a page. `None` fields keep their stored value, except `parent_id`: an
/// update without a parent makes the page a root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageUpdate {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub parent_id: Option<PageId>,
    pub order_index: Option<u32>,
}

/// Explicit reparenting request. A `None` parent moves the page to the root level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveRequest {
    pub parent_id: Option<PageId>,
    pub order_index: Option<u32>,
}

/// A derived, directed reference from one page to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub id: i64,
    pub from_page: PageId,
    pub to_page: PageId,
}

#[cfg(feature = "service")]
impl FromRow<'_, SqliteRow> for PageLink {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(PageLink {
            id: row.try_get("id")?,
            from_page: PageId(row.try_get("from_page_id")?),
            to_page: PageId(row.try_get("to_page_id")?),
        })
    }
}

/// The kind of record that owns a set of media references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OwnerKind {
    Post,
    Page,
    Home,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Post => "POST",
            OwnerKind::Page => "PAGE",
            OwnerKind::Home => "HOME",
        }
    }
}

impl Display for OwnerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerKind {
    type Err = PageweaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "POST" => Ok(OwnerKind::Post),
            "PAGE" => Ok(OwnerKind::Page),
            "HOME" => Ok(OwnerKind::Home),
            other => Err(PageweaveError::Serialization(format!(
                "unknown owner kind '{other}'"
            ))),
        }
    }
}

/// Composite owner key of a media reference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MediaOwner {
    pub kind: OwnerKind,
    pub id: i64,
}

impl MediaOwner {
    pub fn page(id: PageId) -> Self {
        MediaOwner {
            kind: OwnerKind::Page,
            id: id.0,
        }
    }
}

impl Display for MediaOwner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaProvider {
    #[serde(rename = "YOUTUBE")]
    YouTube,
    Vimeo,
    Bilibili,
    /// Any other URL that looks embeddable as-is.
    Iframe,
}

impl MediaProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaProvider::YouTube => "YOUTUBE",
            MediaProvider::Vimeo => "VIMEO",
            MediaProvider::Bilibili => "BILIBILI",
            MediaProvider::Iframe => "IFRAME",
        }
    }
}

impl Display for MediaProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaProvider {
    type Err = PageweaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "YOUTUBE" => Ok(MediaProvider::YouTube),
            "VIMEO" => Ok(MediaProvider::Vimeo),
            "BILIBILI" => Ok(MediaProvider::Bilibili),
            "IFRAME" => Ok(MediaProvider::Iframe),
            other => Err(PageweaveError::Serialization(format!(
                "unknown media provider '{other}'"
            ))),
        }
    }
}

/// A recognized media URL, normalized to a provider-specific embeddable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCandidate {
    pub provider: MediaProvider,
    pub source_url: String,
    pub embed_url: String,
}

impl MediaCandidate {
    pub fn new<S: Into<String>, E: Into<String>>(
        provider: MediaProvider,
        source_url: S,
        embed_url: E,
    ) -> Self {
        MediaCandidate {
            provider,
            source_url: source_url.into(),
            embed_url: embed_url.into(),
        }
    }
}

/// A stored media reference. `order_index` runs 0..n-1 within an owner after every sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub id: i64,
    pub owner: MediaOwner,
    pub provider: MediaProvider,
    pub source_url: String,
    pub embed_url: String,
    pub order_index: u32,
}

#[cfg(feature = "service")]
impl FromRow<'_, SqliteRow> for MediaReference {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let owner_kind: &str = row.try_get("owner_type")?;
        let provider: &str = row.try_get("provider")?;
        let order_index: i64 = row.try_get("order_index")?;
        Ok(MediaReference {
            id: row.try_get("id")?,
            owner: MediaOwner {
                kind: OwnerKind::from_str(owner_kind).map_err(|e| sqlx::Error::Decode(e.into()))?,
                id: row.try_get("owner_id")?,
            },
            provider: MediaProvider::from_str(provider)
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
            source_url: row.try_get("source_url")?,
            embed_url: row.try_get("embed_url")?,
            order_index: u32::try_from(order_index)
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
        })
    }
}

/// A page as a caller renders it: the row plus its ordered media references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageView {
    pub page: Page,
    pub media: Vec<MediaReference>,
}

/// One node of the navigation tree. Roots sit at depth 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTreeNode {
    pub page: Page,
    pub depth: u32,
    pub children: Vec<PageTreeNode>,
}

impl PageTreeNode {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

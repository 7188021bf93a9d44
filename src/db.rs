//! SQLite-backed [`PageStore`]. Every unit of work is one sqlx transaction; dropping it without
//! committing rolls the transaction back.
use crate::{
    error::PageweaveError,
    properties::{MediaCandidate, MediaOwner, MediaReference, Page, PageId, PageLink},
    store::{LinkRepository, MediaRepository, PageRepository, PageStore, UnitOfWork},
};
use futures_core::future::BoxFuture;
use sqlx::{
    error::BoxDynError,
    migrate::{Migration as SqlxMigration, MigrationSource, MigrationType, Migrator},
    pool::PoolOptions,
    sqlite::{Sqlite, SqliteConnectOptions},
    ConnectOptions, Pool, QueryBuilder, Row,
};
use std::{
    collections::BTreeSet,
    path::Path,
    result::Result,
};

/// <https://www.sqlite.org/limits.html#max_variable_number>
pub const SQLITE_LIMIT_VARIABLE_NUMBER: usize = 32766;

const PAGE_COLUMNS: &str = "id, slug, title, content, parent_id, order_index";

#[derive(Debug, Clone)]
pub struct SqliteStore(pub Pool<Sqlite>);

impl SqliteStore {
    /// Open (creating if needed) the database file at `path` and bring its schema up to date.
    pub async fn open(path: &Path) -> Result<SqliteStore, PageweaveError> {
        tracing::debug!("Opening page store at {:?}", path);
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .disable_statement_logging();
        let pool = PoolOptions::<Sqlite>::new().connect_with(options).await?;
        db_init(pool).await
    }

    /// A private in-memory database. The pool keeps exactly one connection alive for the
    /// store's lifetime since each connection would otherwise see its own empty database.
    pub async fn open_in_memory() -> Result<SqliteStore, PageweaveError> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true)
            .disable_statement_logging();
        let pool = PoolOptions::<Sqlite>::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        db_init(pool).await
    }
}

impl PageStore for SqliteStore {
    type Unit = SqliteUnit;

    async fn begin(&self) -> Result<SqliteUnit, PageweaveError> {
        Ok(SqliteUnit {
            tx: self.0.begin().await?,
        })
    }
}

pub struct SqliteUnit {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl SqliteUnit {
    async fn pages_where(&mut self, clause: &str, id: i64) -> Result<Vec<Page>, PageweaveError> {
        let pages = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE {clause} ORDER BY order_index, id"
        ))
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(pages)
    }
}

impl PageRepository for SqliteUnit {
    async fn page_by_id(&mut self, id: PageId) -> Result<Option<Page>, PageweaveError> {
        let page = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(page)
    }

    async fn page_by_slug(&mut self, slug: &str) -> Result<Option<Page>, PageweaveError> {
        let page = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(page)
    }

    #[tracing::instrument(skip(self))]
    async fn pages_by_slugs(&mut self, slugs: &BTreeSet<String>) -> Result<Vec<Page>, PageweaveError> {
        let slugs = slugs.iter().collect::<Vec<_>>();
        let mut pages = Vec::with_capacity(slugs.len());
        for chunk in slugs.chunks(SQLITE_LIMIT_VARIABLE_NUMBER) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {PAGE_COLUMNS} FROM pages WHERE slug IN ("
            ));
            let mut separated = qb.separated(", ");
            for slug in chunk {
                separated.push_bind(slug.as_str());
            }
            qb.push(")");
            let found = qb
                .build_query_as::<Page>()
                .fetch_all(&mut *self.tx)
                .await
                .map_err(|e| {
                    tracing::error!("[SqliteUnit.pages_by_slugs] SQL error: {}", e);
                    e
                })?;
            pages.extend(found);
        }
        Ok(pages)
    }

    async fn children_of(&mut self, parent: PageId) -> Result<Vec<Page>, PageweaveError> {
        self.pages_where("parent_id = ?", parent.0).await
    }

    async fn root_pages(&mut self) -> Result<Vec<Page>, PageweaveError> {
        let pages = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE parent_id IS NULL ORDER BY order_index, id"
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(pages)
    }

    async fn all_pages(&mut self) -> Result<Vec<Page>, PageweaveError> {
        let pages = sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages ORDER BY id"
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(pages)
    }

    async fn insert_page(&mut self, mut page: Page) -> Result<Page, PageweaveError> {
        let result = sqlx::query(
            "INSERT INTO pages (slug, title, content, parent_id, order_index) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&page.slug)
        .bind(&page.title)
        .bind(&page.content)
        .bind(page.parent_id.map(|id| id.0))
        .bind(i64::from(page.order_index))
        .execute(&mut *self.tx)
        .await?;
        page.id = PageId(result.last_insert_rowid());
        Ok(page)
    }

    async fn save_page(&mut self, page: &Page) -> Result<(), PageweaveError> {
        let result = sqlx::query(
            "UPDATE pages SET slug = ?, title = ?, content = ?, parent_id = ?, order_index = ? \
             WHERE id = ?",
        )
        .bind(&page.slug)
        .bind(&page.title)
        .bind(&page.content)
        .bind(page.parent_id.map(|id| id.0))
        .bind(i64::from(page.order_index))
        .bind(page.id.0)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(PageweaveError::NotFound(format!("page id {}", page.id)));
        }
        Ok(())
    }

    async fn delete_page(&mut self, id: PageId) -> Result<(), PageweaveError> {
        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(id.0)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

impl LinkRepository for SqliteUnit {
    async fn links_from(&mut self, from: PageId) -> Result<Vec<PageLink>, PageweaveError> {
        let links = sqlx::query_as::<_, PageLink>(
            "SELECT id, from_page_id, to_page_id FROM page_links WHERE from_page_id = ? ORDER BY id",
        )
        .bind(from.0)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(links)
    }

    async fn links_to(&mut self, to: PageId) -> Result<Vec<PageLink>, PageweaveError> {
        let links = sqlx::query_as::<_, PageLink>(
            "SELECT id, from_page_id, to_page_id FROM page_links WHERE to_page_id = ? ORDER BY id",
        )
        .bind(to.0)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(links)
    }

    async fn delete_links_from(&mut self, from: PageId) -> Result<u64, PageweaveError> {
        let result = sqlx::query("DELETE FROM page_links WHERE from_page_id = ?")
            .bind(from.0)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_links_to(&mut self, to: PageId) -> Result<u64, PageweaveError> {
        let result = sqlx::query("DELETE FROM page_links WHERE to_page_id = ?")
            .bind(to.0)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_links(&mut self, from: PageId, targets: &[PageId]) -> Result<(), PageweaveError> {
        // Two bound values per row.
        for chunk in targets.chunks(SQLITE_LIMIT_VARIABLE_NUMBER / 2) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT OR IGNORE INTO page_links (from_page_id, to_page_id) ",
            );
            qb.push_values(chunk, |mut b, to| {
                b.push_bind(from.0).push_bind(to.0);
            });
            qb.build().execute(&mut *self.tx).await?;
        }
        Ok(())
    }
}

impl MediaRepository for SqliteUnit {
    async fn media_for(&mut self, owner: MediaOwner) -> Result<Vec<MediaReference>, PageweaveError> {
        let media = sqlx::query_as::<_, MediaReference>(
            "SELECT id, owner_type, owner_id, provider, source_url, embed_url, order_index \
             FROM media_references WHERE owner_type = ? AND owner_id = ? ORDER BY order_index, id",
        )
        .bind(owner.kind.as_str())
        .bind(owner.id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(media)
    }

    async fn delete_media(&mut self, owner: MediaOwner) -> Result<u64, PageweaveError> {
        let result =
            sqlx::query("DELETE FROM media_references WHERE owner_type = ? AND owner_id = ?")
                .bind(owner.kind.as_str())
                .bind(owner.id)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected())
    }

    async fn insert_media(
        &mut self,
        owner: MediaOwner,
        candidates: &[MediaCandidate],
    ) -> Result<(), PageweaveError> {
        let rows = candidates.iter().enumerate().collect::<Vec<_>>();
        // Six bound values per row.
        for chunk in rows.chunks(SQLITE_LIMIT_VARIABLE_NUMBER / 6) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO media_references \
                 (owner_type, owner_id, provider, source_url, embed_url, order_index) ",
            );
            qb.push_values(chunk, |mut b, (order_index, candidate)| {
                b.push_bind(owner.kind.as_str())
                    .push_bind(owner.id)
                    .push_bind(candidate.provider.as_str())
                    .push_bind(candidate.source_url.as_str())
                    .push_bind(candidate.embed_url.as_str())
                    .push_bind(*order_index as i64);
            });
            qb.build().execute(&mut *self.tx).await?;
        }
        Ok(())
    }
}

impl UnitOfWork for SqliteUnit {
    async fn commit(self) -> Result<(), PageweaveError> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// A migration definition.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

#[derive(Debug, Clone)]
struct MigrationList(Vec<Migration>);

impl MigrationSource<'static> for MigrationList {
    fn resolve(self) -> BoxFuture<'static, Result<Vec<SqlxMigration>, BoxDynError>> {
        Box::pin(async move {
            Ok(self
                .0
                .into_iter()
                .map(|migration| {
                    SqlxMigration::new(
                        migration.version,
                        migration.description.into(),
                        MigrationType::Simple,
                        migration.sql.into(),
                        false,
                    )
                })
                .collect())
        })
    }
}

fn migrations() -> MigrationList {
    MigrationList(vec![Migration {
        version: 1,
        description: "create_page_tables",
        sql: "\
        CREATE TABLE pages (\
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            slug TEXT NOT NULL UNIQUE, \
            title TEXT NOT NULL, \
            content TEXT NOT NULL DEFAULT '', \
            parent_id INTEGER REFERENCES pages(id), \
            order_index INTEGER NOT NULL DEFAULT 0); \
        CREATE INDEX idx_pages_parent ON pages(parent_id, order_index); \
        CREATE TABLE page_links (\
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            from_page_id INTEGER NOT NULL REFERENCES pages(id), \
            to_page_id INTEGER NOT NULL REFERENCES pages(id), \
            UNIQUE(from_page_id, to_page_id)); \
        CREATE INDEX idx_page_links_to ON page_links(to_page_id); \
        CREATE TABLE media_references (\
            id INTEGER PRIMARY KEY AUTOINCREMENT, \
            owner_type TEXT NOT NULL, \
            owner_id INTEGER NOT NULL, \
            provider TEXT NOT NULL, \
            source_url TEXT NOT NULL, \
            embed_url TEXT NOT NULL, \
            order_index INTEGER NOT NULL); \
        CREATE INDEX idx_media_owner ON media_references(owner_type, owner_id, order_index);",
    }])
}

async fn db_init(pool: Pool<Sqlite>) -> Result<SqliteStore, PageweaveError> {
    let migrator = Migrator::new(migrations()).await?;
    migrator.run(&pool).await?;

    let page_res = sqlx::query("SELECT COUNT(*) FROM pages;")
        .fetch_one(&pool)
        .await?;
    let link_res = sqlx::query("SELECT COUNT(*) FROM page_links;")
        .fetch_one(&pool)
        .await?;
    tracing::info!(
        "Page store initialized.\n \
         \tPage count:\t{:?} \n \
         \tLink edge count:\t{:?}",
        page_res.get::<i64, usize>(0),
        link_res.get::<i64, usize>(0)
    );
    Ok(SqliteStore(pool))
}

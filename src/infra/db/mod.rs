//! Postgres-backed repository implementations.

mod catalog;
mod community;
mod forum;
mod hymns;
mod users;
mod util;

pub use util::map_sqlx_error;
use util::contains_pattern;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{
    Postgres, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};
use uuid::Uuid;

use crate::application::pagination::{PageRequest, Paginated};
use crate::application::repos::{HealthRepo, RepoError};
use crate::domain::entities::{AuthorRef, CategoryRef, HymnSummary};
use crate::domain::types::HymnStatus;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }

    fn page_bounds(page: PageRequest) -> (i64, i64) {
        let limit = i64::try_from(page.limit()).unwrap_or(i64::MAX);
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
        (limit, offset)
    }

    fn paginated<T>(items: Vec<T>, total: i64, page: PageRequest) -> Result<Paginated<T>, RepoError> {
        Ok(Paginated::new(items, Self::convert_count(total)?, page))
    }

    /// Loads authors and categories for a batch of hymns with one query each
    /// and folds them into listing summaries, preserving the input order.
    async fn summarize(&self, rows: Vec<HymnSummaryRow>) -> Result<Vec<HymnSummary>, RepoError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

        let authors: Vec<LinkRow> = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT ha.hymn_id, a.id, a.name
            FROM hymn_authors ha
            INNER JOIN authors a ON a.id = ha.author_id
            WHERE ha.hymn_id = ANY($1)
            ORDER BY LOWER(a.name), a.id
            "#,
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let categories: Vec<LinkRow> = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT hc.hymn_id, c.id, c.name
            FROM hymn_categories hc
            INNER JOIN categories c ON c.id = hc.category_id
            WHERE hc.hymn_id = ANY($1)
            ORDER BY LOWER(c.name), c.id
            "#,
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut authors_by_hymn: HashMap<Uuid, Vec<AuthorRef>> = HashMap::new();
        for link in authors {
            authors_by_hymn
                .entry(link.hymn_id)
                .or_default()
                .push(AuthorRef {
                    id: link.id,
                    name: link.name,
                });
        }
        let mut categories_by_hymn: HashMap<Uuid, Vec<CategoryRef>> = HashMap::new();
        for link in categories {
            categories_by_hymn
                .entry(link.hymn_id)
                .or_default()
                .push(CategoryRef {
                    id: link.id,
                    name: link.name,
                });
        }

        Ok(rows
            .into_iter()
            .map(|row| HymnSummary {
                authors: authors_by_hymn.remove(&row.id).unwrap_or_default(),
                categories: categories_by_hymn.remove(&row.id).unwrap_or_default(),
                id: row.id,
                number: row.number,
                title: row.title,
                status: row.status,
                view_count: row.view_count,
            })
            .collect())
    }
}

/// Columns every hymn listing selects, aliased from `hymns h`.
const HYMN_SUMMARY_COLUMNS: &str = "h.id, h.number, h.title, h.status, h.view_count";

#[derive(sqlx::FromRow)]
struct HymnSummaryRow {
    id: Uuid,
    number: Option<i32>,
    title: String,
    status: HymnStatus,
    view_count: i64,
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    hymn_id: Uuid,
    id: Uuid,
    name: String,
}

#[async_trait::async_trait]
impl HealthRepo for PostgresRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        PostgresRepositories::health_check(self)
            .await
            .map_err(map_sqlx_error)
    }
}

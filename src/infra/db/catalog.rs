use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{PageRequest, Paginated},
    application::repos::{CatalogRepo, CatalogWriteRepo, RepoError},
    domain::entities::{AuthorRecord, CategoryRecord, CategoryWithCount, HymnSummary},
    domain::hymns::{AuthorDraft, CategoryDraft},
};

use super::{
    HYMN_SUMMARY_COLUMNS, HymnSummaryRow, PostgresRepositories, contains_pattern, map_sqlx_error,
};

const AUTHOR_COLUMNS: &str = "id, name, biography, birth_year, death_year, created_at";
const CATEGORY_COLUMNS: &str = "id, name, description, created_at";

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: Uuid,
    name: String,
    biography: Option<String>,
    birth_year: Option<i32>,
    death_year: Option<i32>,
    created_at: OffsetDateTime,
}

impl From<AuthorRow> for AuthorRecord {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            biography: row.biography,
            birth_year: row.birth_year,
            death_year: row.death_year,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: OffsetDateTime,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryCountRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: OffsetDateTime,
    hymn_count: i64,
}

#[async_trait]
impl CatalogRepo for PostgresRepositories {
    async fn list_authors(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Paginated<AuthorRecord>, RepoError> {
        let (limit, offset) = Self::page_bounds(page);
        let pattern = search.map(contains_pattern);

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM authors WHERE 1=1 ");
        if let Some(pattern) = pattern.as_ref() {
            count_qb.push(" AND name ILIKE ");
            count_qb.push_bind(pattern);
            count_qb.push(r" ESCAPE '\'");
        }
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE 1=1 "));
        if let Some(pattern) = pattern.as_ref() {
            qb.push(" AND name ILIKE ");
            qb.push_bind(pattern);
            qb.push(r" ESCAPE '\'");
        }
        qb.push(" ORDER BY LOWER(name), id LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<AuthorRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::paginated(rows.into_iter().map(AuthorRecord::from).collect(), total, page)
    }

    async fn find_author(&self, id: Uuid) -> Result<Option<AuthorRecord>, RepoError> {
        let row = sqlx::query_as::<_, AuthorRow>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AuthorRecord::from))
    }

    async fn author_hymns(&self, author_id: Uuid) -> Result<Vec<HymnSummary>, RepoError> {
        let rows = sqlx::query_as::<_, HymnSummaryRow>(&format!(
            r#"
            SELECT {HYMN_SUMMARY_COLUMNS}
            FROM hymns h
            INNER JOIN hymn_authors ha ON ha.hymn_id = h.id
            WHERE ha.author_id = $1 AND h.status = 'approved'
            ORDER BY LOWER(h.title), h.id
            "#
        ))
        .bind(author_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.summarize(rows).await
    }

    async fn list_categories(&self) -> Result<Vec<CategoryWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryCountRow>(
            r#"
            SELECT
                c.id,
                c.name,
                c.description,
                c.created_at,
                COUNT(h.id) AS hymn_count
            FROM categories c
            LEFT JOIN hymn_categories hc ON hc.category_id = c.id
            LEFT JOIN hymns h ON h.id = hc.hymn_id AND h.status = 'approved'
            GROUP BY c.id, c.name, c.description, c.created_at
            ORDER BY LOWER(c.name), c.id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(CategoryWithCount {
                    hymn_count: Self::convert_count(row.hymn_count)?,
                    category: CategoryRecord {
                        id: row.id,
                        name: row.name,
                        description: row.description,
                        created_at: row.created_at,
                    },
                })
            })
            .collect()
    }

    async fn search_categories(
        &self,
        search: &str,
        page: PageRequest,
    ) -> Result<Paginated<CategoryRecord>, RepoError> {
        let (limit, offset) = Self::page_bounds(page);
        let pattern = contains_pattern(search);

        let total: i64 = sqlx::query_scalar(
            r"SELECT COUNT(*) FROM categories WHERE name ILIKE $1 ESCAPE '\' OR description ILIKE $1 ESCAPE '\'",
        )
        .bind(&pattern)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories
            WHERE name ILIKE $1 ESCAPE '\' OR description ILIKE $1 ESCAPE '\'
            ORDER BY LOWER(name), id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Self::paginated(
            rows.into_iter().map(CategoryRecord::from).collect(),
            total,
            page,
        )
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CategoryRecord::from))
    }

    async fn list_category_hymns(
        &self,
        category_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<HymnSummary>, RepoError> {
        let (limit, offset) = Self::page_bounds(page);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM hymns h
            INNER JOIN hymn_categories hc ON hc.hymn_id = h.id
            WHERE hc.category_id = $1 AND h.status = 'approved'
            "#,
        )
        .bind(category_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, HymnSummaryRow>(&format!(
            r#"
            SELECT {HYMN_SUMMARY_COLUMNS}
            FROM hymns h
            INNER JOIN hymn_categories hc ON hc.hymn_id = h.id
            WHERE hc.category_id = $1 AND h.status = 'approved'
            ORDER BY LOWER(h.title), h.id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(category_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Self::paginated(self.summarize(rows).await?, total, page)
    }
}

#[async_trait]
impl CatalogWriteRepo for PostgresRepositories {
    async fn create_author(&self, draft: AuthorDraft) -> Result<AuthorRecord, RepoError> {
        let row = sqlx::query_as::<_, AuthorRow>(&format!(
            r#"
            INSERT INTO authors (id, name, biography, birth_year, death_year)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {AUTHOR_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(draft.name)
        .bind(draft.biography)
        .bind(draft.birth_year)
        .bind(draft.death_year)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(AuthorRecord::from(row))
    }

    async fn update_author(
        &self,
        id: Uuid,
        draft: AuthorDraft,
    ) -> Result<AuthorRecord, RepoError> {
        let row = sqlx::query_as::<_, AuthorRow>(&format!(
            r#"
            UPDATE authors
            SET name = $2, biography = $3, birth_year = $4, death_year = $5
            WHERE id = $1
            RETURNING {AUTHOR_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(draft.name)
        .bind(draft.biography)
        .bind(draft.birth_year)
        .bind(draft.death_year)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(AuthorRecord::from(row))
    }

    async fn delete_author(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn count_author_links(&self, id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hymn_authors WHERE author_id = $1")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn create_category(&self, draft: CategoryDraft) -> Result<CategoryRecord, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(draft.name)
        .bind(draft.description)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CategoryRecord::from(row))
    }

    async fn update_category(
        &self,
        id: Uuid,
        draft: CategoryDraft,
    ) -> Result<CategoryRecord, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            UPDATE categories
            SET name = $2, description = $3
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(draft.name)
        .bind(draft.description)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CategoryRecord::from(row))
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn count_category_links(&self, id: Uuid) -> Result<u64, RepoError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM hymn_categories WHERE category_id = $1")
                .bind(id)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }
}

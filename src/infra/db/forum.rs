use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{PageRequest, Paginated},
    application::repos::{
        CreateCommentParams, CreateForumPostParams, ForumPostFilter, ForumRepo, ForumWriteRepo,
        RepoError,
    },
    domain::entities::{
        ForumCommentRecord, ForumPostRecord, ForumPostSummary, ForumTagRecord, HymnRef,
        TagWithCount, UserRef,
    },
    domain::forum::PostDraft,
    domain::types::ForumSort,
};

use super::{PostgresRepositories, contains_pattern, map_sqlx_error};

const POST_COLUMNS: &str = "id, user_id, hymn_id, title, content, view_count, is_pinned, is_featured, created_at, updated_at";

const POST_SUMMARY_SELECT: &str = r#"
    SELECT
        p.id,
        p.title,
        p.user_id,
        u.display_name,
        u.avatar_url,
        p.hymn_id,
        h.title AS hymn_title,
        p.view_count,
        p.is_pinned,
        p.is_featured,
        p.created_at,
        (SELECT COUNT(*) FROM forum_comments c WHERE c.post_id = p.id) AS comment_count,
        (SELECT COUNT(*) FROM forum_post_likes l WHERE l.post_id = p.id) AS like_count
    FROM forum_posts p
    INNER JOIN users u ON u.id = p.user_id
    LEFT JOIN hymns h ON h.id = p.hymn_id
    WHERE 1=1 "#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.parent_id, c.user_id, u.display_name, u.avatar_url, c.content, c.created_at,
        (SELECT COUNT(*) FROM forum_comment_likes l WHERE l.comment_id = c.id) AS like_count
    FROM forum_comments c
    INNER JOIN users u ON u.id = c.user_id
"#;

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    user_id: Uuid,
    hymn_id: Option<Uuid>,
    title: String,
    content: String,
    view_count: i64,
    is_pinned: bool,
    is_featured: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for ForumPostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            hymn_id: row.hymn_id,
            title: row.title,
            content: row.content,
            view_count: row.view_count,
            is_pinned: row.is_pinned,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostSummaryRow {
    id: Uuid,
    title: String,
    user_id: Uuid,
    display_name: String,
    avatar_url: Option<String>,
    hymn_id: Option<Uuid>,
    hymn_title: Option<String>,
    view_count: i64,
    is_pinned: bool,
    is_featured: bool,
    created_at: OffsetDateTime,
    comment_count: i64,
    like_count: i64,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    parent_id: Option<Uuid>,
    user_id: Uuid,
    display_name: String,
    avatar_url: Option<String>,
    content: String,
    created_at: OffsetDateTime,
    like_count: i64,
}

impl TryFrom<CommentRow> for ForumCommentRecord {
    type Error = RepoError;

    fn try_from(row: CommentRow) -> Result<Self, RepoError> {
        Ok(Self {
            id: row.id,
            post_id: row.post_id,
            parent_id: row.parent_id,
            author: UserRef {
                id: row.user_id,
                display_name: row.display_name,
                avatar_url: row.avatar_url,
            },
            content: row.content,
            like_count: PostgresRepositories::convert_count(row.like_count)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PostTagRow {
    post_id: Uuid,
    id: Uuid,
    name: String,
}

impl PostgresRepositories {
    fn apply_forum_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q ForumPostFilter) {
        if let Some(user_id) = filter.user_id {
            qb.push(" AND p.user_id = ");
            qb.push_bind(user_id);
        }
        if let Some(hymn_id) = filter.hymn_id {
            qb.push(" AND p.hymn_id = ");
            qb.push_bind(hymn_id);
        }
        if let Some(tag) = filter.tag.as_ref() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM forum_post_tags pt INNER JOIN forum_tags t ON t.id = pt.tag_id WHERE pt.post_id = p.id AND t.name = ",
            );
            qb.push_bind(tag);
            qb.push(")");
        }
        if let Some(search) = filter.search.as_ref() {
            let pattern = contains_pattern(search);
            qb.push(" AND (p.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(r" ESCAPE '\' OR p.content ILIKE ");
            qb.push_bind(pattern);
            qb.push(r" ESCAPE '\'");
            qb.push(")");
        }
    }

    /// Attaches tags to summary rows with one query for the whole page.
    async fn summarize_posts(
        &self,
        rows: Vec<PostSummaryRow>,
    ) -> Result<Vec<ForumPostSummary>, RepoError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let tags = sqlx::query_as::<_, PostTagRow>(
            r#"
            SELECT pt.post_id, t.id, t.name
            FROM forum_post_tags pt
            INNER JOIN forum_tags t ON t.id = pt.tag_id
            WHERE pt.post_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut tags_by_post: HashMap<Uuid, Vec<ForumTagRecord>> = HashMap::new();
        for tag in tags {
            tags_by_post
                .entry(tag.post_id)
                .or_default()
                .push(ForumTagRecord {
                    id: tag.id,
                    name: tag.name,
                });
        }

        rows.into_iter()
            .map(|row| {
                Ok(ForumPostSummary {
                    tags: tags_by_post.remove(&row.id).unwrap_or_default(),
                    hymn: row
                        .hymn_id
                        .zip(row.hymn_title)
                        .map(|(id, title)| HymnRef { id, title }),
                    author: UserRef {
                        id: row.user_id,
                        display_name: row.display_name,
                        avatar_url: row.avatar_url,
                    },
                    comment_count: Self::convert_count(row.comment_count)?,
                    like_count: Self::convert_count(row.like_count)?,
                    id: row.id,
                    title: row.title,
                    view_count: row.view_count,
                    is_pinned: row.is_pinned,
                    is_featured: row.is_featured,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    /// Upserts tags by name and links them to the post, replacing old links.
    async fn replace_post_tags(
        tx: &mut Transaction<'_, Postgres>,
        post_id: Uuid,
        tags: &[String],
    ) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM forum_post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        for name in tags {
            let tag_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO forum_tags (id, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

            sqlx::query(
                "INSERT INTO forum_post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ForumRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        filter: &ForumPostFilter,
        page: PageRequest,
    ) -> Result<Paginated<ForumPostSummary>, RepoError> {
        let (limit, offset) = Self::page_bounds(page);

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM forum_posts p WHERE 1=1 ");
        Self::apply_forum_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(POST_SUMMARY_SELECT);
        Self::apply_forum_filter(&mut qb, filter);
        qb.push(match filter.sort {
            ForumSort::Latest => " ORDER BY p.is_pinned DESC, p.created_at DESC, p.id DESC",
            ForumSort::Popular => {
                " ORDER BY like_count DESC, p.view_count DESC, p.created_at DESC, p.id DESC"
            }
            ForumSort::Comments => " ORDER BY comment_count DESC, p.created_at DESC, p.id DESC",
        });
        qb.push(" LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostSummaryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::paginated(self.summarize_posts(rows).await?, total, page)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<ForumPostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM forum_posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ForumPostRecord::from))
    }

    async fn post_summary(&self, id: Uuid) -> Result<Option<ForumPostSummary>, RepoError> {
        let row = sqlx::query_as::<_, PostSummaryRow>(&format!(
            "{POST_SUMMARY_SELECT} AND p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.summarize_posts(vec![row]).await?.into_iter().next())
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<ForumCommentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "{COMMENT_SELECT} WHERE c.post_id = $1 ORDER BY c.created_at, c.id"
        ))
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ForumCommentRecord::try_from).collect()
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<ForumCommentRecord>, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(ForumCommentRecord::try_from).transpose()
    }

    async fn has_liked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM forum_post_likes WHERE post_id = $1 AND user_id = $2)",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn is_bookmarked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM forum_bookmarks WHERE post_id = $1 AND user_id = $2)",
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_bookmarks(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<ForumPostSummary>, RepoError> {
        let (limit, offset) = Self::page_bounds(page);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM forum_bookmarks WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, PostSummaryRow>(&format!(
            r#"{POST_SUMMARY_SELECT}
            AND EXISTS (SELECT 1 FROM forum_bookmarks b WHERE b.post_id = p.id AND b.user_id = $1)
            ORDER BY (SELECT b.created_at FROM forum_bookmarks b WHERE b.post_id = p.id AND b.user_id = $1) DESC, p.id DESC
            LIMIT $2 OFFSET $3"#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Self::paginated(self.summarize_posts(rows).await?, total, page)
    }

    async fn increment_post_view(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query("UPDATE forum_posts SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let rows: Vec<(Uuid, String, i64)> = sqlx::query_as(
            r#"
            SELECT t.id, t.name, COUNT(pt.post_id) AS post_count
            FROM forum_tags t
            LEFT JOIN forum_post_tags pt ON pt.tag_id = t.id
            GROUP BY t.id, t.name
            HAVING COUNT(pt.post_id) > 0
            ORDER BY post_count DESC, t.name
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(id, name, count)| {
                Ok(TagWithCount {
                    id,
                    name,
                    post_count: Self::convert_count(count)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ForumWriteRepo for PostgresRepositories {
    async fn create_post(
        &self,
        params: CreateForumPostParams,
    ) -> Result<ForumPostRecord, RepoError> {
        let CreateForumPostParams {
            user_id,
            hymn_id,
            draft,
        } = params;
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            INSERT INTO forum_posts (id, user_id, hymn_id, title, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(hymn_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::replace_post_tags(&mut tx, row.id, &draft.tags).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(ForumPostRecord::from(row))
    }

    async fn update_post(&self, id: Uuid, draft: PostDraft) -> Result<ForumPostRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            UPDATE forum_posts
            SET title = $2, content = $3, updated_at = now()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.content)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::replace_post_tags(&mut tx, id, &draft.tags).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(ForumPostRecord::from(row))
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM forum_posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn add_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<ForumCommentRecord, RepoError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO forum_comments (id, post_id, user_id, parent_id, content)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(params.post_id)
        .bind(params.user_id)
        .bind(params.parent_id)
        .bind(params.draft.content)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.find_comment(id).await?.ok_or(RepoError::NotFound)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM forum_comments WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let removed = sqlx::query("DELETE FROM forum_post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO forum_post_likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(removed == 0)
    }

    async fn toggle_comment_like(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let removed =
            sqlx::query("DELETE FROM forum_comment_likes WHERE comment_id = $1 AND user_id = $2")
                .bind(comment_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO forum_comment_likes (comment_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(removed == 0)
    }

    async fn toggle_bookmark(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let removed = sqlx::query("DELETE FROM forum_bookmarks WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO forum_bookmarks (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(removed == 0)
    }

    async fn set_featured(&self, id: Uuid, featured: bool) -> Result<ForumPostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE forum_posts SET is_featured = $2 WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(featured)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ForumPostRecord::from(row))
    }
}

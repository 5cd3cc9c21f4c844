use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{PageRequest, Paginated},
    application::repos::{
        CreateHymnParams, HymnQueryFilter, HymnsRepo, HymnsWriteRepo, MediaRecord, NewMedia,
        RepoError, UpdateHymnParams,
    },
    domain::entities::{
        AuthorRef, CategoryRef, HymnAudioRecord, HymnMedia, HymnPdfRecord, HymnRecord,
        HymnSummary, HymnVideoRecord,
    },
    domain::types::{HymnSort, HymnStatus, SortDirection},
};

use super::{
    HYMN_SUMMARY_COLUMNS, HymnSummaryRow, PostgresRepositories, contains_pattern, map_sqlx_error,
};

const HYMN_COLUMNS: &str = "id, number, title, lyrics, status, view_count, last_viewed_at, created_by, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct HymnRow {
    id: Uuid,
    number: Option<i32>,
    title: String,
    lyrics: String,
    status: HymnStatus,
    view_count: i64,
    last_viewed_at: Option<OffsetDateTime>,
    created_by: Option<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<HymnRow> for HymnRecord {
    fn from(row: HymnRow) -> Self {
        Self {
            id: row.id,
            number: row.number,
            title: row.title,
            lyrics: row.lyrics,
            status: row.status,
            view_count: row.view_count,
            last_viewed_at: row.last_viewed_at,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PdfRow {
    id: Uuid,
    hymn_id: Uuid,
    pdf_url: String,
    description: Option<String>,
    created_at: OffsetDateTime,
}

impl From<PdfRow> for HymnPdfRecord {
    fn from(row: PdfRow) -> Self {
        Self {
            id: row.id,
            hymn_id: row.hymn_id,
            pdf_url: row.pdf_url,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AudioRow {
    id: Uuid,
    hymn_id: Uuid,
    pdf_id: Option<Uuid>,
    audio_url: String,
    title: Option<String>,
    created_at: OffsetDateTime,
}

impl From<AudioRow> for HymnAudioRecord {
    fn from(row: AudioRow) -> Self {
        Self {
            id: row.id,
            hymn_id: row.hymn_id,
            pdf_id: row.pdf_id,
            audio_url: row.audio_url,
            title: row.title,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VideoRow {
    id: Uuid,
    hymn_id: Uuid,
    pdf_id: Option<Uuid>,
    video_url: String,
    source: Option<String>,
    created_at: OffsetDateTime,
}

impl From<VideoRow> for HymnVideoRecord {
    fn from(row: VideoRow) -> Self {
        Self {
            id: row.id,
            hymn_id: row.hymn_id,
            pdf_id: row.pdf_id,
            video_url: row.video_url,
            source: row.source,
            created_at: row.created_at,
        }
    }
}

impl PostgresRepositories {
    fn apply_hymn_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q HymnQueryFilter) {
        if let Some(status) = filter.status {
            qb.push(" AND h.status = ");
            qb.push_bind(status);
        }

        if let Some(author_id) = filter.author_id {
            qb.push(" AND EXISTS (SELECT 1 FROM hymn_authors ha WHERE ha.hymn_id = h.id AND ha.author_id = ");
            qb.push_bind(author_id);
            qb.push(")");
        }

        if let Some(category_id) = filter.category_id {
            qb.push(" AND EXISTS (SELECT 1 FROM hymn_categories hc WHERE hc.hymn_id = h.id AND hc.category_id = ");
            qb.push_bind(category_id);
            qb.push(")");
        }

        if let Some(search) = filter.search.as_ref() {
            let pattern = contains_pattern(search);
            qb.push(" AND (h.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(r" ESCAPE '\' OR h.lyrics ILIKE ");
            qb.push_bind(pattern);
            qb.push(r" ESCAPE '\'");
            qb.push(" OR h.number::text = ");
            qb.push_bind(search.as_str());
            qb.push(")");
        }
    }

    fn push_hymn_order(qb: &mut QueryBuilder<'_, Postgres>, filter: &HymnQueryFilter) {
        let direction = match filter.effective_direction() {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let column = match filter.sort {
            HymnSort::Title => "LOWER(h.title)",
            HymnSort::Number => "h.number",
            HymnSort::Views => "h.view_count",
            HymnSort::Recent => "h.created_at",
        };
        qb.push(" ORDER BY ");
        qb.push(column);
        qb.push(" ");
        qb.push(direction);
        qb.push(" NULLS LAST, LOWER(h.title) ASC, h.id ASC");
    }

    async fn load_hymn_row(&self, id: Uuid) -> Result<Option<HymnRecord>, RepoError> {
        let row = sqlx::query_as::<_, HymnRow>(&format!(
            "SELECT {HYMN_COLUMNS} FROM hymns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(HymnRecord::from))
    }
}

#[async_trait]
impl HymnsRepo for PostgresRepositories {
    async fn list_hymns(
        &self,
        filter: &HymnQueryFilter,
        page: PageRequest,
    ) -> Result<Paginated<HymnSummary>, RepoError> {
        let (limit, offset) = Self::page_bounds(page);

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM hymns h WHERE 1=1 ");
        Self::apply_hymn_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {HYMN_SUMMARY_COLUMNS} FROM hymns h WHERE 1=1 "
        ));
        Self::apply_hymn_filter(&mut qb, filter);
        Self::push_hymn_order(&mut qb, filter);
        qb.push(" LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<HymnSummaryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::paginated(self.summarize(rows).await?, total, page)
    }

    async fn find_hymn(&self, id: Uuid) -> Result<Option<HymnRecord>, RepoError> {
        self.load_hymn_row(id).await
    }

    async fn hymn_authors(&self, hymn_id: Uuid) -> Result<Vec<AuthorRef>, RepoError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT a.id, a.name
            FROM authors a
            INNER JOIN hymn_authors ha ON ha.author_id = a.id
            WHERE ha.hymn_id = $1
            ORDER BY LOWER(a.name), a.id
            "#,
        )
        .bind(hymn_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| AuthorRef { id, name })
            .collect())
    }

    async fn hymn_categories(&self, hymn_id: Uuid) -> Result<Vec<CategoryRef>, RepoError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT c.id, c.name
            FROM categories c
            INNER JOIN hymn_categories hc ON hc.category_id = c.id
            WHERE hc.hymn_id = $1
            ORDER BY LOWER(c.name), c.id
            "#,
        )
        .bind(hymn_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| CategoryRef { id, name })
            .collect())
    }

    async fn hymn_media(&self, hymn_id: Uuid) -> Result<HymnMedia, RepoError> {
        let pdfs = sqlx::query_as::<_, PdfRow>(
            "SELECT id, hymn_id, pdf_url, description, created_at FROM hymn_pdfs WHERE hymn_id = $1 ORDER BY created_at, id",
        )
        .bind(hymn_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let audio = sqlx::query_as::<_, AudioRow>(
            "SELECT id, hymn_id, pdf_id, audio_url, title, created_at FROM hymn_audio WHERE hymn_id = $1 ORDER BY created_at, id",
        )
        .bind(hymn_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let videos = sqlx::query_as::<_, VideoRow>(
            "SELECT id, hymn_id, pdf_id, video_url, source, created_at FROM hymn_videos WHERE hymn_id = $1 ORDER BY created_at, id",
        )
        .bind(hymn_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(HymnMedia {
            pdfs: pdfs.into_iter().map(HymnPdfRecord::from).collect(),
            audio: audio.into_iter().map(HymnAudioRecord::from).collect(),
            videos: videos.into_iter().map(HymnVideoRecord::from).collect(),
        })
    }

    async fn hymns_sharing_links(
        &self,
        hymn_id: Uuid,
        limit: usize,
    ) -> Result<Vec<HymnSummary>, RepoError> {
        let rows = sqlx::query_as::<_, HymnSummaryRow>(&format!(
            r#"
            SELECT {HYMN_SUMMARY_COLUMNS}
            FROM hymns h
            WHERE h.status = 'approved'
              AND h.id <> $1
              AND (
                EXISTS (
                    SELECT 1 FROM hymn_authors mine
                    INNER JOIN hymn_authors theirs ON theirs.author_id = mine.author_id
                    WHERE mine.hymn_id = $1 AND theirs.hymn_id = h.id
                )
                OR EXISTS (
                    SELECT 1 FROM hymn_categories mine
                    INNER JOIN hymn_categories theirs ON theirs.category_id = mine.category_id
                    WHERE mine.hymn_id = $1 AND theirs.hymn_id = h.id
                )
              )
            ORDER BY h.view_count DESC, LOWER(h.title), h.id
            LIMIT $2
            "#
        ))
        .bind(hymn_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.summarize(rows).await
    }

    async fn most_viewed_hymns(
        &self,
        exclude: &[Uuid],
        limit: usize,
    ) -> Result<Vec<HymnSummary>, RepoError> {
        let rows = sqlx::query_as::<_, HymnSummaryRow>(&format!(
            r#"
            SELECT {HYMN_SUMMARY_COLUMNS}
            FROM hymns h
            WHERE h.status = 'approved'
              AND NOT (h.id = ANY($1))
            ORDER BY h.view_count DESC, LOWER(h.title), h.id
            LIMIT $2
            "#
        ))
        .bind(exclude)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.summarize(rows).await
    }

    async fn increment_view(&self, hymn_id: Uuid, at: OffsetDateTime) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE hymns SET view_count = view_count + 1, last_viewed_at = $2 WHERE id = $1",
        )
        .bind(hymn_id)
        .bind(at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl HymnsWriteRepo for PostgresRepositories {
    async fn create_hymn(&self, params: CreateHymnParams) -> Result<HymnRecord, RepoError> {
        let CreateHymnParams {
            draft,
            status,
            created_by,
        } = params;

        let row = sqlx::query_as::<_, HymnRow>(&format!(
            r#"
            INSERT INTO hymns (id, number, title, lyrics, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {HYMN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(draft.number)
        .bind(draft.title)
        .bind(draft.lyrics)
        .bind(status)
        .bind(created_by)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(HymnRecord::from(row))
    }

    async fn update_hymn(&self, params: UpdateHymnParams) -> Result<HymnRecord, RepoError> {
        let UpdateHymnParams { id, draft } = params;

        let row = sqlx::query_as::<_, HymnRow>(&format!(
            r#"
            UPDATE hymns
            SET number = $2, title = $3, lyrics = $4, updated_at = now()
            WHERE id = $1
            RETURNING {HYMN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(draft.number)
        .bind(draft.title)
        .bind(draft.lyrics)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(HymnRecord::from(row))
    }

    async fn set_hymn_status(
        &self,
        id: Uuid,
        status: HymnStatus,
    ) -> Result<HymnRecord, RepoError> {
        let row = sqlx::query_as::<_, HymnRow>(&format!(
            r#"
            UPDATE hymns
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {HYMN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(HymnRecord::from(row))
    }

    async fn delete_hymn(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM hymns WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn replace_hymn_links(
        &self,
        hymn_id: Uuid,
        author_ids: &[Uuid],
        category_ids: &[Uuid],
    ) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM hymn_authors WHERE hymn_id = $1")
            .bind(hymn_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM hymn_categories WHERE hymn_id = $1")
            .bind(hymn_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if !author_ids.is_empty() {
            sqlx::query(
                "INSERT INTO hymn_authors (hymn_id, author_id) SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
            )
            .bind(hymn_id)
            .bind(author_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        if !category_ids.is_empty() {
            sqlx::query(
                "INSERT INTO hymn_categories (hymn_id, category_id) SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
            )
            .bind(hymn_id)
            .bind(category_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        sqlx::query("UPDATE hymns SET updated_at = now() WHERE id = $1")
            .bind(hymn_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn attach_media(
        &self,
        hymn_id: Uuid,
        media: NewMedia,
    ) -> Result<MediaRecord, RepoError> {
        let id = Uuid::new_v4();
        let record = match media {
            NewMedia::Pdf { url, description } => {
                let row = sqlx::query_as::<_, PdfRow>(
                    r#"
                    INSERT INTO hymn_pdfs (id, hymn_id, pdf_url, description)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, hymn_id, pdf_url, description, created_at
                    "#,
                )
                .bind(id)
                .bind(hymn_id)
                .bind(url)
                .bind(description)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;
                MediaRecord::Pdf(row.into())
            }
            NewMedia::Audio { url, title, pdf_id } => {
                let row = sqlx::query_as::<_, AudioRow>(
                    r#"
                    INSERT INTO hymn_audio (id, hymn_id, pdf_id, audio_url, title)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, hymn_id, pdf_id, audio_url, title, created_at
                    "#,
                )
                .bind(id)
                .bind(hymn_id)
                .bind(pdf_id)
                .bind(url)
                .bind(title)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;
                MediaRecord::Audio(row.into())
            }
            NewMedia::Video {
                url,
                source,
                pdf_id,
            } => {
                let row = sqlx::query_as::<_, VideoRow>(
                    r#"
                    INSERT INTO hymn_videos (id, hymn_id, pdf_id, video_url, source)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, hymn_id, pdf_id, video_url, source, created_at
                    "#,
                )
                .bind(id)
                .bind(hymn_id)
                .bind(pdf_id)
                .bind(url)
                .bind(source)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;
                MediaRecord::Video(row.into())
            }
        };
        Ok(record)
    }

    async fn detach_media(&self, hymn_id: Uuid, media_id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let mut removed = 0;
        for table in ["hymn_audio", "hymn_videos", "hymn_pdfs"] {
            let result = sqlx::query(&format!(
                "DELETE FROM {table} WHERE id = $1 AND hymn_id = $2"
            ))
            .bind(media_id)
            .bind(hymn_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            removed += result.rows_affected();
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(removed > 0)
    }
}

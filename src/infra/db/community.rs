use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{PageRequest, Paginated},
    application::repos::{
        CreateReportParams, FavoritesRepo, NewNotification, NotificationFilter, NotificationsRepo,
        RepoError, ReportQueryFilter, ReportsRepo,
    },
    domain::entities::{FavoriteRecord, NotificationRecord, ReportRecord},
    domain::types::{NotificationKind, ReportStatus, ReportTarget},
};

use super::{HYMN_SUMMARY_COLUMNS, HymnSummaryRow, PostgresRepositories, map_sqlx_error};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, actor_id, kind, title, message, link, is_read, created_at";
const REPORT_COLUMNS: &str = "id, reporter_id, target_kind, target_id, reason, status, resolution_note, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct FavoriteRow {
    #[sqlx(flatten)]
    hymn: HymnSummaryRow,
    favorited_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    actor_id: Option<Uuid>,
    kind: NotificationKind,
    title: String,
    message: String,
    link: Option<String>,
    is_read: bool,
    created_at: OffsetDateTime,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            actor_id: row.actor_id,
            kind: row.kind,
            title: row.title,
            message: row.message,
            link: row.link,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    reporter_id: Uuid,
    target_kind: ReportTarget,
    target_id: Uuid,
    reason: String,
    status: ReportStatus,
    resolution_note: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ReportRow> for ReportRecord {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.id,
            reporter_id: row.reporter_id,
            target_kind: row.target_kind,
            target_id: row.target_id,
            reason: row.reason,
            status: row.status,
            resolution_note: row.resolution_note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    fn apply_notification_filter<'q>(
        qb: &mut QueryBuilder<'q, Postgres>,
        user_id: Uuid,
        filter: &'q NotificationFilter,
    ) {
        qb.push(" AND user_id = ");
        qb.push_bind(user_id);
        if filter.unread_only {
            qb.push(" AND is_read = FALSE");
        }
        if !filter.kinds.is_empty() {
            // Bound as text so the enum array needs no custom type mapping.
            let kinds: Vec<&'static str> = filter.kinds.iter().map(|kind| kind.as_str()).collect();
            qb.push(" AND kind::text = ANY(");
            qb.push_bind(kinds);
            qb.push(")");
        }
    }

    fn apply_report_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q ReportQueryFilter) {
        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        if let Some(target_kind) = filter.target_kind {
            qb.push(" AND target_kind = ");
            qb.push_bind(target_kind);
        }
    }
}

#[async_trait]
impl FavoritesRepo for PostgresRepositories {
    async fn toggle_favorite(&self, user_id: Uuid, hymn_id: Uuid) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND hymn_id = $2")
            .bind(user_id)
            .bind(hymn_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO favorites (user_id, hymn_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(hymn_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(removed == 0)
    }

    async fn is_favorite(&self, user_id: Uuid, hymn_id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND hymn_id = $2)",
        )
        .bind(user_id)
        .bind(hymn_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_favorites(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Paginated<FavoriteRecord>, RepoError> {
        let (limit, offset) = Self::page_bounds(page);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, FavoriteRow>(&format!(
            r#"
            SELECT {HYMN_SUMMARY_COLUMNS}, f.created_at AS favorited_at
            FROM favorites f
            INNER JOIN hymns h ON h.id = f.hymn_id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC, h.id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let (hymns, favorited_at): (Vec<HymnSummaryRow>, Vec<OffsetDateTime>) = rows
            .into_iter()
            .map(|row| (row.hymn, row.favorited_at))
            .unzip();
        let items = self
            .summarize(hymns)
            .await?
            .into_iter()
            .zip(favorited_at)
            .map(|(hymn, favorited_at)| FavoriteRecord { hymn, favorited_at })
            .collect();

        Self::paginated(items, total, page)
    }
}

#[async_trait]
impl NotificationsRepo for PostgresRepositories {
    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> Result<Paginated<NotificationRecord>, RepoError> {
        let (limit, offset) = Self::page_bounds(page);

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM notifications WHERE 1=1 ");
        Self::apply_notification_filter(&mut count_qb, user_id, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE 1=1 "
        ));
        Self::apply_notification_filter(&mut qb, user_id, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<NotificationRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::paginated(
            rows.into_iter().map(NotificationRecord::from).collect(),
            total,
            page,
        )
    }

    async fn notification_counts(&self, user_id: Uuid) -> Result<(u64, u64), RepoError> {
        let (total, unread): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE NOT is_read)
            FROM notifications
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok((Self::convert_count(total)?, Self::convert_count(unread)?))
    }

    async fn mark_read(&self, user_id: Uuid, ids: Option<&[Uuid]>) -> Result<u64, RepoError> {
        let result = match ids {
            Some(ids) => {
                sqlx::query(
                    "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read AND id = ANY($2)",
                )
                .bind(user_id)
                .bind(ids)
                .execute(self.pool())
                .await
            }
            None => {
                sqlx::query(
                    "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read",
                )
                .bind(user_id)
                .execute(self.pool())
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn create_notifications(&self, batch: Vec<NewNotification>) -> Result<u64, RepoError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO notifications (id, user_id, actor_id, kind, title, message, link) ",
        );
        qb.push_values(batch, |mut row, item| {
            row.push_bind(Uuid::new_v4())
                .push_bind(item.user_id)
                .push_bind(item.actor_id)
                .push_bind(item.kind)
                .push_bind(item.draft.title)
                .push_bind(item.draft.message)
                .push_bind(item.draft.link);
        });

        let result = qb
            .build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ReportsRepo for PostgresRepositories {
    async fn create_report(&self, params: CreateReportParams) -> Result<ReportRecord, RepoError> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            INSERT INTO reports (id, reporter_id, target_kind, target_id, reason)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.reporter_id)
        .bind(params.target_kind)
        .bind(params.target_id)
        .bind(params.reason)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ReportRecord::from(row))
    }

    async fn list_reports(
        &self,
        filter: &ReportQueryFilter,
        page: PageRequest,
    ) -> Result<Paginated<ReportRecord>, RepoError> {
        let (limit, offset) = Self::page_bounds(page);

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM reports WHERE 1=1 ");
        Self::apply_report_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(format!("SELECT {REPORT_COLUMNS} FROM reports WHERE 1=1 "));
        Self::apply_report_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<ReportRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::paginated(rows.into_iter().map(ReportRecord::from).collect(), total, page)
    }

    async fn find_report(&self, id: Uuid) -> Result<Option<ReportRecord>, RepoError> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ReportRecord::from))
    }

    async fn update_report_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        note: Option<String>,
    ) -> Result<ReportRecord, RepoError> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            UPDATE reports
            SET status = $2, resolution_note = COALESCE($3, resolution_note), updated_at = now()
            WHERE id = $1
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(note)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ReportRecord::from(row))
    }
}

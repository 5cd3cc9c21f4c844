use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{PageRequest, Paginated},
    application::repos::{
        CreateSessionParams, CreateUserParams, DashboardRepo, RepoError, SessionsRepo,
        UserQueryFilter, UsersRepo,
    },
    domain::entities::{DashboardStats, ProfileStats, SessionRecord, UserRecord, UserRef},
    domain::types::{ThemePreference, UserRole},
    domain::users::ProfileDraft,
};

use super::{PostgresRepositories, contains_pattern, map_sqlx_error};

const USER_COLUMNS: &str =
    "id, email, display_name, avatar_url, bio, role, theme, reputation, created_at";
const SESSION_COLUMNS: &str = "id, user_id, prefix, hashed_secret, created_at, expires_at, revoked_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    display_name: String,
    avatar_url: Option<String>,
    bio: Option<String>,
    role: UserRole,
    theme: ThemePreference,
    reputation: i32,
    created_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            bio: row.bio,
            role: row.role,
            theme: row.theme,
            reputation: row.reputation,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    prefix: String,
    hashed_secret: Vec<u8>,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
    revoked_at: Option<OffsetDateTime>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProfileStatsRow {
    favorites: i64,
    posts: i64,
    comments: i64,
}

#[derive(sqlx::FromRow)]
struct DashboardRow {
    hymns_pending: i64,
    hymns_approved: i64,
    hymns_rejected: i64,
    authors: i64,
    categories: i64,
    users: i64,
    forum_posts: i64,
    open_reports: i64,
}

impl PostgresRepositories {
    fn apply_user_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q UserQueryFilter) {
        if let Some(role) = filter.role {
            qb.push(" AND role = ");
            qb.push_bind(role);
        }
        if let Some(search) = filter.search.as_ref() {
            let pattern = contains_pattern(search);
            qb.push(" AND (email ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(r" ESCAPE '\' OR display_name ILIKE ");
            qb.push_bind(pattern);
            qb.push(r" ESCAPE '\'");
            qb.push(")");
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email.trim())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, display_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.email.trim().to_lowercase())
        .bind(params.display_name)
        .bind(params.role)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UserRecord::from(row))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        draft: ProfileDraft,
    ) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET display_name = $2, bio = $3, avatar_url = $4
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(draft.display_name)
        .bind(draft.bio)
        .bind(draft.avatar_url)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UserRecord::from(row))
    }

    async fn update_theme(
        &self,
        id: Uuid,
        theme: ThemePreference,
    ) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET theme = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(theme)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UserRecord::from(row))
    }

    async fn adjust_reputation(&self, id: Uuid, delta: i32) -> Result<(), RepoError> {
        sqlx::query("UPDATE users SET reputation = GREATEST(reputation + $2, 0) WHERE id = $1")
            .bind(id)
            .bind(delta)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn profile_stats(&self, id: Uuid) -> Result<ProfileStats, RepoError> {
        let row = sqlx::query_as::<_, ProfileStatsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM favorites WHERE user_id = $1) AS favorites,
                (SELECT COUNT(*) FROM forum_posts WHERE user_id = $1) AS posts,
                (SELECT COUNT(*) FROM forum_comments WHERE user_id = $1) AS comments
            "#,
        )
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ProfileStats {
            favorites: Self::convert_count(row.favorites)?,
            posts: Self::convert_count(row.posts)?,
            comments: Self::convert_count(row.comments)?,
        })
    }

    async fn list_users(
        &self,
        filter: &UserQueryFilter,
        page: PageRequest,
    ) -> Result<Paginated<UserRecord>, RepoError> {
        let (limit, offset) = Self::page_bounds(page);

        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1=1 ");
        Self::apply_user_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1 "));
        Self::apply_user_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::paginated(rows.into_iter().map(UserRecord::from).collect(), total, page)
    }

    async fn export_users(&self, filter: &UserQueryFilter) -> Result<Vec<UserRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1 "));
        Self::apply_user_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at, id");

        let rows = qb
            .build_query_as::<UserRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(UserRecord::from(row))
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn user_ids(&self, role: Option<UserRole>) -> Result<Vec<Uuid>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM users WHERE 1=1 ");
        if let Some(role) = role {
            qb.push(" AND role = ");
            qb.push_bind(role);
        }
        qb.push(" ORDER BY id");

        qb.build_query_scalar::<Uuid>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_users_by_handles(&self, handles: &[String]) -> Result<Vec<UserRef>, RepoError> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(Uuid, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, display_name, avatar_url
            FROM users
            WHERE lower(regexp_replace(display_name, '\s', '', 'g')) = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(handles)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, display_name, avatar_url)| UserRef {
                id,
                display_name,
                avatar_url,
            })
            .collect())
    }
}

#[async_trait]
impl SessionsRepo for PostgresRepositories {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            INSERT INTO sessions (id, user_id, prefix, hashed_secret, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.prefix)
        .bind(params.hashed_secret)
        .bind(params.expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SessionRecord::from(row))
    }

    async fn find_session_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<SessionRecord>, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE prefix = $1"
        ))
        .bind(prefix)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SessionRecord::from))
    }

    async fn revoke_session(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError> {
        sqlx::query("UPDATE sessions SET revoked_at = COALESCE(revoked_at, $2) WHERE id = $1")
            .bind(id)
            .bind(revoked_at)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl DashboardRepo for PostgresRepositories {
    async fn dashboard_stats(&self) -> Result<DashboardStats, RepoError> {
        let row = sqlx::query_as::<_, DashboardRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM hymns WHERE status = 'pending') AS hymns_pending,
                (SELECT COUNT(*) FROM hymns WHERE status = 'approved') AS hymns_approved,
                (SELECT COUNT(*) FROM hymns WHERE status = 'rejected') AS hymns_rejected,
                (SELECT COUNT(*) FROM authors) AS authors,
                (SELECT COUNT(*) FROM categories) AS categories,
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM forum_posts) AS forum_posts,
                (SELECT COUNT(*) FROM reports WHERE status IN ('pending', 'reviewing')) AS open_reports
            "#,
        )
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(DashboardStats {
            hymns_pending: Self::convert_count(row.hymns_pending)?,
            hymns_approved: Self::convert_count(row.hymns_approved)?,
            hymns_rejected: Self::convert_count(row.hymns_rejected)?,
            authors: Self::convert_count(row.authors)?,
            categories: Self::convert_count(row.categories)?,
            users: Self::convert_count(row.users)?,
            forum_posts: Self::convert_count(row.forum_posts)?,
            open_reports: Self::convert_count(row.open_reports)?,
        })
    }
}

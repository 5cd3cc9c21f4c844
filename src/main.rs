use std::{process, sync::Arc};

use hymnary::{
    application::{
        admin::{AdminCatalogService, AdminDashboardService, AdminHymnService, AdminUserService},
        catalog::CatalogService,
        error::AppError,
        favorites::FavoritesService,
        forum::ForumService,
        hymns::HymnService,
        notifications::NotificationService,
        profile::ProfileService,
        reports::ReportService,
        repos::{
            CatalogRepo, CatalogWriteRepo, DashboardRepo, FavoritesRepo, ForumRepo,
            ForumWriteRepo, HealthRepo, HymnsRepo, HymnsWriteRepo, NotificationsRepo, ReportsRepo,
            SessionsRepo, UsersRepo,
        },
        session::SessionService,
    },
    cache::{CacheConfig, QueryCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, ApiState},
        telemetry,
    },
    presentation::SiteIdentity,
};
use tokio::try_join;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::IssueSession(args) => run_issue_session(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, true).await?;
    let cache = QueryCache::new(CacheConfig::from(&settings.cache));
    let app = build_application_context(repositories, &cache, &settings);

    let cache_handle = cache.spawn_auto_consume();
    let result = serve_http(&settings, app.api_state, app.admin_state).await;

    if let Some(handle) = cache_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings, true).await?;
    info!(target: "hymnary::migrate", "Migrations applied");
    Ok(())
}

async fn run_issue_session(
    settings: config::Settings,
    args: config::IssueSessionArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, false).await?;
    let users: Arc<dyn UsersRepo> = repositories.clone();
    let sessions = SessionService::new(repositories.clone(), users.clone());

    let user = match (args.user_id, args.email.as_deref()) {
        (Some(id), _) => users.find_user(id).await,
        (None, Some(email)) => users.find_user_by_email(email).await,
        (None, None) => return Err(AppError::validation("either --email or --user-id is required")),
    }
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?
    .ok_or_else(|| AppError::validation("no user matches the given identity"))?;

    let ttl = match args.ttl_hours {
        Some(hours) => time::Duration::hours(i64::from(hours)),
        None => settings.session.ttl,
    };

    let issued = sessions
        .issue(user.id, ttl)
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    info!(
        target: "hymnary::session",
        user_id = %user.id,
        session_id = %issued.record.id,
        expires_at = %issued.record.expires_at,
        "Issued session"
    );
    println!("{}", issued.token);
    Ok(())
}

struct ApplicationContext {
    api_state: ApiState,
    admin_state: AdminState,
}

async fn init_repositories(
    settings: &config::Settings,
    migrate: bool,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .require_database_url()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let pool = PostgresRepositories::connect(
        database_url,
        settings.database.max_connections.get(),
        settings.database.acquire_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    if migrate {
        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;
    }

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    cache: &QueryCache,
    settings: &config::Settings,
) -> ApplicationContext {
    let hymns_repo: Arc<dyn HymnsRepo> = repositories.clone();
    let hymns_write_repo: Arc<dyn HymnsWriteRepo> = repositories.clone();
    let catalog_repo: Arc<dyn CatalogRepo> = repositories.clone();
    let catalog_write_repo: Arc<dyn CatalogWriteRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let favorites_repo: Arc<dyn FavoritesRepo> = repositories.clone();
    let forum_repo: Arc<dyn ForumRepo> = repositories.clone();
    let forum_write_repo: Arc<dyn ForumWriteRepo> = repositories.clone();
    let notifications_repo: Arc<dyn NotificationsRepo> = repositories.clone();
    let reports_repo: Arc<dyn ReportsRepo> = repositories.clone();
    let dashboard_repo: Arc<dyn DashboardRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let queries = cache.client.clone();
    let trigger = Some(cache.trigger.clone());

    let sessions = Arc::new(SessionService::new(sessions_repo, users_repo.clone()));
    let hymn_service = HymnService::new(
        hymns_repo.clone(),
        catalog_repo.clone(),
        forum_repo.clone(),
        favorites_repo.clone(),
        queries.clone(),
    )
    .with_cache_trigger_opt(trigger.clone());
    let notifications = NotificationService::new(
        notifications_repo,
        users_repo.clone(),
        queries.clone(),
    )
    .with_cache_trigger_opt(trigger.clone());
    let forum = ForumService::new(
        forum_repo,
        forum_write_repo,
        hymns_repo.clone(),
        users_repo.clone(),
        notifications.clone(),
        queries.clone(),
    )
    .with_cache_trigger_opt(trigger.clone());
    let profile = ProfileService::new(users_repo.clone(), forum.clone(), queries.clone())
        .with_cache_trigger_opt(trigger.clone());
    let favorites = FavoritesService::new(favorites_repo, hymns_repo.clone(), queries.clone())
        .with_cache_trigger_opt(trigger.clone());
    let reports = Arc::new(
        ReportService::new(reports_repo, queries.clone()).with_cache_trigger_opt(trigger.clone()),
    );
    let catalog = CatalogService::new(catalog_repo.clone(), queries.clone());

    let admin_hymns = AdminHymnService::new(
        hymns_repo,
        hymns_write_repo,
        catalog_repo.clone(),
        hymn_service.clone(),
    )
    .with_cache_trigger_opt(trigger.clone());
    let admin_catalog = AdminCatalogService::new(catalog_repo, catalog_write_repo)
        .with_cache_trigger_opt(trigger.clone());
    let admin_users =
        AdminUserService::new(users_repo, queries.clone()).with_cache_trigger_opt(trigger);
    let dashboard = AdminDashboardService::new(dashboard_repo, queries);

    let notifications = Arc::new(notifications);
    let forum = Arc::new(forum);

    let api_state = ApiState {
        site: SiteIdentity::new(settings.site.name.as_str(), settings.site.description.as_str()),
        sessions: sessions.clone(),
        hymns: Arc::new(hymn_service),
        catalog: Arc::new(catalog),
        favorites: Arc::new(favorites),
        forum: forum.clone(),
        notifications: notifications.clone(),
        profile: Arc::new(profile),
        reports: reports.clone(),
        health: health_repo.clone(),
    };

    let admin_state = AdminState {
        sessions,
        dashboard: Arc::new(dashboard),
        hymns: Arc::new(admin_hymns),
        catalog: Arc::new(admin_catalog),
        users: Arc::new(admin_users),
        notifications,
        reports,
        forum,
        health: health_repo,
    };

    ApplicationContext {
        api_state,
        admin_state,
    }
}

async fn serve_http(
    settings: &config::Settings,
    api_state: ApiState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_api_router(api_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target: "hymnary::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "Listening"
    );

    let grace = settings.server.graceful_shutdown;
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    let servers = async { try_join!(public_server, admin_server) };
    tokio::select! {
        result = servers => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(target: "hymnary::serve", "Graceful shutdown timed out; dropping open connections");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target: "hymnary::serve", error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

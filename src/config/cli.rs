use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use uuid::Uuid;

/// Command-line arguments for the Hymnary binary.
#[derive(Debug, Parser)]
#[command(name = "hymnary", version, about = "Catholic hymns library server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config", env = "HYMNARY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and administrative HTTP listeners.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    Migrate(MigrateArgs),
    /// Issue a session token for an existing user and print it.
    #[command(name = "issue-session")]
    IssueSession(IssueSessionArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Enable or disable the query cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the number of cached query results.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<u32>,

    /// Override the site name used in page titles.
    #[arg(long = "site-name", value_name = "NAME")]
    pub site_name: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Clone)]
#[command(group = clap::ArgGroup::new("subject").required(true).args(["email", "user_id"]))]
pub struct IssueSessionArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Email address of the user to sign in.
    #[arg(long, value_name = "EMAIL")]
    pub email: Option<String>,

    /// Identifier of the user to sign in.
    #[arg(long = "user-id", value_name = "UUID")]
    pub user_id: Option<Uuid>,

    /// Session lifetime; defaults to `session.ttl_hours`.
    #[arg(long = "ttl-hours", value_name = "HOURS")]
    pub ttl_hours: Option<u32>,
}

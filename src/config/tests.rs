use std::collections::HashMap;

use config::FileFormat;

use super::*;

fn env(pairs: &[(&str, &str)]) -> Environment {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    environment().source(Some(map))
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), DEFAULT_PUBLIC_PORT);
    assert_eq!(settings.server.admin_addr.port(), DEFAULT_ADMIN_PORT);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.database.url.is_none());
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.capacity.get(), DEFAULT_CACHE_CAPACITY);
    assert_eq!(settings.site.name, "Hymnary");
    assert_eq!(settings.session.ttl, time::Duration::days(30));
}

#[test]
fn environment_overrides_file() {
    let builder = Config::builder()
        .add_source(File::from_str(
            r#"
            [cache]
            capacity = 200
            stale_after_seconds = 10

            [site]
            name = "Parish Hymns"
            "#,
            FileFormat::Toml,
        ))
        .add_source(env(&[
            ("HYMNARY__CACHE__CAPACITY", "500"),
            ("HYMNARY__DATABASE__URL", "postgres://localhost/hymnary"),
        ]));

    let settings = resolve(builder, None).expect("valid settings");

    assert_eq!(settings.cache.capacity.get(), 500);
    assert_eq!(settings.cache.stale_after_seconds, 10);
    assert_eq!(settings.site.name, "Parish Hymns");
    assert_eq!(
        settings.database.url.as_deref(),
        Some("postgres://localhost/hymnary")
    );
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let builder = Config::builder().add_source(env(&[
        ("HYMNARY__SERVER__PUBLIC_PORT", "4000"),
        ("HYMNARY__LOGGING__LEVEL", "info"),
    ]));
    let command = Command::Serve(Box::new(ServeArgs {
        overrides: ServeOverrides {
            public_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        },
    }));

    let settings = resolve(builder, Some(&command)).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_cache_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.capacity = Some(0);

    match Settings::from_raw(raw) {
        Err(LoadError::Invalid { key, .. }) => assert_eq!(key, "cache.capacity"),
        other => panic!("expected invalid cache capacity, got {other:?}"),
    }
}

#[test]
fn shared_listener_address_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(3000);
    raw.server.admin_port = Some(3000);

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "server.admin_port",
            ..
        })
    ));
}

#[test]
fn non_postgres_database_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("mysql://localhost/hymns".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "database.url",
            ..
        })
    ));
}

#[test]
fn bad_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "logging.level",
            ..
        })
    ));
}

#[test]
fn session_ttl_must_be_bounded() {
    let mut raw = RawSettings::default();
    raw.session.ttl_hours = Some(0);
    assert!(Settings::from_raw(raw.clone()).is_err());

    raw.session.ttl_hours = Some(12);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.session.ttl, time::Duration::hours(12));
}

#[test]
fn missing_database_url_is_reported() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert!(settings.require_database_url().is_err());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["hymnary"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "hymnary",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-enabled",
        "false",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.cache_enabled, Some(false));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_issue_session_arguments() {
    let args = CliArgs::parse_from([
        "hymnary",
        "issue-session",
        "--email",
        "admin@parish.org",
        "--ttl-hours",
        "2",
    ]);

    match args.command.expect("issue-session command") {
        Command::IssueSession(issue) => {
            assert_eq!(issue.email.as_deref(), Some("admin@parish.org"));
            assert_eq!(issue.ttl_hours, Some(2));
            assert!(issue.user_id.is_none());
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn issue_session_requires_a_subject() {
    let result = CliArgs::try_parse_from(["hymnary", "issue-session"]);
    assert!(result.is_err());
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from(["hymnary", "migrate", "--database-url", "postgres://m"]);
    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(migrate.database.database_url.as_deref(), Some("postgres://m"));
        }
        _ => panic!("wrong command parsed"),
    }
}

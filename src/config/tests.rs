use std::io::Write;

use clap::Parser;

use super::*;

fn cli(args: &[&str]) -> CliArgs {
    let mut argv = vec!["dayboard"];
    argv.extend_from_slice(args);
    CliArgs::parse_from(argv)
}

fn env(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    )
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.api.base_url.as_str(), DEFAULT_API_BASE_URL);
    assert_eq!(settings.api.token, None);
    assert_eq!(
        settings.api.timeout,
        Duration::from_millis(DEFAULT_API_TIMEOUT_MS)
    );
    assert_eq!(settings.logging.level, LevelFilter::WARN);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(
        settings.cache.freshness,
        Duration::from_millis(DEFAULT_FRESHNESS_MS)
    );
    assert_eq!(settings.cache.utc_offset, UtcOffset::UTC);
}

#[test]
fn default_cache_settings_match_cache_config_defaults() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(
        crate::cache::CacheConfig::from(&settings.cache),
        crate::cache::CacheConfig::default()
    );
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.api.timeout_ms = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = Overrides {
        api_timeout_ms: Some(2500),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.api.timeout, Duration::from_millis(2500));
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = Overrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn blank_token_is_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.api.token = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.api.token, None);

    let mut raw = RawSettings::default();
    raw.api.token = Some(" secret ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.api.token.as_deref(), Some("secret"));
}

#[test]
fn rejects_non_http_base_url() {
    let mut raw = RawSettings::default();
    raw.api.base_url = Some("ftp://example.com/api".to_string());

    let err = Settings::from_raw(raw).expect_err("ftp is rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "api.base_url",
            ..
        }
    ));
}

#[test]
fn rejects_freshness_longer_than_retention() {
    let mut raw = RawSettings::default();
    raw.cache.freshness_ms = Some(10_000);
    raw.cache.retention_ms = Some(5_000);

    let err = Settings::from_raw(raw).expect_err("freshness beyond retention");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.freshness_ms",
            ..
        }
    ));
}

#[test]
fn rejects_zero_durations() {
    let mut raw = RawSettings::default();
    raw.api.timeout_ms = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.cache.gc_interval_ms = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn utc_offset_must_be_a_real_zone() {
    let mut raw = RawSettings::default();
    raw.cache.utc_offset_hours = Some(-5);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.utc_offset.whole_hours(), -5);

    let mut raw = RawSettings::default();
    raw.cache.utc_offset_hours = Some(15);
    let err = Settings::from_raw(raw).expect_err("out of range");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.utc_offset_hours",
            ..
        }
    ));
}

#[test]
fn retry_attempts_are_capped() {
    let mut raw = RawSettings::default();
    raw.cache.query_retry_attempts = Some(MAX_QUERY_RETRY_ATTEMPTS + 1);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn file_then_env_then_cli() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        "[api]\nbase_url = \"https://file.example/api\"\ntimeout_ms = 1000\n\n[cache]\nfreshness_ms = 1000\nretention_ms = 2000"
    )
    .expect("write config");

    let path = file.path().to_str().expect("utf-8 path").to_string();
    let args = cli(&["--config-file", &path, "--cache-retention-ms", "9000", "tags", "list"]);
    let settings = load_with_env(
        &args,
        env(&[
            ("DAYBOARD__API__TIMEOUT_MS", "3000"),
            ("DAYBOARD__CACHE__RETENTION_MS", "4000"),
        ]),
    )
    .expect("layered settings");

    assert_eq!(settings.api.base_url.as_str(), "https://file.example/api");
    assert_eq!(settings.api.timeout, Duration::from_millis(3000));
    assert_eq!(settings.cache.freshness, Duration::from_millis(1000));
    assert_eq!(settings.cache.retention, Duration::from_millis(9000));
}

#[test]
fn missing_config_file_is_an_error() {
    let args = cli(&["--config-file", "/nonexistent/dayboard.toml", "tags", "list"]);
    let err = load_with_env(&args, env(&[])).expect_err("file is required");
    assert!(matches!(err, LoadError::Build(_)));
}

#[test]
fn parses_nested_subcommands() {
    let args = cli(&[
        "habits", "mark", "7", "--mark", "skip", "--date", "2024-05-01",
    ]);
    match args.command {
        Command::Habits(HabitsCommand::Mark { id, mark, date }) => {
            assert_eq!(id, 7);
            assert_eq!(mark, MarkArg::Skip);
            assert_eq!(date, Some(time::macros::date!(2024 - 05 - 01)));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn global_overrides_follow_subcommands() {
    let args = cli(&[
        "reminders",
        "list",
        "--quick",
        "today",
        "--pages",
        "2",
        "--log-json",
        "yes",
        "--utc-offset-hours",
        "-3",
    ]);
    assert_eq!(args.overrides.log_json, Some(true));
    assert_eq!(args.overrides.utc_offset_hours, Some(-3));
    match args.command {
        Command::Reminders(RemindersCommand::List { filter, page }) => {
            assert_eq!(filter.quick.as_deref(), Some("today"));
            assert_eq!(page.pages, 2);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn rejects_malformed_dates() {
    let result = CliArgs::try_parse_from(["dayboard", "habits", "day", "--date", "05/01/2024"]);
    assert!(result.is_err());
}

#[test]
fn rejects_zero_pages_for_every_list() {
    for command in [
        &["habits", "list"][..],
        &["reminders", "list", "--status", "active"][..],
        &["projects", "list"][..],
    ] {
        let mut argv = vec!["dayboard"];
        argv.extend_from_slice(command);
        argv.extend_from_slice(&["--pages", "0"]);
        assert!(CliArgs::try_parse_from(argv.clone()).is_err(), "accepted {argv:?}");
    }

    let args = cli(&["reminders", "list", "--pages", "2"]);
    match args.command {
        Command::Reminders(RemindersCommand::List { page, .. }) => assert_eq!(page.pages, 2),
        other => panic!("unexpected command: {other:?}"),
    }
}

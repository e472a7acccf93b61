//! TOML parsing and environment overrides.

use std::collections::HashMap;
use std::path::PathBuf;

use supportdesk::config::Config;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn empty_file_uses_defaults() {
    let config = Config::from_toml("").expect("empty TOML should parse");

    assert_eq!(config.server.bind, "0.0.0.0:8000");
    assert_eq!(config.paths.database, PathBuf::from("supportdesk.db"));
    assert_eq!(config.queue.max_concurrent_processing, 5);
    assert_eq!(config.queue.interval_ms, 30_000);
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert!(config.llm.api_key.is_none());
    assert!(config.smtp.is_none());
}

#[test]
fn file_values_override_defaults() {
    let config = Config::from_toml(
        r#"
        [server]
        bind = "127.0.0.1:9000"
        cors_origins = []

        [queue]
        interval_ms = 5000

        [smtp]
        host = "smtp.example.com"
        "#,
    )
    .expect("TOML should parse");

    assert_eq!(config.server.bind, "127.0.0.1:9000");
    assert!(config.server.cors_origins.is_empty());
    assert_eq!(config.queue.interval_ms, 5000);
    assert_eq!(config.queue.max_attempts, 3);
    let smtp = config.smtp.expect("smtp section should be present");
    assert_eq!(smtp.host, "smtp.example.com");
    assert_eq!(smtp.port, 587);
}

#[test]
fn malformed_toml_is_an_error() {
    assert!(Config::from_toml("[queue\ninterval_ms = 1").is_err());
    assert!(Config::from_toml("[queue]\ninterval_ms = \"soon\"").is_err());
}

#[test]
fn env_overrides_win() {
    let mut config = Config::from_toml("[queue]\ninterval_ms = 5000").expect("TOML should parse");
    config.apply_overrides(env_of(&[
        ("SUPPORTDESK_BIND", "127.0.0.1:1234"),
        ("SUPPORTDESK_DATABASE", "/tmp/sd.db"),
        ("SUPPORTDESK_QUEUE_INTERVAL_MS", "250"),
        ("OPENAI_API_KEY", "sk-test"),
        ("SUPPORTDESK_LLM_MODEL", "gpt-4o"),
    ]));

    assert_eq!(config.server.bind, "127.0.0.1:1234");
    assert_eq!(config.paths.database, PathBuf::from("/tmp/sd.db"));
    assert_eq!(config.queue.interval_ms, 250);
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.llm.model, "gpt-4o");
}

#[test]
fn invalid_numeric_override_is_ignored() {
    let mut config = Config::default();
    config.apply_overrides(env_of(&[
        ("SUPPORTDESK_QUEUE_CONCURRENCY", "lots"),
        ("SUPPORTDESK_QUEUE_INTERVAL_MS", "-5"),
    ]));

    assert_eq!(config.queue.max_concurrent_processing, 5);
    assert_eq!(config.queue.interval_ms, 30_000);
}

#[test]
fn zero_queue_limits_in_file_are_raised_to_one() {
    let config = Config::from_toml("[queue]\nmax_concurrent_processing = 0\nmax_attempts = 0")
        .expect("TOML should parse");

    assert_eq!(config.queue.max_concurrent_processing, 1);
    assert_eq!(config.queue.max_attempts, 1);
}

#[test]
fn zero_concurrency_override_is_raised_to_one() {
    let mut config = Config::from_toml("").expect("empty TOML should parse");
    config.apply_overrides(env_of(&[("SUPPORTDESK_QUEUE_CONCURRENCY", "0")]));

    assert_eq!(config.queue.max_concurrent_processing, 1);
    assert_eq!(config.queue.max_attempts, 3);
}

#[test]
fn smtp_host_creates_section() {
    let mut config = Config::default();
    config.apply_overrides(env_of(&[
        ("SMTP_HOST", "relay.example.com"),
        ("SMTP_PORT", "2525"),
        ("SMTP_USERNAME", "mailer"),
        ("SMTP_FROM", "help@example.com"),
    ]));

    let smtp = config.smtp.expect("SMTP_HOST should create the section");
    assert_eq!(smtp.host, "relay.example.com");
    assert_eq!(smtp.port, 2525);
    assert_eq!(smtp.username.as_deref(), Some("mailer"));
    assert_eq!(smtp.from_address, "help@example.com");
}

#[test]
fn smtp_settings_without_host_are_ignored() {
    let mut config = Config::default();
    config.apply_overrides(env_of(&[("SMTP_PORT", "2525")]));

    assert!(config.smtp.is_none());
}

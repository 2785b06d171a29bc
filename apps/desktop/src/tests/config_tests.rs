use super::*;

use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(&dir.path().join("missing.toml"), env_from(&[]));
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.request_timeout(), Duration::from_secs(15));
}

#[test]
fn file_overrides_defaults_and_env_overrides_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("messenger.toml");
    fs::write(
        &path,
        "database_url = \"./file.db\"\ndata_dir = \"/tmp/file-data\"\nrequest_timeout_ms = 500\n",
    )
    .expect("write config");

    let settings = load_settings_from(&path, env_from(&[]));
    assert_eq!(settings.database_url, "sqlite://./file.db");
    assert_eq!(settings.data_dir, PathBuf::from("/tmp/file-data"));
    assert_eq!(settings.request_timeout_ms, 500);

    let settings = load_settings_from(
        &path,
        env_from(&[
            ("MESSENGER_DATABASE_URL", "sqlite::memory:"),
            ("MESSENGER_REQUEST_TIMEOUT_MS", "750"),
            ("APP__REQUEST_TIMEOUT_MS", "900"),
        ]),
    );
    assert_eq!(settings.database_url, "sqlite::memory:");
    assert_eq!(settings.request_timeout_ms, 900);
    assert_eq!(settings.data_dir, PathBuf::from("/tmp/file-data"));
}

#[test]
fn malformed_file_and_bad_numbers_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("messenger.toml");
    fs::write(&path, "request_timeout_ms = \"soon\"").expect("write config");

    let settings = load_settings_from(&path, env_from(&[("APP__REQUEST_TIMEOUT_MS", "never")]));
    assert_eq!(settings.request_timeout_ms, Settings::default().request_timeout_ms);
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("sqlite:chat.db"), "sqlite://chat.db");
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}

use std::path::Path;

use nova_config::{
    discover_config_path, load_for_workspace, with_config_env_lock, ConfigError, NovaConfig,
    NOVA_CONFIG_ENV_VAR,
};
use nova_syntax::JavaLanguageLevel;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn canonical(path: &Path) -> std::path::PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[test]
fn discovers_nova_toml_in_workspace_root() {
    with_config_env_lock(|| {
        std::env::remove_var(NOVA_CONFIG_ENV_VAR);
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nova.toml");
        std::fs::write(&config_path, "[stream_migration]\nlanguage_level = 11\n").unwrap();

        assert_eq!(discover_config_path(dir.path()), Some(canonical(&config_path)));
        let (config, path) = load_for_workspace(dir.path()).expect("loads");
        assert_eq!(path, Some(canonical(&config_path)));
        assert_eq!(config.stream_migration.language_level, JavaLanguageLevel::JAVA_11);
    });
}

#[test]
fn hidden_config_is_a_fallback() {
    with_config_env_lock(|| {
        std::env::remove_var(NOVA_CONFIG_ENV_VAR);
        let dir = tempdir().unwrap();
        let hidden = dir.path().join(".nova.toml");
        std::fs::write(&hidden, "[logging]\njson = true\n").unwrap();
        assert_eq!(discover_config_path(dir.path()), Some(canonical(&hidden)));

        let visible = dir.path().join("nova.toml");
        std::fs::write(&visible, "").unwrap();
        assert_eq!(discover_config_path(dir.path()), Some(canonical(&visible)));
    });
}

#[test]
fn env_override_wins_over_workspace_file() {
    with_config_env_lock(|| {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("nova.toml"), "[logging]\nlevel = \"info\"\n").unwrap();
        let override_path = dir.path().join("override.toml");
        std::fs::write(&override_path, "[logging]\nlevel = \"debug\"\n").unwrap();

        std::env::set_var(NOVA_CONFIG_ENV_VAR, "override.toml");
        let loaded = load_for_workspace(dir.path());
        std::env::remove_var(NOVA_CONFIG_ENV_VAR);

        let (config, path) = loaded.expect("loads");
        assert_eq!(path, Some(canonical(&override_path)));
        assert_eq!(config.logging.level, "debug");
    });
}

#[test]
fn missing_config_gives_defaults() {
    with_config_env_lock(|| {
        std::env::remove_var(NOVA_CONFIG_ENV_VAR);
        let dir = tempdir().unwrap();
        let (config, path) = load_for_workspace(dir.path()).expect("loads");
        assert_eq!(path, None);
        assert_eq!(config, NovaConfig::default());
    });
}

#[test]
fn unreadable_path_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = NovaConfig::load_from_path(dir.path().join("absent.toml")).expect_err("missing file");
    assert!(matches!(err, ConfigError::Io { .. }), "{err:?}");
}

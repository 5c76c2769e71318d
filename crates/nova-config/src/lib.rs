use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once, OnceLock};

use nova_stream_migration::InspectionOptions;
use nova_syntax::JavaLanguageLevel;
use parking_lot::ReentrantMutex;
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;

/// Top-level Nova configuration loaded from TOML.
///
/// ```toml
/// [logging]
/// level = "debug"
/// json = true
///
/// [stream_migration]
/// language_level = 17
/// suggest_foreach = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NovaConfig {
    /// Global logging settings for Nova crates.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Loop-to-stream inspection settings.
    #[serde(default)]
    pub stream_migration: StreamMigrationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level for all Nova crates.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to the given file path as well.
    ///
    /// If the file cannot be opened, file logging is disabled while stderr
    /// logging remains active.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "warn".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            // Anything else is treated as an `EnvFilter` directive string.
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        })
    }

    /// Create the effective `EnvFilter` for Nova tracing.
    ///
    /// `level` may be either a simple level (`info`, `debug`, ...) or a full
    /// `EnvFilter` directive string. If `RUST_LOG` is set, it is merged into
    /// the resulting filter and wins on conflicts.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

/// The `[stream_migration]` table; see [`InspectionOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamMigrationConfig {
    /// Java release the rewritten code must compile against (`8`, `"1.8"`, `17`).
    #[serde(default)]
    pub language_level: JavaLanguageLevel,

    /// Offer `forEach` for loops that have no better terminal.
    #[serde(default)]
    pub suggest_foreach: bool,

    #[serde(default)]
    pub replace_trivial_foreach: bool,

    /// Report migrations that do not shorten the code.
    #[serde(default)]
    pub report_informational: bool,
}

impl Default for StreamMigrationConfig {
    fn default() -> Self {
        InspectionOptions::default().into()
    }
}

impl From<StreamMigrationConfig> for InspectionOptions {
    fn from(config: StreamMigrationConfig) -> Self {
        InspectionOptions {
            suggest_foreach: config.suggest_foreach,
            replace_trivial_foreach: config.replace_trivial_foreach,
            language_level: config.language_level,
            report_informational: config.report_informational,
        }
    }
}

impl From<InspectionOptions> for StreamMigrationConfig {
    fn from(options: InspectionOptions) -> Self {
        StreamMigrationConfig {
            language_level: options.language_level,
            suggest_foreach: options.suggest_foreach,
            replace_trivial_foreach: options.replace_trivial_foreach,
            report_informational: options.report_informational,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // `Display` would repeat a snippet of the input; the message and the
        // span are enough to find the offending key.
        let message = err.message().trim_end().to_owned();
        match err.span() {
            Some(span) => ConfigError::Toml(format!("{message} (at byte {})", span.start)),
            None => ConfigError::Toml(message),
        }
    }
}

impl NovaConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    /// Load a config from a TOML string.
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn inspection_options(&self) -> InspectionOptions {
        self.stream_migration.into()
    }
}

/// Environment variable overriding config discovery.
pub const NOVA_CONFIG_ENV_VAR: &str = "NOVA_CONFIG_PATH";

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

fn config_env_lock() -> &'static ReentrantMutex<()> {
    CONFIG_ENV_LOCK.get_or_init(|| ReentrantMutex::new(()))
}

/// Run `f` while holding Nova's config environment lock.
///
/// Tests that set [`NOVA_CONFIG_ENV_VAR`] wrap the mutation and the discovery
/// in this helper so concurrent discovery never observes the override.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = config_env_lock().lock();
    f()
}

/// Discover the Nova configuration file for a workspace root.
///
/// Search order:
/// 1) `NOVA_CONFIG_PATH` (absolute or relative to `workspace_root`)
/// 2) `nova.toml` in `workspace_root`
/// 3) `.nova.toml` in `workspace_root`
pub fn discover_config_path(workspace_root: &Path) -> Option<PathBuf> {
    let _guard = config_env_lock().lock();
    if let Some(value) = std::env::var_os(NOVA_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            workspace_root.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    ["nova.toml", ".nova.toml"]
        .into_iter()
        .map(|name| workspace_root.join(name))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the Nova configuration for a workspace root.
///
/// If no config is present, returns [`NovaConfig::default`] and `None`.
pub fn load_for_workspace(
    workspace_root: &Path,
) -> Result<(NovaConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(workspace_root) else {
        return Ok((NovaConfig::default(), None));
    };

    let config = NovaConfig::load_from_path(&path)?;
    Ok((config, Some(path)))
}

static TRACING_INIT: Once = Once::new();

/// Initializes structured `tracing` logging.
///
/// This function is safe to call multiple times; only the first call installs
/// a global subscriber.
pub fn init_tracing(logging: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = logging.env_filter();

        let file = logging.file.as_ref().and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        let file_open_failed = logging.file.is_some() && file.is_none();

        let make_writer = match (logging.stderr, file) {
            (true, Some(file)) => BoxMakeWriter::new(std::io::stderr.and(Mutex::new(file))),
            (true, None) => BoxMakeWriter::new(std::io::stderr),
            (false, Some(file)) => BoxMakeWriter::new(Mutex::new(file)),
            (false, None) => BoxMakeWriter::new(std::io::sink),
        };

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if logging.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(make_writer)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() && file_open_failed {
            if let Some(path) = logging.file.as_ref() {
                tracing::warn!(
                    target: "nova.config",
                    path = %path.display(),
                    "failed to open log file; logging to stderr only"
                );
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = NovaConfig::load_from_str("").expect("parses");
        assert_eq!(config, NovaConfig::default());
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.inspection_options(), InspectionOptions::default());
    }

    #[test]
    fn stream_migration_table_maps_to_inspection_options() {
        let config = NovaConfig::load_from_str(
            "[stream_migration]\nlanguage_level = \"1.8\"\nsuggest_foreach = true\nreport_informational = true\n",
        )
        .expect("parses");
        let options = config.inspection_options();
        assert_eq!(options.language_level, JavaLanguageLevel::JAVA_8);
        assert!(options.suggest_foreach);
        assert!(!options.replace_trivial_foreach);
        assert!(options.report_informational);

        let config = NovaConfig::load_from_str("[stream_migration]\nlanguage_level = 21\n").expect("parses");
        assert_eq!(config.inspection_options().language_level, JavaLanguageLevel::JAVA_21);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = NovaConfig::load_from_str("[stream_migration]\nsugest_foreach = true\n")
            .expect_err("typo is an error");
        let ConfigError::Toml(message) = err else {
            panic!("expected a toml error, got {err:?}");
        };
        assert!(message.contains("unknown field"), "{message}");
    }

    #[test]
    fn level_directives_are_normalized() {
        assert_eq!(LoggingConfig::normalize_level_directives(" WARNING "), "warn");
        assert_eq!(LoggingConfig::normalize_level_directives(""), "warn");
        assert_eq!(
            LoggingConfig::normalize_level_directives("nova.stream_migration=debug"),
            "nova.stream_migration=debug"
        );
    }
}

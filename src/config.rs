//! Configuration for syllabus storage.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SYLLABUS_HOME, SYLLABUS_DB)
//! 2. Config file (.syllabus/config.yaml)
//! 3. Defaults (~/.syllabus/content.db)
//!
//! Config file discovery:
//! - Searches current directory and parents for .syllabus/config.yaml
//! - Paths in config file are relative to the project root (the parent of
//!   the .syllabus/ directory)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::store::{Database, SqliteStore};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_DB_FILE: &str = "content.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to project root)
    pub home: Option<String>,
    /// Database file (relative to project root)
    pub database: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// How long a call waits on a locked database
    pub busy_timeout_ms: Option<u64>,
}

/// Environment overrides
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub home: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            home: std::env::var_os("SYLLABUS_HOME").map(PathBuf::from),
            database: std::env::var_os("SYLLABUS_DB").map(PathBuf::from),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// SQLite database file
    pub database: PathBuf,
    /// Busy timeout applied to the connection
    pub busy_timeout: Duration,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Lazily-connecting store over the configured database
    pub fn open_store(&self) -> SqliteStore {
        SqliteStore::new(Database::new(
            crate::store::DbLocation::File(self.database.clone()),
            self.busy_timeout,
        ))
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".syllabus").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to a base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge file settings, environment overrides and defaults
fn resolve(
    default_home: PathBuf,
    file: Option<(PathBuf, ConfigFile)>,
    env: EnvOverrides,
) -> ResolvedConfig {
    let (config_file, config) = match file {
        Some((path, config)) => (Some(path), Some(config)),
        None => (None, None),
    };

    // Project root is the parent of .syllabus/
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let home = env
        .home
        .or_else(|| {
            config
                .as_ref()
                .and_then(|c| c.paths.home.as_deref())
                .map(|h| resolve_path(base_dir, h))
        })
        .unwrap_or(default_home);

    let database = env
        .database
        .or_else(|| {
            config
                .as_ref()
                .and_then(|c| c.paths.database.as_deref())
                .map(|d| resolve_path(base_dir, d))
        })
        .unwrap_or_else(|| home.join(DEFAULT_DB_FILE));

    let busy_timeout_ms = config
        .as_ref()
        .and_then(|c| c.database.as_ref())
        .and_then(|d| d.busy_timeout_ms)
        .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);

    ResolvedConfig {
        home,
        database,
        busy_timeout: Duration::from_millis(busy_timeout_ms),
        config_file,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".syllabus");

    let file = match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };

    Ok(resolve(default_home, file, EnvOverrides::from_env()))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the syllabus home directory
pub fn syllabus_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the database file path
pub fn database_path() -> Result<PathBuf> {
    Ok(config()?.database.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn parse(yaml: &str) -> ConfigFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(PathBuf::from("/home/u/.syllabus"), None, EnvOverrides::default());

        assert_eq!(config.home, PathBuf::from("/home/u/.syllabus"));
        assert_eq!(config.database, PathBuf::from("/home/u/.syllabus/content.db"));
        assert_eq!(config.busy_timeout, Duration::from_millis(5000));
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".syllabus");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: state
  database: data/courses.db
database:
  busy_timeout_ms: 250
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.paths.home, Some("state".to_string()));
        assert_eq!(config.database.unwrap().busy_timeout_ms, Some(250));
    }

    #[test]
    fn test_file_paths_relative_to_project_root() {
        let config = parse(
            r#"
version: "1.0"
paths:
  database: data/courses.db
"#,
        );
        let file = Some((PathBuf::from("/proj/.syllabus/config.yaml"), config));

        let resolved = resolve(PathBuf::from("/home/u/.syllabus"), file, EnvOverrides::default());
        assert_eq!(resolved.database, PathBuf::from("/proj/data/courses.db"));
        assert_eq!(resolved.home, PathBuf::from("/home/u/.syllabus"));
    }

    #[test]
    fn test_env_overrides_file() {
        let config = parse(
            r#"
version: "1.0"
paths:
  home: state
  database: data/courses.db
"#,
        );
        let file = Some((PathBuf::from("/proj/.syllabus/config.yaml"), config));
        let env = EnvOverrides {
            home: Some(PathBuf::from("/env/home")),
            database: None,
        };

        let resolved = resolve(PathBuf::from("/home/u/.syllabus"), file, env);
        assert_eq!(resolved.home, PathBuf::from("/env/home"));
        // File setting still wins over the home-derived default
        assert_eq!(resolved.database, PathBuf::from("/proj/data/courses.db"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/./subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}

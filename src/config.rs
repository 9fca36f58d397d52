use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "PHOTONOTES_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendType {
    #[default]
    Sqlite,
    File,
    /// Nothing survives the process. Useful for trying things out.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendType,

    /// Database file for the `sqlite` backend
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    /// Entry directory for the `file` backend
    #[serde(default = "default_storage_directory")]
    pub directory: PathBuf,
}

fn default_sqlite_path() -> PathBuf {
    data_dir().join("photonotes.db")
}

fn default_storage_directory() -> PathBuf {
    data_dir().join("entries")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendType::default(),
            sqlite_path: default_sqlite_path(),
            directory: default_storage_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory captured photos are imported into
    #[serde(default = "default_library_path")]
    pub path: PathBuf,

    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_library_path() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(data_dir)
        .join("photonotes")
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "webp".to_string(),
        "heic".to_string(),
        "heif".to_string(),
    ]
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: default_library_path(),
            image_extensions: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `PHOTONOTES_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file directory when journald is unavailable
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photonotes")
        .join("logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photonotes")
}

impl Config {
    /// Load from `PHOTONOTES_CONFIG` or the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing a default config there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!(path = %path.display(), "Wrote default config");
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photonotes")
    }

    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_writes_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.storage.backend, StorageBackendType::Sqlite);
        assert_eq!(config.logging.level, "info");

        let again = Config::load_from(&path).unwrap();
        assert_eq!(again.storage.sqlite_path, config.storage.sqlite_path);
        assert_eq!(again.library.image_extensions, config.library.image_extensions);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[storage]
backend = "file"
directory = "/tmp/notes"

[library]
image_extensions = ["jpg"]
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.storage.backend, StorageBackendType::File);
        assert_eq!(config.storage.directory, PathBuf::from("/tmp/notes"));
        assert_eq!(config.storage.sqlite_path, default_sqlite_path());
        assert_eq!(config.library.image_extensions, vec!["jpg".to_string()]);
        assert_eq!(config.library.path, default_library_path());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\nbackend = \"floppy\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}

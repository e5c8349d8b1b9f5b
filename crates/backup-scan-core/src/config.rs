use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_SIZE: usize = 50;

pub const ADMIN_PREFIX: &str = "!-";
pub const PROPERTIES_EXTENSION: &str = "properties";
pub const INDIR_PROPERTIES_NAME: &str = "backup.properties";
pub const QUARANTINE_PREFIX: &str = "!-ERROR.";

// optional millisecond part keeps older instance names valid
pub const BACKUP_INSTANCE_PATTERN: &str = r"\d\d\d\d-\d\d-\d\d-\d\d-\d\d-\d\d(-\d\d\d)?-user_\d+";
pub const PACKAGE_FOLDER_PATTERN: &str = r"\w+(\.\w+)+";
pub const SPECIAL_FILE_PATTERN: &str = r"(^\.|^!-|^!-ERROR\.)";
pub const SPECIAL_FOLDER_PATTERN: &str = r"(^\.|^!-|EXPORTS|LOGS|SELECTIONS)";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the package folders.
    pub backup_root: PathBuf,
    /// SQLite file the reconciled catalog is written to.
    pub catalog_path: String,
    /// Packages that get an (initially empty) entry on every full scan.
    pub installed_packages: Vec<String>,
    pub create_invalid_backups: bool,
    pub early_empty_backups: bool,
    pub scanner: ScannerConfig,
    pub naming: NamingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backup_root: PathBuf::from("backups"),
            catalog_path: "backup_catalog.db".to_string(),
            installed_packages: Vec::new(),
            create_invalid_backups: true,
            early_empty_backups: false,
            scanner: ScannerConfig::default(),
            naming: NamingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Size of the worker pool, 0 picks one thread per CPU.
    pub worker_threads: usize,
    pub batch_size: usize,
    pub look_for_empty_backups: bool,
    pub ignore_patterns: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            look_for_empty_backups: true,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Naming conventions of the backup tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub properties_extension: String,
    pub indir_properties_name: String,
    pub quarantine_prefix: String,
    pub package_folder_pattern: String,
    pub backup_instance_pattern: String,
    pub special_folder_pattern: String,
    pub special_file_pattern: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            properties_extension: PROPERTIES_EXTENSION.to_string(),
            indir_properties_name: INDIR_PROPERTIES_NAME.to_string(),
            quarantine_prefix: QUARANTINE_PREFIX.to_string(),
            package_folder_pattern: PACKAGE_FOLDER_PATTERN.to_string(),
            backup_instance_pattern: BACKUP_INSTANCE_PATTERN.to_string(),
            special_folder_pattern: SPECIAL_FOLDER_PATTERN.to_string(),
            special_file_pattern: SPECIAL_FILE_PATTERN.to_string(),
        }
    }
}

impl NamingConfig {
    /// `.properties` with the configured extension.
    pub fn properties_suffix(&self) -> String {
        format!(".{}", self.properties_extension)
    }
}

/// Loads `Config.toml` from the working directory (if present) layered with
/// `BACKUP_SCAN__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("BACKUP_SCAN").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

pub fn load_configuration_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::from(path).required(true))
        .add_source(Environment::with_prefix("BACKUP_SCAN").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

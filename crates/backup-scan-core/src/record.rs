//! Backup records built from properties files and invalid candidates.

use crate::classify::NameClassifier;
use crate::config::NamingConfig;
use crate::error::Error;
use crate::scan::InvalidBackup;
use crate::storage::{Node, Storage};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

lazy_static::lazy_static! {
    static ref INSTANCE_DATE: Regex =
        Regex::new(r"(\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2})(?:-\d{3})?-user_(\d+)")
            .expect("instance date pattern");
}

const INSTANCE_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// One backup instance as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub package_name: String,
    pub package_label: Option<String>,
    pub version_name: Option<String>,
    pub version_code: i64,
    pub profile_id: i64,
    pub backup_date: Option<NaiveDateTime>,
    pub size: i64,
    pub persistent: bool,
    pub note: Option<String>,
    pub dir_path: PathBuf,
    pub properties_path: Option<PathBuf>,
    /// Set for placeholder records of unusable backups.
    pub invalid_reason: Option<String>,
}

impl Backup {
    pub fn is_valid(&self) -> bool {
        self.invalid_reason.is_none()
    }
}

/// Content of a properties file. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackupProperties {
    pub package_name: String,
    pub package_label: Option<String>,
    pub version_name: Option<String>,
    pub version_code: i64,
    pub profile_id: i64,
    pub backup_date: Option<NaiveDateTime>,
    pub size: i64,
    pub persistent: bool,
    pub note: Option<String>,
}

/// Turns scanner findings into [`Backup`] records.
pub trait RecordBuilder: Send + Sync {
    fn create_from_properties(&self, properties: &Node) -> Result<Backup, Error>;

    /// Placeholder for an unusable backup, `None` when no package can be
    /// attributed to it.
    fn create_invalid(&self, candidate: &InvalidBackup) -> Option<Backup>;
}

/// Reads JSON properties files through a [`Storage`].
pub struct PropertiesRecordBuilder {
    storage: Arc<dyn Storage>,
    classifier: NameClassifier,
    naming: NamingConfig,
}

impl PropertiesRecordBuilder {
    pub fn new(storage: Arc<dyn Storage>, naming: &NamingConfig) -> Result<Self, Error> {
        Ok(Self {
            storage,
            classifier: NameClassifier::new(naming)?,
            naming: naming.clone(),
        })
    }

    /// Directory a properties file describes.
    fn backup_dir(&self, properties: &Node) -> PathBuf {
        let parent = properties.parent_path().unwrap_or_else(|| Path::new(""));
        if properties.name() == self.naming.indir_properties_name {
            return parent.to_path_buf();
        }
        let stem = properties
            .name()
            .strip_suffix(self.naming.properties_suffix().as_str())
            .unwrap_or(properties.name());
        parent.join(stem)
    }

    /// Package of an invalid directory when the candidate does not carry one.
    fn package_of(&self, dir: &Node) -> Option<String> {
        // flat layout: <package>@<instance>
        if let Some((package, _)) = dir.name().split_once('@') {
            if self.classifier.is_package_folder(package) {
                return Some(package.to_string());
            }
        }
        let parent = dir.parent_path()?.file_name()?.to_string_lossy();
        if self.classifier.is_package_folder(&parent)
            && !self.classifier.is_special_folder(&parent)
        {
            return Some(parent.into_owned());
        }
        None
    }
}

/// Backup date and profile encoded in an instance name.
pub fn parse_instance_name(name: &str) -> Option<(NaiveDateTime, i64)> {
    let captures = INSTANCE_DATE.captures(name)?;
    let date = NaiveDateTime::parse_from_str(&captures[1], INSTANCE_DATE_FORMAT).ok()?;
    let profile = captures[2].parse().ok()?;
    Some((date, profile))
}

impl RecordBuilder for PropertiesRecordBuilder {
    fn create_from_properties(&self, properties: &Node) -> Result<Backup, Error> {
        let text = self
            .storage
            .read_to_string(properties)
            .map_err(|err| Error::storage(properties.path(), err))?;
        let props: BackupProperties = serde_json::from_str(&text)
            .map_err(|err| Error::properties(properties.path(), err.to_string()))?;
        if props.package_name.trim().is_empty() {
            return Err(Error::properties(properties.path(), "no packageName"));
        }

        let dir_path = self.backup_dir(properties);
        let backup_date = props.backup_date.or_else(|| {
            dir_path
                .file_name()
                .and_then(|name| parse_instance_name(&name.to_string_lossy()))
                .map(|(date, _)| date)
        });

        Ok(Backup {
            package_name: props.package_name,
            package_label: props.package_label,
            version_name: props.version_name,
            version_code: props.version_code,
            profile_id: props.profile_id,
            backup_date,
            size: props.size,
            persistent: props.persistent,
            note: props.note,
            dir_path,
            properties_path: Some(properties.path().to_path_buf()),
            invalid_reason: None,
        })
    }

    fn create_invalid(&self, candidate: &InvalidBackup) -> Option<Backup> {
        let package_name = candidate
            .package_name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| self.package_of(&candidate.dir))?;
        let (backup_date, profile_id) = match parse_instance_name(candidate.dir.name()) {
            Some((date, profile)) => (Some(date), profile),
            None => (None, 0),
        };

        Some(Backup {
            package_name,
            package_label: None,
            version_name: None,
            version_code: 0,
            profile_id,
            backup_date,
            size: 0,
            persistent: false,
            note: None,
            dir_path: candidate.dir.path().to_path_buf(),
            properties_path: candidate
                .properties
                .as_ref()
                .map(|props| props.path().to_path_buf()),
            invalid_reason: Some(candidate.reason.as_str().to_string()),
        })
    }
}

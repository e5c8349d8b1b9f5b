use crate::config::NamingConfig;
use crate::error::Error;
use crate::storage::Node;
use regex::Regex;

/// Name predicates of the backup tree. Patterns are searched anywhere in
/// the name, they are not anchored unless the pattern says so.
#[derive(Debug, Clone)]
pub struct NameClassifier {
    package_folder: Regex,
    backup_instance: Regex,
    special_folder: Regex,
    special_file: Regex,
}

impl NameClassifier {
    pub fn new(naming: &NamingConfig) -> Result<Self, Error> {
        Ok(Self {
            package_folder: Regex::new(&naming.package_folder_pattern)?,
            backup_instance: Regex::new(&naming.backup_instance_pattern)?,
            special_folder: Regex::new(&naming.special_folder_pattern)?,
            special_file: Regex::new(&naming.special_file_pattern)?,
        })
    }

    pub fn is_package_folder(&self, name: &str) -> bool {
        self.package_folder.is_match(name)
    }

    pub fn is_backup_instance(&self, name: &str) -> bool {
        self.backup_instance.is_match(name)
    }

    pub fn is_special_folder(&self, name: &str) -> bool {
        self.special_folder.is_match(name)
    }

    pub fn is_special_file(&self, name: &str) -> bool {
        self.special_file.is_match(name)
    }

    pub fn looks_like_properties(&self, node: &Node) -> bool {
        node.is_property_file() && !self.is_special_file(node.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> NameClassifier {
        NameClassifier::new(&NamingConfig::default()).unwrap()
    }

    #[test]
    fn test_instance_names() {
        let names = classifier();
        assert!(names.is_backup_instance("2024-01-01-10-20-30-user_0"));
        assert!(names.is_backup_instance("2024-01-01-10-20-30-123-user_10"));
        assert!(names.is_backup_instance("2024-01-01-10-20-30-user_0.properties"));
        assert!(names.is_backup_instance("com.example@2024-01-01-10-20-30-user_0"));
        assert!(!names.is_backup_instance("2024-01-01"));
        assert!(!names.is_backup_instance("com.example"));
    }

    #[test]
    fn test_package_folder_names() {
        let names = classifier();
        assert!(names.is_package_folder("com.example.app"));
        assert!(names.is_package_folder("android.settings"));
        assert!(!names.is_package_folder("backups"));
        assert!(!names.is_package_folder("2024-01-01-10-20-30-user_0"));
    }

    #[test]
    fn test_special_names() {
        let names = classifier();
        assert!(names.is_special_folder(".thumbnails"));
        assert!(names.is_special_folder("!-SELECTIONS"));
        assert!(names.is_special_folder("EXPORTS"));
        assert!(names.is_special_folder("LOGS"));
        assert!(!names.is_special_folder("com.example.app"));

        assert!(names.is_special_file("!-ERROR.2024-01-01-10-20-30-user_0.properties"));
        assert!(names.is_special_file(".hidden.properties"));
        assert!(!names.is_special_file("backup.properties"));
    }

    #[test]
    fn test_looks_like_properties_skips_special_files() {
        let names = classifier();
        let props = Node::new("/b/com.x/2024-01-01-10-20-30-user_0.properties", false, true);
        let quarantined = Node::new(
            "/b/com.x/!-ERROR.2024-01-01-10-20-30-user_0.properties",
            false,
            true,
        );
        let plain = Node::new("/b/com.x/data.tar.gz", false, false);
        assert!(names.looks_like_properties(&props));
        assert!(!names.looks_like_properties(&quarantined));
        assert!(!names.looks_like_properties(&plain));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let naming = NamingConfig {
            backup_instance_pattern: "(unclosed".to_string(),
            ..NamingConfig::default()
        };
        assert!(matches!(
            NameClassifier::new(&naming),
            Err(Error::Pattern(_))
        ));
    }
}

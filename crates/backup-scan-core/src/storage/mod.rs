//! Hierarchical store the scanner walks.
//!
//! The scanner only ever sees [`Node`] values and the [`Storage`] trait, so
//! the same classification logic runs against a local directory, a mounted
//! volume, or a test double.

pub mod local;

pub use local::LocalStorage;

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

/// Handle into the store: a name, an absolute path and the two flags the
/// classifier cares about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    name: String,
    path: PathBuf,
    is_dir: bool,
    is_property_file: bool,
}

impl Node {
    pub fn new(path: impl Into<PathBuf>, is_dir: bool, is_property_file: bool) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            path,
            is_dir,
            is_property_file,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, true, false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn path_str(&self) -> Cow<'_, str> {
        self.path.to_string_lossy()
    }

    pub fn parent_path(&self) -> Option<&Path> {
        self.path.parent()
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn is_property_file(&self) -> bool {
        self.is_property_file
    }

    /// The same entry after a successful rename inside its parent.
    pub fn renamed(&self, new_name: &str) -> Node {
        Node {
            name: new_name.to_string(),
            path: self.path.with_file_name(new_name),
            is_dir: self.is_dir,
            is_property_file: self.is_property_file,
        }
    }
}

/// Directory listing and mutation primitives. Every call may fail; callers
/// decide how far a failure propagates.
pub trait Storage: Send + Sync {
    fn stat(&self, path: &Path) -> io::Result<Node>;

    fn list_children(&self, node: &Node) -> io::Result<Vec<Node>>;

    fn find_child(&self, node: &Node, name: &str) -> io::Result<Option<Node>> {
        Ok(self
            .list_children(node)?
            .into_iter()
            .find(|child| child.name() == name))
    }

    /// Returns `false` when the entry is gone or the new name is taken.
    fn rename(&self, node: &Node, new_name: &str) -> io::Result<bool>;

    /// Returns `false` when there was nothing to delete.
    fn delete_recursive(&self, node: &Node) -> io::Result<bool>;

    fn read_to_string(&self, node: &Node) -> io::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renamed_keeps_parent_and_flags() {
        let node = Node::new("/backups/com.example/2024.properties", false, true);
        let renamed = node.renamed("!-ERROR.2024.properties");
        assert_eq!(renamed.name(), "!-ERROR.2024.properties");
        assert_eq!(
            renamed.path(),
            Path::new("/backups/com.example/!-ERROR.2024.properties")
        );
        assert_eq!(renamed.parent_path(), node.parent_path());
        assert!(renamed.is_property_file());
    }
}

use super::{Node, Storage};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

/// [`Storage`] over the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    properties_suffix: String,
}

impl LocalStorage {
    pub fn new(properties_extension: &str) -> Self {
        Self {
            properties_suffix: format!(".{}", properties_extension),
        }
    }

    fn node_for(&self, path: &Path, file_type: fs::FileType) -> Node {
        let is_dir = file_type.is_dir();
        let is_property_file = file_type.is_file()
            && path
                .file_name()
                .map(|n| n.to_string_lossy().ends_with(&self.properties_suffix))
                .unwrap_or(false);
        Node::new(path, is_dir, is_property_file)
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new(crate::config::PROPERTIES_EXTENSION)
    }
}

impl Storage for LocalStorage {
    fn stat(&self, path: &Path) -> io::Result<Node> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(self.node_for(path, metadata.file_type()))
    }

    fn list_children(&self, node: &Node) -> io::Result<Vec<Node>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(node.path())? {
            let entry = entry?;
            // symlinks are reported with their own type and never descended into
            let file_type = entry.file_type()?;
            children.push(self.node_for(&entry.path(), file_type));
        }
        Ok(children)
    }

    fn rename(&self, node: &Node, new_name: &str) -> io::Result<bool> {
        let target = node.path().with_file_name(new_name);
        if target.exists() {
            return Ok(false);
        }
        match fs::rename(node.path(), &target) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn delete_recursive(&self, node: &Node) -> io::Result<bool> {
        let metadata = match fs::symlink_metadata(node.path()) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };
        if metadata.is_dir() {
            fs::remove_dir_all(node.path())?;
        } else {
            fs::remove_file(node.path())?;
        }
        Ok(true)
    }

    fn read_to_string(&self, node: &Node) -> io::Result<String> {
        fs::read_to_string(node.path())
    }
}

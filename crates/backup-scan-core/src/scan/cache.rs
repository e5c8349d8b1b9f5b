use crate::error::Error;
use crate::storage::{Node, Storage};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Listing = Arc<Vec<Node>>;

/// Directory listings memoized for one pass, keyed by absolute path.
///
/// Concurrent first lookups of the same directory may both hit the storage;
/// the first stored listing wins. Repairs done by the pass itself patch the
/// affected entries through [`ListingCache::forget`] and
/// [`ListingCache::renamed`].
#[derive(Debug)]
pub struct ListingCache {
    entries: DashMap<PathBuf, Listing, ahash::RandomState>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(ahash::RandomState::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Children of `node`, listed from storage on the first call only.
    /// The second value is the storage time spent, zero on a hit.
    pub fn list(&self, storage: &dyn Storage, node: &Node) -> Result<(Listing, Duration), Error> {
        if node.path().as_os_str().is_empty() {
            return Ok((Listing::default(), Duration::ZERO));
        }
        if let Some(hit) = self.entries.get(node.path()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((Arc::clone(hit.value()), Duration::ZERO));
        }

        let start = Instant::now();
        let children = storage
            .list_children(node)
            .map_err(|err| Error::storage(node.path(), err))?;
        let elapsed = start.elapsed();
        self.misses.fetch_add(1, Ordering::Relaxed);

        let stored = self
            .entries
            .entry(node.path().to_path_buf())
            .or_insert_with(|| Arc::new(children));
        Ok((Arc::clone(stored.value()), elapsed))
    }

    /// Looks `name` up in the (cached) listing of `dir`.
    pub fn find_child(
        &self,
        storage: &dyn Storage,
        dir: &Node,
        name: &str,
    ) -> Result<Option<Node>, Error> {
        let (listing, _) = self.list(storage, dir)?;
        Ok(listing.iter().find(|child| child.name() == name).cloned())
    }

    /// Drops a removed entry: its own subtree and its line in the parent.
    pub fn forget(&self, node: &Node) {
        let gone = node.path();
        self.entries.retain(|path, _| !path.starts_with(gone));
        if let Some(parent) = node.parent_path() {
            self.patch_parent(parent, |children| {
                children.retain(|child| child.path() != gone);
            });
        }
    }

    /// Replaces `old` by `new` in the parent listing.
    pub fn renamed(&self, old: &Node, new: &Node) {
        self.forget(old);
        if let Some(parent) = new.parent_path() {
            self.patch_parent(parent, |children| children.push(new.clone()));
        }
    }

    fn patch_parent(&self, parent: &Path, patch: impl FnOnce(&mut Vec<Node>)) {
        if let Some(mut listing) = self.entries.get_mut(parent) {
            let mut children = listing.as_ref().clone();
            patch(&mut children);
            *listing = Arc::new(children);
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Listings that went to storage.
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use crate::storage::Node;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Pending entries of a pass.
///
/// Children of an expanded directory go to the front, so the next batches
/// pick them up before siblings queued earlier. That keeps the walk roughly
/// depth first, which is all it is: entries inside one batch run in any
/// order.
#[derive(Debug, Default)]
pub struct WorkQueue {
    nodes: Mutex<VecDeque<Node>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Node>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `children` at the front in ascending name order.
    pub fn push_children(&self, mut children: Vec<Node>) {
        // sorted descending and pushed one by one, the smallest name ends up first
        children.sort_by(|a, b| b.name().cmp(a.name()));
        let mut nodes = self.lock();
        for child in children {
            nodes.push_front(child);
        }
    }

    /// Takes up to `max` entries from the front.
    pub fn next_batch(&self, max: usize) -> Vec<Node> {
        let mut nodes = self.lock();
        let take = max.max(1).min(nodes.len());
        nodes.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.name()).collect()
    }

    fn dir(path: &str) -> Node {
        Node::directory(path)
    }

    #[test]
    fn test_children_are_queued_ascending_at_front() {
        let queue = WorkQueue::new();
        queue.push_children(vec![dir("/r/b"), dir("/r/c"), dir("/r/a")]);
        let first = queue.next_batch(1);
        assert_eq!(names(&first), vec!["a"]);

        // expanding "a" puts its children before "b" and "c"
        queue.push_children(vec![dir("/r/a/y"), dir("/r/a/x")]);
        let rest = queue.next_batch(50);
        assert_eq!(names(&rest), vec!["x", "y", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_batches_are_bounded() {
        let queue = WorkQueue::new();
        let children: Vec<Node> = (0..120).map(|i| dir(&format!("/r/n{:03}", i))).collect();
        queue.push_children(children);

        assert_eq!(queue.next_batch(50).len(), 50);
        assert_eq!(queue.next_batch(50).len(), 50);
        assert_eq!(queue.len(), 20);
        assert_eq!(queue.next_batch(50).len(), 20);
        assert!(queue.next_batch(50).is_empty());
    }
}

//! Pending-work frontier
//!
//! A mutex-protected deque of directories that have been discovered but
//! not yet scanned. Breadth-first pops from the front, depth-first from
//! the back. Every operation holds the lock for one deque call.

use crate::config::Strategy;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A directory waiting to be scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Full path to the directory
    pub path: String,

    /// Depth from root (0 = root)
    pub depth: u32,
}

impl WorkItem {
    /// Create a new work item
    pub fn new(path: impl Into<String>, depth: u32) -> Self {
        Self {
            path: path.into(),
            depth,
        }
    }

    /// Create the root item
    pub fn root(path: impl Into<String>) -> Self {
        Self::new(path, 0)
    }

    /// Item for a subdirectory of this one
    pub fn child(&self, path: impl Into<String>) -> Self {
        Self::new(path, self.depth + 1)
    }
}

/// Lock-protected pending work
#[derive(Debug)]
pub struct Frontier {
    items: Mutex<VecDeque<WorkItem>>,
    strategy: Strategy,
}

impl Frontier {
    /// Create an empty frontier drained in `strategy` order
    pub fn new(strategy: Strategy) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            strategy,
        }
    }

    /// Append an item, returning the new size
    pub fn push(&self, item: WorkItem) -> usize {
        let mut items = self.items.lock();
        items.push_back(item);
        items.len()
    }

    /// Append many items at once (resume loading)
    pub fn extend<I: IntoIterator<Item = WorkItem>>(&self, iter: I) -> usize {
        let mut items = self.items.lock();
        items.extend(iter);
        items.len()
    }

    /// Take the next item per strategy
    pub fn pop(&self) -> Option<WorkItem> {
        let mut items = self.items.lock();
        match self.strategy {
            Strategy::Bfs => items.pop_front(),
            Strategy::Dfs => items.pop_back(),
        }
    }

    /// Current number of pending items
    pub fn size(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_returns_size() {
        let frontier = Frontier::new(Strategy::Bfs);
        assert_eq!(frontier.push(WorkItem::root("/data")), 1);
        assert_eq!(frontier.push(WorkItem::new("/data/a", 1)), 2);
        assert_eq!(frontier.size(), 2);
    }

    #[test]
    fn test_bfs_is_fifo() {
        let frontier = Frontier::new(Strategy::Bfs);
        frontier.push(WorkItem::new("/a", 1));
        frontier.push(WorkItem::new("/b", 1));
        frontier.push(WorkItem::new("/a/c", 2));

        assert_eq!(frontier.pop().unwrap().path, "/a");
        assert_eq!(frontier.pop().unwrap().path, "/b");
        assert_eq!(frontier.pop().unwrap().path, "/a/c");
        assert!(frontier.pop().is_none());
    }

    #[test]
    fn test_dfs_is_lifo() {
        let frontier = Frontier::new(Strategy::Dfs);
        frontier.push(WorkItem::new("/a", 1));
        frontier.push(WorkItem::new("/b", 1));

        assert_eq!(frontier.pop().unwrap().path, "/b");
        assert_eq!(frontier.pop().unwrap().path, "/a");
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_child_depth() {
        let parent = WorkItem::new("/data/a", 3);
        let child = parent.child("/data/a/b");
        assert_eq!(child.depth, 4);
    }

    #[test]
    fn test_concurrent_push_pop() {
        use std::sync::Arc;
        use std::thread;

        let frontier = Arc::new(Frontier::new(Strategy::Bfs));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let frontier = Arc::clone(&frontier);
                thread::spawn(move || {
                    for i in 0..250 {
                        frontier.push(WorkItem::new(format!("/t{}/{}", t, i), 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(frontier.size(), 1000);

        let mut popped = 0;
        while frontier.pop().is_some() {
            popped += 1;
        }
        assert_eq!(popped, 1000);
    }
}

//! A tree of values keyed by path segments.
//!
//! The in-memory source stores its nodes in one, and a federated workspace
//! indexes its mount points in another.

use std::collections::BTreeMap;

use crate::{Path, Segment};

/// Values attached to paths, with the branches between them.
///
/// A branch may exist without a value when something below it has one.
/// Children are kept in segment order, so `a` comes before `a[2]` and both
/// before `b`.
///
/// # Example
///
/// ```rust
/// use fedstore_core::{path, PathTrie};
///
/// let mut mounts: PathTrie<&str> = PathTrie::new();
/// mounts.insert(&path!("/Aircraft/Military"), "planes");
///
/// assert_eq!(mounts.get(&path!("/Aircraft/Military")), Some(&"planes"));
/// assert!(!mounts.contains_value(&path!("/Aircraft")));
/// assert!(!mounts.subtrie(&path!("/Aircraft")).unwrap().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct PathTrie<T> {
    value: Option<T>,
    children: BTreeMap<Segment, PathTrie<T>>,
}

impl<T> Default for PathTrie<T> {
    fn default() -> Self {
        PathTrie {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<T> PathTrie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn walk(&self, path: &Path) -> Option<&PathTrie<T>> {
        path.iter()
            .try_fold(self, |branch, segment| branch.children.get(segment))
    }

    fn walk_mut(&mut self, path: &Path) -> Option<&mut PathTrie<T>> {
        path.iter()
            .try_fold(self, |branch, segment| branch.children.get_mut(segment))
    }

    /// Set the value at `path`, growing branches as needed. Returns the
    /// value it replaced.
    pub fn insert(&mut self, path: &Path, value: T) -> Option<T> {
        let branch = path.iter().fold(self, |branch, segment| {
            branch.children.entry(segment.clone()).or_default()
        });
        branch.value.replace(value)
    }

    pub fn get(&self, path: &Path) -> Option<&T> {
        self.walk(path)?.value.as_ref()
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut T> {
        self.walk_mut(path)?.value.as_mut()
    }

    pub fn contains_value(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    /// The branch at `path`, with paths relative to it.
    pub fn subtrie(&self, path: &Path) -> Option<&PathTrie<T>> {
        self.walk(path)
    }

    /// Detach the branch at `path`. Detaching the root empties the trie.
    pub fn remove_subtree(&mut self, path: &Path) -> Option<PathTrie<T>> {
        let Some(last) = path.last_segment() else {
            let detached = std::mem::take(self);
            return (!detached.is_empty()).then_some(detached);
        };
        let parent = path.parent()?;
        self.walk_mut(&parent)?.children.remove(last)
    }

    /// The value at this branch itself.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Immediate children, in segment order.
    pub fn children(&self) -> impl Iterator<Item = (&Segment, &PathTrie<T>)> {
        self.children.iter()
    }

    /// True if no branch holds a value.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.values().all(PathTrie::is_empty)
    }

    /// Every value with its path relative to this branch, parents first and
    /// siblings in segment order.
    pub fn iter(&self) -> impl Iterator<Item = (Path, &T)> {
        let mut found = Vec::new();
        self.collect_into(Path::root(), &mut found);
        found.into_iter()
    }

    fn collect_into<'a>(&'a self, at: Path, found: &mut Vec<(Path, &'a T)>) {
        if let Some(value) = &self.value {
            found.push((at.clone(), value));
        }
        for (segment, child) in &self.children {
            child.collect_into(at.child(segment.clone()), found);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;

    fn mounts() -> PathTrie<&'static str> {
        let mut trie = PathTrie::new();
        trie.insert(&Path::root(), "mirror");
        trie.insert(&path!("/Aircraft"), "planes");
        trie.insert(&path!("/Aircraft/Military/Secret"), "vault");
        trie.insert(&path!("/Boats"), "boats");
        trie
    }

    #[test]
    fn values_sit_on_exact_paths() {
        let trie = mounts();
        assert_eq!(trie.get(&Path::root()), Some(&"mirror"));
        assert_eq!(trie.get(&path!("/Aircraft")), Some(&"planes"));
        assert!(!trie.contains_value(&path!("/Aircraft/Military")));
        assert!(!trie.contains_value(&path!("/Cars")));
    }

    #[test]
    fn replacing_returns_previous() {
        let mut trie = mounts();
        assert_eq!(trie.insert(&path!("/Boats"), "ships"), Some("boats"));
        assert_eq!(trie.insert(&path!("/Cars"), "cars"), None);
        *trie.get_mut(&path!("/Cars")).unwrap() = "autos";
        assert_eq!(trie.get(&path!("/Cars")), Some(&"autos"));
    }

    #[test]
    fn sibling_indexes_are_separate_branches() {
        let mut trie = PathTrie::new();
        trie.insert(&path!("/Cars/Hybrid"), 1);
        trie.insert(&path!("/Cars/Hybrid[2]"), 2);
        let cars = trie.subtrie(&path!("/Cars")).unwrap();
        let names: Vec<String> = cars.children().map(|(s, _)| s.to_string()).collect();
        assert_eq!(names, vec!["Hybrid", "Hybrid[2]"]);
    }

    #[test]
    fn subtrie_sees_values_below() {
        let trie = mounts();
        let military = trie.subtrie(&path!("/Aircraft/Military")).unwrap();
        assert!(military.value().is_none());
        assert!(!military.is_empty());
        assert_eq!(military.get(&path!("/Secret")), Some(&"vault"));
        assert!(trie.subtrie(&path!("/Trains")).is_none());
    }

    #[test]
    fn iter_is_relative_and_ordered() {
        let trie = mounts();
        let aircraft: Vec<(String, &str)> = trie
            .subtrie(&path!("/Aircraft"))
            .unwrap()
            .iter()
            .map(|(p, v)| (p.to_string(), *v))
            .collect();
        assert_eq!(
            aircraft,
            vec![("/".to_string(), "planes"), ("/Military/Secret".to_string(), "vault")]
        );
        assert_eq!(trie.iter().count(), 4);
    }

    #[test]
    fn detach_branch() {
        let mut trie = mounts();
        let detached = trie.remove_subtree(&path!("/Aircraft")).unwrap();
        assert_eq!(detached.iter().count(), 2);
        assert!(trie.subtrie(&path!("/Aircraft")).is_none());
        assert_eq!(trie.get(&path!("/Boats")), Some(&"boats"));
        assert!(trie.remove_subtree(&path!("/Aircraft")).is_none());
        assert!(trie.remove_subtree(&path!("/Nowhere/Deep")).is_none());
    }

    #[test]
    fn detach_root_empties() {
        let mut trie = mounts();
        assert_eq!(trie.remove_subtree(&Path::root()).unwrap().iter().count(), 4);
        assert!(trie.is_empty());
        assert!(trie.remove_subtree(&Path::root()).is_none());
    }
}

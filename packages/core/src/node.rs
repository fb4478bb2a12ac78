use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Path, Value};

/// A graph node as returned by a read: its properties and the paths of its
/// children.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub path: Path,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub children: Vec<Path>,
}

impl Node {
    /// A node with no properties and no children.
    pub fn new(path: Path) -> Self {
        Node {
            path,
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Path>) -> Self {
        self.children = children;
        self
    }
}

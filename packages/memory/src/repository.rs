//! In-memory repository of named sources and workspaces.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use fedstore_core::{
    Command, Connection, Error, Node, Path, PathTrie, Request, Response, Segment, Value,
    WorkSource,
};

/// Workspace used when a request does not name one.
pub const DEFAULT_WORKSPACE: &str = "default";

type Properties = BTreeMap<String, Value>;

/// Every node in the trie holds its properties; the root always exists.
struct Workspace {
    nodes: PathTrie<Properties>,
}

impl Workspace {
    fn new() -> Self {
        let mut nodes = PathTrie::new();
        nodes.insert(&Path::root(), Properties::new());
        Self { nodes }
    }

    fn children(&self, of: &Path) -> Result<Vec<Path>, Error> {
        let node = self
            .nodes
            .subtrie(of)
            .filter(|n| n.value().is_some())
            .ok_or_else(|| Error::PathNotFound { path: of.clone() })?;
        Ok(node
            .children()
            .filter(|(_, child)| child.value().is_some())
            .map(|(segment, _)| of.child(segment.clone()))
            .collect())
    }

    fn properties(&self, at: &Path) -> Result<&Properties, Error> {
        self.nodes
            .get(at)
            .ok_or_else(|| Error::PathNotFound { path: at.clone() })
    }

    fn execute(&mut self, command: &Command) -> Result<Response, Error> {
        match command {
            Command::ReadNode { at } => Ok(Response::Node(Node {
                path: at.clone(),
                properties: self.properties(at)?.clone(),
                children: self.children(at)?,
            })),
            Command::ReadChildren { of } => Ok(Response::Children {
                of: of.clone(),
                children: self.children(of)?,
            }),
            Command::ReadProperty { on, name } => Ok(Response::Property {
                on: on.clone(),
                name: name.clone(),
                value: self.properties(on)?.get(name).cloned(),
            }),
            Command::VerifyNodeExists { at } => Ok(Response::Exists {
                at: at.clone(),
                exists: self.nodes.contains_value(at),
            }),
            Command::CreateNode {
                under,
                name,
                properties,
            } => {
                let next_index = self
                    .children(under)?
                    .iter()
                    .filter_map(|child| child.last_segment())
                    .filter(|segment| segment.name() == name)
                    .map(Segment::index)
                    .max()
                    .unwrap_or(0)
                    + 1;
                let path = under.child(Segment::try_new(name.clone(), next_index)?);
                self.nodes.insert(&path, properties.clone());
                tracing::trace!(%path, "created node");
                Ok(Response::Created { path })
            }
            Command::UpdateProperties { on, properties } => {
                let existing = self
                    .nodes
                    .get_mut(on)
                    .ok_or_else(|| Error::PathNotFound { path: on.clone() })?;
                for (name, value) in properties {
                    match value {
                        Some(value) => {
                            existing.insert(name.clone(), value.clone());
                        }
                        None => {
                            existing.remove(name);
                        }
                    }
                }
                Ok(Response::Updated { on: on.clone() })
            }
            Command::DeleteBranch { at } => {
                if at.is_root() {
                    self.nodes = Workspace::new().nodes;
                } else if self.nodes.remove_subtree(at).is_none() {
                    return Err(Error::PathNotFound { path: at.clone() });
                }
                tracing::trace!(path = %at, "deleted branch");
                Ok(Response::Deleted { at: at.clone() })
            }
        }
    }
}

struct Source {
    workspaces: BTreeMap<String, Workspace>,
}

type Sources = BTreeMap<String, Source>;

fn lock(sources: &Mutex<Sources>) -> Result<MutexGuard<'_, Sources>, Error> {
    sources
        .lock()
        .map_err(|_| Error::execution("in-memory repository lock poisoned"))
}

/// A set of named in-memory sources.
///
/// Cloning is cheap; clones share the same content.
///
/// # Example
///
/// ```rust
/// use fedstore_core::{path, Command, Connection, Request, Response, WorkSource};
/// use fedstore_memory::InMemoryRepository;
///
/// let repo = InMemoryRepository::new().with_source("cars", &["default"]);
/// let mut conn = repo.create_connection("cars").unwrap();
///
/// let created = conn
///     .execute(&Request::new(Command::CreateNode {
///         under: path!("/"),
///         name: "Hybrid".into(),
///         properties: Default::default(),
///     }))
///     .unwrap();
/// assert_eq!(created, Response::Created { path: path!("/Hybrid") });
/// ```
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sources: Arc<Mutex<Sources>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`InMemoryRepository::add_source`].
    ///
    /// # Panics
    ///
    /// Panics if the repository lock is poisoned.
    #[must_use]
    pub fn with_source(self, name: &str, workspaces: &[&str]) -> Self {
        self.add_source(name, workspaces).expect("fresh repository lock");
        self
    }

    /// Add a source with the given workspaces; the default workspace is
    /// always created. Adding an existing source keeps its content.
    pub fn add_source(&self, name: &str, workspaces: &[&str]) -> Result<(), Error> {
        let mut sources = lock(&self.sources)?;
        let source = sources.entry(name.to_string()).or_insert_with(|| Source {
            workspaces: BTreeMap::new(),
        });
        for workspace in std::iter::once(&DEFAULT_WORKSPACE).chain(workspaces) {
            source
                .workspaces
                .entry(workspace.to_string())
                .or_insert_with(Workspace::new);
        }
        Ok(())
    }

    /// Add an empty workspace to an existing source.
    pub fn add_workspace(&self, source_name: &str, workspace: &str) -> Result<(), Error> {
        let mut sources = lock(&self.sources)?;
        let source = sources
            .get_mut(source_name)
            .ok_or_else(|| unknown(source_name))?;
        source
            .workspaces
            .entry(workspace.to_string())
            .or_insert_with(Workspace::new);
        Ok(())
    }

    pub fn source_names(&self) -> Result<Vec<String>, Error> {
        Ok(lock(&self.sources)?.keys().cloned().collect())
    }

    pub fn workspace_names(&self, source_name: &str) -> Result<Vec<String>, Error> {
        let sources = lock(&self.sources)?;
        let source = sources.get(source_name).ok_or_else(|| unknown(source_name))?;
        Ok(source.workspaces.keys().cloned().collect())
    }

    pub fn connection(&self, source_name: &str) -> Result<InMemoryConnection, Error> {
        if !lock(&self.sources)?.contains_key(source_name) {
            return Err(unknown(source_name));
        }
        Ok(InMemoryConnection {
            source_name: source_name.to_string(),
            sources: Arc::clone(&self.sources),
            closed: false,
        })
    }
}

fn unknown(source_name: &str) -> Error {
    Error::Connection {
        source_name: source_name.to_string(),
        message: "no such source".to_string(),
    }
}

impl WorkSource for InMemoryRepository {
    fn create_connection(&self, source_name: &str) -> Result<Box<dyn Connection>, Error> {
        Ok(Box::new(self.connection(source_name)?))
    }
}

/// A connection to one source of an [`InMemoryRepository`].
pub struct InMemoryConnection {
    source_name: String,
    sources: Arc<Mutex<Sources>>,
    closed: bool,
}

impl InMemoryConnection {
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Connection for InMemoryConnection {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn execute(&mut self, request: &Request) -> Result<Response, Error> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        let mut sources = lock(&self.sources)?;
        let source = sources
            .get_mut(&self.source_name)
            .ok_or_else(|| unknown(&self.source_name))?;
        let workspace_name = request.workspace.as_deref().unwrap_or(DEFAULT_WORKSPACE);
        let workspace = source
            .workspaces
            .get_mut(workspace_name)
            .ok_or_else(|| Error::InvalidWorkspace {
                name: workspace_name.to_string(),
            })?;
        workspace.execute(&request.command)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_literals::btree;
    use fedstore_core::path;

    fn repo() -> InMemoryRepository {
        InMemoryRepository::new().with_source("cars", &["default", "archive"])
    }

    fn create(conn: &mut InMemoryConnection, under: &str, name: &str) -> Path {
        match conn
            .execute(&Request::new(Command::CreateNode {
                under: path!(under),
                name: name.to_string(),
                properties: BTreeMap::new(),
            }))
            .unwrap()
        {
            Response::Created { path } => path,
            other => panic!("unexpected response {:?}", other),
        }
    }

    fn children(conn: &mut InMemoryConnection, of: &str) -> Vec<Path> {
        match conn
            .execute(&Request::new(Command::ReadChildren { of: path!(of) }))
            .unwrap()
        {
            Response::Children { children, .. } => children,
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn root_exists_in_new_workspace() {
        let mut conn = repo().connection("cars").unwrap();
        let response = conn
            .execute(&Request::new(Command::ReadNode { at: Path::root() }))
            .unwrap();
        assert_eq!(response, Response::Node(Node::new(Path::root())));
    }

    #[test]
    fn create_and_read() {
        let mut conn = repo().connection("cars").unwrap();
        create(&mut conn, "/", "Cars");
        let path = conn
            .execute(&Request::new(Command::CreateNode {
                under: path!("/Cars"),
                name: "Hybrid".into(),
                properties: btree! { "maker".into() => Value::from("Toyota") },
            }))
            .unwrap();
        assert_eq!(
            path,
            Response::Created {
                path: path!("/Cars/Hybrid")
            }
        );

        let response = conn
            .execute(&Request::new(Command::ReadProperty {
                on: path!("/Cars/Hybrid"),
                name: "maker".into(),
            }))
            .unwrap();
        assert_eq!(
            response,
            Response::Property {
                on: path!("/Cars/Hybrid"),
                name: "maker".into(),
                value: Some(Value::from("Toyota")),
            }
        );
        assert_eq!(children(&mut conn, "/Cars"), vec![path!("/Cars/Hybrid")]);
    }

    #[test]
    fn same_name_siblings_get_next_index() {
        let mut conn = repo().connection("cars").unwrap();
        assert_eq!(create(&mut conn, "/", "a"), path!("/a"));
        assert_eq!(create(&mut conn, "/", "a"), path!("/a[2]"));
        assert_eq!(create(&mut conn, "/", "a"), path!("/a[3]"));
        assert_eq!(children(&mut conn, "/").len(), 3);
    }

    #[test]
    fn create_under_missing_parent_fails() {
        let mut conn = repo().connection("cars").unwrap();
        let err = conn
            .execute(&Request::new(Command::CreateNode {
                under: path!("/missing"),
                name: "x".into(),
                properties: BTreeMap::new(),
            }))
            .unwrap_err();
        assert_eq!(
            err,
            Error::PathNotFound {
                path: path!("/missing")
            }
        );
    }

    #[test]
    fn update_sets_and_removes_properties() {
        let mut conn = repo().connection("cars").unwrap();
        create(&mut conn, "/", "a");
        conn.execute(&Request::new(Command::UpdateProperties {
            on: path!("/a"),
            properties: btree! {
                "x".into() => Some(Value::from(1i64)),
                "y".into() => Some(Value::from(2i64)),
            },
        }))
        .unwrap();
        conn.execute(&Request::new(Command::UpdateProperties {
            on: path!("/a"),
            properties: btree! { "x".into() => None },
        }))
        .unwrap();

        let Response::Node(node) = conn
            .execute(&Request::new(Command::ReadNode { at: path!("/a") }))
            .unwrap()
        else {
            panic!("expected node");
        };
        assert_eq!(node.property("x"), None);
        assert_eq!(node.property("y"), Some(&Value::from(2i64)));
    }

    #[test]
    fn delete_branch_and_root() {
        let mut conn = repo().connection("cars").unwrap();
        create(&mut conn, "/", "a");
        create(&mut conn, "/a", "b");
        create(&mut conn, "/", "c");

        conn.execute(&Request::new(Command::DeleteBranch { at: path!("/a") }))
            .unwrap();
        assert_eq!(children(&mut conn, "/"), vec![path!("/c")]);
        assert!(conn
            .execute(&Request::new(Command::DeleteBranch { at: path!("/a") }))
            .is_err());

        conn.execute(&Request::new(Command::DeleteBranch { at: Path::root() }))
            .unwrap();
        assert!(children(&mut conn, "/").is_empty());
    }

    #[test]
    fn workspaces_are_isolated() {
        let repo = repo();
        let mut conn = repo.connection("cars").unwrap();
        create(&mut conn, "/", "a");

        let response = conn
            .execute(&Request::in_workspace(
                "archive",
                Command::VerifyNodeExists { at: path!("/a") },
            ))
            .unwrap();
        assert_eq!(
            response,
            Response::Exists {
                at: path!("/a"),
                exists: false
            }
        );

        let err = conn
            .execute(&Request::in_workspace(
                "nope",
                Command::ReadNode { at: Path::root() },
            ))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWorkspace { .. }));
        assert_eq!(
            repo.workspace_names("cars").unwrap(),
            vec!["archive".to_string(), "default".to_string()]
        );
    }

    #[test]
    fn add_workspace_to_existing_source() {
        let repo = repo();
        repo.add_workspace("cars", "staging").unwrap();
        assert!(repo.add_workspace("planes", "staging").is_err());
        assert!(repo
            .workspace_names("cars")
            .unwrap()
            .contains(&"staging".to_string()));
    }

    #[test]
    fn clones_share_content() {
        let repo = repo();
        let other = repo.clone();
        create(&mut repo.connection("cars").unwrap(), "/", "shared");
        let mut conn = other.connection("cars").unwrap();
        assert_eq!(children(&mut conn, "/"), vec![path!("/shared")]);
    }

    #[test]
    fn unknown_source_and_closed_connection() {
        let repo = repo();
        assert!(matches!(
            repo.create_connection("planes"),
            Err(Error::Connection { .. })
        ));

        let mut conn = repo.connection("cars").unwrap();
        conn.close();
        conn.close();
        assert!(conn.is_closed());
        assert_eq!(
            conn.execute(&Request::new(Command::ReadNode { at: Path::root() })),
            Err(Error::ConnectionClosed)
        );
    }
}

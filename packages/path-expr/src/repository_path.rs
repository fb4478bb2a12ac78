//! Splitting `repository:workspace:/path` strings into their parts.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref REPOSITORY_AND_WORKSPACE_AND_PATH: Regex =
        Regex::new(r"(?s)^(?:([^:/]*):(?:([^:/]*):)?)?(.*)$").unwrap();
}

/// A path optionally qualified by a repository and a workspace name.
///
/// The textual form is `[repository][:[workspace]]:path`. Blank names are
/// treated as absent.
///
/// # Example
///
/// ```rust
/// use fedstore_path_expr::RepositoryPath;
///
/// let p = RepositoryPath::parse("repo:ws:/a/b");
/// assert_eq!(p.repository_name(), Some("repo"));
/// assert_eq!(p.workspace_name(), Some("ws"));
/// assert_eq!(p.path(), "/a/b");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepositoryPath {
    repository_name: Option<String>,
    workspace_name: Option<String>,
    path: String,
}

fn non_blank(name: Option<regex::Match<'_>>) -> Option<String> {
    name.map(|m| m.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

impl RepositoryPath {
    pub fn new(
        repository_name: Option<String>,
        workspace_name: Option<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            repository_name,
            workspace_name,
            path: path.into(),
        }
    }

    /// Split a string into its repository, workspace and path parts.
    ///
    /// Never fails: a string without a prefix is all path.
    pub fn parse(s: &str) -> Self {
        match REPOSITORY_AND_WORKSPACE_AND_PATH.captures(s) {
            Some(caps) => Self {
                repository_name: non_blank(caps.get(1)),
                workspace_name: non_blank(caps.get(2)),
                path: caps.get(3).map(|m| m.as_str()).unwrap_or("").to_string(),
            },
            None => Self::new(None, None, s),
        }
    }

    pub fn repository_name(&self) -> Option<&str> {
        self.repository_name.as_deref()
    }

    pub fn workspace_name(&self) -> Option<&str> {
        self.workspace_name.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn with_repository_name(&self, repository_name: Option<String>) -> Self {
        Self {
            repository_name,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_workspace_name(&self, workspace_name: Option<String>) -> Self {
        Self {
            workspace_name,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for RepositoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.repository_name.as_deref().unwrap_or(""),
            self.workspace_name.as_deref().unwrap_or(""),
            self.path
        )
    }
}

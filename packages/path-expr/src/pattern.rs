//! Compiled path expressions and the results of matching them.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::predicates::{remove_all_predicates_except_indexes, remove_unused_predicates};
use crate::translate::translate;
use crate::{ExpressionError, RepositoryPath};

lazy_static! {
    static ref MATCHES_ANYTHING: Regex = Regex::new(r"^/*(?:[*.](?:\[\*?\])?/*)*$").unwrap();
    static ref TRAILING_PROPERTY: Regex = Regex::new(r"/@[^/\[\]]+$").unwrap();
    static ref ALL_PATHS: PathPattern = PathPattern::compile("//").unwrap();
}

/// Matches a repository or workspace name.
#[derive(Clone, Debug, PartialEq, Eq)]
enum NameMatcher {
    Any,
    Exact(String),
}

impl NameMatcher {
    fn from_name(name: Option<&str>) -> Self {
        match name {
            None | Some("*") => NameMatcher::Any,
            Some(name) => NameMatcher::Exact(name.to_string()),
        }
    }

    fn accepts(&self, name: Option<&str>) -> bool {
        match self {
            NameMatcher::Any => true,
            NameMatcher::Exact(expected) => name == Some(expected.as_str()),
        }
    }

    fn name(&self) -> Option<&str> {
        match self {
            NameMatcher::Any => None,
            NameMatcher::Exact(name) => Some(name),
        }
    }
}

/// A compiled path expression.
///
/// Compiling is done once; the pattern is immutable afterwards and can be
/// shared between threads. Each call to [`PathPattern::matcher`] returns an
/// independent [`Match`].
///
/// # Grammar
///
/// - `[repository][:[workspace]]:` optionally prefixes the path; an empty
///   name matches any repository or workspace
/// - `*` matches one segment, or part of one as in `*.txt`
/// - `//` matches zero or more segments
/// - `[n]`, `[]`, `[*]`, `[n1,n2]` constrain same-name-sibling indexes
/// - `(a|b)` captures alternatives; an empty alternative makes the
///   preceding `/` and the group optional together
/// - a trailing `[...]` that is not an index is a selection suffix, e.g.
///   `/a/b[c/@prop]` matches `/a/b/c/@prop` and selects `/a/b`
///
/// # Example
///
/// ```rust
/// use fedstore_path_expr::PathPattern;
///
/// let pattern = PathPattern::compile("/a(//c)[d/e/@x]").unwrap();
/// let m = pattern.matcher("/a/b/c/d/e/@x");
/// assert!(m.matches());
/// assert_eq!(m.selected_node_path(), Some("/a/b/c"));
/// assert_eq!(m.group(1), Some("/b/c"));
/// ```
#[derive(Clone, Debug)]
pub struct PathPattern {
    expression: String,
    repository: NameMatcher,
    workspace: NameMatcher,
    path_expression: String,
    match_pattern: Regex,
    select_pattern: Regex,
}

impl PathPattern {
    /// Compile an expression. Surrounding whitespace is ignored.
    pub fn compile(expression: &str) -> Result<Self, ExpressionError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(ExpressionError::Blank);
        }

        let repo_path = RepositoryPath::parse(expression);
        let mut path_expression = repo_path.path();
        // A single trailing slash carries no meaning; `//` at the end does.
        if path_expression.ends_with('/') && !path_expression.ends_with("//") {
            path_expression = &path_expression[..path_expression.len() - 1];
        }

        let match_source = translate(&remove_unused_predicates(path_expression))?;
        let select_source = translate(&remove_all_predicates_except_indexes(path_expression))?;

        let build = |source: String| {
            Regex::new(&source)
                .map_err(|e| ExpressionError::invalid(expression, e.to_string()))
        };

        Ok(Self {
            expression: expression.to_string(),
            repository: NameMatcher::from_name(repo_path.repository_name()),
            workspace: NameMatcher::from_name(repo_path.workspace_name()),
            path_expression: path_expression.to_string(),
            match_pattern: build(format!("^(?:{})$", match_source))?,
            select_pattern: build(format!("^({}).*$", select_source))?,
        })
    }

    /// Compile an optional expression, reporting a missing one as an error.
    pub fn compile_opt(expression: Option<&str>) -> Result<Self, ExpressionError> {
        match expression {
            Some(expression) => Self::compile(expression),
            None => Err(ExpressionError::Missing),
        }
    }

    /// The shared `//` pattern, which matches every path.
    pub fn all() -> &'static PathPattern {
        &ALL_PATHS
    }

    /// The trimmed expression this pattern was compiled from.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The repository name this pattern requires, if any.
    pub fn repository_name(&self) -> Option<&str> {
        self.repository.name()
    }

    /// The workspace name this pattern requires, if any.
    pub fn workspace_name(&self) -> Option<&str> {
        self.workspace.name()
    }

    /// True if the pattern is equivalent to "any single arbitrary path",
    /// such as `//`, `/*`, `*[]` or `.`.
    pub fn matches_anything(&self) -> bool {
        MATCHES_ANYTHING.is_match(&self.path_expression)
    }

    /// Match a path, optionally qualified as `repository:workspace:/path`.
    pub fn matcher(&self, absolute_path: &str) -> Match {
        let input = RepositoryPath::parse(absolute_path);
        if !self.repository.accepts(input.repository_name())
            || !self.workspace.accepts(input.workspace_name())
        {
            return Match::no_match(input.path());
        }

        let path = input.path().trim_end_matches('/');
        let Some(captures) = self.match_pattern.captures(path) else {
            return Match::no_match(input.path());
        };
        let Some(selected) = self
            .select_pattern
            .captures(path)
            .and_then(|c| c.get(1))
            .map(|m| TRAILING_PROPERTY.replace(m.as_str(), "").into_owned())
        else {
            return Match::no_match(input.path());
        };

        Match {
            matches: true,
            input_path: input.path().to_string(),
            selected_node_path: Some(if selected.is_empty() {
                "/".to_string()
            } else {
                selected
            }),
            selected_repository_name: input.repository_name().map(str::to_string),
            selected_workspace_name: input.workspace_name().map(str::to_string),
            groups: captures
                .iter()
                .map(|g| g.map(|g| g.as_str().to_string()))
                .collect(),
        }
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for PathPattern {}

impl Hash for PathPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.expression.hash(state);
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl FromStr for PathPattern {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

/// The result of matching one path against a [`PathPattern`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    matches: bool,
    input_path: String,
    selected_node_path: Option<String>,
    selected_repository_name: Option<String>,
    selected_workspace_name: Option<String>,
    groups: Vec<Option<String>>,
}

impl Match {
    fn no_match(input_path: &str) -> Self {
        Self {
            matches: false,
            input_path: input_path.to_string(),
            selected_node_path: None,
            selected_repository_name: None,
            selected_workspace_name: None,
            groups: Vec::new(),
        }
    }

    pub fn matches(&self) -> bool {
        self.matches
    }

    /// The matched path, without any repository or workspace prefix.
    pub fn input_path(&self) -> &str {
        &self.input_path
    }

    /// The input path with the selection suffix stripped.
    pub fn selected_node_path(&self) -> Option<&str> {
        self.selected_node_path.as_deref()
    }

    pub fn selected_repository_name(&self) -> Option<&str> {
        self.selected_repository_name.as_deref()
    }

    pub fn selected_workspace_name(&self) -> Option<&str> {
        self.selected_workspace_name.as_deref()
    }

    /// Number of capturing groups in the pattern; zero when unmatched.
    pub fn group_count(&self) -> usize {
        self.groups.len().saturating_sub(1)
    }

    /// Text captured by a group. Group 0 is the whole matched path.
    ///
    /// Returns `None` for a group that did not take part in the match.
    pub fn group(&self, n: usize) -> Option<&str> {
        self.groups.get(n).and_then(|g| g.as_deref())
    }
}

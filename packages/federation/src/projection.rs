//! Projections: how one source's content appears in a federated workspace.

use std::fmt;
use std::fmt::Write as _;

use fedstore_core::{Error, Path};
use fedstore_path_expr::PathPattern;

/// Mounts one source subtree at a federated path.
///
/// The textual form is `<federated path> => <source path>`, optionally
/// followed by any number of ` $ <exception>` clauses. Exceptions are paths
/// relative to the source path whose content the rule does not project.
///
/// # Example
///
/// ```rust
/// use fedstore_core::path;
/// use fedstore_federation::ProjectionRule;
///
/// let rule = ProjectionRule::parse("/Aircraft => /Vehicles/Air $ drafts").unwrap();
/// assert_eq!(
///     rule.path_in_source(&path!("/Aircraft/B-52")),
///     Some(path!("/Vehicles/Air/B-52"))
/// );
/// assert_eq!(rule.path_in_source(&path!("/Aircraft/drafts/x")), None);
/// assert_eq!(rule.path_in_source(&path!("/Cars")), None);
/// ```
#[derive(Clone, Debug)]
pub struct ProjectionRule {
    mount: Path,
    source: Path,
    exceptions: Vec<Path>,
    /// Matches the mount and every path below it.
    pattern: PathPattern,
}

impl ProjectionRule {
    pub fn new(mount: Path, source: Path, exceptions: Vec<Path>) -> Result<Self, Error> {
        let pattern = PathPattern::compile(&mount_expression(&mount))?;
        Ok(ProjectionRule {
            mount,
            source,
            exceptions,
            pattern,
        })
    }

    /// A rule projecting `path` onto itself.
    pub fn mirror(path: Path) -> Result<Self, Error> {
        Self::new(path.clone(), path, Vec::new())
    }

    pub fn parse(definition: &str) -> Result<Self, Error> {
        let definition = definition.trim();
        let invalid = |message: &str| Error::InvalidProjection {
            rule: definition.to_string(),
            message: message.to_string(),
        };

        let (mount, rest) = definition
            .split_once("=>")
            .ok_or_else(|| invalid("expected '<federated path> => <source path>'"))?;
        let mut clauses = rest.split(" $ ");
        let source = clauses.next().unwrap_or_default().trim();
        let mount = mount.trim();
        if mount.is_empty() || source.is_empty() {
            return Err(invalid("both sides of '=>' must name a path"));
        }

        let parse_path = |s: &str| {
            Path::parse(s).map_err(|e| Error::InvalidProjection {
                rule: definition.to_string(),
                message: e.to_string(),
            })
        };
        let exceptions = clauses
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_path)
            .collect::<Result<Vec<_>, _>>()?;
        if exceptions.iter().any(Path::is_root) {
            return Err(invalid("an exception cannot exclude the whole source path"));
        }

        Self::new(parse_path(mount)?, parse_path(source)?, exceptions)
    }

    /// Where the content appears in the federated workspace.
    pub fn mount(&self) -> &Path {
        &self.mount
    }

    /// Where the content lives in the source.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn exceptions(&self) -> &[Path] {
        &self.exceptions
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn is_mirror(&self) -> bool {
        self.mount == self.source
    }

    /// True if `federated` is the mount or lies below it.
    pub fn covers(&self, federated: &Path) -> bool {
        self.pattern.matcher(&federated.to_string()).matches()
    }

    /// The source path projected at `federated`, if this rule projects it.
    pub fn path_in_source(&self, federated: &Path) -> Option<Path> {
        if !self.covers(federated) {
            return None;
        }
        let source = self.source.join(&federated.relative_to(&self.mount)?);
        self.includes(&source).then_some(source)
    }

    /// The federated path at which `source` appears, if this rule projects it.
    pub fn path_in_federation(&self, source: &Path) -> Option<Path> {
        if !self.includes(source) {
            return None;
        }
        Some(self.mount.join(&source.relative_to(&self.source)?))
    }

    fn includes(&self, source: &Path) -> bool {
        match source.relative_to(&self.source) {
            Some(relative) => !self
                .exceptions
                .iter()
                .any(|exception| !relative.is_root() && relative.is_at_or_below(exception)),
            None => false,
        }
    }
}

impl PartialEq for ProjectionRule {
    fn eq(&self, other: &Self) -> bool {
        self.mount == other.mount
            && self.source == other.source
            && self.exceptions == other.exceptions
    }
}

impl Eq for ProjectionRule {}

impl fmt::Display for ProjectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.mount, self.source)?;
        for exception in &self.exceptions {
            // Exceptions are relative; drop the leading slash of the display form.
            write!(f, " $ {}", &exception.to_string()[1..])?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ProjectionRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectionRule::parse(s)
    }
}

/// The path expression matching `mount` and all of its descendants.
fn mount_expression(mount: &Path) -> String {
    let mut expression = String::new();
    for segment in mount.iter() {
        expression.push('/');
        for c in segment.name().chars() {
            if matches!(c, '(' | ')' | '|' | '*' | '\\') {
                expression.push('\\');
            }
            expression.push(c);
        }
        if segment.index() > 1 {
            let _ = write!(expression, "[{}]", segment.index());
        }
    }
    expression.push_str("//");
    expression
}

/// The rules through which one source contributes to a workspace.
///
/// A projection's ordinal is its position in the workspace and decides
/// precedence; it is assigned by [`crate::FederatedWorkspace::new`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    ordinal: usize,
    source_name: String,
    workspace_name: Option<String>,
    read_only: bool,
    rules: Vec<ProjectionRule>,
    simple: bool,
}

impl Projection {
    /// `workspace_name` of `None` means the source's default workspace.
    pub fn new(
        source_name: impl Into<String>,
        workspace_name: Option<String>,
        read_only: bool,
        rules: Vec<ProjectionRule>,
    ) -> Result<Self, Error> {
        let source_name = source_name.into();
        if source_name.trim().is_empty() {
            return Err(Error::config("a projection must name its source"));
        }
        if rules.is_empty() {
            return Err(Error::config(format!(
                "projection of source '{}' has no rules",
                source_name
            )));
        }
        let simple = is_simple(&rules);
        Ok(Projection {
            ordinal: 0,
            source_name,
            workspace_name,
            read_only,
            rules,
            simple,
        })
    }

    /// Parse every rule definition and build the projection.
    pub fn parse<S: AsRef<str>>(
        source_name: impl Into<String>,
        workspace_name: Option<String>,
        read_only: bool,
        rules: &[S],
    ) -> Result<Self, Error> {
        let rules = rules
            .iter()
            .map(|rule| ProjectionRule::parse(rule.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(source_name, workspace_name, read_only, rules)
    }

    pub(crate) fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn workspace_name(&self) -> Option<&str> {
        self.workspace_name.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn rules(&self) -> &[ProjectionRule] {
        &self.rules
    }

    /// True if no two rules mount at or below each other, so that any
    /// federated path maps to at most one source path.
    pub fn is_simple(&self) -> bool {
        self.simple
    }

    /// The mount points of the rules, in rule order without duplicates.
    pub fn top_level_paths(&self) -> Vec<Path> {
        let mut paths: Vec<Path> = Vec::new();
        for rule in &self.rules {
            if !paths.contains(rule.mount()) {
                paths.push(rule.mount().clone());
            }
        }
        paths
    }

    pub fn is_top_level_path(&self, federated: &Path) -> bool {
        self.rules.iter().any(|rule| rule.mount() == federated)
    }
}

fn is_simple(rules: &[ProjectionRule]) -> bool {
    rules.iter().enumerate().all(|(i, rule)| {
        rules[i + 1..].iter().all(|other| {
            !rule.mount().is_at_or_below(other.mount())
                && !other.mount().is_at_or_below(rule.mount())
        })
    })
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source_name)?;
        if let Some(workspace) = &self.workspace_name {
            write!(f, ":{}", workspace)?;
        }
        let rules: Vec<String> = self.rules.iter().map(ToString::to_string).collect();
        write!(f, " {{ {} }}", rules.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedstore_core::path;

    #[test]
    fn parse_mirror_rule() {
        let rule = ProjectionRule::parse("/ => /").unwrap();
        assert!(rule.is_mirror());
        assert_eq!(rule.mount(), &Path::root());
        assert_eq!(rule.path_in_source(&path!("/a/b")), Some(path!("/a/b")));
        assert_eq!(rule.path_in_source(&Path::root()), Some(Path::root()));
        assert_eq!(rule.to_string(), "/ => /");
    }

    #[test]
    fn parse_branch_rule_with_exceptions() {
        let rule = ProjectionRule::parse("  /Aircraft => /Air $ drafts $ /old/stuff ").unwrap();
        assert!(!rule.is_mirror());
        assert_eq!(rule.exceptions(), &[path!("/drafts"), path!("/old/stuff")]);
        assert_eq!(rule.to_string(), "/Aircraft => /Air $ drafts $ old/stuff");

        assert_eq!(rule.path_in_source(&path!("/Aircraft")), Some(path!("/Air")));
        assert_eq!(rule.path_in_source(&path!("/Aircraft/old")), Some(path!("/Air/old")));
        assert_eq!(rule.path_in_source(&path!("/Aircraft/old/stuff/x")), None);
        assert_eq!(rule.path_in_source(&path!("/Aircraft2")), None);
    }

    #[test]
    fn parse_errors() {
        for bad in ["", "/a", "/a =>", "=> /a", "/a => /b[0]", "/a => /b $ /"] {
            assert!(
                matches!(ProjectionRule::parse(bad), Err(Error::InvalidProjection { .. })),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn rewrite_back_to_federation() {
        let rule = ProjectionRule::parse("/Aircraft => /Vehicles/Air $ drafts").unwrap();
        assert_eq!(
            rule.path_in_federation(&path!("/Vehicles/Air/B-52")),
            Some(path!("/Aircraft/B-52"))
        );
        assert_eq!(rule.path_in_federation(&path!("/Vehicles/Air")), Some(path!("/Aircraft")));
        assert_eq!(rule.path_in_federation(&path!("/Vehicles/Air/drafts")), None);
        assert_eq!(rule.path_in_federation(&path!("/Vehicles")), None);
    }

    #[test]
    fn mount_pattern_respects_indexes_and_specials() {
        let rule = ProjectionRule::mirror(path!("/a[2]/b(c)")).unwrap();
        assert!(rule.covers(&path!("/a[2]/b(c)")));
        assert!(rule.covers(&path!("/a[2]/b(c)/d[3]")));
        assert!(!rule.covers(&path!("/a/b(c)")));
        assert!(!rule.covers(&path!("/a[2]/bc")));
        assert_eq!(rule.pattern().expression(), r"/a[2]/b\(c\)//");
    }

    #[test]
    fn projection_requires_rules_and_source() {
        assert!(Projection::new("cars", None, false, vec![]).is_err());
        let rule = ProjectionRule::mirror(Path::root()).unwrap();
        assert!(Projection::new(" ", None, false, vec![rule]).is_err());
    }

    #[test]
    fn simple_projections() {
        let simple = Projection::parse("cars", None, false, &["/a => /x", "/b => /y"]).unwrap();
        assert!(simple.is_simple());
        assert_eq!(simple.top_level_paths(), vec![path!("/a"), path!("/b")]);
        assert!(simple.is_top_level_path(&path!("/b")));
        assert!(!simple.is_top_level_path(&path!("/b/c")));

        let nested = Projection::parse("cars", None, false, &["/a => /x", "/a/b => /y"]).unwrap();
        assert!(!nested.is_simple());

        let same = Projection::parse("cars", None, false, &["/a => /x", "/a => /y"]).unwrap();
        assert!(!same.is_simple());
        assert_eq!(same.top_level_paths(), vec![path!("/a")]);
    }

    #[test]
    fn projection_display() {
        let projection =
            Projection::parse("cars", Some("ws".into()), true, &["/a => /x", "/b => /x"]).unwrap();
        assert!(projection.is_read_only());
        assert_eq!(projection.workspace_name(), Some("ws"));
        assert_eq!(projection.to_string(), "cars:ws { /a => /x, /b => /x }");
    }
}

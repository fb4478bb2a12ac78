//! Federated workspaces and path resolution.

use std::time::Duration;

use fedstore_core::{Error, Path, PathTrie};

use crate::{Projection, ProjectionRule};

/// How long cached content stays valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    pub time_to_live: Duration,
}

impl CachePolicy {
    pub fn from_millis(millis: u64) -> Self {
        CachePolicy {
            time_to_live: Duration::from_millis(millis),
        }
    }
}

/// A projection holding cached copies of federated content.
///
/// The cache is recorded with the workspace and exposed to callers; reads
/// are not served from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheProjection {
    pub projection: Projection,
    pub policy: CachePolicy,
}

/// What a projection contributes at a resolved path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contribution {
    /// The projection owns the path and supplies its content.
    Full,
    /// The projection is mounted below the path, which must exist so the
    /// mount stays reachable.
    Placeholder,
}

/// One entry of a resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectedNode {
    pub ordinal: usize,
    pub source_name: String,
    pub workspace_name: Option<String>,
    pub read_only: bool,
    pub rule: ProjectionRule,
    /// For [`Contribution::Full`] the source path of the resolved path;
    /// for a placeholder the source path of the rule's mount.
    pub source_path: Path,
    pub contribution: Contribution,
}

impl ProjectedNode {
    fn new(
        projection: &Projection,
        rule: &ProjectionRule,
        source_path: Path,
        contribution: Contribution,
    ) -> Self {
        ProjectedNode {
            ordinal: projection.ordinal(),
            source_name: projection.source_name().to_string(),
            workspace_name: projection.workspace_name().map(str::to_string),
            read_only: projection.is_read_only(),
            rule: rule.clone(),
            source_path,
            contribution,
        }
    }

    pub fn mount(&self) -> &Path {
        self.rule.mount()
    }

    pub fn is_full(&self) -> bool {
        self.contribution == Contribution::Full
    }
}

/// Position of a rule within the workspace.
#[derive(Clone, Copy, Debug)]
struct RuleRef {
    projection: usize,
    rule: usize,
}

/// How many rules may share one mount point.
const RULES_PER_MOUNT: usize = 2;

/// A named, immutable set of projections presented as one namespace.
///
/// The first projection is the primary one. A path is owned by the rules
/// with the deepest mount at or above it that project it; rules mounted
/// further down only make their mount points visible. At most two rules
/// may share a mount point. Both then own the paths below it, and the
/// first declared one takes writes.
///
/// # Example
///
/// ```rust
/// use fedstore_core::path;
/// use fedstore_federation::{Contribution, FederatedWorkspace, Projection};
///
/// let workspace = FederatedWorkspace::new(
///     "main",
///     vec![
///         Projection::parse("cars", None, false, &["/ => /"]).unwrap(),
///         Projection::parse("planes", None, false, &["/Aircraft => /"]).unwrap(),
///     ],
///     None,
/// )
/// .unwrap();
///
/// let owner = workspace.owner(&path!("/Aircraft/B-52")).unwrap();
/// assert_eq!(owner.source_name, "planes");
/// assert_eq!(owner.source_path, path!("/B-52"));
///
/// let at_root = workspace.resolve(&path!("/")).unwrap();
/// assert_eq!(at_root[0].contribution, Contribution::Full);
/// assert_eq!(at_root[1].contribution, Contribution::Placeholder);
/// ```
#[derive(Debug)]
pub struct FederatedWorkspace {
    name: String,
    projections: Vec<Projection>,
    cache: Option<CacheProjection>,
    mounts: PathTrie<Vec<RuleRef>>,
}

impl FederatedWorkspace {
    pub fn new(
        name: impl Into<String>,
        projections: Vec<Projection>,
        cache: Option<CacheProjection>,
    ) -> Result<Self, Error> {
        let name = name.into();
        if projections.is_empty() {
            return Err(Error::config(format!(
                "workspace '{}' has no projections",
                name
            )));
        }

        let projections: Vec<Projection> = projections
            .into_iter()
            .enumerate()
            .map(|(ordinal, projection)| projection.with_ordinal(ordinal))
            .collect();

        let mut mounts: PathTrie<Vec<RuleRef>> = PathTrie::new();
        for (p, projection) in projections.iter().enumerate() {
            for (r, rule) in projection.rules().iter().enumerate() {
                let at = RuleRef {
                    projection: p,
                    rule: r,
                };
                match mounts.get_mut(rule.mount()) {
                    Some(shared) if shared.len() >= RULES_PER_MOUNT => {
                        return Err(Error::InvalidProjection {
                            rule: rule.to_string(),
                            message: format!(
                                "{} already has {} rules mounted in workspace '{}'",
                                rule.mount(),
                                RULES_PER_MOUNT,
                                name
                            ),
                        });
                    }
                    Some(shared) => shared.push(at),
                    None => {
                        mounts.insert(rule.mount(), vec![at]);
                    }
                }
            }
        }

        Ok(FederatedWorkspace {
            name,
            projections,
            cache,
            mounts,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    /// The primary projection.
    pub fn default_projection(&self) -> &Projection {
        &self.projections[0]
    }

    pub fn cache(&self) -> Option<&CacheProjection> {
        self.cache.as_ref()
    }

    /// Names of the sources this workspace draws from, in projection order.
    pub fn source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for projection in &self.projections {
            if !names.contains(&projection.source_name()) {
                names.push(projection.source_name());
            }
        }
        names
    }

    fn entry(&self, at: RuleRef) -> (&Projection, &ProjectionRule) {
        let projection = &self.projections[at.projection];
        (projection, &projection.rules()[at.rule])
    }

    /// The entries that own `path`, in declaration order.
    pub fn owners(&self, path: &Path) -> Vec<ProjectedNode> {
        let mut deepest = 0;
        let mut owners: Vec<ProjectedNode> = Vec::new();
        for projection in &self.projections {
            for rule in projection.rules() {
                let Some(source_path) = rule.path_in_source(path) else {
                    continue;
                };
                let depth = rule.mount().len();
                if depth < deepest {
                    continue;
                }
                if depth > deepest {
                    deepest = depth;
                    owners.clear();
                }
                owners.push(ProjectedNode::new(projection, rule, source_path, Contribution::Full));
            }
        }
        owners
    }

    /// The first declared owner of `path`, which takes its writes.
    pub fn owner(&self, path: &Path) -> Option<ProjectedNode> {
        self.owners(path).into_iter().next()
    }

    /// Entries for the rules mounted exactly at `path`, in declaration
    /// order. Each one's source path is the rule's source path.
    pub fn mounted_at(&self, path: &Path) -> Vec<ProjectedNode> {
        let Some(refs) = self.mounts.get(path) else {
            return Vec::new();
        };
        refs.iter()
            .map(|at| {
                let (projection, rule) = self.entry(*at);
                ProjectedNode::new(projection, rule, rule.source().clone(), Contribution::Full)
            })
            .collect()
    }

    /// Entries for the mounts strictly below `path`, in projection order.
    pub fn placeholders(&self, path: &Path) -> Vec<ProjectedNode> {
        let Some(below) = self.mounts.subtrie(path) else {
            return Vec::new();
        };
        let mut refs: Vec<RuleRef> = below
            .iter()
            .filter(|(relative, _)| !relative.is_root())
            .flat_map(|(_, shared)| shared.iter().copied())
            .collect();
        refs.sort_by_key(|at| (at.projection, at.rule));
        refs.into_iter()
            .map(|at| {
                let (projection, rule) = self.entry(at);
                ProjectedNode::new(
                    projection,
                    rule,
                    rule.source().clone(),
                    Contribution::Placeholder,
                )
            })
            .collect()
    }

    /// The children of `path` that exist because a mount lies at or below
    /// them.
    pub fn placeholder_children(&self, path: &Path) -> Vec<Path> {
        let mut children: Vec<Path> = Vec::new();
        for node in self.placeholders(path) {
            let child = node.mount().truncate(path.len() + 1);
            if !children.contains(&child) {
                children.push(child);
            }
        }
        children
    }

    /// True if `path` is a mount point or lies above one.
    pub fn is_placeholder(&self, path: &Path) -> bool {
        self.mounts.contains_value(path) || !self.placeholders(path).is_empty()
    }

    /// True if a rule is mounted at or below `path`. Content that the owner
    /// of an ancestor has at such a path is hidden.
    pub fn is_shadowed(&self, path: &Path) -> bool {
        self.mounts
            .subtrie(path)
            .map_or(false, |below| !below.is_empty())
    }

    /// Resolve a federated path into the entries that contribute to it:
    /// its owners, then a placeholder for each deeper mount, ordered by
    /// projection.
    ///
    /// Fails with [`Error::NoSourceForPath`] if nothing contributes.
    pub fn resolve(&self, path: &Path) -> Result<Vec<ProjectedNode>, Error> {
        let mut nodes = self.owners(path);
        nodes.extend(self.placeholders(path));
        nodes.sort_by_key(|node| node.ordinal);
        if nodes.is_empty() {
            return Err(Error::NoSourceForPath { path: path.clone() });
        }
        Ok(nodes)
    }
}

//! Absolute graph paths with same-name-sibling indexes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// One step of a [`Path`]: a node name plus its 1-based same-name-sibling
/// index.
///
/// The textual form omits the index when it is 1, so `b` and `b[1]` parse
/// to the same segment.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Segment {
    name: String,
    index: usize,
}

impl Segment {
    /// Build a segment from a bare name and an index.
    pub fn try_new(name: impl Into<String>, index: usize) -> Result<Self, Error> {
        let name = name.into();
        Self::validate_name(&name)?;
        if index == 0 {
            return Err(Error::invalid_path(format!(
                "same-name-sibling indexes start at 1: '{}'",
                name
            )));
        }
        Ok(Segment { name, index })
    }

    /// Parse `name` or `name[n]`.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let (name, index) = match s.strip_suffix(']').and_then(|s| s.split_once('[')) {
            Some((name, index)) => {
                let index: usize = index.parse().map_err(|_| {
                    Error::invalid_path(format!("invalid index in segment '{}'", s))
                })?;
                (name, index)
            }
            None => (s, 1),
        };
        Self::try_new(name, index)
    }

    fn validate_name(name: &str) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::invalid_path("empty segment name"));
        }
        if let Some(c) = name.chars().find(|c| matches!(c, '/' | '[' | ']')) {
            return Err(Error::invalid_path(format!(
                "invalid character '{}' in segment '{}'",
                c, name
            )));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 1 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.index)
        }
    }
}

/// An absolute path in a graph.
///
/// # Path Syntax
///
/// - Segments are separated by `/`; the leading `/` is optional
/// - Empty segments are ignored (normalizes `//` and trailing `/`)
/// - A segment may carry an index, as in `/a/b[2]`
///
/// # Examples
///
/// ```rust
/// use fedstore_core::Path;
///
/// let path = Path::parse("/cars/sports[2]/name").unwrap();
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.to_string(), "/cars/sports[2]/name");
///
/// assert!(Path::parse("/").unwrap().is_root());
/// ```
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The root path `/`.
    pub fn root() -> Self {
        Path::default()
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        let segments = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(Segment::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Path { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments; the root has none.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last_segment(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        if self.is_root() {
            return None;
        }
        Some(Path {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    #[must_use]
    pub fn child(&self, segment: Segment) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Path { segments }
    }

    #[must_use]
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Path { segments }
    }

    /// True if `ancestor` equals this path or is one of its ancestors.
    pub fn is_at_or_below(&self, ancestor: &Path) -> bool {
        ancestor.segments.len() <= self.segments.len()
            && ancestor.segments == self.segments[..ancestor.segments.len()]
    }

    /// True if this path is a strict ancestor of `descendant`.
    pub fn is_ancestor_of(&self, descendant: &Path) -> bool {
        self.len() < descendant.len() && descendant.is_at_or_below(self)
    }

    /// The remainder of this path below `ancestor`.
    ///
    /// Returns `None` if `ancestor` is not at or above this path.
    #[must_use]
    pub fn relative_to(&self, ancestor: &Path) -> Option<Path> {
        if self.is_at_or_below(ancestor) {
            Some(Path {
                segments: self.segments[ancestor.segments.len()..].to_vec(),
            })
        } else {
            None
        }
    }

    /// The first `depth` segments of this path.
    pub fn truncate(&self, depth: usize) -> Path {
        Path {
            segments: self.segments[..depth.min(self.segments.len())].to_vec(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Path::parse(&s)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl std::ops::Index<usize> for Path {
    type Output = Segment;

    fn index(&self, i: usize) -> &Self::Output {
        &self.segments[i]
    }
}

/// Macro for creating paths from literals.
///
/// # Example
///
/// ```rust
/// use fedstore_core::path;
///
/// let p = path!("/cars/sports");
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! path {
    ($s:expr) => {
        $crate::Path::parse($s).expect("invalid path literal")
    };
}

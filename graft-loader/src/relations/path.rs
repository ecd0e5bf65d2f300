//! The relation path language.
//!
//! A relation set is written as comma separated dot paths:
//!
//! ```text
//! author.profile,categories
//! ```
//!
//! or as a bare non-negative integer meaning "every field, N levels deep".
//! Input is parsed once into a tree whose nodes are the nested subsets, so
//! stepping into a field is a cheap shared clone.
//!
//! ```rust
//! use graft_loader::Relations;
//!
//! let relations = Relations::parse("author.profile, categories").unwrap();
//! assert!(relations.matches("author"));
//! assert_eq!(relations.nested("author").unwrap().to_string(), "profile");
//! assert!(relations.nested("categories").unwrap().is_empty());
//! assert!(relations.nested("comments").is_none());
//! ```

use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{LoadError, LoadResult};

/// A parsed set of relation paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relations {
    /// Explicit paths; each key maps to the subset requested below it.
    Paths(Arc<BTreeMap<SmolStr, Relations>>),
    /// Every field, this many levels deep.
    Depth(u32),
}

impl Relations {
    /// The empty set: resolve nothing.
    pub fn none() -> Self {
        Relations::Paths(Arc::default())
    }

    /// Every field, `levels` deep. Zero levels is the empty set.
    pub fn depth(levels: u32) -> Self {
        match levels {
            0 => Self::none(),
            levels => Relations::Depth(levels),
        }
    }

    /// Parse a relation string.
    pub fn parse(input: &str) -> LoadResult<Self> {
        let trimmed = input.trim();
        if let Ok(levels) = trimmed.parse::<u32>() {
            return Ok(Self::depth(levels));
        }
        Self::from_paths(trimmed.split(','))
    }

    /// Build a relation set from individual paths.
    pub fn from_paths<I, S>(paths: I) -> LoadResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = Node::default();

        for path in paths {
            let path = path.as_ref().trim();
            if path.is_empty() {
                continue;
            }
            if path.parse::<i64>().is_ok() {
                return Err(LoadError::malformed_relation_path(
                    path,
                    "a depth must be given on its own as a non-negative integer",
                ));
            }

            let mut node = &mut root;
            for segment in path.split('.') {
                validate_segment(path, segment)?;
                node = node.children.entry(SmolStr::new(segment)).or_default();
            }
        }

        Ok(root.freeze())
    }

    /// The subset to resolve below `field`, or `None` when `field` is not
    /// requested at all.
    pub fn nested(&self, field: &str) -> Option<Relations> {
        match self {
            Relations::Paths(children) => children.get(field).cloned(),
            Relations::Depth(0) => None,
            Relations::Depth(levels) => Some(Self::depth(levels.saturating_sub(1))),
        }
    }

    /// Whether `field` is requested.
    pub fn matches(&self, field: &str) -> bool {
        match self {
            Relations::Paths(children) => children.contains_key(field),
            Relations::Depth(levels) => *levels > 0,
        }
    }

    /// Whether nothing is requested.
    pub fn is_empty(&self) -> bool {
        match self {
            Relations::Paths(children) => children.is_empty(),
            Relations::Depth(levels) => *levels == 0,
        }
    }

    /// Top-level field names, for explicit paths.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        let children = match self {
            Relations::Paths(children) => Some(children.keys()),
            Relations::Depth(_) => None,
        };
        children.into_iter().flatten().map(SmolStr::as_str)
    }

    /// Canonical leaf paths, sorted. A depth renders as its number.
    pub fn to_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        match self {
            Relations::Depth(levels) => paths.push(levels.to_string()),
            Relations::Paths(children) => collect_paths(children, "", &mut paths),
        }
        paths
    }

    /// JSON form used in dedup keys: an array of paths, or the depth.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Relations::Depth(levels) => serde_json::Value::from(*levels),
            Relations::Paths(_) => serde_json::Value::from(self.to_paths()),
        }
    }

    /// Hash of the canonical form, for log correlation.
    ///
    /// Derived from BLAKE3, so it is the same across processes, platforms
    /// and toolchain releases.
    pub fn fingerprint(&self) -> u64 {
        let digest = blake3::hash(self.to_string().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(prefix)
    }
}

impl Default for Relations {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for Relations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_paths().join(","))
    }
}

impl FromStr for Relations {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_segment(path: &str, segment: &str) -> LoadResult<()> {
    if segment.is_empty() {
        return Err(LoadError::malformed_relation_path(path, "empty path segment"));
    }
    if segment.chars().any(char::is_whitespace) {
        return Err(LoadError::malformed_relation_path(
            path,
            format!("segment '{}' contains whitespace", segment),
        ));
    }
    if segment.contains('*') {
        return Err(LoadError::malformed_relation_path(
            path,
            "wildcards are not supported, use a depth instead",
        ));
    }
    Ok(())
}

fn collect_paths(children: &BTreeMap<SmolStr, Relations>, prefix: &str, out: &mut Vec<String>) {
    for (name, nested) in children {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        };
        match nested {
            Relations::Paths(grandchildren) if !grandchildren.is_empty() => {
                collect_paths(grandchildren, &path, out)
            }
            _ => out.push(path),
        }
    }
}

#[derive(Default)]
struct Node {
    children: BTreeMap<SmolStr, Node>,
}

impl Node {
    fn freeze(self) -> Relations {
        Relations::Paths(Arc::new(
            self.children
                .into_iter()
                .map(|(name, node)| (name, node.freeze()))
                .collect(),
        ))
    }
}

/// Conversion into a parsed [`Relations`] set.
pub trait IntoRelations {
    /// Parse or convert.
    fn into_relations(self) -> LoadResult<Relations>;
}

impl IntoRelations for Relations {
    fn into_relations(self) -> LoadResult<Relations> {
        Ok(self)
    }
}

impl IntoRelations for &Relations {
    fn into_relations(self) -> LoadResult<Relations> {
        Ok(self.clone())
    }
}

impl IntoRelations for &str {
    fn into_relations(self) -> LoadResult<Relations> {
        Relations::parse(self)
    }
}

impl IntoRelations for String {
    fn into_relations(self) -> LoadResult<Relations> {
        Relations::parse(&self)
    }
}

impl IntoRelations for &String {
    fn into_relations(self) -> LoadResult<Relations> {
        Relations::parse(self)
    }
}

impl IntoRelations for u32 {
    fn into_relations(self) -> LoadResult<Relations> {
        Ok(Relations::depth(self))
    }
}

impl IntoRelations for &[&str] {
    fn into_relations(self) -> LoadResult<Relations> {
        Relations::from_paths(self)
    }
}

impl<const N: usize> IntoRelations for [&str; N] {
    fn into_relations(self) -> LoadResult<Relations> {
        Relations::from_paths(self)
    }
}

impl IntoRelations for Vec<&str> {
    fn into_relations(self) -> LoadResult<Relations> {
        Relations::from_paths(self)
    }
}

impl IntoRelations for Vec<String> {
    fn into_relations(self) -> LoadResult<Relations> {
        Relations::from_paths(self)
    }
}

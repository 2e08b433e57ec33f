//! Dependency resolution
//!
//! Flattens a dependency graph into one version per package name using the
//! highest-compatible-version strategy:
//!
//! 1. **Collection** walks the graph depth-first from the root ranges and
//!    accumulates every range requested for each name. Edges are followed
//!    through a provisional version (the highest match for that one range).
//! 2. **Conflict resolution** picks, per name, the highest published version
//!    that satisfies every accumulated range.
//!
//! Resolution is all-or-nothing and keeps no state between calls.

use crate::range::{RangeError, VersionRange};
use crate::registry::{RegistryView, VersionRecord};
use semver::Version;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Rounds allowed before fixed-point traversal gives up
pub const MAX_FIXED_POINT_ROUNDS: usize = 16;

/// Errors that can occur during dependency resolution
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Name has no package record in the registry
    #[error("Package not found in registry: {name} (required by {required_by})")]
    UnknownPackage { name: String, required_by: Origin },

    /// No published version satisfies a single range
    #[error("No version of {name} satisfies {range}. Available: {}", .available.join(", "))]
    UnsatisfiableRange {
        name: String,
        range: String,
        available: Vec<String>,
    },

    /// No single version satisfies every accumulated range
    #[error(
        "Cannot resolve {name}: conflicting version ranges\n  {}\nAvailable versions: {}",
        format_requirements(.requirements),
        .available.join(", ")
    )]
    ConflictingRanges {
        name: String,
        requirements: Vec<Requirement>,
        available: Vec<String>,
    },

    /// A dependency range could not be parsed
    #[error("Invalid range for {name}: {source}")]
    InvalidRange {
        name: String,
        #[source]
        source: RangeError,
    },

    /// A published version string could not be parsed
    #[error("Invalid published version for {name}: {source}")]
    InvalidVersion {
        name: String,
        #[source]
        source: RangeError,
    },

    /// Fixed-point traversal kept changing its answer
    #[error("Resolution did not stabilise after {rounds} rounds")]
    Unstable { rounds: usize },
}

fn format_requirements(reqs: &[Requirement]) -> String {
    reqs.iter()
        .map(|r| format!("{} (from {})", r.range, r.required_by))
        .collect::<Vec<_>>()
        .join("\n  ")
}

/// How the collection pass picks the version whose dependencies it follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalMode {
    /// Follow the highest version matching each individual edge
    #[default]
    Provisional,

    /// Re-collect through the previously resolved versions until stable
    FixedPoint,
}

/// Who asked for a range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The project's own dependency list
    Root,

    /// A published package version
    Package { name: String, version: Version },
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Root => f.write_str("root"),
            Origin::Package { name, version } => write!(f, "{}@{}", name, version),
        }
    }
}

/// One accumulated range for a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub range: VersionRange,
    pub required_by: Origin,
}

/// Name -> ranges in first-encountered order
pub type RequirementSet = BTreeMap<String, Vec<Requirement>>;

/// Name -> selected version
pub type ResolvedSet = BTreeMap<String, Version>;

/// Outcome of a successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Selected version per name
    pub resolved: ResolvedSet,

    /// Every range that contributed to the selection
    pub requirements: RequirementSet,
}

impl Resolution {
    /// Number of resolved packages
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// True if nothing was resolved
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

/// Dependency resolver over a registry view
pub struct DependencyResolver<'a> {
    registry: &'a RegistryView,
    mode: TraversalMode,
}

impl<'a> DependencyResolver<'a> {
    /// Create a resolver using provisional traversal
    pub fn new(registry: &'a RegistryView) -> Self {
        Self {
            registry,
            mode: TraversalMode::Provisional,
        }
    }

    /// Set the traversal mode
    pub fn with_mode(mut self, mode: TraversalMode) -> Self {
        self.mode = mode;
        self
    }

    /// Resolve root ranges into a flat version selection
    pub fn resolve(&self, roots: &BTreeMap<String, String>) -> Result<Resolution, ResolverError> {
        if roots.is_empty() {
            return Ok(Resolution {
                resolved: BTreeMap::new(),
                requirements: BTreeMap::new(),
            });
        }

        let mut candidates = Candidates::new(self.registry);
        let mut resolution = self.round(roots, None, &mut candidates)?;

        if self.mode == TraversalMode::Provisional {
            return Ok(resolution);
        }

        for round in 1..=MAX_FIXED_POINT_ROUNDS {
            let next = self.round(roots, Some(&resolution.resolved), &mut candidates)?;
            if next.resolved == resolution.resolved {
                debug!(rounds = round, "resolution reached a fixed point");
                return Ok(next);
            }
            resolution = next;
        }

        Err(ResolverError::Unstable {
            rounds: MAX_FIXED_POINT_ROUNDS,
        })
    }

    /// One collection pass followed by one conflict pass
    fn round(
        &self,
        roots: &BTreeMap<String, String>,
        previous: Option<&ResolvedSet>,
        candidates: &mut Candidates<'a>,
    ) -> Result<Resolution, ResolverError> {
        let requirements = collect_requirements(roots, previous, candidates)?;
        let resolved = resolve_conflicts(&requirements, candidates)?;
        Ok(Resolution {
            resolved,
            requirements,
        })
    }
}

/// Parsed published versions per name, highest first
struct Candidates<'a> {
    registry: &'a RegistryView,
    parsed: HashMap<String, Vec<(Version, &'a VersionRecord)>>,
}

impl<'a> Candidates<'a> {
    fn new(registry: &'a RegistryView) -> Self {
        Self {
            registry,
            parsed: HashMap::new(),
        }
    }

    /// Published versions of a name, or `None` if the registry lacks it
    fn versions(
        &mut self,
        name: &str,
    ) -> Result<Option<&[(Version, &'a VersionRecord)]>, ResolverError> {
        if !self.parsed.contains_key(name) {
            let Some(record) = self.registry.get(name) else {
                return Ok(None);
            };
            let versions = record
                .parsed_versions()
                .map_err(|source| ResolverError::InvalidVersion {
                    name: name.to_string(),
                    source,
                })?
                .into_iter()
                .map(|(version, _, record)| (version, record))
                .collect();
            self.parsed.insert(name.to_string(), versions);
        }

        Ok(self.parsed.get(name).map(Vec::as_slice))
    }
}

fn version_strings(versions: &[(Version, &VersionRecord)]) -> Vec<String> {
    versions.iter().map(|(v, _)| v.to_string()).collect()
}

/// An edge still to be visited during collection
struct Edge {
    name: String,
    range: String,
    origin: Origin,
}

/// Depth-first collection of every range requested for every name
fn collect_requirements(
    roots: &BTreeMap<String, String>,
    previous: Option<&ResolvedSet>,
    candidates: &mut Candidates<'_>,
) -> Result<RequirementSet, ResolverError> {
    let mut requirements = RequirementSet::new();
    let mut visited: HashSet<String> = HashSet::new();

    // Reversed pushes keep pops in declaration order
    let mut stack: Vec<Edge> = roots
        .iter()
        .rev()
        .map(|(name, range)| Edge {
            name: name.clone(),
            range: range.clone(),
            origin: Origin::Root,
        })
        .collect();

    while let Some(edge) = stack.pop() {
        debug!(name = %edge.name, range = %edge.range, from = %edge.origin, "collecting requirement");

        let range =
            VersionRange::parse(&edge.range).map_err(|source| ResolverError::InvalidRange {
                name: edge.name.clone(),
                source,
            })?;

        requirements
            .entry(edge.name.clone())
            .or_default()
            .push(Requirement {
                range: range.clone(),
                required_by: edge.origin.clone(),
            });

        // This exact (name, range) edge was already expanded
        if !visited.insert(format!("{}@{}", edge.name, edge.range)) {
            continue;
        }

        let versions = candidates
            .versions(&edge.name)?
            .ok_or_else(|| ResolverError::UnknownPackage {
                name: edge.name.clone(),
                required_by: edge.origin.clone(),
            })?;

        let settled = previous
            .and_then(|p| p.get(&edge.name))
            .filter(|v| range.satisfies(v))
            .and_then(|v| versions.iter().find(|(candidate, _)| candidate == v));

        let chosen = settled
            .or_else(|| versions.iter().find(|(v, _)| range.satisfies(v)))
            .ok_or_else(|| ResolverError::UnsatisfiableRange {
                name: edge.name.clone(),
                range: edge.range.clone(),
                available: version_strings(versions),
            })?;

        let (version, record) = chosen;
        for (dep_name, dep_range) in record.dependencies.iter().rev() {
            stack.push(Edge {
                name: dep_name.clone(),
                range: dep_range.clone(),
                origin: Origin::Package {
                    name: edge.name.clone(),
                    version: version.clone(),
                },
            });
        }
    }

    Ok(requirements)
}

/// Pick the highest version satisfying every range for each name
fn resolve_conflicts(
    requirements: &RequirementSet,
    candidates: &mut Candidates<'_>,
) -> Result<ResolvedSet, ResolverError> {
    let mut resolved = ResolvedSet::new();

    for (name, reqs) in requirements {
        let versions = candidates
            .versions(name)?
            .ok_or_else(|| ResolverError::UnknownPackage {
                name: name.clone(),
                required_by: reqs
                    .first()
                    .map(|r| r.required_by.clone())
                    .unwrap_or(Origin::Root),
            })?;

        let selected = versions
            .iter()
            .map(|(v, _)| v)
            .find(|v| reqs.iter().all(|r| r.range.satisfies(v)))
            .ok_or_else(|| ResolverError::ConflictingRanges {
                name: name.clone(),
                requirements: reqs.clone(),
                available: version_strings(versions),
            })?;

        debug!(name = %name, version = %selected, ranges = reqs.len(), "resolved");
        resolved.insert(name.clone(), selected.clone());
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish(view: &mut RegistryView, name: &str, version: &str, deps: &[(&str, &str)]) {
        let mut record =
            VersionRecord::new(version, &format!("https://git.example.com/{}.git", name));
        for (dep, range) in deps {
            record = record.with_dependency(dep, range);
        }
        view.publish(name, record);
    }

    fn roots(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(n, r)| (n.to_string(), r.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_roots() {
        let view = RegistryView::new();
        let resolution = DependencyResolver::new(&view).resolve(&BTreeMap::new()).unwrap();
        assert!(resolution.is_empty());
    }

    #[test]
    fn test_transitive_highest_compatible() {
        let mut view = RegistryView::new();
        publish(&mut view, "a", "1.0.0", &[("b", "^2.0.0")]);
        publish(&mut view, "b", "2.3.0", &[]);
        publish(&mut view, "b", "2.5.0", &[]);
        publish(&mut view, "b", "3.0.0", &[]);

        let resolution = DependencyResolver::new(&view)
            .resolve(&roots(&[("a", "^1.0.0")]))
            .unwrap();

        assert_eq!(resolution.resolved["a"], Version::new(1, 0, 0));
        assert_eq!(resolution.resolved["b"], Version::new(2, 5, 0));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut view = RegistryView::new();
        publish(&mut view, "a", "1.0.0", &[("b", "^1.0.0")]);
        publish(&mut view, "b", "1.0.0", &[("a", "^1.0.0")]);

        let resolution = DependencyResolver::new(&view)
            .resolve(&roots(&[("a", "^1.0.0")]))
            .unwrap();

        assert_eq!(resolution.len(), 2);
        // root edge plus the edge back from b
        assert_eq!(resolution.requirements["a"].len(), 2);
    }

    #[test]
    fn test_unknown_transitive_package() {
        let mut view = RegistryView::new();
        publish(&mut view, "a", "1.0.0", &[("ghost", "*")]);

        let result = DependencyResolver::new(&view).resolve(&roots(&[("a", "*")]));
        match result {
            Err(ResolverError::UnknownPackage { name, required_by }) => {
                assert_eq!(name, "ghost");
                assert_eq!(required_by.to_string(), "a@1.0.0");
            }
            other => panic!("expected UnknownPackage, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_range() {
        let mut view = RegistryView::new();
        publish(&mut view, "a", "1.0.0", &[]);
        let result = DependencyResolver::new(&view).resolve(&roots(&[("a", "newest")]));
        assert!(matches!(result, Err(ResolverError::InvalidRange { .. })));
    }
}

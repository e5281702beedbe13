//! Shared state read by the host's handlers.
//!
//! Each holder has exactly one writer. Readers go through accessors that
//! return owned snapshots or `Arc`s, and writers replace whole entries, so a
//! reader iterating a snapshot never observes a half-applied update.
//!
//! | holder            | single writer                                  |
//! |-------------------|------------------------------------------------|
//! | [`ProjectCache`]  | the operation orchestrator and project refresh |
//! | [`SelectionState`]| install/uninstall handlers                     |
//! | [`SourcesCache`]  | the sources handler                            |
//! | [`DetailsCache`]  | the details handler (invalidated via the bus)  |

use crate::events::{
    CacheTransition, EventBus, PackageCacheInvalidated, ProjectCacheUpdated, SourcesChanged,
    Subscription,
};
use dotpack_proto::{PackageDetails, PackageSource, ProjectTarget};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// Everything discovery knows about one project file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectSnapshot {
    pub name: String,
    /// Absolute path to the project file.
    pub path: String,
    pub relative_path: String,
    pub frameworks: Vec<String>,
    /// Package references keyed by lowercased package id.
    pub packages: BTreeMap<String, String>,
}

impl ProjectSnapshot {
    /// Installed version of `package_id`, compared case-insensitively.
    #[must_use]
    pub fn installed_version(&self, package_id: &str) -> Option<&str> {
        self.packages
            .get(&package_id.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Project the snapshot onto the wire model.
    ///
    /// When `package_id` is given, `installed_version` reports that package.
    #[must_use]
    pub fn to_target(&self, package_id: Option<&str>) -> ProjectTarget {
        ProjectTarget {
            name: self.name.clone(),
            path: self.path.clone(),
            relative_path: self.relative_path.clone(),
            frameworks: self.frameworks.clone(),
            installed_version: package_id
                .and_then(|id| self.installed_version(id))
                .map(str::to_string),
        }
    }

    /// A copy with `package_id` set to `version`.
    #[must_use]
    pub fn with_package(&self, package_id: &str, version: &str) -> Self {
        let mut next = self.clone();
        next.packages
            .insert(package_id.to_ascii_lowercase(), version.to_string());
        next
    }

    /// A copy without `package_id`.
    #[must_use]
    pub fn without_package(&self, package_id: &str) -> Self {
        let mut next = self.clone();
        next.packages.remove(&package_id.to_ascii_lowercase());
        next
    }
}

/// Per-path project cache.
///
/// Two transitions write it: [`ProjectCache::apply_optimistic`] patches entries
/// from an operation's results before any re-scan, and
/// [`ProjectCache::reconcile`] replaces the whole set with a discovery pass.
/// Both publish [`ProjectCacheUpdated`] on the bus.
#[derive(Debug)]
pub struct ProjectCache {
    entries: RwLock<BTreeMap<String, Arc<ProjectSnapshot>>>,
    bus: EventBus,
}

impl ProjectCache {
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            bus,
        }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<Arc<ProjectSnapshot>> {
        read(&self.entries).get(path).cloned()
    }

    /// All entries, ordered by path.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<ProjectSnapshot>> {
        read(&self.entries).values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }

    /// Replace the given entries without touching any other path.
    ///
    /// Returns the paths that were written.
    pub fn apply_optimistic(&self, updates: Vec<ProjectSnapshot>) -> Vec<String> {
        if updates.is_empty() {
            return Vec::new();
        }

        let paths: Vec<String> = {
            let mut entries = write(&self.entries);
            updates
                .into_iter()
                .map(|snapshot| {
                    let path = snapshot.path.clone();
                    entries.insert(path.clone(), Arc::new(snapshot));
                    path
                })
                .collect()
        };

        debug!(count = paths.len(), "project cache: optimistic apply");
        self.bus.emit(&ProjectCacheUpdated {
            transition: CacheTransition::Optimistic,
            paths: paths.clone(),
        });
        paths
    }

    /// Replace the whole cache with an authoritative discovery result.
    ///
    /// Returns the paths that were added, removed, or whose contents differ.
    pub fn reconcile(&self, authoritative: Vec<ProjectSnapshot>) -> Vec<String> {
        let next: BTreeMap<String, Arc<ProjectSnapshot>> = authoritative
            .into_iter()
            .map(|s| (s.path.clone(), Arc::new(s)))
            .collect();

        let changed: Vec<String> = {
            let mut entries = write(&self.entries);
            let mut changed: BTreeSet<String> = BTreeSet::new();

            for (path, old) in entries.iter() {
                match next.get(path) {
                    Some(new) if new == old => {}
                    _ => {
                        changed.insert(path.clone());
                    }
                }
            }
            for path in next.keys() {
                if !entries.contains_key(path) {
                    changed.insert(path.clone());
                }
            }

            *entries = next;
            changed.into_iter().collect()
        };

        debug!(changed = changed.len(), "project cache: authoritative reconcile");
        self.bus.emit(&ProjectCacheUpdated {
            transition: CacheTransition::Authoritative,
            paths: changed.clone(),
        });
        changed
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Which projects the user last targeted for each package.
///
/// Keys are lowercased package ids. The UI uses this to pre-select projects
/// when the details view for a package is reopened.
#[derive(Debug, Default)]
pub struct SelectionState {
    selected: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl SelectionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths currently selected for `package_id`, ordered.
    #[must_use]
    pub fn selected(&self, package_id: &str) -> Vec<String> {
        read(&self.selected)
            .get(&package_id.to_ascii_lowercase())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_selected(&self, package_id: &str, path: &str) -> bool {
        read(&self.selected)
            .get(&package_id.to_ascii_lowercase())
            .is_some_and(|set| set.contains(path))
    }

    /// Replace the selection for `package_id`.
    pub fn replace(&self, package_id: &str, paths: impl IntoIterator<Item = String>) {
        let set: BTreeSet<String> = paths.into_iter().collect();
        let key = package_id.to_ascii_lowercase();
        let mut selected = write(&self.selected);
        if set.is_empty() {
            selected.remove(&key);
        } else {
            selected.insert(key, set);
        }
    }

    /// Drop every selected path that is not in `known_paths`.
    pub fn retain_known(&self, known_paths: &BTreeSet<String>) {
        let mut selected = write(&self.selected);
        for set in selected.values_mut() {
            set.retain(|p| known_paths.contains(p));
        }
        selected.retain(|_, set| !set.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Last known list of package sources.
#[derive(Debug)]
pub struct SourcesCache {
    sources: RwLock<Option<Vec<PackageSource>>>,
    bus: EventBus,
}

impl SourcesCache {
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self {
            sources: RwLock::new(None),
            bus,
        }
    }

    #[must_use]
    pub fn get(&self) -> Option<Vec<PackageSource>> {
        read(&self.sources).clone()
    }

    /// Store `sources`; emits [`SourcesChanged`] when they differ from the
    /// previous list. Returns whether anything changed.
    pub fn replace(&self, sources: Vec<PackageSource>) -> bool {
        let changed = {
            let mut current = write(&self.sources);
            let changed = current.as_ref().is_some_and(|old| *old != sources);
            *current = Some(sources);
            changed
        };

        if changed {
            debug!("package sources changed");
            self.bus.emit(&SourcesChanged);
        }
        changed
    }
}

// ---------------------------------------------------------------------------
// Details
// ---------------------------------------------------------------------------

/// Cache key for package details.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DetailsKey {
    /// Lowercased package id.
    pub package_id: String,
    pub version: Option<String>,
    pub source_id: Option<String>,
}

impl DetailsKey {
    #[must_use]
    pub fn new(package_id: &str, version: Option<&str>, source_id: Option<&str>) -> Self {
        Self {
            package_id: package_id.to_ascii_lowercase(),
            version: version.map(str::to_string),
            source_id: source_id.map(str::to_string),
        }
    }
}

/// Package details keyed by `(packageId, version, sourceId)`.
#[derive(Debug, Default)]
pub struct DetailsCache {
    entries: RwLock<HashMap<DetailsKey, Arc<PackageDetails>>>,
}

impl DetailsCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the bus events that invalidate entries.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Vec<Subscription> {
        let by_package = {
            let cache = Arc::clone(self);
            bus.on::<PackageCacheInvalidated, _>(move |event| {
                let removed = cache.invalidate_package(&event.package_id);
                debug!(package_id = %event.package_id, removed, "details cache invalidated");
            })
        };
        let all = {
            let cache = Arc::clone(self);
            bus.on::<SourcesChanged, _>(move |_| cache.clear())
        };
        vec![by_package, all]
    }

    #[must_use]
    pub fn get(&self, key: &DetailsKey) -> Option<Arc<PackageDetails>> {
        read(&self.entries).get(key).cloned()
    }

    pub fn put(&self, key: DetailsKey, details: PackageDetails) -> Arc<PackageDetails> {
        let details = Arc::new(details);
        write(&self.entries).insert(key, Arc::clone(&details));
        details
    }

    /// Drop every entry for `package_id`. Returns how many were removed.
    pub fn invalidate_package(&self, package_id: &str) -> usize {
        let id = package_id.to_ascii_lowercase();
        let mut entries = write(&self.entries);
        let before = entries.len();
        entries.retain(|k, _| k.package_id != id);
        before - entries.len()
    }

    pub fn clear(&self) {
        write(&self.entries).clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }
}

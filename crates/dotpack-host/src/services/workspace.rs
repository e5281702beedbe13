//! Filesystem project discovery.
//!
//! Walks the workspace root for `.csproj`, `.fsproj` and `.vbproj` files and
//! reads target frameworks and package references from each one. Build
//! output, dependency folders and dot-directories are skipped.

use super::ProjectDiscovery;
use async_trait::async_trait;
use dotpack_core::paths::relative_to;
use dotpack_core::state::ProjectSnapshot;
use dotpack_core::{AppError, AppResult};
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

const PROJECT_EXTENSIONS: &[&str] = &["csproj", "fsproj", "vbproj"];
const SKIP_DIRS: &[&str] = &["bin", "obj", "node_modules", "packages"];

/// Discovers projects under one workspace root.
#[derive(Debug, Clone)]
pub struct WorkspaceDiscovery {
    root: PathBuf,
    projects: Arc<RwLock<Vec<ProjectSnapshot>>>,
    initial: Arc<OnceCell<()>>,
}

impl WorkspaceDiscovery {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            projects: Arc::new(RwLock::new(Vec::new())),
            initial: Arc::new(OnceCell::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn scan_and_store(&self) -> AppResult<Vec<ProjectSnapshot>> {
        let root = self.root.clone();
        let projects = tokio::task::spawn_blocking(move || scan(&root))
            .await
            .map_err(|e| AppError::unknown("project scan panicked").with_cause(e))??;
        *self.projects.write().await = projects.clone();
        Ok(projects)
    }
}

#[async_trait]
impl ProjectDiscovery for WorkspaceDiscovery {
    async fn get_context(&self) -> AppResult<Vec<ProjectSnapshot>> {
        self.wait_for_discovery().await;
        Ok(self.projects.read().await.clone())
    }

    async fn wait_for_discovery(&self) {
        self.initial
            .get_or_init(|| async {
                if let Err(err) = self.scan_and_store().await {
                    warn!(root = %self.root.display(), error = %err, "initial discovery failed");
                }
            })
            .await;
    }

    async fn refresh(&self) -> AppResult<Vec<ProjectSnapshot>> {
        let projects = self.scan_and_store().await?;
        let _ = self.initial.set(());
        Ok(projects)
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIP_DIRS.iter().any(|d| name.eq_ignore_ascii_case(d))
}

fn is_project_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PROJECT_EXTENSIONS.iter().any(|p| ext.eq_ignore_ascii_case(p)))
}

/// Find and parse every project file under `root`, ordered by path.
pub fn scan(root: &Path) -> AppResult<Vec<ProjectSnapshot>> {
    if !root.is_dir() {
        return Err(AppError::not_found(root.display().to_string()));
    }

    let mut projects = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_project_file(entry.path()) {
            continue;
        }

        match std::fs::read_to_string(entry.path()) {
            Ok(text) => projects.push(parse_project(entry.path(), root, &text)),
            Err(err) => warn!(path = %entry.path().display(), error = %err, "cannot read project"),
        }
    }

    projects.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(root = %root.display(), count = projects.len(), "discovered projects");
    Ok(projects)
}

/// Patterns used to read project files.
struct Patterns {
    frameworks: Regex,
    reference: Regex,
    attr: Regex,
    child_version: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                frameworks: Regex::new(r"<TargetFrameworks?>\s*([^<]+?)\s*</TargetFrameworks?>").ok()?,
                reference: Regex::new(
                    r"(?s)<PackageReference\b([^>]*?)(/>|>(.*?)</PackageReference>)",
                )
                .ok()?,
                attr: Regex::new(r#"(\w+)\s*=\s*"([^"]*)""#).ok()?,
                child_version: Regex::new(r"<Version>\s*([^<]+?)\s*</Version>").ok()?,
            })
        })
        .as_ref()
}

/// Parse one project file.
pub fn parse_project(path: &Path, root: &Path, text: &str) -> ProjectSnapshot {
    let mut frameworks = Vec::new();
    let mut packages = BTreeMap::new();

    if let Some(re) = patterns() {
        for cap in re.frameworks.captures_iter(text) {
            frameworks.extend(
                cap[1]
                    .split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }

        for cap in re.reference.captures_iter(text) {
            let attrs: BTreeMap<&str, &str> = re
                .attr
                .captures_iter(cap.get(1).map_or("", |m| m.as_str()))
                .filter_map(|a| Some((a.get(1)?.as_str(), a.get(2)?.as_str())))
                .collect();

            let Some(id) = attrs.get("Include").or_else(|| attrs.get("Update")) else {
                continue;
            };
            let version = attrs.get("Version").map(|v| (*v).to_string()).or_else(|| {
                cap.get(3)
                    .and_then(|body| re.child_version.captures(body.as_str()))
                    .map(|c| c[1].to_string())
            });
            // Centrally managed versions have no Version attribute.
            packages.insert(id.to_ascii_lowercase(), version.unwrap_or_default());
        }
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    ProjectSnapshot {
        name,
        path: path.to_string_lossy().into_owned(),
        relative_path: relative_to(path, root),
        frameworks,
        packages,
    }
}

use crate::error::ConfigError;
use crate::paths;
use dotpack_proto::PackageSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Runtime configuration for the dotpack host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Directory scanned for project files.
    pub workspace_root: PathBuf,

    /// Quiet period before a search request is sent to the feed.
    pub search_debounce_ms: u64,

    /// Upper bound for one install/uninstall across all of its targets.
    pub operation_timeout_secs: u64,

    /// Results per search page.
    pub page_size: u32,

    /// Default for searches that do not say.
    pub include_prerelease: bool,

    pub sources: Vec<SourceConfig>,
}

/// One configured package feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    /// Service index URL.
    pub url: String,
    /// Search endpoint. Feeds without one cannot be searched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SourceConfig {
    /// The public nuget.org feed.
    #[must_use]
    pub fn nuget_org() -> Self {
        Self {
            id: "nuget.org".to_string(),
            name: "nuget.org".to_string(),
            url: "https://api.nuget.org/v3/index.json".to_string(),
            search_url: Some("https://azuresearch-usnc.nuget.org/query".to_string()),
            enabled: true,
        }
    }

    /// Wire form shown to the UI.
    #[must_use]
    pub fn to_source(&self) -> PackageSource {
        PackageSource {
            id: self.id.clone(),
            name: self.name.clone(),
            url: self.url.clone(),
            enabled: self.enabled,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            include_prerelease: false,
            sources: vec![SourceConfig::nuget_org()],
        }
    }
}

impl Config {
    /// Create a config rooted at `workspace_root` with default settings.
    #[must_use]
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            ..Default::default()
        }
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the platform config file is
    /// used when present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match paths::default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate one config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Reject settings the host cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operation_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "operationTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid(
                "pageSize must be greater than zero".to_string(),
            ));
        }
        let mut ids = std::collections::HashSet::new();
        for source in &self.sources {
            if !ids.insert(source.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source id: {}",
                    source.id
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Look up an enabled source by id, or the first enabled one.
    #[must_use]
    pub fn source(&self, id: Option<&str>) -> Option<&SourceConfig> {
        let mut enabled = self.sources.iter().filter(|s| s.enabled);
        match id {
            Some(id) => enabled.find(|s| s.id == id),
            None => enabled.next(),
        }
    }

    #[must_use]
    pub fn with_workspace_root(mut self, root: PathBuf) -> Self {
        self.workspace_root = root;
        self
    }

    #[must_use]
    pub fn with_search_debounce_ms(mut self, ms: u64) -> Self {
        self.search_debounce_ms = ms;
        self
    }

    #[must_use]
    pub fn with_operation_timeout_secs(mut self, secs: u64) -> Self {
        self.operation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_sources(mut self, sources: Vec<SourceConfig>) -> Self {
        self.sources = sources;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::new(PathBuf::from("/w"));
        assert_eq!(config.search_debounce(), Duration::from_millis(300));
        assert_eq!(config.operation_timeout(), Duration::from_secs(60));
        assert_eq!(config.page_size, 20);
        assert_eq!(config.source(None).map(|s| s.id.as_str()), Some("nuget.org"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "searchDebounceMs": 50, "workspaceRoot": "/src" }"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.search_debounce_ms, 50);
        assert_eq!(config.workspace_root, PathBuf::from("/src"));
        assert_eq!(config.operation_timeout_secs, 60);
        assert_eq!(config.sources, vec![SourceConfig::nuget_org()]);
    }

    #[test]
    fn test_missing_explicit_file_is_read_error() {
        let dir = tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ searchDebounceMs: ").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_timeout_and_duplicate_sources() {
        let err = Config::default()
            .with_operation_timeout_secs(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("operationTimeoutSecs"));

        let err = Config::default()
            .with_sources(vec![SourceConfig::nuget_org(), SourceConfig::nuget_org()])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate source id"));
    }

    #[test]
    fn test_source_lookup_skips_disabled() {
        let mut private = SourceConfig::nuget_org();
        private.id = "private".to_string();
        private.enabled = false;
        let config = Config::default().with_sources(vec![private, SourceConfig::nuget_org()]);

        assert!(config.source(Some("private")).is_none());
        assert_eq!(config.source(None).map(|s| s.id.as_str()), Some("nuget.org"));
        assert!(!config.sources[0].to_source().enabled);
    }
}

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Message types exchanged between the dotpack UI surface and the host.
//!
//! Requests travel UI → host as `{ "type": <tag>, "payload": {...} }`.
//! Responses travel host → UI wrapped in a notification envelope:
//! `{ "type": "notification", "name": <tag>, "args": {...} }`.
//!
//! ## Wire format
//! One JSON document per line (JSON lines). See [`encode_line`] and
//! [`decode_line`].
//!
//! Every correlated exchange carries a caller-generated `requestId` that the
//! host echoes verbatim in the matching response.

pub mod guards;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::io;

/// Protocol schema version. Bump when changing message format.
pub const PROTO_SCHEMA_VERSION: u32 = 1;

/// The constant `type` carried by every host → UI envelope.
pub const NOTIFICATION_TYPE: &str = "notification";

/// Maximum size of a single JSON line (16 MiB).
pub const MAX_LINE_SIZE: usize = 16 * 1024 * 1024;

/// Closed set of request tags (UI → host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Ready,
    SearchRequest,
    LoadMoreRequest,
    PackageDetailsRequest,
    GetProjects,
    RefreshProjectCache,
    InstallPackageRequest,
    UninstallPackageRequest,
    GetPackageSourcesRequest,
}

impl MessageType {
    pub const ALL: [MessageType; 9] = [
        MessageType::Ready,
        MessageType::SearchRequest,
        MessageType::LoadMoreRequest,
        MessageType::PackageDetailsRequest,
        MessageType::GetProjects,
        MessageType::RefreshProjectCache,
        MessageType::InstallPackageRequest,
        MessageType::UninstallPackageRequest,
        MessageType::GetPackageSourcesRequest,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::SearchRequest => "searchRequest",
            Self::LoadMoreRequest => "loadMoreRequest",
            Self::PackageDetailsRequest => "packageDetailsRequest",
            Self::GetProjects => "getProjects",
            Self::RefreshProjectCache => "refreshProjectCache",
            Self::InstallPackageRequest => "installPackageRequest",
            Self::UninstallPackageRequest => "uninstallPackageRequest",
            Self::GetPackageSourcesRequest => "getPackageSourcesRequest",
        }
    }

    /// Look up a tag. Returns `None` for anything outside the closed set.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    /// Whether the message must carry a `payload` object.
    ///
    /// Types whose payload fields are all optional accept a missing payload.
    #[must_use]
    pub fn payload_required(self) -> bool {
        matches!(
            self,
            Self::SearchRequest
                | Self::PackageDetailsRequest
                | Self::InstallPackageRequest
                | Self::UninstallPackageRequest
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of notification names (host → UI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationName {
    SearchResponse,
    GetProjectsResponse,
    PackageDetailsResponse,
    InstallPackageResponse,
    UninstallPackageResponse,
    PackageSourcesResponse,
    ProjectsChanged,
}

impl NotificationName {
    pub const ALL: [NotificationName; 7] = [
        NotificationName::SearchResponse,
        NotificationName::GetProjectsResponse,
        NotificationName::PackageDetailsResponse,
        NotificationName::InstallPackageResponse,
        NotificationName::UninstallPackageResponse,
        NotificationName::PackageSourcesResponse,
        NotificationName::ProjectsChanged,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SearchResponse => "searchResponse",
            Self::GetProjectsResponse => "getProjectsResponse",
            Self::PackageDetailsResponse => "packageDetailsResponse",
            Self::InstallPackageResponse => "installPackageResponse",
            Self::UninstallPackageResponse => "uninstallPackageResponse",
            Self::PackageSourcesResponse => "packageSourcesResponse",
            Self::ProjectsChanged => "projectsChanged",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == tag)
    }
}

impl fmt::Display for NotificationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Wire models
// ---------------------------------------------------------------------------

/// A project that packages can be installed into.
///
/// Built fresh on every listing; updates replace the owning entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTarget {
    pub name: String,
    /// Absolute path to the project file.
    pub path: String,
    /// Path relative to the workspace root.
    pub relative_path: String,
    pub frameworks: Vec<String>,
    /// Version of the requested package installed in this project, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
}

/// Serialized form of a host error.
///
/// `kind` decides which of the optional fields are meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Stable error code (e.g. `CLI_ERROR`).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Outcome of one operation against one target project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub target_path: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl OperationResult {
    #[must_use]
    pub fn succeeded(target_path: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(target_path: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            target_path: target_path.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// One logical operation applied across N targets.
///
/// `success` is true iff every entry in `results` succeeded. A failure that
/// happens before any target runs leaves `results` empty and sets `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateOperationResult {
    pub success: bool,
    pub results: Vec<OperationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl AggregateOperationResult {
    /// Fold per-target results into one verdict.
    #[must_use]
    pub fn from_results(results: Vec<OperationResult>) -> Self {
        Self {
            success: results.iter().all(|r| r.success),
            results,
            error: None,
        }
    }

    /// The orchestrator failed before producing any per-target result.
    #[must_use]
    pub fn aborted(error: ErrorInfo) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            error: Some(error),
        }
    }

    /// Targets that failed, in input order.
    pub fn failures(&self) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// A package feed the user can search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSource {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// A single search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSearchResult {
    pub id: String,
    /// Latest version matching the search's prerelease setting.
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub total_downloads: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersionInfo {
    pub version: String,
    #[serde(default)]
    pub downloads: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDependency {
    pub id: String,
    #[serde(default)]
    pub range: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGroup {
    pub target_framework: String,
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
}

/// Full metadata for one package version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDetails {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_downloads: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub versions: Vec<PackageVersionInfo>,
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroup>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Requests (UI → host)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_prerelease: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadMoreRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDetailsRequest {
    pub package_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Download count already known from search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_downloads: Option<u64>,
    /// Icon already known from search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetProjectsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// When set, each project reports the installed version of this package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshProjectCacheRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPackageRequest {
    pub package_id: String,
    pub version: String,
    pub project_paths: Vec<String>,
    pub request_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallPackageRequest {
    pub package_id: String,
    pub project_paths: Vec<String>,
    pub request_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPackageSourcesRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// A validated request from the UI surface.
///
/// Decode untrusted input with [`Request::admit`]; the serialized form is the
/// wire shape `{ "type": <tag>, "payload": {...} }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum Request {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "searchRequest")]
    Search(SearchRequest),
    #[serde(rename = "loadMoreRequest")]
    LoadMore(LoadMoreRequest),
    #[serde(rename = "packageDetailsRequest")]
    PackageDetails(PackageDetailsRequest),
    #[serde(rename = "getProjects")]
    GetProjects(GetProjectsRequest),
    #[serde(rename = "refreshProjectCache")]
    RefreshProjectCache(RefreshProjectCacheRequest),
    #[serde(rename = "installPackageRequest")]
    InstallPackage(InstallPackageRequest),
    #[serde(rename = "uninstallPackageRequest")]
    UninstallPackage(UninstallPackageRequest),
    #[serde(rename = "getPackageSourcesRequest")]
    GetPackageSources(GetPackageSourcesRequest),
}

/// Why a raw message was not admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The `type` field is missing or outside the closed set.
    UnknownType(Option<String>),
    /// The tag is known but the message failed its type guard or decoding.
    Malformed {
        message_type: MessageType,
        reason: String,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(Some(tag)) => write!(f, "unknown message type: {tag}"),
            Self::UnknownType(None) => f.write_str("message has no type tag"),
            Self::Malformed {
                message_type,
                reason,
            } => write!(f, "malformed {message_type}: {reason}"),
        }
    }
}

impl Request {
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Ready => MessageType::Ready,
            Self::Search(_) => MessageType::SearchRequest,
            Self::LoadMore(_) => MessageType::LoadMoreRequest,
            Self::PackageDetails(_) => MessageType::PackageDetailsRequest,
            Self::GetProjects(_) => MessageType::GetProjects,
            Self::RefreshProjectCache(_) => MessageType::RefreshProjectCache,
            Self::InstallPackage(_) => MessageType::InstallPackageRequest,
            Self::UninstallPackage(_) => MessageType::UninstallPackageRequest,
            Self::GetPackageSources(_) => MessageType::GetPackageSourcesRequest,
        }
    }

    /// Correlation id carried by the request, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Ready => None,
            Self::Search(r) => r.request_id.as_deref(),
            Self::LoadMore(r) => r.request_id.as_deref(),
            Self::PackageDetails(r) => r.request_id.as_deref(),
            Self::GetProjects(r) => r.request_id.as_deref(),
            Self::RefreshProjectCache(r) => r.request_id.as_deref(),
            Self::InstallPackage(r) => Some(&r.request_id),
            Self::UninstallPackage(r) => Some(&r.request_id),
            Self::GetPackageSources(r) => r.request_id.as_deref(),
        }
    }

    /// Admit an untrusted message.
    ///
    /// The message type is looked up first, then the type guard for that tag
    /// runs, and only then is the payload decoded.
    ///
    /// # Errors
    /// Returns a [`Rejection`] when the tag is unknown or the message fails
    /// validation.
    pub fn admit(raw: &Value) -> Result<Self, Rejection> {
        let tag = raw.get("type").and_then(Value::as_str);
        let Some(message_type) = tag.and_then(MessageType::from_tag) else {
            return Err(Rejection::UnknownType(tag.map(str::to_string)));
        };

        if !guards::guard_for(message_type)(raw) {
            return Err(Rejection::Malformed {
                message_type,
                reason: "failed type guard".to_string(),
            });
        }

        let payload = match raw.get("payload") {
            Some(p) => p.clone(),
            None => Value::Object(Map::new()),
        };

        let decoded = match message_type {
            MessageType::Ready => Ok(Self::Ready),
            MessageType::SearchRequest => serde_json::from_value(payload).map(Self::Search),
            MessageType::LoadMoreRequest => serde_json::from_value(payload).map(Self::LoadMore),
            MessageType::PackageDetailsRequest => {
                serde_json::from_value(payload).map(Self::PackageDetails)
            }
            MessageType::GetProjects => serde_json::from_value(payload).map(Self::GetProjects),
            MessageType::RefreshProjectCache => {
                serde_json::from_value(payload).map(Self::RefreshProjectCache)
            }
            MessageType::InstallPackageRequest => {
                serde_json::from_value(payload).map(Self::InstallPackage)
            }
            MessageType::UninstallPackageRequest => {
                serde_json::from_value(payload).map(Self::UninstallPackage)
            }
            MessageType::GetPackageSourcesRequest => {
                serde_json::from_value(payload).map(Self::GetPackageSources)
            }
        };

        decoded.map_err(|e| Rejection::Malformed {
            message_type,
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Notifications (host → UI)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<PackageSearchResult>,
    /// Number of results in this page.
    pub total_count: usize,
    /// Number of hits reported by the feed.
    pub total_hits: u64,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetProjectsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub projects: Vec<ProjectTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDetailsResponse {
    pub package_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PackageDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPackageResponse {
    pub package_id: String,
    pub version: String,
    pub success: bool,
    pub results: Vec<OperationResult>,
    /// Authoritative per-target state after the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_projects: Option<Vec<ProjectTarget>>,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallPackageResponse {
    pub package_id: String,
    pub success: bool,
    pub results: Vec<OperationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_projects: Option<Vec<ProjectTarget>>,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSourcesResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub sources: Vec<PackageSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsChanged {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_paths: Option<Vec<String>>,
}

/// A host → UI message.
///
/// Serialize through [`Notification::to_envelope`] to get the full
/// `{ "type": "notification", "name": ..., "args": ... }` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args")]
pub enum Notification {
    #[serde(rename = "searchResponse")]
    Search(SearchResponse),
    #[serde(rename = "getProjectsResponse")]
    GetProjects(GetProjectsResponse),
    #[serde(rename = "packageDetailsResponse")]
    PackageDetails(PackageDetailsResponse),
    #[serde(rename = "installPackageResponse")]
    InstallPackage(InstallPackageResponse),
    #[serde(rename = "uninstallPackageResponse")]
    UninstallPackage(UninstallPackageResponse),
    #[serde(rename = "packageSourcesResponse")]
    PackageSources(PackageSourcesResponse),
    #[serde(rename = "projectsChanged")]
    ProjectsChanged(ProjectsChanged),
}

impl Notification {
    #[must_use]
    pub fn name(&self) -> NotificationName {
        match self {
            Self::Search(_) => NotificationName::SearchResponse,
            Self::GetProjects(_) => NotificationName::GetProjectsResponse,
            Self::PackageDetails(_) => NotificationName::PackageDetailsResponse,
            Self::InstallPackage(_) => NotificationName::InstallPackageResponse,
            Self::UninstallPackage(_) => NotificationName::UninstallPackageResponse,
            Self::PackageSources(_) => NotificationName::PackageSourcesResponse,
            Self::ProjectsChanged(_) => NotificationName::ProjectsChanged,
        }
    }

    /// Echoed correlation id. `None` for unsolicited notifications.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Search(r) => r.request_id.as_deref(),
            Self::GetProjects(r) => r.request_id.as_deref(),
            Self::PackageDetails(r) => r.request_id.as_deref(),
            Self::InstallPackage(r) => Some(&r.request_id),
            Self::UninstallPackage(r) => Some(&r.request_id),
            Self::PackageSources(r) => r.request_id.as_deref(),
            Self::ProjectsChanged(_) => None,
        }
    }

    /// Wrap into the `{ type: "notification", name, args }` envelope.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_envelope(&self) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "type".to_string(),
                Value::String(NOTIFICATION_TYPE.to_string()),
            );
        }
        Ok(value)
    }

    /// Decode an envelope. Returns `None` if it fails the response guards.
    #[must_use]
    pub fn from_envelope(raw: &Value) -> Option<Self> {
        if !guards::is_notification(raw) {
            return None;
        }
        let mut value = raw.clone();
        if let Value::Object(map) = &mut value {
            map.remove("type");
        }
        serde_json::from_value(value).ok()
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Encode a message as one JSON line (terminated by `\n`).
///
/// # Errors
/// Returns an error if serialization fails or the line is too large.
pub fn encode_line<T: Serialize>(message: &T) -> io::Result<Vec<u8>> {
    let mut buf =
        serde_json::to_vec(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if buf.len() > MAX_LINE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line too large: {} bytes", buf.len()),
        ));
    }

    buf.push(b'\n');
    Ok(buf)
}

/// Decode one JSON line into an untyped value.
///
/// Admission into the host happens later through [`Request::admit`].
///
/// # Errors
/// Returns an error if the line is too large or not valid JSON.
pub fn decode_line(line: &str) -> io::Result<Value> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.len() > MAX_LINE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line too large: {} bytes", trimmed.len()),
        ));
    }
    serde_json::from_str(trimmed).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

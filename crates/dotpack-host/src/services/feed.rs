//! NuGet v3 search-service client.
//!
//! Searches go to the configured `searchUrl` of a source with
//! `q/skip/take/prerelease/semVerLevel` parameters. Details come from the
//! same endpoint with a `packageid:<id>` query. Every call races the
//! caller's cancellation token.

use super::{DetailsService, SearchOptions, SearchPage, SearchService};
use async_trait::async_trait;
use dotpack_core::config::SourceConfig;
use dotpack_core::{AppError, AppResult};
use dotpack_proto::{PackageDetails, PackageSearchResult, PackageVersionInfo};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const SEMVER_LEVEL: &str = "2.0.0";

/// Longest body excerpt kept in a parse error.
const MAX_RAW: usize = 512;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody {
    #[serde(default)]
    total_hits: u64,
    #[serde(default)]
    data: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Authors {
    One(String),
    Many(Vec<String>),
}

impl Default for Authors {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl Authors {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEntry {
    id: String,
    version: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    authors: Authors,
    #[serde(default)]
    total_downloads: u64,
    #[serde(default)]
    icon_url: Option<String>,
    #[serde(default)]
    project_url: Option<String>,
    #[serde(default)]
    license_url: Option<String>,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    versions: Vec<EntryVersion>,
}

#[derive(Debug, Deserialize)]
struct EntryVersion {
    version: String,
    #[serde(default)]
    downloads: u64,
}

impl SearchEntry {
    fn into_result(self) -> PackageSearchResult {
        PackageSearchResult {
            id: self.id,
            version: self.version,
            description: self.description,
            authors: self.authors.into_vec(),
            total_downloads: self.total_downloads,
            icon_url: self.icon_url.filter(|u| !u.is_empty()),
            verified: self.verified,
            tags: self.tags,
            versions: self.versions.into_iter().map(|v| v.version).collect(),
        }
    }

    /// Details for `version`, or the latest version when `None`.
    fn into_details(self, version: Option<&str>, source_id: &str) -> AppResult<PackageDetails> {
        let version = match version {
            None => self.version.clone(),
            Some(wanted) => self
                .versions
                .iter()
                .find(|v| v.version.eq_ignore_ascii_case(wanted))
                .map(|v| v.version.clone())
                .ok_or_else(|| AppError::not_found(format!("{} {wanted}", self.id)))?,
        };

        Ok(PackageDetails {
            id: self.id,
            version,
            title: self.title.filter(|t| !t.is_empty()),
            description: self.description,
            authors: self.authors.into_vec(),
            project_url: self.project_url.filter(|u| !u.is_empty()),
            license_url: self.license_url.filter(|u| !u.is_empty()),
            icon_url: self.icon_url.filter(|u| !u.is_empty()),
            total_downloads: Some(self.total_downloads),
            tags: self.tags,
            versions: self
                .versions
                .into_iter()
                .rev()
                .map(|v| PackageVersionInfo {
                    version: v.version,
                    downloads: v.downloads,
                })
                .collect(),
            dependency_groups: Vec::new(),
            verified: self.verified,
            source_id: Some(source_id.to_string()),
        })
    }
}

/// Where the last search left off.
#[derive(Debug, Clone)]
struct Cursor {
    query: String,
    options: SearchOptions,
}

/// Client for the search endpoints of the configured sources.
#[derive(Debug)]
pub struct NuGetFeed {
    http: Client,
    sources: Vec<SourceConfig>,
    cursor: Mutex<Option<Cursor>>,
}

impl NuGetFeed {
    /// Create a client for `sources`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(sources: Vec<SourceConfig>) -> AppResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("dotpack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::unknown("failed to create HTTP client").with_cause(e))?;

        Ok(Self {
            http,
            sources,
            cursor: Mutex::new(None),
        })
    }

    /// The enabled, searchable source with `id`, or the first one.
    fn endpoint(&self, id: Option<&str>) -> AppResult<(&str, &str)> {
        self.sources
            .iter()
            .filter(|s| s.enabled)
            .filter(|s| id.map_or(true, |id| s.id == id))
            .find_map(|s| s.search_url.as_deref().map(|url| (s.id.as_str(), url)))
            .ok_or_else(|| AppError::not_found(format!("source {}", id.unwrap_or("<default>"))))
    }

    fn set_cursor(&self, cursor: Option<Cursor>) {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = cursor;
    }

    async fn query(
        &self,
        url: &str,
        params: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> AppResult<SearchBody> {
        tokio::select! {
            () = cancel.cancelled() => Err(AppError::cancelled()),
            body = self.fetch(url, params) => body,
        }
    }

    async fn fetch(&self, url: &str, params: &[(&str, String)]) -> AppResult<SearchBody> {
        debug!(url, ?params, "feed query");
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if let Some(err) = status_error(status, response.headers(), url) {
            return Err(err);
        }

        let text = response.text().await.map_err(transport_error)?;
        serde_json::from_str(&text).map_err(|e| AppError::parse(e.to_string(), Some(excerpt(&text))))
    }

    async fn page(
        &self,
        query: &str,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> AppResult<SearchPage> {
        let (_, url) = self.endpoint(options.source_id.as_deref())?;
        let params = [
            ("q", query.to_string()),
            ("skip", options.skip.to_string()),
            ("take", options.take.to_string()),
            ("prerelease", options.prerelease.to_string()),
            ("semVerLevel", SEMVER_LEVEL.to_string()),
        ];
        let body = self.query(url, &params, cancel).await?;
        Ok(to_page(body, options.skip))
    }
}

fn to_page(body: SearchBody, skip: u32) -> SearchPage {
    let packages: Vec<PackageSearchResult> =
        body.data.into_iter().map(SearchEntry::into_result).collect();
    let seen = u64::from(skip) + packages.len() as u64;
    SearchPage {
        has_more: !packages.is_empty() && seen < body.total_hits,
        total_hits: body.total_hits,
        packages,
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    let message = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    AppError::network(message).with_cause(err)
}

/// Map a non-success status to the error taxonomy.
fn status_error(status: StatusCode, headers: &reqwest::header::HeaderMap, url: &str) -> Option<AppError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::TOO_MANY_REQUESTS => AppError::rate_limit(
            headers
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
        ),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::auth_required(format!("configure credentials for {url}"))
        }
        StatusCode::NOT_FOUND => AppError::not_found(url.to_string()),
        other => AppError::api(other.as_u16(), format!("feed returned {other}")),
    })
}

fn excerpt(text: &str) -> String {
    let mut end = text.len().min(MAX_RAW);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[async_trait]
impl SearchService for NuGetFeed {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
        cancel: CancellationToken,
    ) -> AppResult<SearchPage> {
        let page = self.page(query, options, &cancel).await?;
        let mut next = options.clone();
        next.skip = options.skip.saturating_add(options.take);
        self.set_cursor(Some(Cursor {
            query: query.to_string(),
            options: next,
        }));
        Ok(page)
    }

    async fn load_next_page(&self, cancel: CancellationToken) -> AppResult<SearchPage> {
        let cursor = self
            .cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| AppError::validation("query", "no search to continue"))?;

        let page = self.page(&cursor.query, &cursor.options, &cancel).await?;
        let mut next = cursor.options.clone();
        next.skip = next.skip.saturating_add(next.take);
        self.set_cursor(Some(Cursor {
            query: cursor.query,
            options: next,
        }));
        Ok(page)
    }
}

#[async_trait]
impl DetailsService for NuGetFeed {
    async fn get_package_details(
        &self,
        package_id: &str,
        version: Option<&str>,
        cancel: CancellationToken,
        source_id: Option<&str>,
    ) -> AppResult<PackageDetails> {
        let (source, url) = self.endpoint(source_id)?;
        let params = [
            ("q", format!("packageid:{package_id}")),
            ("take", "1".to_string()),
            ("prerelease", "true".to_string()),
            ("semVerLevel", SEMVER_LEVEL.to_string()),
        ];
        let body = self.query(url, &params, &cancel).await?;

        body.data
            .into_iter()
            .find(|e| e.id.eq_ignore_ascii_case(package_id))
            .ok_or_else(|| AppError::not_found(package_id.to_string()))?
            .into_details(version, source)
    }
}

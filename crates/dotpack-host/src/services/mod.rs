//! Collaborator contracts consumed by the handlers.
//!
//! Each trait is narrow: the handlers only need what is declared here, and
//! tests substitute in-memory fakes. Every long-running call receives a
//! [`CancellationToken`]; implementations should stop early when it fires,
//! but callers never rely on that and drop late results themselves.

pub mod dotnet;
pub mod feed;
pub mod sources;
pub mod workspace;

pub use dotnet::DotnetExecutor;
pub use feed::NuGetFeed;
pub use sources::ConfiguredSources;
pub use workspace::WorkspaceDiscovery;

use crate::orchestrator::Operation;
use async_trait::async_trait;
use dotpack_core::state::ProjectSnapshot;
use dotpack_core::AppResult;
use dotpack_proto::{PackageDetails, PackageSearchResult, PackageSource};
use tokio_util::sync::CancellationToken;

/// Options for one search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchOptions {
    pub prerelease: bool,
    pub source_id: Option<String>,
    pub skip: u32,
    pub take: u32,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPage {
    pub packages: Vec<PackageSearchResult>,
    pub total_hits: u64,
    pub has_more: bool,
}

#[async_trait]
pub trait SearchService: Send + Sync {
    /// Start a new search. The service remembers it for [`Self::load_next_page`].
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
        cancel: CancellationToken,
    ) -> AppResult<SearchPage>;

    /// The page after the last one returned for the current search.
    async fn load_next_page(&self, cancel: CancellationToken) -> AppResult<SearchPage>;
}

#[async_trait]
pub trait DetailsService: Send + Sync {
    async fn get_package_details(
        &self,
        package_id: &str,
        version: Option<&str>,
        cancel: CancellationToken,
        source_id: Option<&str>,
    ) -> AppResult<PackageDetails>;
}

#[async_trait]
pub trait ProjectDiscovery: Send + Sync {
    /// Projects from the most recent discovery pass.
    async fn get_context(&self) -> AppResult<Vec<ProjectSnapshot>>;

    /// Resolves once the initial discovery pass has finished.
    async fn wait_for_discovery(&self);

    /// Run a fresh discovery pass and return its result.
    async fn refresh(&self) -> AppResult<Vec<ProjectSnapshot>>;
}

/// Runs one install/uninstall against one project.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Checked once before any target runs.
    async fn preflight(&self) -> AppResult<()> {
        Ok(())
    }

    async fn run(
        &self,
        operation: &Operation,
        project_path: &str,
        cancel: CancellationToken,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn list_sources(&self) -> AppResult<Vec<PackageSource>>;
}

//! End-to-end tests for the mediator with in-memory collaborators.

use async_trait::async_trait;
use dotpack_core::state::ProjectSnapshot;
use dotpack_core::{AppError, AppResult, Channel, Config, ErrorKind, StaleGuard, Verdict};
use dotpack_host::services::{
    DetailsService, OperationExecutor, ProjectDiscovery, SearchOptions, SearchPage, SearchService,
    SourceProvider,
};
use dotpack_host::{HostContext, Mediator, Operation, RecordingSink, Services};
use dotpack_proto::{
    Notification, NotificationName, PackageDetails, PackageSearchResult, PackageSource,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Answers every query after `latency`, ignoring cancellation. The next
/// page continues whichever query last completed.
struct FakeSearch {
    latency: Duration,
    queries: Mutex<Vec<String>>,
    cursor: Mutex<Option<String>>,
    pages: Mutex<Vec<String>>,
}

impl FakeSearch {
    fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            queries: Mutex::new(Vec::new()),
            cursor: Mutex::new(None),
            pages: Mutex::new(Vec::new()),
        })
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn pages(&self) -> Vec<String> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchService for FakeSearch {
    async fn search(
        &self,
        query: &str,
        _options: &SearchOptions,
        _cancel: CancellationToken,
    ) -> AppResult<SearchPage> {
        self.queries.lock().unwrap().push(query.to_string());
        tokio::time::sleep(self.latency).await;
        *self.cursor.lock().unwrap() = Some(query.to_string());
        Ok(SearchPage {
            packages: vec![PackageSearchResult {
                id: format!("{query}.Package"),
                version: "1.0.0".to_string(),
                ..Default::default()
            }],
            total_hits: 1,
            has_more: false,
        })
    }

    async fn load_next_page(&self, _cancel: CancellationToken) -> AppResult<SearchPage> {
        let Some(query) = self.cursor.lock().unwrap().clone() else {
            return Ok(SearchPage::default());
        };
        self.pages.lock().unwrap().push(query.clone());
        Ok(SearchPage {
            packages: vec![PackageSearchResult {
                id: format!("{query}.2"),
                version: "1.0.0".to_string(),
                ..Default::default()
            }],
            total_hits: 2,
            has_more: false,
        })
    }
}

#[derive(Default)]
struct FakeDetails {
    calls: AtomicUsize,
}

#[async_trait]
impl DetailsService for FakeDetails {
    async fn get_package_details(
        &self,
        package_id: &str,
        version: Option<&str>,
        _cancel: CancellationToken,
        _source_id: Option<&str>,
    ) -> AppResult<PackageDetails> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if package_id == "Missing" {
            return Err(AppError::not_found(package_id));
        }
        Ok(PackageDetails {
            id: package_id.to_string(),
            version: version.unwrap_or("2.0.0").to_string(),
            ..Default::default()
        })
    }
}

struct FakeDiscovery {
    projects: Mutex<Vec<ProjectSnapshot>>,
}

impl FakeDiscovery {
    fn new(projects: Vec<ProjectSnapshot>) -> Arc<Self> {
        Arc::new(Self {
            projects: Mutex::new(projects),
        })
    }

    fn set(&self, projects: Vec<ProjectSnapshot>) {
        *self.projects.lock().unwrap() = projects;
    }
}

#[async_trait]
impl ProjectDiscovery for FakeDiscovery {
    async fn get_context(&self) -> AppResult<Vec<ProjectSnapshot>> {
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn wait_for_discovery(&self) {}

    async fn refresh(&self) -> AppResult<Vec<ProjectSnapshot>> {
        self.get_context().await
    }
}

/// Fails for every path in `failing`.
#[derive(Default)]
struct FakeExecutor {
    failing: Vec<String>,
    ran: Mutex<Vec<String>>,
}

#[async_trait]
impl OperationExecutor for FakeExecutor {
    async fn run(
        &self,
        _operation: &Operation,
        project_path: &str,
        _cancel: CancellationToken,
    ) -> AppResult<()> {
        self.ran.lock().unwrap().push(project_path.to_string());
        if self.failing.iter().any(|p| p == project_path) {
            return Err(AppError::cli(Some(1), "error NU1101: package not found"));
        }
        Ok(())
    }
}

struct FakeSources;

#[async_trait]
impl SourceProvider for FakeSources {
    async fn list_sources(&self) -> AppResult<Vec<PackageSource>> {
        Ok(vec![PackageSource {
            id: "nuget.org".to_string(),
            name: "nuget.org".to_string(),
            url: "https://api.nuget.org/v3/index.json".to_string(),
            enabled: true,
        }])
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn project(path: &str, packages: &[(&str, &str)]) -> ProjectSnapshot {
    ProjectSnapshot {
        name: path.trim_start_matches('/').to_string(),
        path: path.to_string(),
        relative_path: path.trim_start_matches('/').to_string(),
        frameworks: vec!["net8.0".to_string()],
        packages: packages
            .iter()
            .map(|(id, v)| (id.to_ascii_lowercase(), (*v).to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn host(services: Services) -> (Mediator, RecordingSink) {
    let sink = RecordingSink::new();
    let ctx = HostContext::new(Config::default(), Arc::new(sink.clone()), services);
    (Mediator::new(ctx), sink)
}

fn message(tag: &str, payload: Value) -> Value {
    json!({ "type": tag, "payload": payload })
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_type_posts_nothing() {
    let (mediator, sink) = host(Services::new().with_sources(Arc::new(FakeSources)));

    mediator.dispatch(&json!({ "type": "deletePackage" })).await;
    mediator.dispatch(&json!({ "payload": {} })).await;
    mediator.dispatch(&json!("ready")).await;

    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_malformed_message_posts_nothing() {
    let executor = Arc::new(FakeExecutor::default());
    let (mediator, sink) = host(Services::new().with_executor(executor.clone()));

    // Missing version and requestId.
    mediator
        .dispatch(&message(
            "installPackageRequest",
            json!({ "packageId": "Serilog", "projectPaths": ["/a"] }),
        ))
        .await;

    assert!(sink.is_empty());
    assert!(executor.ran.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_service_posts_nothing() {
    let (mediator, sink) = host(Services::new());

    mediator.dispatch(&json!({ "type": "ready" })).await;
    mediator
        .dispatch(&message(
            "uninstallPackageRequest",
            json!({ "packageId": "Serilog", "projectPaths": ["/a"], "requestId": "u1" }),
        ))
        .await;

    assert!(sink.is_empty());
}

// ---------------------------------------------------------------------------
// Search and details
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_rapid_searches_answer_only_the_last() {
    let search = FakeSearch::new(Duration::from_millis(10));
    let (mediator, sink) = host(Services::new().with_search(search.clone()));
    let mut guard = StaleGuard::new();

    let r1 = guard.issue(Channel::Search);
    mediator
        .dispatch(&message("searchRequest", json!({ "query": "ser", "requestId": r1 })))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let r2 = guard.issue(Channel::Search);
    mediator
        .dispatch(&message("searchRequest", json!({ "query": "serilog", "requestId": r2 })))
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(search.queries(), vec!["serilog"]);
    let posted = sink.named(NotificationName::SearchResponse);
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].request_id(), Some(r2.as_str()));
    assert_eq!(guard.accept_notification(&posted[0]), Verdict::Accepted);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_search_result_is_dropped_when_superseded() {
    let search = FakeSearch::new(Duration::from_millis(500));
    let (mediator, sink) = host(Services::new().with_search(search.clone()));

    mediator
        .dispatch(&message("searchRequest", json!({ "query": "a", "requestId": "r1" })))
        .await;
    // Past the debounce window: the first search is now in flight.
    tokio::time::sleep(Duration::from_millis(400)).await;
    mediator
        .dispatch(&message("searchRequest", json!({ "query": "b", "requestId": "r2" })))
        .await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(search.queries(), vec!["a", "b"]);
    let ids: Vec<_> = sink
        .named(NotificationName::SearchResponse)
        .iter()
        .map(|n| n.request_id().map(str::to_string))
        .collect();
    assert_eq!(ids, vec![Some("r2".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_load_more_without_search_reports_validation() {
    let search = FakeSearch::new(Duration::ZERO);
    let (mediator, sink) = host(Services::new().with_search(search));

    mediator
        .dispatch(&message("loadMoreRequest", json!({ "requestId": "m1" })))
        .await;

    let posted = sink.named(NotificationName::SearchResponse);
    assert_eq!(posted.len(), 1);
    match &posted[0] {
        Notification::Search(response) => {
            let error = response.error.as_ref().unwrap();
            assert_eq!(error.kind, ErrorKind::Validation.as_str());
            assert_eq!(error.field.as_deref(), Some("query"));
        }
        other => panic!("Expected searchResponse, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_load_more_waits_for_pending_search() {
    let search = FakeSearch::new(Duration::from_millis(10));
    let (mediator, sink) = host(Services::new().with_search(search.clone()));

    mediator
        .dispatch(&message("searchRequest", json!({ "query": "old", "requestId": "r1" })))
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    mediator
        .dispatch(&message("searchRequest", json!({ "query": "new", "requestId": "r2" })))
        .await;
    mediator
        .dispatch(&message("loadMoreRequest", json!({ "requestId": "m1" })))
        .await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    mediator
        .dispatch(&message("loadMoreRequest", json!({ "requestId": "m2" })))
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(search.queries(), vec!["old", "new"]);
    assert_eq!(search.pages(), vec!["new"]);

    let responses: Vec<_> = sink
        .named(NotificationName::SearchResponse)
        .into_iter()
        .map(|n| match n {
            Notification::Search(response) => response,
            other => panic!("Expected searchResponse, got {other:?}"),
        })
        .collect();
    let ids: Vec<_> = responses.iter().map(|r| r.request_id.as_deref()).collect();
    assert_eq!(ids, vec![Some("r1"), Some("m1"), Some("r2"), Some("m2")]);

    let refused = responses[1].error.as_ref().unwrap();
    assert_eq!(refused.kind, ErrorKind::Validation.as_str());
    assert_eq!(responses[2].query, "new");
    assert_eq!(responses[2].results[0].id, "new.Package");
    assert_eq!(responses[3].query, "new");
    assert_eq!(responses[3].results[0].id, "new.2");
}

#[tokio::test(start_paused = true)]
async fn test_details_use_hints_and_cache() {
    let details = Arc::new(FakeDetails::default());
    let (mediator, sink) = host(Services::new().with_details(details.clone()));

    let request = |id: &str| {
        message(
            "packageDetailsRequest",
            json!({
                "packageId": "Serilog",
                "version": "3.1.1",
                "requestId": id,
                "totalDownloads": 1234,
                "iconUrl": "https://example.org/serilog.png"
            }),
        )
    };

    mediator.dispatch(&request("d1")).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    mediator.dispatch(&request("d2")).await;

    assert_eq!(details.calls.load(Ordering::SeqCst), 1);
    let posted = sink.named(NotificationName::PackageDetailsResponse);
    assert_eq!(posted.len(), 2);
    for (notification, id) in posted.iter().zip(["d1", "d2"]) {
        match notification {
            Notification::PackageDetails(response) => {
                assert_eq!(response.request_id.as_deref(), Some(id));
                let data = response.data.as_ref().unwrap();
                assert_eq!(data.total_downloads, Some(1234));
                assert_eq!(data.icon_url.as_deref(), Some("https://example.org/serilog.png"));
            }
            other => panic!("Expected packageDetailsResponse, got {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_details_failure_carries_error() {
    let (mediator, sink) = host(Services::new().with_details(Arc::new(FakeDetails::default())));

    mediator
        .dispatch(&message(
            "packageDetailsRequest",
            json!({ "packageId": "Missing", "requestId": "d1" }),
        ))
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    match &sink.named(NotificationName::PackageDetailsResponse)[0] {
        Notification::PackageDetails(response) => {
            assert!(response.data.is_none());
            assert_eq!(
                response.error.as_ref().unwrap().kind,
                ErrorKind::NotFound.as_str()
            );
        }
        other => panic!("Expected packageDetailsResponse, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Projects and operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_get_projects_reports_installed_version() {
    let discovery = FakeDiscovery::new(vec![
        project("/a", &[("Serilog", "3.0.0")]),
        project("/b", &[]),
    ]);
    let (mediator, sink) = host(Services::new().with_discovery(discovery));

    mediator
        .dispatch(&message(
            "getProjects",
            json!({ "requestId": "p1", "packageId": "serilog" }),
        ))
        .await;

    match &sink.posted()[..] {
        [Notification::GetProjects(response)] => {
            assert_eq!(response.request_id.as_deref(), Some("p1"));
            let versions: Vec<_> = response
                .projects
                .iter()
                .map(|p| (p.path.as_str(), p.installed_version.as_deref()))
                .collect();
            assert_eq!(versions, vec![("/a", Some("3.0.0")), ("/b", None)]);
        }
        other => panic!("Expected one getProjectsResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_install_with_partial_failure() {
    let discovery = FakeDiscovery::new(vec![project("/a", &[]), project("/b", &[])]);
    let executor = Arc::new(FakeExecutor {
        failing: vec!["/b".to_string()],
        ..Default::default()
    });
    let (mediator, sink) = host(
        Services::new()
            .with_discovery(discovery)
            .with_executor(executor.clone()),
    );

    mediator.dispatch(&json!({ "type": "getProjects" })).await;
    mediator
        .dispatch(&message(
            "installPackageRequest",
            json!({
                "packageId": "Serilog",
                "version": "3.1.1",
                "projectPaths": ["/a", "/b"],
                "requestId": "i1"
            }),
        ))
        .await;

    assert_eq!(*executor.ran.lock().unwrap(), vec!["/a", "/b"]);

    let posted = sink.posted();
    let names: Vec<_> = posted.iter().map(Notification::name).collect();
    assert_eq!(
        names,
        vec![
            NotificationName::GetProjectsResponse,
            NotificationName::InstallPackageResponse,
            NotificationName::ProjectsChanged,
        ]
    );

    match &posted[1] {
        Notification::InstallPackage(response) => {
            assert!(!response.success);
            assert_eq!(response.request_id, "i1");
            assert_eq!(response.results.len(), 2);
            assert!(response.results[0].success);
            assert!(!response.results[1].success);
            assert_eq!(
                response.results[1].error.as_ref().unwrap().exit_code,
                Some(1)
            );
            let updated = response.updated_projects.as_ref().unwrap();
            assert_eq!(updated.len(), 1);
            assert_eq!(updated[0].path, "/a");
            assert_eq!(updated[0].installed_version.as_deref(), Some("3.1.1"));
        }
        other => panic!("Expected installPackageResponse, got {other:?}"),
    }

    match &posted[2] {
        Notification::ProjectsChanged(changed) => {
            assert_eq!(changed.changed_paths, Some(vec!["/a".to_string()]));
        }
        other => panic!("Expected projectsChanged, got {other:?}"),
    }

    // The cache now answers with the optimistic state.
    sink.clear();
    mediator
        .dispatch(&message("getProjects", json!({ "packageId": "Serilog" })))
        .await;
    match &sink.posted()[..] {
        [Notification::GetProjects(response)] => {
            assert_eq!(response.projects[0].installed_version.as_deref(), Some("3.1.1"));
            assert_eq!(response.projects[1].installed_version, None);
        }
        other => panic!("Expected one getProjectsResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_uninstall_middle_target_fails() {
    let executor = Arc::new(FakeExecutor {
        failing: vec!["/b".to_string()],
        ..Default::default()
    });
    let (mediator, sink) = host(Services::new().with_executor(executor.clone()));

    mediator
        .dispatch(&message(
            "uninstallPackageRequest",
            json!({ "packageId": "Serilog", "projectPaths": ["/a", "/b", "/c"], "requestId": "u1" }),
        ))
        .await;

    assert_eq!(*executor.ran.lock().unwrap(), vec!["/a", "/b", "/c"]);
    match &sink.posted()[..] {
        [Notification::UninstallPackage(response)] => {
            assert!(!response.success);
            let outcome: Vec<_> = response
                .results
                .iter()
                .map(|r| (r.target_path.as_str(), r.success))
                .collect();
            assert_eq!(outcome, vec![("/a", true), ("/b", false), ("/c", true)]);
            // Nothing was cached, so nothing was updated.
            assert!(response.updated_projects.is_none());
        }
        other => panic!("Expected one uninstallPackageResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_install_with_no_targets_is_validation_error() {
    let executor = Arc::new(FakeExecutor::default());
    let (mediator, sink) = host(Services::new().with_executor(executor.clone()));

    mediator
        .dispatch(&message(
            "installPackageRequest",
            json!({ "packageId": "Serilog", "version": "3.1.1", "projectPaths": [], "requestId": "i1" }),
        ))
        .await;

    assert!(executor.ran.lock().unwrap().is_empty());
    match &sink.posted()[..] {
        [Notification::InstallPackage(response)] => {
            assert!(!response.success);
            assert!(response.results.is_empty());
            let error = response.error.as_ref().unwrap();
            assert_eq!(error.kind, ErrorKind::Validation.as_str());
            assert_eq!(error.field.as_deref(), Some("projectPaths"));
        }
        other => panic!("Expected one installPackageResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_refresh_announces_changed_projects() {
    let discovery = FakeDiscovery::new(vec![project("/a", &[])]);
    let (mediator, sink) = host(Services::new().with_discovery(discovery.clone()));

    mediator.dispatch(&json!({ "type": "getProjects" })).await;
    discovery.set(vec![project("/a", &[]), project("/b", &[])]);
    mediator
        .dispatch(&message("refreshProjectCache", json!({ "requestId": "r1" })))
        .await;

    let changed = sink.named(NotificationName::ProjectsChanged);
    match &changed[..] {
        [Notification::ProjectsChanged(args)] => {
            assert_eq!(args.changed_paths, Some(vec!["/b".to_string()]));
        }
        other => panic!("Expected one projectsChanged, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ready_posts_sources() {
    let (mediator, sink) = host(Services::new().with_sources(Arc::new(FakeSources)));

    mediator.dispatch(&json!({ "type": "ready" })).await;
    mediator
        .dispatch(&message("getPackageSourcesRequest", json!({ "requestId": "s1" })))
        .await;

    let posted = sink.named(NotificationName::PackageSourcesResponse);
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[0].request_id(), None);
    assert_eq!(posted[1].request_id(), Some("s1"));
    match &posted[1] {
        Notification::PackageSources(response) => {
            assert_eq!(response.sources[0].id, "nuget.org");
        }
        other => panic!("Expected packageSourcesResponse, got {other:?}"),
    }
}

use crate::context::{require, HostContext};
use dotpack_core::events::ProjectsChanged;
use dotpack_proto::{
    GetProjectsRequest, GetProjectsResponse, Notification, RefreshProjectCacheRequest,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// List projects, reporting the installed version of `packageId` when given.
///
/// The first call fills the project cache from discovery; later calls read
/// the cache, which already reflects completed installs and uninstalls.
pub async fn handle_get_projects(ctx: &HostContext, request: GetProjectsRequest) {
    let Some(discovery) = require(ctx.services.discovery.as_ref(), "discovery") else {
        return;
    };

    discovery.wait_for_discovery().await;

    if ctx.state.projects.is_empty() {
        match discovery.get_context().await {
            Ok(projects) => {
                ctx.state.projects.reconcile(projects);
            }
            Err(err) => {
                warn!(error = %err, "project discovery failed");
                ctx.post(Notification::GetProjects(GetProjectsResponse {
                    request_id: request.request_id,
                    projects: Vec::new(),
                    error: Some(err.to_info()),
                }));
                return;
            }
        }
    }

    let projects: Vec<_> = ctx
        .state
        .projects
        .snapshot()
        .iter()
        .map(|p| p.to_target(request.package_id.as_deref()))
        .collect();

    debug!(count = projects.len(), package_id = ?request.package_id, "listing projects");
    ctx.post(Notification::GetProjects(GetProjectsResponse {
        request_id: request.request_id,
        projects,
        error: None,
    }));
}

/// Re-run discovery and replace the project cache with its result.
pub async fn handle_refresh_project_cache(ctx: &HostContext, request: RefreshProjectCacheRequest) {
    let Some(discovery) = require(ctx.services.discovery.as_ref(), "discovery") else {
        return;
    };

    match discovery.refresh().await {
        Ok(projects) => {
            let known: BTreeSet<String> = projects.iter().map(|p| p.path.clone()).collect();
            let changed = ctx.state.projects.reconcile(projects);
            ctx.state.selection.retain_known(&known);
            info!(
                request_id = ?request.request_id,
                projects = known.len(),
                changed = changed.len(),
                "project cache refreshed"
            );
            ctx.bus.emit(&ProjectsChanged {
                changed_paths: changed,
            });
        }
        Err(err) => {
            warn!(request_id = ?request.request_id, error = %err, "project refresh failed");
        }
    }
}

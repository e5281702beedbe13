use crate::context::{require, HostContext};
use crate::orchestrator::{run_operation, EmptyTargets, Operation, OperationKind};
use dotpack_core::events::ProjectsChanged;
use dotpack_core::state::ProjectSnapshot;
use dotpack_proto::{
    AggregateOperationResult, InstallPackageRequest, InstallPackageResponse, Notification,
    ProjectTarget, UninstallPackageRequest, UninstallPackageResponse,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn handle_install(ctx: &HostContext, request: InstallPackageRequest) {
    let operation = Operation::install(&request.package_id, &request.version);
    let Some((outcome, updated)) = execute(ctx, &operation, &request.project_paths).await else {
        return;
    };

    ctx.post(Notification::InstallPackage(InstallPackageResponse {
        package_id: request.package_id,
        version: request.version,
        success: outcome.success,
        results: outcome.results,
        updated_projects: updated.projects,
        request_id: request.request_id,
        error: outcome.error,
    }));
    announce(ctx, updated.paths);
}

pub async fn handle_uninstall(ctx: &HostContext, request: UninstallPackageRequest) {
    let operation = Operation::uninstall(&request.package_id);
    let Some((outcome, updated)) = execute(ctx, &operation, &request.project_paths).await else {
        return;
    };

    ctx.post(Notification::UninstallPackage(UninstallPackageResponse {
        package_id: request.package_id,
        success: outcome.success,
        results: outcome.results,
        updated_projects: updated.projects,
        request_id: request.request_id,
        error: outcome.error,
    }));
    announce(ctx, updated.paths);
}

struct Updated {
    projects: Option<Vec<ProjectTarget>>,
    paths: Vec<String>,
}

/// Run the orchestrator, then patch the project cache from its results.
async fn execute(
    ctx: &HostContext,
    operation: &Operation,
    targets: &[String],
) -> Option<(AggregateOperationResult, Updated)> {
    let executor = require(ctx.services.executor.as_ref(), "executor")?;

    info!(
        kind = %operation.kind,
        package_id = %operation.package_id,
        targets = targets.len(),
        "operation started"
    );

    let outcome = run_operation(
        executor.as_ref(),
        operation,
        targets,
        EmptyTargets::Reject,
        ctx.config.operation_timeout(),
        &CancellationToken::new(),
    )
    .await;

    if outcome.error.is_none() {
        ctx.state
            .selection
            .replace(&operation.package_id, targets.iter().cloned());
    }

    let updated = apply_optimistic(ctx, operation, &outcome);

    info!(
        kind = %operation.kind,
        package_id = %operation.package_id,
        success = outcome.success,
        failed = outcome.failures().count(),
        "operation finished"
    );

    Some((outcome, updated))
}

fn apply_optimistic(
    ctx: &HostContext,
    operation: &Operation,
    outcome: &AggregateOperationResult,
) -> Updated {
    let snapshots: Vec<ProjectSnapshot> = outcome
        .results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| ctx.state.projects.get(&r.target_path))
        .map(|current| match (operation.kind, operation.version.as_deref()) {
            (OperationKind::Install, Some(version)) => {
                current.with_package(&operation.package_id, version)
            }
            _ => current.without_package(&operation.package_id),
        })
        .collect();

    let projects: Vec<ProjectTarget> = snapshots
        .iter()
        .map(|s| s.to_target(Some(&operation.package_id)))
        .collect();
    let paths = ctx.state.projects.apply_optimistic(snapshots);

    Updated {
        projects: (!projects.is_empty()).then_some(projects),
        paths,
    }
}

/// Tell the rest of the host which projects changed.
fn announce(ctx: &HostContext, paths: Vec<String>) {
    if !paths.is_empty() {
        ctx.bus.emit(&ProjectsChanged {
            changed_paths: paths,
        });
    }
}

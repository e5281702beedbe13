//! Apply one logical operation across N target projects.
//!
//! Targets run one after another under a single deadline. Each target's
//! outcome is recorded independently; a failure never stops the remaining
//! targets. When the deadline passes, the running target is cancelled and
//! reported as timed out, and every target not yet started is reported as
//! cancelled.

use crate::services::OperationExecutor;
use dotpack_core::AppError;
use dotpack_proto::{AggregateOperationResult, OperationResult};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Install,
    Uninstall,
}

impl OperationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The package-level part of an operation; the target path varies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub package_id: String,
    /// Required for installs, ignored for uninstalls.
    pub version: Option<String>,
}

impl Operation {
    pub fn install(package_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Install,
            package_id: package_id.into(),
            version: Some(version.into()),
        }
    }

    pub fn uninstall(package_id: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Uninstall,
            package_id: package_id.into(),
            version: None,
        }
    }
}

/// What an empty target list means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyTargets {
    /// Vacuous success with no results.
    Allow,
    /// Fail fast with a `Validation` error on `projectPaths`.
    Reject,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Roughly 30 years; stands in for "no deadline" when `timeout` overflows.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Run `operation` against every path in `targets`, in order.
///
/// Failures before any target runs (empty targets under
/// [`EmptyTargets::Reject`], a failed executor preflight) produce an aggregate
/// failure with no per-target results and a top-level error.
pub async fn run_operation(
    executor: &dyn OperationExecutor,
    operation: &Operation,
    targets: &[String],
    empty: EmptyTargets,
    timeout: Duration,
    cancel: &CancellationToken,
) -> AggregateOperationResult {
    if targets.is_empty() {
        return match empty {
            EmptyTargets::Allow => AggregateOperationResult::from_results(Vec::new()),
            EmptyTargets::Reject => {
                let err = AppError::validation("projectPaths", "at least one project is required");
                warn!(kind = %operation.kind, package_id = %operation.package_id, "no target projects");
                AggregateOperationResult::aborted(err.to_info())
            }
        };
    }

    if let Err(err) = executor.preflight().await {
        warn!(kind = %operation.kind, error = %err, "executor unavailable");
        return AggregateOperationResult::aborted(err.to_info());
    }

    let deadline = deadline_after(timeout);
    let token = cancel.child_token();
    let mut results = Vec::with_capacity(targets.len());
    let mut halted: Option<AppError> = None;

    for path in targets {
        if let Some(reason) = &halted {
            results.push(OperationResult::failed(path.as_str(), reason.to_info()));
            continue;
        }
        if token.is_cancelled() {
            halted = Some(AppError::cancelled());
            results.push(OperationResult::failed(path.as_str(), AppError::cancelled().to_info()));
            continue;
        }

        debug!(kind = %operation.kind, package_id = %operation.package_id, target = %path, "running");

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Err(AppError::cancelled()),
            result = tokio::time::timeout_at(deadline, executor.run(operation, path, token.clone())) => {
                result.unwrap_or_else(|_| {
                    token.cancel();
                    halted = Some(AppError::Cancelled {
                        message: "skipped: operation timed out".to_string(),
                    });
                    Err(AppError::timeout(millis(timeout)))
                })
            }
        };

        match outcome {
            Ok(()) => {
                info!(kind = %operation.kind, package_id = %operation.package_id, target = %path, "succeeded");
                results.push(OperationResult::succeeded(path.as_str()));
            }
            Err(err) => {
                warn!(kind = %operation.kind, package_id = %operation.package_id, target = %path, error = %err, "failed");
                results.push(OperationResult::failed(path.as_str(), err.to_info()));
            }
        }
    }

    AggregateOperationResult::from_results(results)
}

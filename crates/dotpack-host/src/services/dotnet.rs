//! Install and uninstall through the `dotnet` CLI.

use super::OperationExecutor;
use crate::orchestrator::{Operation, OperationKind};
use async_trait::async_trait;
use dotpack_core::{AppError, AppResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Longest stderr excerpt carried in an error.
const MAX_STDERR: usize = 4096;

/// Runs `dotnet add/remove package` per project.
#[derive(Debug, Clone)]
pub struct DotnetExecutor {
    program: PathBuf,
}

impl Default for DotnetExecutor {
    fn default() -> Self {
        Self::new("dotnet")
    }
}

impl DotnetExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for one operation against one project.
    #[must_use]
    pub fn args(operation: &Operation, project_path: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = match operation.kind {
            OperationKind::Install => vec!["add".into()],
            OperationKind::Uninstall => vec!["remove".into()],
        };
        args.push(project_path.into());
        args.push("package".into());
        args.push(operation.package_id.as_str().into());
        if let (OperationKind::Install, Some(version)) = (operation.kind, &operation.version) {
            args.push("--version".into());
            args.push(version.as_str().into());
        }
        args
    }

    fn spawn_error(&self, err: &std::io::Error) -> AppError {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::dotnet_not_found()
        } else {
            AppError::unknown(format!("failed to run {}", self.program.display())).with_cause(err)
        }
    }
}

fn tail(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= MAX_STDERR {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_STDERR;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

#[async_trait]
impl OperationExecutor for DotnetExecutor {
    async fn preflight(&self) -> AppResult<()> {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.spawn_error(&e))?;

        if status.success() {
            Ok(())
        } else {
            Err(AppError::cli(status.code(), "dotnet --version failed"))
        }
    }

    async fn run(
        &self,
        operation: &Operation,
        project_path: &str,
        cancel: CancellationToken,
    ) -> AppResult<()> {
        if !Path::new(project_path).is_file() {
            return Err(AppError::project_not_found(project_path));
        }

        let args = Self::args(operation, project_path);
        debug!(program = %self.program.display(), ?args, "spawning");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(&e))?;

        let output = tokio::select! {
            () = cancel.cancelled() => return Err(AppError::cancelled()),
            output = child.wait_with_output() => output.map_err(|e| self.spawn_error(&e))?,
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // dotnet reports most failures on stdout.
        let detail = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            stderr.into_owned()
        };
        Err(AppError::cli(output.status.code(), tail(&detail)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_install_args() {
        let args = DotnetExecutor::args(&Operation::install("Serilog", "3.1.1"), "/w/App.csproj");
        assert_eq!(
            args,
            vec!["add", "/w/App.csproj", "package", "Serilog", "--version", "3.1.1"]
                .into_iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_uninstall_args_have_no_version() {
        let args = DotnetExecutor::args(&Operation::uninstall("Serilog"), "/w/App.csproj");
        assert_eq!(args.len(), 4);
        assert_eq!(args[0], "remove");
    }

    #[test]
    fn test_tail_keeps_end_of_long_output() {
        let long = format!("{}END", "x".repeat(MAX_STDERR * 2));
        let cut = tail(&long);
        assert_eq!(cut.len(), MAX_STDERR);
        assert!(cut.ends_with("END"));
    }

    #[tokio::test]
    async fn test_missing_project_is_reported_before_spawning() {
        let exec = DotnetExecutor::new("definitely-not-a-real-dotnet");
        let err = exec
            .run(
                &Operation::uninstall("Pkg"),
                "/nowhere/App.csproj",
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), dotpack_core::ErrorKind::ProjectNotFound);
    }

    #[tokio::test]
    async fn test_missing_program_is_dotnet_not_found() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("App.csproj");
        std::fs::write(&project, "<Project />").unwrap();

        let exec = DotnetExecutor::new(dir.path().join("no-such-dotnet"));
        let err = exec
            .run(
                &Operation::install("Pkg", "1.0.0"),
                project.to_str().unwrap(),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), dotpack_core::ErrorKind::DotnetNotFound);
        assert_eq!(
            exec.preflight().await.unwrap_err().kind(),
            dotpack_core::ErrorKind::DotnetNotFound
        );
    }
}

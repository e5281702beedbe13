//! Integration tests for `dotpack serve`, `dotpack projects` and `dotpack version`.

use dotpack_proto::{Notification, NotificationName};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

const APP: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup><TargetFramework>net8.0</TargetFramework></PropertyGroup>
  <ItemGroup><PackageReference Include="Serilog" Version="3.1.1" /></ItemGroup>
</Project>"#;

fn dotpack() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dotpack"))
}

/// A workspace with one project and a config file without network sources.
fn workspace(dir: &Path) -> std::path::PathBuf {
    std::fs::create_dir_all(dir.join("src/App")).unwrap();
    std::fs::write(dir.join("src/App/App.csproj"), APP).unwrap();
    let config = dir.join("dotpack.json");
    std::fs::write(&config, r#"{ "sources": [] }"#).unwrap();
    config
}

#[test]
fn test_version_prints_protocol() {
    let output = dotpack().arg("version").output().expect("Failed to run version");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("dotpack "), "unexpected output: {stdout}");
    assert!(stdout.contains("protocol v"));
}

#[test]
fn test_projects_json_reports_installed_version() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace(dir.path());

    let output = dotpack()
        .args(["projects", "--json", "--package", "serilog"])
        .arg("--workspace")
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .output()
        .expect("Failed to run projects");
    assert!(output.status.success());

    let projects: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(projects[0]["name"], "App");
    assert_eq!(projects[0]["relativePath"], "src/App/App.csproj");
    assert_eq!(projects[0]["installedVersion"], "3.1.1");
}

#[test]
fn test_missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dotpack()
        .arg("projects")
        .arg("--config")
        .arg(dir.path().join("missing.json"))
        .output()
        .expect("Failed to run projects");
    assert!(!output.status.success());
}

#[test]
fn test_serve_answers_each_admitted_line() {
    let dir = tempfile::tempdir().unwrap();
    let config = workspace(dir.path());

    let mut child = dotpack()
        .arg("serve")
        .arg("--workspace")
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("--dotnet")
        .arg(dir.path().join("no-such-dotnet"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start serve");

    {
        let mut stdin = child.stdin.take().unwrap();
        let input = [
            r#"{"type":"getProjects","payload":{"requestId":"p1","packageId":"Serilog"}}"#,
            "this is not json",
            r#"{"type":"deletePackage","payload":{}}"#,
            r#"{"type":"searchRequest","payload":{"requestId":"bad"}}"#,
            r#"{"type":"getPackageSourcesRequest","payload":{"requestId":"s1"}}"#,
        ];
        for line in input {
            writeln!(stdin, "{line}").unwrap();
        }
    }

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let notifications: Vec<Notification> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| {
            let raw = dotpack_proto::decode_line(line).unwrap();
            Notification::from_envelope(&raw).expect("stdout line is a notification envelope")
        })
        .collect();
    assert_eq!(notifications.len(), 2);

    let projects = notifications
        .iter()
        .find(|n| n.name() == NotificationName::GetProjectsResponse)
        .unwrap();
    match projects {
        Notification::GetProjects(response) => {
            assert_eq!(response.request_id.as_deref(), Some("p1"));
            assert_eq!(response.projects.len(), 1);
            assert_eq!(response.projects[0].installed_version.as_deref(), Some("3.1.1"));
        }
        other => panic!("Expected getProjectsResponse, got {other:?}"),
    }

    let sources = notifications
        .iter()
        .find(|n| n.name() == NotificationName::PackageSourcesResponse)
        .unwrap();
    assert_eq!(sources.request_id(), Some("s1"));
}

use dotpack_core::Config;
use dotpack_host::services::workspace::scan;
use dotpack_proto::ProjectTarget;
use miette::{IntoDiagnostic, Result};

/// Print the projects under the workspace root.
pub fn run(config: &Config, package: Option<&str>, json: bool) -> Result<()> {
    let projects = scan(&config.workspace_root).into_diagnostic()?;
    let targets: Vec<ProjectTarget> = projects.iter().map(|p| p.to_target(package)).collect();

    if json {
        let output = serde_json::to_string_pretty(&targets).into_diagnostic()?;
        println!("{output}");
        return Ok(());
    }

    if targets.is_empty() {
        println!("no projects under {}", config.workspace_root.display());
        return Ok(());
    }

    for target in &targets {
        let frameworks = target.frameworks.join(";");
        match (package, target.installed_version.as_deref()) {
            (Some(id), Some("")) => {
                println!("{}  [{frameworks}]  {id} (central version)", target.relative_path);
            }
            (Some(id), Some(version)) => {
                println!("{}  [{frameworks}]  {id} {version}", target.relative_path);
            }
            (Some(id), None) => {
                println!("{}  [{frameworks}]  {id} not installed", target.relative_path);
            }
            (None, _) => println!("{}  [{frameworks}]", target.relative_path),
        }
    }

    Ok(())
}

use std::path::{Path, PathBuf};

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "DOTPACK_CONFIG";

/// Platform config file location.
///
/// - Linux: `$XDG_CONFIG_HOME/dotpack/config.json` or `~/.config/dotpack/config.json`
/// - macOS: `~/Library/Application Support/dotpack/config.json`
/// - Windows: `%APPDATA%\dotpack\config.json`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join("dotpack").join("config.json"))
}

/// Find the workspace root by walking up from `cwd`.
///
/// The first directory holding a `.sln` file or a `.git` entry wins.
#[must_use]
pub fn workspace_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(".git").exists() || has_solution(&current) {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

fn has_solution(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|entries| {
        entries
            .filter_map(Result::ok)
            .any(|e| e.path().extension().is_some_and(|ext| ext == "sln"))
    })
}

/// `path` relative to `root`, with forward slashes.
///
/// Falls back to the full path when `path` is outside `root`.
#[must_use]
pub fn relative_to(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

use bmad_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the project root directory.
///
/// Priority:
/// 1. `--root` flag / `BMAD_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.bmad/` or `_bmad-output/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root(&cwd)
}

fn find_root(start: &Path) -> PathBuf {
    let markers: [&[&str]; 2] = [&[paths::BMAD_DIR, paths::BMAD_OUTPUT_DIR], &[".git"]];
    for names in markers {
        let found = start
            .ancestors()
            .find(|dir| names.iter().any(|n| dir.join(n).is_dir()));
        if let Some(dir) = found {
            return dir.to_path_buf();
        }
    }
    start.to_path_buf()
}

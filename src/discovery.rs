//! Application discovery — enumerate the `apps/` directory.
//!
//! Mechanical collaborator (spec.md §1, §6): the core only consumes the
//! resulting sorted sequence. Kept as a separate module so the Launcher
//! never touches the filesystem itself.

use std::path::{Path, PathBuf};

use crate::error::SupervisorError;

/// Enumerate `dir` for entries whose file name ends with `extension`,
/// sorted lexicographically by file name — the same ordering
/// `sorted(os.listdir(...))` produced in the original implementation.
///
/// A missing or unreadable directory is an `UnsupportedEnvironment`-class
/// startup failure (spec.md §4.7), not a silently empty list.
pub fn discover_apps(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, SupervisorError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| {
        SupervisorError::UnsupportedEnvironment(format!(
            "cannot read apps directory {}: {e}",
            dir.display()
        ))
    })?;

    let mut entries: Vec<(String, PathBuf)> = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| {
            SupervisorError::UnsupportedEnvironment(format!("error reading directory entry: {e}"))
        })?;
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.ends_with(extension) {
            entries.push((file_name.to_string(), path));
        }
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries.into_iter().map(|(_, path)| path).collect())
}

/// Derive the `ChildName` a discovered path should register under: its
/// file name component, unmodified. Kept separate from `discover_apps` so
/// callers that already have a `PathBuf` from elsewhere can reuse it.
pub fn child_name_for(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_directory_is_unsupported_environment() {
        let dir = Path::new("/nonexistent/duckymux/apps/path/xyz");
        let err = discover_apps(dir, ".py").unwrap_err();
        assert!(matches!(err, SupervisorError::UnsupportedEnvironment(_)));
    }

    #[test]
    fn filters_by_extension_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["zebra.py", "apple.py", "mango.txt", "ignore.sh"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        let found = discover_apps(tmp.path(), ".py").unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["apple.py", "zebra.py"]);
    }

    #[test]
    fn empty_directory_yields_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        let found = discover_apps(tmp.path(), ".py").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn child_name_is_file_name() {
        let path = Path::new("apps/hello.py");
        assert_eq!(child_name_for(path).as_deref(), Some("hello.py"));
    }
}

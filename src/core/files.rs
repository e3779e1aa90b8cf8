//! Directory listing and set helpers used to match checkouts to branches.

use std::collections::BTreeSet;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::Error;
use crate::Result;

/// Names of the immediate subdirectories of `root`, sorted.
pub fn list_dirs(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("list {}", root.display())))
        })?;
        if entry.file_type().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Files under `root` (recursively) whose name matches the glob `pattern`.
pub fn find_files(root: &Path, pattern: &str) -> Result<Vec<std::path::PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("walk {}", root.display())))
        })?;
        if entry.file_type().is_file()
            && glob_match::glob_match(pattern, &entry.file_name().to_string_lossy())
        {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Elements of `a` that are not in `b`, in the order of `a`.
pub fn difference<'a>(a: &'a [String], b: &[String]) -> Vec<&'a str> {
    let exclude: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    a.iter()
        .map(String::as_str)
        .filter(|item| !exclude.contains(item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn list_dirs_skips_files_and_nested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b-branch/nested")).unwrap();
        std::fs::create_dir(dir.path().join("a-branch")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "x").unwrap();

        assert_eq!(list_dirs(dir.path()).unwrap(), vec!["a-branch", "b-branch"]);
    }

    #[test]
    fn find_files_matches_glob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("2024")).unwrap();
        std::fs::write(dir.path().join("2024/a.sql.gz"), "").unwrap();
        std::fs::write(dir.path().join("b.sql"), "").unwrap();

        let found = find_files(dir.path(), "*.gz").unwrap();
        assert_eq!(found, vec![dir.path().join("2024/a.sql.gz")]);
    }

    #[test]
    fn difference_keeps_order() {
        let folders = strings(&["c", "a", "b"]);
        let branches = strings(&["a", "x"]);
        assert_eq!(difference(&folders, &branches), vec!["c", "b"]);
    }

    #[test]
    fn difference_with_empty_exclusion() {
        let folders = strings(&["a"]);
        assert_eq!(difference(&folders, &[]), vec!["a"]);
    }
}

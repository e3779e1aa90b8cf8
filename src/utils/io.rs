//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents, reporting failures as `internal.io_error` with the
/// caller's operation as context.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Serialize `value` as indented JSON and write it to `path`.
pub fn write_json_pretty<T: serde::Serialize>(path: &Path, value: &T, operation: &str) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| Error::internal_json(e.to_string(), Some(operation.to_string())))?;
    write_file(path, &content, operation)
}

/// Remove a file or a whole directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> Result<bool> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => Err(e),
    };

    result.map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("remove {}", path.display())))
    })?;
    log::info!("Removed {}", path.display());
    Ok(true)
}

/// Copy `source` to `destination` unless the destination already exists.
/// Returns whether a copy happened.
pub fn copy_if_missing(source: &Path, destination: &Path) -> Result<bool> {
    if destination.exists() {
        return Ok(false);
    }
    fs::copy(source, destination).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("copy {} to {}", source.display(), destination.display())),
        )
    })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn read_file_succeeds_for_existing_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "test content").unwrap();

        let content = read_file(temp.path(), "test read").unwrap();
        assert!(content.contains("test content"));
    }

    #[test]
    fn read_file_returns_error_for_missing_file() {
        let err = read_file(Path::new("/nonexistent/path.txt"), "test read").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
        assert_eq!(err.details["context"], "test read");
    }

    #[test]
    fn write_json_pretty_indents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        write_json_pretty(&path, &serde_json::json!({"name": "x"}), "write").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\n  \"name\": \"x\"\n}"
        );
    }

    #[test]
    fn remove_path_handles_dirs_files_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("host");
        std::fs::create_dir_all(sub.join("nested")).unwrap();
        let file = dir.path().join("host.conf");
        std::fs::write(&file, "x").unwrap();

        assert!(remove_path(&sub).unwrap());
        assert!(remove_path(&file).unwrap());
        assert!(!remove_path(&dir.path().join("missing")).unwrap());
        assert!(!sub.exists());
        assert!(!file.exists());
    }

    #[test]
    fn copy_if_missing_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("settings.php.example");
        let dst = dir.path().join("settings.php");
        std::fs::write(&src, "example").unwrap();

        assert!(copy_if_missing(&src, &dst).unwrap());
        std::fs::write(&dst, "edited").unwrap();
        assert!(!copy_if_missing(&src, &dst).unwrap());
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "edited");
    }
}

//! Acquisition file discovery.

use std::path::{Path, PathBuf};

/// Regular files in `folder` whose extension equals `extension`
/// (case-insensitive, without the dot), sorted by name.
pub fn discover_files(folder: &Path, extension: &str) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Restrict `files` to the one named `name`, if given.
pub fn select_file(files: Vec<PathBuf>, name: Option<&str>) -> Vec<PathBuf> {
    match name {
        None => files,
        Some(name) => files
            .into_iter()
            .filter(|p| p.file_name().and_then(|n| n.to_str()) == Some(name))
            .collect(),
    }
}

/// Display name of a file (final path component).
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hrv-autopilot-files-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_filters_by_extension_case_insensitive() {
        let dir = scratch_dir("ext");
        for name in ["b.acq", "a.ACQ", "c.mwi", "notes.txt", "acq"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        std::fs::create_dir_all(dir.join("folder.acq")).unwrap();

        let found = discover_files(&dir, "acq").unwrap();
        let names: Vec<_> = found.iter().map(|p| file_label(p)).collect();
        assert_eq!(names, vec!["a.ACQ", "b.acq"]);

        let found = discover_files(&dir, "mwi").unwrap();
        assert_eq!(found.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        assert!(discover_files(Path::new("/nonexistent/hrv-input"), "acq").is_err());
    }

    #[test]
    fn test_select_single_file() {
        let files = vec![PathBuf::from("/in/a.acq"), PathBuf::from("/in/b.acq")];
        assert_eq!(select_file(files.clone(), None).len(), 2);
        assert_eq!(
            select_file(files.clone(), Some("b.acq")),
            vec![PathBuf::from("/in/b.acq")]
        );
        assert!(select_file(files, Some("c.acq")).is_empty());
    }
}

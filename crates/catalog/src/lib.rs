//! Media catalog: a snapshot of the files one file service offers.
//!
//! The snapshot is taken by [`Catalog::set_directory`] and never updated
//! incrementally; files added to the directory afterwards are invisible
//! until the directory is set again.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use glob::Pattern;
use panelcast_protocol::FileListing;

/// A file in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// File name (no directory part).
    pub name: String,
    /// Size in bytes at snapshot time.
    pub size: u64,
    /// Absolute path.
    pub path: PathBuf,
}

/// Ordered snapshot of one directory filtered by extension globs.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    dir: String,
    filters: Vec<Pattern>,
    files: Vec<MediaFile>,
}

impl Catalog {
    /// Creates an empty catalog with no directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor: `new()` followed by `set_directory`.
    pub fn scan(dir: impl AsRef<Path>, filters: &str) -> Self {
        let mut catalog = Self::new();
        catalog.set_directory(dir, filters);
        catalog
    }

    /// Points the catalog at `dir` and snapshots every regular file whose
    /// name matches one of the space-separated, case-sensitive glob
    /// `filters`.
    ///
    /// Never fails: a missing or unreadable directory leaves an empty
    /// catalog. Returns the number of files found.
    pub fn set_directory(&mut self, dir: impl AsRef<Path>, filters: &str) -> usize {
        let mut dir = dir.as_ref().to_string_lossy().into_owned();
        if !dir.ends_with(MAIN_SEPARATOR) && !dir.ends_with('/') {
            dir.push(MAIN_SEPARATOR);
        }

        self.filters = filters
            .split_whitespace()
            .filter_map(|f| match Pattern::new(f) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(filter = f, "ignoring invalid name filter: {e}");
                    None
                }
            })
            .collect();
        self.files = list_matching(Path::new(&dir), &self.filters);
        self.dir = dir;

        tracing::debug!(dir = %self.dir, count = self.files.len(), "catalog snapshot taken");
        self.files.len()
    }

    /// The catalog directory, always ending with a path separator (empty
    /// before the first `set_directory`).
    pub fn directory(&self) -> &str {
        &self.dir
    }

    /// Files in catalog order.
    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Name/size pairs in catalog order, as announced to panels.
    pub fn listings(&self) -> Vec<FileListing> {
        self.files
            .iter()
            .map(|f| FileListing {
                name: f.name.clone(),
                size: f.size,
            })
            .collect()
    }

    /// Resolves a requested file name against the catalog directory.
    ///
    /// The name is not checked against the snapshot: anything that exists
    /// under the directory at request time is readable.
    pub fn resolve(&self, file_name: &str) -> PathBuf {
        PathBuf::from(format!("{}{file_name}", self.dir))
    }
}

fn list_matching(dir: &Path, filters: &[Pattern]) -> Vec<MediaFile> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<MediaFile> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            if !metadata.is_file() {
                return None;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !filters.iter().any(|p| p.matches(&name)) {
                return None;
            }
            let path = std::fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path());
            Some(MediaFile {
                name,
                size: metadata.len(),
                path,
            })
        })
        .collect();

    files.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, len: usize) {
        std::fs::write(dir.join(name), vec![7u8; len]).unwrap();
    }

    #[test]
    fn snapshot_matches_filters_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "b.jpg", 200);
        write(tmp.path(), "a.jpg", 100);
        write(tmp.path(), "notes.txt", 5);

        let catalog = Catalog::scan(tmp.path(), "*.jpg *.png");

        let names: Vec<_> = catalog.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
        assert_eq!(catalog.files()[0].size, 100);
        assert_eq!(catalog.files()[1].size, 200);
        assert!(catalog.files()[0].path.is_absolute());
    }

    #[test]
    fn filters_are_case_sensitive() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "clip.MP4", 10);
        write(tmp.path(), "intro.mp4", 10);

        let lower = Catalog::scan(tmp.path(), "*.mp4");
        assert_eq!(lower.len(), 1);
        assert_eq!(lower.files()[0].name, "intro.mp4");

        let both = Catalog::scan(tmp.path(), "*.mp4 *.MP4");
        assert_eq!(both.len(), 2);
    }

    #[test]
    fn subdirectories_are_not_listed() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("nested.jpg")).unwrap();
        write(tmp.path(), "top.jpg", 1);

        let catalog = Catalog::scan(tmp.path(), "*.jpg");
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.files()[0].name, "top.jpg");
    }

    #[test]
    fn missing_directory_yields_empty_catalog() {
        let mut catalog = Catalog::new();
        let found = catalog.set_directory("/definitely/not/here", "*.jpg");
        assert_eq!(found, 0);
        assert!(catalog.is_empty());
        assert!(catalog.directory().ends_with(MAIN_SEPARATOR));
    }

    #[test]
    fn set_directory_replaces_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a.jpg", 1);
        let mut catalog = Catalog::scan(tmp.path(), "*.jpg");
        assert_eq!(catalog.len(), 1);

        write(tmp.path(), "b.jpg", 1);
        assert_eq!(catalog.len(), 1, "snapshot must not change on its own");

        catalog.set_directory(tmp.path(), "*.jpg");
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn directory_is_normalised_once() {
        let tmp = tempfile::tempdir().unwrap();
        let with_sep = format!("{}{MAIN_SEPARATOR}", tmp.path().display());
        let catalog = Catalog::scan(&with_sep, "*.jpg");
        assert_eq!(catalog.directory(), with_sep);
    }

    #[test]
    fn resolve_is_not_limited_to_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::scan(tmp.path(), "*.jpg");
        write(tmp.path(), "late.bin", 3);
        assert!(catalog.resolve("late.bin").exists());
    }

    #[test]
    fn listings_follow_catalog_order() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a.jpg", 100);
        write(tmp.path(), "b.jpg", 200);
        let catalog = Catalog::scan(tmp.path(), "*.jpg");
        let list = panelcast_protocol::transfer::encode_file_list(&catalog.listings());
        assert_eq!(list, "<file_list>a.jpg;100,b.jpg;200</file_list>");
    }
}

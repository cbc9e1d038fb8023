//
// collector.rs
//
// Workspace file discovery with include/exclude glob filtering
//

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use glob::Pattern;

use crate::error::IndexError;

/// Script extensions indexed when nothing else is configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["ahk", "ah1", "ext"];

/// What a directory entry is, as far as discovery cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, devices, sockets, FIFOs. Never followed or collected.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Source of directory listings.
///
/// Entries must come back in the order discovery should visit them.
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    async fn list(&self, dir: &Path) -> std::io::Result<Vec<DirEntry>>;
}

/// Lists real directories through `tokio::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDirectoryLister;

#[async_trait]
impl DirectoryLister for FsDirectoryLister {
    async fn list(&self, dir: &Path) -> std::io::Result<Vec<DirEntry>> {
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            // file_type() does not follow symlinks
            let file_type = entry.file_type().await?;
            let kind = if file_type.is_file() {
                EntryKind::File
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::Other
            };
            entries.push(DirEntry::new(
                entry.file_name().to_string_lossy().into_owned(),
                kind,
            ));
        }
        Ok(entries)
    }
}

/// Compiled include/exclude filters, matched against root-relative paths
/// with `/` separators
pub struct PathFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, IndexError> {
        Ok(Self {
            include: compile_patterns(include)?,
            exclude: compile_patterns(exclude)?,
        })
    }

    /// Kept when some include matches (or there are none) and no exclude does
    pub fn accepts(&self, relative: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(relative));
        included && !self.exclude.iter().any(|p| p.matches(relative))
    }
}

/// `path` relative to `root` with `/` separators, or `None` when `path`
/// lies outside `root`
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, IndexError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| IndexError::InvalidGlob {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Collects the script files below a workspace root
pub struct PathCollector {
    lister: Arc<dyn DirectoryLister>,
    /// Lowercased, without the leading dot
    extensions: Vec<String>,
}

impl PathCollector {
    pub fn new(lister: Arc<dyn DirectoryLister>) -> Self {
        Self {
            lister,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Collector over the real filesystem
    pub fn from_fs() -> Self {
        Self::new(Arc::new(FsDirectoryLister))
    }

    /// Replace the set of accepted extensions (case-insensitive, leading
    /// dot optional)
    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    fn has_script_extension(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Walk `root` depth-first and return every script file accepted by the
    /// filters.
    ///
    /// Entries are visited in listing order and each subdirectory is fully
    /// walked before its next sibling. The first directory that cannot be
    /// listed aborts the walk.
    pub async fn collect(
        &self,
        root: &Path,
        include: &[String],
        exclude: &[String],
    ) -> Result<Vec<PathBuf>, IndexError> {
        let filter = PathFilter::new(include, exclude)?;
        let mut files = Vec::new();

        // Each frame: (directory path, root-relative prefix, remaining entries)
        let root_entries = self.list_dir(root).await?;
        let mut stack = vec![(root.to_path_buf(), String::new(), root_entries.into_iter())];

        while let Some((dir, prefix, entries)) = stack.last_mut() {
            let Some(entry) = entries.next() else {
                stack.pop();
                continue;
            };

            let path = dir.join(&entry.name);
            let relative = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", prefix, entry.name)
            };

            match entry.kind {
                EntryKind::Directory => {
                    let children = self.list_dir(&path).await?;
                    stack.push((path, relative, children.into_iter()));
                }
                EntryKind::File => {
                    if self.has_script_extension(&entry.name) && filter.accepts(&relative) {
                        log::trace!("Collected {}", relative);
                        files.push(path);
                    }
                }
                EntryKind::Other => {
                    log::trace!("Skipping non-regular entry {}", relative);
                }
            }
        }

        log::debug!("Collected {} files under {}", files.len(), root.display());
        Ok(files)
    }

    async fn list_dir(&self, dir: &Path) -> Result<Vec<DirEntry>, IndexError> {
        self.lister
            .list(dir)
            .await
            .map_err(|source| IndexError::Discovery {
                path: dir.to_path_buf(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory directory tree keyed by absolute path
    struct MockLister {
        dirs: HashMap<PathBuf, Vec<DirEntry>>,
    }

    #[async_trait]
    impl DirectoryLister for MockLister {
        async fn list(&self, dir: &Path) -> std::io::Result<Vec<DirEntry>> {
            self.dirs.get(dir).cloned().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")
            })
        }
    }

    fn file(name: &str) -> DirEntry {
        DirEntry::new(name, EntryKind::File)
    }

    fn e2e_collector() -> PathCollector {
        let mut dirs = HashMap::new();
        dirs.insert(
            PathBuf::from("/e2e"),
            vec![
                file("main.ahk"),
                file("main.ah1"),
                file("main.ext"),
                file("main.txt"),
                DirEntry::new("sub", EntryKind::Directory),
            ],
        );
        dirs.insert(
            PathBuf::from("/e2e/sub"),
            vec![
                file("sub.ahk"),
                file("sub.ah1"),
                file("sub.ext"),
                file("sub.txt"),
            ],
        );
        PathCollector::new(Arc::new(MockLister { dirs }))
    }

    async fn collect(collector: &PathCollector, exclude: &[&str]) -> Vec<PathBuf> {
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        collector
            .collect(Path::new("/e2e"), &[], &exclude)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_collect_without_excludes() {
        let files = collect(&e2e_collector(), &[]).await;
        let expected: Vec<PathBuf> = [
            "/e2e/main.ahk",
            "/e2e/main.ah1",
            "/e2e/main.ext",
            "/e2e/sub/sub.ahk",
            "/e2e/sub/sub.ah1",
            "/e2e/sub/sub.ext",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(files, expected);
    }

    #[tokio::test]
    async fn test_exclude_extension_glob_matches_every_depth() {
        assert_eq!(collect(&e2e_collector(), &["*.ext"]).await.len(), 4);
    }

    #[tokio::test]
    async fn test_exclude_subdirectory() {
        let files = collect(&e2e_collector(), &["sub/*"]).await;
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|p| !p.starts_with("/e2e/sub")));
    }

    #[tokio::test]
    async fn test_exclude_everything() {
        assert!(collect(&e2e_collector(), &["*"]).await.is_empty());
    }

    #[tokio::test]
    async fn test_include_filters_candidates() {
        let files = e2e_collector()
            .collect(Path::new("/e2e"), &["sub/*".to_string()], &["*.ah1".to_string()])
            .await
            .unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("/e2e/sub/sub.ahk"), PathBuf::from("/e2e/sub/sub.ext")]
        );
    }

    #[tokio::test]
    async fn test_custom_extensions_case_insensitive() {
        let mut dirs = HashMap::new();
        dirs.insert(
            PathBuf::from("/e2e"),
            vec![file("A.AHK"), file("b.ahk2"), file("c.ah1")],
        );
        let collector = PathCollector::new(Arc::new(MockLister { dirs })).with_extensions(&[".ahk"]);
        let files = collect(&collector, &[]).await;
        assert_eq!(files, vec![PathBuf::from("/e2e/A.AHK")]);
    }

    #[tokio::test]
    async fn test_other_entries_ignored() {
        let mut dirs = HashMap::new();
        dirs.insert(
            PathBuf::from("/e2e"),
            vec![DirEntry::new("link.ahk", EntryKind::Other), file("real.ahk")],
        );
        let files = collect(&PathCollector::new(Arc::new(MockLister { dirs })), &[]).await;
        assert_eq!(files, vec![PathBuf::from("/e2e/real.ahk")]);
    }

    #[tokio::test]
    async fn test_unreadable_directory_is_discovery_error() {
        let mut dirs = HashMap::new();
        dirs.insert(
            PathBuf::from("/e2e"),
            vec![file("main.ahk"), DirEntry::new("locked", EntryKind::Directory)],
        );
        let collector = PathCollector::new(Arc::new(MockLister { dirs }));
        let err = collector
            .collect(Path::new("/e2e"), &[], &[])
            .await
            .unwrap_err();
        match err {
            IndexError::Discovery { path, .. } => assert_eq!(path, PathBuf::from("/e2e/locked")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_glob_rejected() {
        let err = e2e_collector()
            .collect(Path::new("/e2e"), &[], &["[".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidGlob { .. }));
    }

    #[tokio::test]
    async fn test_fs_lister_on_real_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.ahk"), "x := 1\n").unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib").join("util.ahk"), "f() {\n}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let mut files = PathCollector::from_fs()
            .collect(dir.path(), &[], &[])
            .await
            .unwrap();
        // Real directory listing order is platform-defined
        files.sort();
        assert_eq!(
            files,
            vec![dir.path().join("lib").join("util.ahk"), dir.path().join("main.ahk")]
        );
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/ws");
        assert_eq!(
            relative_path(root, Path::new("/ws/vendor/big.ahk")).as_deref(),
            Some("vendor/big.ahk")
        );
        assert_eq!(relative_path(root, Path::new("/other/a.ahk")), None);
        assert_eq!(relative_path(root, root), None);
    }

    #[test]
    fn test_path_filter_accepts() {
        let filter = PathFilter::new(&["src/*".to_string()], &["src/gen/*".to_string()]).unwrap();
        assert!(filter.accepts("src/main.ahk"));
        assert!(!filter.accepts("src/gen/out.ahk"));
        assert!(!filter.accepts("lib/util.ahk"));
    }
}

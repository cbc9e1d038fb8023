//
// index.rs
//
// Process-wide symbol index: one immutable Script per URI
//

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use indexmap::IndexMap;
use rayon::prelude::*;
use tower_lsp::lsp_types::Url;

use crate::error::IndexError;
use crate::parser::parse_script;
use crate::script::{Method, Script, Variable};

// ============================================================================
// Text sources
// ============================================================================

/// Supplies the current text of a URI when the index has to (re)parse it
#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn fetch(&self, uri: &Url) -> Result<String, IndexError>;
}

/// Reads `file://` URIs from disk
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskTextFetcher;

#[async_trait]
impl TextFetcher for DiskTextFetcher {
    async fn fetch(&self, uri: &Url) -> Result<String, IndexError> {
        let path = uri
            .to_file_path()
            .map_err(|_| IndexError::NotAFile { uri: uri.clone() })?;
        let bytes = tokio::fs::read(&path).await.map_err(|source| IndexError::Fetch {
            uri: uri.clone(),
            source,
        })?;
        Ok(decode_script_text(&bytes))
    }
}

/// Decode file bytes, dropping a UTF-8 byte order mark. Invalid sequences
/// are replaced rather than rejected so a single bad byte never hides a file.
pub fn decode_script_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

// ============================================================================
// Index
// ============================================================================

/// Options for [`SymbolIndex::get_script`]
#[derive(Debug, Clone, Copy)]
pub struct ScriptOptions {
    /// Return the cached Script when one exists
    pub using_cache: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self { using_cache: true }
    }
}

/// Outcome of indexing a batch of collected files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub files_indexed: usize,
    /// Skipped for exceeding the size limit
    pub files_skipped: usize,
    /// Unreadable or not convertible to a URI
    pub files_failed: usize,
    pub methods: usize,
    pub variables: usize,
}

/// Map from URI to parsed Script.
///
/// Scripts are immutable and shared through `Arc`; an update swaps the whole
/// value under the write lock, so readers either see the previous Script or
/// the new one, never a partial build. Iteration follows first-insertion
/// order of URIs. There is no eviction.
pub struct SymbolIndex {
    inner: RwLock<IndexMap<Url, Arc<Script>>>,
    /// Monotonic version counter, bumped on every mutation
    version: AtomicU64,
    fetcher: Option<Arc<dyn TextFetcher>>,
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolIndex {
    /// An index with no text source: only `upsert` can populate it
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(IndexMap::new()),
            version: AtomicU64::new(0),
            fetcher: None,
        }
    }

    pub fn with_fetcher(fetcher: Arc<dyn TextFetcher>) -> Self {
        Self {
            fetcher: Some(fetcher),
            ..Self::new()
        }
    }

    // ========================================================================
    // Write Operations
    // ========================================================================

    /// Insert or replace the Script for `uri`
    pub fn upsert(&self, uri: Url, script: Script) -> Arc<Script> {
        let script = Arc::new(script);
        self.upsert_shared(uri, Arc::clone(&script));
        script
    }

    fn upsert_shared(&self, uri: Url, script: Arc<Script>) {
        if let Ok(mut guard) = self.inner.write() {
            log::trace!(
                "Indexed {} ({} methods, {} variables)",
                uri,
                script.methods.len(),
                script.variables.len()
            );
            // IndexMap keeps the original slot on replace
            guard.insert(uri, script);
            self.version.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Drop the Script for `uri`, returning whether one was present
    pub fn invalidate(&self, uri: &Url) -> bool {
        let removed = self
            .inner
            .write()
            .map(|mut guard| guard.shift_remove(uri).is_some())
            .unwrap_or(false);
        if removed {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut guard) = self.inner.write() {
            guard.clear();
            self.version.fetch_add(1, Ordering::SeqCst);
        }
    }

    // ========================================================================
    // Read Operations
    // ========================================================================

    /// Cached Script for `uri`, without touching the text source
    pub fn get(&self, uri: &Url) -> Option<Arc<Script>> {
        let guard = self.inner.read().ok()?;
        guard.get(uri).cloned()
    }

    /// Script for `uri`, parsing it from the text source when not cached or
    /// when `using_cache` is false
    pub async fn get_script(
        &self,
        uri: &Url,
        options: ScriptOptions,
    ) -> Result<Arc<Script>, IndexError> {
        if options.using_cache {
            if let Some(script) = self.get(uri) {
                return Ok(script);
            }
        }

        let fetcher = self
            .fetcher
            .as_ref()
            .ok_or_else(|| IndexError::NoTextSource { uri: uri.clone() })?;
        // The lock is never held across this await
        let text = fetcher.fetch(uri).await?;

        let script = Arc::new(parse_script(uri, &text));
        self.upsert_shared(uri.clone(), Arc::clone(&script));
        Ok(script)
    }

    /// Every method of every Script: URIs in first-insertion order, then
    /// declaration order. Same-named methods from different files are all
    /// kept.
    pub fn all_methods(&self) -> Vec<Method> {
        self.inner
            .read()
            .map(|guard| {
                guard
                    .values()
                    .flat_map(|script| script.methods.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// File-scope variables of every Script, in the same order as
    /// [`Self::all_methods`]
    pub fn all_variables(&self) -> Vec<Variable> {
        self.inner
            .read()
            .map(|guard| {
                guard
                    .values()
                    .flat_map(|script| script.variables.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Methods named `name` (case-insensitive) across all files
    pub fn find_methods(&self, name: &str) -> Vec<Method> {
        self.inner
            .read()
            .map(|guard| {
                guard
                    .values()
                    .flat_map(|script| script.methods.iter())
                    .filter(|m| m.name.eq_ignore_ascii_case(name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.inner
            .read()
            .map(|guard| guard.contains_key(uri))
            .unwrap_or(false)
    }

    /// Indexed URIs in first-insertion order
    pub fn uris(&self) -> Vec<Url> {
        self.inner
            .read()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .read()
            .map(|guard| guard.is_empty())
            .unwrap_or(true)
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Bulk indexing
    // ========================================================================

    /// Read, parse and index a collected file list.
    ///
    /// Reads go through the configured text source one at a time; parsing
    /// runs on the rayon pool; results are upserted in collection order.
    /// Individual read failures are logged and counted, never fatal.
    pub async fn index_paths(&self, paths: &[PathBuf], max_file_size: usize) -> IndexSummary {
        let mut summary = IndexSummary::default();
        let Some(fetcher) = self.fetcher.as_ref() else {
            log::warn!("No text source configured, skipping {} files", paths.len());
            summary.files_failed = paths.len();
            return summary;
        };

        let mut texts: Vec<(Url, String)> = Vec::with_capacity(paths.len());
        for path in paths {
            let Ok(uri) = Url::from_file_path(path) else {
                log::warn!("Cannot convert {} to a file URI", path.display());
                summary.files_failed += 1;
                continue;
            };
            match fetcher.fetch(&uri).await {
                Ok(text) if text.len() > max_file_size => {
                    log::debug!(
                        "Skipping {} ({} bytes exceeds limit of {})",
                        uri,
                        text.len(),
                        max_file_size
                    );
                    summary.files_skipped += 1;
                }
                Ok(text) => texts.push((uri, text)),
                Err(err) => {
                    log::warn!("{err}");
                    summary.files_failed += 1;
                }
            }
        }

        let parsed = match tokio::task::spawn_blocking(move || {
            texts
                .par_iter()
                .map(|(uri, text)| (uri.clone(), parse_script(uri, text)))
                .collect::<Vec<_>>()
        })
        .await
        {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("Parsing task failed: {err}");
                return summary;
            }
        };

        for (uri, script) in parsed {
            summary.files_indexed += 1;
            summary.methods += script.methods.len();
            summary.variables += script.variables.len();
            self.upsert(uri, script);
        }

        log::debug!(
            "Indexed {} files ({} skipped, {} failed)",
            summary.files_indexed,
            summary.files_skipped,
            summary.files_failed
        );
        summary
    }
}

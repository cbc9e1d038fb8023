//
// state.rs
//
// Copyright (C) 2024-2026 Posit Software, PBC. All rights reserved.
// Modifications copyright (C) 2026 Jonathan Marc Bearak
//

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ropey::Rope;
use tower_lsp::lsp_types::TextDocumentContentChangeEvent;
use tower_lsp::lsp_types::Url;

use crate::collector::{relative_path, PathCollector, PathFilter};
use crate::config::IndexConfig;
use crate::index::{DiskTextFetcher, SymbolIndex};
use crate::parser::parse_script;
use crate::script::Script;

/// An open editor buffer
pub struct Document {
    pub contents: Rope,
    pub version: Option<i32>,
    pub revision: u64,
}

impl Document {
    pub fn new(text: &str, version: Option<i32>) -> Self {
        Self {
            contents: Rope::from_str(text),
            version,
            revision: 0,
        }
    }

    pub fn apply_change(&mut self, change: TextDocumentContentChangeEvent) {
        if let Some(range) = change.range {
            let start_line = range.start.line as usize;
            let end_line = range.end.line as usize;
            if start_line >= self.contents.len_lines() || end_line >= self.contents.len_lines() {
                log::warn!(
                    "Ignoring edit outside document ({}..{} of {} lines)",
                    start_line,
                    end_line,
                    self.contents.len_lines()
                );
                return;
            }

            let start_line_text = self.contents.line(start_line).to_string();
            let end_line_text = self.contents.line(end_line).to_string();

            let start_char =
                utf16_offset_to_char_offset(&start_line_text, range.start.character as usize);
            let end_char = utf16_offset_to_char_offset(&end_line_text, range.end.character as usize);

            let start_idx = self.contents.line_to_char(start_line) + start_char;
            let end_idx = self.contents.line_to_char(end_line) + end_char;

            self.contents.remove(start_idx..end_idx);
            self.contents.insert(start_idx, &change.text);
        } else {
            // Full document sync
            self.contents = Rope::from_str(&change.text);
        }

        self.revision += 1;
    }

    pub fn text(&self) -> String {
        self.contents.to_string()
    }

    /// Text of `line` without its line terminator
    pub fn line_text(&self, line: usize) -> Option<String> {
        if line >= self.contents.len_lines() {
            return None;
        }
        let text = self.contents.line(line).to_string();
        Some(text.trim_end_matches(['\n', '\r']).to_string())
    }
}

fn utf16_offset_to_char_offset(line_text: &str, utf16_offset: usize) -> usize {
    let mut utf16_count = 0;
    let mut char_count = 0;

    for ch in line_text.chars() {
        if utf16_count >= utf16_offset {
            return char_count;
        }
        utf16_count += ch.len_utf16();
        char_count += 1;
    }
    char_count
}

/// Global LSP state
pub struct WorldState {
    /// Open buffers; authoritative over disk for their URIs
    pub documents: HashMap<Url, Document>,
    pub workspace_folders: Vec<Url>,
    pub config: IndexConfig,
    /// Shared so indexing can run without holding the state lock
    pub index: Arc<SymbolIndex>,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            workspace_folders: Vec::new(),
            config: IndexConfig::default(),
            index: Arc::new(SymbolIndex::with_fetcher(Arc::new(DiskTextFetcher))),
        }
    }

    pub fn open_document(&mut self, uri: Url, text: &str, version: Option<i32>) {
        self.documents.insert(uri.clone(), Document::new(text, version));
        self.reindex_document(&uri);
    }

    /// Apply a batch of edits, then re-parse once
    pub fn apply_changes(
        &mut self,
        uri: &Url,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: Option<i32>,
    ) {
        let Some(doc) = self.documents.get_mut(uri) else {
            log::debug!("Change for unopened document {}", uri);
            return;
        };
        for change in changes {
            doc.apply_change(change);
        }
        doc.version = version;
        self.reindex_document(uri);
    }

    /// Forget the buffer; the caller decides what the index falls back to
    pub fn close_document(&mut self, uri: &Url) -> bool {
        self.documents.remove(uri).is_some()
    }

    pub fn get_document(&self, uri: &Url) -> Option<&Document> {
        self.documents.get(uri)
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    /// Cached Script for a URI (open buffers are always indexed)
    pub fn script(&self, uri: &Url) -> Option<Arc<Script>> {
        self.index.get(uri)
    }

    /// Whether workspace collection would pick up `uri` under the current
    /// configuration: a script extension, inside a workspace folder, and
    /// accepted by the include/exclude globs relative to that folder
    pub fn is_indexable(&self, uri: &Url) -> bool {
        let Ok(path) = uri.to_file_path() else {
            return false;
        };
        let has_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.config.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
        if !has_extension {
            return false;
        }

        let filter = match PathFilter::new(&self.config.include, &self.config.exclude) {
            Ok(filter) => filter,
            Err(err) => {
                log::warn!("{err}");
                return false;
            }
        };
        self.workspace_folders
            .iter()
            .filter_map(|folder| folder.to_file_path().ok())
            .filter_map(|root| relative_path(&root, &path))
            .any(|relative| filter.accepts(&relative))
    }

    /// Re-apply every open buffer to the index
    pub fn reindex_open_documents(&self) {
        for uri in self.documents.keys() {
            self.reindex_document(uri);
        }
    }

    fn reindex_document(&self, uri: &Url) {
        if let Some(doc) = self.documents.get(uri) {
            let script = parse_script(uri, &doc.text());
            self.index.upsert(uri.clone(), script);
        }
    }
}

/// Collect script files from each workspace folder without holding any lock.
///
/// Folders are collected independently: a folder that fails discovery is
/// logged and skipped, files from the other folders are kept.
pub async fn collect_workspace_files(folders: &[Url], config: &IndexConfig) -> Vec<PathBuf> {
    let collector = PathCollector::from_fs().with_extensions(&config.extensions);
    let mut files = Vec::new();

    for folder in folders {
        let Ok(root) = folder.to_file_path() else {
            log::warn!("Skipping non-file workspace folder: {}", folder);
            continue;
        };
        log::info!("Scanning folder: {}", folder);
        match collector
            .collect(&root, &config.include, &config.exclude)
            .await
        {
            Ok(found) => {
                log::info!("Found {} script files in {}", found.len(), root.display());
                files.extend(found);
            }
            Err(err) => log::warn!("Workspace scan failed for {}: {}", folder, err),
        }
    }

    files
}

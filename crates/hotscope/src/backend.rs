//
// backend.rs
//
// Copyright (C) 2022-2026 Posit Software, PBC. All rights reserved.
// Modifications copyright (C) 2026 Jonathan Marc Bearak
//

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tower_lsp::LanguageServer;
use tower_lsp::LspService;
use tower_lsp::Server;

use crate::config::parse_index_config;
use crate::handlers;
use crate::index::{ScriptOptions, SymbolIndex};
use crate::perf;
use crate::state::{collect_workspace_files, WorldState};

/// Re-read a closed file from disk, or drop it when it no longer exists
async fn refresh_from_disk(index: &SymbolIndex, uri: &Url) {
    let exists = match uri.to_file_path() {
        Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
        Err(_) => false,
    };
    if !exists {
        index.invalidate(uri);
        return;
    }
    if let Err(err) = index
        .get_script(uri, ScriptOptions { using_cache: false })
        .await
    {
        log::warn!("Failed to re-index {}: {}", uri, err);
        index.invalidate(uri);
    }
}

/// Drop watched-file events the index must not act on.
///
/// Open docs are authoritative. Created or changed files must pass the same
/// extension and include/exclude rules as workspace collection; deletions
/// always pass so stale entries are dropped.
fn relevant_file_events(state: &WorldState, changes: Vec<FileEvent>) -> Vec<FileEvent> {
    changes
        .into_iter()
        .filter(|change| {
            if state.is_open(&change.uri) {
                log::trace!("Skipping watched file change for open document: {}", change.uri);
                return false;
            }
            if change.typ == FileChangeType::DELETED {
                return true;
            }
            let indexable = state.is_indexable(&change.uri);
            if !indexable {
                log::trace!("Skipping watched file outside the index: {}", change.uri);
            }
            indexable
        })
        .collect()
}

async fn apply_file_events(index: &SymbolIndex, changes: Vec<FileEvent>) {
    for change in changes {
        if change.typ == FileChangeType::DELETED {
            index.invalidate(&change.uri);
        } else {
            refresh_from_disk(index, &change.uri).await;
        }
    }
}

pub struct Backend {
    client: Client,
    state: Arc<RwLock<WorldState>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(RwLock::new(WorldState::new())),
        }
    }

    /// Collect and index every workspace folder.
    ///
    /// Discovery and parsing run without the state lock; open documents are
    /// re-applied afterwards so a stale disk copy never wins over a buffer.
    async fn index_workspace(&self) {
        let (folders, config, index) = {
            let state = self.state.read().await;
            (
                state.workspace_folders.clone(),
                state.config.clone(),
                Arc::clone(&state.index),
            )
        };

        if !config.index_workspace {
            log::info!("Workspace indexing disabled");
            return;
        }

        let scan_start = Instant::now();
        let paths = collect_workspace_files(&folders, &config).await;
        perf::record_workspace_scan(scan_start.elapsed(), paths.len());

        let index_start = Instant::now();
        let summary = index.index_paths(&paths, config.max_file_size_bytes).await;
        perf::record_indexing(index_start.elapsed(), summary.files_indexed, summary.methods);

        {
            let state = self.state.read().await;
            state.reindex_open_documents();
        }

        let message = format!(
            "Indexed {} workspace files ({} methods, {} variables, {} skipped, {} failed)",
            summary.files_indexed,
            summary.methods,
            summary.variables,
            summary.files_skipped,
            summary.files_failed
        );
        log::info!("{}", message);
        self.client.log_message(MessageType::INFO, message).await;
    }

    /// Drop everything and index again under the current configuration, so
    /// newly excluded files disappear and newly included ones show up
    async fn rebuild_index(&self) {
        log::info!("Index configuration changed, rebuilding workspace index");
        {
            let state = self.state.read().await;
            state.index.invalidate_all();
            state.reindex_open_documents();
        }
        self.index_workspace().await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        log::info!("Initializing hotscope");

        let mut state = self.state.write().await;

        if let Some(folders) = params.workspace_folders {
            for folder in folders {
                log::info!("Adding workspace folder: {}", folder.uri);
                state.workspace_folders.push(folder.uri);
            }
        } else if let Some(root_uri) = params.root_uri {
            log::info!("Adding root URI as workspace folder: {}", root_uri);
            state.workspace_folders.push(root_uri);
        }

        if let Some(config) = params
            .initialization_options
            .as_ref()
            .and_then(parse_index_config)
        {
            state.config = config;
        }

        drop(state);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                document_symbol_provider: Some(OneOf::Left(true)),
                completion_provider: Some(CompletionOptions::default()),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: String::from("hotscope"),
                version: Some(String::from(env!("CARGO_PKG_VERSION"))),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("hotscope initialized");

        let _guard = perf::TimingGuard::with_threshold("workspace_index", 2000);
        self.index_workspace().await;
        if let Ok(metrics) = perf::startup_metrics().lock() {
            metrics.log_summary();
        }

        log::info!("Workspace initialization complete");
    }

    async fn shutdown(&self) -> Result<()> {
        log::info!("hotscope shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        let mut state = self.state.write().await;
        state.open_document(doc.uri, &doc.text, Some(doc.version));
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let mut state = self.state.write().await;
        state.apply_changes(
            &uri,
            params.content_changes,
            Some(params.text_document.version),
        );
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;

        let index = {
            let mut state = self.state.write().await;
            state.close_document(&uri);
            Arc::clone(&state.index)
        };

        // The buffer may have held unsaved edits; fall back to disk
        refresh_from_disk(&index, &uri).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        log::trace!("Configuration changed");

        let Some(config) = parse_index_config(&params.settings) else {
            log::debug!("No hotscope section in settings, keeping configuration");
            return;
        };

        let changed = {
            let mut state = self.state.write().await;
            let changed = state.config != config;
            state.config = config;
            changed
        };
        if changed {
            self.rebuild_index().await;
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        log::trace!(
            "Received watched files change: {} changes",
            params.changes.len()
        );

        let (index, changes) = {
            let state = self.state.read().await;
            (
                Arc::clone(&state.index),
                relevant_file_events(&state, params.changes),
            )
        };

        apply_file_events(&index, changes).await;
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let state = self.state.read().await;
        Ok(handlers::document_symbol(&state, &params.text_document.uri))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let _guard = perf::TimingGuard::with_threshold("completion", 50);
        let state = self.state.read().await;
        Ok(handlers::completion(
            &state,
            &params.text_document_position.text_document.uri,
            params.text_document_position.position,
        ))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let state = self.state.read().await;
        Ok(handlers::hover(
            &state,
            &params.text_document_position_params.text_document.uri,
            params.text_document_position_params.position,
        ))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let state = self.state.read().await;
        Ok(handlers::goto_definition(
            &state,
            &params.text_document_position_params.text_document.uri,
            params.text_document_position_params.position,
        ))
    }
}

pub async fn start_lsp() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;

    /// Workspace with a script at the root and another under `vendor/`
    fn vendored_workspace() -> (tempfile::TempDir, Url, Url) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("vendor")).unwrap();
        std::fs::write(dir.path().join("main.ahk"), "Main() {\n}\n").unwrap();
        std::fs::write(dir.path().join("vendor/big.ahk"), "Vendored() {\n}\n").unwrap();
        let main = Url::from_file_path(dir.path().join("main.ahk")).unwrap();
        let vendored = Url::from_file_path(dir.path().join("vendor/big.ahk")).unwrap();
        (dir, main, vendored)
    }

    fn event(uri: &Url, typ: FileChangeType) -> FileEvent {
        FileEvent {
            uri: uri.clone(),
            typ,
        }
    }

    #[tokio::test]
    async fn test_watched_changes_respect_exclude_globs() {
        let (dir, main, vendored) = vendored_workspace();
        let mut state = WorldState::new();
        state.workspace_folders = vec![Url::from_directory_path(dir.path()).unwrap()];
        state.config.exclude = vec!["vendor/*".to_string()];

        let changes = relevant_file_events(
            &state,
            vec![
                event(&main, FileChangeType::CHANGED),
                event(&vendored, FileChangeType::CHANGED),
            ],
        );
        assert_eq!(changes.len(), 1);
        apply_file_events(&state.index, changes).await;

        assert!(state.index.find_methods("Vendored").is_empty());
        assert_eq!(state.index.find_methods("Main").len(), 1);
        assert!(!state.index.contains(&vendored));
    }

    #[tokio::test]
    async fn test_watched_changes_skip_open_and_foreign_files() {
        let (dir, main, vendored) = vendored_workspace();
        let mut state = WorldState::new();
        state.workspace_folders = vec![Url::from_directory_path(dir.path()).unwrap()];
        state.open_document(main.clone(), "Buffer() {\n}\n", Some(1));
        let notes = Url::from_file_path(dir.path().join("notes.txt")).unwrap();

        let changes = relevant_file_events(
            &state,
            vec![
                event(&main, FileChangeType::CHANGED),
                event(&notes, FileChangeType::CREATED),
                event(&vendored, FileChangeType::DELETED),
            ],
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].uri, vendored);
    }

    #[tokio::test]
    async fn test_configuration_change_rebuilds_index() {
        let (dir, main, vendored) = vendored_workspace();
        // Drop the client socket: nothing drains it here, so notifications would block on the bounded channel
        let (service, _) = LspService::new(Backend::new);
        let backend = service.inner();
        {
            let mut state = backend.state.write().await;
            state.workspace_folders = vec![Url::from_directory_path(dir.path()).unwrap()];
        }

        backend.index_workspace().await;
        {
            let state = backend.state.read().await;
            assert!(state.index.contains(&vendored));
            assert_eq!(state.index.find_methods("Vendored").len(), 1);
        }

        backend
            .did_change_configuration(DidChangeConfigurationParams {
                settings: serde_json::json!({ "hotscope": { "exclude": ["vendor/*"] } }),
            })
            .await;

        let state = backend.state.read().await;
        assert!(state.index.find_methods("Vendored").is_empty());
        assert!(!state.index.contains(&vendored));
        assert!(state.index.contains(&main));
    }

    #[tokio::test]
    async fn test_refresh_from_disk_rereads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.ahk");
        std::fs::write(&path, "saved() {\n}\n").unwrap();
        let uri = Url::from_file_path(&path).unwrap();

        let state = WorldState::new();
        state
            .index
            .upsert(uri.clone(), parse_script(&uri, "unsaved() {\n}\n"));
        refresh_from_disk(&state.index, &uri).await;
        assert_eq!(state.index.get(&uri).unwrap().methods[0].name, "saved");

        std::fs::remove_file(&path).unwrap();
        refresh_from_disk(&state.index, &uri).await;
        assert!(!state.index.contains(&uri));
    }
}

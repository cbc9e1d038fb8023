//
// config.rs
//
// Indexing configuration read from LSP settings
//

use crate::collector::DEFAULT_EXTENSIONS;

/// Controls which files are indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Root-relative globs; empty means every script file
    pub include: Vec<String>,
    /// Root-relative globs that remove files from the index
    pub exclude: Vec<String>,
    /// Script extensions without the leading dot
    pub extensions: Vec<String>,
    /// Whether to index workspace folders on startup
    pub index_workspace: bool,
    /// Files above this size are not parsed
    pub max_file_size_bytes: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            index_workspace: true,
            max_file_size_bytes: 512 * 1024, // 512KB
        }
    }
}

/// Parse the `hotscope` section of initialization options or
/// `workspace/didChangeConfiguration` settings.
///
/// Returns `None` when the section is missing. Absent or ill-typed keys keep
/// their defaults.
///
/// ```
/// use hotscope::config::parse_index_config;
///
/// let settings = serde_json::json!({
///     "hotscope": { "exclude": ["lib/*"], "indexWorkspace": false }
/// });
/// let config = parse_index_config(&settings).unwrap();
/// assert_eq!(config.exclude, vec!["lib/*"]);
/// assert!(!config.index_workspace);
/// ```
pub fn parse_index_config(settings: &serde_json::Value) -> Option<IndexConfig> {
    let section = settings.get("hotscope")?;
    let mut config = IndexConfig::default();

    if let Some(v) = string_list(section, "include") {
        config.include = v;
    }
    if let Some(v) = string_list(section, "exclude") {
        config.exclude = v;
    }
    if let Some(v) = string_list(section, "extensions") {
        let extensions: Vec<String> = v
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if !extensions.is_empty() {
            config.extensions = extensions;
        }
    }
    if let Some(v) = section.get("indexWorkspace").and_then(|v| v.as_bool()) {
        config.index_workspace = v;
    }
    if let Some(v) = section.get("maxFileSizeBytes").and_then(|v| v.as_u64()) {
        config.max_file_size_bytes = v as usize;
    }

    log::info!("Index configuration loaded from LSP settings:");
    log::info!("  include: {:?}", config.include);
    log::info!("  exclude: {:?}", config.exclude);
    log::info!("  extensions: {:?}", config.extensions);
    log::info!("  index_workspace: {}", config.index_workspace);
    log::info!("  max_file_size_bytes: {}", config.max_file_size_bytes);

    Some(config)
}

fn string_list(section: &serde_json::Value, key: &str) -> Option<Vec<String>> {
    let values = section.get(key)?.as_array()?;
    Some(
        values
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

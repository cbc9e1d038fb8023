//
// error.rs
//
// Error taxonomy for discovery and indexing
//

use std::path::PathBuf;

use thiserror::Error;
use tower_lsp::lsp_types::Url;

/// Failures surfaced by the I/O-facing parts of the index.
///
/// Purification, parsing and completion are total and never produce these;
/// per-line parse anomalies are absorbed where they occur.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A directory could not be listed (permission, not found, ...)
    #[error("cannot list directory {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An include/exclude pattern is not a valid glob
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The text of a document could not be read
    #[error("cannot read {uri}: {source}")]
    Fetch {
        uri: Url,
        #[source]
        source: std::io::Error,
    },

    /// The URI does not name a local file
    #[error("{uri} is not a local file")]
    NotAFile { uri: Url },

    /// A parse was required but no text source was configured
    #[error("no text source configured to parse {uri}")]
    NoTextSource { uri: Url },
}

//
// completion.rs
//
// Completion composition from indexed methods and variables
//

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, Documentation, InsertTextFormat, Url,
};

use crate::script::{Method, Variable};
use crate::utf16::utf16_column_to_byte_offset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
    Method,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertText {
    Plain(String),
    /// Snippet syntax with a `$1` tab stop
    Snippet(String),
}

/// One completion suggestion, rebuilt for every query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub label: String,
    pub kind: SuggestionKind,
    pub insert_text: InsertText,
    pub detail: Option<String>,
}

impl Suggestion {
    fn method(method: &Method) -> Self {
        if method.params.is_empty() {
            Self {
                label: method.name.clone(),
                kind: SuggestionKind::Method,
                insert_text: InsertText::Plain(format!("{}()", method.name)),
                detail: method.comment.clone(),
            }
        } else {
            Self {
                label: method.full.clone(),
                kind: SuggestionKind::Method,
                insert_text: InsertText::Snippet(format!("{} ($1)", method.name)),
                detail: method.comment.clone(),
            }
        }
    }

    fn variable(name: &str) -> Self {
        Self {
            label: name.to_string(),
            kind: SuggestionKind::Variable,
            insert_text: InsertText::Plain(name.to_string()),
            detail: None,
        }
    }

    pub fn into_completion_item(self) -> CompletionItem {
        let (insert_text, format) = match self.insert_text {
            InsertText::Plain(text) => (text, InsertTextFormat::PLAIN_TEXT),
            InsertText::Snippet(text) => (text, InsertTextFormat::SNIPPET),
        };
        let kind = match self.kind {
            SuggestionKind::Method => CompletionItemKind::METHOD,
            SuggestionKind::Variable => CompletionItemKind::VARIABLE,
        };
        CompletionItem {
            label: self.label,
            kind: Some(kind),
            documentation: self.detail.clone().map(Documentation::String),
            detail: self.detail,
            insert_text: Some(insert_text),
            insert_text_format: Some(format),
            ..Default::default()
        }
    }
}

/// Build the suggestions for a cursor at `line` in `uri`.
///
/// Emits, in order: one item per method (any file); the params then locals of
/// the method in `uri` whose range contains `line`; then every file-scope
/// variable. Nothing is sorted or deduplicated.
///
/// Callers must not invoke this for member access (see [`is_member_access`]).
pub fn compose_completions(
    methods: &[Method],
    uri: &Url,
    line: u32,
    file_variables: &[Variable],
) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    for method in methods {
        suggestions.push(Suggestion::method(method));
        if &method.uri == uri && method.contains_line(line) {
            suggestions.extend(method.local_names().map(Suggestion::variable));
        }
    }

    suggestions.extend(file_variables.iter().map(|v| Suggestion::variable(&v.name)));
    suggestions
}

/// True if the character immediately before the cursor is `.`
pub fn is_member_access(line_text: &str, utf16_col: u32) -> bool {
    let byte_col = utf16_column_to_byte_offset(line_text, utf16_col);
    line_text[..byte_col].ends_with('.')
}

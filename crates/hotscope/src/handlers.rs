//
// handlers.rs
//
// Copyright (C) 2024-2026 Posit Software, PBC. All rights reserved.
// Modifications copyright (C) 2026 Jonathan Marc Bearak
//

use tower_lsp::lsp_types::*;

use crate::completion::{compose_completions, is_member_access};
use crate::purify::is_identifier_char;
use crate::script::{Method, Variable};
use crate::state::WorldState;
use crate::utf16::{byte_offset_to_utf16_column, utf16_column_to_byte_offset};

// ============================================================================
// Position helpers
// ============================================================================

/// The identifier touching `utf16_col`, with its UTF-16 column span
fn identifier_at(line_text: &str, utf16_col: u32) -> Option<(String, u32, u32)> {
    let byte_col = utf16_column_to_byte_offset(line_text, utf16_col);

    let start = line_text[..byte_col]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_identifier_char(*c))
        .last()
        .map_or(byte_col, |(idx, _)| idx);
    let end = line_text[byte_col..]
        .char_indices()
        .find(|(_, c)| !is_identifier_char(*c))
        .map_or(line_text.len(), |(idx, _)| byte_col + idx);

    if start == end {
        return None;
    }
    let word = &line_text[start..end];
    if word.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((
        word.to_string(),
        byte_offset_to_utf16_column(line_text, start),
        byte_offset_to_utf16_column(line_text, end),
    ))
}

fn word_at(state: &WorldState, uri: &Url, position: Position) -> Option<(String, Range)> {
    let line_text = state
        .get_document(uri)?
        .line_text(position.line as usize)?;
    let (word, start, end) = identifier_at(&line_text, position.character)?;
    let range = Range::new(
        Position::new(position.line, start),
        Position::new(position.line, end),
    );
    Some((word, range))
}

/// Range of `name` on `line` when the buffer is open, else the line start
fn name_range(state: &WorldState, uri: &Url, line: u32, name: &str) -> Range {
    let line_text = state
        .get_document(uri)
        .and_then(|doc| doc.line_text(line as usize));
    let span = line_text.and_then(|text| {
        let lower = text.to_lowercase();
        // Lowercasing can change byte lengths outside ASCII
        if lower.len() != text.len() {
            return None;
        }
        let start = find_word(&text, &lower, &name.to_lowercase())?;
        Some((
            byte_offset_to_utf16_column(&text, start),
            byte_offset_to_utf16_column(&text, start + name.len()),
        ))
    });
    let (start, end) = span.unwrap_or((0, 0));
    Range::new(Position::new(line, start), Position::new(line, end))
}

/// Byte offset of the first whole-identifier occurrence of `needle` in
/// `lower` (the lowercased `text`), so `n` never matches inside `fn`
fn find_word(text: &str, lower: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    lower.match_indices(needle).map(|(idx, _)| idx).find(|&idx| {
        let end = idx + needle.len();
        if !text.is_char_boundary(idx) || !text.is_char_boundary(end) {
            return false;
        }
        let before = text[..idx].chars().next_back();
        let after = text[end..].chars().next();
        !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
    })
}

fn line_end(state: &WorldState, uri: &Url, line: u32) -> Position {
    let len = state
        .get_document(uri)
        .and_then(|doc| doc.line_text(line as usize))
        .map_or(0, |text| text.encode_utf16().count() as u32);
    Position::new(line, len)
}

// ============================================================================
// Completion
// ============================================================================

pub fn completion(state: &WorldState, uri: &Url, position: Position) -> Option<CompletionResponse> {
    if let Some(line_text) = state
        .get_document(uri)
        .and_then(|doc| doc.line_text(position.line as usize))
    {
        if is_member_access(&line_text, position.character) {
            log::trace!("Member access at {}:{}, no completions", uri, position.line);
            return None;
        }
    }

    let methods = state.index.all_methods();
    let file_variables = state
        .script(uri)
        .map(|script| script.variables.clone())
        .unwrap_or_default();

    let items: Vec<CompletionItem> =
        compose_completions(&methods, uri, position.line, &file_variables)
            .into_iter()
            .map(|s| s.into_completion_item())
            .collect();

    Some(CompletionResponse::Array(items))
}

// ============================================================================
// Document Symbols
// ============================================================================

#[allow(deprecated)]
fn variable_symbol(state: &WorldState, uri: &Url, variable: &Variable) -> DocumentSymbol {
    let range = name_range(state, uri, variable.line, &variable.name);
    DocumentSymbol {
        name: variable.name.clone(),
        detail: None,
        kind: SymbolKind::VARIABLE,
        tags: None,
        deprecated: None,
        range,
        selection_range: range,
        children: None,
    }
}

#[allow(deprecated)]
fn method_symbol(state: &WorldState, uri: &Url, method: &Method) -> DocumentSymbol {
    let children: Vec<DocumentSymbol> = method
        .variables
        .iter()
        .map(|v| variable_symbol(state, uri, v))
        .collect();
    DocumentSymbol {
        name: method.name.clone(),
        detail: Some(method.full.clone()),
        kind: SymbolKind::FUNCTION,
        tags: None,
        deprecated: None,
        range: Range::new(
            Position::new(method.line, 0),
            line_end(state, uri, method.end_line),
        ),
        selection_range: name_range(state, uri, method.line, &method.name),
        children: (!children.is_empty()).then_some(children),
    }
}

pub fn document_symbol(state: &WorldState, uri: &Url) -> Option<DocumentSymbolResponse> {
    let script = state.script(uri)?;

    let mut symbols: Vec<DocumentSymbol> = script
        .methods
        .iter()
        .map(|m| method_symbol(state, uri, m))
        .collect();
    symbols.extend(script.variables.iter().map(|v| variable_symbol(state, uri, v)));
    symbols.sort_by_key(|s| (s.range.start.line, s.range.start.character));

    Some(DocumentSymbolResponse::Nested(symbols))
}

// ============================================================================
// Go to Definition
// ============================================================================

/// Resolve the identifier under the cursor: enclosing method's params and
/// locals first, then file variables, then methods of that name anywhere.
pub fn goto_definition(
    state: &WorldState,
    uri: &Url,
    position: Position,
) -> Option<GotoDefinitionResponse> {
    let (name, _) = word_at(state, uri, position)?;

    if let Some(script) = state.script(uri) {
        if let Some(method) = script.method_at(position.line) {
            if method.params.iter().any(|p| p.eq_ignore_ascii_case(&name)) {
                let range = name_range(state, uri, method.line, &name);
                return Some(GotoDefinitionResponse::Scalar(Location::new(uri.clone(), range)));
            }
            if let Some(var) = method
                .variables
                .iter()
                .find(|v| v.name.eq_ignore_ascii_case(&name))
            {
                let range = name_range(state, uri, var.line, &var.name);
                return Some(GotoDefinitionResponse::Scalar(Location::new(uri.clone(), range)));
            }
        }
        if let Some(var) = script
            .variables
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(&name))
        {
            let range = name_range(state, uri, var.line, &var.name);
            return Some(GotoDefinitionResponse::Scalar(Location::new(uri.clone(), range)));
        }
    }

    let locations: Vec<Location> = state
        .index
        .find_methods(&name)
        .iter()
        .map(|m| Location::new(m.uri.clone(), name_range(state, &m.uri, m.line, &m.name)))
        .collect();

    match locations.len() {
        0 => None,
        1 => locations.into_iter().next().map(GotoDefinitionResponse::Scalar),
        _ => Some(GotoDefinitionResponse::Array(locations)),
    }
}

// ============================================================================
// Hover
// ============================================================================

pub fn hover(state: &WorldState, uri: &Url, position: Position) -> Option<Hover> {
    let (name, range) = word_at(state, uri, position)?;

    let candidates = state.index.find_methods(&name);
    // Prefer a declaration in the current file
    let method = candidates
        .iter()
        .find(|m| &m.uri == uri)
        .or_else(|| candidates.first())?;

    let mut value = format!("```autohotkey\n{}\n```", method.full);
    if let Some(comment) = &method.comment {
        value.push_str("\n\n");
        value.push_str(&escape_markdown(comment));
    }

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(range),
    })
}

fn escape_markdown(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '*' | '_' | '[' | ']' | '#' | '`' | '\\' => format!("\\{}", c),
            _ => c.to_string(),
        })
        .collect()
}

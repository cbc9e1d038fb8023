//
// parser.rs
//
// Line-oriented method and variable extraction over purified source
//

use regex::Regex;
use std::sync::OnceLock;
use tower_lsp::lsp_types::Url;

use crate::purify::{is_identifier_char, purify};
use crate::reserved_words::is_reserved_word;
use crate::script::{Method, Script, Variable};

/// Compiled regex patterns for declaration and assignment detection.
/// All of them run against purified lines.
struct ParserPatterns {
    declaration: Regex,
    assignment: Regex,
    scope_declaration: Regex,
    for_loop: Regex,
    command: Regex,
    identifier: Regex,
}

fn patterns() -> &'static ParserPatterns {
    static PATTERNS: OnceLock<ParserPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ParserPatterns {
        // Groups: 1=name, 2=parameter text, 3=same-line block opener
        declaration: Regex::new(
            r"^\s*(?:static\s+)?([\p{L}_][\p{L}\p{N}_]*)\(([^()]*)\)\s*(\{.*)?$",
        )
        .unwrap(),
        // `name := x`, legacy `name = x` and compound assignments, but not `==`
        assignment: Regex::new(
            r"^\s*([\p{L}_][\p{L}\p{N}_]*)\s*(?://|<<|>>|[.+\-*/|&^])?:?=(?:[^=]|$)",
        )
        .unwrap(),
        scope_declaration: Regex::new(r"(?i)^\s*(?:global|local|static)\s+(.+)$").unwrap(),
        for_loop: Regex::new(
            r"(?i)^\s*for\s+([\p{L}_][\p{L}\p{N}_]*)(?:\s*,\s*([\p{L}_][\p{L}\p{N}_]*))?\s+in\b",
        )
        .unwrap(),
        command: Regex::new(r"^\s*([\p{L}_][\p{L}\p{N}_]*)\s*,(.*)$").unwrap(),
        identifier: Regex::new(r"^[\p{L}_][\p{L}\p{N}_]*$").unwrap(),
    })
}

/// A method whose body has not been closed yet
struct OpenMethod {
    method: Method,
    /// Block depth before the declaration's opening brace
    start_depth: usize,
    /// Whether the opening brace has been seen
    entered: bool,
}

/// Parse a whole file into its symbol model.
///
/// Never fails: unbalanced blocks, unterminated strings and other
/// in-progress edits degrade the result but parsing always continues at the
/// next line.
pub fn parse_script(uri: &Url, text: &str) -> Script {
    let raw_lines: Vec<&str> = text.lines().collect();
    let purified = purify_lines(&raw_lines);
    let last_line = purified.len().saturating_sub(1) as u32;

    let mut script = Script::empty(uri.clone());
    let mut depth = 0usize;
    let mut open: Option<OpenMethod> = None;

    for (idx, line) in purified.iter().enumerate() {
        let line_num = idx as u32;

        if let Some(Declaration { name, params: param_text, body }) =
            match_declaration(&purified, idx)
        {
            if let Some(previous) = open.take() {
                log::debug!(
                    "{}: method '{}' still open at line {}, closing it",
                    uri,
                    previous.method.name,
                    line_num
                );
                let end = line_num.saturating_sub(1).max(previous.method.line);
                close_method(previous, end, &mut script);
            }

            let method = Method {
                full: format!("{}({})", name, param_text.trim()),
                params: parse_params(&param_text),
                comment: leading_comment(&raw_lines, idx),
                uri: uri.clone(),
                line: line_num,
                end_line: line_num,
                variables: Vec::new(),
                name,
            };
            log::trace!("  Parsed method '{}' at line {}", method.name, line_num);
            open = Some(OpenMethod {
                method,
                start_depth: depth,
                entered: false,
            });
            // One-line bodies: `f(a) { b := a }`
            if let Some(body) = body {
                for name in detect_variables(&body) {
                    add_variable(&mut script, open.as_mut(), name, line_num);
                }
            }
        } else {
            for name in detect_variables(line) {
                add_variable(&mut script, open.as_mut(), name, line_num);
            }
        }

        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    if let Some(current) = open.as_mut() {
                        if depth > current.start_depth {
                            current.entered = true;
                        }
                    }
                }
                '}' => {
                    if depth == 0 {
                        log::debug!("{}: unbalanced '}}' at line {}", uri, line_num);
                    } else {
                        depth -= 1;
                    }
                    let closes = matches!(
                        &open,
                        Some(current) if current.entered && depth <= current.start_depth
                    );
                    if closes {
                        if let Some(current) = open.take() {
                            close_method(current, line_num, &mut script);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if let Some(current) = open.take() {
        log::debug!(
            "{}: method '{}' not closed before end of file",
            uri,
            current.method.name
        );
        let end = last_line.max(current.method.line);
        close_method(current, end, &mut script);
    }

    script
}

fn close_method(open: OpenMethod, end_line: u32, script: &mut Script) {
    let mut method = open.method;
    method.end_line = end_line.max(method.line);
    script.methods.push(method);
}

/// Purify every line, blanking out `/* ... */` block comments
fn purify_lines(raw_lines: &[&str]) -> Vec<String> {
    let mut in_block_comment = false;
    raw_lines
        .iter()
        .map(|raw| {
            if !in_block_comment && raw.trim_start().starts_with("/*") {
                in_block_comment = true;
            }
            if in_block_comment {
                if raw.contains("*/") {
                    in_block_comment = false;
                }
                return String::new();
            }
            purify(raw)
        })
        .collect()
}

/// A declaration line, split into its parts
struct Declaration {
    name: String,
    /// Raw parameter text between the parentheses
    params: String,
    /// Code after a same-line `{`, if any
    body: Option<String>,
}

/// Match a method declaration at `idx`.
///
/// The block opener may be on the same line or on the next non-blank line
/// (Allman style). Anything else is a call, not a declaration.
fn match_declaration(lines: &[String], idx: usize) -> Option<Declaration> {
    let caps = patterns().declaration.captures(&lines[idx])?;
    let name = caps.get(1)?.as_str();
    if is_reserved_word(name) {
        return None;
    }

    let opens_here = caps.get(3).is_some();
    let opens_next = || {
        lines[idx + 1..]
            .iter()
            .find(|l| !l.trim().is_empty())
            .is_some_and(|l| l.trim_start().starts_with('{'))
    };
    if !opens_here && !opens_next() {
        return None;
    }

    let params = caps.get(2).map_or("", |m| m.as_str());
    let body = caps
        .get(3)
        .map(|m| m.as_str()[1..].trim().to_string())
        .filter(|b| !b.is_empty());
    Some(Declaration {
        name: name.to_string(),
        params: params.to_string(),
        body,
    })
}

/// Split a parameter list into bare names.
///
/// Strips `ByRef`/`&` markers, default values and variadic/optional
/// suffixes: `ByRef a, b := 1, &c, d*` → `[a, b, c, d]`.
fn parse_params(text: &str) -> Vec<String> {
    text.split(',')
        .filter_map(|raw| {
            let mut param = raw.trim();
            if let Some(idx) = param.find(":=").or_else(|| param.find('=')) {
                param = param[..idx].trim_end();
            }
            let mut tokens = param.split_whitespace();
            let mut first = tokens.next()?;
            if first.eq_ignore_ascii_case("byref") {
                first = tokens.next()?;
            }
            let name: String = first
                .trim_start_matches('&')
                .chars()
                .take_while(|c| is_identifier_char(*c))
                .collect();
            (!name.is_empty()).then_some(name)
        })
        .collect()
}

/// Collect the contiguous `;` comment block directly above `idx`
fn leading_comment(raw_lines: &[&str], idx: usize) -> Option<String> {
    let mut collected: Vec<&str> = raw_lines[..idx]
        .iter()
        .rev()
        .map(|l| l.trim())
        .take_while(|l| l.starts_with(';'))
        .map(|l| l.trim_start_matches(';').trim())
        .collect();
    collected.reverse();

    let comment = collected.join("\n");
    let comment = comment.trim();
    (!comment.is_empty()).then(|| comment.to_string())
}

/// Detect the variable names a purified line declares or assigns
fn detect_variables(line: &str) -> Vec<String> {
    let patterns = patterns();

    if let Some(caps) = patterns.assignment.captures(line) {
        return caps
            .get(1)
            .map(|m| vec![m.as_str().to_string()])
            .unwrap_or_default();
    }

    if let Some(caps) = patterns.scope_declaration.captures(line) {
        return caps
            .get(1)
            .map(|m| {
                split_top_level(m.as_str())
                    .into_iter()
                    .filter_map(|item| leading_identifier(item.trim()))
                    .collect()
            })
            .unwrap_or_default();
    }

    if let Some(caps) = patterns.for_loop.captures(line) {
        return [caps.get(1), caps.get(2)]
            .into_iter()
            .flatten()
            .map(|m| m.as_str().to_string())
            .collect();
    }

    if let Some(caps) = patterns.command.captures(line) {
        // Bare identifier arguments are output variables; the command name is not
        return caps
            .get(2)
            .map(|m| {
                split_top_level(m.as_str())
                    .into_iter()
                    .map(str::trim)
                    .filter(|arg| patterns.identifier.is_match(arg))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
    }

    Vec::new()
}

/// Split on commas that are not nested inside parentheses or brackets
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn leading_identifier(text: &str) -> Option<String> {
    let name: String = text.chars().take_while(|c| is_identifier_char(*c)).collect();
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic());
    starts_ok.then_some(name)
}

/// Record a variable in the open method or at file scope, first
/// declaration wins (case-insensitive)
fn add_variable(script: &mut Script, open: Option<&mut OpenMethod>, name: String, line: u32) {
    if is_reserved_word(&name) {
        return;
    }

    match open {
        Some(current) => {
            let method = &mut current.method;
            let known = method.params.iter().any(|p| p.eq_ignore_ascii_case(&name))
                || method
                    .variables
                    .iter()
                    .any(|v| v.name.eq_ignore_ascii_case(&name));
            if !known {
                let owner = Some(method.name.clone());
                method.variables.push(Variable::new(name, line, owner));
            }
        }
        None => {
            let known = script
                .variables
                .iter()
                .any(|v| v.name.eq_ignore_ascii_case(&name));
            if !known {
                script.variables.push(Variable::new(name, line, None));
            }
        }
    }
}

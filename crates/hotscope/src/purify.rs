//
// purify.rs
//
// Line purification: neutralize comments, string contents and object
// literals so that line-oriented symbol matching only sees code.
//

/// Scanner state while walking a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InString,
    InLineComment,
}

/// Purify a single source line.
///
/// The result keeps the structural tokens needed for method and variable
/// detection (identifiers, assignment operators, parentheses, block braces)
/// and drops everything that could produce false symbol matches:
///
/// - `;` comments are truncated (`a := 5 ; comment` → `a := 5 `)
/// - string contents are emptied, quotes kept (`s := "x"` → `s := ""`)
/// - object literals in value position are removed (`b := {k: 1}` → `b := `)
/// - command lines using `%` derefs purify to the empty string
/// - a forced-expression `% ` after a command is dropped
/// - whitespace runs after the indentation collapse to a single space
///
/// Every step only deletes characters, and the passes are repeated until the
/// line no longer changes, so `purify(&purify(s)) == purify(s)` always holds.
pub fn purify(line: &str) -> String {
    let mut current = purify_pass(line);
    loop {
        let next = purify_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn purify_pass(line: &str) -> String {
    let stripped = strip_strings_and_comments(line);
    let without_objects = remove_object_literals(&stripped);
    let normalized = normalize_command(&without_objects);
    collapse_whitespace(&normalized)
}

/// Drop `;` comments and the contents of double-quoted strings.
fn strip_strings_and_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut state = ScanState::Normal;
    let mut prev: Option<char> = None;

    for ch in line.chars() {
        match state {
            ScanState::Normal => match ch {
                '"' => {
                    out.push('"');
                    state = ScanState::InString;
                }
                // A comment marker must start the line or follow whitespace
                ';' if prev.map_or(true, char::is_whitespace) => {
                    state = ScanState::InLineComment;
                }
                _ => out.push(ch),
            },
            ScanState::InString => {
                if ch == '"' {
                    out.push('"');
                    state = ScanState::Normal;
                }
            }
            ScanState::InLineComment => break,
        }
        if state == ScanState::InLineComment {
            break;
        }
        prev = Some(ch);
    }

    out
}

/// Remove balanced `{...}` spans that appear where a value is expected.
///
/// Block braces (`foo() {`, `else {`, a lone `{`) are left alone so that
/// block nesting can still be tracked downstream.
fn remove_object_literals(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '{' && is_value_position(&out) {
            if let Some(close) = matching_brace(&chars, i) {
                i = close + 1;
                continue;
            }
        }
        out.push(ch);
        i += 1;
    }

    out
}

fn is_value_position(before: &str) -> bool {
    let trimmed = before.trim_end();
    match trimmed.chars().last() {
        Some('=' | '(' | ',' | '[' | ':' | '?') => true,
        // Binary and unary operators: `s := "a" . {b: 1}`
        Some('.' | '&' | '|' | '+' | '-' | '*' | '/' | '<' | '>' | '!') => true,
        Some(_) => ends_with_word(trimmed, "return"),
        None => false,
    }
}

fn ends_with_word(text: &str, word: &str) -> bool {
    if text.len() < word.len() {
        return false;
    }
    let split = text.len() - word.len();
    if !text.is_char_boundary(split) || !text[split..].eq_ignore_ascii_case(word) {
        return false;
    }
    !text[..split].chars().last().is_some_and(is_identifier_char)
}

fn matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, ch) in chars[open..].iter().enumerate() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Handle the legacy command syntax.
///
/// `Command, ... %var% ...` cannot be matched safely and is dropped entirely;
/// `Command % expr` loses its forced-expression marker.
fn normalize_command(line: &str) -> String {
    let body = line.trim_start_matches([' ', '\t']);
    let indent = &line[..line.len() - body.len()];

    let name_len: usize = body
        .chars()
        .take_while(|c| is_identifier_char(*c))
        .map(char::len_utf8)
        .sum();
    if name_len == 0 {
        return line.to_string();
    }

    let rest = &body[name_len..];
    let after_ws = rest.trim_start_matches([' ', '\t']);

    if after_ws.starts_with(',') && after_ws.contains('%') {
        return String::new();
    }

    let has_gap = after_ws.len() < rest.len();
    if has_gap {
        if let Some(expr) = after_ws.strip_prefix('%') {
            if expr.starts_with([' ', '\t']) {
                let gap = &rest[..rest.len() - after_ws.len()];
                return format!(
                    "{}{}{}{}",
                    indent,
                    &body[..name_len],
                    gap,
                    expr.trim_start_matches([' ', '\t'])
                );
            }
        }
    }

    line.to_string()
}

/// Collapse whitespace runs to a single space, keeping the indentation.
fn collapse_whitespace(line: &str) -> String {
    let body = line.trim_start_matches([' ', '\t']);
    let indent = &line[..line.len() - body.len()];

    let mut out = String::with_capacity(line.len());
    out.push_str(indent);
    let mut in_gap = false;
    for ch in body.chars() {
        if ch == ' ' || ch == '\t' {
            if !in_gap {
                out.push(' ');
            }
            in_gap = true;
        } else {
            out.push(ch);
            in_gap = false;
        }
    }
    out
}

/// Identifier characters: ASCII alphanumerics, `_`, and non-ASCII letters
/// (scripts commonly use CJK identifiers).
pub fn is_identifier_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

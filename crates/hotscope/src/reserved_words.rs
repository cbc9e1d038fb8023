//! Reserved words for AutoHotkey scripts.
//!
//! Control-flow keywords, declaration keywords and operators-as-words can
//! never name a method or a variable. AutoHotkey identifiers are
//! case-insensitive, so the check is too.

/// Keywords that are never user-defined identifiers
pub const RESERVED_WORDS: &[&str] = &[
    "if",
    "else",
    "while",
    "until",
    "loop",
    "for",
    "in",
    "break",
    "continue",
    "return",
    "goto",
    "gosub",
    "switch",
    "case",
    "default",
    "try",
    "catch",
    "finally",
    "throw",
    "global",
    "local",
    "static",
    "class",
    "extends",
    "new",
    "and",
    "or",
    "not",
    "is",
    "byref",
    "true",
    "false",
];

/// Check if a name is a reserved word (case-insensitive).
///
/// # Examples
///
/// ```
/// use hotscope::reserved_words::is_reserved_word;
///
/// assert!(is_reserved_word("if"));
/// assert!(is_reserved_word("Return"));
/// assert!(is_reserved_word("ByRef"));
///
/// assert!(!is_reserved_word("myVar"));
/// assert!(!is_reserved_word("MsgBox"));
/// ```
pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS
        .iter()
        .any(|word| word.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reserved_word_strategy() -> impl Strategy<Value = &'static str> {
        prop::sample::select(RESERVED_WORDS)
    }

    /// Identifiers with a digit suffix can never collide with a keyword
    fn non_reserved_identifier_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z_][a-zA-Z0-9_]{0,10}[0-9]"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_reserved_words_any_case(word in reserved_word_strategy(), upper in any::<bool>()) {
            let candidate = if upper { word.to_uppercase() } else { word.to_string() };
            prop_assert!(is_reserved_word(&candidate));
        }

        #[test]
        fn prop_non_reserved_identifiers_return_false(ident in non_reserved_identifier_strategy()) {
            prop_assert!(!is_reserved_word(&ident));
        }
    }

    #[test]
    fn test_control_flow_reserved_words() {
        for word in ["if", "else", "while", "loop", "for", "switch", "catch", "return"] {
            assert!(is_reserved_word(word), "{} should be reserved", word);
        }
    }

    #[test]
    fn test_commands_are_not_reserved() {
        assert!(!is_reserved_word("MsgBox"));
        assert!(!is_reserved_word("Gui"));
        assert!(!is_reserved_word("MouseGetPos"));
    }

    #[test]
    fn test_edge_cases() {
        assert!(!is_reserved_word(""));
        assert!(!is_reserved_word("if "));
        assert!(!is_reserved_word("elseif"));
        assert!(!is_reserved_word("returned"));
    }
}

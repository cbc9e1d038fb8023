//
// script.rs
//
// Symbol model for a single script file
//

use tower_lsp::lsp_types::Url;

/// A variable declaration or assignment target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    /// 0-based line of the first declaration
    pub line: u32,
    /// Name of the enclosing method, if any (back-reference only)
    pub method: Option<String>,
}

impl Variable {
    pub fn new(name: impl Into<String>, line: u32, method: Option<String>) -> Self {
        Self {
            name: name.into(),
            line,
            method,
        }
    }
}

/// A method (function) declaration and the variables local to its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    /// Display signature, e.g. `foo(a, b := 1)`
    pub full: String,
    /// Bare parameter names in declared order
    pub params: Vec<String>,
    /// Leading `;` comment block, markers stripped
    pub comment: Option<String>,
    /// Owning file
    pub uri: Url,
    /// 0-based declaration line
    pub line: u32,
    /// Last line of the body, inclusive
    pub end_line: u32,
    /// Variables declared within `[line, end_line]`
    pub variables: Vec<Variable>,
}

impl Method {
    /// Check whether `line` falls inside the declaration and body
    pub fn contains_line(&self, line: u32) -> bool {
        self.line <= line && line <= self.end_line
    }

    /// Names visible inside the body: params first, then local variables
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(String::as_str)
            .chain(self.variables.iter().map(|v| v.name.as_str()))
    }
}

/// Parsed symbol model for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub uri: Url,
    /// Methods in declaration order
    pub methods: Vec<Method>,
    /// File-scope variables (not enclosed by any method)
    pub variables: Vec<Variable>,
}

impl Script {
    pub fn empty(uri: Url) -> Self {
        Self {
            uri,
            methods: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// The method whose line range contains `line`
    pub fn method_at(&self, line: u32) -> Option<&Method> {
        self.methods.iter().find(|m| m.contains_line(line))
    }
}

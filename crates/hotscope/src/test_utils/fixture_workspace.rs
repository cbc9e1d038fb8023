//! Deterministic fixture workspace generator for benchmarks and tests.
//!
//! Generates synthetic script workspaces with controlled characteristics:
//! file count, methods per file, file-scope variables, subdirectory fan-out
//! and extra lines of plain code.
//!
//! All output is deterministic (no randomness) so benchmarks are reproducible.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Configuration for generating a fixture workspace.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub file_count: usize,
    pub methods_per_file: usize,
    pub globals_per_file: usize,
    /// Files are spread round-robin over this many subdirectories; 0 keeps
    /// everything at the root
    pub subdirectories: usize,
    pub extra_lines_per_file: usize,
}

/// Command lines sprinkled into generated files so purification has work to do
const COMMANDS: &[&str] = &[
    "MsgBox % \"status: \" . state",
    "Gui, %hwnd%: Color, % color",
    "MouseGetPos, OutputVarX, OutputVarY",
    "Sleep, 100",
    "SetTitleMatchMode, 2",
];

impl FixtureConfig {
    /// Small workspace: 10 files, 5 methods each.
    pub fn small() -> Self {
        Self {
            file_count: 10,
            methods_per_file: 5,
            globals_per_file: 2,
            subdirectories: 0,
            extra_lines_per_file: 5,
        }
    }

    /// Medium workspace: 50 files over 5 directories, 10 methods each.
    pub fn medium() -> Self {
        Self {
            file_count: 50,
            methods_per_file: 10,
            globals_per_file: 5,
            subdirectories: 5,
            extra_lines_per_file: 10,
        }
    }

    /// Large workspace: 200 files over 10 directories, 20 methods each.
    pub fn large() -> Self {
        Self {
            file_count: 200,
            methods_per_file: 20,
            globals_per_file: 10,
            subdirectories: 10,
            extra_lines_per_file: 20,
        }
    }

    /// Root-relative path of file `index`
    pub fn relative_path(&self, index: usize) -> PathBuf {
        let name = format!("file_{}.ahk", index);
        if self.subdirectories == 0 {
            PathBuf::from(name)
        } else {
            PathBuf::from(format!("group_{}", index % self.subdirectories)).join(name)
        }
    }

    /// File-scope variables each generated file declares
    pub fn file_variables_per_file(&self) -> usize {
        // The MouseGetPos line contributes two output variables
        let command_vars = if self.extra_lines_per_file > 0 { 2 } else { 0 };
        self.globals_per_file + self.extra_lines_per_file + command_vars
    }
}

/// Generate the content of a single script file deterministically.
fn generate_script_content(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();

    writeln!(content, "; Generated fixture file {}", index).unwrap();
    for g in 0..config.globals_per_file {
        writeln!(content, "global_{}_{} := {{name: \"g{}\", size: {}}}", index, g, g, g).unwrap();
    }
    content.push('\n');

    for m in 0..config.methods_per_file {
        writeln!(content, "; Computes step {} of file {}", m, index).unwrap();
        writeln!(
            content,
            "method_{}_{}(ByRef x, y := {}) {{",
            index,
            m,
            m + 1
        )
        .unwrap();
        writeln!(content, "    result := x + y * {} ; scale", m + 1).unwrap();
        writeln!(content, "    if (result = \"\") {{").unwrap();
        writeln!(content, "        return 0").unwrap();
        writeln!(content, "    }}").unwrap();
        writeln!(content, "    return result").unwrap();
        writeln!(content, "}}").unwrap();
        content.push('\n');
    }

    if config.extra_lines_per_file > 0 {
        writeln!(content, "{}", COMMANDS[2]).unwrap();
    }
    for line_i in 0..config.extra_lines_per_file {
        writeln!(content, "var_{}_{} := \"value {}\"", index, line_i, line_i).unwrap();
        let command = COMMANDS[(index + line_i) % COMMANDS.len()];
        if command != COMMANDS[2] {
            writeln!(content, "{}", command).unwrap();
        }
    }

    content
}

/// Create a temporary fixture workspace from the given configuration.
///
/// The directory is cleaned up when the `TempDir` is dropped. Calling this
/// twice with the same `FixtureConfig` produces byte-identical files.
pub fn create_fixture_workspace(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture workspace");
    write_fixture_workspace(temp_dir.path(), config);
    temp_dir
}

/// Write fixture files into an existing directory.
pub fn write_fixture_workspace(dir: &Path, config: &FixtureConfig) {
    for i in 0..config.file_count {
        let relative = config.relative_path(i);
        let filepath = dir.join(&relative);
        if let Some(parent) = filepath.parent() {
            std::fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("Failed to create {}: {}", parent.display(), e));
        }
        std::fs::write(&filepath, generate_script_content(i, config))
            .unwrap_or_else(|e| panic!("Failed to write fixture file {}: {}", relative.display(), e));
    }
}

// lib.rs - Library crate root shared by the binary, benchmarks and integration tests.
//
// The binary entry point lives in main.rs and only drives `backend` and `cli`.

pub mod backend;
pub mod cli;
pub mod collector;
pub mod completion;
pub mod config;
pub mod error;
pub mod handlers;
pub mod index;
pub mod parser;
pub mod perf;
pub mod purify;
pub mod reserved_words;
pub mod script;
pub mod state;
pub mod utf16;


// test_utils is available in test builds and when the `test-support` feature is enabled.
// This allows benchmarks and integration tests to import directly instead of #[path] hacks.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

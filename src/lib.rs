// Line buffer module
pub mod buffer;

// File operations module
pub mod file;

// Single-range edit primitives
pub mod edit;

// Batch edit coordinator
pub mod batch;

// Name filtering for directory listings
pub mod filter;

// Runtime configuration
pub mod config;

// Tool catalogue
pub mod tools;

// JSON-RPC stdio server
pub mod server;

// JSON output module
pub mod json;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use buffer::{ContentMismatch, LineBuffer, normalize, split_lines, verify_line};
pub use file::{
    DiskStore, EntryKind, FileContent, FileError, FileStore, assert_exists, checksum, read_file,
    resolve_absolute,
};
pub use edit::{
    EditError, InsertPosition, LineEdit, RegexReplacement, apply_line_edit, delete_lines,
    insert_lines, regex_replace, replace_lines,
};
pub use batch::{
    BatchCoordinator, BatchError, BatchOutput, BatchReport, EditOutcome, EditRequest,
    OutcomeStatus, ShiftRecord, apply_batch,
};
pub use filter::{NameFilter, match_glob};
pub use config::{Config, ConfigError};
pub use tools::{FileTools, ToolDefinition, ToolError, ToolOutput};
pub use server::Server;
pub use json::{BatchRequest, BatchResponse, EditResultJson, generate_execution_id};

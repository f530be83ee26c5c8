use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::batch::{BatchCoordinator, BatchError, EditRequest};
use crate::config::Config;
use crate::edit::{EditError, InsertPosition, LineEdit, apply_line_edit_to_file, regex_replace_in_file};
use crate::file::{EntryKind, FileError, FileStore, resolve_absolute};
use crate::filter::NameFilter;

pub const READ_FILE: &str = "read_file";
pub const SEARCH_FILE: &str = "search_file";
pub const INSERT_LINES: &str = "insert_lines";
pub const DELETE_LINES: &str = "delete_lines";
pub const REPLACE_LINES: &str = "replace_lines";
pub const REPLACE_REGEX: &str = "replace_regex";
pub const MULTI_EDIT: &str = "multi_edit";
pub const LIST_DIRECTORY: &str = "list_directory";

/// Name, description and JSON schema of a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Text produced by a tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// A call that could not be dispatched at all
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
}

/// Failure of a dispatched tool, reported back as error output
#[derive(Debug, thiserror::Error)]
enum ToolFailure {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("Invalid regex pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("{0}")]
    Request(String),
}

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
    #[serde(default)]
    start_line: Option<usize>,
    #[serde(default)]
    end_line: Option<usize>,
}

#[derive(Deserialize)]
struct SearchFileArgs {
    path: String,
    pattern: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Deserialize)]
struct InsertLinesArgs {
    path: String,
    line: usize,
    #[serde(default)]
    position: InsertPosition,
    text: String,
    #[serde(default)]
    expected_line_text: Option<String>,
}

#[derive(Deserialize)]
struct DeleteLinesArgs {
    path: String,
    start_line: usize,
    end_line: usize,
    expected_start_line_text: String,
}

#[derive(Deserialize)]
struct ReplaceLinesArgs {
    path: String,
    start_line: usize,
    end_line: usize,
    expected_start_line_text: String,
    text: String,
}

#[derive(Deserialize)]
struct ReplaceRegexArgs {
    path: String,
    pattern: String,
    replacement: String,
    #[serde(default)]
    allow_multiple: bool,
}

#[derive(Deserialize)]
struct MultiEditArgs {
    path: String,
    edits: Vec<EditRequest>,
    #[serde(default)]
    expected_checksum: Option<String>,
}

#[derive(Deserialize)]
struct ListDirectoryArgs {
    path: String,
    #[serde(default)]
    include: Option<String>,
    #[serde(default)]
    exclude: Option<String>,
    #[serde(default)]
    recursive: bool,
}

fn decode<T: for<'de> Deserialize<'de>>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// The catalogue of file tools, bound to one store and configuration
///
/// Failures of the operation itself come back as an error `ToolOutput` so the
/// caller can read the message. Only an unknown tool or undecodable arguments
/// are a `ToolError`.
pub struct FileTools<S: FileStore> {
    store: S,
    config: Config,
}

impl<S: FileStore> FileTools<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self { store, config }
    }

    /// Definitions of every tool, in a stable order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        definitions()
    }

    /// Dispatch a call by tool name
    pub fn call(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        let result = match name {
            READ_FILE => self.read_file(decode(name, arguments)?),
            SEARCH_FILE => self.search_file(decode(name, arguments)?),
            INSERT_LINES => self.insert_lines(decode(name, arguments)?),
            DELETE_LINES => self.delete_lines(decode(name, arguments)?),
            REPLACE_LINES => self.replace_lines(decode(name, arguments)?),
            REPLACE_REGEX => self.replace_regex(decode(name, arguments)?),
            MULTI_EDIT => self.multi_edit(decode(name, arguments)?),
            LIST_DIRECTORY => self.list_directory(decode(name, arguments)?),
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };

        Ok(match result {
            Ok(text) => ToolOutput::success(text),
            Err(e) => {
                warn!(tool = name, error = %e, "tool call failed");
                ToolOutput::error(e.to_string())
            }
        })
    }

    fn existing_file(&self, path: &str) -> Result<std::path::PathBuf, ToolFailure> {
        let resolved = resolve_absolute(path)?;
        self.store.assert_exists(&resolved, EntryKind::File)?;
        Ok(resolved)
    }

    fn read_file(&self, args: ReadFileArgs) -> Result<String, ToolFailure> {
        let path = self.existing_file(&args.path)?;
        let buffer = self.store.snapshot(&path)?.lines();

        let start = args.start_line.unwrap_or(1).max(1);
        if let Some(end) = args.end_line.filter(|&end| end < start) {
            return Err(ToolFailure::Request(format!(
                "Invalid range: start line {} is after end line {}",
                start, end
            )));
        }
        let end = args.end_line.unwrap_or(buffer.len()).min(buffer.len());
        if start > buffer.len() {
            return Err(ToolFailure::Request(format!(
                "Start line {} is beyond the end of {} ({} lines)",
                start,
                path.display(),
                buffer.len()
            )));
        }

        let numbered: Vec<String> = (start..=end)
            .filter_map(|n| buffer.line(n).map(|line| format!("{}: {}", n, line)))
            .collect();
        Ok(numbered.join("\n"))
    }

    fn search_file(&self, args: SearchFileArgs) -> Result<String, ToolFailure> {
        let path = self.existing_file(&args.path)?;
        let regex = Regex::new(&args.pattern).map_err(|e| ToolFailure::Pattern {
            pattern: args.pattern.clone(),
            message: e.to_string(),
        })?;
        if args.max_results == Some(0) {
            return Err(ToolFailure::Request("max_results must be at least 1".to_string()));
        }
        let limit = args
            .max_results
            .unwrap_or(self.config.max_search_results)
            .min(self.config.max_search_results);

        let buffer = self.store.snapshot(&path)?.lines();
        let matches: Vec<String> = buffer
            .lines()
            .iter()
            .enumerate()
            .filter(|(_, line)| regex.is_match(line))
            .map(|(i, line)| format!("{}: {}", i + 1, line))
            .collect();

        if matches.is_empty() {
            return Ok(format!(
                "No matches found for pattern '{}' in {}",
                args.pattern,
                path.display()
            ));
        }

        let total = matches.len();
        let mut text = matches.into_iter().take(limit).collect::<Vec<_>>().join("\n");
        if total > limit {
            text.push_str(&format!("\n[... {} more matches not shown ...]", total - limit));
        }
        Ok(text)
    }

    fn insert_lines(&self, args: InsertLinesArgs) -> Result<String, ToolFailure> {
        let path = self.existing_file(&args.path)?;
        let edit = LineEdit::Insert {
            line: args.line,
            position: args.position,
            text: args.text,
            expected_text: args.expected_line_text,
        };
        let inserted = apply_line_edit_to_file(&self.store, &path, &edit)?;

        Ok(if args.line == 0 {
            format!("Appended {} line(s) to the end of {}.", inserted, path.display())
        } else {
            let side = match args.position {
                InsertPosition::Before => "before",
                InsertPosition::After => "after",
            };
            format!(
                "Inserted {} line(s) {} line {} in {}.",
                inserted,
                side,
                args.line,
                path.display()
            )
        })
    }

    fn delete_lines(&self, args: DeleteLinesArgs) -> Result<String, ToolFailure> {
        let path = self.existing_file(&args.path)?;
        let edit = LineEdit::Delete {
            start: args.start_line,
            end: args.end_line,
            expected_start_text: args.expected_start_line_text,
        };
        apply_line_edit_to_file(&self.store, &path, &edit)?;

        Ok(format!(
            "Deleted lines {}-{} from {}.",
            args.start_line,
            args.end_line,
            path.display()
        ))
    }

    fn replace_lines(&self, args: ReplaceLinesArgs) -> Result<String, ToolFailure> {
        let path = self.existing_file(&args.path)?;
        let edit = LineEdit::Replace {
            start: args.start_line,
            end: args.end_line,
            expected_start_text: args.expected_start_line_text,
            text: args.text,
        };
        let shift = apply_line_edit_to_file(&self.store, &path, &edit)?;

        Ok(format!(
            "Replaced lines {}-{} in {} (shift: {:+} lines).",
            args.start_line,
            args.end_line,
            path.display(),
            shift
        ))
    }

    fn replace_regex(&self, args: ReplaceRegexArgs) -> Result<String, ToolFailure> {
        let path = self.existing_file(&args.path)?;
        let count = regex_replace_in_file(
            &self.store,
            &path,
            &args.pattern,
            &args.replacement,
            args.allow_multiple,
        )?;

        Ok(format!(
            "Replaced {} occurrence(s) of '{}' in {}.",
            count,
            args.pattern,
            path.display()
        ))
    }

    fn multi_edit(&self, args: MultiEditArgs) -> Result<String, ToolFailure> {
        let path = self.existing_file(&args.path)?;
        debug!(path = %path.display(), edits = args.edits.len(), "multi_edit");

        let report = BatchCoordinator::new(&self.store).apply(
            &path,
            &args.edits,
            args.expected_checksum.as_deref(),
        )?;
        Ok(report.to_string())
    }

    fn list_directory(&self, args: ListDirectoryArgs) -> Result<String, ToolFailure> {
        let root = resolve_absolute(&args.path)?;
        self.store.assert_exists(&root, EntryKind::Directory)?;
        let filter = NameFilter::new(args.include.as_deref(), args.exclude.as_deref()).map_err(|e| {
            ToolFailure::Pattern {
                pattern: args.include.clone().or(args.exclude.clone()).unwrap_or_default(),
                message: e.to_string(),
            }
        })?;

        let mut entries = Vec::new();
        collect_entries(&root, &root, &filter, args.recursive, &mut entries)?;
        entries.sort();

        if entries.is_empty() {
            return Ok(format!("No entries found in {}", root.display()));
        }

        let total = entries.len();
        let limit = self.config.max_list_entries;
        let mut text = entries.into_iter().take(limit).collect::<Vec<_>>().join("\n");
        if total > limit {
            text.push_str(&format!("\n[... {} more entries not shown ...]", total - limit));
        }
        Ok(text)
    }
}

fn collect_entries(
    root: &Path,
    dir: &Path,
    filter: &NameFilter,
    recursive: bool,
    out: &mut Vec<String>,
) -> Result<(), FileError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type()?.is_dir();
        let relative = path.strip_prefix(root).unwrap_or(&path).display().to_string();

        if filter.allows(&name) {
            out.push(if is_dir { format!("{}/", relative) } else { relative });
        }
        if is_dir && recursive {
            collect_entries(root, &path, filter, recursive, out)?;
        }
    }
    Ok(())
}

/// Definitions of every file tool
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: READ_FILE,
            description: "Read a file, returning each line prefixed with its 1-indexed line number \
                          (format `N: text`). Optionally restrict to start_line..end_line. \
                          The path must be absolute.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute path of the file"},
                    "start_line": {"type": "integer", "minimum": 1, "description": "First line to return (1-indexed)"},
                    "end_line": {"type": "integer", "minimum": 1, "description": "Last line to return (inclusive)"}
                },
                "required": ["path"]
            }),
        },
        ToolDefinition {
            name: SEARCH_FILE,
            description: "Search a file for lines matching a regular expression. Returns matching \
                          lines prefixed with their line numbers.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute path of the file"},
                    "pattern": {"type": "string", "description": "Regular expression to match against each line"},
                    "max_results": {"type": "integer", "minimum": 1, "description": "Maximum number of matching lines to return"}
                },
                "required": ["path", "pattern"]
            }),
        },
        ToolDefinition {
            name: INSERT_LINES,
            description: "Insert text before or after a line. Line 0 appends to the end of the file. \
                          For any other line, expected_line_text must match that line's current content \
                          (whitespace differences are ignored).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute path of the file"},
                    "line": {"type": "integer", "minimum": 0, "description": "Target line (1-indexed), or 0 to append"},
                    "position": {"type": "string", "enum": ["before", "after"], "description": "Insert before or after the target line (default: after)"},
                    "text": {"type": "string", "description": "Text to insert; may span several lines"},
                    "expected_line_text": {"type": "string", "description": "Current content of the target line"}
                },
                "required": ["path", "line", "text"]
            }),
        },
        ToolDefinition {
            name: DELETE_LINES,
            description: "Delete lines start_line..end_line (inclusive). expected_start_line_text must \
                          match the current content of start_line.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute path of the file"},
                    "start_line": {"type": "integer", "minimum": 1, "description": "First line to delete (1-indexed)"},
                    "end_line": {"type": "integer", "minimum": 1, "description": "Last line to delete (inclusive)"},
                    "expected_start_line_text": {"type": "string", "description": "Current content of start_line"}
                },
                "required": ["path", "start_line", "end_line", "expected_start_line_text"]
            }),
        },
        ToolDefinition {
            name: REPLACE_LINES,
            description: "Replace lines start_line..end_line (inclusive) with new text. \
                          expected_start_line_text must match the current content of start_line.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute path of the file"},
                    "start_line": {"type": "integer", "minimum": 1, "description": "First line to replace (1-indexed)"},
                    "end_line": {"type": "integer", "minimum": 1, "description": "Last line to replace (inclusive)"},
                    "expected_start_line_text": {"type": "string", "description": "Current content of start_line"},
                    "text": {"type": "string", "description": "Replacement text; may span several lines"}
                },
                "required": ["path", "start_line", "end_line", "expected_start_line_text", "text"]
            }),
        },
        ToolDefinition {
            name: REPLACE_REGEX,
            description: "Replace matches of a regular expression across the whole file. Fails when \
                          nothing matches, or when several places match and allow_multiple is false.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute path of the file"},
                    "pattern": {"type": "string", "description": "Regular expression to replace"},
                    "replacement": {"type": "string", "description": "Replacement text; $1 or ${name} refer to capture groups"},
                    "allow_multiple": {"type": "boolean", "description": "Replace every occurrence instead of requiring exactly one"}
                },
                "required": ["path", "pattern", "replacement"]
            }),
        },
        ToolDefinition {
            name: MULTI_EDIT,
            description: "Apply several line-range replacements to one file in a single write. All line \
                          numbers refer to the file as it is before the call; later edits are shifted \
                          automatically. Ranges must not overlap. Each edit succeeds or fails on its own.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute path of the file"},
                    "edits": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "line_start": {"type": "integer", "minimum": 1, "description": "First line to replace (1-indexed)"},
                                "line_end": {"type": "integer", "minimum": 1, "description": "Last line to replace (inclusive)"},
                                "expected_start_line_text": {"type": "string", "description": "Current content of line_start"},
                                "replacement_text": {"type": "string", "description": "Replacement text; may span several lines"}
                            },
                            "required": ["line_start", "line_end", "expected_start_line_text", "replacement_text"]
                        }
                    },
                    "expected_checksum": {"type": "string", "description": "BLAKE3 hex checksum the file must still have"}
                },
                "required": ["path", "edits"]
            }),
        },
        ToolDefinition {
            name: LIST_DIRECTORY,
            description: "List a directory. include/exclude are glob patterns matched against bare entry \
                          names (`*` any run of characters, `?` one character). Directories end in `/`.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Absolute path of the directory"},
                    "include": {"type": "string", "description": "Only list names matching this pattern"},
                    "exclude": {"type": "string", "description": "Skip names matching this pattern"},
                    "recursive": {"type": "boolean", "description": "Descend into subdirectories"}
                },
                "required": ["path"]
            }),
        },
    ]
}

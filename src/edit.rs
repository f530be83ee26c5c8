use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::{ContentMismatch, LineBuffer, split_lines, verify_line};
use crate::file::{FileError, FileStore};

/// Where inserted text goes relative to its target line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    Before,
    #[default]
    After,
}

/// A single line-range edit, checked against the line it targets before it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEdit {
    /// Remove lines `start..=end`
    Delete {
        start: usize,
        end: usize,
        expected_start_text: String,
    },
    /// Splice `text` before or after `line`; line 0 appends to the end
    Insert {
        line: usize,
        position: InsertPosition,
        text: String,
        expected_text: Option<String>,
    },
    /// Swap lines `start..=end` for the lines of `text`
    Replace {
        start: usize,
        end: usize,
        expected_start_text: String,
        text: String,
    },
}

/// Error types for edit operations
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// Range does not fit the buffer it is applied to
    #[error("Line range {start}-{end} is out of range (file has {len} lines)")]
    OutOfRange { start: usize, end: usize, len: usize },

    /// Target lines are absent from the original snapshot
    #[error("Line(s) {start}-{end} not found. File has {len} lines.")]
    NotFound { start: usize, end: usize, len: usize },

    /// Target lines existed originally but earlier edits removed them
    #[error(
        "Line(s) {start}-{end} no longer exist after earlier edits in this batch \
         (translated start line {translated_start}, buffer now has {len} lines)"
    )]
    ShiftedOutOfRange {
        start: usize,
        end: usize,
        translated_start: i64,
        len: usize,
    },

    /// Start line comes after end line
    #[error("Invalid range: start line {start} is after end line {end}")]
    InvalidRange { start: usize, end: usize },

    #[error("Expected text for line {0} is required to verify the edit target")]
    MissingExpectedText(usize),

    #[error(transparent)]
    ContentMismatch(#[from] ContentMismatch),

    #[error("Invalid regex pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("No matches found for pattern '{0}'")]
    NoMatch(String),

    #[error(
        "Pattern '{pattern}' matched {count} times. Set allow_multiple to replace all occurrences, \
         or use a more specific pattern."
    )]
    AmbiguousMatch { pattern: String, count: usize },

    #[error(transparent)]
    File(#[from] FileError),
}

impl EditError {
    /// Whether the edit failed because its target lines do not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, EditError::NotFound { .. } | EditError::ShiftedOutOfRange { .. })
    }
}

/// Result of a whole-text regex substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexReplacement {
    /// Text after substitution
    pub content: String,
    /// Number of occurrences that were replaced
    pub count: usize,
}

fn check_range(buffer: &LineBuffer, start: usize, end: usize) -> Result<(), EditError> {
    if start > end {
        return Err(EditError::InvalidRange { start, end });
    }
    if start < 1 || end > buffer.len() {
        return Err(EditError::OutOfRange {
            start,
            end,
            len: buffer.len(),
        });
    }
    Ok(())
}

/// Delete lines `start..=end` (1-indexed, inclusive)
///
/// # Returns
/// * `Ok(usize)` - Number of lines removed
/// * `Err(EditError::OutOfRange)` if the range does not fit the buffer
pub fn delete_lines(buffer: &mut LineBuffer, start: usize, end: usize) -> Result<usize, EditError> {
    check_range(buffer, start, end)?;
    buffer.splice(start - 1, end - 1, Vec::new());
    Ok(end - start + 1)
}

/// Insert the lines of `text` next to `target_line`
///
/// `target_line == 0` always appends after the last line regardless of
/// `position`. Appending to an empty file replaces its single empty line.
///
/// # Returns
/// * `Ok(usize)` - Number of lines inserted
pub fn insert_lines(
    buffer: &mut LineBuffer,
    target_line: usize,
    position: InsertPosition,
    text: &str,
) -> Result<usize, EditError> {
    let new_lines = split_lines(text);
    let inserted = new_lines.len();

    if target_line == 0 {
        if buffer.len() == 1 && buffer.lines()[0].is_empty() {
            *buffer = LineBuffer::from_lines(new_lines);
        } else {
            let at = buffer.len();
            buffer.insert_at(at, new_lines);
        }
        return Ok(inserted);
    }

    check_range(buffer, target_line, target_line)?;
    let at = match position {
        InsertPosition::Before => target_line - 1,
        InsertPosition::After => target_line,
    };
    buffer.insert_at(at, new_lines);
    Ok(inserted)
}

/// Replace lines `start..=end` with the lines of `text`
///
/// # Returns
/// * `Ok(i64)` - Line shift: new line count minus replaced line count
pub fn replace_lines(buffer: &mut LineBuffer, start: usize, end: usize, text: &str) -> Result<i64, EditError> {
    check_range(buffer, start, end)?;
    let new_lines = split_lines(text);
    let shift = new_lines.len() as i64 - (end - start + 1) as i64;
    buffer.splice(start - 1, end - 1, new_lines);
    Ok(shift)
}

/// Substitute `pattern` with `replacement` across the whole text
///
/// Occurrences are counted first: none is a `NoMatch` failure, and more than
/// one without `allow_multiple` is an `AmbiguousMatch` failure. `replacement`
/// may reference capture groups as `$1` or `${name}`.
pub fn regex_replace(
    text: &str,
    pattern: &str,
    replacement: &str,
    allow_multiple: bool,
) -> Result<RegexReplacement, EditError> {
    let regex = Regex::new(pattern).map_err(|e| EditError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let count = regex.find_iter(text).count();
    if count == 0 {
        return Err(EditError::NoMatch(pattern.to_string()));
    }
    if count > 1 && !allow_multiple {
        return Err(EditError::AmbiguousMatch {
            pattern: pattern.to_string(),
            count,
        });
    }

    Ok(RegexReplacement {
        content: regex.replace_all(text, replacement).into_owned(),
        count,
    })
}

/// Verify the edit's target line, then apply it to the buffer
///
/// # Returns
/// * `Ok(i64)` - Line shift produced by the edit
/// * `Err(EditError)` - Range, verification, or missing-text failure; the
///   buffer is untouched in that case
pub fn apply_line_edit(buffer: &mut LineBuffer, edit: &LineEdit) -> Result<i64, EditError> {
    match edit {
        LineEdit::Delete {
            start,
            end,
            expected_start_text,
        } => {
            check_range(buffer, *start, *end)?;
            verify_line(buffer, *start, expected_start_text)?;
            let removed = delete_lines(buffer, *start, *end)?;
            Ok(-(removed as i64))
        }
        LineEdit::Insert {
            line,
            position,
            text,
            expected_text,
        } => {
            if *line != 0 {
                check_range(buffer, *line, *line)?;
                let expected = expected_text
                    .as_deref()
                    .ok_or(EditError::MissingExpectedText(*line))?;
                verify_line(buffer, *line, expected)?;
            }
            let inserted = insert_lines(buffer, *line, *position, text)?;
            Ok(inserted as i64)
        }
        LineEdit::Replace {
            start,
            end,
            expected_start_text,
            text,
        } => {
            check_range(buffer, *start, *end)?;
            verify_line(buffer, *start, expected_start_text)?;
            replace_lines(buffer, *start, *end, text)
        }
    }
}

/// Read a file, apply one verified line edit, and write it back
///
/// Nothing is written when the edit fails.
pub fn apply_line_edit_to_file<S: FileStore>(store: &S, path: &Path, edit: &LineEdit) -> Result<i64, EditError> {
    let snapshot = store.snapshot(path)?;
    let mut buffer = snapshot.lines();

    let shift = apply_line_edit(&mut buffer, edit)?;
    store.write_whole(path, &buffer.join())?;

    debug!(path = %path.display(), shift, "applied line edit");
    Ok(shift)
}

/// Read a file, run a regex substitution over it, and write it back
pub fn regex_replace_in_file<S: FileStore>(
    store: &S,
    path: &Path,
    pattern: &str,
    replacement: &str,
    allow_multiple: bool,
) -> Result<usize, EditError> {
    let snapshot = store.snapshot(path)?;
    let result = regex_replace(&snapshot.content, pattern, replacement, allow_multiple)?;
    store.write_whole(path, &result.content)?;

    debug!(path = %path.display(), count = result.count, "applied regex replacement");
    Ok(result.count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(text: &str) -> LineBuffer {
        LineBuffer::from_text(text)
    }

    #[test]
    fn test_delete_lines() {
        let mut buf = buffer("a\nb\nc\nd");
        assert_eq!(delete_lines(&mut buf, 2, 3).unwrap(), 2);
        assert_eq!(buf.join(), "a\nd");
    }

    #[test]
    fn test_delete_lines_out_of_range_cites_length() {
        let mut buf = buffer("a\nb");
        let err = delete_lines(&mut buf, 2, 5).unwrap_err();
        match err {
            EditError::OutOfRange { len, .. } => assert_eq!(len, 2),
            other => panic!("Expected EditError::OutOfRange, got {:?}", other),
        }
        assert_eq!(buf.join(), "a\nb");
    }

    #[test]
    fn test_delete_lines_inverted_range() {
        let mut buf = buffer("a\nb\nc");
        assert!(matches!(
            delete_lines(&mut buf, 3, 2),
            Err(EditError::InvalidRange { start: 3, end: 2 })
        ));
    }

    #[test]
    fn test_insert_before_and_after() {
        let mut buf = buffer("a\nb");
        insert_lines(&mut buf, 1, InsertPosition::Before, "x").unwrap();
        assert_eq!(buf.join(), "x\na\nb");

        insert_lines(&mut buf, 3, InsertPosition::After, "y\nz").unwrap();
        assert_eq!(buf.join(), "x\na\nb\ny\nz");
    }

    #[test]
    fn test_insert_line_zero_appends_regardless_of_position() {
        let mut buf = buffer("a\nb");
        insert_lines(&mut buf, 0, InsertPosition::Before, "end").unwrap();
        assert_eq!(buf.join(), "a\nb\nend");
    }

    #[test]
    fn test_insert_into_empty_file() {
        let mut buf = buffer("");
        insert_lines(&mut buf, 0, InsertPosition::After, "first").unwrap();
        assert_eq!(buf.join(), "first");
    }

    #[test]
    fn test_insert_out_of_range() {
        let mut buf = buffer("a");
        assert!(matches!(
            insert_lines(&mut buf, 3, InsertPosition::After, "x"),
            Err(EditError::OutOfRange { len: 1, .. })
        ));
    }

    #[test]
    fn test_replace_lines_reports_shift() {
        let mut buf = buffer("1\n2\n3\n4");
        assert_eq!(replace_lines(&mut buf, 2, 3, "two").unwrap(), -1);
        assert_eq!(buf.join(), "1\ntwo\n4");

        assert_eq!(replace_lines(&mut buf, 1, 1, "a\nb\nc").unwrap(), 2);
        assert_eq!(buf.join(), "a\nb\nc\ntwo\n4");
    }

    #[test]
    fn test_regex_replace_single() {
        let result = regex_replace("let x = 1;\nlet y = 2;", r"x = (\d)", "x = $1$1", false).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.content, "let x = 11;\nlet y = 2;");
    }

    #[test]
    fn test_regex_replace_no_match() {
        assert!(matches!(
            regex_replace("abc", "z+", "y", false),
            Err(EditError::NoMatch(_))
        ));
    }

    #[test]
    fn test_regex_replace_ambiguous_reports_count() {
        match regex_replace("foo foo foo", "foo", "bar", false) {
            Err(EditError::AmbiguousMatch { count, .. }) => assert_eq!(count, 3),
            other => panic!("Expected EditError::AmbiguousMatch, got {:?}", other),
        }

        let result = regex_replace("foo foo foo", "foo", "bar", true).unwrap();
        assert_eq!(result.count, 3);
        assert_eq!(result.content, "bar bar bar");
    }

    #[test]
    fn test_regex_replace_invalid_pattern() {
        assert!(matches!(
            regex_replace("abc", "(", "x", false),
            Err(EditError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_apply_line_edit_verifies_before_mutating() {
        let mut buf = buffer("fn a() {}\nfn b() {}");
        let edit = LineEdit::Replace {
            start: 2,
            end: 2,
            expected_start_text: "fn c() {}".to_string(),
            text: "fn z() {}".to_string(),
        };

        assert!(matches!(
            apply_line_edit(&mut buf, &edit),
            Err(EditError::ContentMismatch(_))
        ));
        assert_eq!(buf.join(), "fn a() {}\nfn b() {}");
    }

    #[test]
    fn test_apply_line_edit_delete_and_insert() {
        let mut buf = buffer("a\nb\nc");
        let delete = LineEdit::Delete {
            start: 2,
            end: 3,
            expected_start_text: " b ".to_string(),
        };
        assert_eq!(apply_line_edit(&mut buf, &delete).unwrap(), -2);
        assert_eq!(buf.join(), "a");

        let insert = LineEdit::Insert {
            line: 1,
            position: InsertPosition::Before,
            text: "z".to_string(),
            expected_text: None,
        };
        assert!(matches!(
            apply_line_edit(&mut buf, &insert),
            Err(EditError::MissingExpectedText(1))
        ));

        let append = LineEdit::Insert {
            line: 0,
            position: InsertPosition::Before,
            text: "tail".to_string(),
            expected_text: None,
        };
        assert_eq!(apply_line_edit(&mut buf, &append).unwrap(), 1);
        assert_eq!(buf.join(), "a\ntail");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(EditError::NotFound { start: 1, end: 1, len: 0 }.is_not_found());
        assert!(
            EditError::ShiftedOutOfRange {
                start: 1,
                end: 1,
                translated_start: 4,
                len: 2
            }
            .is_not_found()
        );
        assert!(!EditError::InvalidRange { start: 2, end: 1 }.is_not_found());
    }
}

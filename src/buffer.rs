/// Separator used both to split file text into lines and to join them back
pub const LINE_SEPARATOR: char = '\n';

/// An ordered sequence of text lines, 1-indexed for all public accessors
///
/// Splitting is done on `\n` only, so a trailing newline produces a trailing
/// empty line and `join()` reproduces the original text byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineBuffer {
    lines: Vec<String>,
}

impl LineBuffer {
    /// Split text into a line buffer
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: split_lines(text),
        }
    }

    /// Build a buffer from already-split lines
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Number of lines in the buffer
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get a line by its 1-indexed line number
    ///
    /// # Returns
    /// * `Some(&str)` if `line_number` is within `1..=len()`
    /// * `None` otherwise (including line 0)
    pub fn line(&self, line_number: usize) -> Option<&str> {
        if line_number == 0 {
            return None;
        }
        self.lines.get(line_number - 1).map(String::as_str)
    }

    /// Borrow the underlying 0-indexed lines
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Replace the 0-indexed inclusive range `start..=end` with `replacement`
    ///
    /// Callers are responsible for bounds; this panics like `Vec::splice`
    /// on an invalid range.
    pub(crate) fn splice(&mut self, start: usize, end: usize, replacement: Vec<String>) {
        self.lines.splice(start..=end, replacement);
    }

    /// Insert lines so that the first new line lands at 0-indexed `at`
    pub(crate) fn insert_at(&mut self, at: usize, new_lines: Vec<String>) {
        self.lines.splice(at..at, new_lines);
    }

    /// Join lines back into text with the line separator
    pub fn join(&self) -> String {
        self.lines.join("\n")
    }
}

/// Split text into owned lines on the line separator
///
/// Unlike `str::lines()`, this keeps a trailing empty line when the text ends
/// with a newline and never strips `\r`.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split(LINE_SEPARATOR).map(str::to_string).collect()
}

/// Normalize a line for content comparison
///
/// Trims leading/trailing whitespace and collapses every internal run of
/// whitespace into a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Error returned when a line's content does not match what the caller expected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Content mismatch at line {line}. Expected: '{expected}', found: '{actual}'. \
     Please re-read the file to get its current content before retrying."
)]
pub struct ContentMismatch {
    /// 1-indexed line that was checked
    pub line: usize,
    /// Normalized text the caller expected
    pub expected: String,
    /// Normalized text actually present
    pub actual: String,
}

/// Verify that a line holds the expected text after normalization
///
/// # Arguments
/// * `buffer` - The buffer to read from
/// * `line_number` - 1-indexed line to check
/// * `expected` - Text the caller believes is on that line
///
/// # Returns
/// * `Ok(())` if `normalize(actual) == normalize(expected)`
/// * `Err(ContentMismatch)` carrying both normalized strings otherwise. A line
///   that does not exist is compared as the empty string.
pub fn verify_line(buffer: &LineBuffer, line_number: usize, expected: &str) -> Result<(), ContentMismatch> {
    let actual = normalize(buffer.line(line_number).unwrap_or(""));
    let expected = normalize(expected);

    if actual == expected {
        Ok(())
    } else {
        Err(ContentMismatch {
            line: line_number,
            expected,
            actual,
        })
    }
}

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::buffer::{LineBuffer, split_lines, verify_line};
use crate::edit::EditError;
use crate::file::{FileError, FileStore};

/// One line-range replacement within a batch
///
/// Line numbers always refer to the file as it was when the batch started,
/// never to the partially edited buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    /// First line to replace (1-indexed, inclusive)
    pub line_start: usize,
    /// Last line to replace (1-indexed, inclusive)
    pub line_end: usize,
    /// Text the caller believes is on `line_start`, compared after whitespace normalization
    pub expected_start_line_text: String,
    /// Text whose lines replace the range
    pub replacement_text: String,
}

/// Final state of one edit in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Succeeded { line_shift: i64 },
    Failed { reason: String },
}

/// Result of one submitted edit, reported at its submission position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    /// 0-based position of the edit in the caller's list
    pub index: usize,
    pub original_line_start: usize,
    pub original_line_end: usize,
    pub status: OutcomeStatus,
}

impl EditOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }

    /// Line shift of a successful edit
    pub fn line_shift(&self) -> Option<i64> {
        match self.status {
            OutcomeStatus::Succeeded { line_shift } => Some(line_shift),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    /// Reason a failed edit was rejected
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Succeeded { .. } => None,
            OutcomeStatus::Failed { reason } => Some(reason),
        }
    }
}

impl fmt::Display for EditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            OutcomeStatus::Succeeded { line_shift } => write!(
                f,
                "Edit {}: SUCCESS - lines {}-{} (shift: {:+} lines)",
                self.index + 1,
                self.original_line_start,
                self.original_line_end,
                line_shift
            ),
            OutcomeStatus::Failed { reason } => write!(
                f,
                "Edit {}: FAILED - lines {}-{} - {}",
                self.index + 1,
                self.original_line_start,
                self.original_line_end,
                reason
            ),
        }
    }
}

/// Line shift introduced by one applied edit, keyed by its original range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftRecord {
    pub original_start: usize,
    pub original_end: usize,
    pub shift: i64,
}

/// Errors that reject a whole batch before anything is written
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(
        "Found overlapping ranges starting from line {0}. Please make sure the line ranges are mutually exclusive."
    )]
    OverlappingRanges(usize),

    #[error(
        "File changed since it was read: expected checksum {expected}, got {actual}. \
         Please re-read the file before retrying."
    )]
    StaleSnapshot { expected: String, actual: String },

    #[error(transparent)]
    File(#[from] FileError),
}

/// In-memory result of running a batch over a snapshot
#[derive(Debug, Clone)]
pub struct BatchOutput {
    /// Working buffer after every successful edit
    pub buffer: LineBuffer,
    /// One outcome per request, in submission order
    pub outcomes: Vec<EditOutcome>,
    /// Applied shifts in application order
    pub ledger: Vec<ShiftRecord>,
}

/// Reject the batch if any two ranges share a line
///
/// `sorted` must already be ordered by `(line_start, line_end)`.
fn check_overlaps(sorted: &[(usize, &EditRequest)]) -> Result<(), BatchError> {
    let mut previous_end: Option<usize> = None;

    for (_, edit) in sorted {
        if matches!(previous_end, Some(end) if edit.line_start <= end) {
            return Err(BatchError::OverlappingRanges(edit.line_start));
        }
        previous_end = Some(edit.line_end);
    }

    Ok(())
}

/// Translate and apply one edit to the working buffer
///
/// Bounds and content are checked against the untouched original; only the
/// splice itself uses working-buffer coordinates.
fn apply_one(
    original: &LineBuffer,
    working: &mut LineBuffer,
    ledger: &[ShiftRecord],
    edit: &EditRequest,
) -> Result<i64, EditError> {
    let (start, end) = (edit.line_start, edit.line_end);
    let original_len = original.len();

    if start > end {
        return Err(EditError::InvalidRange { start, end });
    }
    if start < 1 || end > original_len {
        return Err(EditError::NotFound {
            start,
            end,
            len: original_len,
        });
    }

    verify_line(original, start, &edit.expected_start_line_text)?;

    // Every ledger entry starts before this edit, since ranges cannot overlap.
    let offset: i64 = ledger
        .iter()
        .filter(|record| record.original_start <= start)
        .map(|record| record.shift)
        .sum();
    let current_start = start as i64 - 1 + offset;
    let mut current_end = end as i64 - 1 + offset;

    let working_len = working.len() as i64;
    if current_start < 0 || current_start >= working_len {
        return Err(EditError::ShiftedOutOfRange {
            start,
            end,
            translated_start: current_start + 1,
            len: working.len(),
        });
    }
    if current_end >= working_len {
        current_end = working_len - 1;
    }

    let replacement = split_lines(&edit.replacement_text);
    let shift = replacement.len() as i64 - (end - start + 1) as i64;
    working.splice(current_start as usize, current_end as usize, replacement);

    Ok(shift)
}

/// Apply a batch of edits to an original snapshot without touching storage
///
/// Edits are sorted by `(line_start, line_end)` and checked for overlap as a
/// whole first; an overlap fails the batch with nothing applied. Each edit is
/// then applied or rejected on its own, and a rejected edit leaves the buffer
/// and shift ledger exactly as they were.
///
/// # Arguments
/// * `original` - The pristine snapshot every request's line numbers refer to
/// * `edits` - Requests in the caller's order
///
/// # Returns
/// * `Ok(BatchOutput)` - Final buffer plus outcomes in submission order
/// * `Err(BatchError::OverlappingRanges)` - Two requests share a line
pub fn apply_batch(original: &LineBuffer, edits: &[EditRequest]) -> Result<BatchOutput, BatchError> {
    let mut sorted: Vec<(usize, &EditRequest)> = edits.iter().enumerate().collect();
    sorted.sort_by_key(|(_, edit)| (edit.line_start, edit.line_end));

    check_overlaps(&sorted)?;

    let mut working = original.clone();
    let mut ledger: Vec<ShiftRecord> = Vec::new();
    let mut outcomes: Vec<Option<EditOutcome>> = vec![None; edits.len()];

    for (index, edit) in sorted {
        let status = match apply_one(original, &mut working, &ledger, edit) {
            Ok(shift) => {
                ledger.push(ShiftRecord {
                    original_start: edit.line_start,
                    original_end: edit.line_end,
                    shift,
                });
                debug!(index, start = edit.line_start, end = edit.line_end, shift, "edit applied");
                OutcomeStatus::Succeeded { line_shift: shift }
            }
            Err(e) => {
                debug!(index, start = edit.line_start, end = edit.line_end, error = %e, "edit rejected");
                OutcomeStatus::Failed { reason: e.to_string() }
            }
        };

        outcomes[index] = Some(EditOutcome {
            index,
            original_line_start: edit.line_start,
            original_line_end: edit.line_end,
            status,
        });
    }

    Ok(BatchOutput {
        buffer: working,
        outcomes: outcomes.into_iter().flatten().collect(),
        ledger,
    })
}

/// Report of a committed batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Path the batch was committed to
    pub path: String,
    /// One outcome per request, in submission order
    pub outcomes: Vec<EditOutcome>,
    pub success_count: usize,
    pub failure_count: usize,
    /// Checksum of the snapshot the batch started from
    pub initial_checksum: String,
    /// Checksum of the content that was written
    pub final_checksum: String,
}

impl BatchReport {
    fn new(path: String, outcomes: Vec<EditOutcome>, initial_checksum: String, final_checksum: String) -> Self {
        let success_count = outcomes.iter().filter(|o| o.succeeded()).count();
        let failure_count = outcomes.len() - success_count;

        Self {
            path,
            outcomes,
            success_count,
            failure_count,
            initial_checksum,
            final_checksum,
        }
    }

    /// One-line summary of the batch
    pub fn summary(&self) -> String {
        format!(
            "Completed {} successful edits and {} failed edits in {}.",
            self.success_count, self.failure_count, self.path
        )
    }

    /// Sum of the shifts of every successful edit
    pub fn total_line_shift(&self) -> i64 {
        self.outcomes.iter().filter_map(EditOutcome::line_shift).sum()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failure_count == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())?;
        for outcome in &self.outcomes {
            write!(f, "\n{}", outcome)?;
        }
        Ok(())
    }
}

/// Runs one batch against a file: snapshot, apply, commit once
///
/// Holds no state between calls beyond a borrow of the store.
pub struct BatchCoordinator<'a, S: FileStore> {
    store: &'a S,
}

impl<'a, S: FileStore> BatchCoordinator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Apply `edits` to the file at `path`
    ///
    /// The file is read once and written exactly once on success, even when
    /// every edit failed or the list is empty. Whole-batch failures write
    /// nothing.
    ///
    /// # Arguments
    /// * `path` - Absolute path of an existing file
    /// * `edits` - Requests in the caller's order
    /// * `expected_checksum` - Optional BLAKE3 hex checksum the snapshot must match
    pub fn apply(
        &self,
        path: &Path,
        edits: &[EditRequest],
        expected_checksum: Option<&str>,
    ) -> Result<BatchReport, BatchError> {
        let snapshot = self.store.snapshot(path)?;

        if let Some(expected) = expected_checksum {
            if expected != snapshot.checksum {
                warn!(path = %path.display(), "batch rejected: stale snapshot");
                return Err(BatchError::StaleSnapshot {
                    expected: expected.to_string(),
                    actual: snapshot.checksum,
                });
            }
        }

        let original = snapshot.lines();
        let output = apply_batch(&original, edits).inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "batch rejected");
        })?;

        let content = output.buffer.join();
        self.store.write_whole(path, &content)?;

        let report = BatchReport::new(
            path.display().to_string(),
            output.outcomes,
            snapshot.checksum,
            crate::file::checksum(&content),
        );
        info!(
            path = %path.display(),
            succeeded = report.success_count,
            failed = report.failure_count,
            line_shift = report.total_line_shift(),
            "batch committed"
        );

        Ok(report)
    }
}

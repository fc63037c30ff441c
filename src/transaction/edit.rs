use std::cmp::Reverse;
use std::ops::Range;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::TransactionError;

/// One staged change to a file, in the order it was staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Replace a byte range of the text as it stood after the previous edits. An empty
    /// range is an insertion, an empty `text` a deletion.
    Replace { range: Range<usize>, text: String },
    CreateFile { text: String },
    DeleteFile,
}

/// Check that `range` lies inside `text` and on character boundaries.
pub(crate) fn check_range(path: &Path, text: &str, range: &Range<usize>) -> Result<(), TransactionError> {
    if range.start > range.end || range.end > text.len() {
        return Err(TransactionError::InvalidRange {
            path: path.to_path_buf(),
            start: range.start,
            end: range.end,
            len: text.len(),
        });
    }
    for offset in [range.start, range.end] {
        if !text.is_char_boundary(offset) {
            return Err(TransactionError::NotCharBoundary {
                path: path.to_path_buf(),
                offset,
            });
        }
    }
    Ok(())
}

/// Validate and apply a replacement in place.
pub(crate) fn splice(path: &Path, text: &mut String, range: Range<usize>, replacement: &str) -> Result<(), TransactionError> {
    check_range(path, text, &range)?;
    text.replace_range(range, replacement);
    Ok(())
}

/// Edits planned against committed text, staged together by
/// [`Transaction::stage_batch`](super::Transaction::stage_batch).
///
/// Ranges refer to the text of the committed snapshot, so a batch may only touch files
/// without pending edits. Ranges of one file must not partially overlap; a range lying
/// inside another removed or replaced range is dropped.
#[derive(Debug, Default, Clone)]
pub(crate) struct EditBatch {
    pub(crate) edits: IndexMap<PathBuf, Vec<(Range<usize>, String)>>,
    pub(crate) created: IndexMap<PathBuf, String>,
}

impl EditBatch {
    pub fn replace(&mut self, path: &Path, range: Range<usize>, text: impl Into<String>) {
        self.edits
            .entry(path.to_path_buf())
            .or_default()
            .push((range, text.into()));
    }

    pub fn insert(&mut self, path: &Path, offset: usize, text: impl Into<String>) {
        self.replace(path, offset..offset, text);
    }

    pub fn delete(&mut self, path: &Path, range: Range<usize>) {
        self.replace(path, range, "");
    }

    pub fn create(&mut self, path: &Path, text: impl Into<String>) {
        self.created.insert(path.to_path_buf(), text.into());
    }

    /// Every file the batch writes to.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.edits.keys().chain(self.created.keys()).map(PathBuf::as_path)
    }

    /// The edits of `path` in staging order: last range first, so staging one never moves
    /// the offsets of the next. At equal offsets a removal goes before insertions, and
    /// insertions keep their planned order in the resulting text.
    pub(crate) fn ordered(edits: &[(Range<usize>, String)]) -> Vec<(Range<usize>, String)> {
        let mut ordered: Vec<(Range<usize>, String)> = edits.iter().rev().cloned().collect();
        ordered.sort_by_key(|(r, _)| Reverse((r.start, r.end)));
        ordered.dedup();

        let removed: Vec<Range<usize>> = ordered
            .iter()
            .map(|(r, _)| r.clone())
            .filter(|r| !r.is_empty())
            .collect();
        ordered.retain(|(range, _)| {
            !removed.iter().any(|r| {
                r != range
                    && if range.is_empty() {
                        r.start < range.start && range.start < r.end
                    } else {
                        r.start <= range.start && range.end <= r.end
                    }
            })
        });
        ordered
    }
}

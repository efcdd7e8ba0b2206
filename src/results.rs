use std::iter::FusedIterator;

use crate::error::Result;
use crate::session::Everything;

/// Which projection of a result to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultField {
    /// Full path, via `GetResultFullPathNameW`.
    FullPath,
    /// Bare file name, via `GetResultFileNameW`.
    FileName,
}

/// Lazy, single-pass sequence over `[0, num_results)`.
///
/// Created by [`Everything::path_iter`] and [`Everything::file_name_iter`].
/// The count is snapshotted at creation; each `next()` makes one native
/// read and may fail exactly as the single-index call would. Once
/// exhausted it stays exhausted.
///
/// Reading past a new query, or after offset/max/search changes, yields
/// whatever the engine now holds at those indices. Nothing guards
/// against that.
#[derive(Debug)]
pub struct ResultIter<'a> {
    session: &'a Everything,
    field:   ResultField,
    next:    u32,
    end:     u32,
}

impl<'a> ResultIter<'a> {
    pub(crate) fn new(session: &'a Everything, field: ResultField, end: u32) -> Self {
        Self { session, field, next: 0, end }
    }

    pub fn field(&self) -> ResultField {
        self.field
    }
}

impl Iterator for ResultIter<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;

        Some(match self.field {
            ResultField::FullPath => self.session.result_path(index),
            ResultField::FileName => self.session.result_file_name(index),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ResultIter<'_> {}

impl FusedIterator for ResultIter<'_> {}

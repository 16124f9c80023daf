//! Table iteration

use crate::id::Id;
use crate::row::Row;

use super::Table;

/// Ascending iterator over clones of a table's rows
///
/// A cursor rather than a snapshot: every step takes the read lock, finds
/// the first row above the last id yielded and clones it. No lock is held
/// between steps, so dropping the iterator early is always safe and the
/// caller may mutate the table while iterating. Rows appended above the
/// cursor during iteration are yielded; rows below it are not.
pub struct Iter<'a, T: Row> {
    table: &'a Table<T>,
    cursor: Id,
}

impl<'a, T: Row> Iter<'a, T> {
    pub(super) fn new(table: &'a Table<T>, start: Id) -> Self {
        Self {
            table,
            cursor: start,
        }
    }
}

impl<T: Row> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let row = self.table.first_after(self.cursor)?;
        self.cursor = row.id();
        Some(row)
    }
}

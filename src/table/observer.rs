//! Table observers
//!
//! Synchronous listeners for committed mutations, used to maintain derived
//! views such as search indices.

/// Receives notifications about committed table mutations
///
/// Called synchronously, in registration order, while the table's write lock
/// is held. Implementations must not call back into the same table.
pub trait TableObserver<T>: Send + Sync {
    /// A row was appended (also replayed for existing rows on registration)
    fn on_append(&self, row: &T);

    /// A row was replaced by [`Table::update`](crate::Table::update) or
    /// [`Table::modify`](crate::Table::modify)
    fn on_update(&self, prev: &T, curr: &T);

    /// A row was deleted
    fn on_delete(&self, row: &T);
}

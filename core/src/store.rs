//! Object storage for the daily partition files.
//!
//! RULE: Only the store modules touch the filesystem or the database.
//! The core sees a flat namespace of named text objects with
//! prefix listing, which a local directory, an SQLite file or an
//! object store bucket can all provide.

mod fs;
mod sqlite;

pub use fs::FsStore;
pub use sqlite::SqliteStore;

use crate::error::SimResult;

pub trait ObjectStore: Send + Sync {
    /// Names of every object starting with `prefix`, sorted ascending.
    /// A prefix nobody has written under yet lists as empty.
    fn list(&self, prefix: &str) -> SimResult<Vec<String>>;

    fn get(&self, name: &str) -> SimResult<String>;

    fn exists(&self, name: &str) -> SimResult<bool>;

    /// Store `body` under `name`, atomically from a reader's point of view.
    /// Fails with `SimError::WriteConflict` when the object already exists
    /// and `overwrite` is false.
    fn put(&self, name: &str, body: &str, overwrite: bool) -> SimResult<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    fn exercise(store: &dyn ObjectStore) {
        assert!(store.list("inscription/").unwrap().is_empty());

        store.put("inscription/2024-01-02.csv", "b", false).unwrap();
        store.put("inscription/2024-01-01.csv", "a", false).unwrap();
        store.put("radiation/2024-01-01.csv", "r", false).unwrap();

        assert_eq!(
            store.list("inscription/").unwrap(),
            vec!["inscription/2024-01-01.csv", "inscription/2024-01-02.csv"]
        );
        assert_eq!(store.get("inscription/2024-01-01.csv").unwrap(), "a");
        assert!(store.exists("radiation/2024-01-01.csv").unwrap());
        assert!(!store.exists("radiation/2024-01-02.csv").unwrap());

        let conflict = store.put("inscription/2024-01-01.csv", "changed", false);
        assert!(matches!(conflict, Err(SimError::WriteConflict { .. })));
        assert_eq!(store.get("inscription/2024-01-01.csv").unwrap(), "a");

        store.put("inscription/2024-01-01.csv", "changed", true).unwrap();
        assert_eq!(store.get("inscription/2024-01-01.csv").unwrap(), "changed");
    }

    #[test]
    fn fs_store_contract() {
        let dir = tempfile::TempDir::new().unwrap();
        exercise(&FsStore::new(dir.path()));
    }

    #[test]
    fn sqlite_store_contract() {
        let store = SqliteStore::in_memory().unwrap();
        store.migrate().unwrap();
        exercise(&store);
    }
}

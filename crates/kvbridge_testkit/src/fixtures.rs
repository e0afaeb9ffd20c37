//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! over the in-process engines.

use kvbridge::{Config, Database};

/// A test database over an in-process engine.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
}

impl TestDatabase {
    /// Opens `engine` with `config`.
    pub fn open(engine: &str, config: &Config) -> Self {
        crate::init_tracing();
        Self {
            db: Database::open(kvbridge_memkv::api(), engine, config)
                .expect("Failed to open test database"),
        }
    }

    /// Creates an empty ordered database.
    pub fn vsmap() -> Self {
        Self::open("vsmap", &Config::new())
    }

    /// Creates an empty unordered database.
    pub fn vcmap() -> Self {
        Self::open("vcmap", &Config::new())
    }

    /// Creates an ordered database that holds at most `size` bytes of keys
    /// and values.
    pub fn with_capacity(size: u64) -> Self {
        Self::open("vsmap", &Config::new().size(size))
    }

    /// Creates an ordered database filled with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let fixture = Self::vsmap();
        for (key, value) in entries {
            fixture.db.put(key, value).expect("Failed to insert fixture entry");
        }
        fixture
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

impl std::ops::DerefMut for TestDatabase {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.db
    }
}

/// Runs a test with a temporary ordered database.
///
/// # Example
///
/// ```rust,ignore
/// use kvbridge_testkit::with_temp_db;
///
/// #[test]
/// fn my_test() {
///     with_temp_db(|db| {
///         db.put("k", "v").unwrap();
///         assert!(db.exists("k").unwrap());
///     });
/// }
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let fixture = TestDatabase::vsmap();
    f(&fixture.db)
}

/// Collects every key of `db` in engine order.
pub fn all_keys(db: &Database) -> Vec<Vec<u8>> {
    let mut keys = Vec::new();
    db.scan_keys_all(|key| {
        keys.push(key.to_vec());
        Ok(())
    })
    .expect("Failed to scan keys");
    keys
}

/// Collects every entry of `db` in engine order.
pub fn all_entries(db: &Database) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut entries = Vec::new();
    db.scan_all(|key, value| {
        entries.push((key.to_vec(), value.to_vec()));
        Ok(())
    })
    .expect("Failed to scan entries");
    entries
}

//! Sled-based object store
//!
//! Objects are bincode-encoded and keyed by name in the `objects` tree.

use crate::{check_name, ObjectStore};
use renter_core::{Object, RenterError, Result};
use std::path::Path;
use tracing::{debug, info};

const OBJECTS_TREE: &str = "objects";

fn storage_err(e: sled::Error) -> RenterError {
    RenterError::Storage(e.to_string())
}

pub struct SledObjectStore {
    db: sled::Db,
    objects: sled::Tree,
}

impl SledObjectStore {
    /// Open or create an object store
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!(path = ?path.as_ref(), "Opening object store");
        let db = sled::open(path.as_ref())
            .map_err(|e| RenterError::Storage(format!("Failed to open Sled: {}", e)))?;
        Self::with_db(db)
    }

    /// Open an in-memory store (for testing)
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| RenterError::Storage(format!("Failed to open Sled: {}", e)))?;
        Self::with_db(db)
    }

    /// Use the `objects` tree of an already open database
    pub fn with_db(db: sled::Db) -> Result<Self> {
        let objects = db.open_tree(OBJECTS_TREE).map_err(storage_err)?;
        Ok(Self { db, objects })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }
}

impl ObjectStore for SledObjectStore {
    fn add_object(&self, name: &str, object: Object) -> Result<()> {
        check_name(name)?;
        let encoded = bincode::serialize(&object)?;
        self.objects
            .insert(name.as_bytes(), encoded)
            .map_err(storage_err)?;
        debug!(name, slabs = object.slabs.len(), size = object.size(), "Stored object");
        Ok(())
    }

    fn object(&self, name: &str) -> Result<Object> {
        let bytes = self
            .objects
            .get(name.as_bytes())
            .map_err(storage_err)?
            .ok_or_else(|| RenterError::ObjectNotFound(name.to_string()))?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn delete_object(&self, name: &str) -> Result<()> {
        self.objects
            .remove(name.as_bytes())
            .map_err(storage_err)?
            .map(|_| ())
            .ok_or_else(|| RenterError::ObjectNotFound(name.to_string()))
    }

    fn list_objects(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for item in self.objects.iter().keys() {
            let key = item.map_err(storage_err)?;
            let name = String::from_utf8(key.to_vec())
                .map_err(|e| RenterError::Storage(format!("object name is not UTF-8: {}", e)))?;
            names.push(name);
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use tempfile::tempdir;

    #[test]
    fn test_store_contract() {
        let store = SledObjectStore::open_temporary().unwrap();
        test_support::exercise(&store);
    }

    #[test]
    fn test_reopen() {
        let dir = tempdir().unwrap();
        let object = test_support::object(11);
        {
            let store = SledObjectStore::open(dir.path()).unwrap();
            store.add_object("kept", object.clone()).unwrap();
            store.flush().unwrap();
        }

        let store = SledObjectStore::open(dir.path()).unwrap();
        assert_eq!(store.object("kept").unwrap(), object);
        assert_eq!(store.list_objects().unwrap(), vec!["kept"]);
    }
}

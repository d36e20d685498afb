//! In-memory object store
//!
//! Not persistent.

use crate::{check_name, ObjectStore};
use parking_lot::RwLock;
use renter_core::{Object, RenterError, Result};
use std::collections::BTreeMap;

#[derive(Default)]
pub struct EphemeralObjectStore {
    objects: RwLock<BTreeMap<String, Object>>,
}

impl EphemeralObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for EphemeralObjectStore {
    fn add_object(&self, name: &str, object: Object) -> Result<()> {
        check_name(name)?;
        self.objects.write().insert(name.to_string(), object);
        Ok(())
    }

    fn object(&self, name: &str) -> Result<Object> {
        self.objects
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RenterError::ObjectNotFound(name.to_string()))
    }

    fn delete_object(&self, name: &str) -> Result<()> {
        self.objects
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RenterError::ObjectNotFound(name.to_string()))
    }

    fn list_objects(&self) -> Result<Vec<String>> {
        Ok(self.objects.read().keys().cloned().collect())
    }
}

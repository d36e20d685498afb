//! Renter Metadata
//!
//! Named object storage. An `Object` records the slices making up a piece
//! of user data and the key it was encrypted with; stores map names to
//! objects.
//!
//! - `EphemeralObjectStore`: in-memory, for tests and one-shot tools
//! - `SledObjectStore`: persistent, bincode values in a sled tree

pub mod ephemeral;
pub mod sled_store;

pub use ephemeral::EphemeralObjectStore;
pub use sled_store::SledObjectStore;

use renter_core::{Object, RenterError, Result};

/// Name to object mapping
///
/// All implementations must be Send + Sync so a store can be shared by
/// concurrent uploads.
pub trait ObjectStore: Send + Sync {
    /// Store `object` under `name`, replacing any previous object
    fn add_object(&self, name: &str, object: Object) -> Result<()>;

    /// Fetch the object stored under `name`
    fn object(&self, name: &str) -> Result<Object>;

    /// Remove the object stored under `name`
    fn delete_object(&self, name: &str) -> Result<()>;

    /// Names of every stored object, sorted
    fn list_objects(&self) -> Result<Vec<String>>;
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RenterError::Storage("object name is empty".to_string()));
    }
    Ok(())
}

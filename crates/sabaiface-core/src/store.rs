//! Collection registry.
//!
//! A single store-wide read/write lock guards every collection: create,
//! delete and append take it exclusively, scans take it shared. A search
//! therefore observes each write either entirely or not at all.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::matcher::{FaceMatch, Matcher, SearchParams};
use crate::types::{CollectionInfo, Embedding, FaceRecord};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("collection already exists: {0}")]
    AlreadyExists(String),
    #[error("collection not found: {0}")]
    NotFound(String),
}

/// Storage backend for collections and their face records.
///
/// Handlers only see this trait, so the in-memory registry can be swapped
/// for a persistent backend.
pub trait FaceStore: Send + Sync {
    /// Insert an empty collection. Fails if the ID is taken.
    fn create(&self, id: &str) -> Result<CollectionInfo, StoreError>;

    /// Remove a collection together with all its faces.
    fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Add face records to an existing collection.
    fn append(&self, id: &str, records: Vec<FaceRecord>) -> Result<(), StoreError>;

    /// Snapshot of every record in a collection. Order is not significant.
    fn list_faces(&self, id: &str) -> Result<Vec<FaceRecord>, StoreError>;

    fn describe(&self, id: &str) -> Result<CollectionInfo, StoreError>;

    /// All collection IDs, sorted.
    fn list_collections(&self) -> Vec<String>;

    /// Rank every record of a collection against `probe` under one
    /// consistent view of the collection.
    fn search(
        &self,
        id: &str,
        probe: &Embedding,
        matcher: &dyn Matcher,
        params: &SearchParams,
    ) -> Result<Vec<FaceMatch>, StoreError>;

    fn contains(&self, id: &str) -> bool {
        self.describe(id).is_ok()
    }
}

struct Collection {
    faces: Vec<FaceRecord>,
    created_at: DateTime<Utc>,
}

impl Collection {
    fn info(&self, id: &str) -> CollectionInfo {
        CollectionInfo {
            id: id.to_string(),
            face_count: self.faces.len(),
            created_at: self.created_at,
        }
    }
}

/// In-memory collection registry. Lives for the process lifetime.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a collection half-written:
    // every mutation is a single insert/remove/extend.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Collection>> {
        self.collections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Collection>> {
        self.collections.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FaceStore for MemoryStore {
    fn create(&self, id: &str) -> Result<CollectionInfo, StoreError> {
        let mut collections = self.write();
        if collections.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        let collection = Collection {
            faces: Vec::new(),
            created_at: Utc::now(),
        };
        let info = collection.info(id);
        collections.insert(id.to_string(), collection);
        tracing::info!(collection = id, "collection created");
        Ok(info)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let removed = self
            .write()
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        tracing::info!(collection = id, faces = removed.faces.len(), "collection deleted");
        Ok(())
    }

    fn append(&self, id: &str, records: Vec<FaceRecord>) -> Result<(), StoreError> {
        let mut collections = self.write();
        let collection = collections
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let added = records.len();
        collection.faces.extend(records);
        tracing::debug!(collection = id, added, total = collection.faces.len(), "faces appended");
        Ok(())
    }

    fn list_faces(&self, id: &str) -> Result<Vec<FaceRecord>, StoreError> {
        self.read()
            .get(id)
            .map(|c| c.faces.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn describe(&self, id: &str) -> Result<CollectionInfo, StoreError> {
        self.read()
            .get(id)
            .map(|c| c.info(id))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list_collections(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn search(
        &self,
        id: &str,
        probe: &Embedding,
        matcher: &dyn Matcher,
        params: &SearchParams,
    ) -> Result<Vec<FaceMatch>, StoreError> {
        let collections = self.read();
        let collection = collections
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(matcher.rank(probe, &collection.faces, params))
    }

    fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }
}

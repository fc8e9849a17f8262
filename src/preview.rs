//! In-memory preview registry.
//!
//! A `PreviewHandle` keeps its image servable under `/preview/{id}` for as long
//! as it lives. Dropping the handle releases the entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use uuid::Uuid;

use crate::asset::{ImageAsset, MediaType};

#[derive(Debug, Clone, Default)]
pub struct PreviewStore {
    entries: Arc<Mutex<HashMap<Uuid, (MediaType, Bytes)>>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, asset: &ImageAsset) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.lock()
            .insert(id, (asset.media_type(), asset.bytes().clone()));
        tracing::debug!(%id, "preview registered");
        PreviewHandle {
            id,
            store: self.clone(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<(MediaType, Bytes)> {
        self.lock().get(id).cloned()
    }

    /// Number of previews not yet released.
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, id: &Uuid) {
        if self.lock().remove(id).is_some() {
            tracing::debug!(%id, "preview released");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, (MediaType, Bytes)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owning reference to one registered preview.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    store: PreviewStore,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn uri(&self) -> String {
        format!("/preview/{}", self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.store.release(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::tests::png_file;

    #[test]
    fn handle_serves_until_dropped() {
        let store = PreviewStore::new();
        let asset = ImageAsset::select(png_file(64)).unwrap();

        let handle = store.register(&asset);
        let id = handle.id();
        assert_eq!(handle.uri(), format!("/preview/{id}"));

        let (media_type, bytes) = store.get(&id).unwrap();
        assert_eq!(media_type, MediaType::Png);
        assert_eq!(&bytes, asset.bytes());

        drop(handle);
        assert!(store.get(&id).is_none());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn handles_are_distinct() {
        let store = PreviewStore::new();
        let asset = ImageAsset::select(png_file(16)).unwrap();
        let a = store.register(&asset);
        let b = store.register(&asset);
        assert_ne!(a.id(), b.id());
        assert_eq!(store.live_count(), 2);
    }
}

//! Authenticated image blobs.
//!
//! Protected images are fetched with a bearer token and held in memory behind
//! revocable handles. The [`BlobRegistry`] owns the bytes; a [`BlobHandle`]
//! only names them, so once a handle is released its bytes are gone and every
//! outstanding [`BlobRef`] reads `None` instead of dangling.
//!
//! Handles are owned by a viewer scope ([`BlobScope`] for one image,
//! [`BlobGallery`] for a keyed set). Scopes guarantee at most one live handle
//! per key and release on every exit path, including `Drop`.

pub mod fetch;
pub mod gallery;
pub mod scope;

pub use fetch::{failure_message, BlobFetcher, HttpBlobFetcher, DEFAULT_MAX_BLOB_BYTES};
pub use gallery::{BlobGallery, GalleryTicket};
pub use scope::{BlobScope, Completion, FetchTicket, ScopeState};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Identity of a fetched image: resource path plus the token it was fetched with.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    pub path: String,
    token: String,
}

impl BlobKey {
    pub fn new(path: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobKey")
            .field("path", &self.path)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Binary payload returned by a successful fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchedBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Registry counters, for leak checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub created: u64,
    pub released: u64,
    pub live: usize,
}

struct LiveBlob {
    key: BlobKey,
    data: Arc<[u8]>,
    content_type: Option<String>,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    live: HashMap<u64, LiveBlob>,
    created: u64,
    released: u64,
}

/// In-memory store backing every live blob handle.
///
/// Cloning shares the same store.
#[derive(Clone, Default)]
pub struct BlobRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a plain map update, so a poisoned lock still
    // holds consistent state.
    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wrap fetched bytes in a new live handle.
    pub fn create(&self, key: BlobKey, blob: FetchedBlob) -> BlobHandle {
        let mut state = self.state();
        state.next_id += 1;
        state.created += 1;
        let id = state.next_id;
        log::debug!("blob {} created for {} ({} bytes)", id, key.path, blob.bytes.len());
        state.live.insert(
            id,
            LiveBlob {
                key: key.clone(),
                data: Arc::from(blob.bytes),
                content_type: blob.content_type,
            },
        );
        BlobHandle {
            reference: BlobRef {
                id,
                registry: self.clone(),
            },
            key,
        }
    }

    /// Release a blob. Returns false when it was already gone.
    fn release(&self, id: u64) -> bool {
        let mut state = self.state();
        match state.live.remove(&id) {
            Some(blob) => {
                state.released += 1;
                log::debug!("blob {} released for {}", id, blob.key.path);
                true
            }
            None => false,
        }
    }

    fn data(&self, id: u64) -> Option<Arc<[u8]>> {
        self.state().live.get(&id).map(|blob| blob.data.clone())
    }

    fn content_type(&self, id: u64) -> Option<String> {
        self.state()
            .live
            .get(&id)
            .and_then(|blob| blob.content_type.clone())
    }

    fn is_live(&self, id: u64) -> bool {
        self.state().live.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    /// Live handles whose key carries `path`.
    pub fn live_for_path(&self, path: &str) -> usize {
        self.state()
            .live
            .values()
            .filter(|blob| blob.key.path == path)
            .count()
    }

    pub fn stats(&self) -> RegistryStats {
        let state = self.state();
        RegistryStats {
            created: state.created,
            released: state.released,
            live: state.live.len(),
        }
    }
}

impl std::fmt::Debug for BlobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Displayable reference to a blob, handed to the presentation layer.
///
/// Reads return `None` once the blob has been released. [`BlobRef::release`]
/// is idempotent and harmless on a superseded blob.
#[derive(Clone)]
pub struct BlobRef {
    id: u64,
    registry: BlobRegistry,
}

impl BlobRef {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Opaque URL-style name for the blob.
    pub fn url(&self) -> String {
        format!("blob:agriscan/{}", self.id)
    }

    pub fn data(&self) -> Option<Arc<[u8]>> {
        self.registry.data(self.id)
    }

    pub fn content_type(&self) -> Option<String> {
        self.registry.content_type(self.id)
    }

    pub fn is_live(&self) -> bool {
        self.registry.is_live(self.id)
    }

    pub fn release(&self) {
        self.registry.release(self.id);
    }
}

impl std::fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobRef").field("id", &self.id).finish()
    }
}

/// Owning handle for one fetched blob. Released on drop.
#[derive(Debug)]
pub struct BlobHandle {
    reference: BlobRef,
    key: BlobKey,
}

impl BlobHandle {
    pub fn key(&self) -> &BlobKey {
        &self.key
    }

    pub fn id(&self) -> u64 {
        self.reference.id
    }

    pub fn url(&self) -> String {
        self.reference.url()
    }

    pub fn data(&self) -> Option<Arc<[u8]>> {
        self.reference.data()
    }

    pub fn content_type(&self) -> Option<String> {
        self.reference.content_type()
    }

    pub fn is_live(&self) -> bool {
        self.reference.is_live()
    }

    /// A cloneable reference for display code.
    pub fn reference(&self) -> BlobRef {
        self.reference.clone()
    }

    /// Release the blob. Safe to call more than once.
    pub fn release(&self) {
        self.reference.release();
    }
}

impl Drop for BlobHandle {
    fn drop(&mut self) {
        self.reference.release();
    }
}

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

use super::fetch::BlobFetcher;
use super::scope::Completion;
use super::{BlobHandle, BlobKey, BlobRegistry, FetchedBlob};

/// An in-flight gallery batch.
#[derive(Debug)]
pub struct GalleryTicket {
    generation: u64,
    token: String,
}

impl GalleryTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Multi-image viewer scope, one image per scan id.
///
/// A batch replaces the whole set: starting a batch cancels any batch still
/// in flight, and installing one releases every handle of the previous set.
/// Items that fail to load have no image; they never fail the batch.
pub struct BlobGallery {
    name: String,
    registry: BlobRegistry,
    generation: u64,
    images: BTreeMap<u64, Option<BlobHandle>>,
    released: bool,
}

impl BlobGallery {
    pub fn new(name: impl Into<String>, registry: BlobRegistry) -> Self {
        Self {
            name: name.into(),
            registry,
            generation: 0,
            images: BTreeMap::new(),
            released: false,
        }
    }

    pub fn begin(&mut self, token: &str) -> Result<GalleryTicket> {
        if self.released {
            return Err(anyhow!("blob gallery '{}' has been released", self.name));
        }
        self.generation += 1;
        Ok(GalleryTicket {
            generation: self.generation,
            token: token.to_string(),
        })
    }

    /// Install a finished batch of `(scan_id, path, result)` entries.
    pub fn complete(
        &mut self,
        ticket: GalleryTicket,
        results: Vec<(u64, String, Result<FetchedBlob>)>,
    ) -> Completion {
        if self.released || ticket.generation != self.generation {
            log::debug!(
                "gallery '{}': discarding stale batch of {} (generation {}, current {})",
                self.name,
                results.len(),
                ticket.generation,
                self.generation
            );
            for (_, path, result) in results {
                if let Ok(blob) = result {
                    self.registry
                        .create(BlobKey::new(path, ticket.token.clone()), blob)
                        .release();
                }
            }
            return Completion::Discarded;
        }
        let mut next = BTreeMap::new();
        for (id, path, result) in results {
            let handle = match result {
                Ok(blob) => Some(
                    self.registry
                        .create(BlobKey::new(path, ticket.token.clone()), blob),
                ),
                Err(err) => {
                    log::debug!("gallery '{}': no image for scan {}: {}", self.name, id, err);
                    None
                }
            };
            next.insert(id, handle);
        }
        let previous = std::mem::replace(&mut self.images, next);
        release_all(previous);
        Completion::Installed
    }

    /// Fetch every `(scan_id, path)` item synchronously and install the batch.
    pub fn load<F: BlobFetcher + ?Sized>(
        &mut self,
        fetcher: &F,
        token: &str,
        items: &[(u64, String)],
    ) -> Result<Completion> {
        let ticket = self.begin(token)?;
        let results = items
            .iter()
            .map(|(id, path)| (*id, path.clone(), fetcher.fetch(path, ticket.token())))
            .collect();
        Ok(self.complete(ticket, results))
    }

    /// Image for a scan, if it loaded.
    pub fn image(&self, id: u64) -> Option<&BlobHandle> {
        self.images.get(&id).and_then(Option::as_ref)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.images.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Release every image and cancel in-flight batches; the gallery stays usable.
    pub fn clear(&mut self) {
        self.generation += 1;
        release_all(std::mem::take(&mut self.images));
    }

    /// Release everything and refuse further batches.
    pub fn teardown(&mut self) {
        self.clear();
        self.released = true;
    }
}

fn release_all(images: BTreeMap<u64, Option<BlobHandle>>) {
    for handle in images.values().flatten() {
        handle.release();
    }
}

impl Drop for BlobGallery {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for BlobGallery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobGallery")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("images", &self.images.len())
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoFetcher;

    impl BlobFetcher for EchoFetcher {
        fn fetch(&self, path: &str, _token: &str) -> Result<FetchedBlob> {
            if path.contains("missing") {
                return Err(anyhow!("Image not found"));
            }
            Ok(FetchedBlob {
                bytes: path.as_bytes().to_vec(),
                content_type: None,
            })
        }
    }

    fn items(entries: &[(u64, &str)]) -> Vec<(u64, String)> {
        entries.iter().map(|(id, p)| (*id, p.to_string())).collect()
    }

    #[test]
    fn load_installs_images_and_skips_failures() {
        let registry = BlobRegistry::new();
        let mut gallery = BlobGallery::new("profile", registry.clone());
        let completion = gallery
            .load(&EchoFetcher, "tok", &items(&[(1, "/s/1"), (2, "/s/missing")]))
            .unwrap();
        assert_eq!(completion, Completion::Installed);
        assert_eq!(gallery.len(), 2);
        assert!(gallery.image(1).is_some());
        assert!(gallery.contains(2));
        assert!(gallery.image(2).is_none());
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn new_batch_releases_previous_set() {
        let registry = BlobRegistry::new();
        let mut gallery = BlobGallery::new("profile", registry.clone());
        gallery
            .load(&EchoFetcher, "tok", &items(&[(1, "/s/1"), (2, "/s/2")]))
            .unwrap();
        let old = gallery.image(1).unwrap().reference();
        gallery
            .load(&EchoFetcher, "tok", &items(&[(3, "/s/3")]))
            .unwrap();
        assert!(!old.is_live());
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.stats().released, 2);
    }

    #[test]
    fn stale_batch_is_discarded() {
        let registry = BlobRegistry::new();
        let mut gallery = BlobGallery::new("profile", registry.clone());
        let stale = gallery.begin("tok").unwrap();
        let fresh = gallery.begin("tok").unwrap();
        let batch = |path: &str| vec![(1, path.to_string(), EchoFetcher.fetch(path, "tok"))];
        assert_eq!(gallery.complete(fresh, batch("/fresh")), Completion::Installed);
        assert_eq!(gallery.complete(stale, batch("/stale")), Completion::Discarded);
        let stats = registry.stats();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.live, 1);
        assert_eq!(gallery.image(1).unwrap().key().path, "/fresh");
    }

    #[test]
    fn teardown_mid_batch_leaves_nothing_live() {
        let registry = BlobRegistry::new();
        let mut gallery = BlobGallery::new("profile", registry.clone());
        gallery.load(&EchoFetcher, "tok", &items(&[(1, "/s/1")])).unwrap();
        let ticket = gallery.begin("tok").unwrap();
        gallery.teardown();
        let results = vec![(1, "/s/1".to_string(), EchoFetcher.fetch("/s/1", "tok"))];
        assert_eq!(gallery.complete(ticket, results), Completion::Discarded);
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.stats().released, registry.stats().created);
        assert!(gallery.begin("tok").is_err());
    }

    #[test]
    fn clear_releases_and_stays_usable() {
        let registry = BlobRegistry::new();
        let mut gallery = BlobGallery::new("profile", registry.clone());
        gallery.load(&EchoFetcher, "tok", &items(&[(1, "/s/1")])).unwrap();
        gallery.clear();
        assert!(gallery.is_empty());
        assert_eq!(registry.live_count(), 0);
        assert!(gallery.load(&EchoFetcher, "tok", &items(&[(1, "/s/1")])).is_ok());
    }

    #[test]
    fn drop_releases_everything() {
        let registry = BlobRegistry::new();
        {
            let mut gallery = BlobGallery::new("profile", registry.clone());
            gallery
                .load(&EchoFetcher, "tok", &items(&[(1, "/s/1"), (2, "/s/2")]))
                .unwrap();
        }
        assert_eq!(registry.live_count(), 0);
    }
}

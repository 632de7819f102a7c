use anyhow::{anyhow, Result};

use super::fetch::BlobFetcher;
use super::{BlobHandle, BlobKey, BlobRegistry, FetchedBlob};

/// Request lifecycle of a [`BlobScope`].
///
/// `Idle -> Fetching -> {Ready | Failed}`; a new request from any live state
/// goes back to `Fetching` after releasing the current handle. `Released` is
/// terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeState {
    Idle,
    Fetching,
    Ready,
    Failed(String),
    Released,
}

/// Outcome of completing a fetch against its scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The result became the scope's current image.
    Installed,
    /// The fetch failed; the scope records the reason.
    Failed,
    /// The request was superseded or its scope torn down; nothing was kept.
    Discarded,
}

/// An in-flight request, tagged with the scope generation that started it.
#[derive(Debug)]
pub struct FetchTicket {
    generation: u64,
    key: BlobKey,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn path(&self) -> &str {
        &self.key.path
    }

    pub fn token(&self) -> &str {
        self.key.token()
    }
}

/// Single-image viewer scope.
///
/// Holds at most one live handle. Each request bumps a generation counter;
/// only a completion carrying the current generation may install its result,
/// so the most recently started request wins regardless of completion order.
/// Dropping the scope tears it down.
pub struct BlobScope {
    name: String,
    registry: BlobRegistry,
    generation: u64,
    state: ScopeState,
    current: Option<BlobHandle>,
}

impl BlobScope {
    pub fn new(name: impl Into<String>, registry: BlobRegistry) -> Self {
        Self {
            name: name.into(),
            registry,
            generation: 0,
            state: ScopeState::Idle,
            current: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &ScopeState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current(&self) -> Option<&BlobHandle> {
        self.current.as_ref()
    }

    /// Failure reason when the last request failed.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ScopeState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Start a request: release the current handle and invalidate any
    /// in-flight request.
    pub fn begin(&mut self, path: &str, token: &str) -> Result<FetchTicket> {
        if self.state == ScopeState::Released {
            return Err(anyhow!("blob scope '{}' has been released", self.name));
        }
        self.release_current();
        self.generation += 1;
        self.state = ScopeState::Fetching;
        Ok(FetchTicket {
            generation: self.generation,
            key: BlobKey::new(path, token),
        })
    }

    /// Deliver the result of a fetch started by [`BlobScope::begin`].
    ///
    /// A stale or post-teardown success still gets a handle, which is
    /// released at once so every fetched image has a matching release.
    pub fn complete(&mut self, ticket: FetchTicket, result: Result<FetchedBlob>) -> Completion {
        if self.state == ScopeState::Released || ticket.generation != self.generation {
            log::debug!(
                "scope '{}': discarding stale result for {} (generation {}, current {})",
                self.name,
                ticket.key.path,
                ticket.generation,
                self.generation
            );
            if let Ok(blob) = result {
                self.registry.create(ticket.key, blob).release();
            }
            return Completion::Discarded;
        }
        match result {
            Ok(blob) => {
                let handle = self.registry.create(ticket.key, blob);
                self.release_current();
                self.current = Some(handle);
                self.state = ScopeState::Ready;
                Completion::Installed
            }
            Err(err) => {
                self.state = ScopeState::Failed(err.to_string());
                Completion::Failed
            }
        }
    }

    /// Fetch `path` synchronously and install it as the current image.
    pub fn acquire<F: BlobFetcher + ?Sized>(
        &mut self,
        fetcher: &F,
        path: &str,
        token: &str,
    ) -> Result<&BlobHandle> {
        let ticket = self.begin(path, token)?;
        let result = fetcher.fetch(ticket.path(), ticket.token());
        match self.complete(ticket, result) {
            Completion::Installed => self
                .current
                .as_ref()
                .ok_or_else(|| anyhow!("blob scope '{}' lost its image", self.name)),
            Completion::Failed => Err(anyhow!(self.error().unwrap_or("image fetch failed").to_string())),
            Completion::Discarded => Err(anyhow!("image request was superseded")),
        }
    }

    /// Drop the current image and in-flight requests, e.g. on logout.
    ///
    /// Unlike [`BlobScope::teardown`] the scope stays usable.
    pub fn reset(&mut self) {
        self.release_current();
        self.generation += 1;
        if self.state != ScopeState::Released {
            self.state = ScopeState::Idle;
        }
    }

    /// Release everything and refuse further requests.
    pub fn teardown(&mut self) {
        self.release_current();
        self.generation += 1;
        self.state = ScopeState::Released;
    }

    fn release_current(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.release();
        }
    }
}

impl Drop for BlobScope {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for BlobScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobScope")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("current", &self.current.as_ref().map(BlobHandle::id))
            .finish()
    }
}

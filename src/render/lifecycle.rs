//! Resource handle lifecycle.
//!
//! Every asset shown by a display cycle is turned into a handle by a
//! [`Materializer`]. [`ResourceLifecycle`] owns the handles of the current
//! cycle and releases all of them before the next cycle creates any.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::util::detect_media_format;

/// Turns asset bytes into dereferenceable handles and revokes them.
pub trait Materializer: Send + Sync {
    /// Create a handle for `data`, read from archive path `path`.
    fn materialize(&self, path: &str, data: Vec<u8>) -> Result<String>;

    /// Revoke `handle`. Returns false if it was not live.
    fn release(&self, handle: &str) -> bool;
}

/// Bytes behind a `blob:` handle.
#[derive(Debug, Clone)]
pub struct Blob {
    pub data: Arc<[u8]>,
    pub media_type: &'static str,
}

/// In-memory registry of `blob:quire/<n>` handles.
#[derive(Debug, Default)]
pub struct BlobStore {
    next_id: AtomicU64,
    blobs: Mutex<HashMap<String, Blob>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dereference a live handle.
    pub fn get(&self, handle: &str) -> Option<Blob> {
        lock(&self.blobs).get(handle).cloned()
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        lock(&self.blobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Materializer for BlobStore {
    fn materialize(&self, path: &str, data: Vec<u8>) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = format!("blob:quire/{id}");
        let media_type = detect_media_format(path, &data).mime_type();
        lock(&self.blobs).insert(
            handle.clone(),
            Blob {
                data: data.into(),
                media_type,
            },
        );
        Ok(handle)
    }

    fn release(&self, handle: &str) -> bool {
        lock(&self.blobs).remove(handle).is_some()
    }
}

/// A materialized asset, valid for one display cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    /// The reference as written in the content.
    pub original_reference: String,
    /// Archive path it resolved to.
    pub resolved_path: String,
    /// What the reference is rewritten to.
    pub handle: String,
}

/// Generation number of a display cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleToken(u64);

impl CycleToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct State {
    generation: u64,
    live: Vec<String>,
    closed: bool,
}

struct Inner {
    materializer: Arc<dyn Materializer>,
    state: Mutex<State>,
}

/// Tracks the handles of the current display cycle.
///
/// Cheap to clone; clones share state, so tasks spawned for a cycle can
/// materialize into it.
#[derive(Clone)]
pub struct ResourceLifecycle {
    inner: Arc<Inner>,
}

impl ResourceLifecycle {
    pub fn new(materializer: Arc<dyn Materializer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                materializer,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Release every live handle and start a new cycle.
    pub fn begin_cycle(&self) -> CycleToken {
        let mut state = lock(&self.inner.state);
        let released = self.release_locked(&mut state);
        state.generation += 1;
        log::trace!(
            "[Lifecycle] cycle {} begins, released {released} handles",
            state.generation
        );
        CycleToken(state.generation)
    }

    /// Create a handle for `data` within the cycle of `token`.
    ///
    /// Fails without creating anything when `token` is stale or the
    /// lifecycle was shut down.
    pub fn materialize(
        &self,
        token: CycleToken,
        original_reference: &str,
        resolved_path: &str,
        data: Vec<u8>,
    ) -> Result<ResourceHandle> {
        // Checked and tracked under one lock: begin_cycle cannot interleave.
        let mut state = lock(&self.inner.state);
        if state.closed || state.generation != token.0 {
            return Err(Error::AssetMaterialization {
                path: resolved_path.to_string(),
                reason: "display cycle superseded".into(),
            });
        }

        let handle = self.inner.materializer.materialize(resolved_path, data)?;
        state.live.push(handle.clone());
        Ok(ResourceHandle {
            original_reference: original_reference.to_string(),
            resolved_path: resolved_path.to_string(),
            handle,
        })
    }

    /// Release a single handle. Returns false if it was not live.
    pub fn release(&self, handle: &str) -> bool {
        let mut state = lock(&self.inner.state);
        match state.live.iter().position(|h| h == handle) {
            Some(idx) => {
                state.live.swap_remove(idx);
                self.inner.materializer.release(handle);
                true
            }
            None => false,
        }
    }

    /// Release every live handle, returning how many there were.
    pub fn release_all(&self) -> usize {
        let mut state = lock(&self.inner.state);
        self.release_locked(&mut state)
    }

    pub fn live_count(&self) -> usize {
        lock(&self.inner.state).live.len()
    }

    /// Whether `token` belongs to the current cycle.
    pub fn is_current(&self, token: CycleToken) -> bool {
        let state = lock(&self.inner.state);
        !state.closed && state.generation == token.0
    }

    /// Release everything and refuse further materialization.
    pub fn shutdown(&self) {
        let mut state = lock(&self.inner.state);
        let released = self.release_locked(&mut state);
        state.closed = true;
        if released > 0 {
            log::debug!("[Lifecycle] shutdown released {released} handles");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.inner.state).closed
    }

    fn release_locked(&self, state: &mut State) -> usize {
        let count = state.live.len();
        for handle in state.live.drain(..) {
            self.inner.materializer.release(&handle);
        }
        count
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

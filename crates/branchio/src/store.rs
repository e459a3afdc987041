//! The shared half of a branching stream.
//!
//! A [`Store`] owns the source, the tail of the chunk chain and the registry
//! of live branches. All three live behind a single mutex so that growing
//! the chain, spawning, closing and `close_others` are serialized against
//! each other. Chunk contents are immutable once linked, so branches copy out
//! of them without taking the lock.
//!
//! The store keeps no reference to the head of the chain. A chunk is freed
//! once every branch has moved past it or closed.

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::{
    branch::BranchId,
    chunk::Chunk,
    error::{BranchError, Result},
    source::{Unit, UnitSource},
};

/// Open/closed flag shared between a branch handle and the registry.
pub(crate) type ClosedFlag = Arc<AtomicBool>;

pub(crate) struct Store<T: Unit> {
    chunk_size: usize,
    encoding: Option<String>,
    inner: Mutex<Inner<T>>,
}

struct Inner<T: Unit> {
    source: Option<Box<dyn UnitSource<T>>>,
    source_ended: bool,
    tail: Arc<Chunk<T>>,
    branches: HashMap<BranchId, ClosedFlag>,
    next_id: u64,
}

impl<T: Unit> Inner<T> {
    fn register(&mut self) -> (BranchId, ClosedFlag) {
        self.next_id += 1;
        let id = BranchId(self.next_id);
        let closed = Arc::new(AtomicBool::new(false));
        self.branches.insert(id, Arc::clone(&closed));
        (id, closed)
    }

    fn unregister(&mut self, id: BranchId) {
        if let Some(closed) = self.branches.remove(&id) {
            closed.store(true, Ordering::Release);
            trace!("closed branch {id}");
        }
        if self.branches.is_empty() && self.source.take().is_some() {
            debug!("last branch closed, dropping source");
        }
    }
}

/// A registered branch: its identity, its closed flag and the chunk it starts
/// on.
pub(crate) struct Registration<T> {
    pub(crate) id: BranchId,
    pub(crate) closed: ClosedFlag,
    pub(crate) head: Arc<Chunk<T>>,
}

impl<T: Unit> Store<T> {
    /// Wraps `source` and registers the root branch, which starts at the
    /// beginning of the (still empty) chain.
    pub(crate) fn open(
        source: Box<dyn UnitSource<T>>,
        chunk_size: usize,
    ) -> (Arc<Self>, Registration<T>) {
        debug_assert!(chunk_size > 0);
        let encoding = source.encoding();
        let head = Chunk::sentinel();
        let mut inner = Inner {
            source: Some(source),
            source_ended: false,
            tail: Arc::clone(&head),
            branches: HashMap::new(),
            next_id: 0,
        };
        let (id, closed) = inner.register();
        let store = Arc::new(Self {
            chunk_size,
            encoding,
            inner: Mutex::new(inner),
        });
        (store, Registration { id, closed, head })
    }

    pub(crate) fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Grows the chain until it covers `upto` units or the source ends.
    ///
    /// Each pass fills one chunk of at most `chunk_size` units. Units read
    /// before a source error are still linked, then the error is returned;
    /// the source is not marked ended, so a later read may retry.
    pub(crate) fn ensure_buffered(&self, upto: u64) -> io::Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        while inner.tail.end() < upto && !inner.source_ended {
            let Some(source) = inner.source.as_mut() else {
                inner.source_ended = true;
                break;
            };

            let wanted = usize::try_from(upto - inner.tail.end())
                .map_or(self.chunk_size, |n| n.min(self.chunk_size));
            let mut buf = vec![T::default(); self.chunk_size];
            let mut filled = 0;
            let mut failure = None;
            while filled < wanted {
                match source.read_units(&mut buf[filled..]) {
                    Ok(0) => {
                        inner.source_ended = true;
                        debug!("source ended at {}", inner.tail.end() + filled as u64);
                        break;
                    }
                    Ok(n) => filled += n,
                    Err(err) => {
                        debug!("source read failed: {err}");
                        failure = Some(err);
                        break;
                    }
                }
            }

            if filled > 0 {
                buf.truncate(filled);
                let tail = inner.tail.append(buf);
                trace!("appended chunk at {} with {} units", tail.offset(), filled);
                inner.tail = tail;
            }
            if let Some(err) = failure {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Registers `count` new branches, provided `parent` is still open.
    pub(crate) fn spawn(
        &self,
        parent: &AtomicBool,
        count: usize,
    ) -> Result<Vec<(BranchId, ClosedFlag)>> {
        let mut inner = self.inner.lock();
        if parent.load(Ordering::Acquire) {
            return Err(BranchError::Closed);
        }
        let spawned: Vec<_> = (0..count).map(|_| inner.register()).collect();
        trace!("spawned {count} branches");
        Ok(spawned)
    }

    pub(crate) fn close(&self, id: BranchId) {
        self.inner.lock().unregister(id);
    }

    /// Closes every branch but `id`. Fails if `id` itself is closed.
    pub(crate) fn close_others(&self, id: BranchId, closed: &AtomicBool) -> bool {
        let mut inner = self.inner.lock();
        if closed.load(Ordering::Acquire) {
            return false;
        }
        let others: Vec<BranchId> = inner
            .branches
            .keys()
            .copied()
            .filter(|&other| other != id)
            .collect();
        for other in &others {
            inner.unregister(*other);
        }
        debug!("branch {id} closed {} siblings", others.len());
        true
    }

    /// Identities of all live branches, in creation order.
    pub(crate) fn branches(&self) -> Vec<BranchId> {
        let mut ids: Vec<BranchId> = self.inner.lock().branches.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[cfg(test)]
    pub(crate) fn has_source(&self) -> bool {
        self.inner.lock().source.is_some()
    }
}

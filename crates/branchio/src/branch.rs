//! Per-consumer cursors over a shared chunk chain.

use std::{
    fmt, io,
    sync::{Arc, atomic::Ordering},
};

use log::trace;

use crate::{
    chunk::Chunk,
    error::Result,
    options::BranchOptions,
    source::{Unit, UnitSource},
    store::{ClosedFlag, Store},
};

/// Identity of a branch, unique within the store it was spawned from.
///
/// Identities are handed out in increasing order, so sorting them sorts
/// branches by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(pub(crate) u64);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An independent read position over a shared, incrementally buffered
/// stream of `T`.
///
/// A branch is owned by one consumer; reading needs `&mut self`, so a single
/// branch is never read from two threads at once. Different branches of the
/// same store may be read, spawned and closed concurrently from any thread.
///
/// Closing is idempotent, and dropping a branch closes it. When the last
/// branch of a store closes, the source is dropped.
pub struct Branch<T: Unit> {
    id: BranchId,
    store: Arc<Store<T>>,
    chunk: Arc<Chunk<T>>,
    position: u64,
    closed: ClosedFlag,
}

/// A branch over a byte stream. Implements [`io::Read`].
pub type ByteBranch = Branch<u8>;

impl ByteBranch {
    /// Wraps `reader` and returns the root branch.
    #[must_use]
    pub fn new<R: io::Read + Send + 'static>(reader: R) -> Self {
        Self::from_source(reader, BranchOptions::default())
    }

    /// Wraps `reader` with explicit options and returns the root branch.
    #[must_use]
    pub fn with_options<R: io::Read + Send + 'static>(reader: R, options: BranchOptions) -> Self {
        Self::from_source(reader, options)
    }
}

impl<T: Unit> Branch<T> {
    /// Wraps any unit source and returns the root branch.
    #[must_use]
    pub fn from_source<S: UnitSource<T> + 'static>(source: S, options: BranchOptions) -> Self {
        Self::from_boxed(Box::new(source), options)
    }

    pub(crate) fn from_boxed(source: Box<dyn UnitSource<T>>, options: BranchOptions) -> Self {
        let (store, root) = Store::open(source, options.effective_chunk_size());
        trace!("opened store with root branch {}", root.id);
        Self {
            id: root.id,
            store,
            chunk: root.head,
            position: 0,
            closed: root.closed,
        }
    }

    /// This branch's identity.
    #[must_use]
    pub fn id(&self) -> BranchId {
        self.id
    }

    /// Absolute index of the next unit this branch will read.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Spawns `count` siblings starting at this branch's current position.
    ///
    /// # Errors
    ///
    /// [`BranchError::Closed`](crate::BranchError::Closed) if this branch is
    /// closed.
    pub fn branch(&self, count: usize) -> Result<Vec<Self>> {
        let spawned = self.store.spawn(&self.closed, count)?;
        Ok(spawned
            .into_iter()
            .map(|(id, closed)| Self {
                id,
                store: Arc::clone(&self.store),
                chunk: Arc::clone(&self.chunk),
                position: self.position,
                closed,
            })
            .collect())
    }

    /// Spawns a single sibling starting at this branch's current position.
    ///
    /// # Errors
    ///
    /// [`BranchError::Closed`](crate::BranchError::Closed) if this branch is
    /// closed.
    pub fn fork(&self) -> Result<Self> {
        let mut spawned = self.branch(1)?;
        Ok(spawned.swap_remove(0))
    }

    /// Copies up to `buf.len()` units into `buf`.
    ///
    /// Returns `Ok(0)` for a non-empty `buf` only at the end of the stream,
    /// or when this branch is closed. An empty `buf` returns `Ok(0)` without
    /// touching the store.
    ///
    /// # Errors
    ///
    /// The source's own error if pulling more data from it failed.
    pub fn read(&mut self, buf: &mut [T]) -> Result<usize> {
        if buf.is_empty() || self.is_closed() {
            return Ok(0);
        }

        let upto = self.position + buf.len() as u64;
        if self.buffered_end(upto) < upto {
            self.store.ensure_buffered(upto)?;
        }

        let mut copied = 0;
        while copied < buf.len() {
            if self.position >= self.chunk.end() {
                match self.chunk.next().cloned() {
                    Some(next) => self.chunk = next,
                    None => break,
                }
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let from = (self.position - self.chunk.offset()) as usize;
            let available = &self.chunk.data()[from..];
            let n = available.len().min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&available[..n]);
            copied += n;
            self.position += n as u64;
        }
        Ok(copied)
    }

    /// Reads a single unit, or `None` at the end of the stream.
    ///
    /// # Errors
    ///
    /// The source's own error if pulling more data from it failed.
    pub fn read_unit(&mut self) -> Result<Option<T>> {
        let mut unit = [T::default()];
        Ok((self.read(&mut unit)? == 1).then_some(unit[0]))
    }

    /// Closes this branch. Closing an already closed branch does nothing.
    pub fn close(&self) {
        self.store.close(self.id);
    }

    /// Whether this branch was closed, by itself or by a sibling's
    /// [`close_others`](Self::close_others).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Snapshot of every live branch of this store, this one included.
    #[must_use]
    pub fn branches(&self) -> Vec<BranchId> {
        self.store.branches()
    }

    /// Closes every other branch of this store, leaving this one as the sole
    /// survivor.
    ///
    /// Returns `false`, closing nothing, if this branch is already closed.
    /// Of several branches racing here, exactly one wins.
    pub fn close_others(&self) -> bool {
        self.store.close_others(self.id, &self.closed)
    }

    pub(crate) fn store_encoding(&self) -> Option<&str> {
        self.store.encoding()
    }

    /// How far the chain is known to reach, looking no further than `upto`.
    fn buffered_end(&self, upto: u64) -> u64 {
        let mut chunk = &self.chunk;
        while chunk.end() < upto {
            match chunk.next() {
                Some(next) => chunk = next,
                None => break,
            }
        }
        chunk.end()
    }
}

impl<T: Unit> Drop for Branch<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Unit> fmt::Debug for Branch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl io::Read for Branch<u8> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Branch::read(self, buf).map_err(Into::into)
    }
}

use std::sync::{Arc, OnceLock};

use crate::source::Unit;

/// One immutable segment of the logical stream.
///
/// A chunk is filled completely before it is linked behind the tail, so its
/// contents never change once a branch can see it. Consecutive chunks satisfy
/// `prev.end() == next.offset`.
pub(crate) struct Chunk<T> {
    offset: u64,
    data: Box<[T]>,
    next: OnceLock<Arc<Chunk<T>>>,
}

impl<T: Unit> Chunk<T> {
    /// The empty chunk every store starts from.
    pub(crate) fn sentinel() -> Arc<Self> {
        Arc::new(Self {
            offset: 0,
            data: Box::default(),
            next: OnceLock::new(),
        })
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }

    pub(crate) fn data(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn next(&self) -> Option<&Arc<Chunk<T>>> {
        self.next.get()
    }

    /// Links `data` behind this chunk and returns the new tail.
    ///
    /// Only the store calls this, under its lock, on its current tail.
    pub(crate) fn append(&self, data: Vec<T>) -> Arc<Chunk<T>> {
        let chunk = Arc::new(Chunk {
            offset: self.end(),
            data: data.into_boxed_slice(),
            next: OnceLock::new(),
        });
        let linked = self.next.set(Arc::clone(&chunk));
        debug_assert!(linked.is_ok(), "chunk appended twice");
        chunk
    }
}

impl<T> Drop for Chunk<T> {
    // Unlink iteratively so that dropping the head of a long chain does not
    // recurse once per chunk.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(chunk) = next {
            next = match Arc::into_inner(chunk) {
                Some(mut chunk) => chunk.next.take(),
                None => None,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_chunks_are_contiguous() {
        let head = Chunk::<u8>::sentinel();
        let a = head.append(vec![1, 2, 3]);
        let b = a.append(vec![4]);
        assert_eq!(head.end(), 0);
        assert_eq!(a.offset(), 0);
        assert_eq!(a.end(), 3);
        assert_eq!(b.offset(), 3);
        assert_eq!(b.end(), 4);
        assert!(Arc::ptr_eq(head.next().unwrap(), &a));
        assert_eq!(b.data(), &[4]);
    }

    #[test]
    fn dropping_a_long_chain_does_not_overflow() {
        let head = Chunk::<u8>::sentinel();
        let mut tail = Arc::clone(&head);
        for _ in 0..200_000 {
            tail = tail.append(vec![0]);
        }
        drop(tail);
        drop(head);
    }

    #[test]
    fn shared_chunks_survive_unlinking() {
        let head = Chunk::<u8>::sentinel();
        let a = head.append(vec![9]);
        let b = a.append(vec![8]);
        drop(a);
        drop(head);
        assert_eq!(b.data(), &[8]);
    }
}

/// Default number of units held by one chunk.
pub(crate) const DEFAULT_CHUNK_SIZE: usize = 0x1000;

/// Configuration for a branching store.
///
/// # Examples
///
/// ```rust
/// use std::io::Cursor;
/// use branchio::{BranchOptions, ByteBranch};
///
/// let root = ByteBranch::with_options(
///     Cursor::new(vec![1, 2, 3]),
///     BranchOptions { chunk_size: 2 },
/// );
/// assert_eq!(root.position(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BranchOptions {
    /// Capacity, in units, of each chunk pulled from the source.
    ///
    /// A single fill never reads more than this many units. Zero selects the
    /// default.
    ///
    /// # Default
    ///
    /// `4096`
    pub chunk_size: usize,
}

impl BranchOptions {
    pub(crate) fn effective_chunk_size(self) -> usize {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }
}

impl Default for BranchOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Configuration for building a [`TextBranch`](crate::TextBranch) from bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TextOptions {
    /// Store configuration for both the byte and the character layer.
    pub branch: BranchOptions,

    /// Charset to decode with when the input carries no byte-order mark.
    ///
    /// # Default
    ///
    /// `None`, which decodes unmarked input as UTF-8.
    pub encoding: Option<String>,

    /// Whether `encoding` wins over a charset detected from a byte-order
    /// mark.
    ///
    /// The mark itself is still skipped.
    ///
    /// # Default
    ///
    /// `false`
    pub overwrite_detected: bool,
}

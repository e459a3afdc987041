//! Byte-order-mark sniffing.
//!
//! Markers are kept in a small static trie. Matching walks it greedily: at
//! each node the children are tried in order, and the node's own charset is
//! the answer only when no child matches further.

use log::debug;

use crate::{branch::ByteBranch, error::Result};

/// The most bytes any marker spans.
pub const READ_LIMIT: usize = 6;

/// Name reported for UTF-7 markers.
pub const UTF_7: &str = "UTF-7";

struct Node {
    marker: &'static [u8],
    charset: Option<&'static str>,
    children: &'static [Node],
}

const fn leaf(marker: &'static [u8], charset: &'static str) -> Node {
    Node {
        marker,
        charset: Some(charset),
        children: &[],
    }
}

static ROOT: Node = Node {
    marker: &[],
    charset: None,
    children: &[
        leaf(&[0x00, 0x00, 0xFE, 0xFF], "UTF-32BE"),
        Node {
            marker: &[0xFF, 0xFE],
            charset: Some("UTF-16LE"),
            children: &[leaf(&[0x00, 0x00], "UTF-32LE")],
        },
        leaf(&[0xDD, 0x73, 0x66, 0x73], "UTF-EBCDIC"),
        leaf(&[0x84, 0x31, 0x95, 0x33], "GB18030"),
        leaf(&[0xEF, 0xBB, 0xBF], "UTF-8"),
        leaf(&[0x0E, 0xFE, 0xFF], "SCSU"),
        Node {
            marker: &[0x2B, 0x2F, 0x76],
            charset: None,
            children: &[
                Node {
                    marker: &[0x38],
                    charset: Some(UTF_7),
                    children: &[leaf(&[0x2D], UTF_7)],
                },
                leaf(&[0x39], UTF_7),
                leaf(&[0x2B], UTF_7),
                leaf(&[0x2F], UTF_7),
            ],
        },
        leaf(&[0xF7, 0x64, 0x4C], "UTF-1"),
        leaf(&[0xFB, 0xEE, 0x28], "BOCU-1"),
        leaf(&[0xFE, 0xFF], "UTF-16BE"),
    ],
};

/// A recognised marker at the start of a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    /// Charset the marker announces.
    pub charset: &'static str,
    /// Length of the marker in bytes.
    pub len: usize,
}

impl Marker {
    /// Whether the marker belongs to the encoded text and must be left for
    /// the decoder rather than skipped.
    #[must_use]
    pub fn is_decoded(&self) -> bool {
        self.charset == UTF_7
    }
}

fn walk(node: &Node, bytes: &[u8], matched: usize) -> Option<Marker> {
    node.children
        .iter()
        .find_map(|child| {
            bytes[matched..]
                .starts_with(child.marker)
                .then(|| walk(child, bytes, matched + child.marker.len()))
                .flatten()
        })
        .or_else(|| {
            node.charset.map(|charset| Marker {
                charset,
                len: matched,
            })
        })
}

/// Matches the longest marker `bytes` starts with.
///
/// ```rust
/// use branchio::bom::{match_marker, Marker};
///
/// assert_eq!(
///     match_marker(&[0xFF, 0xFE, 0x00, 0x00]),
///     Some(Marker { charset: "UTF-32LE", len: 4 })
/// );
/// assert_eq!(match_marker(b"plain"), None);
/// ```
#[must_use]
pub fn match_marker(bytes: &[u8]) -> Option<Marker> {
    walk(&ROOT, bytes, 0)
}

/// Sniffs a byte-order mark at `branch`'s position.
///
/// Up to [`READ_LIMIT`] bytes are read through a probe branch, which is
/// closed before returning. If a marker is found, `branch` is moved past it,
/// except for UTF-7, whose marker is decoded along with the text.
///
/// # Errors
///
/// [`BranchError::Closed`](crate::BranchError::Closed) if `branch` is
/// closed, or the source's own error.
pub fn detect(branch: &mut ByteBranch) -> Result<Option<&'static str>> {
    let mut head = [0; READ_LIMIT];
    let mut len = 0;
    {
        let mut probe = branch.fork()?;
        while len < READ_LIMIT {
            match probe.read(&mut head[len..])? {
                0 => break,
                n => len += n,
            }
        }
        probe.close();
    }

    let Some(marker) = match_marker(&head[..len]) else {
        debug!("no byte-order mark in {len} leading bytes");
        return Ok(None);
    };
    debug!("byte-order mark {} ({} bytes)", marker.charset, marker.len);
    if !marker.is_decoded() {
        let mut skipped = 0;
        while skipped < marker.len {
            match branch.read(&mut head[skipped..marker.len])? {
                0 => break,
                n => skipped += n,
            }
        }
    }
    Ok(Some(marker.charset))
}

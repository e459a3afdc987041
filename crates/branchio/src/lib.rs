//! Independent, concurrent cursors over a single non-seekable source.
//!
//! A source (an [`std::io::Read`] for bytes, or any [`UnitSource<char>`] for
//! text) is wrapped once in a shared chunk store. Any number of *branches*
//! can then be spawned from a branch; each one reads the same logical stream
//! at its own pace, on its own thread, and can be closed independently. The
//! source is pulled at most once per chunk no matter how many branches read.
//!
//! ```rust
//! use std::io::{Cursor, Read};
//! use branchio::ByteBranch;
//!
//! let mut root = ByteBranch::new(Cursor::new(b"hello".to_vec()));
//! let mut copy = root.branch(1).unwrap().pop().unwrap();
//!
//! let mut a = String::new();
//! root.read_to_string(&mut a).unwrap();
//! let mut b = String::new();
//! copy.read_to_string(&mut b).unwrap();
//! assert_eq!(a, "hello");
//! assert_eq!(b, "hello");
//! ```
//!
//! Text is read through [`TextBranch`], which adds pushback, line and column
//! tracking, and byte-order-mark sniffing when built from bytes:
//!
//! ```rust
//! use std::io::Cursor;
//! use branchio::{TextBranch, TextOptions};
//!
//! let bytes = b"\xEF\xBB\xBFa\nb".to_vec();
//! let mut text = TextBranch::from_bytes(Cursor::new(bytes), TextOptions::default()).unwrap();
//! assert_eq!(text.encoding(), Some("UTF-8"));
//! assert_eq!(text.read_unit().unwrap(), Some('a'));
//! ```

mod chunk;
mod store;

pub mod bom;
mod branch;
mod decode;
mod error;
mod options;
mod source;
mod text;
pub mod utf7;

#[cfg(test)]
mod tests;

pub use branch::{Branch, BranchId, ByteBranch};
pub use decode::{Charset, Decoder};
pub use error::{BranchError, Result};
pub use options::{BranchOptions, TextOptions};
pub use source::{TextSource, Unit, UnitSource};
pub use text::{TextBranch, TextPosition};

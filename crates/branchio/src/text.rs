//! The character instantiation of [`Branch`], with pushback and text
//! positions.
//!
//! Line and column are 1-based and advance on every character handed to the
//! caller. The line delimiter is whichever of `'\n'` and `'\r'` any branch of
//! the store meets first; from then on the other one is an ordinary
//! character. The column at which each line ended is recorded the first time
//! that line ending is read, in a table shared by all branches of the store,
//! so that unreading a delimiter can restore the previous line's column.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, OnceLock},
};

use log::debug;
use parking_lot::Mutex;

use crate::{
    bom,
    branch::{Branch, BranchId, ByteBranch},
    decode::{Charset, Decoder},
    error::{BranchError, Result},
    options::{BranchOptions, TextOptions},
    source::UnitSource,
};

/// A 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextPosition {
    /// Line number, starting at 1.
    pub line: usize,
    /// Column within the line, starting at 1.
    pub column: usize,
}

impl Default for TextPosition {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

#[derive(Debug, Default)]
struct LineTable {
    delimiter: OnceLock<char>,
    // `ends[n - 1]` is the column of the delimiter that ended line `n`.
    ends: Mutex<Vec<usize>>,
}

impl LineTable {
    /// Whether `ch` breaks lines, fixing the delimiter on first sight.
    fn breaks_line(&self, ch: char) -> bool {
        matches!(ch, '\n' | '\r') && *self.delimiter.get_or_init(|| ch) == ch
    }

    fn is_delimiter(&self, ch: char) -> bool {
        self.delimiter.get() == Some(&ch)
    }

    fn record_end(&self, line: usize, column: usize) {
        let mut ends = self.ends.lock();
        if ends.len() < line {
            ends.resize(line - 1, 1);
            ends.push(column);
        }
    }

    fn end_of(&self, line: usize) -> usize {
        self.ends
            .lock()
            .get(line.wrapping_sub(1))
            .copied()
            .unwrap_or(1)
    }
}

/// A branch over a character stream.
///
/// On top of [`Branch`] it keeps a private pushback buffer, read before the
/// shared stream, and the line and column of the next character.
pub struct TextBranch {
    inner: Branch<char>,
    lines: Arc<LineTable>,
    pushback: VecDeque<char>,
    position: TextPosition,
}

impl TextBranch {
    /// Wraps a character source and returns the root branch.
    #[must_use]
    pub fn new<S: UnitSource<char> + 'static>(source: S) -> Self {
        Self::with_options(source, BranchOptions::default())
    }

    /// Wraps a character source with explicit options and returns the root
    /// branch.
    #[must_use]
    pub fn with_options<S: UnitSource<char> + 'static>(source: S, options: BranchOptions) -> Self {
        Self {
            inner: Branch::from_source(source, options),
            lines: Arc::default(),
            pushback: VecDeque::new(),
            position: TextPosition::default(),
        }
    }

    /// Decodes a byte stream, choosing the charset from its byte-order mark.
    ///
    /// The bytes are first wrapped in a byte-level store and sniffed for a
    /// mark, which is skipped. The detected charset is used unless
    /// `options.overwrite_detected` is set and `options.encoding` names one.
    /// Unmarked input is decoded with `options.encoding`, or UTF-8. UTF-7 is
    /// transcoded to UTF-16BE first.
    ///
    /// # Errors
    ///
    /// [`BranchError::UnsupportedCharset`] if the chosen charset cannot be
    /// decoded, or the reader's own error while sniffing.
    pub fn from_bytes<R: io::Read + Send + 'static>(reader: R, options: TextOptions) -> Result<Self> {
        let mut bytes = ByteBranch::with_options(reader, options.branch);
        let detected = bom::detect(&mut bytes)?;
        let name = match (detected, options.encoding.as_deref()) {
            (Some(_), Some(explicit)) if options.overwrite_detected => explicit,
            (Some(detected), _) => detected,
            (None, Some(explicit)) => explicit,
            (None, None) => Charset::Utf8.name(),
        };
        let charset =
            Charset::for_name(name).ok_or_else(|| BranchError::UnsupportedCharset(name.to_owned()))?;
        debug!("decoding as {charset} (marker: {detected:?})");
        Ok(Self::with_options(Decoder::new(bytes, charset), options.branch))
    }

    /// This branch's identity.
    #[must_use]
    pub fn id(&self) -> BranchId {
        self.inner.id()
    }

    /// Spawns `count` siblings that start at this branch's position, with a
    /// copy of its pushback buffer, line and column.
    ///
    /// # Errors
    ///
    /// [`BranchError::Closed`] if this branch is closed.
    pub fn branch(&self, count: usize) -> Result<Vec<Self>> {
        Ok(self
            .inner
            .branch(count)?
            .into_iter()
            .map(|inner| Self {
                inner,
                lines: Arc::clone(&self.lines),
                pushback: self.pushback.clone(),
                position: self.position,
            })
            .collect())
    }

    /// Spawns a single sibling; see [`branch`](Self::branch).
    ///
    /// # Errors
    ///
    /// [`BranchError::Closed`] if this branch is closed.
    pub fn fork(&self) -> Result<Self> {
        let mut spawned = self.branch(1)?;
        Ok(spawned.swap_remove(0))
    }

    /// Copies up to `buf.len()` characters into `buf`.
    ///
    /// Pushed-back characters are returned first, without touching the
    /// shared stream. `Ok(0)` for a non-empty `buf` means the end of the
    /// stream, or that this branch is closed.
    ///
    /// # Errors
    ///
    /// The source's own error if pulling more data from it failed.
    pub fn read(&mut self, buf: &mut [char]) -> Result<usize> {
        if buf.is_empty() || self.inner.is_closed() {
            return Ok(0);
        }
        let n = if self.pushback.is_empty() {
            self.inner.read(buf)?
        } else {
            let n = buf.len().min(self.pushback.len());
            for (slot, ch) in buf.iter_mut().zip(self.pushback.drain(..n)) {
                *slot = ch;
            }
            n
        };
        for &ch in &buf[..n] {
            self.advance(ch);
        }
        Ok(n)
    }

    /// Reads a single character, or `None` at the end of the stream.
    ///
    /// # Errors
    ///
    /// The source's own error if pulling more data from it failed.
    pub fn read_unit(&mut self) -> Result<Option<char>> {
        let mut ch = ['\0'];
        Ok((self.read(&mut ch)? == 1).then_some(ch[0]))
    }

    /// Reads everything up to the end of the stream into `out`.
    ///
    /// # Errors
    ///
    /// The source's own error if pulling more data from it failed.
    pub fn read_to_string(&mut self, out: &mut String) -> Result<usize> {
        let mut buf = ['\0'; 256];
        let mut total = 0;
        loop {
            let n = self.read(&mut buf)?;
            if n == 0 {
                return Ok(total);
            }
            out.extend(&buf[..n]);
            total += n;
        }
    }

    /// Pushes `ch` back so that it is the next character read.
    pub fn unread(&mut self, ch: char) {
        self.pushback.push_front(ch);
        self.retreat(ch);
    }

    /// Pushes `chars` back so that they are read next, in order.
    pub fn unread_all(&mut self, chars: &[char]) {
        for &ch in chars.iter().rev() {
            self.unread(ch);
        }
    }

    /// Line of the next character, starting at 1.
    #[must_use]
    pub fn line(&self) -> usize {
        self.position.line
    }

    /// Column of the next character within its line, starting at 1.
    #[must_use]
    pub fn column(&self) -> usize {
        self.position.column
    }

    /// Line and column of the next character.
    #[must_use]
    pub fn text_position(&self) -> TextPosition {
        self.position
    }

    /// The charset the source reported when the store was built.
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.inner.store_encoding()
    }

    /// Closes this branch. Closing an already closed branch does nothing.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether this branch was closed, by itself or by a sibling.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Snapshot of every live branch of this store, this one included.
    #[must_use]
    pub fn branches(&self) -> Vec<BranchId> {
        self.inner.branches()
    }

    /// Closes every other branch of this store; see
    /// [`Branch::close_others`].
    pub fn close_others(&self) -> bool {
        self.inner.close_others()
    }

    fn advance(&mut self, ch: char) {
        if self.lines.breaks_line(ch) {
            self.lines.record_end(self.position.line, self.position.column);
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
    }

    fn retreat(&mut self, ch: char) {
        if self.lines.is_delimiter(ch) {
            self.position.line = self.position.line.saturating_sub(1).max(1);
            self.position.column = self.lines.end_of(self.position.line);
        } else {
            self.position.column = self.position.column.saturating_sub(1).max(1);
        }
    }
}

impl std::fmt::Debug for TextBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBranch")
            .field("id", &self.inner.id())
            .field("line", &self.position.line)
            .field("column", &self.position.column)
            .field("pushback", &self.pushback.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TextSource;

    fn text(s: &str) -> TextBranch {
        TextBranch::with_options(TextSource::new(s), BranchOptions { chunk_size: 2 })
    }

    fn pos(line: usize, column: usize) -> TextPosition {
        TextPosition { line, column }
    }

    #[test]
    fn tracks_line_and_column_per_char() {
        let mut t = text("a\nb");
        let mut seen = Vec::new();
        loop {
            let at = t.text_position();
            let Some(ch) = t.read_unit().unwrap() else {
                break;
            };
            seen.push((at, ch));
        }
        assert_eq!(seen, vec![(pos(1, 1), 'a'), (pos(1, 2), '\n'), (pos(2, 1), 'b')]);
        t.unread('b');
        assert_eq!(t.text_position(), pos(2, 1));
    }

    #[test]
    fn unread_delimiter_restores_previous_line_end() {
        let mut t = text("ab\ncd");
        let mut s = String::new();
        t.read_to_string(&mut s).unwrap();
        assert_eq!(t.text_position(), pos(2, 3));
        t.unread_all(&['\n', 'c', 'd']);
        assert_eq!(t.text_position(), pos(1, 3));
        assert_eq!(t.read_unit().unwrap(), Some('\n'));
        assert_eq!(t.text_position(), pos(2, 1));
    }

    #[test]
    fn first_seen_delimiter_wins() {
        let mut t = text("a\r\nb\rc");
        let mut s = String::new();
        t.read_to_string(&mut s).unwrap();
        // '\r' breaks lines, '\n' is an ordinary character.
        assert_eq!(t.text_position(), pos(3, 2));
    }

    #[test]
    fn delimiter_is_shared_across_branches() {
        let mut root = text("x\ny\rz");
        let mut child = root.fork().unwrap();
        let mut s = String::new();
        root.read_to_string(&mut s).unwrap();
        assert_eq!(root.text_position(), pos(2, 4));

        s.clear();
        child.read_to_string(&mut s).unwrap();
        assert_eq!(s, "x\ny\rz");
        assert_eq!(child.text_position(), pos(2, 4));
    }

    #[test]
    fn column_never_drops_below_one() {
        let mut t = text("");
        t.unread_all(&['p', 'q', 'r']);
        assert_eq!(t.text_position(), pos(1, 1));
        let mut buf = ['\0'; 8];
        assert_eq!(t.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &['p', 'q', 'r']);
        assert_eq!(t.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn pushback_is_private_and_cloned_on_branch() {
        let mut root = text("mn");
        assert_eq!(root.read_unit().unwrap(), Some('m'));
        root.unread('m');
        let mut child = root.fork().unwrap();
        assert_eq!(child.text_position(), pos(1, 1));

        let mut s = String::new();
        child.read_to_string(&mut s).unwrap();
        assert_eq!(s, "mn");
        s.clear();
        root.read_to_string(&mut s).unwrap();
        assert_eq!(s, "mn");
    }

    #[test]
    fn closed_branch_ignores_pushback() {
        let mut t = text("q");
        t.unread('z');
        t.close();
        assert_eq!(t.read_unit().unwrap(), None);
        assert!(matches!(t.branch(1), Err(BranchError::Closed)));
    }

    #[test]
    fn encoding_comes_from_the_source() {
        let t = TextBranch::new(TextSource::new("").with_encoding("UTF8"));
        assert_eq!(t.encoding(), Some("UTF8"));
        assert_eq!(text("").encoding(), None);
    }
}

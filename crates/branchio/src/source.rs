use std::io;

/// A unit a store can buffer: `u8` for byte streams, `char` for text.
pub trait Unit: Copy + Default + Send + Sync + core::fmt::Debug + 'static {}

impl Unit for u8 {}
impl Unit for char {}

/// A blocking producer of units, pulled by a store on behalf of its branches.
///
/// Every [`io::Read`] is a byte source. Character sources are usually a
/// [`Decoder`](crate::Decoder) over bytes, or a [`TextSource`] in memory.
pub trait UnitSource<T: Unit>: Send {
    /// Reads units into `buf`, returning how many were written.
    ///
    /// `Ok(0)` for a non-empty `buf` signals the end of the source.
    ///
    /// # Errors
    ///
    /// Any error of the underlying producer. It is handed unchanged to the
    /// branch whose read triggered the pull.
    fn read_units(&mut self, buf: &mut [T]) -> io::Result<usize>;

    /// The name of the charset this source historically decodes, if it has
    /// one. Queried once, when the store is built.
    fn encoding(&self) -> Option<String> {
        None
    }
}

impl<R: io::Read + Send> UnitSource<u8> for R {
    fn read_units(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.read(buf) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                res => return res,
            }
        }
    }
}

/// An in-memory character source.
///
/// ```rust
/// use branchio::{TextBranch, TextSource};
///
/// let mut text = TextBranch::new(TextSource::new("xy").with_encoding("UTF-16"));
/// assert_eq!(text.encoding(), Some("UTF-16"));
/// assert_eq!(text.read_unit().unwrap(), Some('x'));
/// ```
#[derive(Debug, Clone)]
pub struct TextSource {
    chars: Vec<char>,
    pos: usize,
    encoding: Option<String>,
}

impl TextSource {
    /// Creates a source yielding the characters of `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            encoding: None,
        }
    }

    /// Reports `name` as this source's historical encoding.
    #[must_use]
    pub fn with_encoding(mut self, name: &str) -> Self {
        self.encoding = Some(name.to_owned());
        self
    }
}

impl UnitSource<char> for TextSource {
    fn read_units(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let rest = &self.chars[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }

    fn encoding(&self) -> Option<String> {
        self.encoding.clone()
    }
}

//! Byte to character decoding for the text factory.

use std::{
    fmt,
    io::{self, Read},
};

use bstr::decode_utf8;

use crate::{source::UnitSource, utf7::Utf7Decoder};

const REFILL: usize = 1024;

/// Charsets [`Decoder`] can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Charset {
    /// UTF-8. Malformed sequences decode to U+FFFD.
    Utf8,
    /// UTF-16, big-endian.
    Utf16Be,
    /// UTF-16, little-endian.
    Utf16Le,
    /// UTF-32, big-endian.
    Utf32Be,
    /// UTF-32, little-endian.
    Utf32Le,
    /// UTF-7, transcoded to UTF-16BE before decoding.
    Utf7,
    /// ISO-8859-1.
    Latin1,
    /// US-ASCII. Bytes above `0x7F` decode to U+FFFD.
    Ascii,
}

impl Charset {
    /// Looks a charset up by name, ignoring case, `-` and `_`.
    ///
    /// Unmarked `UTF-16` and `UTF-32` are big-endian.
    ///
    /// ```rust
    /// use branchio::Charset;
    ///
    /// assert_eq!(Charset::for_name("utf-16le"), Some(Charset::Utf16Le));
    /// assert_eq!(Charset::for_name("Latin_1"), Some(Charset::Latin1));
    /// assert_eq!(Charset::for_name("SCSU"), None);
    /// ```
    #[must_use]
    pub fn for_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|ch| !matches!(ch, '-' | '_'))
            .map(|ch| ch.to_ascii_uppercase())
            .collect();
        Some(match key.as_str() {
            "UTF8" => Self::Utf8,
            "UTF16" | "UTF16BE" => Self::Utf16Be,
            "UTF16LE" => Self::Utf16Le,
            "UTF32" | "UTF32BE" => Self::Utf32Be,
            "UTF32LE" => Self::Utf32Le,
            "UTF7" => Self::Utf7,
            "ISO88591" | "LATIN1" | "L1" => Self::Latin1,
            "USASCII" | "ASCII" => Self::Ascii,
            _ => return None,
        })
    }

    /// Canonical name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf32Be => "UTF-32BE",
            Self::Utf32Le => "UTF-32LE",
            Self::Utf7 => "UTF-7",
            Self::Latin1 => "ISO-8859-1",
            Self::Ascii => "US-ASCII",
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum Input<R> {
    Plain(R),
    Utf7(Utf7Decoder<R>),
}

impl<R: io::Read> Input<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(reader) => reader.read(buf),
            Self::Utf7(reader) => reader.read(buf),
        }
    }
}

/// Decodes a byte reader into characters.
///
/// A [`UnitSource<char>`] reporting its charset's name as its encoding.
pub struct Decoder<R> {
    input: Input<R>,
    charset: Charset,
    pending: Vec<u8>,
    eof: bool,
}

impl<R: io::Read> Decoder<R> {
    /// Decodes `reader` as `charset`.
    #[must_use]
    pub fn new(reader: R, charset: Charset) -> Self {
        let input = match charset {
            Charset::Utf7 => Input::Utf7(Utf7Decoder::new(reader)),
            _ => Input::Plain(reader),
        };
        Self {
            input,
            charset,
            pending: Vec::new(),
            eof: false,
        }
    }

    /// The charset being decoded.
    #[must_use]
    pub fn charset(&self) -> Charset {
        self.charset
    }

    fn refill(&mut self) -> io::Result<()> {
        let mut chunk = [0; REFILL];
        let n = loop {
            match self.input.read(&mut chunk) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                res => break res?,
            }
        };
        if n == 0 {
            self.eof = true;
        }
        self.pending.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    /// Decodes the character at the front of `bytes`, returning it and the
    /// number of bytes it took. `None` means more bytes are needed.
    fn decode_one(&self, bytes: &[u8]) -> Option<(char, usize)> {
        if bytes.is_empty() {
            return None;
        }
        match self.charset {
            Charset::Utf8 => {
                let (ch, n) = decode_utf8(bytes);
                match ch {
                    Some(ch) => Some((ch, n)),
                    // A truncated sequence at the end may still complete.
                    None if n == bytes.len() && n < 4 && !self.eof => None,
                    None => Some((char::REPLACEMENT_CHARACTER, n.max(1))),
                }
            }
            Charset::Utf16Be | Charset::Utf7 => self.decode_utf16(bytes, u16::from_be_bytes),
            Charset::Utf16Le => self.decode_utf16(bytes, u16::from_le_bytes),
            Charset::Utf32Be => self.decode_utf32(bytes, u32::from_be_bytes),
            Charset::Utf32Le => self.decode_utf32(bytes, u32::from_le_bytes),
            Charset::Latin1 => Some((char::from(bytes[0]), 1)),
            Charset::Ascii => Some((
                if bytes[0].is_ascii() {
                    char::from(bytes[0])
                } else {
                    char::REPLACEMENT_CHARACTER
                },
                1,
            )),
        }
    }

    fn decode_utf16(&self, bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<(char, usize)> {
        let Some(&[a, b]) = bytes.first_chunk::<2>() else {
            return self.eof.then_some((char::REPLACEMENT_CHARACTER, bytes.len()));
        };
        let high = unit([a, b]);
        if !(0xD800..0xDC00).contains(&high) {
            let ch = char::from_u32(u32::from(high)).unwrap_or(char::REPLACEMENT_CHARACTER);
            return Some((ch, 2));
        }
        let Some(&[c, d]) = bytes.get(2..).and_then(<[u8]>::first_chunk::<2>) else {
            return self.eof.then_some((char::REPLACEMENT_CHARACTER, bytes.len()));
        };
        let low = unit([c, d]);
        if (0xDC00..0xE000).contains(&low) {
            let code = 0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
            Some((char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER), 4))
        } else {
            Some((char::REPLACEMENT_CHARACTER, 2))
        }
    }

    fn decode_utf32(&self, bytes: &[u8], unit: fn([u8; 4]) -> u32) -> Option<(char, usize)> {
        let Some(&quad) = bytes.first_chunk::<4>() else {
            return self.eof.then_some((char::REPLACEMENT_CHARACTER, bytes.len()));
        };
        Some((char::from_u32(unit(quad)).unwrap_or(char::REPLACEMENT_CHARACTER), 4))
    }
}

impl<R: io::Read + Send> UnitSource<char> for Decoder<R> {
    fn read_units(&mut self, buf: &mut [char]) -> io::Result<usize> {
        let mut filled = 0;
        let mut at = 0;
        while filled < buf.len() {
            if let Some((ch, n)) = self.decode_one(&self.pending[at..]) {
                buf[filled] = ch;
                filled += 1;
                at += n;
                continue;
            }
            if self.eof || filled > 0 {
                break;
            }
            self.refill()?;
        }
        self.pending.drain(..at);
        Ok(filled)
    }

    fn encoding(&self) -> Option<String> {
        Some(self.charset.name().to_owned())
    }
}

impl<R> fmt::Debug for Decoder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("charset", &self.charset)
            .field("pending", &self.pending.len())
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

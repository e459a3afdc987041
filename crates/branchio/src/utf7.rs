//! A streaming UTF-7 to UTF-16BE transcoder.
//!
//! [`Utf7Decoder`] wraps any [`io::Read`] producing UTF-7 and itself yields
//! big-endian 16-bit units, ready for a UTF-16BE decoder:
//!
//! - a directly encoded byte `xx` becomes the unit `00 xx`;
//! - `+-` is a literal `+`;
//! - `+` opens a modified-base64 run whose bits are regrouped into 16-bit
//!   units. The run ends at the first byte outside the base64 alphabet. A
//!   terminating `-` is absorbed, any other byte is emitted as a direct
//!   character;
//! - bits left over at the end of a run must be zero, otherwise the read
//!   fails with [`Utf7Error`] wrapped in an [`io::Error`] of kind
//!   [`InvalidData`](io::ErrorKind::InvalidData);
//! - a U+FEFF produced as the very first unit (the decoded byte-order mark)
//!   is dropped.
//!
//! ```rust
//! use std::io::Read;
//! use branchio::utf7::Utf7Decoder;
//!
//! let mut out = Vec::new();
//! Utf7Decoder::new(&b"Hi Mom -+Jjo--!"[..]).read_to_end(&mut out).unwrap();
//! let units: Vec<u16> = out.chunks(2).map(|u| u16::from_be_bytes([u[0], u[1]])).collect();
//! assert_eq!(String::from_utf16(&units).unwrap(), "Hi Mom -\u{263A}-!");
//! ```

use std::{collections::VecDeque, io};

use thiserror::Error;

const INPUT_BUFFER: usize = 1024;
const BYTE_ORDER_MARK: u16 = 0xFEFF;

/// Malformed UTF-7 input.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf7Error {
    /// A base64 run ended with non-zero padding bits.
    #[error("invalid code: non-zero padding at the end of the base64 run ending at byte {offset}")]
    NonZeroPadding {
        /// Index of the input byte that ended the run.
        offset: u64,
    },
}

impl From<Utf7Error> for io::Error {
    fn from(err: Utf7Error) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Direct,
    /// A `+` was just read.
    Plus,
    /// Inside a base64 run, holding `pending` bits not yet emitted.
    Base64 { bits: u32, pending: u8 },
}

fn sextet(byte: u8) -> Option<u32> {
    let value = match byte {
        b'A'..=b'Z' => byte - b'A',
        b'a'..=b'z' => byte - b'a' + 26,
        b'0'..=b'9' => byte - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(u32::from(value))
}

/// Reads UTF-7 from `R` and yields UTF-16BE.
#[derive(Debug)]
pub struct Utf7Decoder<R> {
    inner: R,
    input: Box<[u8]>,
    start: usize,
    end: usize,
    consumed: u64,
    state: State,
    output: VecDeque<u8>,
    emitted_any: bool,
    eof: bool,
}

impl<R: io::Read> Utf7Decoder<R> {
    /// Wraps a UTF-7 reader.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            input: vec![0; INPUT_BUFFER].into_boxed_slice(),
            start: 0,
            end: 0,
            consumed: 0,
            state: State::Direct,
            output: VecDeque::new(),
            emitted_any: false,
            eof: false,
        }
    }

    /// Unwraps the decoder, discarding any buffered input.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn emit(&mut self, unit: u16) {
        let first = !self.emitted_any;
        self.emitted_any = true;
        if first && unit == BYTE_ORDER_MARK {
            return;
        }
        self.output.extend(unit.to_be_bytes());
    }

    fn end_run(&mut self, bits: u32, pending: u8) -> Result<(), Utf7Error> {
        self.state = State::Direct;
        if bits & ((1 << pending) - 1) == 0 {
            Ok(())
        } else {
            Err(Utf7Error::NonZeroPadding {
                offset: self.consumed,
            })
        }
    }

    fn feed(&mut self, byte: u8) -> Result<(), Utf7Error> {
        match self.state {
            State::Direct if byte == b'+' => self.state = State::Plus,
            State::Direct => self.emit(u16::from(byte)),
            State::Plus if byte == b'-' => {
                self.state = State::Direct;
                self.emit(u16::from(b'+'));
            }
            State::Plus => {
                self.state = State::Base64 { bits: 0, pending: 0 };
                return self.feed(byte);
            }
            State::Base64 { bits, pending } => match sextet(byte) {
                Some(value) => {
                    let mut bits = (bits << 6) | value;
                    let mut pending = pending + 6;
                    if pending >= 16 {
                        pending -= 16;
                        #[allow(clippy::cast_possible_truncation)]
                        let unit = (bits >> pending) as u16;
                        bits &= (1 << pending) - 1;
                        self.emit(unit);
                    }
                    self.state = State::Base64 { bits, pending };
                }
                None => {
                    self.end_run(bits, pending)?;
                    if byte != b'-' {
                        self.emit(u16::from(byte));
                    }
                }
            },
        }
        Ok(())
    }

    /// Decodes input until some output is available or the input ends.
    fn fill_output(&mut self) -> io::Result<()> {
        while self.output.is_empty() && !self.eof {
            if self.start == self.end {
                let n = loop {
                    match self.inner.read(&mut self.input) {
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                        res => break res?,
                    }
                };
                if n == 0 {
                    self.eof = true;
                    if let State::Base64 { bits, pending } = self.state {
                        self.end_run(bits, pending)?;
                    }
                    break;
                }
                self.start = 0;
                self.end = n;
            }
            while self.start < self.end && self.output.is_empty() {
                let byte = self.input[self.start];
                self.start += 1;
                self.consumed += 1;
                self.feed(byte)?;
            }
        }
        Ok(())
    }
}

impl<R: io::Read> io::Read for Utf7Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.fill_output()?;
        let n = buf.len().min(self.output.len());
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use rstest::rstest;

    use super::*;

    fn decode(input: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        Utf7Decoder::new(input).read_to_end(&mut out)?;
        Ok(out)
    }

    #[rstest]
    #[case::marker_only(b"+/v8-", &[])]
    #[case::marker_then_text(b"+/v8-a", &[0x00, b'a'])]
    #[case::plus_as_base64(b"++v8-", &[0xFA, 0xFF])]
    #[case::not_a_marker(b"+/u8-", &[0xFE, 0xEF])]
    #[case::literal_plus(b"1+-1", &[0x00, b'1', 0x00, b'+', 0x00, b'1'])]
    #[case::run_ended_by_other_byte(b"+AGE.", &[0x00, b'a', 0x00, b'.'])]
    #[case::run_ended_by_eof(b"+AGE", &[0x00, b'a'])]
    #[case::dangling_plus(b"x+", &[0x00, b'x'])]
    #[case::plus_then_punctuation(b"+!", &[0x00, b'!'])]
    fn decodes(#[case] input: &[u8], #[case] expected: &[u8]) {
        assert_eq!(decode(input).unwrap(), expected);
    }

    #[test]
    fn only_the_first_unit_is_checked_for_a_marker() {
        assert_eq!(decode(b"a+/v8-").unwrap(), [0x00, b'a', 0xFE, 0xFF]);
    }

    #[test]
    fn non_zero_padding_is_invalid_data() {
        let err = decode(b"+/v8/-").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let inner = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<Utf7Error>())
            .copied();
        assert_eq!(inner, Some(Utf7Error::NonZeroPadding { offset: 6 }));
    }

    #[test]
    fn decodes_across_small_reads() {
        struct Trickle<'a>(&'a [u8]);
        impl Read for Trickle<'_> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                let Some((&first, rest)) = self.0.split_first() else {
                    return Ok(0);
                };
                buf[0] = first;
                self.0 = rest;
                Ok(1)
            }
        }

        let mut out = Vec::new();
        Utf7Decoder::new(Trickle(b"A+ImIDkQ."))
            .read_to_end(&mut out)
            .unwrap();
        let units: Vec<u16> = out
            .chunks(2)
            .map(|u| u16::from_be_bytes([u[0], u[1]]))
            .collect();
        assert_eq!(String::from_utf16(&units).unwrap(), "A\u{2262}\u{0391}.");
    }
}

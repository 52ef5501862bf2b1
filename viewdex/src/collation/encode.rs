use crate::collation::unicode::char_priority;
use crate::collation::Collation;
use crate::common::Key;
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};
use std::collections::BTreeMap;

// Type tags, in total type order. 0x00 is reserved as the terminator so a
// shorter composite that agrees on a prefix byte-compares below a longer one.
const TAG_NULL: u8 = 1;
const TAG_FALSE: u8 = 2;
const TAG_TRUE: u8 = 3;
const TAG_NUMBER: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_ARRAY: u8 = 6;
const TAG_MAP: u8 = 7;

const TERMINATOR: u8 = 0x00;
// A 0x00 byte inside string content becomes 0x00 0xFF, which still sorts
// below every unescaped byte >= 0x01 and above a bare terminator.
const ZERO_ESCAPE: u8 = 0xFF;

fn invalid(msg: &str) -> ViewdexError {
    ViewdexError::new(msg, ErrorKind::InvalidKey)
}

/// Order-preserving f64 encoding: flip the sign bit of non-negative values,
/// complement all bits of negative ones. Byte order of the result matches
/// numeric order; the transform is bijective so decode is exact.
fn number_to_bytes(n: f64) -> [u8; 8] {
    // -0.0 and 0.0 compare equal, so they must encode identically
    let n = if n == 0.0 { 0.0 } else { n };
    let bits = n.to_bits();
    let enc = if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits ^ (1 << 63)
    };
    enc.to_be_bytes()
}

fn number_from_bytes(bytes: [u8; 8]) -> f64 {
    let enc = u64::from_be_bytes(bytes);
    let bits = if enc & (1 << 63) != 0 {
        enc ^ (1 << 63)
    } else {
        !enc
    };
    f64::from_bits(bits)
}

fn push_escaped(buf: &mut Vec<u8>, s: &str) {
    for &b in s.as_bytes() {
        buf.push(b);
        if b == TERMINATOR {
            buf.push(ZERO_ESCAPE);
        }
    }
    buf.push(TERMINATOR);
}

/// One character's primary weight as three non-zero bytes (7 bits each,
/// offset by one), so the weight section never contains the terminator.
fn push_weight(buf: &mut Vec<u8>, priority: u32) {
    buf.push((((priority >> 14) & 0x7F) + 1) as u8);
    buf.push((((priority >> 7) & 0x7F) + 1) as u8);
    buf.push(((priority & 0x7F) + 1) as u8);
}

fn push_string(buf: &mut Vec<u8>, s: &str, mode: Collation) {
    buf.push(TAG_STRING);
    match mode {
        // UTF-8 byte order equals code-point order, so Raw and ASCII
        // collation share one string encoding
        Collation::Raw | Collation::Ascii => push_escaped(buf, s),
        Collation::Unicode => {
            for c in s.chars() {
                push_weight(buf, char_priority(c));
            }
            buf.push(TERMINATOR);
            push_escaped(buf, s);
        }
    }
}

pub(crate) fn encode_into(buf: &mut Vec<u8>, key: &Key, mode: Collation) -> ViewdexResult<()> {
    match key {
        Key::Null => buf.push(TAG_NULL),
        Key::Bool(false) => buf.push(TAG_FALSE),
        Key::Bool(true) => buf.push(TAG_TRUE),
        Key::Number(n) => {
            if !n.is_finite() {
                return Err(invalid(&format!(
                    "cannot encode non-finite number {} as an index key",
                    n
                )));
            }
            buf.push(TAG_NUMBER);
            buf.extend_from_slice(&number_to_bytes(*n));
        }
        Key::String(s) => push_string(buf, s, mode),
        Key::Array(elements) => {
            buf.push(TAG_ARRAY);
            for element in elements {
                encode_into(buf, element, mode)?;
            }
            buf.push(TERMINATOR);
        }
        Key::Map(entries) => {
            buf.push(TAG_MAP);
            // entries are stored in the mode's string order so that byte
            // comparison resolves the first mismatching key
            let mut sorted: Vec<(&String, &Key)> = entries.iter().collect();
            sorted.sort_by(|(a, _), (b, _)| mode.string_cmp(a, b));
            for (name, value) in sorted {
                push_string(buf, name, mode);
                encode_into(buf, value, mode)?;
            }
            buf.push(TERMINATOR);
        }
    }
    Ok(())
}

pub(crate) struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    mode: Collation,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(bytes: &'a [u8], mode: Collation) -> Self {
        Decoder { bytes, pos: 0, mode }
    }

    pub(crate) fn finished(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn take(&mut self) -> ViewdexResult<u8> {
        let b = self
            .peek()
            .ok_or_else(|| invalid("truncated key encoding"))?;
        self.pos += 1;
        Ok(b)
    }

    fn take_array<const N: usize>(&mut self) -> ViewdexResult<[u8; N]> {
        if self.pos + N > self.bytes.len() {
            return Err(invalid("truncated key encoding"));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn read_escaped(&mut self) -> ViewdexResult<String> {
        let mut raw = Vec::new();
        loop {
            let b = self.take()?;
            if b == TERMINATOR {
                if self.peek() == Some(ZERO_ESCAPE) {
                    self.pos += 1;
                    raw.push(TERMINATOR);
                } else {
                    break;
                }
            } else {
                raw.push(b);
            }
        }
        Ok(String::from_utf8(raw)?)
    }

    fn read_string(&mut self) -> ViewdexResult<String> {
        if self.mode == Collation::Unicode {
            // skip the weight section; weights never contain the terminator
            loop {
                if self.take()? == TERMINATOR {
                    break;
                }
            }
        }
        self.read_escaped()
    }

    pub(crate) fn decode_key(&mut self) -> ViewdexResult<Key> {
        let tag = self.take()?;
        match tag {
            TAG_NULL => Ok(Key::Null),
            TAG_FALSE => Ok(Key::Bool(false)),
            TAG_TRUE => Ok(Key::Bool(true)),
            TAG_NUMBER => Ok(Key::Number(number_from_bytes(self.take_array::<8>()?))),
            TAG_STRING => Ok(Key::String(self.read_string()?)),
            TAG_ARRAY => {
                let mut elements = Vec::new();
                loop {
                    match self.peek() {
                        Some(TERMINATOR) => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => elements.push(self.decode_key()?),
                        None => return Err(invalid("unterminated array encoding")),
                    }
                }
                Ok(Key::Array(elements))
            }
            TAG_MAP => {
                let mut entries = BTreeMap::new();
                loop {
                    match self.peek() {
                        Some(TERMINATOR) => {
                            self.pos += 1;
                            break;
                        }
                        Some(TAG_STRING) => {
                            self.pos += 1;
                            let name = self.read_string()?;
                            let value = self.decode_key()?;
                            entries.insert(name, value);
                        }
                        Some(other) => {
                            return Err(invalid(&format!(
                                "expected string key in map encoding, found tag {}",
                                other
                            )))
                        }
                        None => return Err(invalid("unterminated map encoding")),
                    }
                }
                Ok(Key::Map(entries))
            }
            other => Err(invalid(&format!("unknown key type tag {}", other))),
        }
    }
}

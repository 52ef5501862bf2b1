//! The collation codec: a total, cross-platform-stable order over
//! heterogeneous emitted keys, together with an order-preserving binary
//! encoding of them.
//!
//! The total type order in every mode is
//! `null < false < true < number < string < array < map`.
//! Modes differ only in how strings are ordered:
//!
//! - [`Collation::Raw`]: byte-wise comparison of the UTF-8 encoding
//! - [`Collation::Ascii`]: code-point comparison, case-sensitive (identical
//!   to byte order for UTF-8, so the two share an encoding)
//! - [`Collation::Unicode`]: a fixed weight table (see
//!   [`unicode`](self)); deterministic across platforms, ties broken by
//!   raw code-point order
//!
//! The invariant the query engine relies on: for any two keys `a`, `b` and
//! mode `m`, `compare(a, b, m)` agrees in sign with the byte comparison of
//! `encode(a, m)` and `encode(b, m)`, and `decode(encode(a, m), m)`
//! reconstructs `a` exactly.

mod encode;
mod unicode;

use std::cmp::Ordering;

use crate::common::Key;
use crate::errors::{ErrorKind, ViewdexError, ViewdexResult};

/// The ordering policy applied to a view's emitted keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Collation {
    /// Fixed default-collation weight table, stable across platforms.
    #[default]
    Unicode,
    /// Case-sensitive code-point order, independent of locale.
    Ascii,
    /// Byte-wise order of the UTF-8 representation.
    Raw,
}

impl Collation {
    /// Encodes a key into its order-preserving binary form.
    ///
    /// Fails with `InvalidKey` if the key contains a non-finite number.
    pub fn encode(&self, key: &Key) -> ViewdexResult<Vec<u8>> {
        let mut buf = Vec::new();
        encode::encode_into(&mut buf, key, *self)?;
        Ok(buf)
    }

    /// Decodes a key from its binary form, reconstructing it exactly.
    ///
    /// Fails with `InvalidKey` on malformed or truncated input, including
    /// the zero-length whole-document placeholder, which is a row *value*
    /// sentinel and never a key (see [`decode_row_value`]).
    pub fn decode(&self, bytes: &[u8]) -> ViewdexResult<Key> {
        if bytes.is_empty() {
            return Err(ViewdexError::new(
                "cannot decode an empty key encoding",
                ErrorKind::InvalidKey,
            ));
        }
        let mut decoder = encode::Decoder::new(bytes, *self);
        let key = decoder.decode_key()?;
        if !decoder.finished() {
            return Err(ViewdexError::new(
                "trailing bytes after key encoding",
                ErrorKind::InvalidKey,
            ));
        }
        Ok(key)
    }

    /// Compares two keys under this mode. Agrees in sign with the byte
    /// comparison of the keys' encodings.
    pub fn compare(&self, a: &Key, b: &Key) -> Ordering {
        match type_rank(a).cmp(&type_rank(b)) {
            Ordering::Equal => {}
            other => return other,
        }
        match (a, b) {
            (Key::Null, Key::Null) => Ordering::Equal,
            (Key::Bool(_), Key::Bool(_)) => Ordering::Equal, // same rank means same value
            (Key::Number(x), Key::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
            (Key::String(x), Key::String(y)) => self.string_cmp(x, y),
            (Key::Array(x), Key::Array(y)) => {
                for (ex, ey) in x.iter().zip(y.iter()) {
                    match self.compare(ex, ey) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                }
                x.len().cmp(&y.len())
            }
            (Key::Map(x), Key::Map(y)) => {
                let mut xs: Vec<(&String, &Key)> = x.iter().collect();
                let mut ys: Vec<(&String, &Key)> = y.iter().collect();
                xs.sort_by(|(a, _), (b, _)| self.string_cmp(a, b));
                ys.sort_by(|(a, _), (b, _)| self.string_cmp(a, b));
                for ((xk, xv), (yk, yv)) in xs.iter().zip(ys.iter()) {
                    match self.string_cmp(xk, yk) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                    match self.compare(xv, yv) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                }
                xs.len().cmp(&ys.len())
            }
            _ => Ordering::Equal, // unreachable: ranks already matched
        }
    }

    pub(crate) fn string_cmp(&self, a: &str, b: &str) -> Ordering {
        match self {
            Collation::Raw | Collation::Ascii => a.as_bytes().cmp(b.as_bytes()),
            Collation::Unicode => unicode::unicode_cmp(a, b),
        }
    }
}

fn type_rank(key: &Key) -> u8 {
    match key {
        Key::Null => 0,
        Key::Bool(false) => 1,
        Key::Bool(true) => 2,
        Key::Number(_) => 3,
        Key::String(_) => 4,
        Key::Array(_) => 5,
        Key::Map(_) => 6,
    }
}

/// Encodes a row value. `None` is the whole-document placeholder: the row
/// carries no payload beyond the document body, encoded as the zero-length
/// byte string. Row values are not collated, so a single fixed mode is used.
pub fn encode_row_value(value: Option<&Key>) -> ViewdexResult<Vec<u8>> {
    match value {
        None => Ok(Vec::new()),
        Some(key) => Collation::Raw.encode(key),
    }
}

/// Decodes a row value. Recognizes the zero-length placeholder sentinel
/// without attempting a structural parse.
pub fn decode_row_value(bytes: &[u8]) -> ViewdexResult<Option<Key>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(Collation::Raw.decode(bytes)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key;

    const MODES: [Collation; 3] = [Collation::Unicode, Collation::Ascii, Collation::Raw];

    fn corpus() -> Vec<Key> {
        vec![
            key!(null),
            key!(false),
            key!(true),
            key!(-10),
            key!(0),
            key!(0.5),
            key!(3),
            key!(1000000),
            key!(""),
            key!(" "),
            key!("!"),
            key!("0"),
            key!("Apple"),
            key!("apple"),
            key!("applesauce"),
            key!("banana"),
            key!("\u{00E9}clair"),
            Key::String("nul\u{0}byte".to_string()),
            key!([]),
            key!(["a"]),
            key!(["a", 1]),
            key!(["a", 1, true]),
            key!(["b", 2]),
            key!({}),
            key!({ "a": 1 }),
            key!({ "a": 1, "b": 2 }),
            key!({ "b": 1 }),
        ]
    }

    #[test]
    fn test_round_trip_all_modes() {
        for mode in MODES {
            for key in corpus() {
                let encoded = mode.encode(&key).unwrap();
                let decoded = mode.decode(&encoded).unwrap();
                assert_eq!(decoded, key, "round trip failed under {:?}", mode);
            }
        }
    }

    #[test]
    fn test_order_consistency_all_modes() {
        // compare() must agree in sign with byte order of the encodings
        for mode in MODES {
            let keys = corpus();
            for a in &keys {
                for b in &keys {
                    let structural = mode.compare(a, b);
                    let encoded = mode.encode(a).unwrap().cmp(&mode.encode(b).unwrap());
                    assert_eq!(
                        structural, encoded,
                        "compare({}, {}) disagrees with encoding order under {:?}",
                        a, b, mode
                    );
                }
            }
        }
    }

    #[test]
    fn test_total_type_order() {
        let ladder = [
            key!(null),
            key!(false),
            key!(true),
            key!(1),
            key!("a"),
            key!(["a"]),
            key!({ "a": 1 }),
        ];
        for mode in MODES {
            for pair in ladder.windows(2) {
                assert_eq!(mode.compare(&pair[0], &pair[1]), Ordering::Less);
            }
        }
    }

    #[test]
    fn test_string_modes_differ() {
        // "B" < "a" byte-wise, but the unicode table folds case
        assert_eq!(Collation::Raw.compare(&key!("B"), &key!("a")), Ordering::Less);
        assert_eq!(
            Collation::Ascii.compare(&key!("B"), &key!("a")),
            Ordering::Less
        );
        assert_eq!(
            Collation::Unicode.compare(&key!("B"), &key!("a")),
            Ordering::Greater
        );
    }

    #[test]
    fn test_array_prefix_is_less() {
        for mode in MODES {
            assert_eq!(
                mode.compare(&key!(["a"]), &key!(["a", 0])),
                Ordering::Less
            );
        }
    }

    #[test]
    fn test_map_compare_first_mismatching_key() {
        let smaller = key!({ "a": 1, "c": 9 });
        let larger = key!({ "a": 1, "b": 0 });
        // "c" > "b": the map whose first mismatching key is smaller wins
        assert_eq!(Collation::Raw.compare(&larger, &smaller), Ordering::Less);

        let prefix = key!({ "a": 1 });
        let longer = key!({ "a": 1, "b": 2 });
        assert_eq!(Collation::Raw.compare(&prefix, &longer), Ordering::Less);
    }

    #[test]
    fn test_row_value_placeholder() {
        let encoded = encode_row_value(None).unwrap();
        assert!(encoded.is_empty());
        assert_eq!(decode_row_value(&encoded).unwrap(), None);

        let encoded = encode_row_value(Some(&key!(42))).unwrap();
        assert_eq!(decode_row_value(&encoded).unwrap(), Some(key!(42)));
    }

    #[test]
    fn test_decode_empty_key_rejected() {
        let err = Collation::Raw.decode(&[]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidKey);
    }

    #[test]
    fn test_decode_trailing_bytes_rejected() {
        let mut encoded = Collation::Raw.encode(&key!(1)).unwrap();
        encoded.push(1);
        assert!(Collation::Raw.decode(&encoded).is_err());
    }
}

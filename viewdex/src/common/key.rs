use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};

/// A document-log sequence number. Sequence 0 means "nothing indexed yet".
pub type SequenceNumber = u64;

/// A structurally typed value emitted by a map function, used as an index
/// key or row value.
///
/// # Variants
/// - `Null`: absence of a value
/// - `Bool(bool)`: boolean true/false
/// - `Number(f64)`: numeric value; the collation codec rejects NaN and
///   infinities with `InvalidKey`
/// - `String(String)`: text value
/// - `Array(Vec<Key>)`: ordered sequence of keys
/// - `Map(BTreeMap<String, Key>)`: key-ordered mapping
///
/// Keys carry no intrinsic ordering of their own; ordering is defined by a
/// [`Collation`](crate::collation::Collation) mode, which also fixes the
/// order-preserving binary encoding.
///
/// # Usage
/// Create keys using the `From` trait or the `key!` macro:
/// ```text
/// let k1: Key = 42.into();
/// let k2 = Key::from("hello");
/// let k3 = key!(["tag", 3]);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Key {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Key>),
    Map(BTreeMap<String, Key>),
}

// `Number` never holds NaN once it has passed through the collation codec,
// which rejects non-finite values before they reach an index.
impl Eq for Key {}

impl Default for Key {
    fn default() -> Self {
        Key::Null
    }
}

impl Key {
    pub fn is_null(&self) -> bool {
        matches!(self, Key::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Key::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Key::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Key::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Key]> {
        match self {
            Key::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Key>> {
        match self {
            Key::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Null => write!(f, "null"),
            Key::Bool(b) => write!(f, "{}", b),
            Key::Number(n) => write!(f, "{}", n),
            Key::String(s) => write!(f, "{:?}", s),
            Key::Array(a) => {
                write!(f, "[")?;
                for (i, k) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", k)?;
                }
                write!(f, "]")
            }
            Key::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{:?}:{}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(n)
    }
}

impl From<f32> for Key {
    fn from(n: f32) -> Self {
        Key::Number(n as f64)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Number(n as f64)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n as f64)
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Number(n as f64)
    }
}

impl From<u64> for Key {
    fn from(n: u64) -> Self {
        Key::Number(n as f64)
    }
}

impl From<usize> for Key {
    fn from(n: usize) -> Self {
        Key::Number(n as f64)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s)
    }
}

impl From<Vec<Key>> for Key {
    fn from(a: Vec<Key>) -> Self {
        Key::Array(a)
    }
}

impl From<BTreeMap<String, Key>> for Key {
    fn from(m: BTreeMap<String, Key>) -> Self {
        Key::Map(m)
    }
}

impl<T: Into<Key>> From<Option<T>> for Key {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Key::Null,
        }
    }
}

/// Constructs a [`Key`] from a JSON-like literal.
///
/// # Examples
///
/// ```rust
/// use viewdex::key;
///
/// let k = key!(["b", 2]);
/// let nested = key!({ "tag": "fruit", "count": 3 });
/// let n = key!(null);
/// ```
#[macro_export]
macro_rules! key {
    (null) => {
        $crate::common::Key::Null
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Key::Array(vec![$($crate::key!($value)),*])
    };

    ({}) => {
        $crate::common::Key::Map(std::collections::BTreeMap::new())
    };

    ({ $($name:literal : $value:tt),* $(,)? }) => {
        {
            let mut map = std::collections::BTreeMap::new();
            $(
                map.insert($name.to_string(), $crate::key!($value));
            )*
            $crate::common::Key::Map(map)
        }
    };

    ($value:expr) => {
        $crate::common::Key::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_primitives() {
        assert_eq!(Key::from(true), Key::Bool(true));
        assert_eq!(Key::from(3), Key::Number(3.0));
        assert_eq!(Key::from(2.5), Key::Number(2.5));
        assert_eq!(Key::from("a"), Key::String("a".to_string()));
        assert_eq!(Key::from(None::<i32>), Key::Null);
        assert_eq!(Key::from(Some(7)), Key::Number(7.0));
    }

    #[test]
    fn test_key_macro_scalars() {
        assert_eq!(key!(null), Key::Null);
        assert_eq!(key!(false), Key::Bool(false));
        assert_eq!(key!(1.5), Key::Number(1.5));
        assert_eq!(key!("x"), Key::String("x".to_string()));
    }

    #[test]
    fn test_key_macro_array() {
        let k = key!(["a", 1, true]);
        assert_eq!(
            k,
            Key::Array(vec![
                Key::String("a".to_string()),
                Key::Number(1.0),
                Key::Bool(true)
            ])
        );
    }

    #[test]
    fn test_key_macro_nested() {
        let k = key!([["a", 1], null]);
        let inner = Key::Array(vec![Key::String("a".to_string()), Key::Number(1.0)]);
        assert_eq!(k, Key::Array(vec![inner, Key::Null]));
    }

    #[test]
    fn test_key_macro_map() {
        let k = key!({ "tag": "fruit", "count": 3 });
        let map = k.as_map().unwrap();
        assert_eq!(map.get("tag"), Some(&Key::String("fruit".to_string())));
        assert_eq!(map.get("count"), Some(&Key::Number(3.0)));
    }

    #[test]
    fn test_key_macro_empty_map() {
        let k = key!({});
        assert!(k.as_map().unwrap().is_empty());
        assert_ne!(k, key!([]));
    }

    #[test]
    fn test_accessors() {
        assert!(key!(null).is_null());
        assert_eq!(key!(true).as_bool(), Some(true));
        assert_eq!(key!(4).as_number(), Some(4.0));
        assert_eq!(key!("s").as_string(), Some("s"));
        assert_eq!(key!(["a"]).as_array().unwrap().len(), 1);
        assert!(key!("s").as_array().is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", key!(["a", 1])), "[\"a\",1]");
        assert_eq!(format!("{}", key!(null)), "null");
    }
}

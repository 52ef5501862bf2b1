use std::cmp::Ordering;
use std::sync::LazyLock;

/// Primary collation weights for the ASCII range.
///
/// The table is fixed and platform-independent: two replicas indexing the
/// same documents must compute identical index order, so no locale or OS
/// collation is consulted. The ordering it realizes:
///
/// 1. control characters (U+0000–U+001F, then U+007F), in code-point order
/// 2. space
/// 3. punctuation, in code-point order
/// 4. digits `0`–`9`
/// 5. letters, case-insensitive at this level (`a` and `A` share a weight)
///
/// Characters at U+0080 and above collate after all ASCII, in code-point
/// order. Strings whose primary weights tie (they differ only in letter
/// case) are ordered by raw code point, so `"Apple" < "apple"`.
static ASCII_PRIORITY: LazyLock<[u8; 128]> = LazyLock::new(|| {
    let mut table = [0u8; 128];
    let mut next = 1u8;
    for cp in 0x00..0x20 {
        table[cp] = next;
        next += 1;
    }
    table[0x7F] = next;
    next += 1;
    table[0x20] = next;
    next += 1;
    for cp in 0x21..0x7F {
        if (cp as u8 as char).is_ascii_punctuation() {
            table[cp] = next;
            next += 1;
        }
    }
    for digit in b'0'..=b'9' {
        table[digit as usize] = next;
        next += 1;
    }
    for lower in b'a'..=b'z' {
        table[lower as usize] = next;
        table[(lower - 0x20) as usize] = next;
        next += 1;
    }
    table
});

// Above the shared-weight region so non-ASCII never ties with ASCII.
const NON_ASCII_BASE: u32 = 0x80;

/// Primary weight of one character. Fits in 21 bits.
pub(crate) fn char_priority(c: char) -> u32 {
    let cp = c as u32;
    if cp < 128 {
        ASCII_PRIORITY[cp as usize] as u32
    } else {
        NON_ASCII_BASE + cp
    }
}

/// Unicode-mode string comparison: primary weights first (shorter string
/// that is a weight-prefix of the other sorts first), raw code points as
/// the tie-break.
pub(crate) fn unicode_cmp(a: &str, b: &str) -> Ordering {
    let weights = a.chars().map(char_priority).cmp(b.chars().map(char_priority));
    match weights {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_case_insensitive_primary() {
        assert_eq!(char_priority('a'), char_priority('A'));
        assert_eq!(char_priority('z'), char_priority('Z'));
        assert!(char_priority('a') < char_priority('b'));
    }

    #[test]
    fn test_class_ordering() {
        // space < punctuation < digits < letters
        assert!(char_priority(' ') < char_priority('!'));
        assert!(char_priority('~') < char_priority('0'));
        assert!(char_priority('9') < char_priority('a'));
    }

    #[test]
    fn test_non_ascii_after_ascii() {
        assert!(char_priority('z') < char_priority('\u{00E9}'));
        assert!(char_priority('\u{00E9}') < char_priority('\u{4E2D}'));
    }

    #[test]
    fn test_unicode_cmp_case() {
        // equal primary weights, broken by code point: uppercase first
        assert_eq!(unicode_cmp("Apple", "apple"), Ordering::Less);
        assert_eq!(unicode_cmp("apple", "apple"), Ordering::Equal);
        // primary weight wins over case
        assert_eq!(unicode_cmp("apple", "Banana"), Ordering::Less);
    }

    #[test]
    fn test_unicode_cmp_prefix() {
        assert_eq!(unicode_cmp("app", "apple"), Ordering::Less);
        assert_eq!(unicode_cmp("apple", "app"), Ordering::Greater);
    }

    #[test]
    fn test_priorities_distinct_outside_letters() {
        // every non-letter ASCII char gets its own weight
        let mut seen = std::collections::HashSet::new();
        for cp in 0u8..128 {
            let c = cp as char;
            if !c.is_ascii_alphabetic() {
                assert!(seen.insert(char_priority(c)), "duplicate weight for {:?}", c);
            }
        }
    }
}

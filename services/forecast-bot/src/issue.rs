//! Round identifier arithmetic
//!
//! Identifiers are decimal strings of arbitrary length. Arithmetic works on
//! the digits directly so identifiers wider than any machine integer still
//! sequence correctly.

use std::cmp::Ordering;

/// Successor of a round identifier
///
/// Non-numeric identifiers are returned unchanged.
pub fn next_issue(issue: &str) -> String {
    let Some(digits) = normalize(issue) else {
        return issue.to_string();
    };

    let mut bytes = digits.into_bytes();
    let mut carry = true;
    for b in bytes.iter_mut().rev() {
        if !carry {
            break;
        }
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            carry = false;
        }
    }
    if carry {
        bytes.insert(0, b'1');
    }

    // Only ASCII digits were written
    String::from_utf8(bytes).unwrap_or_else(|_| issue.to_string())
}

/// Signed distance `current - start` between two identifiers
///
/// Returns `None` when either identifier is non-numeric. Magnitudes beyond
/// `i64` saturate.
pub fn issue_distance(start: &str, current: &str) -> Option<i64> {
    let start = normalize(start)?;
    let current = normalize(current)?;

    let (larger, smaller, negative) = match compare_digits(&current, &start) {
        Ordering::Equal => return Some(0),
        Ordering::Greater => (current, start, false),
        Ordering::Less => (start, current, true),
    };

    let magnitude = subtract_digits(&larger, &smaller);
    let value = magnitude.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}

/// Whether the identifier is a non-negative decimal integer
pub fn is_numeric(issue: &str) -> bool {
    normalize(issue).is_some()
}

/// Trim and strip leading zeros; `None` for anything but ASCII digits
fn normalize(issue: &str) -> Option<String> {
    let trimmed = issue.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() {
        Some("0".to_string())
    } else {
        Some(stripped.to_string())
    }
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// `larger - smaller` for normalized digit strings with `larger >= smaller`
fn subtract_digits(larger: &str, smaller: &str) -> String {
    let a = larger.as_bytes();
    let b = smaller.as_bytes();
    let mut out = Vec::with_capacity(a.len());
    let mut borrow = 0i16;

    for i in 0..a.len() {
        let da = (a[a.len() - 1 - i] - b'0') as i16;
        let db = if i < b.len() {
            (b[b.len() - 1 - i] - b'0') as i16
        } else {
            0
        };
        let mut d = da - db - borrow;
        if d < 0 {
            d += 10;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out.push(b'0' + d as u8);
    }

    while out.len() > 1 && out.last() == Some(&b'0') {
        out.pop();
    }
    out.reverse();
    out.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_issue_simple() {
        assert_eq!(next_issue("100"), "101");
        assert_eq!(next_issue("0"), "1");
        assert_eq!(next_issue("199"), "200");
        assert_eq!(next_issue("999"), "1000");
    }

    #[test]
    fn test_next_issue_beyond_u128() {
        let wide = "9".repeat(45);
        let expected = format!("1{}", "0".repeat(45));
        assert_eq!(next_issue(&wide), expected);

        let issue = "20240517100010234";
        assert_eq!(next_issue(issue), "20240517100010235");
    }

    #[test]
    fn test_next_issue_normalizes_like_integer_parse() {
        assert_eq!(next_issue("007"), "8");
        assert_eq!(next_issue(" 41 "), "42");
    }

    #[test]
    fn test_next_issue_non_numeric_passthrough() {
        assert_eq!(next_issue("abc"), "abc");
        assert_eq!(next_issue("12a"), "12a");
        assert_eq!(next_issue("-5"), "-5");
        assert_eq!(next_issue(""), "");
    }

    #[test]
    fn test_next_issue_parses_back_to_successor() {
        for n in [0u64, 9, 10, 99, 12345, 20240517100010234] {
            let next = next_issue(&n.to_string());
            assert_eq!(next.parse::<u64>().unwrap(), n + 1);
        }
    }

    #[test]
    fn test_issue_distance() {
        assert_eq!(issue_distance("100", "103"), Some(3));
        assert_eq!(issue_distance("100", "100"), Some(0));
        assert_eq!(issue_distance("103", "100"), Some(-3));
        assert_eq!(issue_distance("0999", "1001"), Some(2));
        assert_eq!(
            issue_distance("20240517100010234", "20240517100010300"),
            Some(66)
        );
    }

    #[test]
    fn test_issue_distance_wide_and_saturating() {
        let start = format!("1{}", "0".repeat(40));
        let current = format!("1{}5", "0".repeat(39));
        assert_eq!(issue_distance(&start, &current), Some(5));

        let huge = format!("1{}", "0".repeat(30));
        assert_eq!(issue_distance("0", &huge), Some(i64::MAX));
    }

    #[test]
    fn test_issue_distance_non_numeric() {
        assert_eq!(issue_distance("abc", "100"), None);
        assert_eq!(issue_distance("100", "x"), None);
        assert!(!is_numeric("R-17"));
        assert!(is_numeric("0017"));
    }
}

use std::cmp::Ordering;

use itertools::{EitherOrBoth, Itertools};

/// Compare dot separated pack versions segment by segment.
///
/// Numeric segments compare as numbers, anything else lexically, and a
/// numeric segment sorts before a non-numeric one. Missing trailing segments
/// count as `0`, so `1.0` and `1.0.0` are equal.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    a.trim()
        .split('.')
        .zip_longest(b.trim().split('.'))
        .map(|pair| match pair {
            EitherOrBoth::Both(left, right) => compare_segment(left, right),
            EitherOrBoth::Left(left) => compare_segment(left, "0"),
            EitherOrBoth::Right(right) => compare_segment("0", right),
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(left), Ok(right)) => left.cmp(&right),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments_compare_as_numbers() {
        assert_eq!(compare_versions("2.1.0", "2.0.9"), Ordering::Greater);
        assert_eq!(compare_versions("3.0.158", "3.0.99"), Ordering::Greater);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
    }

    #[test]
    fn missing_segments_are_zero() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn text_segments_fall_back_to_lexical() {
        assert_eq!(compare_versions("1.0.beta", "1.0.alpha"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.1", "1.0.rc"), Ordering::Less);
    }
}

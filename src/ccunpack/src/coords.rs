//! Coordinate string parsing for plist values like `{x,y}` and `{{x,y},{w,h}}`

use regex::Regex;
use std::sync::OnceLock;

fn integer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+").expect("valid integer pattern"))
}

/// Extract every integer in `s`, left to right.
///
/// No structural validation is done; callers check the count. Fractional
/// values split into two integers (`0.5` -> `[0, 5]`), matching how existing
/// descriptors have always been read.
pub fn parse_coordinates(s: &str) -> Vec<i64> {
    integer_pattern()
        .find_iter(s)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point() {
        assert_eq!(parse_coordinates("{3,-4}"), vec![3, -4]);
    }

    #[test]
    fn test_rect() {
        assert_eq!(parse_coordinates("{{10,20},{30,40}}"), vec![10, 20, 30, 40]);
        assert_eq!(parse_coordinates("{ {-1, 2}, {3, 4} }"), vec![-1, 2, 3, 4]);
    }

    #[test]
    fn test_no_numbers() {
        assert!(parse_coordinates("").is_empty());
        assert!(parse_coordinates("{,}").is_empty());
    }

    #[test]
    fn test_fraction_splits() {
        assert_eq!(parse_coordinates("{0.5,1}"), vec![0, 5, 1]);
    }
}

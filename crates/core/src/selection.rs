//! Range expressions such as `1,3-4` used to pick files, slides and
//! insert positions.

use crate::{Error, Result};
use std::collections::BTreeSet;

/// Parse a selection expression into ascending, unique values in `[1, max]`.
///
/// Tokens are separated by `,` and are either a number or an inclusive
/// `a-b` range. Values outside `[1, max]` are dropped, an inverted range
/// such as `5-2` selects nothing, and a blank expression is an empty
/// selection.
pub fn parse(expr: &str, max: usize) -> Result<Vec<usize>> {
    parse_within(expr, 1, max)
}

/// Parse insert anchors: like [`parse`], but `0` (the front of the deck) is
/// also accepted.
pub fn parse_anchors(expr: &str, max: usize) -> Result<Vec<usize>> {
    parse_within(expr, 0, max)
}

fn parse_within(expr: &str, min: usize, max: usize) -> Result<Vec<usize>> {
    let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Ok(Vec::new());
    }

    let mut values = BTreeSet::new();
    for token in compact.split(',') {
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_number(start, token)?;
                let end = parse_number(end, token)?;
                if start > end {
                    log::debug!("Inverted range '{}' selects nothing", token);
                }
                // Clamp before expanding so huge ranges stay cheap.
                let lo = start.max(min);
                let hi = end.min(max);
                values.extend(lo..=hi);
            }
            None => {
                values.insert(parse_number(token, token)?);
            }
        }
    }

    Ok(values
        .into_iter()
        .filter(|v| (min..=max).contains(v))
        .collect())
}

/// Pick items by a 1-based selection expression, preserving ascending order.
pub fn select<'a, T>(items: &'a [T], expr: &str) -> Result<Vec<&'a T>> {
    Ok(parse(expr, items.len())?
        .into_iter()
        .map(|i| &items[i - 1])
        .collect())
}

/// A bare run of ASCII digits. Numbers too large for `usize` saturate, so
/// they fall outside any range and are dropped like other large values.
fn parse_number(part: &str, token: &str) -> Result<usize> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedSelection {
            token: token.to_string(),
        });
    }
    Ok(part.parse::<usize>().unwrap_or(usize::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbers_and_ranges() {
        assert_eq!(parse("1,3-4", 10).unwrap(), vec![1, 3, 4]);
        assert_eq!(parse("2-2", 5).unwrap(), vec![2]);
        assert_eq!(parse("4,1,2-3", 10).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_deduplicates() {
        assert_eq!(parse("1,1,1-2,2", 5).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_parse_drops_out_of_range() {
        assert_eq!(parse("0,6", 5).unwrap(), Vec::<usize>::new());
        assert_eq!(parse("0-3,5-9", 6).unwrap(), vec![1, 2, 3, 5, 6]);
        assert_eq!(parse("3", 0).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_parse_inverted_range_is_empty() {
        assert_eq!(parse("5-2", 9).unwrap(), Vec::<usize>::new());
        assert_eq!(parse("5-2,7", 9).unwrap(), vec![7]);
    }

    #[test]
    fn test_parse_ignores_whitespace() {
        assert_eq!(parse(" 1 , 3 - 4 ", 10).unwrap(), vec![1, 3, 4]);
    }

    #[test]
    fn test_parse_blank_is_empty_selection() {
        assert_eq!(parse("", 10).unwrap(), Vec::<usize>::new());
        assert_eq!(parse("   ", 10).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_parse_malformed() {
        for expr in ["a", "1,,2", "1-", "-3", "1-2-3", "2,x-4", "1.5", "+3", "1-+2", "٣"] {
            match parse(expr, 10) {
                Err(Error::MalformedSelection { .. }) => {}
                other => panic!("expected MalformedSelection for {:?}, got {:?}", expr, other),
            }
        }
    }

    #[test]
    fn test_parse_huge_range_is_clamped() {
        assert_eq!(parse("1-18446744073709551615", 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(parse("2-99999999999999999999999", 3).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_parse_overflowing_number_is_out_of_range() {
        assert_eq!(
            parse("99999999999999999999999", 10).unwrap(),
            Vec::<usize>::new()
        );
        assert_eq!(parse("2,99999999999999999999999", 10).unwrap(), vec![2]);
        assert_eq!(
            parse_anchors("99999999999999999999999-99999999999999999999999", 5).unwrap(),
            Vec::<usize>::new()
        );
    }

    #[test]
    fn test_parse_is_strictly_ascending() {
        let exprs = ["9,2-4,1", "10-1,3", "7,7,7", "1-100"];
        for expr in exprs {
            let values = parse(expr, 50).unwrap();
            assert!(values.windows(2).all(|w| w[0] < w[1]), "{}", expr);
            assert!(values.iter().all(|v| (1..=50).contains(v)), "{}", expr);
        }
    }

    #[test]
    fn test_parse_anchors_accept_front() {
        assert_eq!(parse_anchors("0", 3).unwrap(), vec![0]);
        assert_eq!(parse_anchors("0-1,3,4", 3).unwrap(), vec![0, 1, 3]);
        assert_eq!(parse("0-1", 3).unwrap(), vec![1]);
    }

    #[test]
    fn test_select_items() {
        let files = ["a.pptx", "b.pptx", "c.pptx"];
        let picked = select(&files, "3,1").unwrap();
        assert_eq!(picked, vec![&"a.pptx", &"c.pptx"]);
    }
}

//! Bounded edit distance with transpositions.
//!
//! Both inputs are filtered before comparison: characters outside printable
//! ASCII become a single space and letters are upper-cased. The distance is
//! the unrestricted Damerau-Levenshtein distance between the filtered
//! strings, computed over thread-local scratch buffers (see [`crate::pool`]).

use crate::pool::{self, EditScratch};

/// Returned when either input is empty: no comparison is possible.
pub const UNDEFINED: usize = usize::MAX;

const FIRST_PRINTABLE: u8 = 0x20;
const LAST_PRINTABLE: u8 = 0x7E;

/// Measure the edit distance between `actual` and `comp`.
///
/// # Example
///
/// ```
/// use multigrep::distance::{measure, UNDEFINED};
///
/// assert_eq!(measure("Hello", "hello"), 0);
/// assert_eq!(measure("ab", "ba"), 1);
/// assert_eq!(measure("", "x"), UNDEFINED);
/// ```
pub fn measure(actual: &str, comp: &str) -> usize {
    if actual.is_empty() || comp.is_empty() {
        return UNDEFINED;
    }
    pool::with_edit_scratch(|scratch| measure_with(scratch, actual, comp))
}

fn filter_into(buffer: &mut Vec<u8>, text: &str) {
    buffer.clear();
    buffer.extend(text.chars().map(|c| match u8::try_from(c) {
        Ok(b) if (FIRST_PRINTABLE..=LAST_PRINTABLE).contains(&b) => b.to_ascii_uppercase(),
        _ => b' ',
    }));
}

fn measure_with(scratch: &mut EditScratch, actual: &str, comp: &str) -> usize {
    let mut left = std::mem::take(&mut scratch.left);
    let mut right = std::mem::take(&mut scratch.right);
    filter_into(&mut left, actual);
    filter_into(&mut right, comp);

    let rows = left.len();
    let cols = right.len();
    scratch.reset(rows, cols);

    for i in 1..=rows {
        // Most recent column in this row whose character matched left[i - 1].
        let mut match_col = 0;
        for j in 1..=cols {
            let match_row = scratch.last_row[usize::from(right[j - 1] - FIRST_PRINTABLE)];
            let prev_match_col = match_col;
            let cost = if left[i - 1] == right[j - 1] {
                match_col = j;
                0
            } else {
                1
            };

            let substitution = scratch.get(i - 1, j - 1) + cost;
            let insertion = scratch.get(i, j - 1) + 1;
            let deletion = scratch.get(i - 1, j) + 1;
            let transposition = scratch.get(
                match_row.saturating_sub(1),
                prev_match_col.saturating_sub(1),
            ) + (i - match_row - 1)
                + 1
                + (j - prev_match_col - 1);

            scratch.set(
                i,
                j,
                substitution.min(insertion).min(deletion).min(transposition),
            );
        }
        scratch.last_row[usize::from(left[i - 1] - FIRST_PRINTABLE)] = i;
    }

    let result = scratch.get(rows, cols);
    scratch.left = left;
    scratch.right = right;
    result
}

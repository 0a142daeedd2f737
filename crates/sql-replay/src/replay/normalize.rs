//! Canonical text form of statement output.
//!
//! Rules:
//! - Columns of a row are joined with a tab, in result order
//! - NULL and empty values are rendered as the literal `NULL`
//! - Every emitted row ends with a newline; no rows yields the empty string
//! - Raw bytes are decoded as UTF-8 lossily, only textual equality matters

use crate::target::ResultSet;

/// Literal used for NULL and empty column values.
pub const NULL_TEXT: &str = "NULL";

/// Normalize a single result set.
pub fn normalize_result_set(result: &ResultSet) -> String {
    let mut out = String::new();
    for row in &result.rows {
        for (index, value) in row.iter().enumerate() {
            if index > 0 {
                out.push('\t');
            }
            match value {
                Some(bytes) if !bytes.is_empty() => out.push_str(&String::from_utf8_lossy(bytes)),
                _ => out.push_str(NULL_TEXT),
            }
        }
        out.push('\n');
    }
    out
}

/// Normalize every result set of one statement, concatenated in order.
pub fn normalize_all(results: &[ResultSet]) -> String {
    results.iter().map(normalize_result_set).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_with_null() {
        let rs = ResultSet::from_text(&["x", "y"], &[vec![Some("a"), Some("b")], vec![None, Some("c")]]);
        assert_eq!(normalize_result_set(&rs), "a\tb\nNULL\tc\n");
    }

    #[test]
    fn test_empty_string_is_null() {
        let rs = ResultSet::from_text(&["x"], &[vec![Some("")]]);
        assert_eq!(normalize_result_set(&rs), "NULL\n");
    }

    #[test]
    fn test_empty_result_set() {
        assert_eq!(normalize_result_set(&ResultSet::default()), "");
        assert_eq!(normalize_all(&[]), "");
    }

    #[test]
    fn test_multibyte_values() {
        let rs = ResultSet::from_text(&["e", "d"], &[vec![None, Some("ううう")], vec![Some("emp1"), Some("あああ")]]);
        assert_eq!(normalize_result_set(&rs), "NULL\tううう\nemp1\tあああ\n");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let rs = ResultSet {
            columns: vec!["b".into()],
            rows: vec![vec![Some(vec![0x61, 0xff])]],
        };
        assert_eq!(normalize_result_set(&rs), "a\u{fffd}\n");
    }

    #[test]
    fn test_concatenates_sets() {
        let first = ResultSet::from_text(&["1"], &[vec![Some("1")]]);
        let second = ResultSet::from_text(&["2"], &[vec![Some("2")]]);
        assert_eq!(normalize_all(&[first, ResultSet::default(), second]), "1\n2\n");
    }
}

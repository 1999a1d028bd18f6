//! Tokenizer for line-oriented text records.
//!
//! Each line is split on the configured delimiter into numeric tokens; a
//! field that does not parse becomes the format's `NO_VALUE` sentinel, which
//! the decode loop later maps to the owning column's fill value.

use crate::config::TextDelimiter;

/// The "no value" sentinel of the text format.
pub const NO_VALUE: f64 = -9999.0;

/// Split one text line into numeric tokens.
///
/// Comma and tab delimiters treat consecutive separators as empty fields
/// (which become `NO_VALUE`); the whitespace delimiter collapses runs of
/// spaces and tabs. A blank line yields no tokens.
pub fn tokenize(line: &str, delimiter: TextDelimiter) -> Vec<f64> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Vec::new();
    }
    match delimiter {
        TextDelimiter::Comma => line.split(',').map(parse_token).collect(),
        TextDelimiter::Tab => line.split('\t').map(parse_token).collect(),
        TextDelimiter::Whitespace => line.split_whitespace().map(parse_token).collect(),
    }
}

fn parse_token(field: &str) -> f64 {
    field.trim().parse::<f64>().unwrap_or(NO_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_separated_tokens() {
        let tokens = tokenize("101,13,45,-7.5\n", TextDelimiter::Comma);
        assert_eq!(tokens, vec![101.0, 13.0, 45.0, -7.5]);
    }

    #[test]
    fn unparseable_field_becomes_no_value() {
        let tokens = tokenize("101,abc,45", TextDelimiter::Comma);
        assert_eq!(tokens, vec![101.0, NO_VALUE, 45.0]);
    }

    #[test]
    fn empty_field_becomes_no_value() {
        let tokens = tokenize("101,,45", TextDelimiter::Comma);
        assert_eq!(tokens[1], NO_VALUE);
    }

    #[test]
    fn whitespace_runs_collapse() {
        let tokens = tokenize("101   13\t 45 ", TextDelimiter::Whitespace);
        assert_eq!(tokens, vec![101.0, 13.0, 45.0]);
    }

    #[test]
    fn blank_line_has_no_tokens() {
        assert!(tokenize("   \r\n", TextDelimiter::Whitespace).is_empty());
        assert!(tokenize("", TextDelimiter::Comma).is_empty());
    }
}

//! Tolerant parsing of the loosely quoted JSON segments.
//!
//! Producers emit objects like `{'host':'n1'}`. The only repair applied is
//! rewriting every single quote to a double quote before a strict parse;
//! [`sanitize_quotes`] is the one place that repair lives.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::errors::{DecodeError, Segment};

/// Rewrite single quotes to double quotes.
pub fn sanitize_quotes(segment: &str) -> Cow<'_, str> {
    if segment.contains('\'') {
        Cow::Owned(segment.replace('\'', "\""))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Sanitize, then strictly parse a segment into a JSON object.
pub fn parse_segment(raw: &str, segment: Segment) -> Result<Map<String, Value>, DecodeError> {
    let cleaned = sanitize_quotes(raw.trim());
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DecodeError::NotAnObject { segment }),
        Err(source) => Err(DecodeError::Json { segment, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn double_quoted_input_is_borrowed() {
        assert_matches!(sanitize_quotes(r#"{"a":1}"#), Cow::Borrowed(_));
    }

    #[test]
    fn single_quotes_are_rewritten() {
        assert_eq!(sanitize_quotes("{'a':'b'}"), r#"{"a":"b"}"#);
    }

    #[test]
    fn parses_loose_object() {
        let map = parse_segment("  {'host':'n1','port':8080} ", Segment::Connection).unwrap();
        assert_eq!(map["host"], "n1");
        assert_eq!(map["port"], 8080);
    }

    #[test]
    fn rejects_invalid_json() {
        assert_matches!(
            parse_segment("{'host':}", Segment::Connection),
            Err(DecodeError::Json { segment: Segment::Connection, .. })
        );
    }

    #[test]
    fn rejects_non_objects() {
        assert_matches!(
            parse_segment("['a','b']", Segment::Accounting),
            Err(DecodeError::NotAnObject { segment: Segment::Accounting })
        );
    }
}

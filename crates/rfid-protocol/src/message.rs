//! Outbound message grammar
//!
//! The microcontroller receives plain ASCII with no terminator:
//!
//! ```text
//! message := "" | "[" item ("," item)* "]"
//! item    := '"' identifier '"'
//! ```
//!
//! An empty tag set encodes to the empty string, not `[]`.

use crate::error::ParseError;
use crate::tag::TagSet;

/// Encode a tag set as a bracketed list of quoted identifiers
pub fn encode_tags(tags: &TagSet) -> String {
    encode_ids(tags.iter().map(String::as_str))
}

/// Encode identifiers in the order given
pub fn encode_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for id in ids {
        out.push(if out.is_empty() { '[' } else { ',' });
        push_item(&mut out, id);
    }
    if !out.is_empty() {
        out.push(']');
    }
    out
}

/// Append one quoted identifier
pub fn push_item(out: &mut String, id: &str) {
    out.push('"');
    out.push_str(id);
    out.push('"');
}

/// Parse a message back into its identifiers
///
/// Both the empty string and `[]` yield no identifiers.
pub fn parse_message(text: &str) -> Result<Vec<String>, ParseError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let inner = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or(ParseError::MissingBrackets)?;

    if inner.is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .enumerate()
        .map(|(index, item)| {
            let id = item
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
                .filter(|id| !id.contains('"'))
                .ok_or_else(|| ParseError::UnquotedItem {
                    index,
                    item: item.to_string(),
                })?;
            if id.is_empty() {
                return Err(ParseError::EmptyIdentifier(index));
            }
            Ok(id.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_set_encodes_to_empty_string() {
        assert_eq!(encode_tags(&TagSet::new()), "");
    }

    #[test]
    fn test_single_tag() {
        let tags: TagSet = ["X"].into_iter().collect();
        assert_eq!(encode_tags(&tags), r#"["X"]"#);
    }

    #[test]
    fn test_two_tags_any_order() {
        let tags: TagSet = ["A", "B"].into_iter().collect();
        let encoded = encode_tags(&tags);
        assert!(encoded == r#"["A","B"]"# || encoded == r#"["B","A"]"#, "{}", encoded);
    }

    #[test]
    fn test_encode_ids_keeps_order() {
        assert_eq!(encode_ids(["E2", "E1"]), r#"["E2","E1"]"#);
    }

    #[test]
    fn test_parse_accepts_both_empty_forms() {
        assert_eq!(parse_message(""), Ok(vec![]));
        assert_eq!(parse_message("[]"), Ok(vec![]));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_message(r#""A""#), Err(ParseError::MissingBrackets));
        assert_eq!(
            parse_message(r#"["A",B]"#),
            Err(ParseError::UnquotedItem {
                index: 1,
                item: "B".to_string()
            })
        );
        assert_eq!(parse_message(r#"["A",""]"#), Err(ParseError::EmptyIdentifier(1)));
    }

    proptest! {
        #[test]
        fn encoded_sets_follow_grammar(
            ids in prop::collection::hash_set("[0-9A-F]{8,24}", 0..32)
        ) {
            let tags: TagSet = ids.iter().map(String::as_str).collect();
            let encoded = encode_tags(&tags);

            prop_assert!(encoded.is_ascii());
            if ids.is_empty() {
                prop_assert_eq!(encoded.as_str(), "");
            } else {
                prop_assert!(encoded.starts_with("[\"") && encoded.ends_with("\"]"));
            }

            let mut parsed = parse_message(&encoded).unwrap();
            let mut expected: Vec<String> = ids.into_iter().collect();
            parsed.sort();
            expected.sort();
            prop_assert_eq!(parsed, expected);
        }
    }
}

//! The `<tag>value</tag>` grammar.
//!
//! A frame is not an XML document: tags are located by plain substring
//! search, may appear in any order, and anything between elements is
//! ignored. The first `<tag>` is paired with the first `</tag>` after it.

use std::fmt::Display;

/// Returns the text between the first `<tag>` and the following `</tag>`.
///
/// `None` means the element is absent or unterminated. An empty element
/// yields `Some("")`.
pub fn extract<'a>(message: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let start = message.find(&open)? + open.len();
    let len = message[start..].find(&close)?;
    Some(&message[start..start + len])
}

/// Wraps `value` as `<tag>value</tag>`.
pub fn wrap(tag: impl Display, value: impl Display) -> String {
    format!("<{tag}>{value}</{tag}>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_simple() {
        assert_eq!(extract("<orientation>1</orientation>", "orientation"), Some("1"));
    }

    #[test]
    fn extract_absent() {
        assert_eq!(extract("<orientation>1</orientation>", "pan"), None);
    }

    #[test]
    fn extract_unterminated() {
        assert_eq!(extract("<pan>12", "pan"), None);
    }

    #[test]
    fn extract_empty_value_is_not_absent() {
        assert_eq!(extract("<getStatus></getStatus>", "getStatus"), Some(""));
    }

    #[test]
    fn extract_ignores_prefix_tags() {
        // `<live>` must not match inside `<endlive>`.
        assert_eq!(extract("<endlive>1</endlive>", "live"), None);
    }

    #[test]
    fn extract_from_concatenated_frames() {
        let msg = "<pan_tilt>3,4</pan_tilt><isScoreOnly>1</isScoreOnly>";
        assert_eq!(extract(msg, "pan_tilt"), Some("3,4"));
        assert_eq!(extract(msg, "isScoreOnly"), Some("1"));
    }

    #[test]
    fn extract_value_that_looks_like_old_sentinel() {
        assert_eq!(extract("<get>NoData</get>", "get"), Some("NoData"));
    }

    #[test]
    fn wrap_formats_element() {
        assert_eq!(wrap("kill", 1), "<kill>1</kill>");
    }

    #[test]
    fn malformed_empty_file_list_does_not_parse() {
        assert_eq!(extract("<file_list>0/file_list>", "file_list"), None);
    }
}

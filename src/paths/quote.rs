//! Quoted segment form used by textual paths.
//!
//! A segment that is not a plain identifier is written as `<<text>>`, with `\t \n \r \\ ' " >`
//! escaped inside the delimiters. [`unquote`] is the exact left inverse of [`quote`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::PathflowError;

pub const QUOTE_OPEN: &str = "<<";
pub const QUOTE_CLOSE: &str = ">>";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}_]*$").expect("identifier regex is valid"));

/// True when `text` can be written as a bare segment.
pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text)
}

pub fn needs_quoting(text: &str) -> bool {
    !is_identifier(text)
}

/// Escape reserved characters without adding the delimiters.
pub fn escape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\t' => output.push_str("\\t"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\\' => output.push_str("\\\\"),
            '\'' => output.push_str("\\'"),
            '"' => output.push_str("\\\""),
            '>' => output.push_str("\\>"),
            _ => output.push(c),
        }
    }
    output
}

/// Reverse [`escape`]. Fails on a dangling backslash or an unknown escape.
pub fn unescape(input: &str) -> Result<String, PathflowError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => output.push('\t'),
            Some('n') => output.push('\n'),
            Some('r') => output.push('\r'),
            Some(esc @ ('\\' | '\'' | '"' | '>')) => output.push(esc),
            Some(other) => {
                return Err(PathflowError::Parse(format!(
                    "unknown escape sequence '\\{other}' in '{input}'"
                )))
            }
            None => {
                return Err(PathflowError::Parse(format!(
                    "dangling escape at end of '{input}'"
                )))
            }
        }
    }
    Ok(output)
}

/// Wrap `input` in the quoted segment form.
pub fn quote(input: &str) -> String {
    format!("{QUOTE_OPEN}{}{QUOTE_CLOSE}", escape(input))
}

/// Quote only when the text is not a bare identifier.
pub fn quote_if_needed(input: &str) -> String {
    if needs_quoting(input) {
        quote(input)
    } else {
        input.to_string()
    }
}

/// Parse a quoted segment at the start of `input`.
///
/// Returns the unescaped text and the number of bytes consumed, delimiters included.
pub fn take_quoted(input: &str) -> Result<(String, usize), PathflowError> {
    if !input.starts_with(QUOTE_OPEN) {
        return Err(PathflowError::Parse(format!(
            "expected '{QUOTE_OPEN}' at '{input}'"
        )));
    }
    let body_start = QUOTE_OPEN.len();
    let bytes = input.as_bytes();
    let mut idx = body_start;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b'>' => {
                if bytes.get(idx + 1) == Some(&b'>') {
                    let text = unescape(&input[body_start..idx])?;
                    return Ok((text, idx + QUOTE_CLOSE.len()));
                }
                return Err(PathflowError::Parse(format!(
                    "unescaped '>' inside quoted segment '{input}'"
                )));
            }
            _ => idx += 1,
        }
    }
    Err(PathflowError::Parse(format!(
        "unterminated quoted segment '{input}'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_escape_reserved_characters() {
        assert_eq!(escape("a\tb"), "a\\tb");
        assert_eq!(escape("line\nnext\r"), "line\\nnext\\r");
        assert_eq!(escape(r#"say "hi" it's"#), r#"say \"hi\" it\'s"#);
        assert_eq!(escape("a>b"), "a\\>b");
        assert_eq!(escape("back\\slash"), "back\\\\slash");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_unescape_inverts_escape() {
        for sample in [
            "",
            "plain",
            "tab\there",
            "new\nline\r\n",
            r#"quotes ' and ""#,
            "arrows >> and <<",
            "back\\slash\\",
            "Ünïcode label",
        ] {
            assert_eq!(unescape(&escape(sample)).unwrap(), sample);
        }
    }

    #[test]
    fn test_unescape_rejects_unknown_sequences() {
        assert!(matches!(unescape("\\q"), Err(PathflowError::Parse(_))));
        assert!(matches!(unescape("end\\"), Err(PathflowError::Parse(_))));
    }

    #[test]
    fn test_take_quoted_consumes_delimiters() {
        let (text, used) = take_quoted("<<My Box>>.Length").unwrap();
        assert_eq!(text, "My Box");
        assert_eq!(used, "<<My Box>>".len());

        let quoted = quote("odd > name");
        let (text, used) = take_quoted(&quoted).unwrap();
        assert_eq!(text, "odd > name");
        assert_eq!(used, quoted.len());
    }

    #[test]
    fn test_take_quoted_errors() {
        assert!(take_quoted("plain").is_err());
        assert!(take_quoted("<<never closed").is_err());
        assert!(take_quoted("<<bad > close>>").is_err());
    }

    #[test]
    fn test_identifier_detection() {
        assert!(is_identifier("Length"));
        assert!(is_identifier("_private2"));
        assert!(is_identifier("Länge"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("has space"));
        assert!(!is_identifier("dot.ted"));
        assert!(!is_identifier(""));
        assert_eq!(quote_if_needed("Box"), "Box");
        assert_eq!(quote_if_needed("Box 1"), "<<Box 1>>");
    }
}

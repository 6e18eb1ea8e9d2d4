//! Textual path reader.
//!
//! [`parse_path_prefix`] reads a path at the start of a longer input so the formula parser can
//! embed references; [`parse_path`] requires the whole input to be one path.

use super::{
    component::{Component, ComponentKind},
    identifier::{Name, PathIdentifier},
    quote::{take_quoted, QUOTE_OPEN},
};
use crate::PathflowError;

struct Segment {
    text: String,
    quoted: bool,
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, what: &str) -> PathflowError {
        PathflowError::Parse(format!(
            "{what} at offset {} in path '{}'",
            self.pos, self.input
        ))
    }

    fn segment(&mut self) -> Result<Segment, PathflowError> {
        if self.rest().starts_with(QUOTE_OPEN) {
            let (text, used) = take_quoted(self.rest())?;
            self.pos += used;
            return Ok(Segment { text, quoted: true });
        }
        let rest = self.rest();
        let mut end = 0;
        for (idx, c) in rest.char_indices() {
            let accepted = if idx == 0 {
                c.is_alphabetic() || c == '_'
            } else {
                c.is_alphanumeric() || c == '_'
            };
            if !accepted {
                break;
            }
            end = idx + c.len_utf8();
        }
        if end == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += end;
        Ok(Segment {
            text: rest[..end].to_string(),
            quoted: false,
        })
    }

    fn accessor(&mut self) -> Result<ComponentKind, PathflowError> {
        if !self.eat('[') {
            return Ok(ComponentKind::Simple);
        }
        let kind = if self.rest().starts_with(QUOTE_OPEN) {
            let (key, used) = take_quoted(self.rest())?;
            self.pos += used;
            ComponentKind::Map(key)
        } else {
            let digits = self
                .rest()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .count();
            if digits == 0 {
                return Err(self.error("expected an index or quoted key"));
            }
            let index = self.rest()[..digits]
                .parse::<usize>()
                .map_err(|e| self.error(&format!("invalid index ({e})")))?;
            self.pos += digits;
            ComponentKind::Array(index)
        };
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(kind)
    }

    fn component(&mut self) -> Result<Component, PathflowError> {
        let segment = self.segment()?;
        let kind = self.accessor()?;
        Ok(Component {
            name: segment.text,
            kind,
        })
    }

    fn trailing_components(&mut self, components: &mut Vec<Component>) -> Result<(), PathflowError> {
        while self.eat('.') {
            components.push(self.component()?);
        }
        Ok(())
    }
}

/// Read one path from the start of `input`, returning it with the number of bytes consumed.
pub fn parse_path_prefix(input: &str) -> Result<(PathIdentifier, usize), PathflowError> {
    let mut cursor = Cursor { input, pos: 0 };
    let first = cursor.segment()?;

    if cursor.eat('#') {
        let container = Name {
            text: first.text,
            quoted: first.quoted,
        };
        let holder = cursor.segment()?;
        if !cursor.eat('.') {
            return Err(cursor.error("expected '.' after holder name"));
        }
        let mut components = vec![cursor.component()?];
        cursor.trailing_components(&mut components)?;
        let holder = Name {
            text: holder.text,
            quoted: holder.quoted,
        };
        let path = PathIdentifier::from_parts(Some(container), Some(holder), components);
        return Ok((path, cursor.pos));
    }

    let kind = cursor.accessor()?;
    let mut components = Vec::new();
    let mut holder = None;
    if first.quoted && kind == ComponentKind::Simple && cursor.peek() == Some('.') {
        holder = Some(Name::quoted(first.text));
    } else {
        components.push(Component {
            name: first.text,
            kind,
        });
    }
    cursor.trailing_components(&mut components)?;
    if components.is_empty() {
        return Err(cursor.error("expected an attribute name"));
    }
    Ok((
        PathIdentifier::from_parts(None, holder, components),
        cursor.pos,
    ))
}

/// Parse a complete textual path.
pub fn parse_path(input: &str) -> Result<PathIdentifier, PathflowError> {
    let (path, used) = parse_path_prefix(input)?;
    if used != input.len() {
        return Err(PathflowError::Parse(format!(
            "unexpected trailing text '{}' in path '{input}'",
            &input[used..]
        )));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_parse_simple_forms() {
        let path = parse_path("Length").unwrap();
        assert_eq!(path.components(), &[Component::simple("Length")]);
        assert!(path.holder().is_none());
        assert!(path.container().is_none());

        let path = parse_path("Box.Length").unwrap();
        assert!(path.holder().is_none());
        assert_eq!(
            path.components(),
            &[Component::simple("Box"), Component::simple("Length")]
        );
    }

    #[test]
    fn test_parse_pinned_names() {
        let path = parse_path("<<My Box>>.Length").unwrap();
        assert_eq!(path.holder().map(Name::as_str), Some("My Box"));
        assert_eq!(path.components(), &[Component::simple("Length")]);

        let path = parse_path("Doc#Box.Placement.x").unwrap();
        assert_eq!(path.container().map(Name::as_str), Some("Doc"));
        assert_eq!(path.holder().map(Name::as_str), Some("Box"));
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_parse_accessors() {
        let path = parse_path("Points[12].x").unwrap();
        assert_eq!(
            path.components(),
            &[Component::array("Points", 12), Component::simple("x")]
        );
        let path = parse_path("Table[<<a key>>]").unwrap();
        assert_eq!(path.components(), &[Component::map("Table", "a key")]);

        // A quoted single segment with an accessor is an attribute, not a holder.
        let path = parse_path("<<odd name>>[1].x").unwrap();
        assert!(path.holder().is_none());
        assert_eq!(path.components()[0], Component::array("odd name", 1));
    }

    #[test]
    fn test_parse_prefix_stops_at_operator() {
        let (path, used) = parse_path_prefix("A.x + 1").unwrap();
        assert_eq!(used, 3);
        assert_eq!(path.to_string(), "A.x");
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "", "1abc", "Box.", "Doc#Box", "Doc#", "Points[", "Points[x]", "Points[1", "a b",
        ] {
            assert!(
                matches!(parse_path(bad), Err(PathflowError::Parse(_))),
                "'{bad}' should not parse"
            );
        }
        // A quoted lone segment is a valid attribute.
        let path = parse_path("<<Box>>").unwrap();
        assert!(path.holder().is_none());
        assert_eq!(path.components(), &[Component::simple("Box")]);
    }
}

//! block content parser
//!
//! Stored form content is markup with blocks serialized as html comments:
//!
//! ```text
//! <!-- wp:llms/form-field-user-email {"required":true} /-->
//! <!-- wp:group {"llms_visibility":"logged_out"} -->
//! <div class="wp-block-group">
//!   <!-- wp:llms/form-field-text {"id":"first_name"} /-->
//! </div>
//! <!-- /wp:group -->
//! ```
//!
//! - a block name without namespace belongs to `core/`
//! - attributes are an optional JSON object, key order is kept
//! - a block whose inner content holds no blocks becomes a content leaf carrying that content
//! - otherwise it becomes a container and non-blank markup between its inner blocks is kept as anonymous leaves
//! - comments that do not look like block delimiters are plain markup
use crate::block::{Attributes, BlockNode};

/// Deepest allowed block nesting, deeper content is malformed
pub const MAX_NESTING: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("block `{name}` opened at byte {offset} is never closed")]
    Unclosed { name: String, offset: usize },
    #[error("unexpected closer for block `{name}` at byte {offset}")]
    UnexpectedCloser { name: String, offset: usize },
    #[error("invalid attributes for block `{name}` at byte {offset}")]
    InvalidAttributes {
        name: String,
        offset: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("block opened at byte {offset} is nested deeper than {} blocks", MAX_NESTING)]
    TooDeep { offset: usize },
}

/// Parse block content, malformed content yields an empty list
pub fn parse(content: &str) -> Vec<BlockNode> {
    match try_parse(content) {
        Ok(nodes) => nodes,
        Err(error) => {
            tracing::warn!(%error, "malformed block content, using empty block list");
            vec![]
        }
    }
}

pub fn try_parse(content: &str) -> Result<Vec<BlockNode>, ParseError> {
    let mut parser = Parser {
        input: content,
        pos: 0,
    };

    let pieces = parser.sequence(None, 0)?;
    Ok(pieces.into_iter().filter_map(Piece::into_node).collect())
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

enum Piece {
    Text(String),
    Block(BlockNode),
}

impl Piece {
    fn into_node(self) -> Option<BlockNode> {
        match self {
            Piece::Text(text) if text.trim().is_empty() => None,
            Piece::Text(text) => Some(BlockNode::freeform(text)),
            Piece::Block(node) => Some(node),
        }
    }
}

impl<'a> Parser<'a> {
    /// Parse pieces until the closer of `open` (or the end of input at the top level)
    ///
    /// `depth` counts the blocks currently open.
    fn sequence(&mut self, open: Option<(&str, usize)>, depth: usize) -> Result<Vec<Piece>, ParseError> {
        let mut pieces = vec![];

        loop {
            let Some(delimiter) = next_delimiter(self.input, self.pos)? else {
                push_text(&mut pieces, &self.input[self.pos..]);
                self.pos = self.input.len();

                return match open {
                    None => Ok(pieces),
                    Some((name, offset)) => Err(ParseError::Unclosed {
                        name: name.to_string(),
                        offset,
                    }),
                };
            };

            push_text(&mut pieces, &self.input[self.pos..delimiter.start]);
            self.pos = delimiter.end;

            match delimiter.kind {
                DelimiterKind::Void => {
                    pieces.push(Piece::Block(BlockNode::empty(
                        delimiter.name,
                        delimiter.attributes,
                    )));
                }
                DelimiterKind::Opener => {
                    if depth >= MAX_NESTING {
                        return Err(ParseError::TooDeep {
                            offset: delimiter.start,
                        });
                    }
                    let inner = self.sequence(Some((delimiter.name.as_str(), delimiter.start)), depth + 1)?;
                    pieces.push(Piece::Block(block_from_inner(
                        delimiter.name,
                        delimiter.attributes,
                        inner,
                    )));
                }
                DelimiterKind::Closer => {
                    return match open {
                        Some((name, _)) if name == delimiter.name => Ok(pieces),
                        _ => Err(ParseError::UnexpectedCloser {
                            name: delimiter.name,
                            offset: delimiter.start,
                        }),
                    };
                }
            }
        }
    }
}

fn push_text(pieces: &mut Vec<Piece>, text: &str) {
    if !text.is_empty() {
        pieces.push(Piece::Text(text.to_string()));
    }
}

fn block_from_inner(name: String, attributes: Attributes, inner: Vec<Piece>) -> BlockNode {
    if inner.iter().all(|piece| matches!(piece, Piece::Text(_))) {
        let raw: String = inner
            .into_iter()
            .filter_map(|piece| match piece {
                Piece::Text(text) => Some(text),
                Piece::Block(_) => None,
            })
            .collect();

        if raw.trim().is_empty() {
            return BlockNode::empty(name, attributes);
        }
        return BlockNode::markup(name, attributes, raw);
    }

    let children = inner.into_iter().filter_map(Piece::into_node).collect();
    BlockNode::container(name, attributes, children)
}

#[derive(Debug, PartialEq)]
enum DelimiterKind {
    Opener,
    Closer,
    Void,
}

#[derive(Debug)]
struct Delimiter {
    kind: DelimiterKind,
    name: String,
    attributes: Attributes,
    /// byte offset of `<!--`
    start: usize,
    /// byte offset after `-->`
    end: usize,
}

fn next_delimiter(input: &str, from: usize) -> Result<Option<Delimiter>, ParseError> {
    let mut search = from;
    while let Some(found) = input[search..].find("<!--") {
        let start = search + found;
        if let Some(delimiter) = delimiter_at(input, start)? {
            return Ok(Some(delimiter));
        }
        search = start + 4;
    }

    Ok(None)
}

/// Try to read a block delimiter at `start`
///
/// Returns `None` when the comment at `start` is not a block delimiter.
fn delimiter_at(input: &str, start: usize) -> Result<Option<Delimiter>, ParseError> {
    let bytes = input.as_bytes();
    let mut pos = start + 4;

    let skip_whitespace = |pos: &mut usize| {
        let begin = *pos;
        while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
            *pos += 1;
        }
        *pos - begin
    };
    let eat = |pos: &mut usize, token: &str| {
        if input[*pos..].starts_with(token) {
            *pos += token.len();
            true
        } else {
            false
        }
    };

    if skip_whitespace(&mut pos) == 0 {
        return Ok(None);
    }

    let closer = eat(&mut pos, "/");
    if !eat(&mut pos, "wp:") {
        return Ok(None);
    }

    let Some(name) = block_name(input, &mut pos) else {
        return Ok(None);
    };

    if skip_whitespace(&mut pos) == 0 {
        return Ok(None);
    }

    let mut attributes = Attributes::new();
    if !closer && bytes.get(pos) == Some(&b'{') {
        let mut stream = serde_json::Deserializer::from_str(&input[pos..]).into_iter::<Attributes>();
        match stream.next() {
            Some(Ok(parsed)) => {
                attributes = parsed;
                pos += stream.byte_offset();
            }
            Some(Err(source)) => {
                return Err(ParseError::InvalidAttributes {
                    name,
                    offset: start,
                    source,
                })
            }
            None => return Ok(None),
        }

        if skip_whitespace(&mut pos) == 0 {
            return Ok(None);
        }
    }

    let void = !closer && eat(&mut pos, "/");
    if !eat(&mut pos, "-->") {
        return Ok(None);
    }

    let kind = match (closer, void) {
        (true, _) => DelimiterKind::Closer,
        (false, true) => DelimiterKind::Void,
        (false, false) => DelimiterKind::Opener,
    };

    Ok(Some(Delimiter {
        kind,
        name,
        attributes,
        start,
        end: pos,
    }))
}

/// `[a-z][a-z0-9_-]*` optionally prefixed by a namespace of the same shape and `/`
fn block_name(input: &str, pos: &mut usize) -> Option<String> {
    fn segment(input: &str, pos: &mut usize) -> Option<String> {
        let bytes = input.as_bytes();
        let begin = *pos;
        if !bytes.get(*pos)?.is_ascii_lowercase() {
            return None;
        }
        *pos += 1;
        while bytes
            .get(*pos)
            .is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'_' || *b == b'-')
        {
            *pos += 1;
        }
        Some(input[begin..*pos].to_string())
    }

    let first = segment(input, pos)?;
    if input[*pos..].starts_with('/') {
        let mut after_slash = *pos + 1;
        if let Some(second) = segment(input, &mut after_slash) {
            *pos = after_slash;
            return Some(format!("{first}/{second}"));
        }
    }

    Some(format!("core/{first}"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::{attributes, Inner};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn void_blocks_and_namespaces() {
        let nodes = parse(
            r#"<!-- wp:llms/form-field-text {"id":"first_name","required":true} /-->
<!-- wp:separator /-->"#,
        );

        assert_eq!(
            nodes,
            vec![
                BlockNode::empty(
                    "llms/form-field-text",
                    attributes(json!({"id": "first_name", "required": true}))
                ),
                BlockNode::empty("core/separator", Attributes::new()),
            ]
        );
    }

    #[test]
    fn container_keeps_wrapper_markup_as_anonymous_children() {
        let nodes = parse(
            r#"<!-- wp:group {"llms_visibility":"logged_out"} --><div class="wp-block-group"><!-- wp:llms/form-field-text /--></div><!-- /wp:group -->"#,
        );

        assert_eq!(nodes.len(), 1);
        let group = &nodes[0];
        assert_eq!(group.kind, "core/group");
        assert_eq!(group.attr_str("llms_visibility"), Some("logged_out"));

        let kinds: Vec<_> = group.children().iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["", "llms/form-field-text", ""]);
        assert_eq!(
            group.children()[0].raw_content(),
            Some(r#"<div class="wp-block-group">"#)
        );
    }

    #[test]
    fn block_without_inner_blocks_is_a_content_leaf() {
        let nodes = parse("<!-- wp:html -->\n<p>terms</p>\n<!-- /wp:html -->");

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, "core/html");
        assert_eq!(nodes[0].inner, Inner::RawContent("\n<p>terms</p>\n".to_string()));
    }

    #[test]
    fn plain_comments_are_markup() {
        let nodes = parse("<p>a</p><!-- just a comment --><!-- wp:spacer /-->");

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].raw_content(), Some("<p>a</p><!-- just a comment -->"));
        assert_eq!(nodes[1].kind, "core/spacer");
    }

    #[test]
    fn attribute_order_is_preserved() {
        let nodes = parse(r#"<!-- wp:llms/form-field-text {"z":1,"a":2,"m":3} /-->"#);
        let keys: Vec<_> = nodes[0].attributes.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn malformed_content_degrades_to_empty_list() {
        for content in [
            "<!-- wp:group --><!-- wp:llms/form-field-text /-->",
            "<!-- /wp:group -->",
            "<!-- wp:group --><!-- /wp:columns -->",
            r#"<!-- wp:llms/form-field-text {"id":} /-->"#,
        ] {
            assert_eq!(parse(content), vec![], "{content}");
        }
    }

    #[test]
    fn typed_errors() {
        let err = try_parse("<!-- wp:group -->").expect_err("must error");
        assert!(matches!(err, ParseError::Unclosed { offset: 0, .. }));

        let err = try_parse("<!-- wp:group --><!-- /wp:columns -->").expect_err("must error");
        assert!(matches!(err, ParseError::UnexpectedCloser { ref name, .. } if name == "core/columns"));
    }

    #[test]
    fn nesting_is_bounded() {
        assert_eq!(parse(&"<!-- wp:group -->".repeat(20_000)), vec![]);

        let nested = |depth: usize| {
            format!(
                "{}<!-- wp:llms/form-field-text /-->{}",
                "<!-- wp:group -->".repeat(depth),
                "<!-- /wp:group -->".repeat(depth)
            )
        };

        let err = try_parse(&nested(MAX_NESTING + 1)).expect_err("must error");
        let offset = MAX_NESTING * "<!-- wp:group -->".len();
        assert!(matches!(err, ParseError::TooDeep { offset: o } if o == offset), "{err}");

        let mut nodes = parse(&nested(MAX_NESTING));
        let mut depth = 0;
        while let Some(node) = nodes.pop() {
            depth += 1;
            nodes = node.children().to_vec();
        }
        assert_eq!(depth, MAX_NESTING + 1);
    }

    #[test]
    fn parsing_is_deterministic() {
        let content = r#"<!-- wp:columns --><!-- wp:column --><!-- wp:llms/form-field-user-email /--><!-- /wp:column --><!-- /wp:columns -->"#;
        assert_eq!(parse(content), parse(content));
    }
}

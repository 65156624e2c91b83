//! Markup parsing: bytes in, tree out
//!
//! A small recursive-descent reader for the subset of XML/HTML this crate
//! works with: elements, attributes, text, comments, CDATA, processing
//! instructions and doctypes. Dialect differences handled here:
//! - HTML: tag names are lowercased, void elements never open a scope,
//!   `<script>`/`<style>` bodies are read raw, unclosed and stray end
//!   tags are auto-recovered.
//! - XML: end tags must match, every element must be closed by EOF.
//!
//! A failed parse returns an error and no tree; nothing partial escapes.

use crate::document::Document;
use crate::error::{DomError, Result};
use crate::serializer::{is_rawtext, is_void};
use crate::types::{Dialect, ElementData, NodeData, NodeId};
use tracing::debug;

/// Parse a whole document from bytes.
pub(crate) fn parse(input: &[u8], dialect: Dialect) -> Result<Document> {
    let text = std::str::from_utf8(input).map_err(|e| DomError::Parse {
        offset: e.valid_up_to(),
        message: "input is not valid UTF-8".into(),
    })?;
    let doc = Parser::new(text, dialect).run()?;
    debug!(nodes = doc.node_count(), ?dialect, "parsed document");
    Ok(doc)
}

/// Parse a markup fragment. Same grammar as a document; the fragment's
/// nodes hang off the synthetic document root.
pub(crate) fn parse_fragment(input: &str, dialect: Dialect) -> Result<Document> {
    Parser::new(input, dialect).run()
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    dialect: Dialect,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, dialect: Dialect) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            dialect,
        }
    }

    fn err(&self, message: impl Into<String>) -> DomError {
        DomError::Parse {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn run(mut self) -> Result<Document> {
        let mut doc = Document::new(self.dialect);
        let root = match doc.root() {
            Some(r) => r,
            None => return Err(self.err("document has no root")),
        };
        // Open-element stack; the synthetic root is always at the bottom.
        let mut stack: Vec<(NodeId, String)> = vec![(root, String::new())];

        while self.pos < self.bytes.len() {
            if self.peek() == Some(b'<') {
                self.dispatch_markup(&mut doc, &mut stack)?;
            } else {
                let start = self.pos;
                while self.pos < self.bytes.len() && self.peek() != Some(b'<') {
                    self.pos += 1;
                }
                let raw = &self.input[start..self.pos];
                let text = decode_entities(raw);
                let parent = stack[stack.len() - 1].0;
                let node = doc.arena.allocate(NodeData::Text(text));
                self.append(&mut doc, node, parent)?;
            }
        }

        if stack.len() > 1 && !self.dialect.is_html() {
            let (_, tag) = &stack[stack.len() - 1];
            return Err(self.err(format!("unclosed element <{}>", tag)));
        }
        Ok(doc)
    }

    fn dispatch_markup(
        &mut self,
        doc: &mut Document,
        stack: &mut Vec<(NodeId, String)>,
    ) -> Result<()> {
        let parent = stack[stack.len() - 1].0;
        if self.starts_with("<!--") {
            let body = self.take_delimited("<!--", "-->")?;
            let node = doc.arena.allocate(NodeData::Comment(body));
            self.append(doc, node, parent)
        } else if self.starts_with("<![CDATA[") {
            let body = self.take_delimited("<![CDATA[", "]]>")?;
            let node = doc.arena.allocate(NodeData::CData(body));
            self.append(doc, node, parent)
        } else if self.starts_with("<!") {
            self.read_declaration(doc, parent)
        } else if self.starts_with("<?") {
            self.read_processing_instruction(doc, parent)
        } else if self.starts_with("</") {
            self.read_end_tag(stack)
        } else {
            self.read_start_tag(doc, stack)
        }
    }

    fn read_declaration(&mut self, doc: &mut Document, parent: NodeId) -> Result<()> {
        let body = self.take_delimited("<!", ">")?;
        let mut words = body.split_whitespace();
        if let Some(keyword) = words.next() {
            if keyword.eq_ignore_ascii_case("doctype") {
                let name = words.next().unwrap_or("").to_string();
                let node = doc.arena.allocate(NodeData::DocType { name });
                return self.append(doc, node, parent);
            }
        }
        // Other declarations (ENTITY etc.) are skipped.
        Ok(())
    }

    fn read_processing_instruction(&mut self, doc: &mut Document, parent: NodeId) -> Result<()> {
        let body = self.take_delimited("<?", "?>")?;
        let (target, data) = match body.find(char::is_whitespace) {
            Some(split) => (
                body[..split].to_string(),
                body[split..].trim_start().to_string(),
            ),
            None => (body, String::new()),
        };
        let node = doc
            .arena
            .allocate(NodeData::ProcessingInstruction { target, data });
        self.append(doc, node, parent)
    }

    fn read_end_tag(&mut self, stack: &mut Vec<(NodeId, String)>) -> Result<()> {
        self.pos += 2; // "</"
        let name = self.read_name()?;
        let name = self.fold_case(&name);
        self.skip_whitespace();
        if self.peek() != Some(b'>') {
            return Err(self.err(format!("malformed end tag </{}>", name)));
        }
        self.pos += 1;

        if self.dialect.is_html() {
            // Auto-close intervening elements; ignore a stray end tag.
            if let Some(found) = stack.iter().rposition(|(_, tag)| *tag == name) {
                if found > 0 {
                    stack.truncate(found);
                }
            }
            Ok(())
        } else {
            match stack.last() {
                Some((_, open)) if *open == name && stack.len() > 1 => {
                    stack.pop();
                    Ok(())
                }
                Some((_, open)) if stack.len() > 1 => Err(self.err(format!(
                    "end tag </{}> does not match open element <{}>",
                    name, open
                ))),
                _ => Err(self.err(format!("end tag </{}> with no open element", name))),
            }
        }
    }

    fn read_start_tag(
        &mut self,
        doc: &mut Document,
        stack: &mut Vec<(NodeId, String)>,
    ) -> Result<()> {
        let parent = stack[stack.len() - 1].0;
        self.pos += 1; // "<"
        let raw_name = self.read_name()?;
        let name = self.fold_case(&raw_name);

        let mut element = match name.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => {
                let mut el = ElementData::new(local);
                el.ns_prefix = Some(prefix.to_string());
                el
            }
            _ => ElementData::new(name.clone()),
        };

        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') if self.starts_with("/>") => {
                    self.pos += 2;
                    self_closing = true;
                    break;
                }
                Some(_) => {
                    let (attr_name, attr_value) = self.read_attribute()?;
                    element.set_attr(&attr_name, attr_value);
                }
                None => return Err(self.err(format!("unexpected end of input in <{}>", name))),
            }
        }

        let tag = element.tag.clone();
        let node = doc.arena.allocate(NodeData::Element(element));
        self.append(doc, node, parent)?;

        if self_closing || (self.dialect.is_html() && is_void(&tag)) {
            return Ok(());
        }

        if self.dialect.is_html() && is_rawtext(&tag) {
            let body = self.read_rawtext(&tag)?;
            if !body.is_empty() {
                let text = doc.arena.allocate(NodeData::Text(body));
                self.append(doc, text, node)?;
            }
            return Ok(());
        }

        stack.push((node, name));
        Ok(())
    }

    /// Raw content of a `<script>`/`<style>` element up to its end tag,
    /// which is consumed.
    fn read_rawtext(&mut self, tag: &str) -> Result<String> {
        let close = format!("</{}", tag);
        let rest = &self.input[self.pos..];
        let bytes = rest.as_bytes();
        let mut search = 0;
        let found = loop {
            let hit = bytes[search..]
                .windows(close.len())
                .position(|w| w.eq_ignore_ascii_case(close.as_bytes()))
                .map(|p| p + search)
                .ok_or_else(|| self.err(format!("unterminated <{}> element", tag)))?;
            // The tag name must end here: "</scripty>" does not close
            // a "<script>" element.
            match bytes.get(hit + close.len()) {
                Some(&b) if b.is_ascii_whitespace() || b == b'/' || b == b'>' => break hit,
                None => break hit,
                Some(_) => search = hit + 1,
            }
        };
        let body = rest[..found].to_string();
        self.pos += found + close.len();
        // Consume the rest of the end tag.
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'>' {
            self.pos += 1;
        }
        if self.peek() != Some(b'>') {
            return Err(self.err(format!("malformed end tag for <{}>", tag)));
        }
        self.pos += 1;
        Ok(body)
    }

    fn read_attribute(&mut self) -> Result<(String, String)> {
        let name = self.read_name()?;
        self.skip_whitespace();
        if self.peek() != Some(b'=') {
            // Boolean attribute (HTML) or valueless attribute.
            return Ok((name, String::new()));
        }
        self.pos += 1;
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.pos < self.bytes.len() && self.bytes[self.pos] != quote {
                    self.pos += 1;
                }
                if self.pos >= self.bytes.len() {
                    return Err(self.err(format!("unterminated value for attribute '{}'", name)));
                }
                let raw = &self.input[start..self.pos];
                self.pos += 1;
                decode_entities(raw)
            }
            Some(_) => {
                let start = self.pos;
                while self.pos < self.bytes.len()
                    && !self.bytes[self.pos].is_ascii_whitespace()
                    && !matches!(self.bytes[self.pos], b'>' | b'/')
                {
                    self.pos += 1;
                }
                decode_entities(&self.input[start..self.pos])
            }
            None => return Err(self.err(format!("unexpected end of input after '{}='", name))),
        };
        Ok((name, value))
    }

    fn read_name(&mut self) -> Result<String> {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.err("expected a name"));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn fold_case(&self, name: &str) -> String {
        if self.dialect.is_html() {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    fn take_delimited(&mut self, open: &str, close: &str) -> Result<String> {
        self.pos += open.len();
        let rest = &self.input[self.pos..];
        let found = rest
            .find(close)
            .ok_or_else(|| self.err(format!("missing '{}' terminator", close)))?;
        let body = rest[..found].to_string();
        self.pos += found + close.len();
        Ok(body)
    }

    fn append(&self, doc: &mut Document, node: NodeId, parent: NodeId) -> Result<()> {
        let index = doc.arena.get(parent)?.children.len();
        doc.arena.link(node, parent, index)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.bytes[self.pos..].starts_with(prefix.as_bytes())
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }
}

/// Decode the five core entities plus numeric character references.
/// Unknown entities pass through verbatim.
fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = match rest.find(';') {
            // Entity names are short; a distant semicolon means this
            // ampersand is literal text.
            Some(s) if s <= 10 => s,
            _ => {
                out.push('&');
                rest = &rest[1..];
                continue;
            }
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix('#')
                .and_then(|num| {
                    if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        num.parse::<u32>().ok()
                    }
                })
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeType;

    #[test]
    fn test_parse_simple_document() {
        let doc = parse(b"<div id=\"x\"><p class=\"a b\">hi</p></div>", Dialect::Html).unwrap();
        let div = doc.root_element().unwrap();
        assert_eq!(doc.tag(div).unwrap(), "div");
        assert_eq!(doc.attr(div, "id").unwrap(), Some("x"));
        let p = doc.first_child(div).unwrap().unwrap();
        assert_eq!(doc.attr(p, "class").unwrap(), Some("a b"));
    }

    #[test]
    fn test_parse_error_exposes_no_tree() {
        assert!(matches!(
            parse(b"<root><open></root>", Dialect::Xml),
            Err(DomError::Parse { .. })
        ));
        assert!(matches!(
            parse(b"<root", Dialect::Xml),
            Err(DomError::Parse { .. })
        ));
        assert!(matches!(
            parse(&[0x80, 0x81], Dialect::Xml),
            Err(DomError::Parse { .. })
        ));
    }

    #[test]
    fn test_html_recovers_unclosed_tags() {
        let mut doc = parse(b"<ul><li>one</li><li>two</ul>", Dialect::Html).unwrap();
        let ul = doc.root_element().unwrap();
        assert_eq!(doc.element_child_count(ul).unwrap(), 2);
        assert_eq!(doc.string_value(ul).unwrap(), "onetwo");
    }

    #[test]
    fn test_html_void_and_case_folding() {
        let mut doc = parse(b"<DIV><BR><IMG src=\"a.png\"></DIV>", Dialect::Html).unwrap();
        let div = doc.root_element().unwrap();
        assert_eq!(doc.tag(div).unwrap(), "div");
        let children = doc.children(div).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(doc.tag(children[0]).unwrap(), "br");
        assert!(doc.child_nodes(children[0]).unwrap().is_empty());
        assert_eq!(doc.raw_markup(div).unwrap(), "<div><br><img src=\"a.png\"></div>");
    }

    #[test]
    fn test_xml_preserves_case_and_prefix() {
        let doc = parse(b"<Root><ns:Item a='1'/></Root>", Dialect::Xml).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.tag(root).unwrap(), "Root");
        let item = doc.first_child(root).unwrap().unwrap();
        assert_eq!(doc.tag(item).unwrap(), "Item");
        assert_eq!(doc.namespace_prefix(item).unwrap(), Some("ns"));
        assert_eq!(doc.attr(item, "a").unwrap(), Some("1"));
    }

    #[test]
    fn test_comment_cdata_pi_doctype() {
        let doc = parse(
            b"<!DOCTYPE html><?xml-stylesheet href=\"s.css\"?><root><!-- note --><![CDATA[1 < 2]]></root>",
            Dialect::Xml,
        )
        .unwrap();
        let root_node = doc.root().unwrap();
        let kids = doc.child_nodes(root_node).unwrap();
        assert_eq!(doc.node_type(kids[0]).unwrap(), NodeType::DocType);
        assert_eq!(
            doc.node_type(kids[1]).unwrap(),
            NodeType::ProcessingInstruction
        );

        let root = doc.root_element().unwrap();
        let inner = doc.child_nodes(root).unwrap();
        assert_eq!(doc.node_type(inner[0]).unwrap(), NodeType::Comment);
        assert_eq!(doc.node_type(inner[1]).unwrap(), NodeType::CData);
    }

    #[test]
    fn test_entity_decoding() {
        let mut doc = parse(
            b"<p title=\"a &amp; b\">&lt;x&gt; &#65;&#x42; &unknown; 1 &amp 2</p>",
            Dialect::Html,
        )
        .unwrap();
        let p = doc.root_element().unwrap();
        assert_eq!(doc.attr(p, "title").unwrap(), Some("a & b"));
        assert_eq!(doc.string_value(p).unwrap(), "<x> AB &unknown; 1 &amp 2");
    }

    #[test]
    fn test_script_body_is_raw() {
        let mut doc = parse(
            b"<html><script>if (a < b) { f(\"</p>\"); }</script></html>",
            Dialect::Html,
        )
        .unwrap();
        let html = doc.root_element().unwrap();
        let script = doc.first_child(html).unwrap().unwrap();
        // Only the matching end tag terminates a rawtext body.
        assert_eq!(doc.string_value(script).unwrap(), "if (a < b) { f(\"</p>\"); }");
        assert_eq!(doc.tag(script).unwrap(), "script");
    }

    #[test]
    fn test_rawtext_close_needs_tag_boundary() {
        let mut doc = parse(b"<script>x</scripty>z</script>", Dialect::Html).unwrap();
        let script = doc.root_element().unwrap();
        assert_eq!(doc.string_value(script).unwrap(), "x</scripty>z");

        // Whitespace before '>' still closes the element.
        let mut doc = parse(b"<style>a { }</style >", Dialect::Html).unwrap();
        let style = doc.root_element().unwrap();
        assert_eq!(doc.string_value(style).unwrap(), "a { }");
    }

    #[test]
    fn test_roundtrip_stable() {
        let input = "<root a=\"1\"><child>text &amp; more</child><empty/></root>";
        let mut doc = parse(input.as_bytes(), Dialect::Xml).unwrap();
        assert_eq!(doc.to_markup().unwrap(), input);
    }
}

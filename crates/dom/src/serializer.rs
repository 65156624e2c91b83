//! Markup serialization and text extraction
//!
//! Pure functions over the arena; all caching of the results lives in the
//! document layer. Serialization is dialect-aware: HTML gets void
//! elements without close tags and raw `<script>`/`<style>` bodies, XML
//! gets self-closing empty elements and strict escaping.

use crate::arena::{NodeArena, WalkAction};
use crate::error::Result;
use crate::types::{Dialect, ElementData, NodeData, NodeId};

/// HTML elements serialized without a closing tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// HTML elements whose text content is emitted (and parsed) raw.
pub(crate) const RAWTEXT_ELEMENTS: &[&str] = &["script", "style"];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn is_rawtext(tag: &str) -> bool {
    RAWTEXT_ELEMENTS.contains(&tag)
}

/// Serialize a node and its subtree to markup text.
pub(crate) fn markup(arena: &NodeArena, dialect: Dialect, id: NodeId) -> Result<String> {
    let mut out = String::with_capacity(256);
    serialize_node(arena, dialect, id, false, &mut out)?;
    Ok(out)
}

/// Concatenated text of all descendant text and CDATA nodes, unescaped.
pub(crate) fn text_content(arena: &NodeArena, id: NodeId) -> Result<String> {
    let mut text = String::new();
    arena.walk(id, |_, record| {
        match &record.data {
            NodeData::Text(t) | NodeData::CData(t) => text.push_str(t),
            _ => {}
        }
        WalkAction::Continue
    })?;
    Ok(text)
}

fn serialize_node(
    arena: &NodeArena,
    dialect: Dialect,
    id: NodeId,
    raw_text: bool,
    out: &mut String,
) -> Result<()> {
    let record = arena.get(id)?;
    match &record.data {
        NodeData::Document => {
            for &child in record.children.iter() {
                serialize_node(arena, dialect, child, false, out)?;
            }
        }
        NodeData::DocType { name } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        NodeData::Element(el) => {
            let name = qualified_name(el);
            out.push('<');
            out.push_str(&name);
            for attr in &el.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                escape_attr(&attr.value, out);
                out.push('"');
            }

            if dialect.is_html() && is_void(el.tag.as_str()) {
                out.push('>');
                return Ok(());
            }
            if record.children.is_empty() && !dialect.is_html() {
                out.push_str("/>");
                return Ok(());
            }
            out.push('>');

            let children_raw = dialect.is_html() && is_rawtext(el.tag.as_str());
            for &child in record.children.iter() {
                serialize_node(arena, dialect, child, children_raw, out)?;
            }

            out.push_str("</");
            out.push_str(&name);
            out.push('>');
        }
        NodeData::Text(t) => {
            if raw_text {
                out.push_str(t);
            } else {
                escape_text(t, out);
            }
        }
        NodeData::CData(t) => {
            out.push_str("<![CDATA[");
            out.push_str(t);
            out.push_str("]]>");
        }
        NodeData::Comment(t) => {
            out.push_str("<!--");
            out.push_str(t);
            out.push_str("-->");
        }
        NodeData::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
    }
    Ok(())
}

pub(crate) fn qualified_name(el: &ElementData) -> String {
    match &el.ns_prefix {
        Some(prefix) => format!("{}:{}", prefix, el.tag),
        None => el.tag.clone(),
    }
}

fn escape_text(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

//! Core type definitions for the markup tree
//!
//! Key design principles:
//! 1. Use u32 pairs for node identity (index + slot generation), never pointers
//! 2. Keep the per-node record small; payload lives in a tagged enum
//! 3. Use SmallVec for child lists (most nodes have <4 children)
//! 4. Derived values are memoized in explicit cache slots, Empty == None

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Node identifier: an index into the arena plus the slot generation that
/// was current when the node was allocated. A freed slot bumps its
/// generation, so ids held across a free resolve to nothing instead of to
/// whatever node reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Raw arena index, mainly useful for diagnostics.
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Node type, a closed enumeration mirroring the markup grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Element,
    Text,
    CData,
    Comment,
    ProcessingInstruction,
    Document,
    DocType,
}

/// Markup dialect of a document. Controls entity escaping and
/// void-element handling during parse and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    Xml,
    Html,
}

impl Dialect {
    pub fn is_html(self) -> bool {
        matches!(self, Dialect::Html)
    }
}

/// A single attribute. Elements keep attributes as an ordered list so
/// serialization is stable; the hash-map view is derived lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Element payload: tag, optional namespace prefix, ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementData {
    pub tag: String,
    pub ns_prefix: Option<String>,
    pub attrs: Vec<Attribute>,
}

impl ElementData {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ns_prefix: None,
            attrs: Vec::new(),
        }
    }

    /// Get an attribute value by exact name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute: update in place if present, append otherwise.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        for attr in self.attrs.iter_mut() {
            if attr.name == name {
                attr.value = value.into();
                return;
            }
        }
        self.attrs.push(Attribute {
            name: name.to_string(),
            value: value.into(),
        });
    }

    /// Remove an attribute by name. Returns true if it was present.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| a.name != name);
        self.attrs.len() != before
    }
}

/// Node payload, one variant per node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeData {
    Document,
    DocType { name: String },
    Element(ElementData),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

impl NodeData {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeData::Document => NodeType::Document,
            NodeData::DocType { .. } => NodeType::DocType,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Text(_) => NodeType::Text,
            NodeData::CData(_) => NodeType::CData,
            NodeData::Comment(_) => NodeType::Comment,
            NodeData::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, NodeData::Element(_))
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match self {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match self {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// Per-node memo slots for subtree-derived values.
///
/// `None` means Empty (recompute on next read), `Some` means Computed. The
/// invariant the whole crate leans on: a Computed slot always equals what
/// recomputation would yield right now. Mutations uphold it by clearing
/// the slots on the mutated node and every strict ancestor.
#[derive(Debug, Clone, Default)]
pub(crate) struct CacheSlots {
    pub(crate) string_value: Option<String>,
    pub(crate) markup: Option<String>,
    pub(crate) attr_map: Option<AHashMap<String, String>>,
}

impl CacheSlots {
    /// Clear the subtree-derived slots (text + markup). Attribute edits
    /// clear `attr_map` separately, at the edit site.
    pub(crate) fn clear_derived(&mut self) {
        self.string_value = None;
        self.markup = None;
    }
}

/// One node record in the arena: tree links plus payload plus cache.
#[derive(Debug, Clone)]
pub(crate) struct NodeRecord {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    pub(crate) data: NodeData,
    pub(crate) cache: CacheSlots,
}

impl NodeRecord {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: SmallVec::new(),
            data,
            cache: CacheSlots::default(),
        }
    }
}

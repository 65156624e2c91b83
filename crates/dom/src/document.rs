//! Document: tree owner, navigation, and the lazy-cache protocol
//!
//! The `Document` owns the arena and the root id, and every node
//! operation goes through it with a `NodeId` in hand. Two derived values
//! are memoized per node, `string_value` (concatenated descendant text)
//! and `raw_markup` (serialized subtree). Both are defined over the whole
//! subtree, so any mutation that touches a node's position or descendants
//! clears the slots on that node and on every strict ancestor; nothing
//! else is cleared. Parent and sibling lookups read arena links directly
//! and can never go stale.

use crate::arena::NodeArena;
use crate::error::Result;
use crate::parser;
use crate::serializer;
use crate::types::{Dialect, ElementData, NodeData, NodeId, NodeType};
use tracing::trace;

/// A parsed markup document and the store for every node in it.
#[derive(Debug)]
pub struct Document {
    pub(crate) arena: NodeArena,
    pub(crate) root: Option<NodeId>,
    dialect: Dialect,
}

impl Document {
    /// New empty document: a single root node of type `Document`.
    pub fn new(dialect: Dialect) -> Self {
        let mut arena = NodeArena::new();
        let root = arena.allocate(NodeData::Document);
        Self {
            arena,
            root: Some(root),
            dialect,
        }
    }

    /// Parse markup bytes into a document. Fails as a whole on malformed
    /// input; no partial tree is exposed.
    pub fn parse(input: &[u8], dialect: Dialect) -> Result<Self> {
        parser::parse(input, dialect)
    }

    /// Parse from a string slice.
    pub fn parse_str(input: &str, dialect: Dialect) -> Result<Self> {
        parser::parse(input.as_bytes(), dialect)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn is_html(&self) -> bool {
        self.dialect.is_html()
    }

    /// Root node (type `Document`), if the tree has one.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// First element child of the root, i.e. the document element.
    pub fn root_element(&self) -> Option<NodeId> {
        let root = self.root?;
        let record = self.arena.get(root).ok()?;
        record
            .children
            .iter()
            .copied()
            .find(|&c| self.arena.get(c).map(|r| r.data.is_element()).unwrap_or(false))
    }

    /// Number of live nodes in the store.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Whether an id still resolves to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    pub fn node_type(&self, id: NodeId) -> Result<NodeType> {
        Ok(self.arena.get(id)?.data.node_type())
    }

    // --- explicit node creation (detached, owned by no tree yet) ---

    pub fn new_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.arena.allocate(NodeData::Element(ElementData::new(tag)))
    }

    pub fn new_text(&mut self, text: impl Into<String>) -> NodeId {
        self.arena.allocate(NodeData::Text(text.into()))
    }

    pub fn new_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.arena.allocate(NodeData::Comment(text.into()))
    }

    // --- navigation ---

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.arena.get(id)?.parent)
    }

    pub fn first_child(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.arena.get(id)?.children.first().copied())
    }

    pub fn last_child(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.arena.get(id)?.children.last().copied())
    }

    /// All child nodes, in document order.
    pub fn child_nodes(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.arena.get(id)?.children.to_vec())
    }

    /// Child nodes restricted to the given types.
    pub fn child_nodes_of_type(&self, id: NodeId, types: &[NodeType]) -> Result<Vec<NodeId>> {
        let children = self.arena.get(id)?.children.to_vec();
        let mut out = Vec::new();
        for child in children {
            if types.contains(&self.node_type(child)?) {
                out.push(child);
            }
        }
        Ok(out)
    }

    pub fn prev_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        match self.arena.position_in_parent(id)? {
            Some((parent, index)) if index > 0 => {
                Ok(Some(self.arena.get(parent)?.children[index - 1]))
            }
            _ => Ok(None),
        }
    }

    pub fn next_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        match self.arena.position_in_parent(id)? {
            Some((parent, index)) => {
                Ok(self.arena.get(parent)?.children.get(index + 1).copied())
            }
            None => Ok(None),
        }
    }

    pub fn prev_element_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        let (parent, index) = match self.arena.position_in_parent(id)? {
            Some(p) => p,
            None => return Ok(None),
        };
        let siblings = &self.arena.get(parent)?.children;
        for &sib in siblings[..index].iter().rev() {
            if self.arena.get(sib)?.data.is_element() {
                return Ok(Some(sib));
            }
        }
        Ok(None)
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Result<Option<NodeId>> {
        let (parent, index) = match self.arena.position_in_parent(id)? {
            Some(p) => p,
            None => return Ok(None),
        };
        let siblings = self.arena.get(parent)?.children.to_vec();
        for &sib in &siblings[index + 1..] {
            if self.arena.get(sib)?.data.is_element() {
                return Ok(Some(sib));
            }
        }
        Ok(None)
    }

    // --- lazy derived reads ---

    /// Concatenated text of the node's subtree. Computed on first read,
    /// cached until a mutation invalidates it.
    pub fn string_value(&mut self, id: NodeId) -> Result<String> {
        if let Some(cached) = &self.arena.get(id)?.cache.string_value {
            return Ok(cached.clone());
        }
        let value = serializer::text_content(&self.arena, id)?;
        self.arena.get_mut(id)?.cache.string_value = Some(value.clone());
        Ok(value)
    }

    /// Serialized markup of the node's subtree, per the document dialect.
    /// Computed on first read, cached until a mutation invalidates it.
    pub fn raw_markup(&mut self, id: NodeId) -> Result<String> {
        if let Some(cached) = &self.arena.get(id)?.cache.markup {
            return Ok(cached.clone());
        }
        let value = serializer::markup(&self.arena, self.dialect, id)?;
        self.arena.get_mut(id)?.cache.markup = Some(value.clone());
        Ok(value)
    }

    /// Serialize the whole document.
    pub fn to_markup(&mut self) -> Result<String> {
        match self.root {
            Some(root) => self.raw_markup(root),
            None => Ok(String::new()),
        }
    }

    // --- mutation engine ---

    /// Clear the subtree-derived slots on `start` and every strict
    /// ancestor. This is the invalidation walk every mutation funnels
    /// through; it never touches siblings or cousins.
    pub(crate) fn invalidate_upward(&mut self, start: Option<NodeId>) {
        let mut cursor = start;
        while let Some(id) = cursor {
            match self.arena.get_mut(id) {
                Ok(record) => {
                    record.cache.clear_derived();
                    cursor = record.parent;
                }
                Err(_) => break,
            }
        }
    }

    /// Detach a node from the tree. The node keeps its subtree and its
    /// caches (they still describe the detached subtree); the former
    /// ancestor chain is invalidated. A detached node can be re-attached
    /// with `append_child` or released with `free`.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let former = self.arena.unlink(id)?;
        if self.root == Some(id) {
            self.root = None;
        }
        trace!(node = id.index(), "removed node from tree");
        self.invalidate_upward(former.map(|(parent, _)| parent));
        Ok(())
    }

    /// Release a detached node and its subtree. Ids into the freed
    /// subtree go stale. No-op on an already-stale id.
    pub fn free(&mut self, id: NodeId) -> Result<()> {
        self.arena.free(id)?;
        // The root is parentless and therefore freeable; don't keep
        // handing out its stale id afterwards.
        if self.root == Some(id) {
            self.root = None;
        }
        Ok(())
    }

    /// Structurally independent detached copy, deep if `recursive`. The
    /// copy starts fully uncached, has no parent, and shares the source's
    /// document (and therefore dialect) even if the source itself is
    /// detached.
    pub fn copy(&mut self, id: NodeId, recursive: bool) -> Result<NodeId> {
        self.arena.copy(id, recursive)
    }

    /// Replace the node's content with a single text node holding `text`
    /// (escaped at serialization time per dialect). On a leaf node the
    /// payload itself is replaced.
    pub fn set_content(&mut self, id: NodeId, text: &str) -> Result<()> {
        let leaf = matches!(
            self.arena.get(id)?.data,
            NodeData::Text(_) | NodeData::CData(_) | NodeData::Comment(_)
        );
        if leaf {
            match &mut self.arena.get_mut(id)?.data {
                NodeData::Text(t) | NodeData::CData(t) | NodeData::Comment(t) => {
                    *t = text.to_string();
                }
                _ => unreachable!(),
            }
        } else {
            let children = self.arena.get(id)?.children.to_vec();
            for child in children {
                self.arena.unlink(child)?;
                self.arena.free(child)?;
            }
            if !text.is_empty() {
                let text_node = self.arena.allocate(NodeData::Text(text.to_string()));
                self.arena.link(text_node, id, 0)?;
            }
        }
        self.invalidate_upward(Some(id));
        Ok(())
    }

    /// Deep-copy a subtree from another document into this one. Used by
    /// fragment replacement; the imported subtree is detached.
    pub(crate) fn import_from(&mut self, source: &Document, id: NodeId) -> Result<NodeId> {
        let data = source.arena.get(id)?.data.clone();
        let imported = self.arena.allocate(data);
        let children = source.arena.get(id)?.children.to_vec();
        for child in children {
            let child_copy = self.import_from(source, child)?;
            let index = self.arena.get(imported)?.children.len();
            self.arena.link(child_copy, imported, index)?;
        }
        Ok(imported)
    }
}

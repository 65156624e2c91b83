//! Element view: the tag-bearing subset of nodes
//!
//! There is no Element type; element capability is a runtime check on the
//! node's data variant, and every operation here fails with
//! `NotAnElement` on other node types. Attribute writes go through to
//! storage immediately and drop the cached map; the map is re-derived on
//! the next `attributes` read, never eagerly.

use crate::document::Document;
use crate::error::{DomError, Result};
use crate::parser;
use crate::types::{ElementData, NodeId, NodeType};
use ahash::AHashMap;
use tracing::{debug, trace};

impl Document {
    pub(crate) fn element(&self, id: NodeId) -> Result<&ElementData> {
        self.arena
            .get(id)?
            .data
            .as_element()
            .ok_or(DomError::NotAnElement(id))
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData> {
        self.arena
            .get_mut(id)?
            .data
            .as_element_mut()
            .ok_or(DomError::NotAnElement(id))
    }

    pub fn is_element(&self, id: NodeId) -> Result<bool> {
        Ok(self.arena.get(id)?.data.is_element())
    }

    // --- tag and namespace ---

    pub fn tag(&self, id: NodeId) -> Result<&str> {
        Ok(self.element(id)?.tag.as_str())
    }

    pub fn namespace_prefix(&self, id: NodeId) -> Result<Option<&str>> {
        Ok(self.element(id)?.ns_prefix.as_deref())
    }

    /// Rename the element. Markup of the node and its ancestors changes,
    /// so the usual invalidation walk runs.
    pub fn set_tag(&mut self, id: NodeId, tag: impl Into<String>) -> Result<()> {
        self.element_mut(id)?.tag = tag.into();
        self.invalidate_upward(Some(id));
        Ok(())
    }

    // --- attributes ---

    /// Single attribute read. Not cached individually; only the full map
    /// is memoized.
    pub fn attr(&self, id: NodeId, name: &str) -> Result<Option<&str>> {
        Ok(self.element(id)?.attr(name))
    }

    /// Attribute read under a namespace prefix (`prefix:name`).
    pub fn attr_ns(&self, id: NodeId, name: &str, ns_prefix: Option<&str>) -> Result<Option<&str>> {
        match ns_prefix {
            Some(prefix) => {
                let qualified = format!("{}:{}", prefix, name);
                Ok(self.element(id)?.attr(&qualified))
            }
            None => self.attr(id, name),
        }
    }

    /// Write through to storage, then drop the cached attribute map. The
    /// next `attributes` read re-derives it.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        self.element_mut(id)?.set_attr(name, value);
        self.arena.get_mut(id)?.cache.attr_map = None;
        self.invalidate_upward(Some(id));
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<()> {
        self.element_mut(id)?.remove_attr(name);
        self.arena.get_mut(id)?.cache.attr_map = None;
        self.invalidate_upward(Some(id));
        Ok(())
    }

    /// Full attribute map, lazily materialized from the ordered list and
    /// cached until the next attribute write.
    pub fn attributes(&mut self, id: NodeId) -> Result<AHashMap<String, String>> {
        if let Some(map) = &self.arena.get(id)?.cache.attr_map {
            return Ok(map.clone());
        }
        let map: AHashMap<String, String> = self
            .element(id)?
            .attrs
            .iter()
            .map(|a| (a.name.clone(), a.value.clone()))
            .collect();
        self.arena.get_mut(id)?.cache.attr_map = Some(map.clone());
        Ok(map)
    }

    // --- element-only child navigation ---

    /// Element-typed children, in document order.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.child_nodes_of_type(id, &[NodeType::Element])
    }

    /// Element children with the given tag (exact match) and, when a
    /// prefix is supplied, that namespace prefix.
    pub fn children_by_tag(
        &self,
        id: NodeId,
        tag: &str,
        ns_prefix: Option<&str>,
    ) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        for child in self.children(id)? {
            let el = self.element(child)?;
            if el.tag == tag && (ns_prefix.is_none() || el.ns_prefix.as_deref() == ns_prefix) {
                out.push(child);
            }
        }
        Ok(out)
    }

    pub fn first_child_by_tag(
        &self,
        id: NodeId,
        tag: &str,
        ns_prefix: Option<&str>,
    ) -> Result<Option<NodeId>> {
        Ok(self.children_by_tag(id, tag, ns_prefix)?.into_iter().next())
    }

    pub fn element_child_count(&self, id: NodeId) -> Result<usize> {
        Ok(self.children(id)?.len())
    }

    /// Replace the element's content with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        self.element(id)?;
        self.set_content(id, text)
    }

    // --- structural mutation ---

    fn ensure_can_contain(&self, parent: NodeId) -> Result<()> {
        match self.node_type(parent)? {
            NodeType::Element | NodeType::Document => Ok(()),
            _ => Err(DomError::NotAnElement(parent)),
        }
    }

    fn ensure_no_cycle(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(DomError::CycleDetected(child));
            }
            cursor = self.arena.get(current)?.parent;
        }
        Ok(())
    }

    /// Link `child` as the last child of `parent`.
    ///
    /// Eager-unlink semantics: a child already linked elsewhere is first
    /// detached from its old parent (with invalidation run from the old
    /// position) and then appended here.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.ensure_can_contain(parent)?;
        self.ensure_no_cycle(parent, child)?;

        if let Some((old_parent, _)) = self.arena.unlink(child)? {
            self.invalidate_upward(Some(old_parent));
        }
        let index = self.arena.get(parent)?.children.len();
        self.arena.link(child, parent, index)?;
        self.invalidate_upward(Some(parent));
        trace!(parent = parent.index(), child = child.index(), "appended child");
        Ok(())
    }

    /// Swap `new` into `old`'s position under `parent`. `old` becomes
    /// detached; `new` is eagerly unlinked from any previous parent. The
    /// ancestor chain is invalidated once, from the replacement point.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> Result<()> {
        self.ensure_can_contain(parent)?;
        self.ensure_no_cycle(parent, new)?;
        self.arena
            .position_in_parent(old)?
            .filter(|&(p, _)| p == parent)
            .ok_or(DomError::NotAChild { parent, child: old })?;

        // Invalidate before the swap: afterwards `old` no longer links
        // upward, so the chain is only reachable from the parent.
        self.invalidate_upward(Some(parent));
        if let Some((new_parent, _)) = self.arena.unlink(new)? {
            self.invalidate_upward(Some(new_parent));
        }
        // `old`'s index may have shifted if `new` was an earlier sibling
        // under the same parent, so it is read after the unlink.
        let (_, index) = self
            .arena
            .position_in_parent(old)?
            .ok_or(DomError::NotAChild { parent, child: old })?;
        self.arena.unlink(old)?;
        self.arena.link(new, parent, index)?;
        trace!(
            parent = parent.index(),
            old = old.index(),
            new = new.index(),
            "replaced child"
        );
        Ok(())
    }

    /// Replace this element with the result of parsing `fragment`.
    ///
    /// The fragment is parsed before any mutation, so a parse failure
    /// leaves the tree exactly as it was. On success the parsed element
    /// is deep-copied into this document, swapped into the old node's
    /// position, and the old subtree is freed. The returned id is the
    /// retargeted handle; the passed-in id goes stale.
    pub fn set_markup(&mut self, id: NodeId, fragment: &str) -> Result<NodeId> {
        self.element(id)?;

        let parsed = parser::parse_fragment(fragment, self.dialect())
            .map_err(|e| DomError::InvalidFragment(e.to_string()))?;
        let source = parsed
            .root_element()
            .ok_or_else(|| DomError::InvalidFragment("fragment contains no element".into()))?;
        let imported = self.import_from(&parsed, source)?;

        match self.arena.position_in_parent(id)? {
            Some((parent, index)) => {
                self.invalidate_upward(Some(parent));
                self.arena.unlink(id)?;
                self.arena.link(imported, parent, index)?;
            }
            None => {
                // Detached element: the replacement simply takes over.
            }
        }
        self.arena.free(id)?;
        debug!(old = id.index(), new = imported.index(), "replaced element with fragment");
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dialect;

    fn sample() -> Document {
        Document::parse_str(
            "<html><body><div id=\"x\"><p class=\"a b\">hi</p></div><p>other</p></body></html>",
            Dialect::Html,
        )
        .unwrap()
    }

    fn div_of(doc: &Document) -> NodeId {
        let html = doc.root_element().unwrap();
        let body = doc.first_child(html).unwrap().unwrap();
        doc.first_child(body).unwrap().unwrap()
    }

    #[test]
    fn test_attribute_write_through() {
        let mut doc = sample();
        let div = div_of(&doc);

        // Warm the map cache, then write through.
        let map = doc.attributes(div).unwrap();
        assert_eq!(map.get("id").map(String::as_str), Some("x"));

        doc.set_attribute(div, "k", "v").unwrap();
        assert_eq!(doc.attr(div, "k").unwrap(), Some("v"));
        let map = doc.attributes(div).unwrap();
        assert_eq!(map.get("k").map(String::as_str), Some("v"));

        doc.remove_attribute(div, "k").unwrap();
        assert_eq!(doc.attr(div, "k").unwrap(), None);
        assert!(!doc.attributes(div).unwrap().contains_key("k"));
    }

    #[test]
    fn test_attribute_edit_invalidates_markup() {
        let mut doc = sample();
        let div = div_of(&doc);
        let html = doc.root_element().unwrap();

        doc.raw_markup(html).unwrap();
        doc.set_attribute(div, "data-k", "v").unwrap();
        assert!(doc.raw_markup(html).unwrap().contains("data-k=\"v\""));
    }

    #[test]
    fn test_not_an_element() {
        let mut doc = sample();
        let div = div_of(&doc);
        let p = doc.first_child(div).unwrap().unwrap();
        let text = doc.first_child(p).unwrap().unwrap();

        assert!(matches!(
            doc.attr(text, "id"),
            Err(DomError::NotAnElement(_))
        ));
        assert!(matches!(
            doc.set_attribute(text, "a", "b"),
            Err(DomError::NotAnElement(_))
        ));
        assert!(matches!(doc.tag(text), Err(DomError::NotAnElement(_))));
    }

    #[test]
    fn test_set_tag_and_namespace() {
        let mut doc = Document::parse_str("<root><ns:item/></root>", Dialect::Xml).unwrap();
        let root = doc.root_element().unwrap();
        let item = doc.first_child(root).unwrap().unwrap();

        assert_eq!(doc.tag(item).unwrap(), "item");
        assert_eq!(doc.namespace_prefix(item).unwrap(), Some("ns"));
        assert_eq!(
            doc.children_by_tag(root, "item", Some("ns")).unwrap(),
            vec![item]
        );
        assert!(doc.children_by_tag(root, "item", Some("other")).unwrap().is_empty());

        doc.set_tag(item, "entry").unwrap();
        assert!(doc.raw_markup(root).unwrap().contains("ns:entry"));
    }

    #[test]
    fn test_detach_reattach_round_trip() {
        let mut doc = sample();
        let html = doc.root_element().unwrap();
        let body = doc.first_child(html).unwrap().unwrap();
        let div = doc.first_child(body).unwrap().unwrap();
        let other_p = doc.last_child(body).unwrap().unwrap();

        doc.remove(div).unwrap();
        doc.append_child(other_p, div).unwrap();

        assert_eq!(doc.parent(div).unwrap(), Some(other_p));
        assert_eq!(doc.prev_sibling(div).unwrap(), doc.first_child(other_p).unwrap());
        assert_eq!(doc.next_sibling(div).unwrap(), None);
        assert_eq!(doc.string_value(body).unwrap(), "otherhi");
    }

    #[test]
    fn test_append_child_eagerly_unlinks() {
        let mut doc = sample();
        let html = doc.root_element().unwrap();
        let body = doc.first_child(html).unwrap().unwrap();
        let div = doc.first_child(body).unwrap().unwrap();
        let p = doc.first_child(div).unwrap().unwrap();

        doc.string_value(div).unwrap();

        // Moving a still-linked node severs the old linkage first.
        doc.append_child(body, p).unwrap();
        assert_eq!(doc.parent(p).unwrap(), Some(body));
        assert!(doc.child_nodes(div).unwrap().is_empty());
        assert_eq!(doc.string_value(div).unwrap(), "");
        assert_eq!(doc.last_child(body).unwrap(), Some(p));
    }

    #[test]
    fn test_append_rejects_cycle() {
        let mut doc = sample();
        let html = doc.root_element().unwrap();
        let body = doc.first_child(html).unwrap().unwrap();
        let div = doc.first_child(body).unwrap().unwrap();

        assert!(matches!(
            doc.append_child(div, body),
            Err(DomError::CycleDetected(_))
        ));
        // The failed call mutated nothing.
        assert_eq!(doc.parent(body).unwrap(), Some(html));
        assert_eq!(doc.parent(div).unwrap(), Some(body));
    }

    #[test]
    fn test_replace_child() {
        let mut doc = sample();
        let html = doc.root_element().unwrap();
        let body = doc.first_child(html).unwrap().unwrap();
        let div = doc.first_child(body).unwrap().unwrap();

        let replacement = doc.new_element("section");
        doc.string_value(body).unwrap();
        doc.replace_child(body, div, replacement).unwrap();

        assert_eq!(doc.first_child(body).unwrap(), Some(replacement));
        assert_eq!(doc.parent(div).unwrap(), None);
        assert_eq!(doc.parent(replacement).unwrap(), Some(body));
        assert_eq!(doc.string_value(body).unwrap(), "other");

        // The detached node keeps its subtree and can be freed.
        assert_eq!(doc.string_value(div).unwrap(), "hi");
        doc.free(div).unwrap();
    }

    #[test]
    fn test_replace_child_with_preceding_sibling() {
        let mut doc = Document::parse_str(
            "<ul><li id=\"a\"/><li id=\"b\"/><li id=\"c\"/></ul>",
            Dialect::Html,
        )
        .unwrap();
        let ul = doc.root_element().unwrap();
        let items = doc.children(ul).unwrap();
        let (a, b) = (items[0], items[1]);

        // Moving an earlier sibling into a vacated slot must not drift
        // one position to the right.
        doc.replace_child(ul, b, a).unwrap();
        let ids: Vec<_> = doc
            .children(ul)
            .unwrap()
            .iter()
            .map(|&id| doc.attr(id, "id").unwrap().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(doc.parent(b).unwrap(), None);
    }

    #[test]
    fn test_replace_child_wrong_parent() {
        let mut doc = sample();
        let html = doc.root_element().unwrap();
        let body = doc.first_child(html).unwrap().unwrap();
        let div = doc.first_child(body).unwrap().unwrap();
        let p = doc.first_child(div).unwrap().unwrap();
        let replacement = doc.new_element("section");

        assert!(matches!(
            doc.replace_child(body, p, replacement),
            Err(DomError::NotAChild { .. })
        ));
    }

    #[test]
    fn test_set_markup_retargets_handle() {
        let mut doc = sample();
        let html = doc.root_element().unwrap();
        let body = doc.first_child(html).unwrap().unwrap();
        let div = div_of(&doc);

        let new_div = doc
            .set_markup(div, "<div id=\"y\"><span>swapped</span></div>")
            .unwrap();

        assert!(matches!(doc.tag(div), Err(DomError::StaleNode(_))));
        assert_eq!(doc.attr(new_div, "id").unwrap(), Some("y"));
        assert_eq!(doc.parent(new_div).unwrap(), Some(body));
        assert_eq!(doc.first_child(body).unwrap(), Some(new_div));
        assert_eq!(doc.string_value(body).unwrap(), "swappedother");
    }

    #[test]
    fn test_set_markup_atomic_on_parse_failure() {
        let mut doc = sample();
        let div = div_of(&doc);
        let before = doc.raw_markup(doc.root_element().unwrap()).unwrap();

        let err = doc.set_markup(div, "<div id=\"y");
        assert!(matches!(err, Err(DomError::InvalidFragment(_))));

        // Target untouched: same markup, same live handle.
        assert_eq!(doc.attr(div, "id").unwrap(), Some("x"));
        let after = doc.raw_markup(doc.root_element().unwrap()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_element_child_navigation() {
        let mut doc = Document::parse_str(
            "<list><item>1</item>text<item>2</item><note/></list>",
            Dialect::Xml,
        )
        .unwrap();
        let list = doc.root_element().unwrap();

        assert_eq!(doc.element_child_count(list).unwrap(), 3);
        assert_eq!(doc.children_by_tag(list, "item", None).unwrap().len(), 2);
        let first = doc.first_child_by_tag(list, "item", None).unwrap().unwrap();
        assert_eq!(doc.string_value(first).unwrap(), "1");
        assert!(doc.first_child_by_tag(list, "missing", None).unwrap().is_none());
    }
}

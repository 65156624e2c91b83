//! Filter layer: id/class/tag lookups over element traversal
//!
//! All three filters ride the arena's pre-order walk and therefore see
//! elements in document order. `element_by_id` returns the first match
//! and halts the entire walk, so a duplicate id inside the match's own
//! subtree is never reached.

use crate::arena::WalkAction;
use crate::document::Document;
use crate::error::Result;
use crate::types::NodeId;

impl Document {
    /// First element in document order (starting at `root`, inclusive)
    /// whose `id` attribute equals `id_value`. No uniqueness is assumed.
    pub fn element_by_id(&self, root: NodeId, id_value: &str) -> Result<Option<NodeId>> {
        let mut found = None;
        self.arena.walk(root, |id, record| {
            if let Some(el) = record.data.as_element() {
                if el.attr("id") == Some(id_value) {
                    found = Some(id);
                    return WalkAction::Stop;
                }
            }
            WalkAction::Continue
        })?;
        Ok(found)
    }

    /// Elements whose own whitespace-split `class` set contains every
    /// class in the whitespace-split `class_names` (extra classes on the
    /// element are fine). Full subtree traversal, document order.
    pub fn elements_by_class(&self, root: NodeId, class_names: &str) -> Result<Vec<NodeId>> {
        let wanted: Vec<&str> = class_names.split_whitespace().collect();
        let mut out = Vec::new();
        self.arena.walk(root, |id, record| {
            if let Some(el) = record.data.as_element() {
                let own: Vec<&str> = el
                    .attr("class")
                    .map(|c| c.split_whitespace().collect())
                    .unwrap_or_default();
                if wanted.iter().all(|w| own.contains(w)) {
                    out.push(id);
                }
            }
            WalkAction::Continue
        })?;
        Ok(out)
    }

    /// Elements with exactly this tag (case-sensitive), document order.
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        self.arena.walk(root, |id, record| {
            if let Some(el) = record.data.as_element() {
                if el.tag == tag {
                    out.push(id);
                }
            }
            WalkAction::Continue
        })?;
        Ok(out)
    }

    /// Elements matching an arbitrary predicate, in document order. This
    /// is the hook external query engines (XPath, CSS-to-XPath) plug
    /// into: results are ids straight into this store, no copying.
    pub fn select<F>(&self, root: NodeId, predicate: F) -> Result<Vec<NodeId>>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        let mut out = Vec::new();
        self.arena.walk(root, |id, record| {
            if record.data.is_element() && predicate(self, id) {
                out.push(id);
            }
            WalkAction::Continue
        })?;
        Ok(out)
    }
}

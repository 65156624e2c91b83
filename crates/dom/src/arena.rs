//! Arena-based tree storage
//!
//! The arena is the single owner of node memory. Everything else in the
//! crate works with `NodeId` indices:
//! - no Rc/Arc, no pointer chasing, nodes stored sequentially
//! - no recursion in traversal (explicit stack, no overflow on deep trees)
//! - freed slots bump a generation counter, so a stale id can never
//!   resolve to a node that reused the slot
//!
//! Ownership discipline: an attached node belongs to the tree; `free` is
//! only legal once a node is detached (no parent). Double free is a no-op
//! because the second id is already stale.

use crate::error::{DomError, Result};
use crate::types::{NodeData, NodeId, NodeRecord};

/// Control flow for the pre-order walk.
///
/// `Stop` halts the entire walk, not just the current subtree. This is
/// what lets an id lookup cut off the moment it finds its match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Visit this node's children.
    Continue,
    /// Skip this node's children, keep walking siblings.
    SkipChildren,
    /// Halt the whole walk.
    Stop,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    record: Option<NodeRecord>,
}

/// Arena allocator for tree nodes.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(64),
            free_list: Vec::new(),
        }
    }

    /// Allocate a new detached node, reusing a freed slot when available.
    pub fn allocate(&mut self, data: NodeData) -> NodeId {
        let record = NodeRecord::new(data);
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                record: Some(record),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Resolve an id to its record (immutable).
    pub(crate) fn get(&self, id: NodeId) -> Result<&NodeRecord> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_ref())
            .ok_or(DomError::StaleNode(id))
    }

    /// Resolve an id to its record (mutable).
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_mut())
            .ok_or(DomError::StaleNode(id))
    }

    /// Whether an id still resolves to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free a detached node and its whole subtree.
    ///
    /// Freeing a stale id is a no-op (idempotent against double free).
    /// Freeing an attached node is an error: detach first.
    pub fn free(&mut self, id: NodeId) -> Result<()> {
        let record = match self.get(id) {
            Ok(r) => r,
            Err(_) => return Ok(()),
        };
        if record.parent.is_some() {
            return Err(DomError::NotDetached(id));
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(record) = slot.record.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(current.index);
                stack.extend(record.children);
            }
        }
        Ok(())
    }

    /// Position of a node within its parent's child list.
    pub(crate) fn position_in_parent(&self, id: NodeId) -> Result<Option<(NodeId, usize)>> {
        let parent = match self.get(id)?.parent {
            Some(p) => p,
            None => return Ok(None),
        };
        let index = self
            .get(parent)?
            .children
            .iter()
            .position(|&c| c == id)
            .ok_or(DomError::NotAChild { parent, child: id })?;
        Ok(Some((parent, index)))
    }

    /// Link a detached node into a parent's child list at `index`
    /// (`index == len` appends). Rejects links that would close a cycle.
    pub(crate) fn link(&mut self, child: NodeId, parent: NodeId, index: usize) -> Result<()> {
        debug_assert!(self.get(child)?.parent.is_none());

        // Walking up from the parent must never reach the child.
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(DomError::CycleDetected(child));
            }
            cursor = self.get(current)?.parent;
        }

        let parent_record = self.get_mut(parent)?;
        let index = index.min(parent_record.children.len());
        parent_record.children.insert(index, child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Unlink a node from its parent. Returns the former position, or
    /// `None` if the node was already detached.
    pub(crate) fn unlink(&mut self, id: NodeId) -> Result<Option<(NodeId, usize)>> {
        let position = self.position_in_parent(id)?;
        if let Some((parent, index)) = position {
            self.get_mut(parent)?.children.remove(index);
            self.get_mut(id)?.parent = None;
        }
        Ok(position)
    }

    /// Structurally independent detached copy of a node. With
    /// `recursive`, the whole subtree is copied; otherwise a single node
    /// with no children. Copies start fully uncached.
    pub fn copy(&mut self, id: NodeId, recursive: bool) -> Result<NodeId> {
        let data = self.get(id)?.data.clone();
        let copy_id = self.allocate(data);
        if recursive {
            let children: Vec<NodeId> = self.get(id)?.children.to_vec();
            for child in children {
                let child_copy = self.copy(child, true)?;
                let copy_record = self.get_mut(copy_id)?;
                copy_record.children.push(child_copy);
                self.get_mut(child_copy)?.parent = Some(copy_id);
            }
        }
        Ok(copy_id)
    }

    /// Pre-order depth-first walk with visitor-driven control flow.
    ///
    /// Children are visited left to right. The visitor decides per node
    /// whether to descend, skip the subtree, or halt the entire walk.
    pub fn walk<F>(&self, start: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(NodeId, &NodeRecord) -> WalkAction,
    {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let record = self.get(id)?;
            match visit(id, record) {
                WalkAction::Stop => return Ok(()),
                WalkAction::SkipChildren => continue,
                WalkAction::Continue => {
                    // Reverse push so children pop in document order.
                    for &child in record.children.iter().rev() {
                        stack.push(child);
                    }
                }
            }
        }
        Ok(())
    }
}

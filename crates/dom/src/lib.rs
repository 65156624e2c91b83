//! Mutable XML/HTML tree with lazily computed, auto-invalidated views
//!
//! A DOM-style API over parsed markup: navigate, query by id/class/tag,
//! mutate structure and content, serialize back out.
//!
//! ## Core design
//!
//! - **Arena storage**: one [`Document`] owns every node; code works with
//!   [`NodeId`] indices, never pointers. Freed slots bump a generation,
//!   so a stale id is a typed error, not a dangling reference.
//! - **Lazy derived views**: `string_value` (subtree text) and
//!   `raw_markup` (serialized subtree) are memoized per node and cleared
//!   on the mutated node plus every strict ancestor, never on siblings.
//!   A cached value always equals what recomputation would return.
//! - **Capability, not hierarchy**: elements are a runtime check on the
//!   node's data variant; element operations fail with `NotAnElement`
//!   elsewhere.
//!
//! ```text
//! bytes → parse → Document (arena) → NodeId handles → query/mutate → markup
//! ```
//!
//! ```
//! use markdom::{Dialect, Document};
//!
//! let mut doc = Document::parse_str("<div id=\"x\"><p>hi</p></div>", Dialect::Html)?;
//! let root = doc.root().unwrap();
//! let div = doc.element_by_id(root, "x")?.unwrap();
//! let p = doc.elements_by_tag(div, "p")?[0];
//! doc.set_text(p, "bye")?;
//! assert_eq!(doc.raw_markup(div)?, "<div id=\"x\"><p>bye</p></div>");
//! # Ok::<(), markdom::DomError>(())
//! ```

pub mod arena;
pub mod document;
pub mod error;
pub mod types;

mod element;
mod parser;
mod query;
mod serializer;

pub use arena::{NodeArena, WalkAction};
pub use document::Document;
pub use error::{DomError, Result};
pub use types::{Attribute, Dialect, ElementData, NodeData, NodeId, NodeType};

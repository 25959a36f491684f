//! Read-only screenplay document model
//!
//! The host owns the real document; this module is the typed tree it hands to
//! a reflow pass. Nodes are flattened once into document order with absolute
//! positions so the collector can walk them without recursion.
//!
//! Positions count UTF-16 code units, the unit the host editor addresses text
//! in, so decorations land on the same characters on both sides of the bridge.

mod block;

pub use block::{BlockId, BlockKind};

use crate::error::ReflowError;
use serde::Deserialize;
use std::ops::Range;

/// A node of the host document tree
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Node {
    pub id: BlockId,
    /// Schema type name as the host spells it
    #[serde(rename = "type")]
    pub type_name: String,
    /// Inline text content
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    /// Create a leaf node with an arbitrary type name
    pub fn new(id: u64, type_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: BlockId(id),
            type_name: type_name.into(),
            text: text.into(),
            children: Vec::new(),
        }
    }

    /// Create a leaf node for a screenplay block
    pub fn block(id: u64, kind: BlockKind, text: impl Into<String>) -> Self {
        Self::new(id, kind.type_name(), text)
    }

    /// Create a container node (page wrapper, section, ...)
    pub fn container(id: u64, type_name: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            id: BlockId(id),
            type_name: type_name.into(),
            text: String::new(),
            children,
        }
    }
}

/// One node in document order
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
    pub id: BlockId,
    /// Recognized screenplay kind, `None` for containers and foreign nodes
    pub kind: Option<BlockKind>,
    pub type_name: String,
    pub text: String,
    /// Absolute positions covered by the node
    pub range: Range<usize>,
}

/// Flattened, immutable document snapshot
#[derive(Debug, Clone, Default)]
pub struct Document {
    entries: Vec<NodeEntry>,
    /// Total addressable length
    len: usize,
    /// Host document version this snapshot was taken from
    version: u64,
}

impl Document {
    /// Build a snapshot from the host's root nodes
    pub fn new(roots: Vec<Node>) -> Self {
        let mut entries = Vec::new();
        let mut offset = 0;
        for root in &roots {
            flatten(root, &mut offset, &mut entries);
        }

        Self {
            entries,
            len: offset.saturating_sub(1),
            version: 0,
        }
    }

    /// Build a flat document from `(kind, text)` pairs; ids are assigned from 1
    pub fn from_blocks<'a>(blocks: impl IntoIterator<Item = (BlockKind, &'a str)>) -> Self {
        let roots = blocks
            .into_iter()
            .enumerate()
            .map(|(idx, (kind, text))| Node::block(idx as u64 + 1, kind, text))
            .collect();
        Self::new(roots)
    }

    /// Parse a JSON array of root nodes: `[{"id", "type", "text", "children"}]`
    pub fn from_json(json: &str) -> Result<Self, ReflowError> {
        let roots: Vec<Node> = serde_json::from_str(json).map_err(ReflowError::InvalidDocument)?;
        Ok(Self::new(roots))
    }

    /// Tag the snapshot with the host document version
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// All nodes in document order (pre-order)
    pub fn entries(&self) -> &[NodeEntry] {
        &self.entries
    }

    /// Look up a node by id
    pub fn entry(&self, id: BlockId) -> Option<&NodeEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pre-order flatten. Text comes first, then children; each text-bearing node
/// is followed by one separator position.
fn flatten(node: &Node, offset: &mut usize, out: &mut Vec<NodeEntry>) {
    let start = *offset;
    let slot = out.len();
    out.push(NodeEntry {
        id: node.id,
        kind: BlockKind::from_type_name(&node.type_name),
        type_name: node.type_name.clone(),
        text: node.text.clone(),
        range: start..start,
    });

    let text_len = utf16_len(&node.text);
    let leaf = node.children.is_empty();
    if leaf || !node.text.is_empty() {
        *offset += text_len + 1;
    }
    let text_end = start + text_len;

    for child in &node.children {
        flatten(child, offset, out);
    }

    let end = if leaf {
        text_end
    } else {
        offset.saturating_sub(1).max(text_end)
    };
    out[slot].range = start..end;
}

/// Length of `text` in document positions (UTF-16 code units)
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

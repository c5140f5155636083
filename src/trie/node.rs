//! Pattern nodes: a closed set of byte-matching primitives stored in an arena.
//!
//! Nodes never own each other directly. The [`Trie`](super::Trie) keeps every
//! node in a `Vec` and links are [`NodeId`] indices, which lets a
//! [`NodeKind::Repetition`] refer back to the node it repeats without forming
//! an ownership cycle.

use std::collections::BTreeSet;

/// Byte reserved for end-of-pattern markers.
pub const END_BYTE: u8 = 0;

/// A literal carrying this byte also accepts `{`.
pub const PLACEHOLDER_BYTE: u8 = b'~';

/// Level returned by [`NodeKind`] comparisons that can never be selected.
pub const NO_MATCH_LEVEL: u32 = 99;

/// Maximum number of nested repetitions followed when resolving a match.
pub const MAX_REPEAT_DEPTH: usize = 8;

/// Index of a node inside its trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The matching rule a node applies to one input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The root of a trie. Never matches.
    Root,
    /// Synthetic end-of-pattern marker. Matches only [`END_BYTE`].
    End,
    /// Matches one exact byte.
    Literal(u8),
    /// Matches any byte.
    Wildcard,
    /// Matches any byte in `min..=max`.
    Range { min: u8, max: u8 },
    /// Matches whatever `inner` matches, and may follow itself.
    Repetition { inner: NodeId },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::End => "end",
            NodeKind::Literal(_) => "literal",
            NodeKind::Wildcard => "wildcard",
            NodeKind::Range { .. } => "range",
            NodeKind::Repetition { .. } => "repetition",
        }
    }

    /// The byte written for this node in persisted form and in recovered
    /// patterns.
    pub fn data(&self) -> u8 {
        match self {
            NodeKind::Literal(byte) => *byte,
            _ => END_BYTE,
        }
    }

    /// Whether the node carries a distinguishing data byte.
    pub fn has_data(&self) -> bool {
        matches!(self, NodeKind::Literal(_))
    }

    /// Leaf-only primitives refuse children.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            NodeKind::Wildcard | NodeKind::Range { .. } | NodeKind::Repetition { .. }
        )
    }

    /// Whether a literal child of this kind already stands for `byte` when a
    /// pattern is being inserted.
    pub(crate) fn is_literal_key(&self, byte: u8) -> bool {
        match self {
            NodeKind::Literal(data) => literal_matches(*data, byte),
            _ => false,
        }
    }
}

fn literal_matches(data: u8, byte: u8) -> bool {
    if byte == END_BYTE || data == END_BYTE {
        return false;
    }
    if data == PLACEHOLDER_BYTE {
        return byte == b'{' || byte == PLACEHOLDER_BYTE;
    }
    data == byte
}

pub(crate) fn literal_level(data: u8, byte: u8) -> u32 {
    if byte == END_BYTE || data == END_BYTE {
        return NO_MATCH_LEVEL;
    }
    if data == PLACEHOLDER_BYTE {
        return if byte == b'{' || byte == PLACEHOLDER_BYTE {
            0
        } else {
            2
        };
    }
    u32::from(data.abs_diff(byte))
}

/// A single trie node.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    /// `-1` for the root, `0` for interior nodes, the fixed id otherwise.
    pub(crate) id: i32,
    pub(crate) id_set: BTreeSet<i32>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn root() -> Self {
        Self {
            kind: NodeKind::Root,
            id: -1,
            id_set: BTreeSet::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn literal(byte: u8, id: i32) -> Self {
        Self {
            kind: NodeKind::Literal(byte),
            id: 0,
            id_set: BTreeSet::from([id]),
            children: Vec::new(),
        }
    }

    /// End markers and primitives hold their id both as `id` and in `id_set`
    /// so that an id of `0` still resolves.
    pub(crate) fn fixed(kind: NodeKind, id: i32) -> Self {
        Self {
            kind,
            id,
            id_set: BTreeSet::from([id]),
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn id_set(&self) -> &BTreeSet<i32> {
        &self.id_set
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether this node is a bare end marker.
    pub fn is_end(&self) -> bool {
        self.kind == NodeKind::End
    }

    /// Whether `id` is associated with this node.
    pub fn has_id(&self, id: i32) -> bool {
        self.id_set.contains(&id)
    }

    /// Merge `id` into this node, returning whether it was new.
    pub(crate) fn combine(&mut self, id: i32) -> bool {
        self.id_set.insert(id)
    }
}

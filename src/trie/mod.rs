//! Multi-pattern byte trie.
//!
//! A [`Trie`] owns an arena of [`Node`]s rooted at [`NodeId::ROOT`]. Patterns
//! are inserted byte by byte; the node reached by the last byte gains an end
//! marker carrying the pattern's replacement id.
//!
//! Matching runs in one of two [`MatchMode`]s. Freshly built tries match
//! exactly. A trie restored from its persisted form matches fuzzily: a child
//! whose byte is one step away from the input is accepted when no child
//! matches exactly, and whole-string lookups fall back to the nearest stored
//! pattern within an edit-distance budget.

pub mod codec;
pub mod errors;
pub mod node;
pub mod rules;

pub use errors::TrieError;
pub use node::{Node, NodeId, NodeKind};
pub use rules::{Rule, RuleError};

use crate::distance;
use node::{MAX_REPEAT_DEPTH, NO_MATCH_LEVEL};

/// Children at or above this level are never selected in fuzzy mode.
const FUZZY_LEVEL_LIMIT: u32 = 2;

/// Default edit-distance budget for fuzzy whole-string lookups.
pub const DEFAULT_MAX_EDITS: usize = 1;

/// How child nodes are selected for an input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// First child whose rule accepts the byte.
    #[default]
    Exact,
    /// An exact hit if there is one, else the nearest child within one step.
    Fuzzy,
}

#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<Node>,
    mode: MatchMode,
    max_edits: usize,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    /// Create an empty trie in exact mode.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::root()],
            mode: MatchMode::Exact,
            max_edits: DEFAULT_MAX_EDITS,
        }
    }

    /// Build a trie from `(pattern, ids)` entries.
    ///
    /// Every byte of a pattern is tagged with the pattern's representative
    /// id (its smallest), which also marks the pattern's end.
    pub fn build<'a, I, S>(entries: I) -> Result<Self, TrieError>
    where
        I: IntoIterator<Item = (&'a [u8], S)>,
        S: IntoIterator<Item = &'a i32>,
    {
        let mut trie = Self::new();
        for (pattern, ids) in entries {
            if let Some(&id) = ids.into_iter().min() {
                trie.insert(pattern, id)?;
            }
        }
        tracing::debug!(nodes = trie.len(), "built pattern trie");
        Ok(trie)
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    #[must_use]
    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_edits(&self) -> usize {
        self.max_edits
    }

    pub fn set_max_edits(&mut self, max_edits: usize) {
        self.max_edits = max_edits;
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Number of nodes, including the root and detached repetition targets.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no pattern has been inserted.
    pub fn is_empty(&self) -> bool {
        self.node(NodeId::ROOT).children.is_empty()
    }

    /// Number of branches leaving `id`.
    pub fn breadth(&self, id: NodeId) -> usize {
        self.node(id).children.len()
    }

    /// Length of the longest path below the root.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(NodeId::ROOT, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            for &child in &self.node(id).children {
                stack.push((child, depth + 1));
            }
        }
        deepest
    }

    pub(crate) fn from_parts(nodes: Vec<Node>, mode: MatchMode) -> Self {
        Self {
            nodes,
            mode,
            max_edits: DEFAULT_MAX_EDITS,
        }
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn link(&mut self, parent: NodeId, node: Node) -> NodeId {
        let child = self.push(node);
        self.nodes[parent.index()].children.push(child);
        child
    }

    fn check_extensible(&self, parent: NodeId, id: i32) -> Result<(), TrieError> {
        if id < 0 {
            return Err(TrieError::ContractViolation {
                message: format!("replacement ids must be non-negative, got {id}"),
            });
        }
        let kind = self.node(parent).kind;
        if kind == NodeKind::End {
            return Err(TrieError::ContractViolation {
                message: "cannot link off of terminals".to_string(),
            });
        }
        if kind.is_primitive() {
            return Err(TrieError::Unsupported { kind: kind.name() });
        }
        Ok(())
    }

    /// Extend `parent` with `byte` for pattern `id`.
    ///
    /// Reuses a literal child that already stands for `byte`, merging `id`
    /// into it. Returns the child and whether `id` was new to it.
    pub fn add(&mut self, parent: NodeId, byte: u8, id: i32) -> Result<(NodeId, bool), TrieError> {
        self.check_extensible(parent, id)?;
        if byte == node::END_BYTE {
            return Err(TrieError::ContractViolation {
                message: "byte 0 is reserved for end markers".to_string(),
            });
        }

        let existing = self
            .node(parent)
            .children
            .iter()
            .copied()
            .find(|&child| self.node(child).kind.is_literal_key(byte));

        match existing {
            Some(child) => {
                let added = self.nodes[child.index()].combine(id);
                Ok((child, added))
            }
            None => Ok((self.link(parent, Node::literal(byte, id)), true)),
        }
    }

    /// Mark `node` as the end of pattern `id`.
    ///
    /// No-op on the root and on nodes that are already terminal.
    pub fn end(&mut self, node: NodeId, id: i32) -> Result<(), TrieError> {
        if id < 0 {
            return Err(TrieError::ContractViolation {
                message: format!("replacement ids must be non-negative, got {id}"),
            });
        }
        if self.is_terminal(node) || self.node(node).id < 0 {
            return Ok(());
        }
        self.link(node, Node::fixed(NodeKind::End, id));
        Ok(())
    }

    /// Insert a literal pattern, returning the node its last byte reached.
    pub fn insert(&mut self, pattern: &[u8], id: i32) -> Result<NodeId, TrieError> {
        let mut current = NodeId::ROOT;
        for &byte in pattern {
            current = self.add(current, byte, id)?.0;
        }
        self.end(current, id)?;
        Ok(current)
    }

    /// Insert a rule sequence. Only the final rule may be a matching
    /// primitive; a primitive becomes a terminal leaf carrying `id`.
    pub fn insert_rules(&mut self, rules: &[Rule], id: i32) -> Result<NodeId, TrieError> {
        rules::validate(rules)?;
        let mut current = NodeId::ROOT;
        for rule in rules {
            current = self.add_rule(current, rule, id)?;
        }
        self.end(current, id)?;
        Ok(current)
    }

    /// Extend `parent` with one rule.
    pub fn add_rule(&mut self, parent: NodeId, rule: &Rule, id: i32) -> Result<NodeId, TrieError> {
        if let Rule::Literal(byte) = rule {
            return Ok(self.add(parent, *byte, id)?.0);
        }
        self.check_extensible(parent, id)?;

        let existing = self
            .node(parent)
            .children
            .iter()
            .copied()
            .find(|&child| self.is_equivalent(self.node(child).kind, rule, 0));
        if let Some(child) = existing {
            self.nodes[child.index()].combine(id);
            return Ok(child);
        }

        let kind = self.primitive_kind(rule, id, 0)?;
        Ok(self.link(parent, Node::fixed(kind, id)))
    }

    /// Resolve a non-literal rule to a node kind, allocating detached
    /// targets for repetitions.
    fn primitive_kind(&mut self, rule: &Rule, id: i32, depth: usize) -> Result<NodeKind, TrieError> {
        if depth > MAX_REPEAT_DEPTH {
            return Err(TrieError::ContractViolation {
                message: format!("repetitions nest deeper than {MAX_REPEAT_DEPTH}"),
            });
        }
        Ok(match rule {
            Rule::Literal(byte) => NodeKind::Literal(*byte),
            Rule::Any => NodeKind::Wildcard,
            Rule::Range { min, max } => NodeKind::Range {
                min: *min,
                max: *max,
            },
            Rule::Repeat(inner) => {
                let kind = self.primitive_kind(inner, id, depth + 1)?;
                let target = self.push(Node::fixed(kind, id));
                NodeKind::Repetition { inner: target }
            }
        })
    }

    fn is_equivalent(&self, kind: NodeKind, rule: &Rule, depth: usize) -> bool {
        match (kind, rule) {
            (NodeKind::Literal(a), Rule::Literal(b)) => a == *b,
            (NodeKind::Wildcard, Rule::Any) => true,
            (NodeKind::Range { min, max }, Rule::Range { min: lo, max: hi }) => {
                min == *lo && max == *hi
            }
            (NodeKind::Repetition { inner }, Rule::Repeat(rule)) if depth < MAX_REPEAT_DEPTH => {
                self.is_equivalent(self.node(inner).kind, rule, depth + 1)
            }
            _ => false,
        }
    }

    /// Whether a match may end at `id`.
    pub fn is_terminal(&self, id: NodeId) -> bool {
        let node = self.node(id);
        node.id > -1
            && (!node.kind.has_data()
                || node.id > 0
                || node.children.iter().any(|&child| self.node(child).is_end()))
    }

    /// The replacement id resolved at a terminal node.
    ///
    /// End markers and primitive leaves resolve to their single id whatever
    /// its value; a primitive shared by several rule sequences is ambiguous.
    /// A literal resolves to its own id when positive, the sole member of its
    /// id set, then the first end marker below it.
    pub fn value(&self, id: NodeId) -> Result<i32, TrieError> {
        if !self.is_terminal(id) {
            return Err(TrieError::NoTerminalValue);
        }
        let node = self.node(id);
        if !node.kind.has_data() {
            let mut ids = node.id_set.iter().copied();
            return match (ids.next(), ids.next()) {
                (None, _) => Ok(node.id),
                (Some(only), None) => Ok(only),
                (Some(_), Some(_)) => Err(TrieError::AmbiguousTerminal {
                    ids: node.id_set.iter().copied().collect(),
                }),
            };
        }
        if node.id > 0 {
            return Ok(node.id);
        }
        if node.id_set.len() == 1 {
            if let Some(&only) = node.id_set.iter().next() {
                return Ok(only);
            }
        }
        if let Some(&end) = node.children.iter().find(|&&child| self.node(child).is_end()) {
            return self.value(end);
        }
        if node.id_set.is_empty() {
            return Err(TrieError::NoTerminalValue);
        }
        Err(TrieError::AmbiguousTerminal {
            ids: node.id_set.iter().copied().collect(),
        })
    }

    /// Whether `node` accepts `byte` under exact matching.
    pub fn is_match(&self, node: NodeId, byte: u8) -> bool {
        self.match_level(node, byte, 0) == 0
    }

    fn match_level(&self, node: NodeId, byte: u8, depth: usize) -> u32 {
        match self.node(node).kind {
            NodeKind::Root => NO_MATCH_LEVEL,
            NodeKind::End => {
                if byte == node::END_BYTE {
                    0
                } else {
                    NO_MATCH_LEVEL
                }
            }
            _ if byte == node::END_BYTE => NO_MATCH_LEVEL,
            NodeKind::Literal(data) => node::literal_level(data, byte),
            NodeKind::Wildcard => 0,
            NodeKind::Range { min, max } => {
                if byte < min {
                    u32::from(min - byte)
                } else if byte > max {
                    u32::from(byte - max)
                } else {
                    0
                }
            }
            NodeKind::Repetition { inner } => {
                if depth >= MAX_REPEAT_DEPTH {
                    NO_MATCH_LEVEL
                } else {
                    self.match_level(inner, byte, depth + 1)
                }
            }
        }
    }

    /// Candidates reachable from `node`: a repetition may follow itself
    /// before any of its children.
    fn candidates(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let this = self.node(node);
        let looped = matches!(this.kind, NodeKind::Repetition { .. }).then_some(node);
        looped.into_iter().chain(this.children.iter().copied())
    }

    /// Select the child of `node` that `byte` leads to.
    pub fn get_match(&self, node: NodeId, byte: u8) -> Option<NodeId> {
        match self.mode {
            MatchMode::Exact => self.candidates(node).find(|&child| self.is_match(child, byte)),
            MatchMode::Fuzzy => {
                let mut best = None;
                let mut lowest = FUZZY_LEVEL_LIMIT;
                for child in self.candidates(node) {
                    let level = self.match_level(child, byte, 0);
                    if level == 0 {
                        return Some(child);
                    }
                    if level < lowest {
                        lowest = level;
                        best = Some(child);
                    }
                }
                best
            }
        }
    }

    /// Select the first child of `node` associated with replacement `id`.
    pub fn get_match_id(&self, node: NodeId, id: i32) -> Option<NodeId> {
        self.node(node)
            .children
            .iter()
            .copied()
            .find(|&child| self.node(child).has_id(id))
    }

    fn walk(&self, text: &[u8]) -> Option<NodeId> {
        let mut current = NodeId::ROOT;
        for &byte in text {
            current = self.get_match(current, byte)?;
        }
        Some(current)
    }

    /// Resolve a whole string to its replacement id.
    ///
    /// Succeeds only when every byte matches and the final node is terminal.
    /// In fuzzy mode a failed walk falls back to the nearest stored pattern
    /// within [`Trie::max_edits`].
    pub fn localize(&self, text: &[u8]) -> Option<i32> {
        if text.is_empty() {
            return None;
        }
        let walked = self
            .walk(text)
            .filter(|&node| self.is_terminal(node))
            .and_then(|node| self.value(node).ok());

        match (walked, self.mode) {
            (Some(id), _) => Some(id),
            (None, MatchMode::Exact) => None,
            (None, MatchMode::Fuzzy) => self.nearest(text),
        }
    }

    /// Whether `text` matches a complete pattern.
    pub fn contains(&self, text: &[u8]) -> bool {
        !text.is_empty()
            && self
                .walk(text)
                .is_some_and(|node| self.is_terminal(node))
    }

    fn nearest(&self, text: &[u8]) -> Option<i32> {
        let wanted = String::from_utf8_lossy(text);
        self.patterns()
            .into_iter()
            .filter_map(|(pattern, id)| {
                let distance = distance::measure(&wanted, &String::from_utf8_lossy(&pattern));
                (distance <= self.max_edits).then_some((distance, id))
            })
            .min_by_key(|&(distance, _)| distance)
            .map(|(_, id)| id)
    }

    /// Recover the pattern bytes that lead to replacement `id`.
    ///
    /// Follows the first child tagged with `id` at every step until a
    /// terminal node resolving to `id` is reached.
    pub fn find_id(&self, id: i32) -> Result<Vec<u8>, TrieError> {
        let mut pattern = Vec::new();
        let mut current = self
            .get_match_id(NodeId::ROOT, id)
            .ok_or_else(|| TrieError::TreeInconsistency {
                id,
                fragment: String::new(),
            })?;

        for _ in 0..self.nodes.len() {
            let node = self.node(current);
            if !node.is_end() {
                pattern.push(self.representative_byte(current));
            }
            if self.is_terminal(current) && self.value(current).ok() == Some(id) {
                return Ok(pattern);
            }
            current = self
                .get_match_id(current, id)
                .ok_or_else(|| TrieError::TreeInconsistency {
                    id,
                    fragment: String::from_utf8_lossy(&pattern).into_owned(),
                })?;
        }

        Err(TrieError::TreeInconsistency {
            id,
            fragment: String::from_utf8_lossy(&pattern).into_owned(),
        })
    }

    /// A byte the node at `id` accepts, used when spelling out patterns.
    fn representative_byte(&self, id: NodeId) -> u8 {
        let mut kind = self.node(id).kind;
        for _ in 0..MAX_REPEAT_DEPTH {
            match kind {
                NodeKind::Literal(byte) => return byte,
                NodeKind::Wildcard => return b'.',
                NodeKind::Range { min, .. } => return min,
                NodeKind::Repetition { inner } => kind = self.node(inner).kind,
                NodeKind::Root | NodeKind::End => return node::END_BYTE,
            }
        }
        node::END_BYTE
    }

    /// Every terminal path below the root with its resolved id, depth first.
    pub fn patterns(&self) -> Vec<(Vec<u8>, i32)> {
        let mut found = Vec::new();
        let mut stack = vec![(NodeId::ROOT, Vec::new())];

        while let Some((id, prefix)) = stack.pop() {
            if id != NodeId::ROOT && self.is_terminal(id) && !self.node(id).is_end() {
                if let Ok(value) = self.value(id) {
                    found.push((prefix.clone(), value));
                }
            }
            for &child in self.node(id).children.iter().rev() {
                if self.node(child).is_end() {
                    continue;
                }
                let mut next = prefix.clone();
                next.push(self.representative_byte(child));
                stack.push((child, next));
            }
        }

        found
    }
}

//! expansion of reference blocks
//!
//! A reference block points to content stored elsewhere. It is replaced in place by the parsed blocks of that
//! content, which makes every expansion an independent copy. Stored content can reference itself (directly or
//! through other content), so expansion tracks the references it is currently inside of and stops at
//! [DEFAULT_MAX_DEPTH] nested expansions. Content referencing the same block many times multiplies with every
//! level, so all expansions of one resolve share a budget of [DEFAULT_MAX_EXPANDED_NODES] blocks.
use crate::block::{BlockNode, REFERENCE_ATTR};
use crate::parse::parse;
use crate::store::ContentStore;

pub const DEFAULT_MAX_DEPTH: usize = 16;
pub const DEFAULT_MAX_EXPANDED_NODES: usize = 10_000;

pub struct ReferenceResolver<'s> {
    store: &'s dyn ContentStore,
    max_depth: usize,
    max_expanded_nodes: usize,
}

/// State of one resolve
struct Expansion {
    /// references being expanded around the current nodes
    path: Vec<String>,
    /// blocks that may still be added by expansions
    budget: usize,
}

impl<'s> ReferenceResolver<'s> {
    pub fn new(store: &'s dyn ContentStore) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
            max_expanded_nodes: DEFAULT_MAX_EXPANDED_NODES,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_expanded_nodes(mut self, max_expanded_nodes: usize) -> Self {
        self.max_expanded_nodes = max_expanded_nodes;
        self
    }

    /// Replace all reference blocks with the blocks they point to
    ///
    /// References that can't be resolved are dropped.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn resolve(&self, nodes: Vec<BlockNode>) -> Vec<BlockNode> {
        let mut expansion = Expansion {
            path: vec![],
            budget: self.max_expanded_nodes,
        };
        self.resolve_within(nodes, &mut expansion)
    }

    fn resolve_within(&self, nodes: Vec<BlockNode>, expansion: &mut Expansion) -> Vec<BlockNode> {
        let mut resolved = Vec::with_capacity(nodes.len());

        for mut node in nodes {
            if node.is_reference() {
                resolved.extend(self.expand(&node, expansion));
                continue;
            }

            if let Some(children) = node.children_mut() {
                let taken = std::mem::take(children);
                *children = self.resolve_within(taken, expansion);
            }

            resolved.push(node);
        }

        resolved
    }

    fn expand(&self, node: &BlockNode, expansion: &mut Expansion) -> Vec<BlockNode> {
        let Some(reference) = reference_id(node) else {
            tracing::warn!(attributes = ?node.attributes, "reference block without reference, dropping it");
            return vec![];
        };

        if expansion.path.contains(&reference) {
            tracing::warn!(%reference, path = ?expansion.path, "reference loop detected, dropping reference");
            return vec![];
        }

        if expansion.path.len() >= self.max_depth {
            tracing::warn!(
                %reference,
                depth = expansion.path.len(),
                "references nested too deep, dropping reference"
            );
            return vec![];
        }

        let Some(stored) = self.store.referenced_content(&reference) else {
            tracing::debug!(%reference, "referenced content not found, dropping reference");
            return vec![];
        };

        let nodes = parse(&stored.content);
        let size = count_nodes(&nodes);
        if size > expansion.budget {
            tracing::warn!(
                %reference,
                size,
                budget = expansion.budget,
                "references expand to too many blocks, dropping reference"
            );
            return vec![];
        }
        expansion.budget -= size;

        tracing::trace!(%reference, size, "expanding reference");
        expansion.path.push(reference);
        let expanded = self.resolve_within(nodes, expansion);
        expansion.path.pop();

        expanded
    }
}

fn count_nodes(nodes: &[BlockNode]) -> usize {
    nodes
        .iter()
        .map(|node| 1 + count_nodes(node.children()))
        .sum()
}

/// The pointer of a reference block, numbers and non-empty strings are accepted
pub fn reference_id(node: &BlockNode) -> Option<String> {
    match node.attr(REFERENCE_ATTR)? {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

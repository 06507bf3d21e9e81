use super::Visit;
use crate::block::BlockNode;

/// Depth-first visit of every node without children, in tree order
///
/// Containers are walked into but never visited themselves.
pub trait VisitLeaves {
    fn visit_leaves(&self, visitor: &mut dyn Visit<BlockNode>);
}

impl VisitLeaves for [BlockNode] {
    fn visit_leaves(&self, visitor: &mut dyn Visit<BlockNode>) {
        for node in self {
            node.visit_leaves(visitor);
        }
    }
}

impl VisitLeaves for BlockNode {
    fn visit_leaves(&self, visitor: &mut dyn Visit<BlockNode>) {
        if self.has_children() {
            self.children().visit_leaves(visitor);
        } else {
            visitor.visit(self);
        }
    }
}

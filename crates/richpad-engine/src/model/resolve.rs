use crate::model::node::Node;
use crate::model::PositionError;

/// A position resolved against a concrete document revision: the chain of
/// ancestor nodes it sits in, the child index at every depth, and the
/// offset into the innermost parent.
///
/// Resolved positions hold cheap clones (shared subtrees) and are only
/// meaningful for the document they were resolved against; across edits a
/// raw position must be remapped and re-resolved.
#[derive(Debug, Clone)]
pub struct ResolvedPos {
    pub pos: usize,
    /// One entry per depth: (node, child index, absolute position before
    /// the child at that index).
    path: Vec<(Node, usize, usize)>,
    pub parent_offset: usize,
}

impl ResolvedPos {
    pub fn resolve(doc: &Node, pos: usize) -> Result<ResolvedPos, PositionError> {
        if pos > doc.content_size() {
            return Err(PositionError::OutOfRange {
                pos,
                size: doc.content_size(),
            });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();
        loop {
            let (index, offset) = node.content().find_index(parent_offset);
            let rem = parent_offset - offset;
            path.push((node.clone(), index, start + offset));
            if rem == 0 {
                break;
            }
            let child = node.child(index).clone();
            if child.is_text() {
                break;
            }
            node = child;
            parent_offset = rem - 1;
            start += offset + 1;
        }
        Ok(ResolvedPos {
            pos,
            path,
            parent_offset,
        })
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].0
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].1
    }

    /// The innermost node containing this position.
    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    /// Absolute position where the content of the node at `depth` starts.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].2 + 1
        }
    }

    /// Absolute position where the content of the node at `depth` ends.
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Absolute position directly before the node at `depth` (> 0).
    pub fn before(&self, depth: usize) -> usize {
        debug_assert!(depth > 0, "there is no position before the root");
        self.path[depth - 1].2
    }

    /// Absolute position directly after the node at `depth` (> 0).
    pub fn after(&self, depth: usize) -> usize {
        self.before(depth) + self.node(depth).node_size()
    }

    /// Offset into the text node the position points into, 0 when it sits
    /// on a node boundary.
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.path.len() - 1].2
    }

    /// The node directly after the position, cut when the position points
    /// into a text run.
    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let child = parent.content().maybe_child(index)?;
        let off = self.text_offset();
        if off > 0 {
            Some(child.cut_text(off, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    /// The node directly before the position.
    pub fn node_before(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let off = self.text_offset();
        if off > 0 {
            return Some(parent.child(index).cut_text(0, off));
        }
        if index == 0 {
            return None;
        }
        Some(parent.child(index - 1).clone())
    }

    /// The deepest depth at which this position and `pos` fall inside the
    /// same node.
    pub fn shared_depth(&self, pos: usize) -> usize {
        for depth in (1..=self.depth()).rev() {
            if self.start(depth) <= pos && self.end(depth) >= pos {
                return depth;
            }
        }
        0
    }

    /// Walk outward until a node of the wanted kind is found; returns its
    /// depth.
    pub fn ancestor_of_kind(&self, kind: crate::schema::NodeKind) -> Option<usize> {
        (0..=self.depth()).rev().find(|&d| self.node(d).kind() == kind)
    }
}

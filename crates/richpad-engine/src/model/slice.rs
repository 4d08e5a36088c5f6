use serde::{Deserialize, Serialize};

use crate::model::node::{Fragment, Node};
use crate::model::resolve::ResolvedPos;
use crate::model::PositionError;

/// A piece of document content between two positions.
///
/// The ends may be "open": `open_start`/`open_end` count how many container
/// boundaries at each end were cut through rather than included whole. An
/// open container contributes its children but expects to be merged into a
/// compatible node on reinsertion instead of standing on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub content: Fragment,
    pub open_start: usize,
    pub open_end: usize,
}

impl Slice {
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Slice {
        Slice {
            content,
            open_start,
            open_end,
        }
    }

    /// A fully closed slice.
    pub fn flat(content: Fragment) -> Slice {
        Slice::new(content, 0, 0)
    }

    pub fn empty() -> Slice {
        Slice::flat(Fragment::empty())
    }

    /// Number of position units the slice occupies once inserted: open
    /// boundaries merge away and do not count.
    pub fn size(&self) -> usize {
        self.content.size() - self.open_start - self.open_end
    }
}

impl Node {
    /// Cut the content between two positions into a [`Slice`], recording
    /// how deeply each end cuts into the tree.
    pub fn slice_between(&self, from: usize, to: usize) -> Result<Slice, PositionError> {
        debug_assert!(from <= to);
        let rfrom = ResolvedPos::resolve(self, from)?;
        let rto = ResolvedPos::resolve(self, to)?;
        let depth = rfrom.shared_depth(to);
        let start = rfrom.start(depth);
        let node = rfrom.node(depth);
        let content = node.content().cut(from - start, to - start);
        Ok(Slice::new(
            content,
            rfrom.depth() - depth,
            rto.depth() - depth,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeKind;

    #[test]
    fn test_flat_slice_of_whole_blocks() {
        let doc = Node::doc(vec![
            Node::paragraph_text("ab"),
            Node::paragraph_text("cd"),
        ]);
        let slice = doc.slice_between(0, 8).unwrap();
        assert_eq!(slice.open_start, 0);
        assert_eq!(slice.open_end, 0);
        assert_eq!(slice.content.len(), 2);
        assert_eq!(slice.size(), 8);
    }

    #[test]
    fn test_open_slice_across_paragraphs() {
        let doc = Node::doc(vec![
            Node::paragraph_text("ab"),
            Node::paragraph_text("cd"),
        ]);
        // from inside the first paragraph to inside the second
        let slice = doc.slice_between(2, 6).unwrap();
        assert_eq!(slice.open_start, 1);
        assert_eq!(slice.open_end, 1);
        assert_eq!(slice.content.len(), 2);
        assert_eq!(slice.content.child(0).text_content(), "b");
        assert_eq!(slice.content.child(1).text_content(), "c");
        assert_eq!(slice.size(), 4);
    }

    #[test]
    fn test_slice_within_one_text_run() {
        let doc = Node::doc(vec![Node::paragraph_text("hello")]);
        let slice = doc.slice_between(2, 4).unwrap();
        assert_eq!(slice.open_start, 0);
        assert_eq!(slice.open_end, 0);
        assert_eq!(slice.content.child(0).text_str(), "ll");
        assert_eq!(slice.size(), 2);
    }

    #[test]
    fn test_slice_out_of_table() {
        let doc = Node::doc(vec![Node::table(vec![Node::table_row(vec![
            Node::table_cell(vec![Node::paragraph_text("x")]),
        ])])]);
        // from inside the cell paragraph to after the table
        let slice = doc.slice_between(5, 9).unwrap();
        assert_eq!(slice.open_start, 4);
        assert_eq!(slice.open_end, 0);
        assert_eq!(slice.content.child(0).kind(), NodeKind::Table);
    }
}

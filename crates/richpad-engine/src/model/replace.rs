//! Slice replacement: delete a range and splice new content in, keeping
//! every node's content expression satisfied.
//!
//! The algorithm walks the from/to ancestor chains in lockstep. Open slice
//! ends are joined onto the matching ancestor when their content is
//! compatible; anything that cannot be joined is a hard error, which the
//! transaction layer turns into an atomic rejection.

use crate::model::node::{Fragment, Node};
use crate::model::resolve::ResolvedPos;
use crate::model::slice::Slice;
use crate::model::{PositionError, ReplaceError};

impl Node {
    /// Replace `[from, to)` with a slice, producing a new document root.
    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node, ReplaceError> {
        if to < from {
            return Err(PositionError::OutOfRange {
                pos: to,
                size: self.content_size(),
            }
            .into());
        }
        let rfrom = ResolvedPos::resolve(self, from)?;
        let rto = ResolvedPos::resolve(self, to)?;
        if slice.open_start > rfrom.depth() {
            return Err(ReplaceError::InsertTooDeep);
        }
        if rfrom.depth() - slice.open_start != rto.depth() - slice.open_end {
            return Err(ReplaceError::InconsistentOpenDepths);
        }
        replace_outer(&rfrom, &rto, slice, 0)
    }
}

fn replace_outer(
    rfrom: &ResolvedPos,
    rto: &ResolvedPos,
    slice: &Slice,
    depth: usize,
) -> Result<Node, ReplaceError> {
    let index = rfrom.index(depth);
    let node = rfrom.node(depth);
    if index == rto.index(depth) && depth < rfrom.depth() - slice.open_start {
        // Both ends and the whole slice sit inside the same child; recurse.
        let inner = replace_outer(rfrom, rto, slice, depth + 1)?;
        Ok(node.copy(node.content().replace_child(index, inner)))
    } else if slice.content.is_empty() {
        close(node, replace_two_way(rfrom, rto, depth)?)
    } else if slice.open_start == 0
        && slice.open_end == 0
        && rfrom.depth() == depth
        && rto.depth() == depth
    {
        // Flat case: splice closed content directly into one parent.
        let parent = rfrom.parent();
        let content = parent.content();
        let new = content
            .cut(0, rfrom.parent_offset)
            .append(&slice.content)
            .append(&content.cut(rto.parent_offset, content.size()));
        close(parent, new)
    } else {
        let (start, end) = prepare_slice_for_replace(slice, rfrom)?;
        close(node, replace_three_way(rfrom, &start, &end, rto, depth)?)
    }
}

fn check_join(main: &Node, sub: &Node) -> Result<(), ReplaceError> {
    if sub.kind().compatible_content(&main.kind()) {
        Ok(())
    } else {
        Err(ReplaceError::CannotJoin(sub.kind(), main.kind()))
    }
}

fn joinable(
    before: &ResolvedPos,
    after: &ResolvedPos,
    depth: usize,
) -> Result<Node, ReplaceError> {
    let node = before.node(depth);
    check_join(node, after.node(depth))?;
    Ok(node.clone())
}

fn close(node: &Node, content: Fragment) -> Result<Node, ReplaceError> {
    if !node.valid_content(&content) {
        return Err(ReplaceError::InvalidContent(node.kind()));
    }
    Ok(node.copy(content))
}

fn add_node(node: Node, target: &mut Vec<Node>) {
    if let Some(last) = target.last()
        && last.is_text()
        && node.is_text()
        && last.marks() == node.marks()
    {
        let merged = Node::text(
            format!("{}{}", last.text_str(), node.text_str()),
            last.marks().to_vec(),
        );
        *target.last_mut().expect("just checked") = merged;
        return;
    }
    target.push(node);
}

/// Append the children of the node at `depth` that lie after `start`
/// and/or before `end`, slicing boundary text runs.
fn add_range(
    start: Option<&ResolvedPos>,
    end: Option<&ResolvedPos>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let node = end.or(start).expect("one bound required").node(depth);
    let mut start_index = 0;
    let end_index = end.map_or(node.child_count(), |e| e.index(depth));
    if let Some(start) = start {
        start_index = start.index(depth);
        if start.depth() > depth {
            start_index += 1;
        } else if start.text_offset() > 0 {
            add_node(start.node_after().expect("inside text"), target);
            start_index += 1;
        }
    }
    for i in start_index..end_index {
        add_node(node.child(i).clone(), target);
    }
    if let Some(end) = end
        && end.depth() == depth
        && end.text_offset() > 0
    {
        add_node(end.node_before().expect("inside text"), target);
    }
}

fn replace_two_way(
    rfrom: &ResolvedPos,
    rto: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ReplaceError> {
    let mut content = Vec::new();
    add_range(None, Some(rfrom), depth, &mut content);
    if rfrom.depth() > depth {
        let node = joinable(rfrom, rto, depth + 1)?;
        let inner = replace_two_way(rfrom, rto, depth + 1)?;
        add_node(close(&node, inner)?, &mut content);
    }
    add_range(Some(rto), None, depth, &mut content);
    Ok(Fragment::from_nodes(content))
}

fn replace_three_way(
    rfrom: &ResolvedPos,
    start: &ResolvedPos,
    end: &ResolvedPos,
    rto: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ReplaceError> {
    let open_start = if rfrom.depth() > depth {
        Some(joinable(rfrom, start, depth + 1)?)
    } else {
        None
    };
    let open_end = if rto.depth() > depth {
        Some(joinable(end, rto, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(rfrom), depth, &mut content);
    match (&open_start, &open_end) {
        (Some(os), Some(oe)) if start.index(depth) == end.index(depth) => {
            check_join(os, oe)?;
            let inner = replace_three_way(rfrom, start, end, rto, depth + 1)?;
            add_node(close(os, inner)?, &mut content);
        }
        _ => {
            if let Some(os) = &open_start {
                let inner = replace_two_way(rfrom, start, depth + 1)?;
                add_node(close(os, inner)?, &mut content);
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(oe) = &open_end {
                let inner = replace_two_way(end, rto, depth + 1)?;
                add_node(close(oe, inner)?, &mut content);
            }
        }
    }
    add_range(Some(rto), None, depth, &mut content);
    Ok(Fragment::from_nodes(content))
}

/// Wrap the slice content in copies of the insertion point's ancestors so
/// its open ends can be resolved like ordinary positions.
fn prepare_slice_for_replace(
    slice: &Slice,
    along: &ResolvedPos,
) -> Result<(ResolvedPos, ResolvedPos), ReplaceError> {
    let extra = along.depth() - slice.open_start;
    let parent = along.node(extra);
    let mut node = parent.copy(slice.content.clone());
    for depth in (0..extra).rev() {
        node = along.node(depth).copy(Fragment::from_node(node));
    }
    let start = ResolvedPos::resolve(&node, slice.open_start + extra)?;
    let end = ResolvedPos::resolve(
        &node,
        node.content_size() - slice.open_end - extra,
    )?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Mark, NodeKind};
    use pretty_assertions::assert_eq;

    fn two_paragraphs() -> Node {
        Node::doc(vec![
            Node::paragraph_text("abc"),
            Node::paragraph_text("def"),
        ])
    }

    #[test]
    fn test_insert_text_in_paragraph() {
        let doc = Node::doc(vec![Node::paragraph_text("ac")]);
        let slice = Slice::flat(Fragment::from_node(Node::text("b", Vec::new())));
        let new = doc.replace(2, 2, &slice).unwrap();
        assert_eq!(new.text_content(), "abc");
        assert!(new.check());
    }

    #[test]
    fn test_delete_within_paragraph() {
        let doc = Node::doc(vec![Node::paragraph_text("hello")]);
        let new = doc.replace(2, 4, &Slice::empty()).unwrap();
        assert_eq!(new.text_content(), "heo");
        assert!(new.check());
    }

    #[test]
    fn test_delete_across_paragraphs_merges_them() {
        let doc = two_paragraphs();
        // from after "ab" (pos 3) to before "ef" (pos 7)
        let new = doc.replace(3, 7, &Slice::empty()).unwrap();
        assert_eq!(new.child_count(), 1);
        assert_eq!(new.child(0).text_content(), "abef");
        assert!(new.check());
    }

    #[test]
    fn test_replace_with_open_slice_splits_paragraph() {
        let doc = Node::doc(vec![Node::paragraph_text("abcd")]);
        // Splitting at position 3: insert two open paragraph halves.
        let slice = Slice::new(
            Fragment::from_nodes(vec![Node::empty_paragraph(), Node::empty_paragraph()]),
            1,
            1,
        );
        let new = doc.replace(3, 3, &slice).unwrap();
        assert_eq!(new.child_count(), 2);
        assert_eq!(new.child(0).text_content(), "ab");
        assert_eq!(new.child(1).text_content(), "cd");
        assert!(new.check());
    }

    #[test]
    fn test_replace_block_with_block() {
        let doc = two_paragraphs();
        let slice = Slice::flat(Fragment::from_node(Node::heading(
            2,
            vec![Node::text("title", Vec::new())],
        )));
        let new = doc.replace(0, 5, &slice).unwrap();
        assert_eq!(new.child(0).kind(), NodeKind::Heading);
        assert_eq!(new.child(0).text_content(), "title");
        assert_eq!(new.child(1).text_content(), "def");
        assert!(new.check());
    }

    #[test]
    fn test_open_slice_pastes_across_boundary() {
        let doc = two_paragraphs();
        // Paste "X\nY" (two open paragraph halves) over the boundary region.
        let slice = Slice::new(
            Fragment::from_nodes(vec![
                Node::paragraph(vec![Node::text("X", Vec::new())]),
                Node::paragraph(vec![Node::text("Y", Vec::new())]),
            ]),
            1,
            1,
        );
        let new = doc.replace(2, 7, &slice).unwrap();
        assert_eq!(new.child_count(), 2);
        assert_eq!(new.child(0).text_content(), "aX");
        assert_eq!(new.child(1).text_content(), "Yef");
        assert!(new.check());
    }

    #[test]
    fn test_reject_block_inside_textblock() {
        let doc = Node::doc(vec![Node::paragraph_text("ab")]);
        // A table cannot be spliced into inline content.
        let slice = Slice::flat(Fragment::from_node(Node::table(vec![Node::table_row(
            vec![Node::table_cell(Vec::new())],
        )])));
        let err = doc.replace(1, 1, &slice);
        assert!(err.is_err());
    }

    #[test]
    fn test_reject_inconsistent_open_depths() {
        let doc = Node::doc(vec![Node::paragraph_text("ab")]);
        let slice = Slice::new(
            Fragment::from_node(Node::paragraph_text("x")),
            1,
            0,
        );
        // from/to both at depth 1: openStart 1 / openEnd 0 cannot line up
        assert_eq!(
            doc.replace(1, 1, &slice).unwrap_err(),
            ReplaceError::InconsistentOpenDepths
        );
    }

    #[test]
    fn test_text_merge_preserves_marks() {
        let doc = Node::doc(vec![Node::paragraph(vec![
            Node::text("ab", vec![Mark::Bold]),
            Node::text("cd", Vec::new()),
        ])]);
        // delete "bc" (positions 2..4)
        let new = doc.replace(2, 4, &Slice::empty()).unwrap();
        let para = new.child(0);
        assert_eq!(para.child_count(), 2);
        assert_eq!(para.child(0).text_str(), "a");
        assert_eq!(para.child(0).marks(), &[Mark::Bold]);
        assert_eq!(para.child(1).text_str(), "d");
    }

    #[test]
    fn test_delete_whole_table() {
        let doc = Node::doc(vec![
            Node::paragraph_text("a"),
            Node::table(vec![Node::table_row(vec![Node::table_cell(Vec::new())])]),
            Node::paragraph_text("b"),
        ]);
        let table_size = doc.child(1).node_size();
        let new = doc.replace(3, 3 + table_size, &Slice::empty()).unwrap();
        assert_eq!(new.child_count(), 2);
        assert!(new.check());
    }
}

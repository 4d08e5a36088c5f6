use serde::{Deserialize, Serialize};

use crate::editing::step::{Assoc, Mapping};
use crate::model::{Node, ResolvedPos};
use crate::schema::NodeKind;

/// The active cursor state, addressed by integer positions into one
/// document revision. Selections are re-mapped and re-resolved after every
/// transaction; they never hold node references across edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selection {
    /// Cursor or text range; collapsed when `anchor == head`.
    Text { anchor: usize, head: usize },
    /// A single selected non-text node (image, table, rule).
    Node { pos: usize },
    /// Rectangular table region addressed by the positions before the
    /// anchor and head cells.
    Cell { anchor_cell: usize, head_cell: usize },
    /// The whole document.
    All,
}

impl Selection {
    pub fn cursor(pos: usize) -> Selection {
        Selection::Text {
            anchor: pos,
            head: pos,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        matches!(self, Selection::Text { anchor, head } if anchor == head)
    }

    /// The flat range covered by this selection in the given document.
    pub fn range(&self, doc: &Node) -> (usize, usize) {
        match self {
            Selection::Text { anchor, head } => (*anchor.min(head), *anchor.max(head)),
            Selection::Node { pos } => {
                let size = doc.node_at(*pos).map_or(1, Node::node_size);
                (*pos, *pos + size)
            }
            Selection::Cell {
                anchor_cell,
                head_cell,
            } => {
                let from = *anchor_cell.min(head_cell);
                let to = *anchor_cell.max(head_cell);
                let size = doc.node_at(to).map_or(1, Node::node_size);
                (from, to + size)
            }
            Selection::All => (0, doc.content_size()),
        }
    }

    /// Translate through a mapping and re-resolve so the result addresses
    /// real positions in the post-edit document.
    pub fn map(&self, mapping: &Mapping, doc: &Node) -> Selection {
        match self {
            Selection::Text { anchor, head } => {
                let anchor = mapping.map(*anchor, Assoc::After);
                let head = mapping.map(*head, Assoc::After);
                Selection::resolve_text(doc, anchor, head)
            }
            Selection::Node { pos } => {
                let mapped = mapping.map_result(*pos, Assoc::After);
                if !mapped.deleted
                    && let Some(node) = doc.node_at(mapped.pos)
                    && !node.is_text()
                {
                    return Selection::Node { pos: mapped.pos };
                }
                Selection::resolve_text(doc, mapped.pos, mapped.pos)
            }
            Selection::Cell {
                anchor_cell,
                head_cell,
            } => {
                let anchor = mapping.map_result(*anchor_cell, Assoc::After);
                let head = mapping.map_result(*head_cell, Assoc::After);
                let still_cells = !anchor.deleted
                    && !head.deleted
                    && is_cell_at(doc, anchor.pos)
                    && is_cell_at(doc, head.pos);
                if still_cells {
                    Selection::Cell {
                        anchor_cell: anchor.pos,
                        head_cell: head.pos,
                    }
                } else {
                    Selection::resolve_text(doc, anchor.pos, anchor.pos)
                }
            }
            Selection::All => Selection::All,
        }
    }

    /// Build a text selection whose ends are guaranteed to sit at valid
    /// cursor points of the document, nudging each end to the nearest
    /// inline position when the addressed region no longer admits one.
    pub fn resolve_text(doc: &Node, anchor: usize, head: usize) -> Selection {
        let anchor = nearest_text_pos(doc, anchor);
        let head = nearest_text_pos(doc, head);
        match (anchor, head) {
            (Some(anchor), Some(head)) => Selection::Text { anchor, head },
            // Document without any textblock: fall back to selecting the
            // first node.
            _ => Selection::Node { pos: 0 },
        }
    }

    /// Positions (from, to) ordered, for text selections.
    pub fn text_points(&self) -> Option<(usize, usize)> {
        match self {
            Selection::Text { anchor, head } => Some((*anchor.min(head), *anchor.max(head))),
            _ => None,
        }
    }
}

pub(crate) fn is_cell_at(doc: &Node, pos: usize) -> bool {
    doc.node_at(pos).is_some_and(|n| {
        matches!(n.kind(), NodeKind::TableCell | NodeKind::TableHeader)
    })
}

/// Whether a position is a valid cursor point (inside a textblock).
pub fn is_text_pos(doc: &Node, pos: usize) -> bool {
    ResolvedPos::resolve(doc, pos).is_ok_and(|rp| rp.parent().kind().is_textblock())
}

/// Find the closest valid cursor point to `pos`, preferring earlier
/// positions on ties the way a collapsing deletion leaves the caret at its
/// start.
pub fn nearest_text_pos(doc: &Node, pos: usize) -> Option<usize> {
    let size = doc.content_size();
    let pos = pos.min(size);
    if is_text_pos(doc, pos) {
        return Some(pos);
    }
    for delta in 1..=size {
        if delta <= pos && is_text_pos(doc, pos - delta) {
            return Some(pos - delta);
        }
        if pos + delta <= size && is_text_pos(doc, pos + delta) {
            return Some(pos + delta);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_table() -> Node {
        Node::doc(vec![
            Node::paragraph_text("ab"),
            Node::table(vec![Node::table_row(vec![Node::table_cell(vec![
                Node::paragraph_text("x"),
            ])])]),
        ])
    }

    #[test]
    fn test_text_pos_validity() {
        let doc = doc_with_table();
        assert!(is_text_pos(&doc, 1));
        assert!(is_text_pos(&doc, 3));
        assert!(!is_text_pos(&doc, 4)); // before the table
        assert!(!is_text_pos(&doc, 5)); // before the row
        assert!(is_text_pos(&doc, 8)); // inside the cell paragraph
    }

    #[test]
    fn test_nearest_text_pos_prefers_backward() {
        let doc = doc_with_table();
        assert_eq!(nearest_text_pos(&doc, 4), Some(3));
        assert_eq!(nearest_text_pos(&doc, 5), Some(3));
        assert_eq!(nearest_text_pos(&doc, 6), Some(8));
        assert_eq!(nearest_text_pos(&doc, 7), Some(8));
    }

    #[test]
    fn test_selection_range_for_node() {
        let doc = doc_with_table();
        let sel = Selection::Node { pos: 4 };
        assert_eq!(sel.range(&doc), (4, 13));
    }

    #[test]
    fn test_resolve_text_falls_back() {
        let doc = doc_with_table();
        let sel = Selection::resolve_text(&doc, 4, 4);
        assert_eq!(sel, Selection::Text { anchor: 3, head: 3 });
    }
}

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schema::{
    Attrs, CellAttrs, CodeBlockAttrs, ContentRule, HeadingAttrs, ImageAttrs, Mark, NodeKind,
    OrderedListAttrs, normalize_marks,
};

/// Ordered sequence of sibling nodes with a cached total size.
///
/// Children are shared behind an `Arc`, so rebuilding a path through the
/// tree reuses every untouched subtree by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    children: Arc<Vec<Node>>,
    size: usize,
}

impl Default for Fragment {
    fn default() -> Self {
        Fragment::empty()
    }
}

impl Fragment {
    pub fn empty() -> Fragment {
        Fragment {
            children: Arc::new(Vec::new()),
            size: 0,
        }
    }

    /// Build a fragment, merging adjacent text nodes that carry the same
    /// mark set.
    pub fn from_nodes(nodes: Vec<Node>) -> Fragment {
        let mut children: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes {
            push_merging(&mut children, node);
        }
        let size = children.iter().map(Node::node_size).sum();
        Fragment {
            children: Arc::new(children),
            size,
        }
    }

    pub fn from_node(node: Node) -> Fragment {
        Fragment::from_nodes(vec![node])
    }

    /// Sum of the children's node sizes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, index: usize) -> &Node {
        &self.children[index]
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.children.last()
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.children.first()
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.children.as_ref().clone()
    }

    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut children = self.children.as_ref().clone();
        children[index] = node;
        Fragment::from_nodes(children)
    }

    pub fn append(&self, other: &Fragment) -> Fragment {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut children = self.children.as_ref().clone();
        children.extend(other.children.iter().cloned());
        Fragment::from_nodes(children)
    }

    /// Locate the child containing (or starting at) the given offset.
    /// Returns the child index and the offset at which that child starts.
    /// An offset equal to the fragment size maps to one past the last child.
    pub fn find_index(&self, offset: usize) -> (usize, usize) {
        debug_assert!(offset <= self.size);
        let mut cur = 0;
        for (i, child) in self.children.iter().enumerate() {
            let end = cur + child.node_size();
            if offset < end || (offset == end && i + 1 == self.children.len()) {
                if offset == end {
                    return (i + 1, end);
                }
                return (i, cur);
            }
            cur = end;
        }
        (self.children.len(), self.size)
    }

    /// Cut out the sub-fragment between two offsets, slicing through text
    /// and keeping partially covered containers open (their content cut
    /// recursively).
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        debug_assert!(from <= to && to <= self.size);
        if from == to {
            return Fragment::empty();
        }
        let mut out = Vec::new();
        let mut pos = 0;
        for child in self.children.iter() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from {
                let piece = if pos >= from && end <= to {
                    child.clone()
                } else if child.is_text() {
                    child.cut_text(from.saturating_sub(pos), to.min(end) - pos)
                } else if child.kind().is_atom() {
                    // An atom is either fully inside or fully outside.
                    child.clone()
                } else {
                    let inner_from = from.saturating_sub(pos + 1).min(child.content_size());
                    let inner_to = to
                        .saturating_sub(pos + 1)
                        .min(child.content_size());
                    child.copy(child.content().cut(inner_from, inner_to))
                };
                if piece.node_size() > 0 {
                    push_merging(&mut out, piece);
                }
            }
            pos = end;
        }
        Fragment::from_nodes(out)
    }
}

fn push_merging(target: &mut Vec<Node>, node: Node) {
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

/// Typed element of the document tree.
///
/// Nodes are immutable values: every mutation path produces a new node,
/// sharing unchanged children with the old tree. Text nodes store their
/// run and marks; all other kinds store a (possibly empty) fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    kind: NodeKind,
    #[serde(default, skip_serializing_if = "attrs_is_none")]
    attrs: Attrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    marks: Vec<Mark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<Arc<str>>,
    #[serde(default, skip_serializing_if = "Fragment::is_empty")]
    content: Fragment,
}

fn attrs_is_none(attrs: &Attrs) -> bool {
    matches!(attrs, Attrs::None)
}

impl Node {
    pub fn new(kind: NodeKind, attrs: Attrs, content: Fragment) -> Node {
        debug_assert!(kind != NodeKind::Text, "use Node::text for text nodes");
        Node {
            kind,
            attrs: attrs.normalized(),
            marks: Vec::new(),
            text: None,
            content,
        }
    }

    pub fn leaf(kind: NodeKind, attrs: Attrs) -> Node {
        Node::new(kind, attrs, Fragment::empty())
    }

    pub fn text(text: impl Into<String>, marks: Vec<Mark>) -> Node {
        Node {
            kind: NodeKind::Text,
            attrs: Attrs::None,
            marks: normalize_marks(&marks),
            text: Some(Arc::from(text.into().as_str())),
            content: Fragment::empty(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn content_rule(&self) -> ContentRule {
        self.kind.content_rule()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn content(&self) -> &Fragment {
        &self.content
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn text_str(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Number of position units this node spans: characters for text, one
    /// for atoms, content plus an open and a close token for containers.
    pub fn node_size(&self) -> usize {
        match self.kind {
            NodeKind::Text => self.text_str().chars().count(),
            k if k.is_atom() => 1,
            _ => self.content.size() + 2,
        }
    }

    pub fn content_size(&self) -> usize {
        self.content.size()
    }

    pub fn child_count(&self) -> usize {
        self.content.len()
    }

    pub fn child(&self, index: usize) -> &Node {
        self.content.child(index)
    }

    /// Same kind, attrs and marks with different content.
    pub fn copy(&self, content: Fragment) -> Node {
        Node {
            kind: self.kind,
            attrs: self.attrs.clone(),
            marks: self.marks.clone(),
            text: self.text.clone(),
            content,
        }
    }

    pub fn with_attrs(&self, attrs: Attrs) -> Node {
        Node {
            attrs: attrs.normalized(),
            ..self.clone()
        }
    }

    pub fn with_marks(&self, marks: Vec<Mark>) -> Node {
        debug_assert!(self.is_text());
        Node {
            marks: normalize_marks(&marks),
            ..self.clone()
        }
    }

    /// Slice a text node by character offsets.
    pub fn cut_text(&self, from: usize, to: usize) -> Node {
        debug_assert!(self.is_text());
        let text: String = self
            .text_str()
            .chars()
            .skip(from)
            .take(to.saturating_sub(from))
            .collect();
        Node::text(text, self.marks.clone())
    }

    /// Whether a fragment would be legal content for this node.
    pub fn valid_content(&self, content: &Fragment) -> bool {
        let rule = self.kind.content_rule();
        if rule.requires_child() && content.is_empty() {
            return false;
        }
        content.children().all(|c| rule.allows(c.kind()))
    }

    /// Recursively verify nesting rules, attribute shapes and mark
    /// placement. Used by tests and by the parser's final pass.
    pub fn check(&self) -> bool {
        if !self.kind.valid_attrs(&self.attrs) {
            return false;
        }
        if !self.is_text() && !self.marks.is_empty() {
            return false;
        }
        if self.kind.is_leaf() && !self.content.is_empty() {
            return false;
        }
        if !self.kind.is_leaf() && !self.valid_content(&self.content) {
            return false;
        }
        self.content.children().all(Node::check)
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self) -> String {
        if self.is_text() {
            return self.text_str().to_string();
        }
        let mut out = String::new();
        for child in self.content.children() {
            out.push_str(&child.text_content());
        }
        out
    }

    /// Plain text between two positions with a configurable separator
    /// emitted between textblocks and a substitution string for atoms.
    pub fn text_between(
        &self,
        from: usize,
        to: usize,
        block_separator: &str,
        leaf_text: &str,
    ) -> String {
        let mut out = String::new();
        let mut first_block = true;
        self.collect_text(from, to, 0, block_separator, leaf_text, &mut out, &mut first_block);
        out
    }

    fn collect_text(
        &self,
        from: usize,
        to: usize,
        pos: usize,
        block_separator: &str,
        leaf_text: &str,
        out: &mut String,
        first_block: &mut bool,
    ) {
        let mut cur = pos;
        for child in self.content.children() {
            let end = cur + child.node_size();
            if end > from && cur < to {
                let separates = child.kind().is_textblock()
                    || (child.kind().is_atom() && !leaf_text.is_empty());
                if separates && !block_separator.is_empty() {
                    if *first_block {
                        *first_block = false;
                    } else {
                        out.push_str(block_separator);
                    }
                }
                if child.is_text() {
                    let start = from.saturating_sub(cur);
                    let stop = (to - cur).min(child.node_size());
                    out.push_str(child.cut_text(start, stop).text_str());
                } else if child.kind().is_atom() {
                    out.push_str(leaf_text);
                } else {
                    child.collect_text(
                        from,
                        to,
                        cur + 1,
                        block_separator,
                        leaf_text,
                        out,
                        first_block,
                    );
                }
            }
            cur = end;
        }
    }

    /// Walk every node intersecting the range, depth first. The callback
    /// receives each node with its absolute position; returning `false`
    /// skips that node's children.
    pub fn nodes_between(&self, from: usize, to: usize, f: &mut dyn FnMut(&Node, usize) -> bool) {
        self.nodes_between_at(from, to, 0, f);
    }

    fn nodes_between_at(
        &self,
        from: usize,
        to: usize,
        pos: usize,
        f: &mut dyn FnMut(&Node, usize) -> bool,
    ) {
        let mut cur = pos;
        for child in self.content.children() {
            let end = cur + child.node_size();
            if end > from && cur < to {
                let descend = f(child, cur);
                if descend && !child.kind().is_leaf() {
                    child.nodes_between_at(from.max(cur + 1) , to.min(end - 1), cur + 1, f);
                }
            }
            cur = end;
        }
    }

    /// The node starting exactly at the given position, if any.
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let mut node = self;
        let mut offset = pos;
        loop {
            let (index, start) = node.content.find_index(offset);
            let child = node.content.maybe_child(index)?;
            if start == offset {
                return Some(child);
            }
            if child.kind().is_leaf() {
                return None;
            }
            node = child;
            offset = offset - start - 1;
        }
    }
}

impl fmt::Display for Node {
    /// Compact structural rendering used in test failure output, e.g.
    /// `doc(paragraph("hello"))`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_text() {
            return write!(f, "{:?}", self.text_str());
        }
        write!(f, "{:?}", self.kind)?;
        if !self.content.is_empty() {
            write!(f, "(")?;
            for (i, child) in self.content.children().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{child}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

// ---- convenience constructors -------------------------------------------

impl Node {
    pub fn doc(blocks: Vec<Node>) -> Node {
        let blocks = if blocks.is_empty() {
            vec![Node::empty_paragraph()]
        } else {
            blocks
        };
        Node::new(NodeKind::Doc, Attrs::None, Fragment::from_nodes(blocks))
    }

    pub fn paragraph(inline: Vec<Node>) -> Node {
        Node::new(
            NodeKind::Paragraph,
            NodeKind::Paragraph.default_attrs(),
            Fragment::from_nodes(inline),
        )
    }

    pub fn paragraph_text(text: &str) -> Node {
        Node::paragraph(vec![Node::text(text, Vec::new())])
    }

    pub fn empty_paragraph() -> Node {
        Node::paragraph(Vec::new())
    }

    pub fn heading(level: u8, inline: Vec<Node>) -> Node {
        Node::new(
            NodeKind::Heading,
            Attrs::Heading(HeadingAttrs {
                level,
                ..HeadingAttrs::default()
            }),
            Fragment::from_nodes(inline),
        )
    }

    pub fn code_block(language: Option<String>, text: &str) -> Node {
        let content = if text.is_empty() {
            Fragment::empty()
        } else {
            Fragment::from_node(Node::text(text, Vec::new()))
        };
        Node::new(
            NodeKind::CodeBlock,
            Attrs::CodeBlock(CodeBlockAttrs { language }),
            content,
        )
    }

    pub fn blockquote(blocks: Vec<Node>) -> Node {
        Node::new(
            NodeKind::Blockquote,
            Attrs::None,
            Fragment::from_nodes(blocks),
        )
    }

    pub fn list_item(blocks: Vec<Node>) -> Node {
        let blocks = if blocks.is_empty() {
            vec![Node::empty_paragraph()]
        } else {
            blocks
        };
        Node::new(NodeKind::ListItem, Attrs::None, Fragment::from_nodes(blocks))
    }

    pub fn bullet_list(items: Vec<Node>) -> Node {
        Node::new(
            NodeKind::BulletList,
            Attrs::None,
            Fragment::from_nodes(items),
        )
    }

    pub fn ordered_list(start: u32, items: Vec<Node>) -> Node {
        Node::new(
            NodeKind::OrderedList,
            Attrs::OrderedList(OrderedListAttrs { start }),
            Fragment::from_nodes(items),
        )
    }

    pub fn table(rows: Vec<Node>) -> Node {
        Node::new(NodeKind::Table, Attrs::None, Fragment::from_nodes(rows))
    }

    pub fn table_row(cells: Vec<Node>) -> Node {
        Node::new(NodeKind::TableRow, Attrs::None, Fragment::from_nodes(cells))
    }

    pub fn table_cell(blocks: Vec<Node>) -> Node {
        Node::cell_of(NodeKind::TableCell, CellAttrs::default(), blocks)
    }

    pub fn table_header(blocks: Vec<Node>) -> Node {
        Node::cell_of(NodeKind::TableHeader, CellAttrs::default(), blocks)
    }

    pub fn cell_of(kind: NodeKind, attrs: CellAttrs, blocks: Vec<Node>) -> Node {
        let blocks = if blocks.is_empty() {
            vec![Node::empty_paragraph()]
        } else {
            blocks
        };
        Node::new(kind, Attrs::Cell(attrs), Fragment::from_nodes(blocks))
    }

    pub fn image(attrs: ImageAttrs) -> Node {
        Node::leaf(NodeKind::Image, Attrs::Image(attrs))
    }

    pub fn horizontal_rule() -> Node {
        Node::leaf(NodeKind::HorizontalRule, Attrs::None)
    }

    pub fn page_break() -> Node {
        Node::leaf(NodeKind::PageBreak, Attrs::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MarkKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_node_sizes() {
        let text = Node::text("hello", Vec::new());
        assert_eq!(text.node_size(), 5);

        let para = Node::paragraph(vec![text]);
        assert_eq!(para.node_size(), 7); // open + 5 chars + close

        let doc = Node::doc(vec![para, Node::empty_paragraph()]);
        assert_eq!(doc.content_size(), 9); // 7 + 2

        assert_eq!(Node::horizontal_rule().node_size(), 1);
    }

    #[test]
    fn test_unicode_text_counts_chars_not_bytes() {
        let text = Node::text("héllo 🦀", Vec::new());
        assert_eq!(text.node_size(), 7);
    }

    #[test]
    fn test_fragment_merges_equal_mark_runs() {
        let frag = Fragment::from_nodes(vec![
            Node::text("ab", vec![Mark::Bold]),
            Node::text("cd", vec![Mark::Bold]),
            Node::text("ef", Vec::new()),
        ]);
        assert_eq!(frag.len(), 2);
        assert_eq!(frag.child(0).text_str(), "abcd");
        assert_eq!(frag.child(1).text_str(), "ef");
    }

    #[test]
    fn test_fragment_cut_through_text() {
        let frag = Fragment::from_nodes(vec![Node::text("hello world", Vec::new())]);
        let cut = frag.cut(6, 11);
        assert_eq!(cut.child(0).text_str(), "world");
    }

    #[test]
    fn test_fragment_cut_opens_containers() {
        // doc content: paragraph("ab") paragraph("cd")
        let frag = Fragment::from_nodes(vec![
            Node::paragraph_text("ab"),
            Node::paragraph_text("cd"),
        ]);
        // cut from inside the first paragraph to inside the second
        let cut = frag.cut(2, 6);
        assert_eq!(cut.len(), 2);
        assert_eq!(cut.child(0).text_content(), "b");
        assert_eq!(cut.child(1).text_content(), "c");
    }

    #[test]
    fn test_node_at_finds_nested_nodes() {
        let doc = Node::doc(vec![
            Node::paragraph_text("ab"),
            Node::table(vec![Node::table_row(vec![Node::table_cell(vec![
                Node::paragraph_text("x"),
            ])])]),
        ]);
        assert_eq!(doc.node_at(0).unwrap().kind(), NodeKind::Paragraph);
        assert_eq!(doc.node_at(4).unwrap().kind(), NodeKind::Table);
        assert_eq!(doc.node_at(5).unwrap().kind(), NodeKind::TableRow);
        assert_eq!(doc.node_at(6).unwrap().kind(), NodeKind::TableCell);
        assert!(doc.node_at(1).is_none()); // inside text, no node boundary
    }

    #[test]
    fn test_text_between_with_separator() {
        let doc = Node::doc(vec![
            Node::paragraph_text("one"),
            Node::paragraph_text("two"),
        ]);
        assert_eq!(doc.text_between(0, doc.content_size(), "\n\n", ""), "one\n\ntwo");
        assert_eq!(doc.text_between(2, 7, "|", ""), "ne|t");
    }

    #[test]
    fn test_text_between_substitutes_atoms() {
        let doc = Node::doc(vec![
            Node::paragraph_text("a"),
            Node::horizontal_rule(),
            Node::paragraph_text("b"),
        ]);
        assert_eq!(doc.text_between(0, doc.content_size(), "\n", "-"), "a\n-\nb");
    }

    #[test]
    fn test_check_rejects_bad_nesting() {
        let bad = Node::new(
            NodeKind::Table,
            Attrs::None,
            Fragment::from_node(Node::paragraph_text("x")),
        );
        assert!(!bad.check());

        let good = Node::table(vec![Node::table_row(vec![Node::table_cell(Vec::new())])]);
        assert!(good.check());
    }

    #[test]
    fn test_marks_on_text_nodes_only() {
        let text = Node::text("x", vec![Mark::Italic, Mark::Bold]);
        assert_eq!(text.marks()[0].kind(), MarkKind::Bold);
        assert!(Node::paragraph(vec![text]).check());
    }
}

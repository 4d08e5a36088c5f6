//! Node and mark vocabulary: the closed set of types a document may
//! contain, their nesting rules and their attribute schemas.
//!
//! Behavior is dispatched over the [`NodeKind`] enum rather than trait
//! objects so the schema stays data-driven and serializable: every rule a
//! node type carries (content expression, attribute defaults, atomicity)
//! is a `match` arm here, and both the parser and the edit protocol
//! consult the same table.

pub mod attrs;
pub mod marks;

pub use attrs::{
    Align, Attrs, BlockAttrs, CellAttrs, CodeBlockAttrs, HeadingAttrs, ImageAttrs,
    MAX_INDENT, MIN_IMAGE_WIDTH, OrderedListAttrs, normalize_rotation,
};
pub use marks::{Mark, MarkKind, add_mark, contains_kind, normalize_marks, remove_mark_kind};

use serde::{Deserialize, Serialize};

/// Closed enumeration of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Doc,
    Paragraph,
    Heading,
    Blockquote,
    CodeBlock,
    BulletList,
    OrderedList,
    ListItem,
    Table,
    TableRow,
    TableHeader,
    TableCell,
    Image,
    HorizontalRule,
    PageBreak,
    Text,
}

/// Content expression of a node type: which children it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRule {
    /// One or more block nodes.
    Blocks,
    /// Zero or more inline (text) nodes.
    Inline,
    /// One or more list items.
    ListItems,
    /// One or more table rows.
    Rows,
    /// One or more table cells or headers.
    Cells,
    /// No children at all (leaf or atom).
    Nothing,
}

impl ContentRule {
    pub fn allows(&self, child: NodeKind) -> bool {
        match self {
            ContentRule::Blocks => child.is_block(),
            ContentRule::Inline => child == NodeKind::Text,
            ContentRule::ListItems => child == NodeKind::ListItem,
            ContentRule::Rows => child == NodeKind::TableRow,
            ContentRule::Cells => {
                child == NodeKind::TableCell || child == NodeKind::TableHeader
            }
            ContentRule::Nothing => false,
        }
    }

    /// The node kind inserted to satisfy this rule when a required child is
    /// missing (used by parse repair and empty-node construction).
    pub fn filler(&self) -> Option<NodeKind> {
        match self {
            ContentRule::Blocks => Some(NodeKind::Paragraph),
            ContentRule::ListItems => Some(NodeKind::ListItem),
            ContentRule::Rows => Some(NodeKind::TableRow),
            ContentRule::Cells => Some(NodeKind::TableCell),
            ContentRule::Inline | ContentRule::Nothing => None,
        }
    }

    /// Whether the rule demands at least one child.
    pub fn requires_child(&self) -> bool {
        matches!(
            self,
            ContentRule::Blocks | ContentRule::ListItems | ContentRule::Rows | ContentRule::Cells
        )
    }
}

impl NodeKind {
    pub fn content_rule(&self) -> ContentRule {
        match self {
            NodeKind::Doc
            | NodeKind::Blockquote
            | NodeKind::ListItem
            | NodeKind::TableHeader
            | NodeKind::TableCell => ContentRule::Blocks,
            NodeKind::Paragraph | NodeKind::Heading | NodeKind::CodeBlock => ContentRule::Inline,
            NodeKind::BulletList | NodeKind::OrderedList => ContentRule::ListItems,
            NodeKind::Table => ContentRule::Rows,
            NodeKind::TableRow => ContentRule::Cells,
            NodeKind::Image
            | NodeKind::HorizontalRule
            | NodeKind::PageBreak
            | NodeKind::Text => ContentRule::Nothing,
        }
    }

    /// Block-level nodes: everything that can sit directly in the document
    /// flow (or in a blockquote, list item or table cell).
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph
                | NodeKind::Heading
                | NodeKind::Blockquote
                | NodeKind::CodeBlock
                | NodeKind::BulletList
                | NodeKind::OrderedList
                | NodeKind::Table
                | NodeKind::Image
                | NodeKind::HorizontalRule
                | NodeKind::PageBreak
        )
    }

    pub fn is_inline(&self) -> bool {
        *self == NodeKind::Text
    }

    /// Textblocks hold inline content directly.
    pub fn is_textblock(&self) -> bool {
        matches!(
            self,
            NodeKind::Paragraph | NodeKind::Heading | NodeKind::CodeBlock
        )
    }

    /// Atoms occupy a single position unit and have no addressable interior.
    pub fn is_atom(&self) -> bool {
        matches!(
            self,
            NodeKind::Image | NodeKind::HorizontalRule | NodeKind::PageBreak
        )
    }

    pub fn is_leaf(&self) -> bool {
        self.is_atom() || *self == NodeKind::Text
    }

    /// Whether inline content in this block carries marks. Code blocks
    /// hold plain text only.
    pub fn allows_marks(&self) -> bool {
        *self != NodeKind::CodeBlock
    }

    pub fn default_attrs(&self) -> Attrs {
        match self {
            NodeKind::Paragraph => Attrs::Paragraph(BlockAttrs::default()),
            NodeKind::Heading => Attrs::Heading(HeadingAttrs::default()),
            NodeKind::OrderedList => Attrs::OrderedList(OrderedListAttrs::default()),
            NodeKind::CodeBlock => Attrs::CodeBlock(CodeBlockAttrs::default()),
            NodeKind::Image => Attrs::Image(ImageAttrs::default()),
            NodeKind::TableCell | NodeKind::TableHeader => Attrs::Cell(CellAttrs::default()),
            _ => Attrs::None,
        }
    }

    /// Whether an attribute payload is acceptable for this node kind.
    pub fn valid_attrs(&self, attrs: &Attrs) -> bool {
        match (self, attrs) {
            (NodeKind::Paragraph, Attrs::Paragraph(_)) => true,
            (NodeKind::Heading, Attrs::Heading(_)) => true,
            (NodeKind::OrderedList, Attrs::OrderedList(_)) => true,
            (NodeKind::CodeBlock, Attrs::CodeBlock(_)) => true,
            (NodeKind::Image, Attrs::Image(_)) => true,
            (NodeKind::TableCell | NodeKind::TableHeader, Attrs::Cell(_)) => true,
            (
                NodeKind::Doc
                | NodeKind::Blockquote
                | NodeKind::BulletList
                | NodeKind::ListItem
                | NodeKind::Table
                | NodeKind::TableRow
                | NodeKind::HorizontalRule
                | NodeKind::PageBreak
                | NodeKind::Text,
                Attrs::None,
            ) => true,
            _ => false,
        }
    }

    /// Two kinds have compatible content when a range of one's children
    /// could legally live inside the other. This is the join criterion for
    /// slice replacement.
    pub fn compatible_content(&self, other: &NodeKind) -> bool {
        self.content_rule() == other.content_rule()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_rules() {
        assert!(NodeKind::Table.content_rule().allows(NodeKind::TableRow));
        assert!(!NodeKind::Table.content_rule().allows(NodeKind::Paragraph));
        assert!(NodeKind::TableRow.content_rule().allows(NodeKind::TableCell));
        assert!(NodeKind::TableRow.content_rule().allows(NodeKind::TableHeader));
        assert!(NodeKind::ListItem.content_rule().allows(NodeKind::Paragraph));
        assert!(!NodeKind::BulletList.content_rule().allows(NodeKind::Paragraph));
        assert!(NodeKind::Paragraph.content_rule().allows(NodeKind::Text));
        assert!(!NodeKind::Image.content_rule().allows(NodeKind::Text));
    }

    #[test]
    fn test_textblocks_and_atoms() {
        assert!(NodeKind::Paragraph.is_textblock());
        assert!(NodeKind::CodeBlock.is_textblock());
        assert!(!NodeKind::Blockquote.is_textblock());
        assert!(NodeKind::Image.is_atom());
        assert!(NodeKind::PageBreak.is_atom());
        assert!(!NodeKind::Text.is_atom());
        assert!(NodeKind::Text.is_leaf());
    }

    #[test]
    fn test_attr_validity() {
        assert!(NodeKind::Paragraph.valid_attrs(&Attrs::Paragraph(BlockAttrs::default())));
        assert!(!NodeKind::Paragraph.valid_attrs(&Attrs::None));
        assert!(!NodeKind::Heading.valid_attrs(&Attrs::Paragraph(BlockAttrs::default())));
        assert!(NodeKind::Table.valid_attrs(&Attrs::None));
    }

    #[test]
    fn test_compatible_content() {
        assert!(NodeKind::Paragraph.compatible_content(&NodeKind::Heading));
        assert!(NodeKind::ListItem.compatible_content(&NodeKind::TableCell));
        assert!(!NodeKind::Paragraph.compatible_content(&NodeKind::BulletList));
    }
}

use serde::{Deserialize, Serialize};

/// Maximum value of the numeric indent attribute on paragraphs and headings.
pub const MAX_INDENT: u8 = 12;

/// Smallest width an image can be resized to, in pixels.
pub const MIN_IMAGE_WIDTH: u32 = 40;

/// Horizontal alignment for textblocks and images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    pub fn as_css(&self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
            Align::Justify => "justify",
        }
    }

    pub fn from_css(value: &str) -> Option<Align> {
        match value.trim() {
            "left" => Some(Align::Left),
            "center" => Some(Align::Center),
            "right" => Some(Align::Right),
            "justify" => Some(Align::Justify),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAttrs {
    pub align: Align,
    pub indent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingAttrs {
    pub level: u8,
    pub align: Align,
    pub indent: u8,
}

impl Default for HeadingAttrs {
    fn default() -> Self {
        Self {
            level: 1,
            align: Align::Left,
            indent: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedListAttrs {
    pub start: u32,
}

impl Default for OrderedListAttrs {
    fn default() -> Self {
        Self { start: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockAttrs {
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttrs {
    pub src: String,
    pub alt: String,
    pub title: Option<String>,
    pub width: Option<u32>,
    /// Clockwise rotation, always one of 0, 90, 180, 270.
    pub rotate: u16,
    pub flip_x: bool,
    pub flip_y: bool,
    pub align: Align,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAttrs {
    pub colspan: u32,
    pub rowspan: u32,
}

impl Default for CellAttrs {
    fn default() -> Self {
        Self {
            colspan: 1,
            rowspan: 1,
        }
    }
}

/// Type-specific attributes of a node. Kinds without attributes use `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attrs {
    #[default]
    None,
    Paragraph(BlockAttrs),
    Heading(HeadingAttrs),
    OrderedList(OrderedListAttrs),
    CodeBlock(CodeBlockAttrs),
    Image(ImageAttrs),
    Cell(CellAttrs),
}

impl Attrs {
    /// Clamp every attribute into its legal range. Runs on construction,
    /// mutation and parse, so out-of-range values never reach the tree.
    pub fn normalized(self) -> Attrs {
        match self {
            Attrs::None => Attrs::None,
            Attrs::Paragraph(a) => Attrs::Paragraph(BlockAttrs {
                align: a.align,
                indent: a.indent.min(MAX_INDENT),
            }),
            Attrs::Heading(a) => Attrs::Heading(HeadingAttrs {
                level: a.level.clamp(1, 6),
                align: a.align,
                indent: a.indent.min(MAX_INDENT),
            }),
            Attrs::OrderedList(a) => Attrs::OrderedList(OrderedListAttrs {
                start: a.start.max(1),
            }),
            Attrs::CodeBlock(a) => Attrs::CodeBlock(a),
            Attrs::Image(a) => Attrs::Image(ImageAttrs {
                rotate: normalize_rotation(a.rotate),
                width: a.width.map(|w| w.max(MIN_IMAGE_WIDTH)),
                ..a
            }),
            Attrs::Cell(a) => Attrs::Cell(CellAttrs {
                colspan: a.colspan.max(1),
                rowspan: a.rowspan.max(1),
            }),
        }
    }

    pub fn align(&self) -> Option<Align> {
        match self {
            Attrs::Paragraph(a) => Some(a.align),
            Attrs::Heading(a) => Some(a.align),
            Attrs::Image(a) => Some(a.align),
            _ => None,
        }
    }

    pub fn indent(&self) -> Option<u8> {
        match self {
            Attrs::Paragraph(a) => Some(a.indent),
            Attrs::Heading(a) => Some(a.indent),
            _ => None,
        }
    }

    pub fn with_align(&self, align: Align) -> Option<Attrs> {
        match self {
            Attrs::Paragraph(a) => Some(Attrs::Paragraph(BlockAttrs { align, ..*a })),
            Attrs::Heading(a) => Some(Attrs::Heading(HeadingAttrs { align, ..*a })),
            Attrs::Image(a) => Some(Attrs::Image(ImageAttrs {
                align,
                ..a.clone()
            })),
            _ => None,
        }
    }

    pub fn with_indent(&self, indent: u8) -> Option<Attrs> {
        let indent = indent.min(MAX_INDENT);
        match self {
            Attrs::Paragraph(a) => Some(Attrs::Paragraph(BlockAttrs { indent, ..*a })),
            Attrs::Heading(a) => Some(Attrs::Heading(HeadingAttrs { indent, ..*a })),
            _ => None,
        }
    }
}

/// Snap a rotation to the 90-degree grid within 0..360.
pub fn normalize_rotation(deg: u16) -> u16 {
    (deg % 360) / 90 * 90
}

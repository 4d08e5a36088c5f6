//! Markup-to-document parsing with repair.
//!
//! The builder matches tags against the schema and keeps a stack of open
//! nodes. Malformed structure is repaired rather than rejected: missing
//! ancestors are synthesized (a stray `<td>` grows a row and table around
//! it), misplaced content implicitly closes what it cannot live in, text
//! outside a textblock gets a paragraph, jagged tables are padded square,
//! and unknown tags are transparent. Parsing never fails; callers fall
//! back to the default document only when the input produces nothing.

use crate::editing::tables::TableMap;
use crate::html::tokenizer::{Token, tokenize};
use crate::model::{Fragment, Node};
use crate::schema::{
    Align, Attrs, BlockAttrs, CellAttrs, CodeBlockAttrs, ContentRule, HeadingAttrs, ImageAttrs,
    Mark, NodeKind, OrderedListAttrs,
};

/// Parse an HTML body into a document. Infallible by design.
pub fn parse_document(html: &str) -> Node {
    let mut builder = Builder::new();
    for token in tokenize(html) {
        match token {
            Token::Open {
                name,
                attrs,
                self_closing,
            } => builder.open(&name, &attrs, self_closing),
            Token::Close { name } => builder.close(&name),
            Token::Text(text) => builder.text(&text),
        }
    }
    builder.finish()
}

struct OpenNode {
    kind: NodeKind,
    attrs: Attrs,
    children: Vec<Node>,
}

enum ElemEntry {
    /// A real block tag; closing unwinds the stack to this depth.
    Block { depth: usize },
    /// A mark tag; closing pops this many marks.
    Marks(usize),
    /// Transparent or dropped tag.
    Skip,
}

struct Builder {
    stack: Vec<OpenNode>,
    elems: Vec<(String, ElemEntry)>,
    marks: Vec<Mark>,
}

impl Builder {
    fn new() -> Builder {
        Builder {
            stack: vec![OpenNode {
                kind: NodeKind::Doc,
                attrs: Attrs::None,
                children: Vec::new(),
            }],
            elems: Vec::new(),
            marks: Vec::new(),
        }
    }

    fn top_kind(&self) -> NodeKind {
        self.stack.last().expect("doc never popped").kind
    }

    fn open(&mut self, name: &str, attrs: &[(String, String)], _self_closing: bool) {
        match name {
            "p" => self.open_block(NodeKind::Paragraph, block_attrs(attrs), name),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse().unwrap_or(1);
                self.open_block(NodeKind::Heading, heading_attrs(attrs, level), name)
            }
            "blockquote" => self.open_block(NodeKind::Blockquote, Attrs::None, name),
            "pre" => self.open_block(
                NodeKind::CodeBlock,
                Attrs::CodeBlock(CodeBlockAttrs { language: None }),
                name,
            ),
            "code" => {
                // Inside a <pre> the class carries the language; elsewhere
                // the tag is transparent.
                if self.top_kind() == NodeKind::CodeBlock
                    && let Some(lang) = get(attrs, "class")
                        .and_then(|c| c.strip_prefix("language-").map(str::to_string))
                    && let Some(top) = self.stack.last_mut()
                {
                    top.attrs = Attrs::CodeBlock(CodeBlockAttrs {
                        language: Some(lang),
                    });
                }
                self.elems.push((name.to_string(), ElemEntry::Skip));
            }
            "ul" => self.open_block(NodeKind::BulletList, Attrs::None, name),
            "ol" => {
                let start = get(attrs, "start")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1);
                self.open_block(
                    NodeKind::OrderedList,
                    Attrs::OrderedList(OrderedListAttrs { start }),
                    name,
                )
            }
            "li" => self.open_block(NodeKind::ListItem, Attrs::None, name),
            "table" => self.open_block(NodeKind::Table, Attrs::None, name),
            "tr" => self.open_block(NodeKind::TableRow, Attrs::None, name),
            "th" => self.open_block(NodeKind::TableHeader, cell_attrs(attrs), name),
            "td" => self.open_block(NodeKind::TableCell, cell_attrs(attrs), name),
            "img" => self.insert_atom(Node::image(image_attrs(attrs))),
            "hr" => self.insert_atom(Node::horizontal_rule()),
            "div" if get(attrs, "data-page-break").is_some() => {
                self.insert_atom(Node::page_break());
                self.elems.push((name.to_string(), ElemEntry::Skip));
            }
            "strong" | "b" => self.open_marks(name, vec![Mark::Bold]),
            "em" | "i" => self.open_marks(name, vec![Mark::Italic]),
            "u" => self.open_marks(name, vec![Mark::Underline]),
            "s" | "strike" | "del" => self.open_marks(name, vec![Mark::Strikethrough]),
            "a" => match get(attrs, "href") {
                Some(href) => self.open_marks(
                    name,
                    vec![Mark::Link {
                        href,
                        title: get(attrs, "title").filter(|t| !t.is_empty()),
                    }],
                ),
                None => self.elems.push((name.to_string(), ElemEntry::Skip)),
            },
            "span" => {
                let marks = span_marks(attrs);
                self.open_marks(name, marks);
            }
            "br" => {}
            _ => self.elems.push((name.to_string(), ElemEntry::Skip)),
        }
    }

    fn open_block(&mut self, kind: NodeKind, attrs: Attrs, name: &str) {
        self.ensure_context(kind);
        let depth = self.stack.len();
        self.stack.push(OpenNode {
            kind,
            attrs,
            children: Vec::new(),
        });
        self.elems
            .push((name.to_string(), ElemEntry::Block { depth }));
    }

    fn open_marks(&mut self, name: &str, marks: Vec<Mark>) {
        let count = marks.len();
        self.marks.extend(marks);
        self.elems.push((name.to_string(), ElemEntry::Marks(count)));
    }

    fn insert_atom(&mut self, node: Node) {
        self.ensure_context(node.kind());
        self.stack
            .last_mut()
            .expect("doc never popped")
            .children
            .push(node);
    }

    /// Close and synthesize until the top of the stack accepts `kind`.
    /// Contexts with a fixed child shape (table, row, list) wrap foreign
    /// content in their required child instead of being closed, so a
    /// misplaced block sinks into a cell rather than breaking the table.
    fn ensure_context(&mut self, kind: NodeKind) {
        loop {
            let top_rule = self.top_kind().content_rule();
            if top_rule.allows(kind) {
                return;
            }
            if matches!(
                top_rule,
                ContentRule::Rows | ContentRule::Cells | ContentRule::ListItems
            ) {
                let filler = top_rule.filler().expect("shaped rules have fillers");
                self.synthesize(filler);
                continue;
            }
            if self.ancestor_allows(kind) {
                self.close_top();
                continue;
            }
            match (kind, top_rule) {
                (NodeKind::ListItem, _) => self.synthesize(NodeKind::BulletList),
                (NodeKind::TableRow, _) => self.synthesize(NodeKind::Table),
                (NodeKind::TableHeader | NodeKind::TableCell, _) => {
                    self.synthesize(NodeKind::TableRow)
                }
                (_, ContentRule::Inline | ContentRule::Nothing) => self.close_top(),
                (_, ContentRule::Blocks) => return,
                (_, ContentRule::ListItems | ContentRule::Rows | ContentRule::Cells) => {
                    unreachable!("handled above: filler synthesis continues the loop")
                }
            }
        }
    }

    /// Push a repair node without a corresponding tag entry.
    fn synthesize(&mut self, kind: NodeKind) {
        self.ensure_context(kind);
        self.stack.push(OpenNode {
            kind,
            attrs: kind.default_attrs(),
            children: Vec::new(),
        });
    }

    fn ancestor_allows(&self, kind: NodeKind) -> bool {
        self.stack[..self.stack.len() - 1]
            .iter()
            .any(|open| open.kind.content_rule().allows(kind))
    }

    fn text(&mut self, text: &str) {
        let top = self.top_kind();
        if top == NodeKind::CodeBlock {
            let node = Node::text(text, Vec::new());
            self.stack.last_mut().expect("stack").children.push(node);
            return;
        }
        if top.is_textblock() {
            let collapsed = collapse_whitespace(text);
            if !collapsed.is_empty() {
                let node = Node::text(collapsed, self.marks.clone());
                self.stack.last_mut().expect("stack").children.push(node);
            }
            return;
        }
        if text.trim().is_empty() {
            return;
        }
        // Loose text: wrap in an implicit paragraph.
        self.synthesize(NodeKind::Paragraph);
        let node = Node::text(collapse_whitespace(text), self.marks.clone());
        self.stack.last_mut().expect("stack").children.push(node);
    }

    fn close(&mut self, name: &str) {
        let Some(at) = self.elems.iter().rposition(|(n, _)| n == name) else {
            return;
        };
        while self.elems.len() > at {
            let (_, entry) = self.elems.pop().expect("checked length");
            match entry {
                ElemEntry::Block { depth } => {
                    while self.stack.len() > depth {
                        self.close_top();
                    }
                }
                ElemEntry::Marks(count) => {
                    let keep = self.marks.len().saturating_sub(count);
                    self.marks.truncate(keep);
                }
                ElemEntry::Skip => {}
            }
        }
    }

    fn close_top(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let open = self.stack.pop().expect("checked length");
        if let Some(node) = finalize(open) {
            self.stack
                .last_mut()
                .expect("doc remains")
                .children
                .push(node);
        }
    }

    fn finish(mut self) -> Node {
        while self.stack.len() > 1 {
            self.close_top();
        }
        let doc = self.stack.pop().expect("doc");
        Node::doc(doc.children)
    }
}

/// Turn a finished open node into a tree node, applying drop/fill repair.
fn finalize(open: OpenNode) -> Option<Node> {
    let OpenNode {
        kind,
        attrs,
        children,
    } = open;
    match kind {
        // Containers that are meaningless when empty are dropped.
        NodeKind::BulletList | NodeKind::OrderedList | NodeKind::Table | NodeKind::TableRow
            if children.is_empty() =>
        {
            None
        }
        NodeKind::Table => {
            let padded = pad_table_rows(children);
            Some(Node::new(kind, attrs, Fragment::from_nodes(padded)))
        }
        // Containers that require a child get an empty paragraph.
        NodeKind::ListItem | NodeKind::TableCell | NodeKind::TableHeader
            if children.is_empty() =>
        {
            Some(Node::new(
                kind,
                attrs,
                Fragment::from_node(Node::empty_paragraph()),
            ))
        }
        NodeKind::CodeBlock => {
            let text: String = children.iter().map(Node::text_content).collect();
            let content = if text.is_empty() {
                Fragment::empty()
            } else {
                Fragment::from_node(Node::text(text, Vec::new()))
            };
            Some(Node::new(kind, attrs, content))
        }
        _ => Some(Node::new(kind, attrs, Fragment::from_nodes(children))),
    }
}

/// Append empty cells so every row covers the full grid width.
fn pad_table_rows(rows: Vec<Node>) -> Vec<Node> {
    let table = Node::table(rows);
    let map = TableMap::build(&table);
    table
        .content()
        .children()
        .enumerate()
        .map(|(r, row)| {
            let covered = (0..map.width)
                .filter(|c| map.slot(r, *c).is_some())
                .count();
            if covered >= map.width {
                row.clone()
            } else {
                let mut cells = row.content().to_vec();
                for _ in covered..map.width {
                    cells.push(Node::table_cell(Vec::new()));
                }
                Node::table_row(cells)
            }
        })
        .collect()
}

// ---- attribute extraction ------------------------------------------------

fn get(attrs: &[(String, String)], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.clone())
}

fn style_value(attrs: &[(String, String)], property: &str) -> Option<String> {
    let style = get(attrs, "style")?;
    for decl in style.split(';') {
        let mut parts = decl.splitn(2, ':');
        let prop = parts.next()?.trim().to_ascii_lowercase();
        if prop == property {
            return parts.next().map(|v| v.trim().to_string());
        }
    }
    None
}

fn align_from(attrs: &[(String, String)]) -> Align {
    style_value(attrs, "text-align")
        .and_then(|v| Align::from_css(&v))
        .unwrap_or_default()
}

fn indent_from(attrs: &[(String, String)]) -> u8 {
    get(attrs, "data-indent")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn block_attrs(attrs: &[(String, String)]) -> Attrs {
    Attrs::Paragraph(BlockAttrs {
        align: align_from(attrs),
        indent: indent_from(attrs),
    })
}

fn heading_attrs(attrs: &[(String, String)], level: u8) -> Attrs {
    Attrs::Heading(HeadingAttrs {
        level,
        align: align_from(attrs),
        indent: indent_from(attrs),
    })
}

fn cell_attrs(attrs: &[(String, String)]) -> Attrs {
    Attrs::Cell(CellAttrs {
        colspan: get(attrs, "colspan").and_then(|v| v.parse().ok()).unwrap_or(1),
        rowspan: get(attrs, "rowspan").and_then(|v| v.parse().ok()).unwrap_or(1),
    })
}

fn image_attrs(attrs: &[(String, String)]) -> ImageAttrs {
    ImageAttrs {
        src: get(attrs, "src").unwrap_or_default(),
        alt: get(attrs, "alt").unwrap_or_default(),
        title: get(attrs, "title").filter(|t| !t.is_empty()),
        width: get(attrs, "width").and_then(|v| v.parse().ok()),
        rotate: get(attrs, "data-rotate")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        flip_x: get(attrs, "data-flip-x").as_deref() == Some("true"),
        flip_y: get(attrs, "data-flip-y").as_deref() == Some("true"),
        align: get(attrs, "data-align")
            .and_then(|v| Align::from_css(&v))
            .unwrap_or_default(),
    }
}

fn span_marks(attrs: &[(String, String)]) -> Vec<Mark> {
    let mut marks = Vec::new();
    if let Some(family) = style_value(attrs, "font-family") {
        marks.push(Mark::FontFamily { family });
    }
    if let Some(size) = style_value(attrs, "font-size") {
        marks.push(Mark::FontSize { size });
    }
    if let Some(color) = style_value(attrs, "color") {
        marks.push(Mark::TextColor { color });
    }
    if let Some(color) = style_value(attrs, "background-color") {
        marks.push(Mark::Highlight { color });
    }
    marks
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(ch);
            in_ws = false;
        }
    }
    out
}

//! Document-to-markup serialization: the structural inverse of
//! [`crate::html::parse`]. Output is deterministic — fixed attribute
//! order, canonical mark nesting — so serializing a parsed serialization
//! is a fixed point.

use std::fmt::Write;

use crate::model::Node;
use crate::schema::{Align, Attrs, Mark, NodeKind};

/// Serialize the document body (children of the root) to HTML.
pub fn serialize_body(doc: &Node) -> String {
    let mut out = String::new();
    for child in doc.content().children() {
        write_block(&mut out, child);
    }
    out
}

fn write_block(out: &mut String, node: &Node) {
    match node.kind() {
        NodeKind::Paragraph => {
            write_open(out, "p", &block_extras(node.attrs()));
            write_inline(out, node);
            out.push_str("</p>");
        }
        NodeKind::Heading => {
            let level = match node.attrs() {
                Attrs::Heading(h) => h.level,
                _ => 1,
            };
            let tag = format!("h{level}");
            write_open(out, &tag, &block_extras(node.attrs()));
            write_inline(out, node);
            let _ = write!(out, "</{tag}>");
        }
        NodeKind::Blockquote => {
            out.push_str("<blockquote>");
            for child in node.content().children() {
                write_block(out, child);
            }
            out.push_str("</blockquote>");
        }
        NodeKind::CodeBlock => {
            let mut extras = Vec::new();
            if let Attrs::CodeBlock(c) = node.attrs()
                && let Some(language) = &c.language
            {
                extras.push(("class".to_string(), format!("language-{language}")));
            }
            out.push_str("<pre>");
            write_open(out, "code", &extras);
            out.push_str(&escape_text(&node.text_content()));
            out.push_str("</code></pre>");
        }
        NodeKind::BulletList => {
            out.push_str("<ul>");
            for child in node.content().children() {
                write_block(out, child);
            }
            out.push_str("</ul>");
        }
        NodeKind::OrderedList => {
            let mut extras = Vec::new();
            if let Attrs::OrderedList(o) = node.attrs()
                && o.start != 1
            {
                extras.push(("start".to_string(), o.start.to_string()));
            }
            write_open(out, "ol", &extras);
            for child in node.content().children() {
                write_block(out, child);
            }
            out.push_str("</ol>");
        }
        NodeKind::ListItem => {
            out.push_str("<li>");
            for child in node.content().children() {
                write_block(out, child);
            }
            out.push_str("</li>");
        }
        NodeKind::Table => {
            out.push_str("<table>");
            for child in node.content().children() {
                write_block(out, child);
            }
            out.push_str("</table>");
        }
        NodeKind::TableRow => {
            out.push_str("<tr>");
            for child in node.content().children() {
                write_block(out, child);
            }
            out.push_str("</tr>");
        }
        NodeKind::TableHeader | NodeKind::TableCell => {
            let tag = if node.kind() == NodeKind::TableHeader {
                "th"
            } else {
                "td"
            };
            let mut extras = Vec::new();
            if let Attrs::Cell(c) = node.attrs() {
                if c.colspan != 1 {
                    extras.push(("colspan".to_string(), c.colspan.to_string()));
                }
                if c.rowspan != 1 {
                    extras.push(("rowspan".to_string(), c.rowspan.to_string()));
                }
            }
            write_open(out, tag, &extras);
            for child in node.content().children() {
                write_block(out, child);
            }
            let _ = write!(out, "</{tag}>");
        }
        NodeKind::Image => {
            let mut extras = Vec::new();
            if let Attrs::Image(i) = node.attrs() {
                extras.push(("src".to_string(), i.src.clone()));
                extras.push(("alt".to_string(), i.alt.clone()));
                if let Some(title) = &i.title {
                    extras.push(("title".to_string(), title.clone()));
                }
                if let Some(width) = i.width {
                    extras.push(("width".to_string(), width.to_string()));
                }
                if i.rotate != 0 {
                    extras.push(("data-rotate".to_string(), i.rotate.to_string()));
                }
                if i.flip_x {
                    extras.push(("data-flip-x".to_string(), "true".to_string()));
                }
                if i.flip_y {
                    extras.push(("data-flip-y".to_string(), "true".to_string()));
                }
                if i.align != Align::Left {
                    extras.push(("data-align".to_string(), i.align.as_css().to_string()));
                }
            }
            write_open(out, "img", &extras);
        }
        NodeKind::HorizontalRule => out.push_str("<hr>"),
        NodeKind::PageBreak => out.push_str(r#"<div data-page-break="true"></div>"#),
        NodeKind::Doc | NodeKind::Text => {
            // Doc is handled by the caller; text by write_inline.
            debug_assert!(false, "not a block kind");
        }
    }
}

fn write_inline(out: &mut String, block: &Node) {
    for child in block.content().children() {
        let mut piece = escape_text(child.text_str());
        // Innermost tag first: wrap from the highest rank down, leaving
        // the lowest-ranked mark outermost.
        for mark in child.marks().iter().rev() {
            piece = wrap_mark(mark, &piece);
        }
        out.push_str(&piece);
    }
}

fn wrap_mark(mark: &Mark, inner: &str) -> String {
    match mark {
        Mark::Bold => format!("<strong>{inner}</strong>"),
        Mark::Italic => format!("<em>{inner}</em>"),
        Mark::Underline => format!("<u>{inner}</u>"),
        Mark::Strikethrough => format!("<s>{inner}</s>"),
        Mark::TextColor { color } => {
            format!(r#"<span style="color: {}">{inner}</span>"#, escape_attr(color))
        }
        Mark::Highlight { color } => format!(
            r#"<span style="background-color: {}">{inner}</span>"#,
            escape_attr(color)
        ),
        Mark::FontSize { size } => {
            format!(r#"<span style="font-size: {}">{inner}</span>"#, escape_attr(size))
        }
        Mark::FontFamily { family } => format!(
            r#"<span style="font-family: {}">{inner}</span>"#,
            escape_attr(family)
        ),
        Mark::Link { href, title } => {
            let mut open = format!(r#"<a href="{}""#, escape_attr(href));
            if let Some(title) = title {
                let _ = write!(open, r#" title="{}""#, escape_attr(title));
            }
            format!("{open}>{inner}</a>")
        }
    }
}

fn block_extras(attrs: &Attrs) -> Vec<(String, String)> {
    let mut extras = Vec::new();
    if let Some(align) = attrs.align()
        && align != Align::Left
    {
        extras.push((
            "style".to_string(),
            format!("text-align: {}", align.as_css()),
        ));
    }
    if let Some(indent) = attrs.indent()
        && indent > 0
    {
        extras.push(("data-indent".to_string(), indent.to_string()));
    }
    extras
}

fn write_open(out: &mut String, tag: &str, extras: &[(String, String)]) {
    let _ = write!(out, "<{tag}");
    for (name, value) in extras {
        let _ = write!(out, r#" {name}="{}""#, escape_attr(value));
    }
    out.push('>');
}

fn escape_text(text: &str) -> String {
    html_escape::encode_text(text).to_string()
}

fn escape_attr(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse::parse_document;
    use crate::schema::{BlockAttrs, HeadingAttrs, ImageAttrs};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_simple_doc() {
        let doc = Node::doc(vec![
            Node::heading(1, vec![Node::text("Title", Vec::new())]),
            Node::paragraph_text("Body text."),
        ]);
        insta::assert_snapshot!(
            serialize_body(&doc),
            @"<h1>Title</h1><p>Body text.</p>"
        );
    }

    #[test]
    fn test_serialize_marks_in_rank_order() {
        let doc = Node::doc(vec![Node::paragraph(vec![Node::text(
            "x",
            vec![
                Mark::Italic,
                Mark::Bold,
                Mark::Link {
                    href: "https://example.com".into(),
                    title: None,
                },
            ],
        )])]);
        insta::assert_snapshot!(
            serialize_body(&doc),
            @r#"<p><a href="https://example.com"><strong><em>x</em></strong></a></p>"#
        );
    }

    #[test]
    fn test_serialize_block_attrs() {
        let doc = Node::doc(vec![Node::paragraph(vec![Node::text("x", Vec::new())])
            .with_attrs(Attrs::Paragraph(BlockAttrs {
                align: Align::Center,
                indent: 3,
            }))]);
        insta::assert_snapshot!(
            serialize_body(&doc),
            @r#"<p style="text-align: center" data-indent="3">x</p>"#
        );
    }

    #[test]
    fn test_serialize_table_with_spans() {
        let doc = Node::doc(vec![Node::table(vec![
            Node::table_row(vec![Node::cell_of(
                NodeKind::TableHeader,
                crate::schema::CellAttrs {
                    colspan: 2,
                    rowspan: 1,
                },
                vec![Node::paragraph_text("h")],
            )]),
            Node::table_row(vec![
                Node::table_cell(vec![Node::paragraph_text("a")]),
                Node::table_cell(vec![Node::paragraph_text("b")]),
            ]),
        ])]);
        insta::assert_snapshot!(
            serialize_body(&doc),
            @r#"<table><tr><th colspan="2"><p>h</p></th></tr><tr><td><p>a</p></td><td><p>b</p></td></tr></table>"#
        );
    }

    #[test]
    fn test_serialize_image_attrs() {
        let doc = Node::doc(vec![Node::image(ImageAttrs {
            src: "pic.png".into(),
            alt: "a pic".into(),
            title: None,
            width: Some(120),
            rotate: 90,
            flip_x: true,
            flip_y: false,
            align: Align::Center,
        })]);
        insta::assert_snapshot!(
            serialize_body(&doc),
            @r#"<img src="pic.png" alt="a pic" width="120" data-rotate="90" data-flip-x="true" data-align="center">"#
        );
    }

    #[test]
    fn test_text_escaped() {
        let doc = Node::doc(vec![Node::paragraph_text("a < b & c")]);
        let html = serialize_body(&doc);
        assert!(html.contains("&lt;"));
        assert!(html.contains("&amp;"));
        assert_eq!(parse_document(&html).text_content(), "a < b & c");
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let doc = Node::doc(vec![
            Node::heading(2, vec![Node::text("Head", vec![Mark::Italic])]),
            Node::paragraph(vec![
                Node::text("plain ", Vec::new()),
                Node::text("bold", vec![Mark::Bold]),
            ]),
            Node::bullet_list(vec![
                Node::list_item(vec![Node::paragraph_text("one")]),
                Node::list_item(vec![Node::paragraph_text("two")]),
            ]),
            Node::code_block(Some("rust".into()), "fn main() {}"),
            Node::table(vec![Node::table_row(vec![
                Node::table_header(vec![Node::paragraph_text("h")]),
                Node::table_cell(vec![Node::paragraph_text("c")]),
            ])]),
            Node::horizontal_rule(),
            Node::page_break(),
        ]);
        let html = serialize_body(&doc);
        let reparsed = parse_document(&html);
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_serialization_idempotent() {
        // serialize(parse(serialize(d))) == serialize(d), also for content
        // that arrives via messy external markup.
        let messy = "<div><P>one</P><table><tr><td>x</td></tr><p>stray</p></table></div>";
        let once = serialize_body(&parse_document(messy));
        let twice = serialize_body(&parse_document(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_heading_level_tags() {
        for level in 1..=6u8 {
            let doc = Node::doc(vec![Node::heading(level, vec![Node::text("t", Vec::new())])]);
            let html = serialize_body(&doc);
            assert!(html.starts_with(&format!("<h{level}>")));
            let back = parse_document(&html);
            assert!(matches!(
                back.child(0).attrs(),
                Attrs::Heading(HeadingAttrs { level: l, .. }) if *l == level
            ));
        }
    }
}

//! Word export: a minimal OPC package holding one WordprocessingML
//! document part.
//!
//! The conversion is paragraph-granular and documented as lossy: every
//! textblock becomes a `<w:p>` with bold/italic/underline/strikethrough
//! kept at run level, table rows are flattened to tab-separated
//! paragraphs, page breaks map to real page breaks, and images are
//! dropped. The container is a stored (uncompressed) ZIP written by hand;
//! entries carry correct CRC-32s and central directory offsets.

use std::fmt::Write;

use crate::model::Node;
use crate::schema::{Mark, NodeKind};

/// Encode the document as `.docx` bytes.
pub fn to_docx(doc: &Node) -> Vec<u8> {
    let document = document_xml(doc);
    write_zip(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", RELS.as_bytes()),
        ("word/document.xml", document.as_bytes()),
    ])
}

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#
);

const RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

fn document_xml(doc: &Node) -> String {
    let mut body = String::new();
    for block in doc.content().children() {
        write_block(&mut body, block);
    }
    if body.is_empty() {
        body.push_str("<w:p/>");
    }
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body>{}</w:body></w:document>"
        ),
        body
    )
}

fn write_block(out: &mut String, node: &Node) {
    match node.kind() {
        NodeKind::Paragraph | NodeKind::Heading | NodeKind::CodeBlock => {
            write_paragraph(out, node, node.kind() == NodeKind::Heading)
        }
        NodeKind::Blockquote | NodeKind::ListItem => {
            for child in node.content().children() {
                write_block(out, child);
            }
        }
        NodeKind::BulletList | NodeKind::OrderedList => {
            for item in node.content().children() {
                write_block(out, item);
            }
        }
        NodeKind::Table => {
            for row in node.content().children() {
                write_table_row(out, row);
            }
        }
        NodeKind::PageBreak => {
            out.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        }
        NodeKind::HorizontalRule => out.push_str("<w:p/>"),
        // Images are not carried into the minimal package.
        NodeKind::Image => {}
        NodeKind::Doc | NodeKind::TableRow | NodeKind::TableHeader | NodeKind::TableCell
        | NodeKind::Text => {}
    }
}

fn write_paragraph(out: &mut String, block: &Node, force_bold: bool) {
    out.push_str("<w:p>");
    for run in block.content().children() {
        write_run(out, run.text_str(), run.marks(), force_bold);
    }
    out.push_str("</w:p>");
}

/// One flattened paragraph per table row, cells separated by tabs.
fn write_table_row(out: &mut String, row: &Node) {
    out.push_str("<w:p>");
    for (i, cell) in row.content().children().enumerate() {
        if i > 0 {
            out.push_str("<w:r><w:tab/></w:r>");
        }
        let text = cell.text_content();
        write_run(out, &text, &[], cell.kind() == NodeKind::TableHeader);
    }
    out.push_str("</w:p>");
}

fn write_run(out: &mut String, text: &str, marks: &[Mark], force_bold: bool) {
    if text.is_empty() {
        return;
    }
    let mut props = String::new();
    if force_bold || marks.contains(&Mark::Bold) {
        props.push_str("<w:b/>");
    }
    if marks.contains(&Mark::Italic) {
        props.push_str("<w:i/>");
    }
    if marks.contains(&Mark::Underline) {
        props.push_str(r#"<w:u w:val="single"/>"#);
    }
    if marks.contains(&Mark::Strikethrough) {
        props.push_str("<w:strike/>");
    }
    out.push_str("<w:r>");
    if !props.is_empty() {
        let _ = write!(out, "<w:rPr>{props}</w:rPr>");
    }
    let _ = write!(
        out,
        r#"<w:t xml:space="preserve">{}</w:t>"#,
        escape_xml(text)
    );
    out.push_str("</w:r>");
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

// ---- stored ZIP container ------------------------------------------------

pub(crate) fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xedb8_8320 & mask);
        }
    }
    !crc
}

fn write_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut records = Vec::new();

    for (name, data) in entries {
        let offset = out.len() as u32;
        let crc = crc32(data);
        let size = data.len() as u32;
        // Local file header, stored entry, zeroed timestamp.
        out.extend_from_slice(&[0x50, 0x4b, 0x03, 0x04]);
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // method: stored
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes()); // compressed
        out.extend_from_slice(&size.to_le_bytes()); // uncompressed
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra len
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);
        records.push((*name, crc, size, offset));
    }

    let central_start = out.len() as u32;
    for (name, crc, size, offset) in &records {
        out.extend_from_slice(&[0x50, 0x4b, 0x01, 0x02]);
        out.extend_from_slice(&20u16.to_le_bytes()); // version made by
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // method
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra len
        out.extend_from_slice(&0u16.to_le_bytes()); // comment len
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number
        out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
    }
    let central_size = out.len() as u32 - central_start;

    // End of central directory.
    out.extend_from_slice(&[0x50, 0x4b, 0x05, 0x06]);
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number
    out.extend_from_slice(&0u16.to_le_bytes()); // central dir disk
    out.extend_from_slice(&(records.len() as u16).to_le_bytes());
    out.extend_from_slice(&(records.len() as u16).to_le_bytes());
    out.extend_from_slice(&central_size.to_le_bytes());
    out.extend_from_slice(&central_start.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // comment len
    out
}

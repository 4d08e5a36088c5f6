//! Export encoders: pure transforms of a document into bytes. These sit
//! outside the edit protocol; they read a finished document and never
//! touch editor state.

pub mod docx;

use crate::html::serialize_body;
use crate::model::Node;

pub use docx::to_docx;

/// Plain-text export: block contents separated by blank lines, atoms
/// dropped.
pub fn to_text(doc: &Node) -> String {
    doc.text_between(0, doc.content_size(), "\n\n", "")
        .trim()
        .to_string()
}

/// Standalone HTML export: the serialized body in a minimal printable
/// shell.
pub fn to_html(doc: &Node) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
            "<title>Document</title></head>",
            "<body style=\"font-family:Arial;max-width:800px;margin:40px auto;padding:20px\">",
            "{}</body></html>"
        ),
        serialize_body(doc)
    )
}

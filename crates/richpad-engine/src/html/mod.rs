//! HTML persistence format: a forgiving parser and a deterministic
//! serializer over the document schema.
//!
//! The serialized body is what gets persisted and re-loaded between
//! sessions, so the pair is designed as a fixed point:
//! `serialize(parse(serialize(d))) == serialize(d)` for any document the
//! command layer can produce.

pub mod parse;
pub mod serialize;
pub mod tokenizer;

pub use parse::parse_document;
pub use serialize::serialize_body;

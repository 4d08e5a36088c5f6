//! Terminal front door for the richpad engine: load a saved pad (or any
//! HTML fragment), inspect it, export it, or run a small scripted demo of
//! the command layer. All document behavior lives in the engine; this
//! binary only shuttles bytes.

use std::time::{Duration, Instant};
use std::{env, fs, path::Path, process};

use anyhow::{Context, Result, bail};
use richpad_engine::editing::commands;
use richpad_engine::export;
use richpad_engine::html::{parse_document, serialize_body};
use richpad_engine::model::Node;
use richpad_engine::schema::{Attrs, Mark, NodeKind};
use richpad_engine::session::Session;
use richpad_engine::store::MemoryStore;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("stats") => cmd_stats(&args[1..]),
        Some("export") => cmd_export(&args[1..]),
        Some("new") => cmd_new(&args[1..]),
        Some("demo") => cmd_demo(),
        Some("help") | None => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            eprintln!("unknown command: {other}");
            print_usage();
            process::exit(2);
        }
    };
    if let Err(err) = result {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!("richpad - rich text pad engine");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  richpad stats <file.html>                 word/character/block counts");
    eprintln!("  richpad export <file.html> <txt|html|docx> <out>");
    eprintln!("  richpad new <file.html>                   write an empty pad");
    eprintln!("  richpad demo                              run a scripted editing session");
}

fn load_doc(path: &str) -> Result<Node> {
    let html =
        fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    Ok(parse_document(&html))
}

fn cmd_stats(args: &[String]) -> Result<()> {
    let [path] = args else {
        bail!("usage: richpad stats <file.html>");
    };
    let doc = load_doc(path)?;
    let text = export::to_text(&doc);
    let words = text.split_whitespace().count();
    let chars = text.chars().filter(|c| !c.is_whitespace()).count();
    let blocks = doc.child_count();
    let mut tables = 0;
    let mut images = 0;
    doc.nodes_between(0, doc.content_size(), &mut |node, _| {
        match node.kind() {
            NodeKind::Table => tables += 1,
            NodeKind::Image => images += 1,
            _ => {}
        }
        true
    });
    println!("blocks: {blocks}");
    println!("words: {words}");
    println!("characters: {chars}");
    println!("tables: {tables}");
    println!("images: {images}");
    Ok(())
}

fn cmd_export(args: &[String]) -> Result<()> {
    let [path, format, out] = args else {
        bail!("usage: richpad export <file.html> <txt|html|docx> <out>");
    };
    let doc = load_doc(path)?;
    let bytes: Vec<u8> = match format.as_str() {
        "txt" => export::to_text(&doc).into_bytes(),
        "html" => export::to_html(&doc).into_bytes(),
        "docx" => export::to_docx(&doc),
        other => bail!("unknown export format: {other} (expected txt, html or docx)"),
    };
    fs::write(out, bytes).with_context(|| format!("writing {out}"))?;
    println!("wrote {out}");
    Ok(())
}

fn cmd_new(args: &[String]) -> Result<()> {
    let [path] = args else {
        bail!("usage: richpad new <file.html>");
    };
    if Path::new(path).exists() {
        bail!("{path} already exists");
    }
    let doc = richpad_engine::session::default_document();
    fs::write(path, serialize_body(&doc)).with_context(|| format!("writing {path}"))?;
    println!("created {path}");
    Ok(())
}

/// Scripted tour of the command layer: builds a small document the same
/// way a UI would, then prints the serialized result.
fn cmd_demo() -> Result<()> {
    let mut session = Session::open(MemoryStore::new())?;
    let mut now = Instant::now();
    let mut tick = || {
        now += Duration::from_secs(1);
        now
    };

    session.insert_text("richpad demo", tick());
    session.run(
        commands::set_block_type(NodeKind::Heading, Attrs::Heading(Default::default())),
        tick(),
    );
    session.run(commands::split_block, tick());
    session.run(commands::toggle_mark(Mark::Bold), tick());
    session.insert_text("Bold lead-in. ", tick());
    session.run(commands::toggle_mark(Mark::Bold), tick());
    session.insert_text("Plain continuation.", tick());
    session.run(commands::insert_table(2, 3), tick());
    session.insert_text("A paragraph after the table.", tick());

    println!("{}", serialize_body(session.doc()));
    eprintln!();
    eprintln!("-- plain text --");
    eprintln!("{}", export::to_text(session.doc()));
    Ok(())
}

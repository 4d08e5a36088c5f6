//! Markdown-style typing shortcuts: `- `, `* `, `1. ` and `#`-runs at the
//! start of a paragraph convert it in place as soon as the trailing space
//! is typed.

use std::sync::LazyLock;

use regex::Regex;

use crate::editing::commands::{DispatchFn, send};
use crate::editing::selection::Selection;
use crate::editing::transaction::{EditorState, Transaction};
use crate::model::{Fragment, Node, ResolvedPos, Slice};
use crate::schema::NodeKind;

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([-*])\s$").expect("static pattern"));
static ORDERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.\s$").expect("static pattern"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s$").expect("static pattern"));

/// Check the text between the cursor's paragraph start and the cursor
/// against the input rules; fires at most one. Meant to run right after a
/// text insertion.
pub fn apply_after_input(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Selection::Text { anchor, head } = &state.selection else {
        return false;
    };
    if anchor != head {
        return false;
    }
    let cursor = *head;
    let Ok(rp) = ResolvedPos::resolve(&state.doc, cursor) else {
        return false;
    };
    if rp.parent().kind() != NodeKind::Paragraph {
        return false;
    }
    let block_start = rp.start(rp.depth());
    let block_pos = rp.before(rp.depth());
    let prefix = state.doc.text_between(block_start, cursor, "", "");

    if let Some(caps) = HEADING_RE.captures(&prefix) {
        let level = caps[1].len() as u8;
        return convert_block(state, dispatch, block_pos, block_start, cursor, |rest| {
            Node::heading(level, rest)
        });
    }
    if BULLET_RE.is_match(&prefix) {
        return wrap_block(state, dispatch, block_pos, block_start, cursor, |item| {
            Node::bullet_list(vec![item])
        });
    }
    if let Some(caps) = ORDERED_RE.captures(&prefix) {
        let start: u32 = caps[1].parse().unwrap_or(1);
        return wrap_block(state, dispatch, block_pos, block_start, cursor, move |item| {
            Node::ordered_list(start, vec![item])
        });
    }
    false
}

/// Delete the matched prefix and swap the paragraph for another textblock.
fn convert_block(
    state: &EditorState,
    dispatch: Option<DispatchFn>,
    block_pos: usize,
    block_start: usize,
    cursor: usize,
    make: impl FnOnce(Vec<Node>) -> Node,
) -> bool {
    let mut tx = Transaction::new(state);
    if tx.delete(block_start, cursor).is_err() {
        return false;
    }
    let Some(block) = tx.doc().node_at(block_pos).cloned() else {
        return false;
    };
    let replacement = make(block.content().to_vec());
    if tx
        .replace_range(
            block_pos,
            block_pos + block.node_size(),
            Slice::flat(Fragment::from_node(replacement)),
        )
        .is_err()
    {
        return false;
    }
    if tx.set_selection(Selection::cursor(block_start)).is_err() {
        return false;
    }
    send(dispatch, tx);
    true
}

/// Delete the matched prefix and wrap the paragraph in a list.
fn wrap_block(
    state: &EditorState,
    dispatch: Option<DispatchFn>,
    block_pos: usize,
    block_start: usize,
    cursor: usize,
    make: impl FnOnce(Node) -> Node,
) -> bool {
    let mut tx = Transaction::new(state);
    if tx.delete(block_start, cursor).is_err() {
        return false;
    }
    let Some(block) = tx.doc().node_at(block_pos).cloned() else {
        return false;
    };
    let list = make(Node::list_item(vec![block.clone()]));
    if tx
        .replace_range(
            block_pos,
            block_pos + block.node_size(),
            Slice::flat(Fragment::from_node(list)),
        )
        .is_err()
    {
        return false;
    }
    // The paragraph content start moved two levels deeper.
    if tx.set_selection(Selection::cursor(block_start + 2)).is_err() {
        return false;
    }
    send(dispatch, tx);
    true
}

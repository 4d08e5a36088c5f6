//! User-facing edit operations over [`EditorState`].
//!
//! Every command follows the dry-run contract: called without a dispatch
//! function it only reports whether it is applicable, so UI affordances can
//! enable/disable themselves; called with one it builds a [`Transaction`]
//! and hands it over. Commands return `false` instead of failing — a
//! rejected step aborts the command and leaves the state untouched.

use crate::editing::selection::Selection;
use crate::editing::transaction::{EditorState, Origin, Transaction};
use crate::model::{Fragment, Node, ResolvedPos, Slice};
use crate::schema::{
    Align, Attrs, ContentRule, ImageAttrs, Mark, MarkKind, MIN_IMAGE_WIDTH, NodeKind,
    contains_kind,
};

/// Receiver for the transaction a command builds when it runs for real.
pub type DispatchFn<'a> = &'a mut dyn FnMut(Transaction);

pub(crate) fn send(dispatch: Option<DispatchFn>, tx: Transaction) {
    if let Some(dispatch) = dispatch {
        dispatch(tx);
    }
}

// ---- inspection helpers --------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MarkRun {
    pub from: usize,
    pub to: usize,
    pub marks: Vec<Mark>,
}

/// Text runs intersecting a range, clipped to it. Blocks that do not admit
/// marks are skipped entirely.
pub(crate) fn mark_runs(doc: &Node, from: usize, to: usize) -> Vec<MarkRun> {
    let mut runs = Vec::new();
    doc.nodes_between(from, to, &mut |node, pos| {
        if node.is_text() {
            let start = pos.max(from);
            let end = (pos + node.node_size()).min(to);
            if start < end {
                runs.push(MarkRun {
                    from: start,
                    to: end,
                    marks: node.marks().to_vec(),
                });
            }
            false
        } else {
            node.kind().allows_marks()
        }
    });
    runs
}

/// Marks a collapsed cursor would hand to newly typed text.
pub fn marks_at(doc: &Node, pos: usize) -> Vec<Mark> {
    let Ok(rp) = ResolvedPos::resolve(doc, pos) else {
        return Vec::new();
    };
    if !rp.parent().kind().is_textblock() || !rp.parent().kind().allows_marks() {
        return Vec::new();
    }
    if let Some(before) = rp.node_before()
        && before.is_text()
    {
        return before.marks().to_vec();
    }
    if let Some(after) = rp.node_after()
        && after.is_text()
    {
        return after.marks().to_vec();
    }
    Vec::new()
}

/// The flat ranges a selection covers for inline operations: one for text,
/// one per selected cell for cell selections.
pub(crate) fn selection_ranges(state: &EditorState) -> Vec<(usize, usize)> {
    match &state.selection {
        Selection::Cell { .. } => crate::editing::tables::selected_cell_ranges(state),
        sel => vec![sel.range(&state.doc)],
    }
}

pub fn range_has_mark(doc: &Node, from: usize, to: usize, kind: MarkKind) -> bool {
    mark_runs(doc, from, to)
        .iter()
        .any(|run| contains_kind(&run.marks, kind))
}

/// Whether a mark kind is active for the current selection: stored marks or
/// cursor marks when collapsed, any marked text in the range otherwise.
pub fn mark_active(state: &EditorState, kind: MarkKind) -> bool {
    if state.selection.is_collapsed() {
        let marks = state
            .stored_marks
            .clone()
            .unwrap_or_else(|| marks_at(&state.doc, cursor(state)));
        return contains_kind(&marks, kind);
    }
    selection_ranges(state)
        .iter()
        .any(|(from, to)| range_has_mark(&state.doc, *from, *to, kind))
}

fn cursor(state: &EditorState) -> usize {
    state.selection.range(&state.doc).0
}

/// Textblocks intersecting a range, with the position before each.
pub(crate) fn blocks_in_range(doc: &Node, from: usize, to: usize) -> Vec<(usize, Node)> {
    if from == to {
        let Ok(rp) = ResolvedPos::resolve(doc, from) else {
            return Vec::new();
        };
        if rp.depth() > 0 && rp.parent().kind().is_textblock() {
            return vec![(rp.before(rp.depth()), rp.parent().clone())];
        }
        return Vec::new();
    }
    let mut blocks = Vec::new();
    doc.nodes_between(from, to, &mut |node, pos| {
        if node.kind().is_textblock() {
            blocks.push((pos, node.clone()));
            false
        } else {
            !node.kind().is_leaf()
        }
    });
    blocks
}

fn block_ranges(state: &EditorState) -> Vec<(usize, Node)> {
    selection_ranges(state)
        .iter()
        .flat_map(|(from, to)| blocks_in_range(&state.doc, *from, *to))
        .collect()
}

// ---- mark commands -------------------------------------------------------

/// Toggle a boolean mark. With a collapsed cursor only the stored marks
/// change; they apply to the next typed character.
pub fn toggle_mark(mark: Mark) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        let kind = mark.kind();
        if state.selection.is_collapsed() {
            let current = state
                .stored_marks
                .clone()
                .unwrap_or_else(|| marks_at(&state.doc, cursor(state)));
            let next = if contains_kind(&current, kind) {
                crate::schema::remove_mark_kind(&current, kind)
            } else {
                crate::schema::add_mark(&current, mark.clone())
            };
            let mut tx = Transaction::new(state);
            tx.set_stored_marks(Some(next));
            send(dispatch, tx);
            return true;
        }

        let ranges = selection_ranges(state);
        let runs: Vec<MarkRun> = ranges
            .iter()
            .flat_map(|(from, to)| mark_runs(&state.doc, *from, *to))
            .collect();
        if runs.is_empty() {
            return false;
        }
        let active = runs.iter().any(|run| contains_kind(&run.marks, kind));
        let mut tx = Transaction::new(state);
        let ok = if active {
            remove_kind_from_runs(&mut tx, &runs, kind)
        } else {
            add_mark_to_runs(&mut tx, &runs, &mark)
        };
        if !ok {
            return false;
        }
        send(dispatch, tx);
        true
    }
}

/// Apply a parameterized mark (color, font, link) over the selection,
/// replacing any existing mark of the same kind. Not applicable to a
/// collapsed selection.
pub fn set_mark(mark: Mark) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        if state.selection.is_collapsed() {
            return false;
        }
        let runs: Vec<MarkRun> = selection_ranges(state)
            .iter()
            .flat_map(|(from, to)| mark_runs(&state.doc, *from, *to))
            .collect();
        if runs.is_empty() {
            return false;
        }
        let mut tx = Transaction::new(state);
        if !remove_kind_from_runs(&mut tx, &runs, mark.kind())
            || !add_mark_to_runs(&mut tx, &runs, &mark)
        {
            return false;
        }
        send(dispatch, tx);
        true
    }
}

/// Link the selected text; replaces an existing link on the range. The
/// caller is expected to have prompted for the URL already.
pub fn add_link(href: String, title: Option<String>) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    set_mark(Mark::Link { href, title })
}

/// Per-run removal so every step inverts to exactly the marks that were
/// there.
fn remove_kind_from_runs(tx: &mut Transaction, runs: &[MarkRun], kind: MarkKind) -> bool {
    for run in runs {
        for mark in run.marks.iter().filter(|m| m.kind() == kind) {
            if tx.remove_mark(run.from, run.to, mark.clone()).is_err() {
                return false;
            }
        }
    }
    true
}

fn add_mark_to_runs(tx: &mut Transaction, runs: &[MarkRun], mark: &Mark) -> bool {
    for run in runs {
        if run.marks.contains(mark) {
            continue;
        }
        if tx.add_mark(run.from, run.to, mark.clone()).is_err() {
            return false;
        }
    }
    true
}

// ---- text entry ----------------------------------------------------------

/// Delete whatever the selection covers, leaving the transaction ready for
/// a follow-up insertion. Returns the position the cursor lands on. Wiping
/// the whole document leaves one empty paragraph behind.
fn delete_covered(tx: &mut Transaction, state: &EditorState) -> Option<usize> {
    let (from, to) = state.selection.range(&state.doc);
    if (from, to) == (0, state.doc.content_size()) {
        tx.replace_range(
            0,
            to,
            Slice::flat(Fragment::from_node(Node::empty_paragraph())),
        )
        .ok()?;
        return Some(1);
    }
    tx.delete(from, to).ok()?;
    Some(tx.map_pos(from))
}

/// Insert typed text at the selection, replacing any selected range and
/// consuming stored marks.
pub fn insert_text(text: String) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        if matches!(state.selection, Selection::Cell { .. }) {
            return false;
        }
        let (from, _) = state.selection.range(&state.doc);
        let marks = state
            .stored_marks
            .clone()
            .unwrap_or_else(|| marks_at(&state.doc, from));
        let mut tx = Transaction::new(state);
        tx.set_origin(Origin::Typing);
        let Some(at) = delete_covered(&mut tx, state) else {
            return false;
        };
        if tx.insert_text(at, &text, marks).is_err() {
            return false;
        }
        let end = at + text.chars().count();
        if tx.set_selection(Selection::cursor(end)).is_err() {
            return false;
        }
        tx.scroll_into_view();
        send(dispatch, tx);
        true
    }
}

/// Delete the selected range; not applicable to a collapsed cursor.
pub fn delete_selection(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    if state.selection.is_collapsed() {
        return false;
    }
    let mut tx = Transaction::new(state);
    tx.set_origin(Origin::Backspace);
    if delete_covered(&mut tx, state).is_none() {
        return false;
    }
    tx.scroll_into_view();
    send(dispatch, tx);
    true
}

/// Backspace: delete the selection, or the character before a collapsed
/// cursor. At a block start the block is joined into a preceding textblock,
/// a preceding atom is removed, and any other preceding node (table, list,
/// quote) is selected whole rather than destroyed.
pub fn delete_backward(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    if !state.selection.is_collapsed() {
        return delete_selection(state, dispatch);
    }
    let pos = cursor(state);
    let Ok(rp) = ResolvedPos::resolve(&state.doc, pos) else {
        return false;
    };
    let mut tx = Transaction::new(state);
    tx.set_origin(Origin::Backspace);

    if rp.depth() > 0 && rp.parent_offset > 0 {
        // Inside a textblock's content: plain character delete.
        if tx.delete(pos - 1, pos).is_err() {
            return false;
        }
        tx.scroll_into_view();
        send(dispatch, tx);
        return true;
    }

    // At the start of a block: look at what precedes it.
    let block_depth = rp.depth();
    if block_depth == 0 {
        return false;
    }
    let block_start = rp.before(block_depth);
    let parent = rp.node(block_depth - 1);
    let index = rp.index(block_depth - 1);
    if index == 0 {
        return false;
    }
    let sibling = parent.child(index - 1);
    if sibling.kind().is_textblock() {
        // Join: delete from the end of the previous block's content.
        if tx.delete(block_start - 1, pos).is_err() {
            return false;
        }
    } else if sibling.kind().is_atom() {
        if tx.delete(block_start - 1, block_start).is_err() {
            return false;
        }
    } else {
        // Structured sibling: select it instead of deleting into it.
        let sibling_pos = block_start - sibling.node_size();
        if tx.set_selection(Selection::Node { pos: sibling_pos }).is_err() {
            return false;
        }
    }
    tx.scroll_into_view();
    send(dispatch, tx);
    true
}

// ---- block commands ------------------------------------------------------

/// Change every textblock touched by the selection to the given kind and
/// attributes. Not applicable when they all already match.
pub fn set_block_type(
    kind: NodeKind,
    attrs: Attrs,
) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        debug_assert!(kind.is_textblock());
        let blocks = block_ranges(state);
        let attrs = attrs.clone().normalized();
        let differing: Vec<&(usize, Node)> = blocks
            .iter()
            .filter(|(_, b)| b.kind() != kind || b.attrs() != &attrs)
            .collect();
        if differing.is_empty() {
            return false;
        }
        let mut tx = Transaction::new(state);
        for (pos, block) in differing {
            if block.kind() == kind {
                if tx.set_attrs(*pos, attrs.clone()).is_err() {
                    return false;
                }
                continue;
            }
            let replacement = convert_textblock(block, kind, &attrs);
            // Same content size on both sides, so later positions hold.
            let ok = tx.replace_range(
                *pos,
                *pos + block.node_size(),
                Slice::flat(Fragment::from_node(replacement)),
            );
            if ok.is_err() {
                return false;
            }
        }
        send(dispatch, tx);
        true
    }
}

fn convert_textblock(block: &Node, kind: NodeKind, attrs: &Attrs) -> Node {
    let content = if kind == NodeKind::CodeBlock {
        // Code blocks hold a single unmarked run.
        let text = block.text_content();
        if text.is_empty() {
            Fragment::empty()
        } else {
            Fragment::from_node(Node::text(text, Vec::new()))
        }
    } else {
        block.content().clone()
    };
    Node::new(kind, attrs.clone(), content)
}

/// Set the alignment attribute on every paragraph and heading in the
/// selection.
pub fn set_align(align: Align) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        let blocks: Vec<(usize, Node)> = block_ranges(state)
            .into_iter()
            .filter(|(_, b)| matches!(b.kind(), NodeKind::Paragraph | NodeKind::Heading))
            .collect();
        let changed: Vec<&(usize, Node)> = blocks
            .iter()
            .filter(|(_, b)| b.attrs().align() != Some(align))
            .collect();
        if changed.is_empty() {
            return false;
        }
        let mut tx = Transaction::new(state);
        for (pos, block) in changed {
            let Some(attrs) = block.attrs().with_align(align) else {
                continue;
            };
            if tx.set_attrs(*pos, attrs).is_err() {
                return false;
            }
        }
        send(dispatch, tx);
        true
    }
}

/// Direction for [`adjust_indent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentDir {
    In,
    Out,
}

/// Tab/Shift-Tab behavior: native list nesting wins when the selection is
/// inside a list item; otherwise the numeric indent attribute moves within
/// its clamped range. Returns false when nothing would change.
pub fn adjust_indent(dir: IndentDir) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        if in_list_item(state) {
            return match dir {
                IndentDir::In => sink_list_item(state, dispatch),
                IndentDir::Out => lift_list_item(state, dispatch),
            };
        }
        let blocks: Vec<(usize, Node)> = block_ranges(state)
            .into_iter()
            .filter(|(_, b)| matches!(b.kind(), NodeKind::Paragraph | NodeKind::Heading))
            .collect();
        let mut tx = Transaction::new(state);
        let mut changed = false;
        for (pos, block) in &blocks {
            let Some(indent) = block.attrs().indent() else {
                continue;
            };
            let next = match dir {
                IndentDir::In => indent.saturating_add(1).min(crate::schema::MAX_INDENT),
                IndentDir::Out => indent.saturating_sub(1),
            };
            if next == indent {
                continue;
            }
            let Some(attrs) = block.attrs().with_indent(next) else {
                continue;
            };
            if tx.set_attrs(*pos, attrs).is_err() {
                return false;
            }
            changed = true;
        }
        if !changed {
            return false;
        }
        send(dispatch, tx);
        true
    }
}

// ---- list commands -------------------------------------------------------

fn in_list_item(state: &EditorState) -> bool {
    let (from, _) = state.selection.range(&state.doc);
    ResolvedPos::resolve(&state.doc, from)
        .is_ok_and(|rp| rp.ancestor_of_kind(NodeKind::ListItem).is_some())
}

/// Wrap the textblocks covered by the selection in a new list.
pub fn wrap_in_list(kind: NodeKind) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        debug_assert!(matches!(kind, NodeKind::BulletList | NodeKind::OrderedList));
        let (from, to) = match state.selection.text_points() {
            Some(points) => points,
            None => return false,
        };
        let Ok(rfrom) = ResolvedPos::resolve(&state.doc, from) else {
            return false;
        };
        // Deepest ancestor with block content that covers the whole range.
        let mut depth = rfrom.shared_depth(to);
        while rfrom.node(depth).content_rule() != ContentRule::Blocks {
            if depth == 0 {
                return false;
            }
            depth -= 1;
        }
        let parent = rfrom.node(depth);
        let content_start = rfrom.start(depth);
        // Child index range covered by the selection.
        let mut start_index = None;
        let mut end_index = 0;
        let mut pos = content_start;
        for (i, child) in parent.content().children().enumerate() {
            let end = pos + child.node_size();
            if end > from && pos < to {
                if !child.kind().is_textblock() {
                    return false;
                }
                if start_index.is_none() {
                    start_index = Some((i, pos));
                }
                end_index = i;
            }
            pos = end;
        }
        let Some((start_index, start_pos)) = start_index else {
            return false;
        };
        let blocks: Vec<Node> = (start_index..=end_index)
            .map(|i| parent.child(i).clone())
            .collect();
        let end_pos = start_pos + blocks.iter().map(Node::node_size).sum::<usize>();
        let items: Vec<Node> = blocks.into_iter().map(|b| Node::list_item(vec![b])).collect();
        let list = Node::new(kind, kind.default_attrs(), Fragment::from_nodes(items));

        let mut tx = Transaction::new(state);
        if tx
            .replace_range(start_pos, end_pos, Slice::flat(Fragment::from_node(list)))
            .is_err()
        {
            return false;
        }
        // Two container layers opened before the cursor's block.
        if tx.set_selection(Selection::cursor(from + 2)).is_err() {
            return false;
        }
        send(dispatch, tx);
        true
    }
}

/// Context of the list item containing the selection head.
struct ListContext {
    /// Position before the list node.
    list_pos: usize,
    list: Node,
    /// Index of the item within the list.
    item_index: usize,
    /// Position before the item.
    item_pos: usize,
    /// Depth of the list node in the resolved path.
    list_depth: usize,
    rp: ResolvedPos,
}

fn list_context(state: &EditorState) -> Option<ListContext> {
    let (from, _) = state.selection.range(&state.doc);
    let rp = ResolvedPos::resolve(&state.doc, from).ok()?;
    let item_depth = rp.ancestor_of_kind(NodeKind::ListItem)?;
    // A list item always sits in a list, which sits in some block context.
    if item_depth < 2 {
        return None;
    }
    let list_depth = item_depth - 1;
    Some(ListContext {
        list_pos: rp.before(list_depth),
        list: rp.node(list_depth).clone(),
        item_index: rp.index(list_depth),
        item_pos: rp.before(item_depth),
        list_depth,
        rp,
    })
}

/// Nest the current list item one level deeper under its previous sibling.
pub fn sink_list_item(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Some(ctx) = list_context(state) else {
        return false;
    };
    if ctx.item_index == 0 {
        return false;
    }
    let list = &ctx.list;
    let prev = list.child(ctx.item_index - 1);
    let item = list.child(ctx.item_index).clone();

    // Merge into an existing trailing sublist of the same kind, otherwise
    // open a fresh one.
    let (new_prev, cursor_delta): (Node, isize) = match prev.content().last_child() {
        Some(tail) if tail.kind() == list.kind() => {
            let tail_items = {
                let mut items = tail.content().to_vec();
                items.push(item);
                items
            };
            let new_tail = tail.copy(Fragment::from_nodes(tail_items));
            let mut prev_children = prev.content().to_vec();
            let last = prev_children.len() - 1;
            prev_children[last] = new_tail;
            (prev.copy(Fragment::from_nodes(prev_children)), -2)
        }
        _ => {
            let sublist = Node::new(
                list.kind(),
                list.kind().default_attrs(),
                Fragment::from_node(item),
            );
            let mut prev_children = prev.content().to_vec();
            prev_children.push(sublist);
            (prev.copy(Fragment::from_nodes(prev_children)), 0)
        }
    };

    let mut items = list.content().to_vec();
    items[ctx.item_index - 1] = new_prev;
    items.remove(ctx.item_index);
    let new_list = list.copy(Fragment::from_nodes(items));

    let cursor = state.selection.range(&state.doc).0;
    let mut tx = Transaction::new(state);
    if tx
        .replace_range(
            ctx.list_pos,
            ctx.list_pos + list.node_size(),
            Slice::flat(Fragment::from_node(new_list)),
        )
        .is_err()
    {
        return false;
    }
    let new_cursor = (cursor as isize + cursor_delta) as usize;
    if tx.set_selection(Selection::cursor(new_cursor)).is_err() {
        return false;
    }
    send(dispatch, tx);
    true
}

/// Lift the current list item out of its list: up one nesting level when
/// the list is itself nested, out of the list entirely at the top level.
/// Falls back to unwrapping a blockquote when the selection is not in a
/// list at all.
pub fn lift_list_item(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Some(ctx) = list_context(state) else {
        return lift_out_of_blockquote(state, dispatch);
    };
    let cursor = state.selection.range(&state.doc).0;
    let list = &ctx.list;
    let items = list.content().to_vec();
    let item = items[ctx.item_index].clone();
    let before: Vec<Node> = items[..ctx.item_index].to_vec();
    let after: Vec<Node> = items[ctx.item_index + 1..].to_vec();

    let nested_in_item = ctx.list_depth >= 1
        && ctx.rp.node(ctx.list_depth.saturating_sub(1)).kind() == NodeKind::ListItem;

    let mut tx = Transaction::new(state);
    let new_cursor;
    if nested_in_item {
        // Move the item up: it becomes a sibling of the item holding this
        // sublist, keeping any following items as a sublist of its own.
        let outer_item_depth = ctx.list_depth - 1;
        let outer_list_depth = outer_item_depth - 1;
        let outer_list = ctx.rp.node(outer_list_depth).clone();
        let outer_index = ctx.rp.index(outer_list_depth);
        let outer_item = outer_list.child(outer_index);

        let mut host_children: Vec<Node> = outer_item.content().to_vec();
        // Replace the sublist inside the outer item.
        let sublist_index = ctx.rp.index(outer_item_depth);
        if before.is_empty() {
            host_children.remove(sublist_index);
        } else {
            host_children[sublist_index] = list.copy(Fragment::from_nodes(before.clone()));
        }
        let new_outer_item = outer_item.copy(Fragment::from_nodes(host_children));

        let mut lifted_children = item.content().to_vec();
        if !after.is_empty() {
            lifted_children.push(list.copy(Fragment::from_nodes(after.clone())));
        }
        let lifted = item.copy(Fragment::from_nodes(lifted_children));

        let mut outer_items = outer_list.content().to_vec();
        outer_items[outer_index] = new_outer_item.clone();
        outer_items.insert(outer_index + 1, lifted);
        let new_outer_list = outer_list.copy(Fragment::from_nodes(outer_items));

        let outer_list_pos = ctx.rp.before(outer_list_depth);
        if tx
            .replace_range(
                outer_list_pos,
                outer_list_pos + outer_list.node_size(),
                Slice::flat(Fragment::from_node(new_outer_list)),
            )
            .is_err()
        {
            return false;
        }
        // New position: the cursor keeps its offset within the lifted
        // item, which now follows the (shrunken) outer item.
        let prefix: usize = outer_list
            .content()
            .children()
            .take(outer_index)
            .map(Node::node_size)
            .sum();
        let offset_in_item = cursor - (ctx.item_pos + 1);
        let lifted_pos = outer_list_pos + 1 + prefix + new_outer_item.node_size();
        new_cursor = lifted_pos + 1 + offset_in_item;
    } else {
        // Top-level list: the item's blocks move out between the split
        // halves of the list.
        let mut replacement: Vec<Node> = Vec::new();
        if !before.is_empty() {
            replacement.push(list.copy(Fragment::from_nodes(before.clone())));
        }
        let before_size: usize = replacement.iter().map(Node::node_size).sum();
        let blocks_start = before_size;
        for block in item.content().children() {
            replacement.push(block.clone());
        }
        if !after.is_empty() {
            replacement.push(list.copy(Fragment::from_nodes(after.clone())));
        }
        if tx
            .replace_range(
                ctx.list_pos,
                ctx.list_pos + list.node_size(),
                Slice::flat(Fragment::from_nodes(replacement)),
            )
            .is_err()
        {
            return false;
        }
        let offset_in_item = cursor - (ctx.item_pos + 1);
        new_cursor = ctx.list_pos + blocks_start + offset_in_item;
    }
    if tx.set_selection(Selection::cursor(new_cursor)).is_err() {
        return false;
    }
    send(dispatch, tx);
    true
}

fn lift_out_of_blockquote(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let (from, _) = state.selection.range(&state.doc);
    let Ok(rp) = ResolvedPos::resolve(&state.doc, from) else {
        return false;
    };
    let Some(depth) = rp.ancestor_of_kind(NodeKind::Blockquote) else {
        return false;
    };
    if depth == 0 {
        return false;
    }
    let quote = rp.node(depth).clone();
    let quote_pos = rp.before(depth);
    let mut tx = Transaction::new(state);
    if tx
        .replace_range(
            quote_pos,
            quote_pos + quote.node_size(),
            Slice::flat(quote.content().clone()),
        )
        .is_err()
    {
        return false;
    }
    if tx.set_selection(Selection::cursor(from - 1)).is_err() {
        return false;
    }
    send(dispatch, tx);
    true
}

/// Wrap the block containing the selection in a blockquote.
pub fn wrap_in_blockquote(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let (from, to) = match state.selection.text_points() {
        Some(points) => points,
        None => return false,
    };
    let blocks = blocks_in_range(&state.doc, from, to);
    let Some((first_pos, _)) = blocks.first() else {
        return false;
    };
    let Some((last_pos, last)) = blocks.last() else {
        return false;
    };
    // Only wrap sibling blocks of one parent.
    let Ok(rp) = ResolvedPos::resolve(&state.doc, *first_pos) else {
        return false;
    };
    if rp.parent().content_rule() != ContentRule::Blocks {
        return false;
    }
    let end = last_pos + last.node_size();
    let covered: Vec<Node> = blocks.iter().map(|(_, b)| b.clone()).collect();
    let quote = Node::blockquote(covered);
    let mut tx = Transaction::new(state);
    if tx
        .replace_range(*first_pos, end, Slice::flat(Fragment::from_node(quote)))
        .is_err()
    {
        return false;
    }
    if tx.set_selection(Selection::cursor(from + 1)).is_err() {
        return false;
    }
    send(dispatch, tx);
    true
}

// ---- enter / split -------------------------------------------------------

/// Enter key: splits the current list item when inside one, otherwise the
/// current textblock. In a code block a newline character is inserted
/// instead. An empty list item lifts out of the list.
pub fn split_block(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Some((from, to)) = state.selection.text_points() else {
        return false;
    };
    let Ok(rp) = ResolvedPos::resolve(&state.doc, from) else {
        return false;
    };
    let parent = rp.parent().clone();
    if parent.kind() == NodeKind::CodeBlock {
        return insert_text("\n".into())(state, dispatch);
    }

    let in_item = rp.depth() >= 2
        && rp.node(rp.depth() - 1).kind() == NodeKind::ListItem
        && rp.parent().kind() == NodeKind::Paragraph;
    if in_item && parent.content_size() == 0 {
        return lift_list_item(state, dispatch);
    }

    let mut tx = Transaction::new(state);
    if tx.delete(from, to).is_err() {
        return false;
    }
    let at = tx.map_pos(from);
    let slice = if in_item {
        Slice::new(
            Fragment::from_nodes(vec![
                Node::list_item(vec![parent.copy(Fragment::empty())]),
                Node::list_item(vec![parent.copy(Fragment::empty())]),
            ]),
            2,
            2,
        )
    } else {
        // Splitting at the end of a heading opens a paragraph, matching
        // the usual expectation for title lines.
        let after = if parent.kind() == NodeKind::Heading && rp.parent_offset == parent.content_size()
        {
            Node::empty_paragraph()
        } else {
            parent.copy(Fragment::empty())
        };
        Slice::new(
            Fragment::from_nodes(vec![parent.copy(Fragment::empty()), after]),
            1,
            1,
        )
    };
    let gap = if in_item { 4 } else { 2 };
    if tx.replace_range(at, at, slice).is_err() {
        return false;
    }
    if tx.set_selection(Selection::cursor(at + gap)).is_err() {
        return false;
    }
    tx.scroll_into_view();
    send(dispatch, tx);
    true
}

// ---- structural inserts --------------------------------------------------

/// Position at which a new block can be inserted near `pos`: the position
/// itself when it already sits in block context, otherwise the end of the
/// containing block at the nearest such context.
pub(crate) fn block_insertion_point(doc: &Node, pos: usize) -> usize {
    let Ok(rp) = ResolvedPos::resolve(doc, pos) else {
        return doc.content_size();
    };
    let mut depth = rp.depth();
    loop {
        if rp.node(depth).content_rule() == ContentRule::Blocks {
            break;
        }
        if depth == 0 {
            return doc.content_size();
        }
        depth -= 1;
    }
    if depth == rp.depth() {
        pos
    } else {
        rp.after(depth + 1)
    }
}

/// Insert an image atom at the cursor's block context.
pub fn insert_image(attrs: ImageAttrs) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        insert_block_atom(state, dispatch, Node::image(attrs.clone()))
    }
}

pub fn insert_horizontal_rule(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    insert_block_atom(state, dispatch, Node::horizontal_rule())
}

pub fn insert_page_break(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    insert_block_atom(state, dispatch, Node::page_break())
}

fn insert_block_atom(state: &EditorState, dispatch: Option<DispatchFn>, node: Node) -> bool {
    let (from, _) = state.selection.range(&state.doc);
    let at = block_insertion_point(&state.doc, from);
    let mut tx = Transaction::new(state);
    let size = node.node_size();
    if tx.insert(at, vec![node]).is_err() {
        return false;
    }
    let sel = Selection::resolve_text(tx.doc(), at + size, at + size);
    if tx.set_selection(sel).is_err() {
        return false;
    }
    tx.scroll_into_view();
    send(dispatch, tx);
    true
}

// ---- image attribute commands --------------------------------------------

fn selected_image(state: &EditorState) -> Option<(usize, ImageAttrs)> {
    if let Selection::Node { pos } = state.selection
        && let Some(node) = state.doc.node_at(pos)
        && node.kind() == NodeKind::Image
        && let Attrs::Image(attrs) = node.attrs()
    {
        return Some((pos, attrs.clone()));
    }
    None
}

fn set_image_attrs(
    state: &EditorState,
    dispatch: Option<DispatchFn>,
    update: impl FnOnce(ImageAttrs) -> ImageAttrs,
) -> bool {
    let Some((pos, attrs)) = selected_image(state) else {
        return false;
    };
    let next = update(attrs.clone());
    if next == attrs {
        return false;
    }
    let mut tx = Transaction::new(state);
    if tx.set_attrs(pos, Attrs::Image(next)).is_err() {
        return false;
    }
    if tx.set_selection(Selection::Node { pos }).is_err() {
        return false;
    }
    send(dispatch, tx);
    true
}

/// Resize the selected image. Width is clamped to at least 40 px and, when
/// the caller knows it, at most the available content width.
pub fn resize_image(width: u32, max_width: Option<u32>) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        set_image_attrs(state, dispatch, |attrs| {
            let mut width = width.max(MIN_IMAGE_WIDTH);
            if let Some(max) = max_width {
                width = width.min(max.max(MIN_IMAGE_WIDTH));
            }
            ImageAttrs {
                width: Some(width),
                ..attrs
            }
        })
    }
}

/// Rotate the selected image a quarter turn clockwise.
pub fn rotate_image(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    set_image_attrs(state, dispatch, |attrs| ImageAttrs {
        rotate: (attrs.rotate + 90) % 360,
        ..attrs
    })
}

pub fn flip_image_horizontal(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    set_image_attrs(state, dispatch, |attrs| ImageAttrs {
        flip_x: !attrs.flip_x,
        ..attrs
    })
}

pub fn flip_image_vertical(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    set_image_attrs(state, dispatch, |attrs| ImageAttrs {
        flip_y: !attrs.flip_y,
        ..attrs
    })
}

pub fn align_image(align: Align) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        set_image_attrs(state, dispatch, |attrs| ImageAttrs { align, ..attrs })
    }
}

// ---- select all ----------------------------------------------------------

/// Mod-A: select the whole table as a cell selection when the cursor is
/// inside one, the whole document otherwise.
pub fn select_all(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    if crate::editing::tables::in_table(state) {
        return crate::editing::tables::select_table(state, dispatch);
    }
    let mut tx = Transaction::new(state);
    if tx.set_selection(Selection::All).is_err() {
        return false;
    }
    send(dispatch, tx);
    true
}

pub use crate::editing::tables::{
    add_column_after, add_row_after, delete_column, delete_row, delete_table, insert_table,
    merge_cells, move_table, select_table, split_cell, toggle_header_column, toggle_header_row,
};

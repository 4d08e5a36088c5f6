//! Table structure commands, built over a computed grid map of the
//! enclosing table.
//!
//! Every structural edit rebuilds the table node from its logical grid and
//! replaces the whole table span in one step, so rectangularity (modulo
//! spans) holds after every command by construction.

use crate::editing::commands::{DispatchFn, block_insertion_point, send};
use crate::editing::selection::Selection;
use crate::editing::transaction::{EditorState, Transaction};
use crate::model::{Fragment, Node, ResolvedPos, Slice};
use crate::schema::{Attrs, CellAttrs, NodeKind};

/// Grid view of a table: for every slot, the offset (relative to the table
/// content start) of the cell covering it. Spanning cells cover several
/// slots; their top-left slot is the anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMap {
    pub width: usize,
    pub height: usize,
    cells: Vec<Option<usize>>,
}

fn spans(cell: &Node) -> (usize, usize) {
    match cell.attrs() {
        Attrs::Cell(a) => (a.colspan as usize, a.rowspan as usize),
        _ => (1, 1),
    }
}

impl TableMap {
    pub fn build(table: &Node) -> TableMap {
        let height = table.child_count();
        let mut grid: Vec<Vec<Option<usize>>> = vec![Vec::new(); height];
        let mut row_pos = 0;
        for (r, row) in table.content().children().enumerate() {
            let mut cell_pos = row_pos + 1;
            let mut c = 0;
            for cell in row.content().children() {
                while grid[r].get(c).is_some_and(Option::is_some) {
                    c += 1;
                }
                let (colspan, rowspan) = spans(cell);
                for rr in r..(r + rowspan).min(height) {
                    for cc in c..c + colspan {
                        if grid[rr].len() <= cc {
                            grid[rr].resize(cc + 1, None);
                        }
                        grid[rr][cc] = Some(cell_pos);
                    }
                }
                c += colspan;
                cell_pos += cell.node_size();
            }
            row_pos += row.node_size();
        }
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        let mut cells = Vec::with_capacity(width * height);
        for row in &mut grid {
            row.resize(width, None);
            cells.extend(row.iter().copied());
        }
        TableMap {
            width,
            height,
            cells,
        }
    }

    pub fn slot(&self, row: usize, col: usize) -> Option<usize> {
        self.cells.get(row * self.width + col).copied().flatten()
    }

    /// Grid coordinates of the anchor slot of the cell at `offset`.
    pub fn anchor_of(&self, offset: usize) -> Option<(usize, usize)> {
        let index = self.cells.iter().position(|c| *c == Some(offset))?;
        Some((index / self.width, index % self.width))
    }

    /// Offsets of every distinct cell whose anchor lies inside the rect
    /// (`bottom`/`right` exclusive), in document order.
    pub fn cells_in_rect(&self, rect: Rect) -> Vec<usize> {
        let mut seen = Vec::new();
        for r in rect.top..rect.bottom {
            for c in rect.left..rect.right {
                if let Some(offset) = self.slot(r, c)
                    && !seen.contains(&offset)
                    && self.anchor_of(offset) == Some((r, c))
                {
                    seen.push(offset);
                }
            }
        }
        seen
    }

    /// Bounding box of two cells including their spans.
    pub fn rect_between(&self, a: usize, b: usize, table: &Node) -> Option<Rect> {
        let (ar, ac) = self.anchor_of(a)?;
        let (br, bc) = self.anchor_of(b)?;
        let (a_cell, _) = locate_cell(table, a)?;
        let (b_cell, _) = locate_cell(table, b)?;
        let (acs, ars) = spans(&a_cell);
        let (bcs, brs) = spans(&b_cell);
        Some(Rect {
            top: ar.min(br),
            left: ac.min(bc),
            bottom: (ar + ars).max(br + brs),
            right: (ac + acs).max(bc + bcs),
        })
    }

    /// A rect is mergeable when every covered slot belongs to a cell that
    /// lies entirely inside the rect.
    pub fn is_rectangular(&self, rect: Rect, table: &Node) -> bool {
        for r in rect.top..rect.bottom {
            for c in rect.left..rect.right {
                let Some(offset) = self.slot(r, c) else {
                    return false;
                };
                let Some((ar, ac)) = self.anchor_of(offset) else {
                    return false;
                };
                let Some((cell, _)) = locate_cell(table, offset) else {
                    return false;
                };
                let (cs, rs) = spans(&cell);
                if ar < rect.top || ac < rect.left || ar + rs > rect.bottom || ac + cs > rect.right
                {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

/// Find the cell node at a content-relative offset, along with
/// (row index, cell index within the row).
fn locate_cell(table: &Node, offset: usize) -> Option<(Node, (usize, usize))> {
    let mut row_pos = 0;
    for (r, row) in table.content().children().enumerate() {
        let mut cell_pos = row_pos + 1;
        for (i, cell) in row.content().children().enumerate() {
            if cell_pos == offset {
                return Some((cell.clone(), (r, i)));
            }
            cell_pos += cell.node_size();
        }
        row_pos += row.node_size();
    }
    None
}

pub(crate) struct TableContext {
    /// Position before the table node.
    pub table_pos: usize,
    pub table: Node,
    pub map: TableMap,
    /// Anchor coordinates of the cell holding the selection.
    pub row: usize,
    pub col: usize,
    /// Content-relative offset of that cell.
    pub cell_offset: usize,
}

fn table_context(state: &EditorState) -> Option<TableContext> {
    let probe = match &state.selection {
        Selection::Cell { head_cell, .. } => head_cell + 1,
        sel => sel.range(&state.doc).0,
    };
    let rp = ResolvedPos::resolve(&state.doc, probe).ok()?;
    let table_depth = rp.ancestor_of_kind(NodeKind::Table)?;
    if table_depth == 0 {
        return None;
    }
    let table = rp.node(table_depth).clone();
    let table_pos = rp.before(table_depth);
    let map = TableMap::build(&table);
    let cell_depth = (table_depth + 2).min(rp.depth());
    let cell_offset = rp.before(cell_depth.max(1)) - (table_pos + 1);
    let (row, col) = map.anchor_of(cell_offset)?;
    Some(TableContext {
        table_pos,
        table,
        map,
        row,
        col,
        cell_offset,
    })
}

pub fn in_table(state: &EditorState) -> bool {
    table_context(state).is_some()
}

/// Content ranges of the cells covered by a cell selection.
pub(crate) fn selected_cell_ranges(state: &EditorState) -> Vec<(usize, usize)> {
    let Selection::Cell {
        anchor_cell,
        head_cell,
    } = &state.selection
    else {
        return Vec::new();
    };
    let Some(ctx) = table_context(state) else {
        return Vec::new();
    };
    let base = ctx.table_pos + 1;
    let (Some(a), Some(b)) = (
        anchor_cell.checked_sub(base),
        head_cell.checked_sub(base),
    ) else {
        return Vec::new();
    };
    let Some(rect) = ctx.map.rect_between(a, b, &ctx.table) else {
        return Vec::new();
    };
    ctx.map
        .cells_in_rect(rect)
        .into_iter()
        .filter_map(|offset| {
            let (cell, _) = locate_cell(&ctx.table, offset)?;
            let start = base + offset + 1;
            Some((start, start + cell.content_size()))
        })
        .collect()
}

// ---- rebuilding helpers --------------------------------------------------

fn rows_to_vecs(table: &Node) -> Vec<Vec<Node>> {
    table
        .content()
        .children()
        .map(|row| row.content().to_vec())
        .collect()
}

fn table_from_vecs(table: &Node, rows: Vec<Vec<Node>>) -> Node {
    let rows = rows
        .into_iter()
        .filter(|cells| !cells.is_empty())
        .map(Node::table_row)
        .collect();
    table.copy(Fragment::from_nodes(rows))
}

fn with_spans(cell: &Node, colspan: usize, rowspan: usize) -> Node {
    cell.with_attrs(Attrs::Cell(CellAttrs {
        colspan: colspan as u32,
        rowspan: rowspan as u32,
    }))
}

/// Swap the whole table for a rebuilt one and put the cursor into the cell
/// at the given grid coordinates.
fn replace_table(
    state: &EditorState,
    dispatch: Option<DispatchFn>,
    ctx: &TableContext,
    new_table: Node,
    cursor_cell: (usize, usize),
) -> bool {
    let mut tx = Transaction::new(state);
    if tx
        .replace_range(
            ctx.table_pos,
            ctx.table_pos + ctx.table.node_size(),
            Slice::flat(Fragment::from_node(new_table.clone())),
        )
        .is_err()
    {
        return false;
    }
    let map = TableMap::build(&new_table);
    let (row, col) = (
        cursor_cell.0.min(map.height.saturating_sub(1)),
        cursor_cell.1.min(map.width.saturating_sub(1)),
    );
    let cursor = map
        .slot(row, col)
        .map_or(ctx.table_pos, |offset| ctx.table_pos + 1 + offset + 2);
    let sel = Selection::resolve_text(tx.doc(), cursor, cursor);
    if tx.set_selection(sel).is_err() {
        return false;
    }
    send(dispatch, tx);
    true
}

// ---- commands ------------------------------------------------------------

/// Insert a `rows` × `cols` table: one header row plus `rows - 1` body
/// rows, followed by an empty paragraph that receives the cursor. The
/// table lands after the block holding the cursor; an empty paragraph
/// there is replaced instead of left dangling.
pub fn insert_table(rows: usize, cols: usize) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        if rows < 1 || cols < 1 {
            return false;
        }
        let (from, _) = state.selection.range(&state.doc);
        let Ok(rp) = ResolvedPos::resolve(&state.doc, from) else {
            return false;
        };

        let header = Node::table_row((0..cols).map(|_| Node::table_header(Vec::new())).collect());
        let body = (1..rows)
            .map(|_| Node::table_row((0..cols).map(|_| Node::table_cell(Vec::new())).collect()));
        let table = Node::table(std::iter::once(header).chain(body).collect());
        let table_size = table.node_size();

        let mut tx = Transaction::new(state);
        let replaces_empty_para = rp.depth() >= 1
            && rp.node(1).kind() == NodeKind::Paragraph
            && rp.node(1).content_size() == 0;
        let insert_at = if rp.depth() >= 1 {
            rp.after(1)
        } else {
            block_insertion_point(&state.doc, from)
        };
        if tx
            .insert(insert_at, vec![table, Node::empty_paragraph()])
            .is_err()
        {
            return false;
        }
        let mut table_start = insert_at;
        if replaces_empty_para {
            // The empty paragraph the cursor sat in has no reason to stay.
            if tx.delete(rp.before(1), rp.after(1)).is_err() {
                return false;
            }
            table_start = rp.before(1);
        }
        // Start of the trailing paragraph's content.
        let cursor = table_start + table_size + 1;
        if tx.set_selection(Selection::cursor(cursor)).is_err() {
            return false;
        }
        tx.scroll_into_view();
        send(dispatch, tx);
        true
    }
}

/// Add a row below the one holding the selection. Cells spanning the
/// insertion line grow their rowspan instead of being duplicated.
pub fn add_row_after(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Some(ctx) = table_context(state) else {
        return false;
    };
    let Some((cell, _)) = locate_cell(&ctx.table, ctx.cell_offset) else {
        return false;
    };
    let (_, rowspan) = spans(&cell);
    let insert_at = ctx.row + rowspan;

    let mut rows = rows_to_vecs(&ctx.table);
    let mut new_row = Vec::new();
    let mut grown: Vec<usize> = Vec::new();
    for c in 0..ctx.map.width {
        let above = if insert_at > 0 {
            ctx.map.slot(insert_at - 1, c)
        } else {
            None
        };
        let below = if insert_at < ctx.map.height {
            ctx.map.slot(insert_at, c)
        } else {
            None
        };
        match (above, below) {
            (Some(a), Some(b)) if a == b => {
                // A cell spans the insertion line: widen it once.
                if !grown.contains(&a) {
                    grown.push(a);
                    if let Some((spanned, (r, i))) = locate_cell(&ctx.table, a) {
                        let (cs, rs) = spans(&spanned);
                        rows[r][i] = with_spans(&spanned, cs, rs + 1);
                    }
                }
            }
            _ => new_row.push(Node::table_cell(Vec::new())),
        }
    }
    rows.insert(insert_at, new_row);
    let new_table = table_from_vecs(&ctx.table, rows);
    replace_table(state, dispatch, &ctx, new_table, (ctx.row, ctx.col))
}

/// Add a column to the right of the one holding the selection.
pub fn add_column_after(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Some(ctx) = table_context(state) else {
        return false;
    };
    let Some((cell, _)) = locate_cell(&ctx.table, ctx.cell_offset) else {
        return false;
    };
    let (colspan, _) = spans(&cell);
    let insert_at = ctx.col + colspan;

    let mut rows = rows_to_vecs(&ctx.table);
    let mut grown: Vec<usize> = Vec::new();
    for r in 0..ctx.map.height {
        let left = if insert_at > 0 {
            ctx.map.slot(r, insert_at - 1)
        } else {
            None
        };
        let right = if insert_at < ctx.map.width {
            ctx.map.slot(r, insert_at)
        } else {
            None
        };
        match (left, right) {
            (Some(a), Some(b)) if a == b => {
                if !grown.contains(&a) {
                    grown.push(a);
                    if let Some((spanned, (rr, i))) = locate_cell(&ctx.table, a) {
                        let (cs, rs) = spans(&spanned);
                        rows[rr][i] = with_spans(&spanned, cs + 1, rs);
                    }
                }
            }
            _ => {
                // Insert after the cell covering the slot to the left,
                // or at the row end when appending.
                let anchor = left.and_then(|offset| locate_cell(&ctx.table, offset));
                match anchor {
                    Some((covering, (rr, i))) if rr == r => {
                        let kind = covering.kind();
                        rows[r].insert(i + 1, Node::cell_of(kind, CellAttrs::default(), Vec::new()));
                    }
                    // Slot to the left is covered by a cell anchored in an
                    // earlier row (rowspan); a fresh cell still belongs in
                    // this row, appended after any cell anchored before
                    // the insertion column.
                    _ => {
                        let at = insertion_index_for_column(&ctx, r, insert_at);
                        rows[r].insert(at, Node::table_cell(Vec::new()));
                    }
                }
            }
        }
    }
    let new_table = table_from_vecs(&ctx.table, rows);
    replace_table(state, dispatch, &ctx, new_table, (ctx.row, ctx.col))
}

/// Index in row `r`'s cell list where a cell for grid column `col` should
/// be inserted.
fn insertion_index_for_column(ctx: &TableContext, r: usize, col: usize) -> usize {
    let mut index = 0;
    for c in 0..col.min(ctx.map.width) {
        if let Some(offset) = ctx.map.slot(r, c)
            && ctx.map.anchor_of(offset) == Some((r, c))
        {
            index += 1;
        }
    }
    index
}

/// Delete the row holding the selection; deleting the only row removes the
/// whole table.
pub fn delete_row(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Some(ctx) = table_context(state) else {
        return false;
    };
    if ctx.map.height <= 1 {
        return delete_table(state, dispatch);
    }
    let target = ctx.row;
    let mut rows = rows_to_vecs(&ctx.table);

    // Cells spanning over the deleted row shrink; cells anchored in it with
    // a remainder move down.
    let mut moved_down: Vec<(usize, Node)> = Vec::new();
    for offset in ctx.map.cells_in_rect(Rect {
        top: 0,
        left: 0,
        bottom: ctx.map.height,
        right: ctx.map.width,
    }) {
        let Some((cell, (r, i))) = locate_cell(&ctx.table, offset) else {
            continue;
        };
        let (cs, rs) = spans(&cell);
        let Some((ar, ac)) = ctx.map.anchor_of(offset) else {
            continue;
        };
        if ar < target && ar + rs > target {
            rows[r][i] = with_spans(&cell, cs, rs - 1);
        } else if ar == target && rs > 1 {
            moved_down.push((ac, with_spans(&cell, cs, rs - 1)));
        }
    }
    moved_down.sort_by_key(|(col, _)| *col);
    for (bumped, (col, cell)) in moved_down.into_iter().enumerate() {
        let at = insertion_index_for_column(&ctx, target + 1, col) + bumped;
        let row_len = rows[target + 1].len();
        rows[target + 1].insert(at.min(row_len), cell);
    }
    rows.remove(target);
    let new_table = table_from_vecs(&ctx.table, rows);
    replace_table(state, dispatch, &ctx, new_table, (target, ctx.col))
}

/// Delete the column holding the selection; deleting the only column
/// removes the whole table.
pub fn delete_column(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Some(ctx) = table_context(state) else {
        return false;
    };
    if ctx.map.width <= 1 {
        return delete_table(state, dispatch);
    }
    let target = ctx.col;
    let mut rows = rows_to_vecs(&ctx.table);
    let mut removals: Vec<(usize, usize)> = Vec::new();
    for r in 0..ctx.map.height {
        let Some(offset) = ctx.map.slot(r, target) else {
            continue;
        };
        if ctx.map.anchor_of(offset).map(|(ar, _)| ar) != Some(r) {
            continue;
        }
        let Some((cell, (rr, i))) = locate_cell(&ctx.table, offset) else {
            continue;
        };
        let (cs, rs) = spans(&cell);
        if cs > 1 {
            rows[rr][i] = with_spans(&cell, cs - 1, rs);
        } else {
            removals.push((rr, i));
        }
    }
    removals.sort();
    for (rr, i) in removals.into_iter().rev() {
        rows[rr].remove(i);
    }
    let new_table = table_from_vecs(&ctx.table, rows);
    if new_table.child_count() == 0 {
        return delete_table(state, dispatch);
    }
    replace_table(state, dispatch, &ctx, new_table, (ctx.row, target))
}

/// Remove the whole table, leaving a paragraph when it was the only block.
pub fn delete_table(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Some(ctx) = table_context(state) else {
        return false;
    };
    let mut tx = Transaction::new(state);
    let end = ctx.table_pos + ctx.table.node_size();
    let only_block = (ctx.table_pos, end) == (0, state.doc.content_size());
    let result = if only_block {
        tx.replace_range(
            0,
            end,
            Slice::flat(Fragment::from_node(Node::empty_paragraph())),
        )
    } else {
        tx.delete(ctx.table_pos, end)
    };
    if result.is_err() {
        return false;
    }
    let sel = Selection::resolve_text(tx.doc(), ctx.table_pos, ctx.table_pos);
    if tx.set_selection(sel).is_err() {
        return false;
    }
    send(dispatch, tx);
    true
}

/// Merge the cells of a rectangular cell selection into the top-left cell.
pub fn merge_cells(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Selection::Cell {
        anchor_cell,
        head_cell,
    } = &state.selection
    else {
        return false;
    };
    let Some(ctx) = table_context(state) else {
        return false;
    };
    let base = ctx.table_pos + 1;
    let (Some(a), Some(b)) = (
        anchor_cell.checked_sub(base),
        head_cell.checked_sub(base),
    ) else {
        return false;
    };
    let Some(rect) = ctx.map.rect_between(a, b, &ctx.table) else {
        return false;
    };
    if !ctx.map.is_rectangular(rect, &ctx.table) {
        return false;
    }
    let offsets = ctx.map.cells_in_rect(rect);
    if offsets.len() < 2 {
        return false;
    }

    // Collect content in document order, dropping empty paragraphs.
    let mut blocks: Vec<Node> = Vec::new();
    for offset in &offsets {
        if let Some((cell, _)) = locate_cell(&ctx.table, *offset) {
            for block in cell.content().children() {
                let empty_para =
                    block.kind() == NodeKind::Paragraph && block.content_size() == 0;
                if !empty_para {
                    blocks.push(block.clone());
                }
            }
        }
    }

    let Some((anchor_node, _)) = locate_cell(&ctx.table, offsets[0]) else {
        return false;
    };
    let merged = Node::cell_of(
        anchor_node.kind(),
        CellAttrs {
            colspan: (rect.right - rect.left) as u32,
            rowspan: (rect.bottom - rect.top) as u32,
        },
        blocks,
    );

    let mut rows = rows_to_vecs(&ctx.table);
    // Remove merged cells back-to-front, then plant the merged cell.
    let mut positions: Vec<(usize, usize)> = offsets
        .iter()
        .filter_map(|offset| locate_cell(&ctx.table, *offset).map(|(_, at)| at))
        .collect();
    positions.sort();
    let first = positions[0];
    for (r, i) in positions.into_iter().rev() {
        rows[r].remove(i);
    }
    rows[first.0].insert(first.1, merged);
    drop_emptied_rows(&mut rows);
    let new_table = table_from_vecs(&ctx.table, rows);
    replace_table(state, dispatch, &ctx, new_table, (rect.top, rect.left))
}

/// A merge can leave a row with no anchored cells (every slot covered from
/// above). Such rows are removed and the spans reaching over them shrink,
/// keeping every remaining row non-empty.
fn drop_emptied_rows(rows: &mut Vec<Vec<Node>>) {
    let mut r = 0;
    while r < rows.len() {
        if !rows[r].is_empty() {
            r += 1;
            continue;
        }
        for rr in 0..r {
            for cell in &mut rows[rr] {
                let (cs, rs) = spans(cell);
                if rr + rs > r {
                    *cell = with_spans(cell, cs, rs - 1);
                }
            }
        }
        rows.remove(r);
    }
}

/// Split the spanning cell holding the selection back into unit cells.
pub fn split_cell(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Some(ctx) = table_context(state) else {
        return false;
    };
    let Some((cell, (r, i))) = locate_cell(&ctx.table, ctx.cell_offset) else {
        return false;
    };
    let (colspan, rowspan) = spans(&cell);
    if colspan == 1 && rowspan == 1 {
        return false;
    }
    let mut rows = rows_to_vecs(&ctx.table);
    rows[r][i] = with_spans(&cell, 1, 1);
    // Unit cells for the freed slots, same kind as the split cell.
    let fresh = || Node::cell_of(cell.kind(), CellAttrs::default(), Vec::new());
    for k in 1..colspan {
        rows[r].insert(i + k, fresh());
    }
    for rr in ctx.row + 1..ctx.row + rowspan {
        let base = insertion_index_for_column(&ctx, rr, ctx.col);
        for k in 0..colspan {
            let at = (base + k).min(rows[rr].len());
            rows[rr].insert(at, fresh());
        }
    }
    let new_table = table_from_vecs(&ctx.table, rows);
    replace_table(state, dispatch, &ctx, new_table, (ctx.row, ctx.col))
}

fn toggle_header(state: &EditorState, dispatch: Option<DispatchFn>, column: bool) -> bool {
    let Some(ctx) = table_context(state) else {
        return false;
    };
    let line = Rect {
        top: 0,
        left: 0,
        bottom: if column { ctx.map.height } else { 1 },
        right: if column { 1 } else { ctx.map.width },
    };
    let offsets = ctx.map.cells_in_rect(line);
    if offsets.is_empty() {
        return false;
    }
    let all_headers = offsets.iter().all(|offset| {
        locate_cell(&ctx.table, *offset)
            .is_some_and(|(cell, _)| cell.kind() == NodeKind::TableHeader)
    });
    let target_kind = if all_headers {
        NodeKind::TableCell
    } else {
        NodeKind::TableHeader
    };
    let mut rows = rows_to_vecs(&ctx.table);
    for offset in offsets {
        if let Some((cell, (r, i))) = locate_cell(&ctx.table, offset) {
            let attrs = match cell.attrs() {
                Attrs::Cell(a) => *a,
                _ => CellAttrs::default(),
            };
            rows[r][i] = Node::cell_of(target_kind, attrs, cell.content().to_vec());
        }
    }
    let new_table = table_from_vecs(&ctx.table, rows);
    replace_table(state, dispatch, &ctx, new_table, (ctx.row, ctx.col))
}

pub fn toggle_header_row(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    toggle_header(state, dispatch, false)
}

pub fn toggle_header_column(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    toggle_header(state, dispatch, true)
}

/// Select the whole enclosing table as a cell selection from its first to
/// its last cell.
pub fn select_table(state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
    let Some(ctx) = table_context(state) else {
        return false;
    };
    let first = ctx.map.slot(0, 0);
    let last = ctx
        .map
        .slot(ctx.map.height - 1, ctx.map.width - 1);
    let (Some(first), Some(last)) = (first, last) else {
        return false;
    };
    let base = ctx.table_pos + 1;
    let mut tx = Transaction::new(state);
    if tx
        .set_selection(Selection::Cell {
            anchor_cell: base + first,
            head_cell: base + last,
        })
        .is_err()
    {
        return false;
    }
    send(dispatch, tx);
    true
}

/// Drag-reposition: delete the table at `table_pos`, then reinsert it at
/// the drop position mapped through the deletion. Dropping inside the
/// table's own span is a no-op.
pub fn move_table(
    table_pos: usize,
    drop_pos: usize,
) -> impl Fn(&EditorState, Option<DispatchFn>) -> bool {
    move |state, dispatch| {
        let Some(table) = state.doc.node_at(table_pos).cloned() else {
            return false;
        };
        if table.kind() != NodeKind::Table {
            return false;
        }
        let end = table_pos + table.node_size();
        if drop_pos >= table_pos && drop_pos <= end {
            return false;
        }
        let mut tx = Transaction::new(state);
        if tx.delete(table_pos, end).is_err() {
            return false;
        }
        let mapped = tx.map_pos(drop_pos);
        let at = block_insertion_point(tx.doc(), mapped);
        if tx.insert(at, vec![table]).is_err() {
            return false;
        }
        tx.scroll_into_view();
        send(dispatch, tx);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::transaction::EditorState;
    use pretty_assertions::assert_eq;

    fn exec(
        state: &EditorState,
        command: impl Fn(&EditorState, Option<DispatchFn>) -> bool,
    ) -> Option<EditorState> {
        let mut next = None;
        command(state, Some(&mut |tx: Transaction| {
            next = Some(state.apply(&tx));
        }));
        next
    }

    fn state_with(doc: Node, selection: Selection) -> EditorState {
        let mut state = EditorState::new(doc);
        state.selection = selection;
        state
    }

    fn grid_table(rows: usize, cols: usize) -> Node {
        Node::table(
            (0..rows)
                .map(|r| {
                    Node::table_row(
                        (0..cols)
                            .map(|c| {
                                Node::table_cell(vec![Node::paragraph_text(&format!(
                                    "r{r}c{c}"
                                ))])
                            })
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    /// Every row of every table covers the same number of grid columns.
    fn assert_rectangular(doc: &Node) {
        doc.nodes_between(0, doc.content_size(), &mut |node, _| {
            if node.kind() == NodeKind::Table {
                let map = TableMap::build(node);
                for r in 0..map.height {
                    for c in 0..map.width {
                        assert!(
                            map.slot(r, c).is_some(),
                            "uncovered slot ({r},{c}) in {node}"
                        );
                    }
                }
            }
            true
        });
        assert!(doc.check());
    }

    // ============ table map ============

    #[test]
    fn test_map_plain_grid() {
        let table = grid_table(2, 3);
        let map = TableMap::build(&table);
        assert_eq!((map.width, map.height), (3, 2));
        assert_eq!(map.anchor_of(map.slot(1, 2).unwrap()), Some((1, 2)));
    }

    #[test]
    fn test_map_with_spans() {
        let table = Node::table(vec![
            Node::table_row(vec![
                Node::cell_of(
                    NodeKind::TableCell,
                    CellAttrs {
                        colspan: 2,
                        rowspan: 2,
                    },
                    vec![Node::paragraph_text("big")],
                ),
                Node::table_cell(vec![Node::paragraph_text("a")]),
            ]),
            Node::table_row(vec![Node::table_cell(vec![Node::paragraph_text("b")])]),
        ]);
        let map = TableMap::build(&table);
        assert_eq!((map.width, map.height), (3, 2));
        // The spanning cell covers a 2×2 block.
        assert_eq!(map.slot(0, 0), map.slot(1, 1));
        assert_ne!(map.slot(0, 2), map.slot(1, 2));
    }

    // ============ insert ============

    #[test]
    fn test_insert_table_into_empty_doc() {
        let state = EditorState::new(Node::doc(vec![Node::empty_paragraph()]));
        let after = exec(&state, insert_table(3, 3)).unwrap();
        let doc = &after.doc;
        assert_eq!(doc.child_count(), 2);
        let table = doc.child(0);
        assert_eq!(table.kind(), NodeKind::Table);
        assert_eq!(table.child_count(), 3);
        for c in 0..3 {
            assert_eq!(table.child(0).child(c).kind(), NodeKind::TableHeader);
            assert_eq!(table.child(1).child(c).kind(), NodeKind::TableCell);
        }
        assert_eq!(doc.child(1).kind(), NodeKind::Paragraph);
        // Cursor at offset 0 of the trailing paragraph.
        let expected = table.node_size() + 1;
        assert_eq!(
            after.selection,
            Selection::Text {
                anchor: expected,
                head: expected
            }
        );
        assert_rectangular(doc);
    }

    #[test]
    fn test_insert_table_after_content_block() {
        let state = state_with(
            Node::doc(vec![Node::paragraph_text("ab")]),
            Selection::cursor(2),
        );
        let after = exec(&state, insert_table(1, 2)).unwrap();
        assert_eq!(after.doc.child(0).text_content(), "ab");
        assert_eq!(after.doc.child(1).kind(), NodeKind::Table);
        // One row means header only.
        assert_eq!(after.doc.child(1).child_count(), 1);
        assert_eq!(
            after.doc.child(1).child(0).child(0).kind(),
            NodeKind::TableHeader
        );
    }

    #[test]
    fn test_insert_table_rejects_zero() {
        let state = EditorState::new(Node::doc(vec![Node::empty_paragraph()]));
        assert!(!insert_table(0, 3)(&state, None));
        assert!(!insert_table(3, 0)(&state, None));
    }

    // ============ rows and columns ============

    fn cursor_in_cell(doc: &Node, table_pos: usize, row: usize, col: usize) -> Selection {
        let table = doc.node_at(table_pos).unwrap();
        let map = TableMap::build(table);
        let offset = map.slot(row, col).unwrap();
        Selection::cursor(table_pos + 1 + offset + 2)
    }

    #[test]
    fn test_add_row_after() {
        let doc = Node::doc(vec![grid_table(2, 2)]);
        let sel = cursor_in_cell(&doc, 0, 0, 0);
        let state = state_with(doc, sel);
        let after = exec(&state, add_row_after).unwrap();
        let table = after.doc.child(0);
        assert_eq!(table.child_count(), 3);
        // Fresh row is empty, original second row pushed down.
        assert_eq!(table.child(1).text_content(), "");
        assert_eq!(table.child(2).text_content(), "r1c0r1c1");
        assert_rectangular(&after.doc);
    }

    #[test]
    fn test_add_column_after() {
        let doc = Node::doc(vec![grid_table(2, 2)]);
        let sel = cursor_in_cell(&doc, 0, 0, 1);
        let state = state_with(doc, sel);
        let after = exec(&state, add_column_after).unwrap();
        let table = after.doc.child(0);
        let map = TableMap::build(table);
        assert_eq!((map.width, map.height), (3, 2));
        assert_rectangular(&after.doc);
    }

    #[test]
    fn test_add_row_grows_spanning_cell() {
        let table = Node::table(vec![
            Node::table_row(vec![
                Node::cell_of(
                    NodeKind::TableCell,
                    CellAttrs {
                        colspan: 1,
                        rowspan: 2,
                    },
                    vec![Node::paragraph_text("tall")],
                ),
                Node::table_cell(vec![Node::paragraph_text("a")]),
            ]),
            Node::table_row(vec![Node::table_cell(vec![Node::paragraph_text("b")])]),
        ]);
        let doc = Node::doc(vec![table]);
        // Cursor in "a" (row 0, col 1); inserting below row 0 crosses the
        // tall cell.
        let sel = cursor_in_cell(&doc, 0, 0, 1);
        let state = state_with(doc, sel);
        let after = exec(&state, add_row_after).unwrap();
        let table = after.doc.child(0);
        assert_eq!(table.child_count(), 3);
        let map = TableMap::build(table);
        // The tall cell now spans three rows.
        assert_eq!(map.slot(0, 0), map.slot(2, 0));
        assert_rectangular(&after.doc);
    }

    #[test]
    fn test_delete_row_keeps_rectangle() {
        let doc = Node::doc(vec![grid_table(3, 2)]);
        let sel = cursor_in_cell(&doc, 0, 1, 0);
        let state = state_with(doc, sel);
        let after = exec(&state, delete_row).unwrap();
        let table = after.doc.child(0);
        assert_eq!(table.child_count(), 2);
        assert_eq!(table.text_content(), "r0c0r0c1r2c0r2c1");
        assert_rectangular(&after.doc);
    }

    #[test]
    fn test_delete_column_keeps_rectangle() {
        let doc = Node::doc(vec![grid_table(2, 3)]);
        let sel = cursor_in_cell(&doc, 0, 0, 1);
        let state = state_with(doc, sel);
        let after = exec(&state, delete_column).unwrap();
        let table = after.doc.child(0);
        let map = TableMap::build(table);
        assert_eq!(map.width, 2);
        assert_eq!(table.text_content(), "r0c0r0c2r1c0r1c2");
        assert_rectangular(&after.doc);
    }

    #[test]
    fn test_delete_last_row_deletes_table() {
        let doc = Node::doc(vec![Node::paragraph_text("x"), grid_table(1, 2)]);
        let sel = cursor_in_cell(&doc, 3, 0, 0);
        let state = state_with(doc, sel);
        let after = exec(&state, delete_row).unwrap();
        assert_eq!(after.doc.child_count(), 1);
        assert_eq!(after.doc.child(0).kind(), NodeKind::Paragraph);
    }

    #[test]
    fn test_delete_last_column_deletes_table() {
        let doc = Node::doc(vec![Node::paragraph_text("x"), grid_table(2, 1)]);
        let sel = cursor_in_cell(&doc, 3, 0, 0);
        let state = state_with(doc, sel);
        let after = exec(&state, delete_column).unwrap();
        assert_eq!(after.doc.child_count(), 1);
    }

    #[test]
    fn test_delete_table_when_only_block_leaves_paragraph() {
        let doc = Node::doc(vec![grid_table(1, 1)]);
        let sel = cursor_in_cell(&doc, 0, 0, 0);
        let state = state_with(doc, sel);
        let after = exec(&state, delete_table).unwrap();
        assert_eq!(after.doc.child_count(), 1);
        assert_eq!(after.doc.child(0).kind(), NodeKind::Paragraph);
        assert_eq!(after.doc.child(0).content_size(), 0);
    }

    // ============ merge / split ============

    fn cell_selection(doc: &Node, table_pos: usize, a: (usize, usize), b: (usize, usize)) -> Selection {
        let table = doc.node_at(table_pos).unwrap();
        let map = TableMap::build(table);
        Selection::Cell {
            anchor_cell: table_pos + 1 + map.slot(a.0, a.1).unwrap(),
            head_cell: table_pos + 1 + map.slot(b.0, b.1).unwrap(),
        }
    }

    #[test]
    fn test_merge_rectangular_selection() {
        let doc = Node::doc(vec![grid_table(2, 2)]);
        let sel = cell_selection(&doc, 0, (0, 0), (0, 1));
        let state = state_with(doc, sel);
        let after = exec(&state, merge_cells).unwrap();
        let table = after.doc.child(0);
        assert_eq!(table.child(0).child_count(), 1);
        let merged = table.child(0).child(0);
        assert!(matches!(
            merged.attrs(),
            Attrs::Cell(c) if c.colspan == 2 && c.rowspan == 1
        ));
        assert_eq!(merged.text_content(), "r0c0r0c1");
        assert_rectangular(&after.doc);
    }

    #[test]
    fn test_merge_non_rectangular_fails() {
        // A tall cell anchored in row 0 pokes into the selected region, so
        // the region is not a clean rectangle of whole cells.
        let table = Node::table(vec![
            Node::table_row(vec![
                Node::table_cell(vec![Node::paragraph_text("a")]),
                Node::cell_of(
                    NodeKind::TableCell,
                    CellAttrs {
                        colspan: 1,
                        rowspan: 2,
                    },
                    vec![Node::paragraph_text("tall")],
                ),
            ]),
            Node::table_row(vec![Node::table_cell(vec![Node::paragraph_text("b")])]),
            Node::table_row(vec![
                Node::table_cell(vec![Node::paragraph_text("c")]),
                Node::table_cell(vec![Node::paragraph_text("d")]),
            ]),
        ]);
        let doc = Node::doc(vec![table]);
        // From "b" (1,0) to "d" (2,1): slot (1,1) belongs to the tall cell
        // anchored in row 0, outside the rect.
        let sel = cell_selection(&doc, 0, (1, 0), (2, 1));
        let state = state_with(doc, sel);
        assert!(!merge_cells(&state, None));
    }

    #[test]
    fn test_merge_single_cell_not_applicable() {
        let doc = Node::doc(vec![grid_table(2, 2)]);
        let sel = cell_selection(&doc, 0, (0, 0), (0, 0));
        let state = state_with(doc, sel);
        assert!(!merge_cells(&state, None));
    }

    #[test]
    fn test_split_cell_restores_grid() {
        let doc = Node::doc(vec![grid_table(2, 2)]);
        // Merge the left column into one tall cell.
        let sel = cell_selection(&doc, 0, (0, 0), (1, 0));
        let state = state_with(doc, sel);
        let merged = exec(&state, merge_cells).unwrap();
        assert_rectangular(&merged.doc);
        let map = TableMap::build(merged.doc.child(0));
        assert_eq!(map.slot(0, 0), map.slot(1, 0));

        // Select the merged cell and split it back apart.
        let after = exec(&merged, split_cell).unwrap();
        let table = after.doc.child(0);
        let map = TableMap::build(table);
        assert_eq!((map.width, map.height), (2, 2));
        assert_eq!(table.child(0).child_count(), 2);
        assert_eq!(table.child(1).child_count(), 2);
        assert_rectangular(&after.doc);
    }

    #[test]
    fn test_merge_whole_table_collapses_rows() {
        let doc = Node::doc(vec![grid_table(2, 2)]);
        let sel = cell_selection(&doc, 0, (0, 0), (1, 1));
        let state = state_with(doc, sel);
        let after = exec(&state, merge_cells).unwrap();
        let table = after.doc.child(0);
        // The emptied second row is gone and the span shrank with it.
        assert_eq!(table.child_count(), 1);
        assert_eq!(table.child(0).child_count(), 1);
        assert!(matches!(
            table.child(0).child(0).attrs(),
            Attrs::Cell(c) if c.rowspan == 1
        ));
        assert_eq!(table.text_content(), "r0c0r0c1r1c0r1c1");
        assert_rectangular(&after.doc);
    }

    #[test]
    fn test_split_unit_cell_not_applicable() {
        let doc = Node::doc(vec![grid_table(2, 2)]);
        let sel = cursor_in_cell(&doc, 0, 0, 0);
        let state = state_with(doc, sel);
        assert!(!split_cell(&state, None));
    }

    // ============ headers ============

    #[test]
    fn test_toggle_header_row_round_trip() {
        let doc = Node::doc(vec![grid_table(2, 2)]);
        let sel = cursor_in_cell(&doc, 0, 1, 0);
        let state = state_with(doc, sel);
        let on = exec(&state, toggle_header_row).unwrap();
        let table = on.doc.child(0);
        assert!(table
            .child(0)
            .content()
            .children()
            .all(|c| c.kind() == NodeKind::TableHeader));
        assert!(table
            .child(1)
            .content()
            .children()
            .all(|c| c.kind() == NodeKind::TableCell));

        let off = exec(&on, toggle_header_row).unwrap();
        assert!(off.doc.child(0).child(0)
            .content()
            .children()
            .all(|c| c.kind() == NodeKind::TableCell));
    }

    #[test]
    fn test_toggle_header_column() {
        let doc = Node::doc(vec![grid_table(2, 2)]);
        let sel = cursor_in_cell(&doc, 0, 0, 0);
        let state = state_with(doc, sel);
        let after = exec(&state, toggle_header_column).unwrap();
        let table = after.doc.child(0);
        for r in 0..2 {
            assert_eq!(table.child(r).child(0).kind(), NodeKind::TableHeader);
            assert_eq!(table.child(r).child(1).kind(), NodeKind::TableCell);
        }
        assert_rectangular(&after.doc);
    }

    // ============ selection / movement ============

    #[test]
    fn test_select_table_spans_all_cells() {
        let doc = Node::doc(vec![grid_table(2, 2)]);
        let sel = cursor_in_cell(&doc, 0, 0, 0);
        let state = state_with(doc, sel);
        let after = exec(&state, select_table).unwrap();
        let Selection::Cell {
            anchor_cell,
            head_cell,
        } = after.selection
        else {
            panic!("expected cell selection");
        };
        let table = after.doc.child(0);
        let map = TableMap::build(table);
        assert_eq!(anchor_cell, 1 + map.slot(0, 0).unwrap());
        assert_eq!(head_cell, 1 + map.slot(1, 1).unwrap());
    }

    #[test]
    fn test_move_table_to_new_position() {
        let doc = Node::doc(vec![
            grid_table(1, 1),
            Node::paragraph_text("ab"),
            Node::paragraph_text("cd"),
        ]);
        let table_size = doc.child(0).node_size();
        let state = state_with(doc, Selection::cursor(table_size + 1));
        // Drop between the two paragraphs.
        let drop = table_size + 4;
        let after = exec(&state, move_table(0, drop)).unwrap();
        assert_eq!(after.doc.child(0).kind(), NodeKind::Paragraph);
        assert_eq!(after.doc.child(1).kind(), NodeKind::Table);
        assert_eq!(after.doc.child(2).kind(), NodeKind::Paragraph);
        assert!(after.doc.check());
    }

    #[test]
    fn test_move_table_onto_itself_is_noop() {
        let doc = Node::doc(vec![grid_table(1, 1), Node::paragraph_text("x")]);
        let size = doc.child(0).node_size();
        let state = state_with(doc, Selection::cursor(size + 1));
        // Every drop position within the table's own span is rejected.
        for drop in 0..=size {
            assert!(!move_table(0, drop)(&state, None));
        }
    }

    #[test]
    fn test_move_table_drop_inside_text_lands_at_block_boundary() {
        let doc = Node::doc(vec![grid_table(1, 1), Node::paragraph_text("abcd")]);
        let size = doc.child(0).node_size();
        let state = state_with(doc, Selection::cursor(size + 1));
        // Drop in the middle of the paragraph text.
        let after = exec(&state, move_table(0, size + 3)).unwrap();
        assert_eq!(after.doc.child(0).kind(), NodeKind::Paragraph);
        assert_eq!(after.doc.child(1).kind(), NodeKind::Table);
        assert!(after.doc.check());
    }
}

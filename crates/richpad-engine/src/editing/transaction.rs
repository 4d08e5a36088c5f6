use crate::editing::selection::Selection;
use crate::editing::step::{Mapping, Step, StepError};
use crate::model::{Fragment, Node, ReplaceError, ResolvedPos, Slice};
use crate::schema::Mark;

/// What kind of user intent produced a transaction. History uses this to
/// coalesce bursts of typing into single undo groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Typing,
    Backspace,
    Command,
    Paste,
    History,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransactionError {
    #[error("transaction rejected: {0}")]
    Rejected(#[from] StepError),
}

/// One revision of the editor: the document, the selection addressing it,
/// and marks stored for the next typed character after a collapsed-cursor
/// mark toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub doc: Node,
    pub selection: Selection,
    pub stored_marks: Option<Vec<Mark>>,
}

impl EditorState {
    pub fn new(doc: Node) -> EditorState {
        let selection = Selection::resolve_text(&doc, 0, 0);
        EditorState {
            doc,
            selection,
            stored_marks: None,
        }
    }

    /// Apply a finished transaction. Steps were validated when the
    /// transaction was built, so this cannot fail: the transaction either
    /// exists as a whole or was rejected during construction.
    pub fn apply(&self, tx: &Transaction) -> EditorState {
        let doc = tx.doc.clone();
        let selection = match &tx.selection {
            Some(sel) => sanitize(sel, &doc),
            None => self.selection.map(&tx.mapping, &doc),
        };
        let stored_marks = match &tx.stored_marks {
            Some(marks) => marks.clone(),
            None if tx.doc_changed() || tx.selection.is_some() => None,
            None => self.stored_marks.clone(),
        };
        EditorState {
            doc,
            selection,
            stored_marks,
        }
    }
}

/// Make sure an explicitly set selection addresses something that exists
/// in the new document.
fn sanitize(selection: &Selection, doc: &Node) -> Selection {
    match selection {
        Selection::Text { anchor, head } => Selection::resolve_text(doc, *anchor, *head),
        Selection::Node { pos } => match doc.node_at(*pos) {
            Some(node) if !node.is_text() => Selection::Node { pos: *pos },
            _ => Selection::resolve_text(doc, *pos, *pos),
        },
        Selection::Cell {
            anchor_cell,
            head_cell,
        } => {
            if crate::editing::selection::is_cell_at(doc, *anchor_cell)
                && crate::editing::selection::is_cell_at(doc, *head_cell)
            {
                selection.clone()
            } else {
                Selection::resolve_text(doc, *anchor_cell, *anchor_cell)
            }
        }
        Selection::All => Selection::All,
    }
}

/// An ordered list of steps applied atomically.
///
/// The transaction applies each step to its working document as it is
/// built, so an illegal step surfaces immediately and the caller can drop
/// the whole transaction; nothing is ever half-applied to an
/// [`EditorState`]. Base documents are kept per step to make the group
/// invertible for history.
#[derive(Debug, Clone)]
pub struct Transaction {
    steps: Vec<Step>,
    /// Document before each step, parallel to `steps`.
    docs: Vec<Node>,
    doc: Node,
    mapping: Mapping,
    selection: Option<Selection>,
    stored_marks: Option<Option<Vec<Mark>>>,
    scroll_into_view: bool,
    origin: Origin,
}

impl Transaction {
    pub fn new(state: &EditorState) -> Transaction {
        Transaction {
            steps: Vec::new(),
            docs: Vec::new(),
            doc: state.doc.clone(),
            mapping: Mapping::default(),
            selection: None,
            stored_marks: None,
            scroll_into_view: false,
            origin: Origin::Command,
        }
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn base_docs(&self) -> &[Node] {
        &self.docs
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Origin) {
        self.origin = origin;
    }

    pub fn doc_changed(&self) -> bool {
        self.steps.iter().any(Step::changes_doc)
    }

    pub fn selection_set(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// View-layer hint; carried through untouched.
    pub fn scroll_into_view(&mut self) {
        self.scroll_into_view = true;
    }

    pub fn wants_scroll(&self) -> bool {
        self.scroll_into_view
    }

    pub fn step(&mut self, step: Step) -> Result<(), TransactionError> {
        let new_doc = step.apply(&self.doc)?;
        if let Step::SetSelection { selection } = &step {
            self.selection = Some(selection.clone());
        }
        self.mapping.push(step.step_map());
        self.docs.push(std::mem::replace(&mut self.doc, new_doc));
        self.steps.push(step);
        Ok(())
    }

    // ---- step builders ---------------------------------------------------

    pub fn replace_range(
        &mut self,
        from: usize,
        to: usize,
        slice: Slice,
    ) -> Result<(), TransactionError> {
        self.step(Step::Replace { from, to, slice })
    }

    /// Delete a range. When the raw range cannot be joined (its ends sit in
    /// incompatible contexts, e.g. a paragraph and a table cell), the range
    /// is widened to whole nodes at the deepest shared depth, which always
    /// joins flat.
    pub fn delete(&mut self, from: usize, to: usize) -> Result<(), TransactionError> {
        if from == to {
            return Ok(());
        }
        let attempt = Step::Replace {
            from,
            to,
            slice: Slice::empty(),
        };
        match attempt.apply(&self.doc) {
            Ok(_) => self.step(attempt),
            Err(StepError::Replace(
                ReplaceError::CannotJoin(..) | ReplaceError::InconsistentOpenDepths,
            )) => {
                let (wide_from, wide_to) = self.widen_to_blocks(from, to)?;
                if (wide_from, wide_to) == (0, self.doc.content_size()) {
                    // Emptying the document entirely: keep one paragraph.
                    return self.step(Step::Replace {
                        from: wide_from,
                        to: wide_to,
                        slice: Slice::flat(Fragment::from_node(Node::empty_paragraph())),
                    });
                }
                self.step(Step::Replace {
                    from: wide_from,
                    to: wide_to,
                    slice: Slice::empty(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn widen_to_blocks(&self, from: usize, to: usize) -> Result<(usize, usize), TransactionError> {
        let rfrom = ResolvedPos::resolve(&self.doc, from).map_err(StepError::from)?;
        let rto = ResolvedPos::resolve(&self.doc, to).map_err(StepError::from)?;
        let depth = rfrom.shared_depth(to);
        let wide_from = if rfrom.depth() > depth {
            rfrom.before(depth + 1)
        } else {
            from
        };
        let wide_to = if rto.depth() > depth {
            rto.after(depth + 1)
        } else {
            to
        };
        Ok((wide_from, wide_to))
    }

    pub fn insert_text(
        &mut self,
        pos: usize,
        text: &str,
        marks: Vec<Mark>,
    ) -> Result<(), TransactionError> {
        if text.is_empty() {
            return Ok(());
        }
        self.replace_range(
            pos,
            pos,
            Slice::flat(Fragment::from_node(Node::text(text, marks))),
        )
    }

    pub fn insert(&mut self, pos: usize, nodes: Vec<Node>) -> Result<(), TransactionError> {
        self.replace_range(pos, pos, Slice::flat(Fragment::from_nodes(nodes)))
    }

    pub fn add_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<(), TransactionError> {
        self.step(Step::AddMark { from, to, mark })
    }

    pub fn remove_mark(
        &mut self,
        from: usize,
        to: usize,
        mark: Mark,
    ) -> Result<(), TransactionError> {
        self.step(Step::RemoveMark { from, to, mark })
    }

    pub fn set_attrs(
        &mut self,
        pos: usize,
        attrs: crate::schema::Attrs,
    ) -> Result<(), TransactionError> {
        self.step(Step::SetAttrs { pos, attrs })
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), TransactionError> {
        self.step(Step::SetSelection { selection })
    }

    pub fn set_stored_marks(&mut self, marks: Option<Vec<Mark>>) {
        self.stored_marks = Some(marks);
    }

    /// Map a position held before this transaction into the resulting
    /// document.
    pub fn map_pos(&self, pos: usize) -> usize {
        self.mapping.map(pos, crate::editing::step::Assoc::After)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::step::Assoc;
    use pretty_assertions::assert_eq;

    fn state() -> EditorState {
        EditorState::new(Node::doc(vec![
            Node::paragraph_text("hello"),
            Node::paragraph_text("world"),
        ]))
    }

    #[test]
    fn test_transaction_applies_atomically() {
        let state = state();
        let mut tx = Transaction::new(&state);
        tx.insert_text(6, "!", Vec::new()).unwrap();
        tx.delete(1, 3).unwrap();
        let next = state.apply(&tx);
        assert_eq!(next.doc.text_content(), "llo!world");
        // original state untouched
        assert_eq!(state.doc.text_content(), "helloworld");
    }

    #[test]
    fn test_rejected_step_leaves_transaction_unusable_doc_unchanged() {
        let state = state();
        let mut tx = Transaction::new(&state);
        let bad = tx.replace_range(
            1,
            1,
            Slice::flat(Fragment::from_node(Node::table(vec![Node::table_row(
                vec![Node::table_cell(Vec::new())],
            )]))),
        );
        assert!(bad.is_err());
        assert_eq!(tx.doc(), &state.doc);
        assert!(tx.steps().is_empty());
    }

    #[test]
    fn test_selection_maps_through_steps() {
        let mut state = state();
        state.selection = Selection::Text { anchor: 9, head: 9 };
        let mut tx = Transaction::new(&state);
        tx.insert_text(1, "ab", Vec::new()).unwrap();
        let next = state.apply(&tx);
        assert_eq!(
            next.selection,
            Selection::Text {
                anchor: 11,
                head: 11
            }
        );
    }

    #[test]
    fn test_selection_collapses_when_region_deleted() {
        let mut state = state();
        state.selection = Selection::Text { anchor: 3, head: 3 };
        let mut tx = Transaction::new(&state);
        tx.delete(1, 6).unwrap();
        let next = state.apply(&tx);
        assert_eq!(next.selection, Selection::Text { anchor: 1, head: 1 });
    }

    #[test]
    fn test_stored_marks_cleared_on_doc_change() {
        let mut state = state();
        state.stored_marks = Some(vec![Mark::Bold]);
        let mut tx = Transaction::new(&state);
        tx.insert_text(1, "x", Vec::new()).unwrap();
        assert_eq!(state.apply(&tx).stored_marks, None);
    }

    #[test]
    fn test_map_pos_through_transaction() {
        let state = state();
        let mut tx = Transaction::new(&state);
        tx.delete(1, 4).unwrap();
        assert_eq!(tx.map_pos(6), 3);
        assert_eq!(tx.mapping().map_result(2, Assoc::Before).deleted, true);
    }
}

use std::time::{Duration, Instant};

use crate::editing::commands::{DispatchFn, send};
use crate::editing::selection::Selection;
use crate::editing::step::Step;
use crate::editing::transaction::{EditorState, Origin, Transaction};

/// How many undo groups are kept before the oldest fall off.
pub const DEFAULT_DEPTH: usize = 100;

/// Edits of the same typing origin landing within this window merge into
/// one undo group.
pub const COALESCE_WINDOW: Duration = Duration::from_millis(500);

/// One undoable unit: steps that, applied in order, take the document back
/// across a group of transactions, plus the selection to restore.
#[derive(Debug, Clone)]
struct Group {
    steps: Vec<Step>,
    selection: Selection,
}

/// Bounded two-stack undo/redo over inverted transaction groups.
///
/// The history never reads the clock itself; callers pass the event time
/// into [`History::record`], which keeps coalescing deterministic and
/// testable.
#[derive(Debug)]
pub struct History {
    done: Vec<Group>,
    undone: Vec<Group>,
    depth: usize,
    window: Duration,
    last: Option<(Origin, Instant)>,
}

impl Default for History {
    fn default() -> Self {
        History::new()
    }
}

impl History {
    pub fn new() -> History {
        History::with_limits(DEFAULT_DEPTH, COALESCE_WINDOW)
    }

    pub fn with_limits(depth: usize, window: Duration) -> History {
        History {
            done: Vec::new(),
            undone: Vec::new(),
            depth: depth.max(1),
            window,
            last: None,
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.done.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }

    /// Record an applied transaction. Selection-only transactions and
    /// history replays are not undoable and leave the stacks alone.
    pub fn record(
        &mut self,
        tx: &Transaction,
        state_before: &EditorState,
        now: Instant,
    ) {
        if !tx.doc_changed() || tx.origin() == Origin::History {
            return;
        }
        let inverted = invert_transaction(tx);
        let coalesce = matches!(tx.origin(), Origin::Typing | Origin::Backspace)
            && self
                .last
                .is_some_and(|(origin, at)| {
                    origin == tx.origin() && now.duration_since(at) <= self.window
                })
            && !self.done.is_empty();

        if coalesce {
            let group = self.done.last_mut().expect("checked non-empty");
            // Undo applies the newest inverses first.
            let mut steps = inverted;
            steps.extend(group.steps.drain(..));
            group.steps = steps;
        } else {
            self.done.push(Group {
                steps: inverted,
                selection: state_before.selection.clone(),
            });
            if self.done.len() > self.depth {
                self.done.remove(0);
            }
        }
        self.undone.clear();
        self.last = Some((tx.origin(), now));
    }

    /// Undo command: same dry-run contract as every other command.
    pub fn undo(&mut self, state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
        if self.done.is_empty() {
            return false;
        }
        if dispatch.is_none() {
            return true;
        }
        let group = self.done.pop().expect("checked non-empty");
        match self.replay(state, group) {
            Some((tx, flipped)) => {
                self.undone.push(flipped);
                self.last = None;
                send(dispatch, tx);
                true
            }
            None => false,
        }
    }

    /// Redo command.
    pub fn redo(&mut self, state: &EditorState, dispatch: Option<DispatchFn>) -> bool {
        if self.undone.is_empty() {
            return false;
        }
        if dispatch.is_none() {
            return true;
        }
        let group = self.undone.pop().expect("checked non-empty");
        match self.replay(state, group) {
            Some((tx, flipped)) => {
                self.done.push(flipped);
                self.last = None;
                send(dispatch, tx);
                true
            }
            None => false,
        }
    }

    /// Apply a group against the current state, producing the transaction
    /// to dispatch and the inverse group for the opposite stack. A replay
    /// failure signals a defect; the state is left unchanged.
    fn replay(&mut self, state: &EditorState, group: Group) -> Option<(Transaction, Group)> {
        let mut tx = Transaction::new(state);
        tx.set_origin(Origin::History);
        for step in &group.steps {
            if tx.step(step.clone()).is_err() {
                return None;
            }
        }
        if tx.set_selection(group.selection).is_err() {
            return None;
        }
        let flipped = Group {
            steps: invert_transaction(&tx),
            selection: state.selection.clone(),
        };
        Some((tx, flipped))
    }
}

/// Inverses of a transaction's document steps, in replay order.
fn invert_transaction(tx: &Transaction) -> Vec<Step> {
    tx.steps()
        .iter()
        .zip(tx.base_docs())
        .filter(|(step, _)| step.changes_doc())
        .filter_map(|(step, doc)| step.invert(doc).ok())
        .rev()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;
    use pretty_assertions::assert_eq;

    fn t0() -> Instant {
        Instant::now()
    }

    fn typed(state: &EditorState, at: usize, text: &str) -> Transaction {
        let mut tx = Transaction::new(state);
        tx.set_origin(Origin::Typing);
        tx.insert_text(at, text, Vec::new()).unwrap();
        tx.set_selection(Selection::cursor(at + text.chars().count()))
            .unwrap();
        tx
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut history = History::new();
        let s0 = EditorState::new(Node::doc(vec![Node::paragraph_text("ab")]));
        let now = t0();

        let tx = typed(&s0, 1, "X");
        let s1 = s0.apply(&tx);
        history.record(&tx, &s0, now);
        assert_eq!(s1.doc.text_content(), "Xab");

        let mut undone_state = None;
        assert!(history.undo(&s1, Some(&mut |tx: Transaction| {
            undone_state = Some(s1.apply(&tx));
        })));
        let s2 = undone_state.unwrap();
        assert_eq!(s2.doc, s0.doc);
        assert_eq!(s2.selection, s0.selection);

        let mut redone_state = None;
        assert!(history.redo(&s2, Some(&mut |tx: Transaction| {
            redone_state = Some(s2.apply(&tx));
        })));
        let s3 = redone_state.unwrap();
        assert_eq!(s3.doc, s1.doc);
        assert_eq!(s3.selection, s1.selection);
    }

    #[test]
    fn test_typing_coalesces_within_window() {
        let mut history = History::new();
        let s0 = EditorState::new(Node::doc(vec![Node::empty_paragraph()]));
        let now = t0();

        let tx1 = typed(&s0, 1, "h");
        let s1 = s0.apply(&tx1);
        history.record(&tx1, &s0, now);

        let tx2 = typed(&s1, 2, "i");
        let s2 = s1.apply(&tx2);
        history.record(&tx2, &s1, now + Duration::from_millis(100));

        assert_eq!(history.undo_depth(), 1);
        let mut after = None;
        assert!(history.undo(&s2, Some(&mut |tx: Transaction| {
            after = Some(s2.apply(&tx));
        })));
        // One undo removes both typed characters.
        assert_eq!(after.unwrap().doc.text_content(), "");
    }

    #[test]
    fn test_slow_typing_does_not_coalesce() {
        let mut history = History::new();
        let s0 = EditorState::new(Node::doc(vec![Node::empty_paragraph()]));
        let now = t0();

        let tx1 = typed(&s0, 1, "h");
        let s1 = s0.apply(&tx1);
        history.record(&tx1, &s0, now);

        let tx2 = typed(&s1, 2, "i");
        let _s2 = s1.apply(&tx2);
        history.record(&tx2, &s1, now + Duration::from_secs(3));

        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn test_commands_form_their_own_groups() {
        let mut history = History::new();
        let s0 = EditorState::new(Node::doc(vec![Node::empty_paragraph()]));
        let now = t0();

        let tx1 = typed(&s0, 1, "h");
        let s1 = s0.apply(&tx1);
        history.record(&tx1, &s0, now);

        let mut tx2 = Transaction::new(&s1);
        tx2.insert_text(2, "!", Vec::new()).unwrap();
        let _s2 = s1.apply(&tx2);
        history.record(&tx2, &s1, now);

        // Command origin breaks the typing chain.
        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = History::new();
        let s0 = EditorState::new(Node::doc(vec![Node::empty_paragraph()]));
        let now = t0();

        let tx1 = typed(&s0, 1, "a");
        let s1 = s0.apply(&tx1);
        history.record(&tx1, &s0, now);

        let mut undone = None;
        history.undo(&s1, Some(&mut |tx: Transaction| {
            undone = Some(s1.apply(&tx));
        }));
        let s2 = undone.unwrap();
        assert_eq!(history.redo_depth(), 1);

        let tx2 = typed(&s2, 1, "b");
        let _s3 = s2.apply(&tx2);
        history.record(&tx2, &s2, t0());
        assert_eq!(history.redo_depth(), 0);
    }

    #[test]
    fn test_undo_at_bottom_is_noop() {
        let mut history = History::new();
        let state = EditorState::new(Node::doc(vec![Node::empty_paragraph()]));
        assert!(!history.undo(&state, None));
        assert!(!history.redo(&state, None));
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut history = History::with_limits(3, Duration::ZERO);
        let mut state = EditorState::new(Node::doc(vec![Node::empty_paragraph()]));
        let now = t0();
        for i in 0..10 {
            let tx = {
                let mut tx = Transaction::new(&state);
                tx.insert_text(1, "x", Vec::new()).unwrap();
                tx
            };
            let next = state.apply(&tx);
            history.record(&tx, &state, now + Duration::from_secs(i));
            state = next;
        }
        assert_eq!(history.undo_depth(), 3);
    }
}

use serde::{Deserialize, Serialize};

use crate::editing::selection::Selection;
use crate::model::{Fragment, Node, PositionError, ReplaceError, ResolvedPos, Slice};
use crate::schema::{Attrs, Mark, NodeKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Replace(#[from] ReplaceError),
    #[error(transparent)]
    Position(#[from] PositionError),
    #[error("no node starts at position {0}")]
    NoNodeAt(usize),
    #[error("attributes do not fit a {0:?} node")]
    AttrMismatch(NodeKind),
}

/// Atomic, invertible document edit.
///
/// Steps are the only way a document changes. Each one applies to a
/// concrete revision and yields a new root plus a local position map; a
/// step that would violate the schema fails as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Replace {
        from: usize,
        to: usize,
        slice: Slice,
    },
    AddMark {
        from: usize,
        to: usize,
        mark: Mark,
    },
    RemoveMark {
        from: usize,
        to: usize,
        mark: Mark,
    },
    SetAttrs {
        pos: usize,
        attrs: Attrs,
    },
    SetSelection {
        selection: Selection,
    },
}

impl Step {
    pub fn apply(&self, doc: &Node) -> Result<Node, StepError> {
        match self {
            Step::Replace { from, to, slice } => Ok(doc.replace(*from, *to, slice)?),
            Step::AddMark { from, to, mark } => {
                Ok(map_marks(doc, *from, *to, &|marks| {
                    crate::schema::add_mark(marks, mark.clone())
                }))
            }
            Step::RemoveMark { from, to, mark } => {
                Ok(map_marks(doc, *from, *to, &|marks| {
                    marks.iter().filter(|m| *m != mark).cloned().collect()
                }))
            }
            Step::SetAttrs { pos, attrs } => set_attrs_at(doc, *pos, attrs),
            Step::SetSelection { .. } => Ok(doc.clone()),
        }
    }

    /// Whether applying this step changes the document tree.
    pub fn changes_doc(&self) -> bool {
        !matches!(self, Step::SetSelection { .. })
    }

    /// The local position remap this step induces.
    pub fn step_map(&self) -> StepMap {
        match self {
            Step::Replace { from, to, slice } => StepMap {
                from: *from,
                old_size: to - from,
                new_size: slice.size(),
            },
            _ => StepMap::identity(),
        }
    }

    /// The inverse step, given the document this step applied to.
    pub fn invert(&self, doc_before: &Node) -> Result<Step, StepError> {
        match self {
            Step::Replace { from, to, slice } => Ok(Step::Replace {
                from: *from,
                to: from + slice.size(),
                slice: doc_before.slice_between(*from, *to).map_err(ReplaceError::from)?,
            }),
            Step::AddMark { from, to, mark } => Ok(Step::RemoveMark {
                from: *from,
                to: *to,
                mark: mark.clone(),
            }),
            Step::RemoveMark { from, to, mark } => Ok(Step::AddMark {
                from: *from,
                to: *to,
                mark: mark.clone(),
            }),
            Step::SetAttrs { pos, .. } => {
                let node = doc_before
                    .node_at(*pos)
                    .ok_or(StepError::NoNodeAt(*pos))?;
                Ok(Step::SetAttrs {
                    pos: *pos,
                    attrs: node.attrs().clone(),
                })
            }
            Step::SetSelection { selection } => Ok(Step::SetSelection {
                selection: selection.clone(),
            }),
        }
    }
}

/// Rebuild the tree applying a mark-set function to every text run in the
/// range, splitting runs at the range boundaries. Blocks that do not admit
/// marks (code blocks) are left untouched.
fn map_marks(doc: &Node, from: usize, to: usize, f: &dyn Fn(&[Mark]) -> Vec<Mark>) -> Node {
    map_marks_in(doc, from, to, f)
}

fn map_marks_in(node: &Node, from: usize, to: usize, f: &dyn Fn(&[Mark]) -> Vec<Mark>) -> Node {
    let mut children = Vec::new();
    let mut pos = 0;
    for child in node.content().children() {
        let end = pos + child.node_size();
        if end <= from || pos >= to || child.kind().is_atom() {
            children.push(child.clone());
        } else if child.is_text() {
            let cut_from = from.saturating_sub(pos);
            let cut_to = (to - pos).min(child.node_size());
            if cut_from > 0 {
                children.push(child.cut_text(0, cut_from));
            }
            children.push(child.cut_text(cut_from, cut_to).with_marks(f(child.marks())));
            if cut_to < child.node_size() {
                children.push(child.cut_text(cut_to, child.node_size()));
            }
        } else if !child.kind().allows_marks() {
            children.push(child.clone());
        } else {
            let inner_from = from.saturating_sub(pos + 1);
            let inner_to = (to - pos - 1).min(child.content_size());
            children.push(map_marks_in(child, inner_from, inner_to, f));
        }
        pos = end;
    }
    node.copy(Fragment::from_nodes(children))
}

/// Swap the attribute payload of the node starting at `pos`, leaving kind,
/// content and therefore all positions unchanged.
fn set_attrs_at(doc: &Node, pos: usize, attrs: &Attrs) -> Result<Node, StepError> {
    let rp = ResolvedPos::resolve(doc, pos)?;
    if rp.text_offset() > 0 {
        return Err(StepError::NoNodeAt(pos));
    }
    let depth = rp.depth();
    let index = rp.index(depth);
    let target = rp
        .parent()
        .content()
        .maybe_child(index)
        .ok_or(StepError::NoNodeAt(pos))?;
    if target.is_text() || !target.kind().valid_attrs(attrs) {
        return Err(StepError::AttrMismatch(target.kind()));
    }
    let mut acc = target.with_attrs(attrs.clone());
    for d in (0..=depth).rev() {
        let parent = rp.node(d);
        let idx = if d == depth { index } else { rp.index(d) };
        acc = parent.copy(parent.content().replace_child(idx, acc));
    }
    Ok(acc)
}

/// Which side of an insertion a mapped position sticks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    /// True when the position sat strictly inside a replaced region.
    pub deleted: bool,
}

/// Interval remap produced by one step: positions before the range are
/// unchanged, positions inside collapse to an end of the new range, and
/// positions after shift by the size delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMap {
    pub from: usize,
    pub old_size: usize,
    pub new_size: usize,
}

impl StepMap {
    pub fn identity() -> StepMap {
        StepMap {
            from: 0,
            old_size: 0,
            new_size: 0,
        }
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        if pos < self.from || (pos == self.from && assoc == Assoc::Before) {
            return MapResult {
                pos,
                deleted: false,
            };
        }
        if pos > self.from + self.old_size {
            return MapResult {
                pos: pos - self.old_size + self.new_size,
                deleted: false,
            };
        }
        let deleted = pos > self.from && pos < self.from + self.old_size;
        let pos = match assoc {
            Assoc::Before => self.from,
            Assoc::After => self.from + self.new_size,
        };
        MapResult { pos, deleted }
    }
}

/// Composition of step maps, applied left to right.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.maps.iter().fold(pos, |p, m| m.map(p, assoc))
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut deleted = false;
        let mut pos = pos;
        for map in &self.maps {
            let r = map.map_result(pos, assoc);
            deleted |= r.deleted;
            pos = r.pos;
        }
        MapResult { pos, deleted }
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

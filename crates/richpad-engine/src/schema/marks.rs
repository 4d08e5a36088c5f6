use serde::{Deserialize, Serialize};

/// Inline annotation attached to a text run.
///
/// Marks carry their attributes inline; two marks are equal only when both
/// the kind and the attributes match, which is also the rule for merging
/// adjacent text runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    TextColor { color: String },
    Highlight { color: String },
    FontSize { size: String },
    FontFamily { family: String },
    Link { href: String, title: Option<String> },
}

/// Discriminant of a [`Mark`], used for exclusion and removal by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    TextColor,
    Highlight,
    FontSize,
    FontFamily,
    Link,
}

impl Mark {
    pub fn kind(&self) -> MarkKind {
        match self {
            Mark::Bold => MarkKind::Bold,
            Mark::Italic => MarkKind::Italic,
            Mark::Underline => MarkKind::Underline,
            Mark::Strikethrough => MarkKind::Strikethrough,
            Mark::TextColor { .. } => MarkKind::TextColor,
            Mark::Highlight { .. } => MarkKind::Highlight,
            Mark::FontSize { .. } => MarkKind::FontSize,
            Mark::FontFamily { .. } => MarkKind::FontFamily,
            Mark::Link { .. } => MarkKind::Link,
        }
    }

    /// Canonical position in a mark set. Lower ranks serialize as the
    /// outermost tags, so the order is stable across round-trips.
    pub fn rank(&self) -> u8 {
        self.kind().rank()
    }

    /// A mark excludes any other mark of the same kind; re-applying a
    /// parameterized mark (color, size, family, link) replaces the old one.
    pub fn excludes(&self, other: &Mark) -> bool {
        self.kind() == other.kind()
    }
}

impl MarkKind {
    pub fn rank(&self) -> u8 {
        match self {
            MarkKind::Link => 0,
            MarkKind::FontFamily => 1,
            MarkKind::FontSize => 2,
            MarkKind::TextColor => 3,
            MarkKind::Highlight => 4,
            MarkKind::Bold => 5,
            MarkKind::Italic => 6,
            MarkKind::Underline => 7,
            MarkKind::Strikethrough => 8,
        }
    }
}

/// Add a mark to a sorted mark set, dropping anything it excludes.
pub fn add_mark(marks: &[Mark], mark: Mark) -> Vec<Mark> {
    let mut out: Vec<Mark> = marks
        .iter()
        .filter(|m| !mark.excludes(m))
        .cloned()
        .collect();
    let at = out
        .iter()
        .position(|m| m.rank() > mark.rank())
        .unwrap_or(out.len());
    out.insert(at, mark);
    out
}

/// Remove every mark of the given kind from a mark set.
pub fn remove_mark_kind(marks: &[Mark], kind: MarkKind) -> Vec<Mark> {
    marks.iter().filter(|m| m.kind() != kind).cloned().collect()
}

/// Sort a mark set into canonical rank order, keeping the last mark of each
/// kind when duplicates slip in (e.g. from parsed markup).
pub fn normalize_marks(marks: &[Mark]) -> Vec<Mark> {
    let mut out: Vec<Mark> = Vec::with_capacity(marks.len());
    for mark in marks {
        out = add_mark(&out, mark.clone());
    }
    out
}

pub fn contains_kind(marks: &[Mark], kind: MarkKind) -> bool {
    marks.iter().any(|m| m.kind() == kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_mark_keeps_rank_order() {
        let marks = add_mark(&[Mark::Italic], Mark::Bold);
        assert_eq!(marks, vec![Mark::Bold, Mark::Italic]);

        let marks = add_mark(
            &marks,
            Mark::Link {
                href: "https://example.com".into(),
                title: None,
            },
        );
        assert_eq!(marks[0].kind(), MarkKind::Link);
        assert_eq!(marks[1], Mark::Bold);
    }

    #[test]
    fn test_same_kind_mark_replaces() {
        let red = Mark::TextColor {
            color: "#ff0000".into(),
        };
        let blue = Mark::TextColor {
            color: "#0000ff".into(),
        };
        let marks = add_mark(&[red], blue.clone());
        assert_eq!(marks, vec![blue]);
    }

    #[test]
    fn test_remove_mark_kind() {
        let marks = vec![Mark::Bold, Mark::Italic];
        assert_eq!(remove_mark_kind(&marks, MarkKind::Bold), vec![Mark::Italic]);
        assert_eq!(remove_mark_kind(&marks, MarkKind::Link), marks);
    }

    #[test]
    fn test_normalize_dedupes_and_sorts() {
        let marks = vec![
            Mark::Strikethrough,
            Mark::TextColor {
                color: "red".into(),
            },
            Mark::Bold,
            Mark::TextColor {
                color: "green".into(),
            },
        ];
        let normalized = normalize_marks(&marks);
        assert_eq!(
            normalized,
            vec![
                Mark::TextColor {
                    color: "green".into()
                },
                Mark::Bold,
                Mark::Strikethrough,
            ]
        );
    }
}

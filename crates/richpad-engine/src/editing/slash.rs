//! The "/" quick-insert menu: a small state machine fed by document
//! changes and key events. It owns no document logic itself; committing
//! hands back the typed range and the chosen command id for the session to
//! execute.

use crate::editing::selection::Selection;
use crate::editing::transaction::EditorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashCommandId {
    Text,
    H1,
    H2,
    H3,
    Bullet,
    Numbered,
    Quote,
    Code,
    Table,
    Emoji,
}

#[derive(Debug, Clone, Copy)]
pub struct SlashCommandSpec {
    pub id: SlashCommandId,
    pub title: &'static str,
    pub hint: &'static str,
    pub keywords: &'static [&'static str],
}

pub const SLASH_COMMANDS: &[SlashCommandSpec] = &[
    SlashCommandSpec {
        id: SlashCommandId::Text,
        title: "Text",
        hint: "Normal paragraph",
        keywords: &["paragraph", "normal", "text"],
    },
    SlashCommandSpec {
        id: SlashCommandId::H1,
        title: "Heading 1",
        hint: "Large section heading",
        keywords: &["h1", "heading", "title"],
    },
    SlashCommandSpec {
        id: SlashCommandId::H2,
        title: "Heading 2",
        hint: "Medium section heading",
        keywords: &["h2", "heading", "subtitle"],
    },
    SlashCommandSpec {
        id: SlashCommandId::H3,
        title: "Heading 3",
        hint: "Small section heading",
        keywords: &["h3", "heading"],
    },
    SlashCommandSpec {
        id: SlashCommandId::Bullet,
        title: "Bullet List",
        hint: "Create a bulleted list",
        keywords: &["list", "bullet", "ul"],
    },
    SlashCommandSpec {
        id: SlashCommandId::Numbered,
        title: "Numbered List",
        hint: "Create a numbered list",
        keywords: &["list", "numbered", "ol"],
    },
    SlashCommandSpec {
        id: SlashCommandId::Quote,
        title: "Quote",
        hint: "Insert block quote",
        keywords: &["quote", "blockquote"],
    },
    SlashCommandSpec {
        id: SlashCommandId::Code,
        title: "Code Block",
        hint: "Insert code block",
        keywords: &["code", "snippet"],
    },
    SlashCommandSpec {
        id: SlashCommandId::Table,
        title: "Table",
        hint: "Insert 3 × 3 table",
        keywords: &["table", "grid"],
    },
    SlashCommandSpec {
        id: SlashCommandId::Emoji,
        title: "Emoji",
        hint: "Insert 😀 emoji",
        keywords: &["emoji", "smile", "icon"],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashKey {
    Up,
    Down,
    Enter,
    Escape,
}

/// Outcome of feeding a key while the menu is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashKeyResult {
    /// Menu closed; key should reach the editor instead.
    Ignored,
    /// Key consumed by the menu.
    Handled,
    /// Enter/click picked a command; the session must delete the typed
    /// `/query` range and dispatch the command, then close the menu.
    Commit(SlashCommandId),
}

#[derive(Debug, Clone, PartialEq)]
enum MenuState {
    Closed,
    Open {
        /// Position of the typed `/`.
        anchor: usize,
        query: String,
        selected: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlashMenu {
    state: MenuState,
}

impl Default for SlashMenu {
    fn default() -> Self {
        SlashMenu::new()
    }
}

impl SlashMenu {
    pub fn new() -> SlashMenu {
        SlashMenu {
            state: MenuState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, MenuState::Open { .. })
    }

    pub fn query(&self) -> Option<&str> {
        match &self.state {
            MenuState::Open { query, .. } => Some(query),
            MenuState::Closed => None,
        }
    }

    pub fn selected(&self) -> Option<usize> {
        match &self.state {
            MenuState::Open { selected, .. } => Some(*selected),
            MenuState::Closed => None,
        }
    }

    pub fn anchor(&self) -> Option<usize> {
        match &self.state {
            MenuState::Open { anchor, .. } => Some(*anchor),
            MenuState::Closed => None,
        }
    }

    /// Commands matching the current query, case-insensitively against
    /// title, hint and keywords.
    pub fn filtered(&self) -> Vec<&'static SlashCommandSpec> {
        let query = self.query().unwrap_or("").trim().to_lowercase();
        SLASH_COMMANDS
            .iter()
            .filter(|spec| {
                query.is_empty()
                    || spec.title.to_lowercase().contains(&query)
                    || spec.hint.to_lowercase().contains(&query)
                    || spec.keywords.iter().any(|k| k.contains(&query))
            })
            .collect()
    }

    /// Notify the menu that text was typed at a collapsed cursor. A `/`
    /// opens the menu anchored at its position.
    pub fn on_text_input(&mut self, inserted: &str, at: usize) {
        if !self.is_open() && inserted == "/" {
            self.state = MenuState::Open {
                anchor: at,
                query: String::new(),
                selected: 0,
            };
        }
    }

    /// Re-derive the menu state after a document or selection change. The
    /// menu closes when the selection is no longer a cursor after the
    /// anchor, or when the query stops looking like a command query.
    pub fn on_state(&mut self, state: &EditorState) {
        let MenuState::Open {
            anchor,
            query,
            selected,
        } = &self.state
        else {
            return;
        };
        let anchor = *anchor;
        let cursor = match &state.selection {
            Selection::Text { anchor: a, head } if a == head => *head,
            _ => {
                self.state = MenuState::Closed;
                return;
            }
        };
        if cursor < anchor + 1 || anchor >= state.doc.content_size() {
            self.state = MenuState::Closed;
            return;
        }
        let text = state.doc.text_between(anchor, cursor, "", "");
        let Some(new_query) = text.strip_prefix('/') else {
            self.state = MenuState::Closed;
            return;
        };
        if new_query.contains(char::is_whitespace) {
            self.state = MenuState::Closed;
            return;
        }
        let selected = if new_query == query { *selected } else { 0 };
        self.state = MenuState::Open {
            anchor,
            query: new_query.to_string(),
            selected,
        };
    }

    /// Key handling while open. Arrow keys wrap around the filtered list.
    pub fn on_key(&mut self, key: SlashKey) -> SlashKeyResult {
        let MenuState::Open {
            anchor,
            query,
            selected,
        } = self.state.clone()
        else {
            return SlashKeyResult::Ignored;
        };
        let items = self.filtered();
        match key {
            SlashKey::Escape => {
                self.state = MenuState::Closed;
                SlashKeyResult::Handled
            }
            SlashKey::Down => {
                if !items.is_empty() {
                    self.state = MenuState::Open {
                        anchor,
                        query,
                        selected: (selected + 1) % items.len(),
                    };
                }
                SlashKeyResult::Handled
            }
            SlashKey::Up => {
                if !items.is_empty() {
                    self.state = MenuState::Open {
                        anchor,
                        query,
                        selected: (selected + items.len() - 1) % items.len(),
                    };
                }
                SlashKeyResult::Handled
            }
            SlashKey::Enter => {
                if items.is_empty() {
                    return SlashKeyResult::Ignored;
                }
                let picked = items[selected.min(items.len() - 1)];
                self.state = MenuState::Closed;
                SlashKeyResult::Commit(picked.id)
            }
        }
    }

    /// Pointer-down outside the menu closes it without committing.
    pub fn on_pointer_down_outside(&mut self) {
        self.state = MenuState::Closed;
    }

    pub fn close(&mut self) {
        self.state = MenuState::Closed;
    }

    /// The `[anchor, cursor)` range holding the typed `/query`, to be
    /// deleted on commit.
    pub fn commit_range(&self, state: &EditorState) -> Option<(usize, usize)> {
        let anchor = self.anchor()?;
        let cursor = match &state.selection {
            Selection::Text { anchor: a, head } if a == head => *head,
            _ => return None,
        };
        if cursor < anchor {
            return None;
        }
        Some((anchor, cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;

    fn open_menu_state(text_after_slash: &str) -> (SlashMenu, EditorState) {
        let text = format!("/{text_after_slash}");
        let doc = Node::doc(vec![Node::paragraph_text(&text)]);
        let cursor = 1 + text.chars().count();
        let mut state = EditorState::new(doc);
        state.selection = Selection::cursor(cursor);
        let mut menu = SlashMenu::new();
        menu.on_text_input("/", 1);
        menu.on_state(&state);
        (menu, state)
    }

    #[test]
    fn test_opens_on_slash_and_tracks_query() {
        let (menu, _) = open_menu_state("tab");
        assert!(menu.is_open());
        assert_eq!(menu.query(), Some("tab"));
    }

    #[test]
    fn test_filter_matches_title_hint_keywords() {
        let (menu, _) = open_menu_state("tab");
        let items = menu.filtered();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, SlashCommandId::Table);

        let (menu, _) = open_menu_state("heading");
        // Matches Heading 1/2/3 titles and the "title" keyword owner.
        assert!(menu.filtered().len() >= 3);

        let (menu, _) = open_menu_state("");
        assert_eq!(menu.filtered().len(), SLASH_COMMANDS.len());
    }

    #[test]
    fn test_whitespace_query_closes() {
        let (menu, _) = open_menu_state("ta b");
        assert!(!menu.is_open());
    }

    #[test]
    fn test_cursor_before_anchor_closes() {
        let (mut menu, mut state) = open_menu_state("x");
        assert!(menu.is_open());
        state.selection = Selection::cursor(1);
        menu.on_state(&state);
        assert!(!menu.is_open());
    }

    #[test]
    fn test_non_collapsed_selection_closes() {
        let (mut menu, mut state) = open_menu_state("x");
        state.selection = Selection::Text { anchor: 1, head: 3 };
        menu.on_state(&state);
        assert!(!menu.is_open());
    }

    #[test]
    fn test_arrows_wrap_modulo_filtered() {
        let (mut menu, _) = open_menu_state("");
        assert_eq!(menu.selected(), Some(0));
        menu.on_key(SlashKey::Up);
        assert_eq!(menu.selected(), Some(SLASH_COMMANDS.len() - 1));
        menu.on_key(SlashKey::Down);
        assert_eq!(menu.selected(), Some(0));
    }

    #[test]
    fn test_enter_commits_only_match() {
        let (mut menu, state) = open_menu_state("tab");
        let result = menu.on_key(SlashKey::Enter);
        assert_eq!(result, SlashKeyResult::Commit(SlashCommandId::Table));
        assert!(!menu.is_open());
        // The commit range covers "/tab".
        let (mut menu2, state2) = open_menu_state("tab");
        assert_eq!(menu2.commit_range(&state2), Some((1, 5)));
        menu2.close();
        let _ = state;
    }

    #[test]
    fn test_escape_closes() {
        let (mut menu, _) = open_menu_state("");
        assert_eq!(menu.on_key(SlashKey::Escape), SlashKeyResult::Handled);
        assert!(!menu.is_open());
        assert_eq!(menu.on_key(SlashKey::Enter), SlashKeyResult::Ignored);
    }

    #[test]
    fn test_query_change_resets_selection() {
        let (mut menu, state) = open_menu_state("");
        menu.on_key(SlashKey::Down);
        assert_eq!(menu.selected(), Some(1));
        // Same query → selection kept.
        menu.on_state(&state);
        assert_eq!(menu.selected(), Some(1));
    }
}

//! The editor session: one logical owner for state, history, slash menu
//! and persistence scheduling. Every mutation flows through
//! [`Session::dispatch`], which is what keeps undo recording, slash-menu
//! tracking and the save debounce consistent with each other.

use std::time::Instant;

use crate::editing::commands::{self, DispatchFn};
use crate::editing::input_rules;
use crate::editing::slash::{SlashCommandId, SlashKey, SlashKeyResult, SlashMenu};
use crate::editing::transaction::{EditorState, Origin, Transaction};
use crate::editing::History;
use crate::html::{parse_document, serialize_body};
use crate::model::Node;
use crate::schema::NodeKind;
use crate::store::{CONTENT_KEY, ContentStore, SAVE_DEBOUNCE, SaveScheduler, StoreError};

/// The document a fresh session starts from, also the fallback when
/// persisted content is absent or unusable.
pub fn default_document() -> Node {
    Node::doc(vec![Node::empty_paragraph()])
}

pub struct Session<S: ContentStore> {
    state: EditorState,
    history: History,
    slash: SlashMenu,
    scheduler: SaveScheduler,
    store: S,
}

impl<S: ContentStore> Session<S> {
    /// Open a session from persisted content, falling back to the default
    /// document when the key is missing. Parse repair means stored markup
    /// never fails to load; an empty parse degrades to the default.
    pub fn open(store: S) -> Result<Session<S>, StoreError> {
        let doc = match store.load(CONTENT_KEY)? {
            Some(html) => parse_document(&html),
            None => default_document(),
        };
        Ok(Session {
            state: EditorState::new(doc),
            history: History::new(),
            slash: SlashMenu::new(),
            scheduler: SaveScheduler::new(SAVE_DEBOUNCE),
            store,
        })
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn doc(&self) -> &Node {
        &self.state.doc
    }

    pub fn slash_menu(&self) -> &SlashMenu {
        &self.slash
    }

    pub fn body_html(&self) -> String {
        serialize_body(&self.state.doc)
    }

    /// The single mutation path: apply, record for undo, refresh the slash
    /// menu, arm the save debounce.
    pub fn dispatch(&mut self, tx: Transaction, now: Instant) {
        let before = self.state.clone();
        self.state = self.state.apply(&tx);
        self.history.record(&tx, &before, now);
        self.slash.on_state(&self.state);
        if tx.doc_changed() {
            self.scheduler.note_edit(now);
        }
    }

    /// Run a command against the current state, dispatching whatever it
    /// builds. Returns the command's applicability.
    pub fn run(
        &mut self,
        command: impl Fn(&EditorState, Option<DispatchFn>) -> bool,
        now: Instant,
    ) -> bool {
        let mut pending: Vec<Transaction> = Vec::new();
        let applicable = command(&self.state, Some(&mut |tx| pending.push(tx)));
        for tx in pending {
            self.dispatch(tx, now);
        }
        applicable
    }

    /// Type text: inserts at the selection, then feeds the slash menu and
    /// the markdown-style input rules.
    pub fn insert_text(&mut self, text: &str, now: Instant) -> bool {
        let at = {
            let (from, _) = self.state.selection.range(&self.state.doc);
            from
        };
        if !self.run(commands::insert_text(text.to_string()), now) {
            return false;
        }
        self.slash.on_text_input(text, at);
        self.slash.on_state(&self.state);
        self.run(input_rules::apply_after_input, now);
        true
    }

    /// Feed a key to the slash menu; commits run the picked command after
    /// deleting the typed `/query` text.
    pub fn slash_key(&mut self, key: SlashKey, now: Instant) -> SlashKeyResult {
        let range = self.slash.commit_range(&self.state);
        let result = self.slash.on_key(key);
        if let SlashKeyResult::Commit(id) = result {
            if let Some((from, to)) = range {
                let mut tx = Transaction::new(&self.state);
                tx.set_origin(Origin::Command);
                if tx.delete(from, to).is_ok() {
                    self.dispatch(tx, now);
                }
            }
            self.run_slash_command(id, now);
        }
        result
    }

    fn run_slash_command(&mut self, id: SlashCommandId, now: Instant) {
        match id {
            SlashCommandId::Text => {
                self.run(
                    commands::set_block_type(
                        NodeKind::Paragraph,
                        NodeKind::Paragraph.default_attrs(),
                    ),
                    now,
                );
            }
            SlashCommandId::H1 => self.run_heading(1, now),
            SlashCommandId::H2 => self.run_heading(2, now),
            SlashCommandId::H3 => self.run_heading(3, now),
            SlashCommandId::Bullet => {
                self.run(commands::wrap_in_list(NodeKind::BulletList), now);
            }
            SlashCommandId::Numbered => {
                self.run(commands::wrap_in_list(NodeKind::OrderedList), now);
            }
            SlashCommandId::Quote => {
                self.run(commands::wrap_in_blockquote, now);
            }
            SlashCommandId::Code => {
                self.run(
                    commands::set_block_type(
                        NodeKind::CodeBlock,
                        NodeKind::CodeBlock.default_attrs(),
                    ),
                    now,
                );
            }
            SlashCommandId::Table => {
                self.run(commands::insert_table(3, 3), now);
            }
            SlashCommandId::Emoji => {
                self.run(commands::insert_text("😀".to_string()), now);
            }
        }
    }

    fn run_heading(&mut self, level: u8, now: Instant) {
        let attrs = crate::schema::Attrs::Heading(crate::schema::HeadingAttrs {
            level,
            ..Default::default()
        });
        self.run(commands::set_block_type(NodeKind::Heading, attrs), now);
    }

    pub fn undo(&mut self, now: Instant) -> bool {
        let mut pending: Vec<Transaction> = Vec::new();
        let ok = self
            .history
            .undo(&self.state, Some(&mut |tx| pending.push(tx)));
        for tx in pending {
            self.dispatch(tx, now);
        }
        ok
    }

    pub fn redo(&mut self, now: Instant) -> bool {
        let mut pending: Vec<Transaction> = Vec::new();
        let ok = self
            .history
            .redo(&self.state, Some(&mut |tx| pending.push(tx)));
        for tx in pending {
            self.dispatch(tx, now);
        }
        ok
    }

    /// Drive the debounce: persists the body when the quiet window has
    /// elapsed. Returns whether a save happened.
    pub fn tick(&mut self, now: Instant) -> Result<bool, StoreError> {
        if !self.scheduler.take_due(now) {
            return Ok(false);
        }
        let body = serialize_body(&self.state.doc);
        self.store.save(CONTENT_KEY, &body)?;
        Ok(true)
    }

    /// Persist immediately, cancelling any pending debounce.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.scheduler.cancel();
        let body = serialize_body(&self.state.doc);
        self.store.save(CONTENT_KEY, &body)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

//! # richpad-engine
//!
//! The document core of a WordPad-style rich text editor: a typed,
//! immutable document tree with ProseMirror-style integer positions, a
//! transactional edit protocol with position mapping, a command layer
//! with a dry-run contract, bounded undo history, a slash-command menu
//! state machine, HTML round-tripping and export encoders.
//!
//! ## Shape of an edit
//!
//! ```rust
//! use richpad_engine::editing::{EditorState, commands};
//! use richpad_engine::model::Node;
//! use richpad_engine::schema::Mark;
//!
//! let mut state = EditorState::new(Node::doc(vec![Node::paragraph_text("hello")]));
//! state.selection = richpad_engine::editing::Selection::Text { anchor: 1, head: 6 };
//!
//! // Dry run: is bold applicable here?
//! let bold = commands::toggle_mark(Mark::Bold);
//! assert!(bold(&state, None));
//!
//! // Real run: dispatch the transaction the command builds.
//! let mut next = None;
//! bold(&state, Some(&mut |tx| next = Some(state.apply(&tx))));
//! let state = next.unwrap();
//! assert_eq!(state.doc.child(0).child(0).marks(), &[Mark::Bold]);
//! ```
//!
//! The UI contract is exactly this: every toolbar button, menu item and
//! keyboard shortcut binds to one command invocation; rendering and event
//! plumbing live outside this crate.

pub mod editing;
pub mod export;
pub mod html;
pub mod model;
pub mod schema;
pub mod session;
pub mod store;

// Re-export key types for easier usage
pub use editing::{
    EditorState, History, Selection, SlashCommandId, SlashKey, SlashKeyResult, SlashMenu, Step,
    Transaction, TransactionError,
};
pub use model::{Fragment, Node, PositionError, ReplaceError, ResolvedPos, Slice};
pub use schema::{Align, Attrs, Mark, MarkKind, NodeKind};
pub use session::{Session, default_document};
pub use store::{CONTENT_KEY, ContentStore, FileStore, MemoryStore, SaveScheduler, StoreError};

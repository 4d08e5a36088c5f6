//! The edit protocol: steps and transactions over immutable documents,
//! the command layer built on them, selection resolution, undo history
//! and the slash-menu state machine.
//!
//! Control flow for every edit is the same: a user intent invokes a
//! command against the current [`EditorState`]; the command builds a
//! [`Transaction`] (or reports `false`); applying the transaction yields a
//! new state with the selection remapped through the transaction's
//! position mapping. Nothing mutates in place, and a transaction either
//! applies whole or not at all.

pub mod commands;
pub mod history;
pub mod input_rules;
pub mod selection;
pub mod slash;
pub mod step;
pub mod tables;
pub mod transaction;

pub use commands::DispatchFn;
pub use history::History;
pub use selection::Selection;
pub use slash::{SlashCommandId, SlashKey, SlashKeyResult, SlashMenu};
pub use step::{Assoc, MapResult, Mapping, Step, StepError, StepMap};
pub use tables::TableMap;
pub use transaction::{EditorState, Origin, Transaction, TransactionError};

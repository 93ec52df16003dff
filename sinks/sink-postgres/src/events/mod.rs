//! Turn the events of a block into knowledge graph writes.
mod edits;
mod handler;
pub mod mapper;
pub mod parser;

use std::fmt;

pub use self::edits::{
    apply_edit, edit_write, load_edits, ImportedSpace, LoadedContent, PublishedEdit,
};
pub use self::handler::{BlockHandler, BlockSummary, EventFailure, EventKind, Tally};

#[derive(Debug)]
pub struct EventError;
impl error_stack::Context for EventError {}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to handle event")
    }
}

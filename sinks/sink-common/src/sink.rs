use std::fmt::Display;

use async_trait::async_trait;
use error_stack::Result;

use crate::cursor::Cursor;

#[derive(Debug, PartialEq)]
pub enum CursorAction {
    /// Let the connector persist the cursor.
    Persist,
    /// The sink already stored the cursor (or must not store it).
    Skip,
}

/// The block being handled.
#[derive(Debug, Clone)]
pub struct Context {
    /// Cursor pointing at the block.
    pub cursor: Cursor,
    /// Highest block that the stream will never undo.
    pub final_block_height: u64,
    /// Unique id of this block's processing, attached to its logs.
    pub request_id: String,
}

#[async_trait]
pub trait Sink {
    type Options: Send;
    type Error: error_stack::Context + Send + Sync + 'static;
    /// Message decoded from the module output of each block.
    type Block: prost::Message + prost::Name + Default + Send + Sync;

    async fn from_options(options: Self::Options) -> Result<Self, Self::Error>
    where
        Self: Sized;

    /// Handle the output of one block.
    ///
    /// Blocks without output are handled with the default message.
    async fn handle_data(
        &mut self,
        ctx: &Context,
        block: &Self::Block,
    ) -> Result<CursorAction, Self::Error>;

    /// Remove all data written after `cursor`.
    async fn handle_invalidate(&mut self, cursor: &Cursor) -> Result<CursorAction, Self::Error>;

    async fn cleanup(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Context(block={}, final={}, request_id={})",
            self.cursor, self.final_block_height, self.request_id
        )
    }
}

use async_trait::async_trait;
use error_stack::Result;

use crate::{cursor::Cursor, SinkError};

use super::common::PersistenceClient;

/// A [PersistenceClient] that keeps the cursor in memory.
#[derive(Default)]
pub struct InMemoryPersistence {
    cursor: Option<Cursor>,
}

#[async_trait]
impl PersistenceClient for InMemoryPersistence {
    async fn lock(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn unlock(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn get_cursor(&mut self) -> Result<Option<Cursor>, SinkError> {
        Ok(self.cursor.clone())
    }

    async fn put_cursor(&mut self, cursor: Cursor) -> Result<(), SinkError> {
        self.cursor = Some(cursor);
        Ok(())
    }

    async fn delete_cursor(&mut self) -> Result<(), SinkError> {
        self.cursor = None;
        Ok(())
    }
}

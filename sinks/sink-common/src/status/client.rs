use std::fmt;

use error_stack::{Result, ResultExt};
use tokio::sync::mpsc;

use crate::cursor::Cursor;

#[derive(Debug)]
pub struct StatusServerClientError;
impl error_stack::Context for StatusServerClientError {}

impl fmt::Display for StatusServerClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to communicate with status server")
    }
}

/// Message between the connector and the status service.
#[derive(Debug)]
pub enum StatusMessage {
    /// Set the starting cursor.
    SetStartingCursor(Option<Cursor>),
    /// Update the most recently indexed cursor.
    UpdateCursor(Option<Cursor>),
    /// Signal that the stream is alive.
    Heartbeat,
}

/// Handle used by the connector to publish its progress.
#[derive(Clone)]
pub struct StatusServerClient {
    tx: mpsc::Sender<StatusMessage>,
}

impl StatusServerClient {
    pub fn new(tx: mpsc::Sender<StatusMessage>) -> Self {
        StatusServerClient { tx }
    }

    /// Send heartbeat message to status server.
    pub async fn heartbeat(&self) -> Result<(), StatusServerClientError> {
        self.tx
            .send(StatusMessage::Heartbeat)
            .await
            .change_context(StatusServerClientError)
            .attach_printable("failed to send heartbeat request")?;
        Ok(())
    }

    /// Set the cursor the connector started from.
    pub async fn set_starting_cursor(
        &self,
        cursor: Option<Cursor>,
    ) -> Result<(), StatusServerClientError> {
        self.tx
            .send(StatusMessage::SetStartingCursor(cursor))
            .await
            .change_context(StatusServerClientError)
            .attach_printable("failed to send starting cursor request")?;
        Ok(())
    }

    /// Update the most recently processed cursor.
    pub async fn update_cursor(&self, cursor: Option<Cursor>) -> Result<(), StatusServerClientError> {
        self.tx
            .send(StatusMessage::UpdateCursor(cursor))
            .await
            .change_context(StatusServerClientError)
            .attach_printable("failed to send update cursor request")?;
        Ok(())
    }
}

use std::time::Duration;

use error_stack::{Result, ResultExt};
use futures::Future;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    cursor::Cursor, error::SinkError, persistence::BoxedPersistenceClient, status::StatusServer,
    CursorAction, SinkErrorReportExt, StatusServerClient,
};

/// Keeps the persisted cursor and the status server in sync.
pub struct StateManager {
    persistence: BoxedPersistenceClient,
    status_client: StatusServerClient,
}

impl StateManager {
    pub fn start(
        persistence: BoxedPersistenceClient,
        status_server: StatusServer,
        ct: CancellationToken,
    ) -> Result<(StateManager, impl Future<Output = Result<(), SinkError>>), SinkError> {
        let (status_client, status_server) = status_server.start(ct)?;

        let manager = StateManager {
            persistence,
            status_client,
        };

        Ok((manager, status_server))
    }

    /// Reads the stored cursor. The status server reports `genesis` when nothing is stored.
    pub async fn get_cursor(&mut self, genesis: &Cursor) -> Result<Option<Cursor>, SinkError> {
        let cursor = self.persistence.get_cursor().await?;
        let starting_cursor = cursor.clone().unwrap_or_else(|| genesis.clone());
        self.status_client
            .set_starting_cursor(Some(starting_cursor))
            .await
            .map_err(|err| err.status("failed to send starting cursor"))?;
        Ok(cursor)
    }

    /// Publish the new cursor and, if requested, persist it.
    pub async fn put_cursor(&mut self, cursor: Cursor, action: CursorAction) -> Result<(), SinkError> {
        if action == CursorAction::Persist {
            self.persistence.put_cursor(cursor.clone()).await?;
        }

        self.status_client
            .update_cursor(Some(cursor))
            .await
            .map_err(|err| err.status("failed to send cursor update"))?;

        Ok(())
    }

    pub async fn heartbeat(&mut self) -> Result<(), SinkError> {
        self.status_client
            .heartbeat()
            .await
            .map_err(|err| err.status("failed to send heartbeat"))?;

        Ok(())
    }

    pub async fn lock(&mut self, ct: CancellationToken) -> Result<(), SinkError> {
        info!("acquiring persistence lock");
        // lock will block until it's acquired.
        // notice we can straight exit if the cancellation token is cancelled, since the lock
        // is not held by us.
        tokio::select! {
            ret = self.persistence.lock() => {
                ret.change_context(SinkError::Temporary)
                    .attach_printable("failed to lock persistence")?;
                info!("lock acquired");
            }
            _ = tokio::time::sleep(Duration::from_secs(30)) => {
                info!("failed to acquire persistence lock within 30 seconds");
                return Err(SinkError::Configuration)
                    .attach_printable("failed to acquire persistence lock within 30 seconds");
            }
            _ = ct.cancelled() => {
                return Ok(())
            }
        }

        Ok(())
    }

    pub async fn cleanup(&mut self) -> Result<(), SinkError> {
        self.persistence.unlock().await?;

        Ok(())
    }
}

use async_trait::async_trait;
use error_stack::{Result, ResultExt};
use geo_sink_common::{
    Cursor, PersistenceClient, SinkError, SinkErrorReportExt, SinkErrorResultExt,
};
use tokio_postgres::GenericClient;
use tracing::{debug, info};

use crate::storage::WriteError;

use super::{PgConnection, PgPool, CURSOR_ID};

/// Key of the advisory lock held while the sink is running.
const LOCK_KEY: i64 = 0x67656f;

/// Stores the cursor in the `cursors` table.
///
/// The lock is a session advisory lock, held by a connection taken out of the pool until
/// [PersistenceClient::unlock] is called.
pub struct PostgresPersistence {
    pool: PgPool,
    lock: Option<PgConnection>,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool, lock: None }
    }

    async fn connection(&self) -> Result<PgConnection, SinkError> {
        self.pool
            .get_owned()
            .await
            .persistence_client_error("failed to get database connection")
    }
}

#[async_trait]
impl PersistenceClient for PostgresPersistence {
    async fn lock(&mut self) -> Result<(), SinkError> {
        if self.lock.is_some() {
            return Ok(());
        }

        let conn = self.connection().await?;
        info!("acquiring sink lock");
        conn.execute("SELECT pg_advisory_lock($1)", &[&LOCK_KEY])
            .await
            .persistence_client_error("failed to acquire lock")?;
        info!("sink lock acquired");

        self.lock = Some(conn);
        Ok(())
    }

    async fn unlock(&mut self) -> Result<(), SinkError> {
        if let Some(conn) = self.lock.take() {
            conn.execute("SELECT pg_advisory_unlock($1)", &[&LOCK_KEY])
                .await
                .persistence_client_error("failed to release lock")?;
            info!("sink lock released");
        }
        Ok(())
    }

    async fn get_cursor(&mut self) -> Result<Option<Cursor>, SinkError> {
        let conn = self.connection().await?;
        read_cursor(&*conn)
            .await
            .map_err(|err| err.persistence_client_error("failed to read cursor"))
    }

    async fn put_cursor(&mut self, cursor: Cursor) -> Result<(), SinkError> {
        let conn = self.connection().await?;
        write_cursor(&*conn, &cursor)
            .await
            .map_err(|err| err.persistence_client_error("failed to write cursor"))
    }

    async fn delete_cursor(&mut self) -> Result<(), SinkError> {
        let conn = self.connection().await?;
        conn.execute("DELETE FROM cursors WHERE id = $1", &[&CURSOR_ID])
            .await
            .persistence_client_error("failed to delete cursor")?;
        Ok(())
    }
}

pub async fn read_cursor<C>(client: &C) -> Result<Option<Cursor>, WriteError>
where
    C: GenericClient + Sync,
{
    let row = client
        .query_opt(
            "SELECT block_number, block_hash, block_timestamp, cursor FROM cursors WHERE id = $1",
            &[&CURSOR_ID],
        )
        .await
        .change_context(WriteError)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let block_number: i64 = row.try_get("block_number").change_context(WriteError)?;
    let block_timestamp: Option<i64> = row.try_get("block_timestamp").change_context(WriteError)?;

    Ok(Some(Cursor {
        block_number: block_number as u64,
        block_hash: row.try_get("block_hash").change_context(WriteError)?,
        block_timestamp: block_timestamp.map(|timestamp| timestamp as u64),
        cursor: row.try_get("cursor").change_context(WriteError)?,
    }))
}

/// Store `cursor`. A missing timestamp is taken from the `blocks` table.
pub async fn write_cursor<C>(client: &C, cursor: &Cursor) -> Result<(), WriteError>
where
    C: GenericClient + Sync,
{
    let block_number = cursor.block_number as i64;
    let block_timestamp = cursor.block_timestamp.map(|timestamp| timestamp as i64);

    client
        .execute(
            "INSERT INTO cursors (id, block_number, block_hash, block_timestamp, cursor) \
             VALUES ($1, $2, $3, \
             COALESCE($4::bigint, (SELECT timestamp FROM blocks WHERE number = $2)), $5) \
             ON CONFLICT (id) DO UPDATE SET block_number = EXCLUDED.block_number, \
             block_hash = EXCLUDED.block_hash, block_timestamp = EXCLUDED.block_timestamp, \
             cursor = EXCLUDED.cursor",
            &[
                &CURSOR_ID,
                &block_number,
                &cursor.block_hash,
                &block_timestamp,
                &cursor.cursor,
            ],
        )
        .await
        .change_context(WriteError)
        .attach_printable("failed to write cursor")?;

    debug!(block_number = cursor.block_number, "cursor stored");
    Ok(())
}

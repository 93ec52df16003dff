use std::fmt;

use async_trait::async_trait;
use error_stack::{Result, ResultExt};
use geo_observability::Histogram;
use geo_protocol::geo::GeoOutput;
use geo_sink_common::{Context, Cursor, CursorAction, Sink};
use prost::Message;
use tracing::info;

use crate::{
    db::{PgPool, PostgresStorage},
    events::BlockHandler,
    ipfs::{ContentFetcher, IpfsFetcher, IpfsFetcherOptions},
    storage::{BlockRow, Storage},
};

#[derive(Debug)]
pub struct SinkPostgresError;
impl error_stack::Context for SinkPostgresError {}

impl fmt::Display for SinkPostgresError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("postgres sink operation failed")
    }
}

pub struct GeoSinkOptions {
    pub pool: PgPool,
    pub ipfs: IpfsFetcherOptions,
}

/// Writes the geo module output of each block to the knowledge graph.
pub struct GeoSink<S, F> {
    handler: BlockHandler<S, F>,
    block_message_size: Histogram<u64>,
}

impl<S, F> GeoSink<S, F>
where
    S: Storage + Send + Sync,
    F: ContentFetcher + Send + Sync,
{
    pub fn new(storage: S, fetcher: F) -> Self {
        let block_message_size = geo_observability::meter("geo_sink_postgres")
            .u64_histogram("block_message_size")
            .with_description("size of the module output of a block")
            .with_unit("By")
            .build();

        GeoSink {
            handler: BlockHandler::new(storage, fetcher),
            block_message_size,
        }
    }

    pub fn handler(&self) -> &BlockHandler<S, F> {
        &self.handler
    }

    pub async fn handle_block(
        &self,
        ctx: &Context,
        output: &GeoOutput,
    ) -> Result<CursorAction, SinkPostgresError> {
        self.block_message_size
            .record(output.encoded_len() as u64, &[]);

        let block = BlockRow {
            number: ctx.cursor.block_number,
            hash: ctx.cursor.block_hash.clone(),
            timestamp: ctx.cursor.block_timestamp,
        };

        self.handler
            .handle_block(&block, ctx.final_block_height, output)
            .await
            .change_context(SinkPostgresError)
            .attach_printable_lazy(|| format!("failed to handle block {}", block.number))?;

        Ok(CursorAction::Persist)
    }

    pub async fn undo(&self, cursor: &Cursor) -> Result<CursorAction, SinkPostgresError> {
        info!(cursor = %cursor, "undo blocks after cursor");
        self.handler
            .undo(cursor)
            .await
            .change_context(SinkPostgresError)
            .attach_printable_lazy(|| format!("failed to undo to {cursor}"))
    }
}

#[async_trait]
impl Sink for GeoSink<PostgresStorage, IpfsFetcher> {
    type Options = GeoSinkOptions;
    type Error = SinkPostgresError;
    type Block = GeoOutput;

    async fn from_options(options: Self::Options) -> Result<Self, Self::Error> {
        let fetcher = IpfsFetcher::new(options.ipfs)
            .change_context(SinkPostgresError)
            .attach_printable("failed to create ipfs fetcher")?;

        Ok(GeoSink::new(PostgresStorage::new(options.pool), fetcher))
    }

    #[tracing::instrument(skip_all, err(Debug))]
    async fn handle_data(
        &mut self,
        ctx: &Context,
        block: &Self::Block,
    ) -> Result<CursorAction, Self::Error> {
        self.handle_block(ctx, block).await
    }

    #[tracing::instrument(skip_all, err(Debug))]
    async fn handle_invalidate(&mut self, cursor: &Cursor) -> Result<CursorAction, Self::Error> {
        self.undo(cursor).await
    }
}

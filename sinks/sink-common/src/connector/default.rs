use error_stack::{Result, ResultExt};
use geo_protocol::{
    client::StreamMessage,
    substreams::rpc::v2::{BlockScopedData, BlockUndoSignal, Request},
};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::{
    cursor::Cursor, error::SinkError, sink::Sink, Context, SinkErrorResultExt,
};

use super::{
    progress::{log_progress, log_session},
    sink::{Handled, SinkWithBackoff},
    state::StateManager,
    stream::{StreamAction, StreamClientFactory},
};

pub struct DefaultConnector<S>
where
    S: Sink + Send + Sync,
{
    sink: SinkWithBackoff<S>,
    stream_client_factory: StreamClientFactory,
    state_manager: StateManager,
}

impl<S> DefaultConnector<S>
where
    S: Sink + Send + Sync,
{
    pub fn new(
        sink: SinkWithBackoff<S>,
        stream_client_factory: StreamClientFactory,
        state_manager: StateManager,
    ) -> Self {
        Self {
            sink,
            stream_client_factory,
            state_manager,
        }
    }

    pub async fn start(&mut self, ct: CancellationToken) -> Result<(), SinkError> {
        self.state_manager.lock(ct.clone()).await?;

        let genesis = {
            let configuration = self.stream_client_factory.configuration();
            Cursor::genesis(
                configuration.starting_block,
                configuration.starting_block_hash.clone(),
            )
        };
        let stored_cursor = self.state_manager.get_cursor(&genesis).await?;

        if let Some(cursor) = &stored_cursor {
            // A block newer than the cursor may have been partially written before a crash.
            info!(cursor = %cursor, "restarting from last cursor");
            if self.handle_invalidate(cursor.clone(), ct.clone()).await? == StreamAction::Stop {
                return Ok(());
            }
        }

        let request = self.stream_request(stored_cursor.as_ref());
        debug!(
            start_block = request.start_block_num,
            module = %request.output_module,
            "start consume stream"
        );

        let mut data_stream = self
            .stream_client_factory
            .new_stream_client()
            .await?
            .blocks(request)
            .await
            .change_context(SinkError::Temporary)
            .attach_printable("failed to start stream")?;

        let mut ret = Ok(());
        loop {
            tokio::select! {
                _ = ct.cancelled() => {
                    info!("sink stopped: cancelled");
                    break;
                }
                stream_message = data_stream.try_next() => {
                    match stream_message {
                        Err(err) => {
                            ret = Err(err)
                                .change_context(SinkError::Temporary)
                                .attach_printable("data stream error");
                            break;
                        }
                        Ok(None) => {
                            ret = Err(SinkError::Temporary)
                                .attach_printable("data stream closed");
                            break;
                        }
                        Ok(Some(message)) => {
                            match self.handle_message(message, ct.clone()).await {
                                Ok(StreamAction::Continue) => {}
                                Ok(StreamAction::Stop) => break,
                                Err(err) => {
                                    ret = Err(err);
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        }

        self.sink.cleanup().await?;
        self.state_manager.cleanup().await?;

        ret
    }

    fn stream_request(&self, cursor: Option<&Cursor>) -> Request {
        let configuration = self.stream_client_factory.configuration();

        let (start_block_num, start_cursor) = match cursor {
            Some(cursor) if cursor.is_resumable() => {
                (cursor.block_number as i64, cursor.cursor.clone())
            }
            Some(cursor) => (cursor.block_number as i64 + 1, String::new()),
            None => (configuration.starting_block as i64, String::new()),
        };

        Request {
            start_block_num,
            start_cursor,
            stop_block_num: 0,
            final_blocks_only: false,
            production_mode: true,
            output_module: configuration.output_module.clone(),
            modules: configuration.modules.clone(),
        }
    }

    async fn handle_message(
        &mut self,
        message: StreamMessage,
        ct: CancellationToken,
    ) -> Result<StreamAction, SinkError> {
        match message {
            StreamMessage::BlockScopedData(data) => {
                let request_id = Uuid::new_v4().to_string();
                let block_number = data.clock.as_ref().map(|clock| clock.number);
                let span = tracing::info_span!("block", block_number, request_id = %request_id);
                self.handle_data(data, request_id, ct)
                    .instrument(span)
                    .await
            }
            StreamMessage::BlockUndoSignal(undo) => {
                let cursor = undo_cursor(undo)?;
                info!(cursor = %cursor, "handle undo");
                self.handle_invalidate(cursor, ct).await
            }
            StreamMessage::Progress(progress) => {
                log_progress(&progress);
                self.state_manager.heartbeat().await?;
                Ok(StreamAction::Continue)
            }
            StreamMessage::Session(session) => {
                log_session(&session);
                Ok(StreamAction::Continue)
            }
            StreamMessage::FatalError(err) => {
                error!(
                    module = %err.module,
                    reason = %err.reason,
                    logs = ?err.logs,
                    "substreams fatal error"
                );
                Err(SinkError::Fatal)
                    .attach_printable("substreams module failed")
                    .attach_printable_lazy(|| format!("module: {}", err.module))
                    .attach_printable_lazy(|| format!("reason: {}", err.reason))
            }
        }
    }

    #[tracing::instrument(skip_all, err(Debug))]
    async fn handle_data(
        &mut self,
        data: BlockScopedData,
        request_id: String,
        ct: CancellationToken,
    ) -> Result<StreamAction, SinkError> {
        let cursor = data_cursor(&data)?;

        if let Some(ending_block) = self.stream_client_factory.configuration().ending_block {
            if cursor.block_number > ending_block {
                info!(
                    block = cursor.block_number,
                    ending_block = ending_block,
                    "ending block reached"
                );
                return Ok(StreamAction::Stop);
            }
        }

        // fatal error since if the sink is restarted it will receive the same data again.
        let block = match data.output.and_then(|output| output.map_output) {
            None => S::Block::default(),
            Some(output) if output.value.is_empty() => S::Block::default(),
            Some(output) => output
                .to_msg::<S::Block>()
                .fatal("failed to decode module output")
                .attach_printable_lazy(|| format!("type url: {}", output.type_url))?,
        };

        let context = Context {
            cursor,
            final_block_height: data.final_block_height,
            request_id,
        };

        info!(block = %context.cursor, "handle block");

        match self.sink.handle_data(&context, &block, ct).await? {
            Handled::Done(action) => {
                self.state_manager.put_cursor(context.cursor, action).await?;
                Ok(StreamAction::Continue)
            }
            Handled::Cancelled => Ok(StreamAction::Stop),
        }
    }

    #[tracing::instrument(skip_all, err(Debug))]
    async fn handle_invalidate(
        &mut self,
        cursor: Cursor,
        ct: CancellationToken,
    ) -> Result<StreamAction, SinkError> {
        match self.sink.handle_invalidate(&cursor, ct).await? {
            Handled::Done(action) => {
                self.state_manager.put_cursor(cursor, action).await?;
                Ok(StreamAction::Continue)
            }
            Handled::Cancelled => Ok(StreamAction::Stop),
        }
    }
}

fn data_cursor(data: &BlockScopedData) -> Result<Cursor, SinkError> {
    let Some(clock) = &data.clock else {
        return Err(SinkError::Fatal).attach_printable("block data without clock");
    };

    let block_timestamp = clock
        .timestamp
        .as_ref()
        .map(|timestamp| timestamp.seconds.max(0) as u64);

    Ok(Cursor {
        block_number: clock.number,
        block_hash: clock.id.clone(),
        block_timestamp,
        cursor: data.cursor.clone(),
    })
}

fn undo_cursor(undo: BlockUndoSignal) -> Result<Cursor, SinkError> {
    let Some(block) = undo.last_valid_block else {
        return Err(SinkError::Fatal).attach_printable("undo signal without last valid block");
    };

    Ok(Cursor {
        block_number: block.number,
        block_hash: block.id,
        block_timestamp: None,
        cursor: undo.last_valid_cursor,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;
    use bytesize::ByteSize;
    use error_stack::Result;
    use exponential_backoff::Backoff;
    use geo_protocol::{
        client::StreamMessage,
        geo::GeoOutput,
        substreams::{
            rpc::v2::{BlockScopedData, BlockUndoSignal},
            v1::{BlockRef, Clock},
        },
    };
    use tokio_util::sync::CancellationToken;
    use tonic::{metadata::MetadataMap, transport::Uri};

    use super::{data_cursor, undo_cursor, DefaultConnector};
    use crate::{
        connector::{
            state::StateManager,
            stream::{StreamAction, StreamClientFactory},
            SinkWithBackoff, StreamConfiguration,
        },
        cursor::Cursor,
        persistence::InMemoryPersistence,
        status::StatusServer,
        Context, CursorAction, Sink, SinkError,
    };

    /// Blocks written by [RecordingSink].
    #[derive(Clone, Default)]
    struct BlockLog(Arc<Mutex<Vec<u64>>>);

    impl BlockLog {
        fn blocks(&self) -> Vec<u64> {
            self.0.lock().unwrap().clone()
        }
    }

    struct RecordingSink {
        log: BlockLog,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        type Options = BlockLog;
        type Error = SinkError;
        type Block = GeoOutput;

        async fn from_options(log: BlockLog) -> Result<Self, SinkError> {
            Ok(RecordingSink { log })
        }

        async fn handle_data(
            &mut self,
            ctx: &Context,
            _block: &GeoOutput,
        ) -> Result<CursorAction, SinkError> {
            self.log.0.lock().unwrap().push(ctx.cursor.block_number);
            Ok(CursorAction::Persist)
        }

        async fn handle_invalidate(&mut self, cursor: &Cursor) -> Result<CursorAction, SinkError> {
            self.log
                .0
                .lock()
                .unwrap()
                .retain(|number| *number <= cursor.block_number);
            Ok(CursorAction::Persist)
        }
    }

    fn new_connector(
        log: &BlockLog,
        ct: CancellationToken,
    ) -> (
        DefaultConnector<RecordingSink>,
        impl Future<Output = Result<(), SinkError>>,
    ) {
        let sink = SinkWithBackoff::new(
            RecordingSink { log: log.clone() },
            Backoff::new(1, Duration::from_millis(1), None),
        );
        let stream_client_factory = StreamClientFactory::new(StreamConfiguration {
            stream_url: Uri::from_static("http://localhost:10016"),
            max_message_size_bytes: ByteSize::mb(100),
            metadata: MetadataMap::new(),
            bearer_token: None,
            timeout_duration: Duration::from_secs(1),
            output_module: "geo_out".to_string(),
            modules: Vec::new(),
            starting_block: 0,
            starting_block_hash: String::new(),
            ending_block: None,
        });
        let status_server = StatusServer::new("127.0.0.1:0".parse().unwrap(), None);
        let (state_manager, status_server) = StateManager::start(
            Box::<InMemoryPersistence>::default(),
            status_server,
            ct,
        )
        .unwrap();

        let connector = DefaultConnector::new(sink, stream_client_factory, state_manager);
        (connector, status_server)
    }

    fn block_data(number: u64) -> StreamMessage {
        StreamMessage::BlockScopedData(BlockScopedData {
            output: None,
            clock: Some(Clock {
                id: format!("0x{number:04x}"),
                number,
                timestamp: None,
            }),
            cursor: format!("c{number}"),
            final_block_height: 0,
        })
    }

    #[tokio::test]
    async fn test_undo_rewrites_cursor() {
        let ct = CancellationToken::new();
        let log = BlockLog::default();
        // the status server future owns the receiving end of the status channel.
        let (mut connector, _status_server) = new_connector(&log, ct.clone());

        for number in 1..=5 {
            let action = connector
                .handle_message(block_data(number), ct.clone())
                .await
                .unwrap();
            assert_eq!(action, StreamAction::Continue);
        }

        let genesis = Cursor::genesis(0, "");
        let cursor = connector
            .state_manager
            .get_cursor(&genesis)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cursor.block_number, 5);

        let undo = StreamMessage::BlockUndoSignal(BlockUndoSignal {
            last_valid_block: Some(BlockRef {
                id: "0x0003".to_string(),
                number: 3,
            }),
            last_valid_cursor: "c3".to_string(),
        });
        let action = connector.handle_message(undo, ct.clone()).await.unwrap();
        assert_eq!(action, StreamAction::Continue);

        assert_eq!(log.blocks(), vec![1, 2, 3]);
        let cursor = connector
            .state_manager
            .get_cursor(&genesis)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cursor.block_number, 3);
        assert_eq!(cursor.cursor, "c3");
    }

    #[test]
    fn test_data_cursor() {
        let data = BlockScopedData {
            output: None,
            clock: Some(Clock {
                id: "0x1000".to_string(),
                number: 1000,
                timestamp: Some(prost_types::Timestamp {
                    seconds: 1_700_000_000,
                    nanos: 0,
                }),
            }),
            cursor: "c1000".to_string(),
            final_block_height: 990,
        };

        let cursor = data_cursor(&data).unwrap();
        assert_eq!(cursor.block_number, 1000);
        assert_eq!(cursor.block_hash, "0x1000");
        assert_eq!(cursor.block_timestamp, Some(1_700_000_000));
        assert_eq!(cursor.cursor, "c1000");

        let data = BlockScopedData {
            clock: None,
            ..data
        };
        assert!(data_cursor(&data).is_err());
    }

    #[test]
    fn test_undo_cursor() {
        let undo = BlockUndoSignal {
            last_valid_block: Some(BlockRef {
                id: "0x0998".to_string(),
                number: 998,
            }),
            last_valid_cursor: "c998".to_string(),
        };

        let cursor = undo_cursor(undo).unwrap();
        assert_eq!(cursor.block_number, 998);
        assert_eq!(cursor.cursor, "c998");
        assert!(cursor.block_timestamp.is_none());
    }
}

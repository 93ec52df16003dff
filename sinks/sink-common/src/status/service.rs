use std::time::{Duration, Instant};

use error_stack::Result;
use geo_observability::Gauge;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{cursor::Cursor, SinkError, SinkErrorResultExt};

use super::{
    client::{StatusMessage, StatusServerClient},
    head::ChainHeadClient,
};

const HEAD_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Message between the http server and the status service.
#[derive(Debug)]
enum RequestMessage {
    /// Request indexer cursors (starting, current, head)
    GetCursor(oneshot::Sender<Cursors>),
}

#[derive(Debug, Clone, Default)]
pub struct Cursors {
    /// Indexer's starting cursor.
    pub starting: Option<Cursor>,
    /// Indexer's current cursor.
    pub current: Option<Cursor>,
    /// Chain's head block number.
    pub head: Option<u64>,
}

/// Tracks the connector progress.
///
/// This is the only reader of the connector updates, the http handlers query it through a
/// [StatusServiceClient].
pub struct StatusService {
    chain_head: Option<ChainHeadClient>,
    request_rx: mpsc::Receiver<RequestMessage>,
    status_rx: mpsc::Receiver<StatusMessage>,
    head: Option<u64>,
    head_refreshed_at: Option<Instant>,
}

/// Request data from the status service.
#[derive(Clone)]
pub struct StatusServiceClient {
    tx: mpsc::Sender<RequestMessage>,
}

impl StatusService {
    pub fn new(
        chain_head: Option<ChainHeadClient>,
    ) -> (Self, StatusServerClient, StatusServiceClient) {
        let (status_tx, status_rx) = mpsc::channel(128);
        let status_client = StatusServerClient::new(status_tx);

        let (request_tx, request_rx) = mpsc::channel(128);
        let status_service_client = StatusServiceClient { tx: request_tx };

        let service = StatusService {
            chain_head,
            status_rx,
            request_rx,
            head: None,
            head_refreshed_at: None,
        };

        (service, status_client, status_service_client)
    }

    pub async fn start(mut self, ct: CancellationToken) -> Result<(), SinkError> {
        let mut starting_cursor = None;
        let mut cursor = None;

        let metrics = SinkMetrics::default();

        loop {
            tokio::select! {
                biased;

                _ = ct.cancelled() => {
                    info!("status service stopped: cancelled");
                    break;
                }

                msg = self.status_rx.recv() => {
                    let Some(msg) = msg else {
                        info!("status channel closed");
                        break;
                    };
                    match msg {
                        StatusMessage::Heartbeat => {}
                        StatusMessage::UpdateCursor(new_cursor) => {
                            metrics.sync_current(&new_cursor);
                            if self.refresh_head().await {
                                metrics.sync_head(self.head);
                            }
                            cursor = new_cursor;
                        }
                        StatusMessage::SetStartingCursor(new_starting_cursor) => {
                            metrics.sync_start(&new_starting_cursor);
                            starting_cursor = new_starting_cursor;
                        }
                    }
                }

                msg = self.request_rx.recv() => {
                    let Some(msg) = msg else {
                        return Err(SinkError::status("client request channel closed"));
                    };
                    match msg {
                        RequestMessage::GetCursor(tx) => {
                            self.refresh_head().await;
                            metrics.sync_head(self.head);

                            let cursors = Cursors {
                                starting: starting_cursor.clone(),
                                current: cursor.clone(),
                                head: self.head,
                            };

                            // The requester may have gone away. Not an error.
                            let _ = tx.send(cursors);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Refresh the chain head if it's stale. Returns true if it was refreshed.
    ///
    /// Errors are logged and the previous head is kept.
    async fn refresh_head(&mut self) -> bool {
        let Some(chain_head) = &self.chain_head else {
            return false;
        };

        if let Some(refreshed_at) = self.head_refreshed_at {
            if refreshed_at.elapsed() < HEAD_REFRESH_INTERVAL {
                return false;
            }
        }

        self.head_refreshed_at = Some(Instant::now());
        match chain_head.block_number().await {
            Ok(head) => {
                self.head = Some(head);
                true
            }
            Err(err) => {
                warn!(err = ?err, "failed to refresh chain head");
                false
            }
        }
    }
}

impl StatusServiceClient {
    /// Request the current cursors from the status service.
    pub async fn get_cursors(&self) -> Result<Cursors, SinkError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(RequestMessage::GetCursor(tx))
            .await
            .status("failed to send get cursor request")?;
        let cursors = rx.await.status("failed to receive cursor response")?;
        Ok(cursors)
    }
}

struct SinkMetrics {
    sync_start: Gauge<u64>,
    sync_current: Gauge<u64>,
    sync_head: Gauge<u64>,
}

impl Default for SinkMetrics {
    fn default() -> Self {
        let meter = geo_observability::meter("sink");
        let sync_start = meter
            .u64_gauge("sync_start")
            .with_description("Starting block number")
            .build();

        let sync_current = meter
            .u64_gauge("sync_current")
            .with_description("Current (most recently indexed) block number")
            .build();

        let sync_head = meter
            .u64_gauge("sync_head")
            .with_description("Chain head block number")
            .build();

        SinkMetrics {
            sync_start,
            sync_current,
            sync_head,
        }
    }
}

impl SinkMetrics {
    pub fn sync_start(&self, cursor: &Option<Cursor>) {
        if let Some(cursor) = cursor {
            self.sync_start.record(cursor.block_number, &[]);
        }
    }

    pub fn sync_current(&self, cursor: &Option<Cursor>) {
        if let Some(cursor) = cursor {
            self.sync_current.record(cursor.block_number, &[]);
        }
    }

    pub fn sync_head(&self, head: Option<u64>) {
        if let Some(head) = head {
            self.sync_head.record(head, &[]);
        }
    }
}

//! Read-only status server.
//!
//! Serves the indexer progress (`/_meta` and `/indexing-statuses`) and a liveness probe
//! (`/status`).
mod client;
mod head;
mod service;

use std::{convert::Infallible, net::SocketAddr};

use error_stack::Result;
use futures::Future;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use warp::{Filter, Rejection, Reply};

use crate::{cursor::Cursor, SinkError, SinkErrorReportExt, SinkErrorResultExt};

pub use self::client::{StatusMessage, StatusServerClient, StatusServerClientError};
pub use self::head::{ChainHeadClient, ChainHeadError};
pub use self::service::{Cursors, StatusService, StatusServiceClient};

#[derive(Clone)]
pub struct StatusServer {
    address: SocketAddr,
    chain_head: Option<ChainHeadClient>,
}

impl StatusServer {
    pub fn new(address: SocketAddr, chain_head: Option<ChainHeadClient>) -> Self {
        StatusServer {
            address,
            chain_head,
        }
    }

    /// Starts the status server.
    ///
    /// Returns the client used to publish the connector progress and the future that runs the
    /// server until `ct` is cancelled.
    pub fn start(
        self,
        ct: CancellationToken,
    ) -> Result<(StatusServerClient, impl Future<Output = Result<(), SinkError>>), SinkError> {
        let (status_service, status_client, status_service_client) =
            StatusService::new(self.chain_head);

        let (address, server_fut) = warp::serve(routes(status_service_client))
            .try_bind_with_graceful_shutdown(self.address, {
                let ct = ct.clone();
                async move { ct.cancelled().await }
            })
            .status("failed to bind status server")?;

        info!(address = %address, "status server listening");

        let fut = async move {
            let status_service_fut = status_service.start(ct);

            tokio::select! {
                _ = server_fut => {
                    Ok(())
                }
                status_ret = status_service_fut => {
                    status_ret.map_err(|err| err.status("status service stopped"))
                }
            }
        };

        Ok((status_client, fut))
    }
}

#[derive(Debug, Serialize)]
pub struct MetaResponse {
    pub block: Option<MetaBlock>,
}

#[derive(Debug, Serialize)]
pub struct MetaBlock {
    pub hash: String,
    pub number: u64,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct IndexingStatusesResponse {
    pub chains: Vec<ChainIndexingStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIndexingStatus {
    pub chain_head_block: Option<BlockNumber>,
    pub earliest_block: Option<BlockNumber>,
    pub latest_block: Option<BlockNumber>,
}

/// Block numbers are serialized as strings, like big integers in graphql.
#[derive(Debug, Serialize)]
pub struct BlockNumber {
    pub number: String,
}

#[derive(Debug)]
struct StatusUnavailable;
impl warp::reject::Reject for StatusUnavailable {}

impl From<&Cursor> for MetaBlock {
    fn from(cursor: &Cursor) -> Self {
        MetaBlock {
            hash: cursor.block_hash.clone(),
            number: cursor.block_number,
            timestamp: cursor.block_timestamp,
        }
    }
}

impl From<u64> for BlockNumber {
    fn from(number: u64) -> Self {
        BlockNumber {
            number: number.to_string(),
        }
    }
}

impl From<Cursors> for IndexingStatusesResponse {
    fn from(cursors: Cursors) -> Self {
        let chain = ChainIndexingStatus {
            chain_head_block: cursors.head.map(BlockNumber::from),
            earliest_block: cursors
                .starting
                .as_ref()
                .map(|cursor| BlockNumber::from(cursor.block_number)),
            latest_block: cursors
                .current
                .as_ref()
                .map(|cursor| BlockNumber::from(cursor.block_number)),
        };

        IndexingStatusesResponse {
            chains: vec![chain],
        }
    }
}

fn routes(
    client: StatusServiceClient,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let status = warp::path!("status").and(warp::get()).map(|| "OK");

    let meta = warp::path!("_meta")
        .and(warp::get())
        .and(with_client(client.clone()))
        .and_then(get_meta);

    let indexing_statuses = warp::path!("indexing-statuses")
        .and(warp::get())
        .and(with_client(client))
        .and_then(get_indexing_statuses);

    status.or(meta).or(indexing_statuses)
}

fn with_client(
    client: StatusServiceClient,
) -> impl Filter<Extract = (StatusServiceClient,), Error = Infallible> + Clone {
    warp::any().map(move || client.clone())
}

async fn get_meta(client: StatusServiceClient) -> std::result::Result<impl Reply, Rejection> {
    let cursors = client
        .get_cursors()
        .await
        .map_err(|_| warp::reject::custom(StatusUnavailable))?;

    let response = MetaResponse {
        block: cursors.current.as_ref().map(MetaBlock::from),
    };

    Ok(warp::reply::json(&response))
}

async fn get_indexing_statuses(
    client: StatusServiceClient,
) -> std::result::Result<impl Reply, Rejection> {
    let cursors = client
        .get_cursors()
        .await
        .map_err(|_| warp::reject::custom(StatusUnavailable))?;

    Ok(warp::reply::json(&IndexingStatusesResponse::from(cursors)))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    use super::{routes, StatusService};
    use crate::cursor::Cursor;

    #[tokio::test]
    async fn test_status_route() {
        let (_service, _status_client, service_client) = StatusService::new(None);
        let response = warp::test::request()
            .path("/status")
            .reply(&routes(service_client))
            .await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.body().as_ref(), b"OK");
    }

    #[tokio::test]
    async fn test_meta_and_indexing_statuses() {
        let ct = CancellationToken::new();
        let (service, status_client, service_client) = StatusService::new(None);
        let handle = tokio::spawn(service.start(ct.clone()));
        let routes = routes(service_client);

        let response = warp::test::request().path("/_meta").reply(&routes).await;
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body, json!({ "block": null }));

        status_client
            .set_starting_cursor(Some(Cursor::genesis(900, "")))
            .await
            .unwrap();
        status_client
            .update_cursor(Some(Cursor {
                block_number: 1000,
                block_hash: "0x1000".to_string(),
                block_timestamp: Some(1_700_000_000),
                cursor: "c1000".to_string(),
            }))
            .await
            .unwrap();

        let response = warp::test::request().path("/_meta").reply(&routes).await;
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(
            body,
            json!({
                "block": { "hash": "0x1000", "number": 1000, "timestamp": 1_700_000_000 }
            })
        );

        let response = warp::test::request()
            .path("/indexing-statuses")
            .reply(&routes)
            .await;
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(
            body,
            json!({
                "chains": [{
                    "chainHeadBlock": null,
                    "earliestBlock": { "number": "900" },
                    "latestBlock": { "number": "1000" },
                }]
            })
        );

        ct.cancel();
        handle.await.unwrap().unwrap();
    }
}

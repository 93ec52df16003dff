//! Chain head from the chain's json-rpc endpoint.

use std::{fmt, time::Duration};

use error_stack::{Result, ResultExt};
use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub struct ChainHeadError;
impl error_stack::Context for ChainHeadError {}

impl fmt::Display for ChainHeadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to fetch chain head")
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    id: u64,
    method: &'a str,
    params: [(); 0],
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<String>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Client for `eth_blockNumber`.
#[derive(Clone)]
pub struct ChainHeadClient {
    url: String,
    client: reqwest::Client,
}

impl ChainHeadClient {
    pub fn new(url: impl Into<String>) -> Result<Self, ChainHeadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .change_context(ChainHeadError)
            .attach_printable("failed to build http client")?;

        Ok(ChainHeadClient {
            url: url.into(),
            client,
        })
    }

    /// Returns the number of the most recent block.
    pub async fn block_number(&self) -> Result<u64, ChainHeadError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_blockNumber",
            params: [],
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .change_context(ChainHeadError)
            .attach_printable("failed to send eth_blockNumber request")?
            .error_for_status()
            .change_context(ChainHeadError)
            .attach_printable("eth_blockNumber request failed")?
            .json::<JsonRpcResponse>()
            .await
            .change_context(ChainHeadError)
            .attach_printable("failed to parse eth_blockNumber response")?;

        if let Some(error) = response.error {
            return Err(ChainHeadError)
                .attach_printable("rpc returned an error")
                .attach_printable_lazy(|| format!("code: {}, message: {}", error.code, error.message));
        }

        let Some(result) = response.result else {
            return Err(ChainHeadError).attach_printable("missing result in rpc response");
        };

        parse_quantity(&result)
    }
}

fn parse_quantity(value: &str) -> Result<u64, ChainHeadError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or(ChainHeadError)
        .attach_printable_lazy(|| format!("quantity must be 0x-prefixed: {value}"))?;

    u64::from_str_radix(digits, 16)
        .change_context(ChainHeadError)
        .attach_printable_lazy(|| format!("invalid quantity: {value}"))
}

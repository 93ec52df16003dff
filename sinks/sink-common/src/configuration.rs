use std::{
    fmt, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use bytesize::ByteSize;
use clap::Args;
use error_stack::{Result, ResultExt};
use exponential_backoff::Backoff;
use geo_protocol::{
    client::{MetadataKey, MetadataValue},
    substreams::v1::Package,
};
use prost::Message;
use tonic::{metadata::MetadataMap, transport::Uri};

use crate::{
    connector::StreamConfiguration,
    status::{ChainHeadClient, StatusServer},
};

/// Options for the substreams stream.
#[derive(Args, Debug, Clone)]
pub struct StreamOptions {
    /// Substreams endpoint url. If starting with `https://`, use a secure connection.
    #[arg(long, env)]
    pub substreams_endpoint: String,
    /// Api token used to authenticate with the substreams endpoint.
    #[arg(long, env)]
    pub substreams_api_token: String,
    /// Name of the map module to stream.
    #[arg(long, env, default_value = "geo_out")]
    pub substreams_module: String,
    /// Path to the substreams package (`.spkg`) that contains the module.
    #[arg(long, env, default_value = "geo-substream.spkg")]
    pub substreams_package: PathBuf,
    /// Block to start from when no cursor is stored.
    #[arg(long, env)]
    pub start_block: Option<u64>,
    /// Hash of the starting block.
    #[arg(long, env)]
    pub start_block_hash: Option<String>,
    /// Stop streaming data after the specified block.
    ///
    /// If not specified, the stream will continue indefinitely.
    #[arg(long, env)]
    pub ending_block: Option<u64>,
    /// Maximum timeout (in seconds) between stream messages. Defaults to 300s.
    #[arg(long, env, default_value_t = 300)]
    pub timeout_duration_seconds: u64,
    /// Limits the maximum size of a decoded message. Accept message size in human readable form,
    /// e.g. 1kb, 1MB, 1GB. If not set the default is 100MB.
    #[arg(long, env)]
    pub max_message_size: Option<String>,
    /// Add metadata to the stream, in the `key: value` format. Can be specified multiple times.
    #[arg(long, short = 'M', env, value_delimiter = ',')]
    pub metadata: Option<Vec<String>>,
}

/// Status server options.
#[derive(Args, Debug, Clone)]
pub struct StatusServerOptions {
    /// Address to bind the status server to.
    #[arg(long, env, default_value = "0.0.0.0:8118")]
    pub status_server_address: String,
    /// Chain json-rpc url, used to fetch the chain head.
    #[arg(long, env)]
    pub chain_rpc_url: String,
}

/// Retry options for sink operations that fail as a whole.
#[derive(Args, Debug, Clone)]
pub struct BackoffOptions {
    /// Number of times a block is retried before giving up.
    #[arg(long, env, default_value_t = 10)]
    pub sink_max_retries: u32,
    /// Delay before the first retry, in seconds.
    #[arg(long, env, default_value_t = 3)]
    pub sink_min_delay_seconds: u64,
    /// Maximum delay between retries, in seconds.
    #[arg(long, env, default_value_t = 60)]
    pub sink_max_delay_seconds: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectorOptions {
    #[command(flatten)]
    pub stream: StreamOptions,
    #[command(flatten)]
    pub status_server: StatusServerOptions,
    #[command(flatten)]
    pub backoff: BackoffOptions,
}

#[derive(Debug)]
pub struct StreamOptionsError;
impl error_stack::Context for StreamOptionsError {}

impl fmt::Display for StreamOptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid stream options")
    }
}

#[derive(Debug)]
pub struct StatusServerOptionsError;
impl error_stack::Context for StatusServerOptionsError {}

impl fmt::Display for StatusServerOptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid status server options")
    }
}

#[derive(Debug)]
pub struct InvalidByteSizeError(String);
impl error_stack::Context for InvalidByteSizeError {}

impl fmt::Display for InvalidByteSizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid byte size: {}", self.0)
    }
}

impl StreamOptions {
    pub fn to_stream_configuration(self) -> Result<StreamConfiguration, StreamOptionsError> {
        let stream_url = self
            .substreams_endpoint
            .parse::<Uri>()
            .change_context(StreamOptionsError)
            .attach_printable_lazy(|| format!("invalid stream url: {}", self.substreams_endpoint))?;

        let max_message_size_bytes: ByteSize = self
            .max_message_size
            .as_ref()
            .map(|s| ByteSize::from_str(s))
            .transpose()
            .map_err(InvalidByteSizeError)
            .change_context(StreamOptionsError)?
            .unwrap_or(ByteSize::mb(100));

        let timeout_duration = Duration::from_secs(self.timeout_duration_seconds);

        let metadata = parse_metadata(self.metadata.unwrap_or_default())?;
        let modules = load_package_modules(&self.substreams_package)?;

        Ok(StreamConfiguration {
            stream_url,
            max_message_size_bytes,
            metadata,
            bearer_token: Some(self.substreams_api_token),
            timeout_duration,
            output_module: self.substreams_module,
            modules,
            starting_block: self.start_block.unwrap_or_default(),
            starting_block_hash: self.start_block_hash.unwrap_or_default(),
            ending_block: self.ending_block,
        })
    }
}

fn parse_metadata(entries: Vec<String>) -> Result<MetadataMap, StreamOptionsError> {
    let mut metadata = MetadataMap::new();
    for entry in entries {
        match entry.split_once(':') {
            None => {
                return Err(StreamOptionsError)
                    .attach_printable("metadata must be in the `key: value` format")
                    .attach_printable_lazy(|| format!("got: {entry}"))
            }
            Some((key, value)) => {
                let key = key
                    .trim()
                    .parse::<MetadataKey>()
                    .change_context(StreamOptionsError)
                    .attach_printable_lazy(|| format!("invalid metadata key: {key}"))?;
                let value = value
                    .trim()
                    .parse::<MetadataValue>()
                    .change_context(StreamOptionsError)
                    .attach_printable_lazy(|| format!("invalid metadata value: {value}"))?;
                metadata.insert(key, value);
            }
        }
    }
    Ok(metadata)
}

/// Reads the encoded modules graph from a substreams package.
fn load_package_modules(path: &Path) -> Result<Vec<u8>, StreamOptionsError> {
    let content = fs::read(path)
        .change_context(StreamOptionsError)
        .attach_printable_lazy(|| format!("failed to read substreams package {:?}", path))?;

    let package = Package::decode(content.as_slice())
        .change_context(StreamOptionsError)
        .attach_printable_lazy(|| format!("invalid substreams package {:?}", path))?;

    if package.modules.is_empty() {
        return Err(StreamOptionsError)
            .attach_printable_lazy(|| format!("substreams package {:?} has no modules", path));
    }

    Ok(package.modules)
}

impl StatusServerOptions {
    pub fn to_status_server(self) -> Result<StatusServer, StatusServerOptionsError> {
        let address = self
            .status_server_address
            .parse::<SocketAddr>()
            .change_context(StatusServerOptionsError)
            .attach_printable_lazy(|| {
                format!("invalid status server address: {}", self.status_server_address)
            })?;

        let chain_head = ChainHeadClient::new(self.chain_rpc_url)
            .change_context(StatusServerOptionsError)?;

        Ok(StatusServer::new(address, Some(chain_head)))
    }
}

impl BackoffOptions {
    pub fn to_backoff(&self) -> Backoff {
        let min_delay = Duration::from_secs(self.sink_min_delay_seconds);
        let max_delay = Duration::from_secs(self.sink_max_delay_seconds);
        let mut backoff = Backoff::new(self.sink_max_retries, min_delay, Some(max_delay));
        backoff.set_factor(3);
        backoff
    }
}

impl Default for BackoffOptions {
    fn default() -> Self {
        BackoffOptions {
            sink_max_retries: 10,
            sink_min_delay_seconds: 3,
            sink_max_delay_seconds: 60,
        }
    }
}

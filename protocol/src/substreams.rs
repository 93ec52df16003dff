//! Substreams block stream types.

pub mod v1 {
    /// Block clock: hash, number and timestamp.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Clock {
        #[prost(string, tag = "1")]
        pub id: ::prost::alloc::string::String,
        #[prost(uint64, tag = "2")]
        pub number: u64,
        #[prost(message, optional, tag = "3")]
        pub timestamp: ::core::option::Option<::prost_types::Timestamp>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BlockRef {
        #[prost(string, tag = "1")]
        pub id: ::prost::alloc::string::String,
        #[prost(uint64, tag = "2")]
        pub number: u64,
    }

    /// A substreams package (`.spkg`).
    ///
    /// Only the fields used by the sink are decoded. `modules` is kept as its encoded bytes
    /// since it's forwarded untouched in the stream request.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Package {
        #[prost(uint64, tag = "5")]
        pub version: u64,
        #[prost(bytes = "vec", tag = "6")]
        pub modules: ::prost::alloc::vec::Vec<u8>,
    }
}

pub mod rpc {
    pub mod v2 {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Request {
            #[prost(int64, tag = "1")]
            pub start_block_num: i64,
            #[prost(string, tag = "2")]
            pub start_cursor: ::prost::alloc::string::String,
            #[prost(uint64, tag = "3")]
            pub stop_block_num: u64,
            /// With final_blocks_only, you only receive blocks that are irreversible.
            #[prost(bool, tag = "4")]
            pub final_blocks_only: bool,
            #[prost(bool, tag = "5")]
            pub production_mode: bool,
            #[prost(string, tag = "6")]
            pub output_module: ::prost::alloc::string::String,
            /// Encoded `sf.substreams.v1.Modules`, as found in [super::super::v1::Package].
            #[prost(bytes = "vec", tag = "7")]
            pub modules: ::prost::alloc::vec::Vec<u8>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Response {
            #[prost(oneof = "response::Message", tags = "1, 2, 3, 4, 5")]
            pub message: ::core::option::Option<response::Message>,
        }

        pub mod response {
            #[derive(Clone, PartialEq, ::prost::Oneof)]
            pub enum Message {
                /// Always sent first.
                #[prost(message, tag = "1")]
                Session(super::SessionInit),
                /// Progress of data preparation, before sending in the stream of `data` events.
                #[prost(message, tag = "2")]
                Progress(super::ModulesProgress),
                #[prost(message, tag = "3")]
                BlockScopedData(super::BlockScopedData),
                #[prost(message, tag = "4")]
                BlockUndoSignal(super::BlockUndoSignal),
                #[prost(message, tag = "5")]
                FatalError(super::Error),
            }
        }

        /// Sent when the chain reorganized: every block after `last_valid_block` must be
        /// rolled back.
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct BlockUndoSignal {
            #[prost(message, optional, tag = "1")]
            pub last_valid_block: ::core::option::Option<super::super::v1::BlockRef>,
            #[prost(string, tag = "2")]
            pub last_valid_cursor: ::prost::alloc::string::String,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct BlockScopedData {
            #[prost(message, optional, tag = "1")]
            pub output: ::core::option::Option<MapModuleOutput>,
            #[prost(message, optional, tag = "2")]
            pub clock: ::core::option::Option<super::super::v1::Clock>,
            #[prost(string, tag = "3")]
            pub cursor: ::prost::alloc::string::String,
            /// Non-deterministic, allows substreams-sink to let go of their undo data.
            #[prost(uint64, tag = "4")]
            pub final_block_height: u64,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct SessionInit {
            #[prost(string, tag = "1")]
            pub trace_id: ::prost::alloc::string::String,
            #[prost(uint64, tag = "2")]
            pub resolved_start_block: u64,
            #[prost(uint64, tag = "3")]
            pub linear_handoff_block: u64,
            #[prost(uint64, tag = "4")]
            pub max_parallel_workers: u64,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct MapModuleOutput {
            #[prost(string, tag = "1")]
            pub name: ::prost::alloc::string::String,
            #[prost(message, optional, tag = "2")]
            pub map_output: ::core::option::Option<::prost_types::Any>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct ModulesProgress {
            #[prost(message, repeated, tag = "2")]
            pub running_jobs: ::prost::alloc::vec::Vec<Job>,
            #[prost(message, repeated, tag = "4")]
            pub stages: ::prost::alloc::vec::Vec<Stage>,
            #[prost(message, optional, tag = "5")]
            pub processed_bytes: ::core::option::Option<ProcessedBytes>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct ProcessedBytes {
            #[prost(uint64, tag = "1")]
            pub total_bytes_read: u64,
            #[prost(uint64, tag = "2")]
            pub total_bytes_written: u64,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Error {
            #[prost(string, tag = "1")]
            pub module: ::prost::alloc::string::String,
            #[prost(string, tag = "2")]
            pub reason: ::prost::alloc::string::String,
            #[prost(string, repeated, tag = "3")]
            pub logs: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
            #[prost(bool, tag = "4")]
            pub logs_truncated: bool,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Job {
            #[prost(uint32, tag = "1")]
            pub stage: u32,
            #[prost(uint64, tag = "2")]
            pub start_block: u64,
            #[prost(uint64, tag = "3")]
            pub stop_block: u64,
            #[prost(uint64, tag = "4")]
            pub processed_blocks: u64,
            #[prost(uint64, tag = "5")]
            pub duration_ms: u64,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Stage {
            #[prost(string, repeated, tag = "1")]
            pub modules: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
            #[prost(message, repeated, tag = "2")]
            pub completed_ranges: ::prost::alloc::vec::Vec<BlockRange>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct BlockRange {
            #[prost(uint64, tag = "2")]
            pub start_block: u64,
            #[prost(uint64, tag = "3")]
            pub end_block: u64,
        }

        /// Generated client implementations.
        pub mod stream_client {
            #![allow(
                unused_variables,
                dead_code,
                missing_docs,
                clippy::wildcard_imports,
                clippy::let_unit_value
            )]
            use tonic::codegen::http::Uri;
            use tonic::codegen::*;

            #[derive(Debug, Clone)]
            pub struct StreamClient<T> {
                inner: tonic::client::Grpc<T>,
            }

            impl StreamClient<tonic::transport::Channel> {
                /// Attempt to create a new client by connecting to a given endpoint.
                pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
                where
                    D: TryInto<tonic::transport::Endpoint>,
                    D::Error: Into<StdError>,
                {
                    let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
                    Ok(Self::new(conn))
                }
            }

            impl<T> StreamClient<T>
            where
                T: tonic::client::GrpcService<tonic::body::BoxBody>,
                T::Error: Into<StdError>,
                T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
                <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
            {
                pub fn new(inner: T) -> Self {
                    let inner = tonic::client::Grpc::new(inner);
                    Self { inner }
                }

                pub fn with_origin(inner: T, origin: Uri) -> Self {
                    let inner = tonic::client::Grpc::with_origin(inner, origin);
                    Self { inner }
                }

                pub fn with_interceptor<F>(
                    inner: T,
                    interceptor: F,
                ) -> StreamClient<InterceptedService<T, F>>
                where
                    F: tonic::service::Interceptor,
                    T::ResponseBody: Default,
                    T: tonic::codegen::Service<
                        http::Request<tonic::body::BoxBody>,
                        Response = http::Response<
                            <T as tonic::client::GrpcService<tonic::body::BoxBody>>::ResponseBody,
                        >,
                    >,
                    <T as tonic::codegen::Service<http::Request<tonic::body::BoxBody>>>::Error:
                        Into<StdError> + std::marker::Send + std::marker::Sync,
                {
                    StreamClient::new(InterceptedService::new(inner, interceptor))
                }

                /// Limits the maximum size of a decoded message.
                ///
                /// Default: `4MB`
                #[must_use]
                pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                    self.inner = self.inner.max_decoding_message_size(limit);
                    self
                }

                pub async fn blocks(
                    &mut self,
                    request: impl tonic::IntoRequest<super::Request>,
                ) -> std::result::Result<
                    tonic::Response<tonic::codec::Streaming<super::Response>>,
                    tonic::Status,
                > {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                    })?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/sf.substreams.rpc.v2.Stream/Blocks",
                    );
                    let mut req = request.into_request();
                    req.extensions_mut()
                        .insert(GrpcMethod::new("sf.substreams.rpc.v2.Stream", "Blocks"));
                    self.inner.server_streaming(req, path, codec).await
                }
            }
        }
    }
}

use std::{fmt, pin::Pin, task::Poll, time::Duration};

use pin_project::pin_project;
use tokio_stream::{Stream, StreamExt, Timeout};
use tonic::{service::interceptor::InterceptedService, transport::Channel, IntoRequest, Streaming};

use crate::substreams::rpc::v2::{
    response, stream_client::StreamClient as SubstreamsClient, Request, Response,
};

use super::MetadataInterceptor;

pub type StreamMessage = response::Message;

#[derive(Debug)]
pub enum DataStreamError {
    Timeout,
    Tonic(tonic::Status),
}

#[derive(Debug)]
#[pin_project]
pub struct DataStream {
    #[pin]
    inner: Pin<Box<Timeout<Streaming<Response>>>>,
}

/// Substreams client with a per-message timeout.
#[derive(Clone)]
pub struct StreamClient {
    inner: SubstreamsClient<InterceptedService<Channel, MetadataInterceptor>>,
    timeout: Duration,
}

impl StreamClient {
    pub(crate) fn new(
        inner: SubstreamsClient<InterceptedService<Channel, MetadataInterceptor>>,
        timeout: Duration,
    ) -> Self {
        Self { inner, timeout }
    }

    /// Start streaming blocks.
    ///
    /// The returned stream fails with [DataStreamError::Timeout] if no message is received
    /// within the configured timeout.
    pub async fn blocks(
        &mut self,
        request: impl IntoRequest<Request>,
    ) -> Result<DataStream, tonic::Status> {
        let response = self.inner.blocks(request).await?;
        let inner = response.into_inner().timeout(self.timeout);
        Ok(DataStream {
            inner: Box::pin(inner),
        })
    }
}

impl Stream for DataStream {
    type Item = Result<StreamMessage, DataStreamError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Ready(Some(response_or_timeout)) => match response_or_timeout {
                Err(_elapsed) => Poll::Ready(Some(Err(DataStreamError::Timeout))),
                Ok(Err(tonic_error)) => Poll::Ready(Some(Err(DataStreamError::Tonic(tonic_error)))),
                Ok(Ok(response)) => {
                    if let Some(message) = response.message {
                        Poll::Ready(Some(Ok(message)))
                    } else {
                        let error = tonic::Status::data_loss("missing message in response");
                        Poll::Ready(Some(Err(DataStreamError::Tonic(error))))
                    }
                }
            },
        }
    }
}

impl error_stack::Context for DataStreamError {}

impl fmt::Display for DataStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataStreamError::Timeout => write!(f, "substreams stream timeout"),
            DataStreamError::Tonic(status) => write!(
                f,
                "substreams stream error: {} - {}",
                status.code(),
                status.message()
            ),
        }
    }
}

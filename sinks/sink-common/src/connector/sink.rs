use error_stack::{Result, ResultExt};
use exponential_backoff::Backoff;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    cursor::Cursor,
    error::SinkError,
    sink::{Context, Sink},
    CursorAction, SinkErrorReportExt,
};

/// Retries sink operations that fail as a whole.
///
/// A block is either handled completely or the connector stops without advancing the cursor.
pub struct SinkWithBackoff<S: Sink + Send + Sync> {
    inner: S,
    backoff: Backoff,
}

/// Outcome of a retried operation.
#[derive(Debug, PartialEq)]
pub enum Handled {
    Done(CursorAction),
    /// Cancelled while waiting to retry. Nothing must be persisted.
    Cancelled,
}

impl<S: Sink + Send + Sync> SinkWithBackoff<S> {
    pub fn new(inner: S, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }

    pub async fn handle_data(
        &mut self,
        ctx: &Context,
        block: &S::Block,
        ct: CancellationToken,
    ) -> Result<Handled, SinkError> {
        for duration in &self.backoff {
            match self.inner.handle_data(ctx, block).await {
                Ok(action) => return Ok(Handled::Done(action)),
                Err(err) => {
                    warn!(err = ?err, block = %ctx.cursor, "failed to handle data");
                    if ct.is_cancelled() {
                        return Ok(Handled::Cancelled);
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(duration) => {},
                        _ = ct.cancelled() => {
                            return Ok(Handled::Cancelled);
                        }
                    };
                }
            }
        }

        Err(SinkError::Fatal)
            .attach_printable("handle data failed after retry")
            .attach_printable_lazy(|| format!("block: {}", ctx.cursor))
    }

    pub async fn handle_invalidate(
        &mut self,
        cursor: &Cursor,
        ct: CancellationToken,
    ) -> Result<Handled, SinkError> {
        for duration in &self.backoff {
            match self.inner.handle_invalidate(cursor).await {
                Ok(action) => return Ok(Handled::Done(action)),
                Err(err) => {
                    warn!(err = ?err, cursor = %cursor, "failed to handle invalidate");
                    if ct.is_cancelled() {
                        return Ok(Handled::Cancelled);
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(duration) => {},
                        _ = ct.cancelled() => {
                            return Ok(Handled::Cancelled);
                        }
                    };
                }
            }
        }

        Err(SinkError::Fatal)
            .attach_printable("handle invalidate failed after retry")
            .attach_printable_lazy(|| format!("cursor: {}", cursor))
    }

    pub async fn cleanup(&mut self) -> Result<(), SinkError> {
        self.inner
            .cleanup()
            .await
            .map_err(|err| err.temporary("failed to cleanup sink"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{fmt, time::Duration};

    use async_trait::async_trait;
    use error_stack::{report, Result};
    use exponential_backoff::Backoff;
    use geo_protocol::geo::GeoOutput;
    use tokio_util::sync::CancellationToken;

    use super::{Handled, SinkWithBackoff};
    use crate::{
        cursor::Cursor,
        error::SinkError,
        sink::{Context, CursorAction, Sink},
    };

    #[derive(Debug)]
    struct FlakyError;
    impl error_stack::Context for FlakyError {}

    impl fmt::Display for FlakyError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("flaky sink error")
        }
    }

    /// Fails the first `failures` calls.
    struct FlakySink {
        failures: usize,
        calls: usize,
    }

    #[async_trait]
    impl Sink for FlakySink {
        type Options = usize;
        type Error = FlakyError;
        type Block = GeoOutput;

        async fn from_options(failures: usize) -> Result<Self, Self::Error> {
            Ok(FlakySink { failures, calls: 0 })
        }

        async fn handle_data(
            &mut self,
            _ctx: &Context,
            _block: &GeoOutput,
        ) -> Result<CursorAction, Self::Error> {
            self.calls += 1;
            if self.calls <= self.failures {
                return Err(report!(FlakyError));
            }
            Ok(CursorAction::Persist)
        }

        async fn handle_invalidate(&mut self, _cursor: &Cursor) -> Result<CursorAction, Self::Error> {
            Ok(CursorAction::Skip)
        }
    }

    fn context() -> Context {
        Context {
            cursor: Cursor::genesis(1000, "0x1000"),
            final_block_height: 990,
            request_id: "test".to_string(),
        }
    }

    fn fast_backoff(retries: u32) -> Backoff {
        Backoff::new(
            retries,
            Duration::from_millis(1),
            Some(Duration::from_millis(5)),
        )
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let sink = FlakySink::from_options(2).await.unwrap();
        let mut sink = SinkWithBackoff::new(sink, fast_backoff(5));

        let handled = sink
            .handle_data(&context(), &GeoOutput::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(handled, Handled::Done(CursorAction::Persist));
        assert_eq!(sink.inner.calls, 3);
    }

    #[tokio::test]
    async fn test_give_up_after_retries() {
        let sink = FlakySink::from_options(100).await.unwrap();
        let mut sink = SinkWithBackoff::new(sink, fast_backoff(3));

        let err = sink
            .handle_data(&context(), &GeoOutput::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SinkError>(),
            Some(SinkError::Fatal)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_while_retrying() {
        let sink = FlakySink::from_options(100).await.unwrap();
        let mut sink = SinkWithBackoff::new(sink, fast_backoff(3));

        let ct = CancellationToken::new();
        ct.cancel();
        let handled = sink
            .handle_data(&context(), &GeoOutput::default(), ct)
            .await
            .unwrap();
        assert_eq!(handled, Handled::Cancelled);
    }
}

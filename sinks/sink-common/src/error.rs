use std::{fmt, process::ExitCode};

use error_stack::{report, Context, Report, Result, ResultExt};

/// Sink error.
///
/// Sinks should default to returning `SinkError::Temporary` for errors.
/// `SinkError::Configuration` is for invalid options or missing environment variables.
/// `SinkError::Fatal` should only be returned when retrying the same block cannot succeed.
#[derive(Debug)]
pub enum SinkError {
    /// Configuration error. Should not retry.
    Configuration,
    /// Temporary error. Should retry.
    Temporary,
    /// Fatal error. Should not retry.
    Fatal,
    /// Status server error.
    Status,
    /// Persistence error.
    Persistence,
}

pub trait ReportExt {
    fn to_exit_code(&self) -> ExitCode;
}

impl error_stack::Context for SinkError {}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Configuration => f.write_str("sink configuration error"),
            SinkError::Temporary => f.write_str("temporary sink error"),
            SinkError::Fatal => f.write_str("fatal sink error"),
            SinkError::Status => f.write_str("sink status server error"),
            SinkError::Persistence => f.write_str("sink persistence error"),
        }
    }
}

impl<T> ReportExt for Result<T, SinkError> {
    fn to_exit_code(&self) -> ExitCode {
        match self {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{:?}", err);
                exit_code_for(err)
            }
        }
    }
}

// Exit codes based on sysexits.h
fn exit_code_for(err: &Report<SinkError>) -> ExitCode {
    match err.downcast_ref::<SinkError>() {
        Some(SinkError::Configuration) => ExitCode::from(78),
        Some(SinkError::Temporary) => ExitCode::from(75),
        Some(_) => ExitCode::FAILURE,
        None => ExitCode::FAILURE,
    }
}

impl SinkError {
    pub fn configuration(reason: &str) -> Report<SinkError> {
        report!(SinkError::Configuration).attach_printable(reason.to_string())
    }

    pub fn temporary(reason: &str) -> Report<SinkError> {
        report!(SinkError::Temporary).attach_printable(reason.to_string())
    }

    pub fn fatal(reason: &str) -> Report<SinkError> {
        report!(SinkError::Fatal).attach_printable(reason.to_string())
    }

    pub fn status(reason: &str) -> Report<SinkError> {
        report!(SinkError::Status)
            .attach_printable(format!("status server operation failed: {reason}"))
    }

    pub fn persistence(reason: &str) -> Report<SinkError> {
        report!(SinkError::Persistence)
            .attach_printable(format!("persistence client operation failed: {reason}"))
    }
}

pub trait SinkErrorResultExt {
    type Ok;
    fn configuration(self, reason: &str) -> Result<Self::Ok, SinkError>;
    fn temporary(self, reason: &str) -> Result<Self::Ok, SinkError>;
    fn fatal(self, reason: &str) -> Result<Self::Ok, SinkError>;
    fn status(self, reason: &str) -> Result<Self::Ok, SinkError>;
    fn persistence_client_error(self, reason: &str) -> Result<Self::Ok, SinkError>;
}

impl<T, C> SinkErrorResultExt for core::result::Result<T, C>
where
    C: Context,
{
    type Ok = T;

    fn configuration(self, reason: &str) -> Result<T, SinkError> {
        self.change_context(SinkError::Configuration)
            .attach_printable(reason.to_string())
    }

    fn temporary(self, reason: &str) -> Result<T, SinkError> {
        self.change_context(SinkError::Temporary)
            .attach_printable(reason.to_string())
    }

    fn fatal(self, reason: &str) -> Result<T, SinkError> {
        self.change_context(SinkError::Fatal)
            .attach_printable(reason.to_string())
    }

    fn status(self, reason: &str) -> Result<T, SinkError> {
        self.change_context(SinkError::Status)
            .attach_printable(format!("status server operation failed: {reason}"))
    }

    fn persistence_client_error(self, reason: &str) -> Result<T, SinkError> {
        self.change_context(SinkError::Persistence)
            .attach_printable(format!("persistence client operation failed: {reason}"))
    }
}

/// Same as [SinkErrorResultExt], but for reports that already went through `error_stack`.
pub trait SinkErrorReportExt {
    fn configuration(self, reason: &str) -> Report<SinkError>;
    fn temporary(self, reason: &str) -> Report<SinkError>;
    fn fatal(self, reason: &str) -> Report<SinkError>;
    fn status(self, reason: &str) -> Report<SinkError>;
    fn persistence_client_error(self, reason: &str) -> Report<SinkError>;
}

impl<C> SinkErrorReportExt for Report<C> {
    fn configuration(self, reason: &str) -> Report<SinkError> {
        self.change_context(SinkError::Configuration)
            .attach_printable(reason.to_string())
    }

    fn temporary(self, reason: &str) -> Report<SinkError> {
        self.change_context(SinkError::Temporary)
            .attach_printable(reason.to_string())
    }

    fn fatal(self, reason: &str) -> Report<SinkError> {
        self.change_context(SinkError::Fatal)
            .attach_printable(reason.to_string())
    }

    fn status(self, reason: &str) -> Report<SinkError> {
        self.change_context(SinkError::Status)
            .attach_printable(format!("status server operation failed: {reason}"))
    }

    fn persistence_client_error(self, reason: &str) -> Report<SinkError> {
        self.change_context(SinkError::Persistence)
            .attach_printable(format!("persistence client operation failed: {reason}"))
    }
}

#[cfg(test)]
mod tests {
    use std::process::ExitCode;

    use error_stack::Result;

    use super::{ReportExt, SinkError, SinkErrorReportExt};

    #[derive(Debug)]
    struct InnerError;
    impl error_stack::Context for InnerError {}

    impl std::fmt::Display for InnerError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("inner error")
        }
    }

    #[test]
    fn test_exit_code_follows_error_kind() {
        let configuration: Result<(), SinkError> = Err(SinkError::configuration("missing url"));
        assert_eq!(configuration.to_exit_code(), ExitCode::from(78));

        let temporary: Result<(), SinkError> = Err(SinkError::temporary("stream closed"));
        assert_eq!(temporary.to_exit_code(), ExitCode::from(75));

        let fatal: Result<(), SinkError> = Err(SinkError::fatal("bad block"));
        assert_eq!(fatal.to_exit_code(), ExitCode::FAILURE);

        let ok: Result<(), SinkError> = Ok(());
        assert_eq!(ok.to_exit_code(), ExitCode::SUCCESS);
    }

    #[test]
    fn test_report_changes_context() {
        let report = error_stack::report!(InnerError).temporary("while testing");
        assert!(matches!(
            report.downcast_ref::<SinkError>(),
            Some(SinkError::Temporary)
        ));
    }
}

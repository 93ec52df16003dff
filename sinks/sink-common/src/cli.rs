use std::borrow::Cow;

use error_stack::{report, Result, ResultExt};
use geo_observability::{init_opentelemetry, TelemetryOptions};
use tokio_util::sync::CancellationToken;

use crate::{SinkError, SinkErrorReportExt};

/// Initialize opentelemetry and the sigint (ctrl-c) handler.
pub fn initialize_sink(
    package_name: impl Into<Cow<'static, str>>,
    package_version: impl Into<Cow<'static, str>>,
    telemetry: TelemetryOptions,
    ct: CancellationToken,
) -> Result<(), SinkError> {
    init_opentelemetry(package_name, package_version, telemetry)
        .map_err(|err| err.configuration("failed to initialize opentelemetry"))?;

    set_ctrlc_handler(ct).map_err(|err| report!(err).fatal("failed to setup ctrl-c handler"))?;

    Ok(())
}

/// Connect the cancellation token to the ctrl-c handler.
pub fn set_ctrlc_handler(ct: CancellationToken) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler({
        move || {
            ct.cancel();
        }
    })
    .attach_printable("failed to register ctrl-c handler")?;

    Ok(())
}

/// Load environment variables from a `.env` file, if any.
pub fn load_dotenv() {
    // a missing file is fine, variables can come from the environment.
    let _ = dotenvy::dotenv();
}

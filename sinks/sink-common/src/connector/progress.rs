use geo_protocol::substreams::rpc::v2::{ModulesProgress, SessionInit};
use tracing::{debug, info};

pub fn log_session(session: &SessionInit) {
    info!(
        trace_id = %session.trace_id,
        resolved_start_block = session.resolved_start_block,
        linear_handoff_block = session.linear_handoff_block,
        max_parallel_workers = session.max_parallel_workers,
        "substreams session started"
    );
}

pub fn log_progress(progress: &ModulesProgress) {
    let processed_blocks: u64 = progress
        .running_jobs
        .iter()
        .map(|job| job.processed_blocks)
        .sum();

    let (bytes_read, bytes_written) = progress
        .processed_bytes
        .as_ref()
        .map(|bytes| (bytes.total_bytes_read, bytes.total_bytes_written))
        .unwrap_or_default();

    debug!(
        running_jobs = progress.running_jobs.len(),
        stages = progress.stages.len(),
        processed_blocks,
        bytes_read,
        bytes_written,
        "substreams progress"
    );
}

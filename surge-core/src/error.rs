pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`workers` must be a positive integer")]
    InvalidWorkers,

    #[error("`requests_per_worker` must be a positive integer")]
    InvalidRequestsPerWorker,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("`count` must be a positive integer")]
    InvalidCount,

    #[error("`levels` must be a non-empty, strictly increasing list of positive integers")]
    InvalidLevels,

    #[error("`min_success_rate` must be within 0.0..=1.0 (got {0})")]
    InvalidSuccessRate(f64),

    #[error("failed to encode payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("escalation controller already finished ({0})")]
    ControllerFinished(crate::StopReason),
}

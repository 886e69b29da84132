/// The Task Manager's error taxonomy. \
/// Every per-task failure surfaces as one of these and is handled locally by the caller;
/// none of them unwind through the scheduler or interrupt other in-flight operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request was malformed: an empty command, an unknown task id passed where an error
    /// (rather than a boolean/nil result) is appropriate, or a submission that would exceed
    /// `max_queue_len`.
    #[error("Bad request: {}", .0)]
    BadRequest(String),

    /// The task could not be started.
    /// The submission itself already succeeded, so this is only ever logged, never
    /// returned synchronously to the caller that triggered admission.
    #[error("Failed to spawn task {}: {}", .0, .1)]
    SpawnFailed(usize, String),

    /// Signal delivery targeted a task whose child has already been reaped.
    #[error("Task {} is no longer running", .0)]
    ProcessGone(usize),

    #[error("Couldn't write task log file: {}", .0)]
    LogWrite(String),

    #[error("Io Error: {}", .0)]
    IoError(#[from] std::io::Error),
}

/// Classification for retry policy.
///
/// Used by the scheduler to decide what happens to a job whose fetch failed.
///
/// # Behavior Summary
///
/// | Class | Consumes an attempt? | Job outcome |
/// |-------|---------------------|-------------|
/// | `Retry` | Yes | Back to pending after the retry delay, failed once attempts are exhausted |
/// | `Defer` | No | Back to pending after the deferral delay |
/// | `Never` | Yes | Failed immediately |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient failure: network, timeout, unexpected payload or upstream throttling.
    Retry,

    /// The request never left the process because the local limiter refused it.
    ///
    /// The job did not really run, so the attempt is handed back.
    Defer,

    /// Terminal failure reported by the provider (unknown symbol, bad API key).
    /// Retrying the same request will not help.
    Never,
}

/// Calculation configuration name used when none is given
pub const DEFAULT_CALCULATION_CONFIGURATION: &str = "default";
/// Nested pump depth before further pumps go through the run queue
pub const DEFAULT_MAX_CALLBACK_DEPTH: usize = 16;
/// Upper bound on the backoff between checks while waiting for background jobs
pub const DEFAULT_WAIT_INTERVAL_MS: u64 = 100;
/// How long a synchronously added target may take to resolve
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Ctrl-C arrived before the run finished; partial results were reported.
    Interrupted = 2,

    /// The target degraded below the configured thresholds.
    Degraded = 10,

    /// The target never became healthy (spawn failure, early exit, readiness timeout).
    StartupFailed = 20,

    /// Invalid CLI/config/options (bad flags, invalid durations, empty level lists, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (crashed run body, every worker unit crashed, IO errors).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_degraded(degraded: bool) -> Self {
        if degraded {
            Self::Degraded
        } else {
            Self::Success
        }
    }
}

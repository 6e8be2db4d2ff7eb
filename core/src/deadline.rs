use std::time::{Duration, Instant};

/// Absolute point in time until which a wait may block.
///
/// Relative timeouts are converted once at the API boundary so that
/// retries and nested waits never extend the total blocking time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Deadline {
    /// Wait until this instant.
    At(Instant),

    /// Wait forever.
    Never,
}

impl Deadline {
    /// Deadline that has already expired. Waits with it only poll.
    pub fn now() -> Self {
        Deadline::At(Instant::now())
    }

    /// Deadline `duration` from now.
    /// Saturates to `Never` if the instant is not representable.
    pub fn after(duration: Duration) -> Self {
        Instant::now()
            .checked_add(duration)
            .map_or(Deadline::Never, Deadline::At)
    }

    /// Convert timeout in nanoseconds.
    /// `u64::max_value()` and any value that overflows the clock mean infinite wait.
    pub fn from_timeout_ns(timeout_ns: u64) -> Self {
        if timeout_ns == u64::max_value() {
            Deadline::Never
        } else {
            Self::after(Duration::from_nanos(timeout_ns))
        }
    }

    /// Check if deadline is reached.
    pub fn is_expired(&self) -> bool {
        match *self {
            Deadline::At(instant) => Instant::now() >= instant,
            Deadline::Never => false,
        }
    }

    /// Time left until deadline.
    /// `None` for infinite deadline.
    pub fn remaining(&self) -> Option<Duration> {
        match *self {
            Deadline::At(instant) => Some(instant.saturating_duration_since(Instant::now())),
            Deadline::Never => None,
        }
    }

    /// Get the instant, if any.
    pub fn instant(&self) -> Option<Instant> {
        match *self {
            Deadline::At(instant) => Some(instant),
            Deadline::Never => None,
        }
    }
}

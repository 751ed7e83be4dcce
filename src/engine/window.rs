// Fixed-width time windows. Timestamps and widths are nanoseconds since the Unix epoch.

use thiserror::Error;

use super::EngineError;

pub const NANOS_PER_SEC: i64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("window width must be > 0")]
    Zero,
    #[error("window width {0}ns does not fit in a signed 64-bit timestamp")]
    TooLarge(u64),
}

/// Width of one aggregation window. Always > 0, so bucketing never divides by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowWidth(i64);

impl WindowWidth {
    pub fn from_nanos(nanos: u64) -> Result<Self, WindowError> {
        if nanos == 0 {
            return Err(WindowError::Zero);
        }
        let nanos = i64::try_from(nanos).map_err(|_| WindowError::TooLarge(nanos))?;
        Ok(Self(nanos))
    }

    pub fn from_secs(secs: u64) -> Result<Self, WindowError> {
        let nanos = secs
            .checked_mul(NANOS_PER_SEC as u64)
            .ok_or(WindowError::TooLarge(u64::MAX))?;
        Self::from_nanos(nanos)
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }
}

/// Start of the window containing `timestamp_ns`: `floor(t / W) * W`.
///
/// Integer division only. Timestamps before the epoch are outside the supported
/// domain and are rejected rather than rounded toward zero into the wrong window.
pub fn window_start(timestamp_ns: i64, width: WindowWidth) -> Result<i64, EngineError> {
    if timestamp_ns < 0 {
        return Err(EngineError::NegativeTimestamp(timestamp_ns));
    }
    let w = width.as_nanos();
    Ok((timestamp_ns / w) * w)
}

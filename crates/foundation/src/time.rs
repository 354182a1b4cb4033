use serde::{Deserialize, Serialize};

/// Wall-clock time in seconds since the Unix epoch.
///
/// Mesh reports carry epoch-second timestamps, so the whole engine shares this
/// timebase rather than a monotonic clock.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Time(pub f64);

impl Time {
    pub fn now() -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Time(secs)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    /// Seconds elapsed from `earlier` to `self`, never negative.
    ///
    /// Reports stamped slightly in the future (clock skew between radios)
    /// read as age zero.
    pub fn since(self, earlier: Time) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    pub fn offset(self, secs: f64) -> Time {
        Time(self.0 + secs)
    }
}

use foundation::time::Time;

/// Smallest step the frame clock will report, in seconds.
///
/// Two ticks landing on the same clock reading would otherwise integrate a
/// zero step and stall the pan physics for a frame.
pub const MIN_FRAME_DT_S: f64 = 1e-3;

/// Per-tick metadata for the consumer loop.
///
/// The loop is paced by a fixed tick rate but integrates over the measured
/// wall-clock delta, so `dt_s` varies slightly from frame to frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Seconds since the previous frame.
    pub dt_s: f64,
    /// Wall-clock time at the start of the frame.
    pub time: Time,
}

impl Frame {
    pub fn new(index: u64, dt_s: f64, time: Time) -> Self {
        Self { index, dt_s, time }
    }

    /// The first frame, assuming a nominal step of `nominal_dt_s`.
    pub fn first(time: Time, nominal_dt_s: f64) -> Self {
        Self::new(0, nominal_dt_s.max(MIN_FRAME_DT_S), time)
    }

    /// Advances to the frame starting at `now`.
    pub fn advance(self, now: Time) -> Self {
        Self::new(
            self.index + 1,
            (now.0 - self.time.0).max(MIN_FRAME_DT_S),
            now,
        )
    }
}

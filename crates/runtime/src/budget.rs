/// Per-frame work allowance.
///
/// The consumer loop hands one of these to every draining step so that a
/// burst from a producer cannot push a frame past its deadline. Units are
/// abstract; ingest spends one unit per queued record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameBudget {
    initial_units: u32,
    remaining_units: u32,
}

impl FrameBudget {
    pub fn new(units: u32) -> Self {
        Self {
            initial_units: units,
            remaining_units: units,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(u32::MAX)
    }

    pub fn remaining_units(&self) -> u32 {
        self.remaining_units
    }

    pub fn spent_units(&self) -> u32 {
        self.initial_units - self.remaining_units
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_units == 0
    }

    /// Attempts to consume `units` from the budget.
    ///
    /// Returns `true` if the budget had enough remaining units; on `false` the
    /// budget is left untouched.
    pub fn try_consume(&mut self, units: u32) -> bool {
        if self.remaining_units < units {
            return false;
        }
        self.remaining_units -= units;
        true
    }
}

/// Backoff bookkeeping for the CSMA/CA retry loop.
///
/// `K` is not reset between attempts within one send job's retry loop;
/// it only resets when a new send job begins. Each failed attempt
/// increments `K` and selects a slot count `R` uniformly from
/// `{0 .. 2^K - 1}`; the sender sleeps `R * TIME_SLOT` before retrying.
use rand::Rng;

use crate::errors::{Result, SimError};

/// Tracks the retry counter for a single send job across attempts.
#[derive(Debug, Clone, Copy)]
pub struct BackoffState {
    k: u32,
}

impl BackoffState {
    /// A fresh backoff state for a new send job; `K` starts at 0.
    pub fn new() -> Self {
        Self { k: 0 }
    }

    /// The current retry counter.
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Choose this attempt's slot count `R = uniform{0 .. 2^K - 1}`.
    /// `K == 0` always yields `R == 0` (there is no window to choose
    /// from yet).
    pub fn choose_slot(&self) -> u32 {
        if self.k == 0 {
            return 0;
        }
        let window = 1u32 << self.k.min(31);
        rand::thread_rng().gen_range(0..window)
    }

    /// Record a failed attempt (timeout, bad CRC, or unexpected
    /// frame). Returns `MaxRetriesExceeded` once `K` reaches `K_MAX`;
    /// the send job must end without retry in that case rather than
    /// doubling its backoff window forever.
    pub fn record_failure(&mut self) -> Result<()> {
        self.k += 1;
        if self.k >= crate::K_MAX {
            return Err(SimError::MaxRetriesExceeded);
        }
        Ok(())
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

/// `period * uniform[0,1)` jitter applied before a repeating send
/// job's first attempt and before each subsequent re-arm, so that
/// repeating senders sharing the same period desynchronize instead of
/// perpetually colliding on the medium in lockstep.
pub fn period_jitter(period: std::time::Duration) -> std::time::Duration {
    let frac: f64 = rand::thread_rng().gen_range(0.0..1.0);
    period.mul_f64(frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_increments_monotonically_until_max() {
        let mut state = BackoffState::new();
        assert_eq!(state.k(), 0);
        for expected in 1..crate::K_MAX {
            state.record_failure().unwrap();
            assert_eq!(state.k(), expected);
        }
        // the 32nd failure (K reaching K_MAX) reports exhaustion
        assert!(matches!(state.record_failure(), Err(SimError::MaxRetriesExceeded)));
    }

    #[test]
    fn slot_choice_is_bounded_by_window() {
        let mut state = BackoffState::new();
        for _ in 0..5 {
            state.record_failure().unwrap();
            let window = 1u32 << state.k();
            for _ in 0..100 {
                assert!(state.choose_slot() < window);
            }
        }
    }

    #[test]
    fn zero_k_has_no_slot_window() {
        let state = BackoffState::new();
        assert_eq!(state.choose_slot(), 0);
    }

    #[test]
    fn period_jitter_never_exceeds_period() {
        let period = std::time::Duration::from_secs(1);
        for _ in 0..50 {
            let jitter = period_jitter(period);
            assert!(jitter <= period);
        }
    }
}

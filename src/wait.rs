//! Busy-poll policy for hardware status flags.
//!
//! The clock switch and the FIM dispatcher both block on a hardware status
//! bit (PLL lock, coprocessor completion). The ROM drivers spin on these
//! bits forever; [`WaitPolicy::unbounded`] preserves that behavior and is
//! the default. [`WaitPolicy::bounded`] is the opt-in hardened variant: it
//! gives up after a fixed number of polls so a hung peripheral surfaces as
//! an error instead of a livelock.

/// The poll bound expired before the condition became true.
///
/// Only a [`WaitPolicy::bounded`] policy can produce this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollExpired;

/// Busy-poll policy: how long to spin on a hardware status flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    max_polls: Option<u32>,
}

impl WaitPolicy {
    /// Spin until the condition holds, without limit.
    pub const fn unbounded() -> Self {
        Self { max_polls: None }
    }

    /// Spin for at most `max_polls` evaluations of the condition.
    pub const fn bounded(max_polls: u32) -> Self {
        Self {
            max_polls: Some(max_polls),
        }
    }

    /// Poll `cond` until it returns `true`.
    ///
    /// An unbounded policy never returns `Err`; it spins until the hardware
    /// delivers.
    pub fn wait_until(&self, mut cond: impl FnMut() -> bool) -> Result<(), PollExpired> {
        match self.max_polls {
            None => {
                while !cond() {}
                Ok(())
            }
            Some(max) => {
                for _ in 0..max {
                    if cond() {
                        return Ok(());
                    }
                }
                Err(PollExpired)
            }
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_policy_expires() {
        let policy = WaitPolicy::bounded(10);
        assert_eq!(policy.wait_until(|| false), Err(PollExpired));
    }

    #[test]
    fn bounded_policy_observes_late_condition() {
        let policy = WaitPolicy::bounded(10);
        let mut polls = 0;
        let result = policy.wait_until(|| {
            polls += 1;
            polls == 4
        });
        assert_eq!(result, Ok(()));
        assert_eq!(polls, 4);
    }

    #[test]
    fn unbounded_policy_spins_until_ready() {
        let policy = WaitPolicy::unbounded();
        let mut polls = 0u32;
        let result = policy.wait_until(|| {
            polls += 1;
            polls == 1000
        });
        assert_eq!(result, Ok(()));
    }
}

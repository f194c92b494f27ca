//! Account lockout policy.
//!
//! A pure state transition over the stored failure counter and lock
//! expiry. The policy never touches storage itself; the session manager
//! persists whatever transition comes back before returning to the
//! caller.
//!
//! The counter update is read-modify-write and deliberately best-effort:
//! two concurrent failed attempts can both observe the same base count and
//! write the same incremented value, under-counting by one. Last write
//! wins. Exact-once counting would need a conditional update keyed on the
//! previously read value, which this core does not require.

use chrono::{DateTime, Duration, Utc};

/// Failed attempts tolerated before the account locks.
pub const MAX_FAILED_ATTEMPTS: i32 = 5;

/// How long a lock lasts, in minutes.
pub const LOCKOUT_DURATION_MINUTES: i64 = 15;

/// The decision for one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockoutOutcome {
    /// The account is locked; nothing may be written. Carries the whole
    /// minutes until the lock expires, rounded up, for messaging.
    Locked {
        /// Remaining lock time in whole minutes, at least 1.
        remaining_minutes: i64,
    },
    /// Wrong password below the lock threshold. Persist the counter,
    /// clear the expiry.
    BadCredentials {
        /// New value for the stored failure counter.
        failed_attempts: i32,
    },
    /// Wrong password reaching the threshold: this attempt acquires the
    /// lock. The locked notification fires exactly on this transition,
    /// never on later `Locked` rejections.
    NowLocked {
        /// New value for the stored failure counter.
        failed_attempts: i32,
        /// When the freshly acquired lock expires.
        locked_until: DateTime<Utc>,
    },
    /// Correct password. Persist the reset counters `(0, None)` even when
    /// a partial failure streak existed.
    Accepted,
}

/// Lockout policy configuration.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    max_failed_attempts: i32,
    lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: MAX_FAILED_ATTEMPTS,
            lockout_duration: Duration::minutes(LOCKOUT_DURATION_MINUTES),
        }
    }
}

impl LockoutPolicy {
    /// Create the default policy (5 attempts, 15 minute lock).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy with custom thresholds.
    #[must_use]
    pub fn with_limits(max_failed_attempts: i32, lockout_duration: Duration) -> Self {
        Self {
            max_failed_attempts,
            lockout_duration,
        }
    }

    /// Whole minutes until a lock expires, rounded up. `None` when the
    /// account is not locked at `now`.
    ///
    /// Callers use this to skip the password check entirely while locked,
    /// which also keeps locked rejections cheap.
    #[must_use]
    pub fn remaining_lock_minutes(
        &self,
        now: DateTime<Utc>,
        locked_until: Option<DateTime<Utc>>,
    ) -> Option<i64> {
        let until = locked_until.filter(|until| *until > now)?;
        let millis = (until - now).num_milliseconds();
        Some((millis + 59_999) / 60_000)
    }

    /// Decide the transition for one attempt.
    ///
    /// Rules, in order:
    /// 1. still locked: reject without touching counters;
    /// 2. an expired lock resets the base count to zero;
    /// 3. a failure increments; reaching the threshold acquires the lock;
    /// 4. a success resets to `(0, None)` regardless of the base count.
    #[must_use]
    pub fn assess(
        &self,
        now: DateTime<Utc>,
        failed_attempts: i32,
        locked_until: Option<DateTime<Utc>>,
        password_ok: bool,
    ) -> LockoutOutcome {
        if let Some(remaining_minutes) = self.remaining_lock_minutes(now, locked_until) {
            return LockoutOutcome::Locked { remaining_minutes };
        }

        if password_ok {
            return LockoutOutcome::Accepted;
        }

        let base_attempts = if locked_until.is_some() {
            // The lock has expired; the old streak does not carry over.
            0
        } else {
            failed_attempts
        };

        let new_attempts = base_attempts + 1;
        if new_attempts >= self.max_failed_attempts {
            LockoutOutcome::NowLocked {
                failed_attempts: new_attempts,
                locked_until: now + self.lockout_duration,
            }
        } else {
            LockoutOutcome::BadCredentials {
                failed_attempts: new_attempts,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new()
    }

    #[test]
    fn failure_below_threshold_increments() {
        let now = Utc::now();
        let outcome = policy().assess(now, 0, None, false);
        assert_eq!(outcome, LockoutOutcome::BadCredentials { failed_attempts: 1 });

        let outcome = policy().assess(now, 3, None, false);
        assert_eq!(outcome, LockoutOutcome::BadCredentials { failed_attempts: 4 });
    }

    #[test]
    fn fifth_failure_acquires_lock() {
        let now = Utc::now();
        match policy().assess(now, 4, None, false) {
            LockoutOutcome::NowLocked {
                failed_attempts,
                locked_until,
            } => {
                assert_eq!(failed_attempts, 5);
                assert_eq!(locked_until, now + Duration::minutes(15));
            }
            other => panic!("expected NowLocked, got {other:?}"),
        }
    }

    #[test]
    fn locked_rejects_even_correct_password() {
        let now = Utc::now();
        let until = now + Duration::minutes(10);
        let outcome = policy().assess(now, 5, Some(until), true);
        assert!(matches!(outcome, LockoutOutcome::Locked { .. }));
    }

    #[test]
    fn remaining_minutes_round_up() {
        let now = Utc::now();
        let until = now + Duration::seconds(61);
        let outcome = policy().assess(now, 5, Some(until), false);
        assert_eq!(
            outcome,
            LockoutOutcome::Locked {
                remaining_minutes: 2
            }
        );
    }

    #[test]
    fn expired_lock_resets_base_count() {
        let now = Utc::now();
        let expired = now - Duration::seconds(1);
        // Five stored failures, but the lock has passed: one fresh failure
        // starts a new streak at 1 instead of locking again.
        let outcome = policy().assess(now, 5, Some(expired), false);
        assert_eq!(outcome, LockoutOutcome::BadCredentials { failed_attempts: 1 });
    }

    #[test]
    fn expired_lock_allows_correct_password() {
        let now = Utc::now();
        let expired = now - Duration::minutes(1);
        let outcome = policy().assess(now, 5, Some(expired), true);
        assert_eq!(outcome, LockoutOutcome::Accepted);
    }

    #[test]
    fn success_resets_partial_streak() {
        let now = Utc::now();
        let outcome = policy().assess(now, 4, None, true);
        assert_eq!(outcome, LockoutOutcome::Accepted);
    }

    #[test]
    fn no_lock_when_not_locked() {
        let now = Utc::now();
        assert_eq!(policy().remaining_lock_minutes(now, None), None);
        assert_eq!(
            policy().remaining_lock_minutes(now, Some(now - Duration::seconds(1))),
            None
        );
    }

    #[test]
    fn custom_limits_apply() {
        let now = Utc::now();
        let policy = LockoutPolicy::with_limits(2, Duration::minutes(1));
        match policy.assess(now, 1, None, false) {
            LockoutOutcome::NowLocked { failed_attempts, .. } => assert_eq!(failed_attempts, 2),
            other => panic!("expected NowLocked, got {other:?}"),
        }
    }
}

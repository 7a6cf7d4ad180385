use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol phase of an item, ordered `Commit < Reveal < Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Commit,
    Reveal,
    Ended,
}

impl Phase {
    /// `now < commit` is Commit, `commit <= now < reveal` is Reveal, anything
    /// later is Ended. Equal deadlines leave no instant in Reveal.
    pub fn classify(
        now: DateTime<Utc>,
        commit_deadline: DateTime<Utc>,
        reveal_deadline: DateTime<Utc>,
    ) -> Phase {
        if now >= reveal_deadline {
            Phase::Ended
        } else if now >= commit_deadline {
            Phase::Reveal
        } else {
            Phase::Commit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Commit => "commit",
            Phase::Reveal => "reveal",
            Phase::Ended => "ended",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_classify_boundaries() {
        let commit = t0() + Duration::hours(1);
        let reveal = t0() + Duration::hours(2);

        assert_eq!(Phase::classify(t0(), commit, reveal), Phase::Commit);
        assert_eq!(
            Phase::classify(commit - Duration::seconds(1), commit, reveal),
            Phase::Commit
        );
        assert_eq!(Phase::classify(commit, commit, reveal), Phase::Reveal);
        assert_eq!(
            Phase::classify(reveal - Duration::seconds(1), commit, reveal),
            Phase::Reveal
        );
        assert_eq!(Phase::classify(reveal, commit, reveal), Phase::Ended);
    }

    #[test]
    fn test_equal_deadlines_skip_reveal() {
        let deadline = t0() + Duration::hours(1);
        assert_eq!(Phase::classify(deadline, deadline, deadline), Phase::Ended);
        assert_eq!(
            Phase::classify(deadline - Duration::milliseconds(1), deadline, deadline),
            Phase::Commit
        );
    }

    #[test]
    fn test_classify_is_monotonic() {
        let commit = t0() + Duration::minutes(60);
        let reveal = t0() + Duration::minutes(120);

        let mut previous = Phase::Commit;
        for minute in -30..200 {
            let phase = Phase::classify(t0() + Duration::minutes(minute), commit, reveal);
            assert!(phase >= previous, "phase went backwards at minute {}", minute);
            previous = phase;
        }
        assert_eq!(previous, Phase::Ended);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(t0());
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), t0() + Duration::minutes(90));
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }
}

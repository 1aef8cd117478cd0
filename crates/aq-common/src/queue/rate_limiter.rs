use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

pub const DEFAULT_DAILY_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub allowed: bool,
    pub remaining: u32,
}

/// Per-candidate daily application cap. The window is the UTC calendar date,
/// so every candidate's budget resets at midnight UTC regardless of their
/// local timezone. Reservations are all-or-nothing: a bulk request larger
/// than the remaining budget admits zero items.
#[derive(Debug, Default)]
pub struct DailyRateLimiter {
    default_limit: u32,
    overrides: HashMap<i64, u32>,
    used: HashMap<(i64, NaiveDate), u32>,
}

impl DailyRateLimiter {
    pub fn new(default_limit: u32) -> Self {
        Self {
            default_limit,
            overrides: HashMap::new(),
            used: HashMap::new(),
        }
    }

    pub fn set_limit(&mut self, candidate_id: i64, limit: u32) {
        self.overrides.insert(candidate_id, limit);
    }

    pub fn limit_for(&self, candidate_id: i64) -> u32 {
        self.overrides
            .get(&candidate_id)
            .copied()
            .unwrap_or(self.default_limit)
    }

    pub fn used_today(&self, candidate_id: i64, now: DateTime<Utc>) -> u32 {
        self.used
            .get(&(candidate_id, now.date_naive()))
            .copied()
            .unwrap_or(0)
    }

    pub fn remaining(&self, candidate_id: i64, now: DateTime<Utc>) -> u32 {
        self.limit_for(candidate_id)
            .saturating_sub(self.used_today(candidate_id, now))
    }

    /// Reserve `requested` slots for today, or none at all. The returned
    /// `remaining` reflects the budget after a successful reservation, and
    /// the untouched budget after a rejection.
    pub fn check_and_reserve(
        &mut self,
        candidate_id: i64,
        requested: u32,
        now: DateTime<Utc>,
    ) -> Reservation {
        let remaining = self.remaining(candidate_id, now);
        if requested > remaining {
            return Reservation {
                allowed: false,
                remaining,
            };
        }

        *self.used.entry((candidate_id, now.date_naive())).or_insert(0) += requested;
        Reservation {
            allowed: true,
            remaining: remaining - requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn reservations_draw_down_the_daily_budget() {
        let mut limiter = DailyRateLimiter::new(10);
        let now = Utc::now();

        let first = limiter.check_and_reserve(1, 4, now);
        assert!(first.allowed);
        assert_eq!(first.remaining, 6);

        let second = limiter.check_and_reserve(1, 6, now);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = limiter.check_and_reserve(1, 1, now);
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
    }

    #[test]
    fn bulk_requests_are_all_or_nothing() {
        let mut limiter = DailyRateLimiter::new(10);
        let now = Utc::now();
        limiter.check_and_reserve(1, 8, now);

        // 3 requested, 2 remaining: nothing is admitted and nothing is spent.
        let rejected = limiter.check_and_reserve(1, 3, now);
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 2);
        assert_eq!(limiter.used_today(1, now), 8);
    }

    #[test]
    fn budget_resets_at_midnight_utc() {
        let mut limiter = DailyRateLimiter::new(10);
        let just_before = Utc.with_ymd_and_hms(2025, 6, 1, 23, 59, 0).unwrap();
        let just_after = just_before + Duration::minutes(2);

        limiter.check_and_reserve(1, 10, just_before);
        assert_eq!(limiter.remaining(1, just_before), 0);
        assert_eq!(limiter.remaining(1, just_after), 10);
    }

    #[test]
    fn per_candidate_overrides_and_isolation() {
        let mut limiter = DailyRateLimiter::new(10);
        limiter.set_limit(2, 3);
        let now = Utc::now();

        assert_eq!(limiter.limit_for(1), 10);
        assert_eq!(limiter.limit_for(2), 3);

        limiter.check_and_reserve(1, 10, now);
        // Candidate 2's budget is untouched by candidate 1's usage.
        assert_eq!(limiter.remaining(2, now), 3);
    }
}

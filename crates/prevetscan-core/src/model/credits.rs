// Credit balance with an optional expiration instant.
//
// The stored balance is owned by the BaaS; these rules only decide how much
// of it is usable at a given moment and how to describe the expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One account's credit balance as reported by the BaaS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CreditBalance {
    pub credits: i64,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Human-facing description of when a balance stops being usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    NoExpiry,
    ExpiresToday,
    ExpiresIn { days: i64 },
    Expired,
}

impl CreditBalance {
    pub fn new(credits: i64, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { credits, expires_at }
    }

    /// Credits usable at `now`. The balance is usable up to and including its
    /// expiration instant and counts as zero strictly after it. Negative
    /// stored values are floored at zero.
    pub fn usable_at(&self, now: DateTime<Utc>) -> i64 {
        match self.expires_at {
            Some(expiry) if now > expiry => 0,
            _ => self.credits.max(0),
        }
    }

    /// Calendar-day view of the expiry.
    ///
    /// Days are counted between UTC dates, so near midnight the result can
    /// differ by one from a count taken in the viewer's local time zone.
    pub fn expiry_status(&self, now: DateTime<Utc>) -> ExpiryStatus {
        let Some(expiry) = self.expires_at else {
            return ExpiryStatus::NoExpiry;
        };
        if now > expiry {
            return ExpiryStatus::Expired;
        }
        let days = (expiry.date_naive() - now.date_naive()).num_days();
        if days == 0 {
            ExpiryStatus::ExpiresToday
        } else {
            ExpiryStatus::ExpiresIn { days }
        }
    }
}

//! Subscription schedule phases.
//!
//! A schedule is a provider-hosted, phase-based recurring billing plan tied
//! to one customer. Each phase is a bounded interval billed once at a fixed
//! price. The engine never stores schedules locally - it reads and rewrites
//! them through the payment provider, keyed by the reference held on the
//! customer record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One bounded interval within a subscription schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePhase {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Provider price reference billed for this phase.
    pub price_id: String,
    /// Skip marker: a 100%-off coupon voids the billing effect of the
    /// phase without removing the slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
}

impl SchedulePhase {
    /// Whether `date` falls inside this phase (start inclusive, end
    /// exclusive, matching the provider's phase semantics).
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date < self.end_date
    }
}

/// External schedule status as reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    NotStarted,
    Active,
    Completed,
    Canceled,
    Released,
}

impl ScheduleStatus {
    /// Terminal schedules are skipped by the synchronizer and dereferenced
    /// from the customer record.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Released)
    }
}

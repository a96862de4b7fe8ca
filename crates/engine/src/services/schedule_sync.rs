//! Subscription schedule synchronization.
//!
//! When an operator edits the global billing calendar, every customer's
//! provider-hosted schedule is rebuilt to follow it. The merge keeps
//! billing history intact: past phases are untouched, the current phase is
//! bridged to the first future date, and future phases are replaced
//! wholesale. Each customer gets exactly one full-list update; per-customer
//! failures are collected into the batch report and never abort the run.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::db::CustomerRepository;
use crate::error::AppError;
use crate::stripe::PaymentGateway;
use terroir_core::{Customer, SchedulePhase, SubscriptionState};

/// The last phase of a rebuilt list runs this long past its start.
const FINAL_PHASE_DAYS: u64 = 90;

/// Outcome of a calendar sync across all subscribed customers.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    /// Schedules rewritten to the new calendar.
    pub synced: usize,
    /// Schedules skipped because the provider reports them terminal
    /// (their customers are dereferenced in passing).
    pub skipped: usize,
    /// Customers whose sync failed; the batch continued regardless.
    pub failures: Vec<SyncFailure>,
}

#[derive(Debug, Serialize)]
pub struct SyncFailure {
    pub customer_id: Uuid,
    pub error: String,
}

/// Merge a schedule's existing phases with the new global billing dates.
///
/// Not-started schedules are replaced outright: one phase per date, each
/// ending at the next date (+90 days for the last). Active schedules keep
/// every phase up to and including the current one verbatim, except that
/// the current phase's end moves to the first date strictly in the future
/// ("bridging"); one phase per future date follows. With no future date
/// the list is returned unchanged.
///
/// Phases starting on a skipped date carry the skip coupon, which voids
/// their billing effect without removing the slot.
#[must_use]
pub fn merge_phases(
    existing: &[SchedulePhase],
    new_dates: &[NaiveDate],
    today: NaiveDate,
    default_price: &str,
    skipped: &BTreeSet<NaiveDate>,
    skip_coupon: Option<&str>,
) -> Vec<SchedulePhase> {
    let coupon_for = |start: NaiveDate| {
        skipped
            .contains(&start)
            .then(|| skip_coupon.map(String::from))
            .flatten()
    };
    let end_after = |start: NaiveDate, next: Option<NaiveDate>| {
        next.unwrap_or(start + Days::new(FINAL_PHASE_DAYS))
    };

    // The most recent phase that has begun, if any
    let current_idx = existing.iter().rposition(|phase| phase.start_date <= today);

    let Some(current_idx) = current_idx else {
        // Nothing has begun: replace the entire phase list
        return new_dates
            .iter()
            .enumerate()
            .map(|(i, &start)| SchedulePhase {
                start_date: start,
                end_date: end_after(start, new_dates.get(i + 1).copied()),
                price_id: default_price.to_string(),
                coupon: coupon_for(start),
            })
            .collect();
    };

    let mut merged: Vec<SchedulePhase> =
        existing.iter().take(current_idx + 1).cloned().collect();
    let carry_price = merged
        .last()
        .map_or_else(|| default_price.to_string(), |phase| phase.price_id.clone());

    let future: Vec<NaiveDate> = new_dates.iter().copied().filter(|&d| d > today).collect();
    let Some(&first_future) = future.first() else {
        // No date lies in the future: leave the current phase untouched
        return merged;
    };

    if let Some(current) = merged.last_mut() {
        current.end_date = first_future;
    }

    for (i, &start) in future.iter().enumerate() {
        merged.push(SchedulePhase {
            start_date: start,
            end_date: end_after(start, future.get(i + 1).copied()),
            price_id: carry_price.clone(),
            coupon: coupon_for(start),
        });
    }

    merged
}

/// Batch synchronizer over the payment gateway and customer repository.
#[derive(Clone)]
pub struct ScheduleSyncService {
    customers: Arc<dyn CustomerRepository>,
    payments: Arc<dyn PaymentGateway>,
    /// Price billed by phases of schedules that have not started yet.
    default_price: String,
    /// Coupon marking skipped phases, when configured.
    skip_coupon: Option<String>,
}

impl ScheduleSyncService {
    #[must_use]
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        payments: Arc<dyn PaymentGateway>,
        default_price: String,
        skip_coupon: Option<String>,
    ) -> Self {
        Self {
            customers,
            payments,
            default_price,
            skip_coupon,
        }
    }

    /// Rewrite every subscribed customer's schedule against the new
    /// calendar. Every customer is attempted; failures land in the report.
    ///
    /// # Errors
    ///
    /// Returns an error only when the customer listing itself fails.
    #[instrument(skip(self, new_dates), fields(dates = new_dates.len()))]
    pub async fn sync_all(
        &self,
        new_dates: &[NaiveDate],
        today: NaiveDate,
    ) -> Result<SyncReport, AppError> {
        let customers = self.customers.list_subscribed().await?;
        let mut report = SyncReport::default();

        for customer in customers {
            let Some(subscription) = customer.subscription.clone() else {
                continue;
            };
            match self
                .sync_one(&customer, &subscription, new_dates, today)
                .await
            {
                Ok(true) => report.synced += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    error!(customer_id = %customer.id, error = %e, "schedule sync failed");
                    report.failures.push(SyncFailure {
                        customer_id: customer.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            synced = report.synced,
            skipped = report.skipped,
            failed = report.failures.len(),
            "schedule sync finished"
        );
        Ok(report)
    }

    /// Sync one customer. `Ok(false)` means the schedule was terminal and
    /// has been dereferenced rather than rewritten.
    async fn sync_one(
        &self,
        customer: &Customer,
        subscription: &SubscriptionState,
        new_dates: &[NaiveDate],
        today: NaiveDate,
    ) -> Result<bool, AppError> {
        let schedule = self
            .payments
            .retrieve_schedule(&subscription.schedule_id)
            .await?;

        if schedule.status.is_terminal() {
            self.customers.set_subscription(customer.id, None).await?;
            return Ok(false);
        }

        let merged = merge_phases(
            &schedule.phases,
            new_dates,
            today,
            &self.default_price,
            &subscription.skipped_dates,
            self.skip_coupon.as_deref(),
        );

        // One complete phase list per customer, never a partial write
        self.payments
            .update_schedule_phases(&subscription.schedule_id, &merged)
            .await?;
        Ok(true)
    }

    /// Skip or unskip one billing date for a customer, re-pushing the
    /// phase list with the skip coupon applied or removed. The phase slot
    /// itself is never compressed or removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown customer and
    /// `AppError::BadRequest` when the customer has no active schedule.
    #[instrument(skip(self))]
    pub async fn set_date_skipped(
        &self,
        customer_id: Uuid,
        date: NaiveDate,
        skipped: bool,
    ) -> Result<(), AppError> {
        let customer = self
            .customers
            .get(customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("customer {customer_id}")))?;

        let mut subscription = customer
            .subscription
            .clone()
            .ok_or_else(|| AppError::BadRequest("customer has no active subscription".to_string()))?;

        if skipped {
            subscription.skipped_dates.insert(date);
        } else {
            subscription.skipped_dates.remove(&date);
        }

        let schedule = self
            .payments
            .retrieve_schedule(&subscription.schedule_id)
            .await?;
        if schedule.status.is_terminal() {
            self.customers.set_subscription(customer_id, None).await?;
            return Err(AppError::BadRequest(
                "subscription schedule is no longer active".to_string(),
            ));
        }

        self.customers
            .set_subscription(customer_id, Some(&subscription))
            .await?;

        let phases: Vec<SchedulePhase> = schedule
            .phases
            .iter()
            .map(|phase| SchedulePhase {
                coupon: subscription
                    .skipped_dates
                    .contains(&phase.start_date)
                    .then(|| self.skip_coupon.clone())
                    .flatten(),
                ..phase.clone()
            })
            .collect();

        self.payments
            .update_schedule_phases(&subscription.schedule_id, &phases)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::db::memory::MemoryCustomerRepository;
    use crate::stripe::{Refund, StripeError, SubscriptionSchedule};
    use terroir_core::ScheduleStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn phase(start: NaiveDate, end: NaiveDate) -> SchedulePhase {
        SchedulePhase {
            start_date: start,
            end_date: end,
            price_id: "price_monthly".to_string(),
            coupon: None,
        }
    }

    const NO_SKIPS: &BTreeSet<NaiveDate> = &BTreeSet::new();

    #[test]
    fn test_active_schedule_bridges_current_phase() {
        // P1 past, P2 current ending 2025-03-01; new calendar
        // [2025-04-01, 2025-07-01]
        let existing = vec![
            phase(date(2025, 1, 1), date(2025, 2, 1)),
            phase(date(2025, 2, 1), date(2025, 3, 1)),
        ];
        let new_dates = vec![date(2025, 4, 1), date(2025, 7, 1)];

        let merged = merge_phases(
            &existing,
            &new_dates,
            date(2025, 2, 15),
            "price_monthly",
            NO_SKIPS,
            None,
        );

        assert_eq!(merged.len(), 4);
        // P1 unchanged
        assert_eq!(merged[0], existing[0]);
        // P2 keeps its start, end bridged to the first future date
        assert_eq!(merged[1].start_date, date(2025, 2, 1));
        assert_eq!(merged[1].end_date, date(2025, 4, 1));
        // P3 and P4 follow the calendar; the last runs +90 days
        assert_eq!(merged[2].start_date, date(2025, 4, 1));
        assert_eq!(merged[2].end_date, date(2025, 7, 1));
        assert_eq!(merged[3].start_date, date(2025, 7, 1));
        assert_eq!(merged[3].end_date, date(2025, 9, 29));
    }

    #[test]
    fn test_not_started_schedule_is_replaced() {
        let existing = vec![phase(date(2025, 6, 1), date(2025, 7, 1))];
        let new_dates = vec![date(2025, 5, 1), date(2025, 8, 1)];

        let merged = merge_phases(
            &existing,
            &new_dates,
            date(2025, 3, 1),
            "price_monthly",
            NO_SKIPS,
            None,
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start_date, date(2025, 5, 1));
        assert_eq!(merged[0].end_date, date(2025, 8, 1));
        assert_eq!(merged[1].start_date, date(2025, 8, 1));
        assert_eq!(merged[1].end_date, date(2025, 8, 1) + Days::new(90));
    }

    #[test]
    fn test_no_future_dates_leaves_current_phase_untouched() {
        let existing = vec![
            phase(date(2025, 1, 1), date(2025, 2, 1)),
            phase(date(2025, 2, 1), date(2025, 3, 1)),
        ];
        // Both dates are already in the past
        let new_dates = vec![date(2025, 1, 15), date(2025, 2, 10)];

        let merged = merge_phases(
            &existing,
            &new_dates,
            date(2025, 2, 15),
            "price_monthly",
            NO_SKIPS,
            None,
        );

        assert_eq!(merged, existing);
    }

    #[test]
    fn test_skipped_dates_carry_the_coupon() {
        let skipped: BTreeSet<NaiveDate> = [date(2025, 7, 1)].into_iter().collect();
        let new_dates = vec![date(2025, 4, 1), date(2025, 7, 1)];

        let merged = merge_phases(
            &[],
            &new_dates,
            date(2025, 3, 1),
            "price_monthly",
            &skipped,
            Some("coupon_skip"),
        );

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].coupon, None);
        assert_eq!(merged[1].coupon.as_deref(), Some("coupon_skip"));
    }

    // =========================================================================
    // Batch synchronizer
    // =========================================================================

    struct FakeSchedules {
        schedules: Mutex<HashMap<String, SubscriptionSchedule>>,
        updates: Mutex<Vec<(String, Vec<SchedulePhase>)>>,
        broken: Vec<String>,
    }

    impl FakeSchedules {
        fn new() -> Self {
            Self {
                schedules: Mutex::new(HashMap::new()),
                updates: Mutex::new(Vec::new()),
                broken: Vec::new(),
            }
        }

        async fn seed(&self, schedule: SubscriptionSchedule) {
            self.schedules
                .lock()
                .await
                .insert(schedule.id.clone(), schedule);
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeSchedules {
        async fn create_refund(&self, _payment_intent_id: &str) -> Result<Refund, StripeError> {
            Err(StripeError::Parse("not used in this test".to_string()))
        }

        async fn retrieve_schedule(
            &self,
            schedule_id: &str,
        ) -> Result<SubscriptionSchedule, StripeError> {
            if self.broken.iter().any(|id| id == schedule_id) {
                return Err(StripeError::Api {
                    status: 500,
                    message: "stripe is down".to_string(),
                });
            }
            self.schedules
                .lock()
                .await
                .get(schedule_id)
                .cloned()
                .ok_or_else(|| StripeError::Api {
                    status: 404,
                    message: "no such schedule".to_string(),
                })
        }

        async fn update_schedule_phases(
            &self,
            schedule_id: &str,
            phases: &[SchedulePhase],
        ) -> Result<SubscriptionSchedule, StripeError> {
            self.updates
                .lock()
                .await
                .push((schedule_id.to_string(), phases.to_vec()));
            let mut schedules = self.schedules.lock().await;
            let schedule = schedules.get_mut(schedule_id).ok_or_else(|| StripeError::Api {
                status: 404,
                message: "no such schedule".to_string(),
            })?;
            schedule.phases = phases.to_vec();
            Ok(schedule.clone())
        }
    }

    fn subscribed_customer(n: u8, schedule_id: &str) -> Customer {
        Customer {
            id: Uuid::from_u128(u128::from(n)),
            email: format!("customer{n}@example.fr"),
            name: None,
            stripe_customer_id: Some(format!("cus_{n}")),
            subscription: Some(SubscriptionState {
                schedule_id: schedule_id.to_string(),
                skipped_dates: BTreeSet::new(),
            }),
            shipping: None,
        }
    }

    fn schedule(id: &str, status: ScheduleStatus) -> SubscriptionSchedule {
        SubscriptionSchedule {
            id: id.to_string(),
            status,
            customer: "cus_x".to_string(),
            phases: vec![phase(date(2025, 2, 1), date(2025, 3, 1))],
        }
    }

    #[tokio::test]
    async fn test_sync_all_attempts_every_customer() {
        let customers = Arc::new(MemoryCustomerRepository::new());
        let payments = Arc::new({
            let mut fake = FakeSchedules::new();
            fake.broken = vec!["sched_broken".to_string()];
            fake
        });

        payments
            .seed(schedule("sched_ok", ScheduleStatus::Active))
            .await;
        payments
            .seed(schedule("sched_done", ScheduleStatus::Completed))
            .await;

        for (n, schedule_id) in [(1, "sched_ok"), (2, "sched_done"), (3, "sched_broken")] {
            customers
                .insert(&subscribed_customer(n, schedule_id))
                .await
                .expect("seed customer");
        }

        let service = ScheduleSyncService::new(
            customers.clone(),
            payments.clone(),
            "price_monthly".to_string(),
            None,
        );

        let report = service
            .sync_all(&[date(2025, 4, 1)], date(2025, 2, 15))
            .await
            .expect("batch runs");

        assert_eq!(report.synced, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].customer_id, Uuid::from_u128(3));

        // The terminal schedule's customer was dereferenced
        let done = customers
            .get(Uuid::from_u128(2))
            .await
            .expect("query")
            .expect("customer");
        assert_eq!(done.subscription, None);

        // Exactly one full-list update went out, for the active schedule
        let updates = payments.updates.lock().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "sched_ok");
        assert_eq!(updates[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_skip_date_marks_the_phase_and_persists_the_set() {
        let customers = Arc::new(MemoryCustomerRepository::new());
        let payments = Arc::new(FakeSchedules::new());

        let mut sched = schedule("sched_1", ScheduleStatus::Active);
        sched.phases = vec![
            phase(date(2025, 4, 1), date(2025, 7, 1)),
            phase(date(2025, 7, 1), date(2025, 9, 29)),
        ];
        payments.seed(sched).await;
        customers
            .insert(&subscribed_customer(1, "sched_1"))
            .await
            .expect("seed customer");

        let service = ScheduleSyncService::new(
            customers.clone(),
            payments.clone(),
            "price_monthly".to_string(),
            Some("coupon_skip".to_string()),
        );

        service
            .set_date_skipped(Uuid::from_u128(1), date(2025, 7, 1), true)
            .await
            .expect("skip applied");

        let updates = payments.updates.lock().await;
        let (_, phases) = updates.last().expect("one update");
        // Slot retained, billing voided via the coupon
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].coupon, None);
        assert_eq!(phases[1].coupon.as_deref(), Some("coupon_skip"));
        drop(updates);

        let customer = customers
            .get(Uuid::from_u128(1))
            .await
            .expect("query")
            .expect("customer");
        assert!(
            customer
                .subscription
                .expect("still subscribed")
                .skipped_dates
                .contains(&date(2025, 7, 1))
        );

        // Unskip restores the phase
        service
            .set_date_skipped(Uuid::from_u128(1), date(2025, 7, 1), false)
            .await
            .expect("unskip applied");
        let updates = payments.updates.lock().await;
        let (_, phases) = updates.last().expect("update recorded");
        assert_eq!(phases[1].coupon, None);
    }
}

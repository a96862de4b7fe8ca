//! Subscription schedule retrieval and rewriting.
//!
//! Stripe represents phase boundaries as unix timestamps; the engine works
//! in calendar dates. Conversion happens at this boundary, midnight UTC.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use terroir_core::SchedulePhase;
use tracing::instrument;

use super::types::{SubscriptionSchedule, WirePhase, WireSchedule};
use super::{PaymentGateway, StripeClient, StripeError};

fn date_to_timestamp(date: chrono::NaiveDate) -> i64 {
    NaiveDateTime::new(date, NaiveTime::MIN).and_utc().timestamp()
}

fn timestamp_to_date(ts: i64) -> Result<chrono::NaiveDate, StripeError> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| StripeError::Parse(format!("timestamp out of range: {ts}")))
}

fn convert_phase(wire: WirePhase) -> Result<SchedulePhase, StripeError> {
    let price_id = wire
        .items
        .into_iter()
        .next()
        .map(|item| item.price)
        .ok_or_else(|| StripeError::Parse("phase without items".to_string()))?;

    Ok(SchedulePhase {
        start_date: timestamp_to_date(wire.start_date)?,
        end_date: timestamp_to_date(wire.end_date)?,
        price_id,
        coupon: wire.coupon,
    })
}

fn convert_schedule(wire: WireSchedule) -> Result<SubscriptionSchedule, StripeError> {
    let phases = wire
        .phases
        .into_iter()
        .map(convert_phase)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SubscriptionSchedule {
        id: wire.id,
        status: wire.status,
        customer: wire.customer,
        phases,
    })
}

/// Form-encoded body replacing a schedule's complete phase list.
fn phases_to_form(phases: &[SchedulePhase]) -> Vec<(String, String)> {
    let mut form = Vec::with_capacity(phases.len() * 4);
    for (i, phase) in phases.iter().enumerate() {
        form.push((
            format!("phases[{i}][start_date]"),
            date_to_timestamp(phase.start_date).to_string(),
        ));
        form.push((
            format!("phases[{i}][end_date]"),
            date_to_timestamp(phase.end_date).to_string(),
        ));
        form.push((
            format!("phases[{i}][items][0][price]"),
            phase.price_id.clone(),
        ));
        if let Some(coupon) = &phase.coupon {
            form.push((format!("phases[{i}][coupon]"), coupon.clone()));
        }
    }
    // Past phases are sent verbatim; Stripe rejects the update otherwise
    form.push((
        "proration_behavior".to_string(),
        "none".to_string(),
    ));
    form
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self))]
    async fn create_refund(&self, payment_intent_id: &str) -> Result<super::Refund, StripeError> {
        Self::create_refund(self, payment_intent_id).await
    }

    #[instrument(skip(self))]
    async fn retrieve_schedule(
        &self,
        schedule_id: &str,
    ) -> Result<SubscriptionSchedule, StripeError> {
        let wire: WireSchedule = self
            .get_json(&format!("/subscription_schedules/{schedule_id}"))
            .await?;
        convert_schedule(wire)
    }

    #[instrument(skip(self, phases), fields(phase_count = phases.len()))]
    async fn update_schedule_phases(
        &self,
        schedule_id: &str,
        phases: &[SchedulePhase],
    ) -> Result<SubscriptionSchedule, StripeError> {
        let wire: WireSchedule = self
            .post_form(
                &format!("/subscription_schedules/{schedule_id}"),
                &phases_to_form(phases),
            )
            .await?;
        convert_schedule(wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_date_timestamp_round_trip() {
        let d = date(2025, 4, 1);
        let ts = date_to_timestamp(d);
        assert_eq!(timestamp_to_date(ts).expect("in range"), d);
    }

    #[test]
    fn test_wire_phase_conversion() {
        let wire: WireSchedule = serde_json::from_value(serde_json::json!({
            "id": "sub_sched_1",
            "status": "active",
            "customer": "cus_123",
            "phases": [
                {
                    "start_date": date_to_timestamp(date(2025, 2, 1)),
                    "end_date": date_to_timestamp(date(2025, 3, 1)),
                    "items": [{"price": "price_monthly"}],
                },
                {
                    "start_date": date_to_timestamp(date(2025, 3, 1)),
                    "end_date": date_to_timestamp(date(2025, 4, 1)),
                    "items": [{"price": "price_monthly"}],
                    "coupon": "coupon_skip",
                },
            ],
        }))
        .expect("deserialize");

        let schedule = convert_schedule(wire).expect("convert");
        assert_eq!(schedule.phases.len(), 2);
        let first = schedule.phases.first().expect("phase");
        assert_eq!(first.start_date, date(2025, 2, 1));
        assert_eq!(first.price_id, "price_monthly");
        assert_eq!(first.coupon, None);
        let second = schedule.phases.get(1).expect("phase");
        assert_eq!(second.coupon.as_deref(), Some("coupon_skip"));
    }

    #[test]
    fn test_phase_without_items_is_rejected() {
        let wire = WirePhase {
            start_date: date_to_timestamp(date(2025, 2, 1)),
            end_date: date_to_timestamp(date(2025, 3, 1)),
            items: vec![],
            coupon: None,
        };
        assert!(matches!(convert_phase(wire), Err(StripeError::Parse(_))));
    }

    #[test]
    fn test_phases_form_encoding() {
        let phases = vec![
            SchedulePhase {
                start_date: date(2025, 4, 1),
                end_date: date(2025, 7, 1),
                price_id: "price_monthly".to_string(),
                coupon: None,
            },
            SchedulePhase {
                start_date: date(2025, 7, 1),
                end_date: date(2025, 9, 29),
                price_id: "price_monthly".to_string(),
                coupon: Some("coupon_skip".to_string()),
            },
        ];

        let form = phases_to_form(&phases);
        assert!(form
            .iter()
            .any(|(k, v)| k == "phases[0][items][0][price]" && v == "price_monthly"));
        assert!(form.iter().any(|(k, _)| k == "phases[1][coupon]"));
        assert!(!form.iter().any(|(k, _)| k == "phases[0][coupon]"));
        assert!(form
            .iter()
            .any(|(k, v)| k == "proration_behavior" && v == "none"));
    }
}

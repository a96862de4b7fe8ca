//! Discount codes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A redeemable discount code.
///
/// `usage_count` never exceeds `max_usage`; the repository increments it
/// with a single conditional UPDATE so concurrent redemptions of the last
/// remaining use cannot both succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub code: String,
    pub kind: DiscountKind,
    /// Percentage (0-100) or a fixed amount, depending on `kind`.
    pub value: Decimal,
    pub usage_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_usage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

impl DiscountKind {
    /// Text form persisted to the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        }
    }
}

impl std::str::FromStr for DiscountKind {
    type Err = super::status::UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(super::status::UnknownStatus(other.to_string())),
        }
    }
}

impl Discount {
    /// Whether the code expired relative to `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Uses left before the cap, if one is set.
    #[must_use]
    pub fn remaining_uses(&self) -> Option<i32> {
        self.max_usage
            .map(|max| (max - self.usage_count).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_uses() {
        let discount = Discount {
            code: "BIENVENUE10".to_string(),
            kind: DiscountKind::Percentage,
            value: Decimal::new(10, 0),
            usage_count: 98,
            max_usage: Some(100),
            expires_at: None,
        };
        assert_eq!(discount.remaining_uses(), Some(2));

        let uncapped = Discount {
            max_usage: None,
            ..discount
        };
        assert_eq!(uncapped.remaining_uses(), None);
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let discount = Discount {
            code: "NOEL".to_string(),
            kind: DiscountKind::Fixed,
            value: Decimal::new(500, 2),
            usage_count: 0,
            max_usage: None,
            expires_at: Some(now - chrono::Duration::hours(1)),
        };
        assert!(discount.is_expired(now));
    }
}

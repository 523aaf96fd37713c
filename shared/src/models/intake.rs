//! Intake ledger: incoming batches of equipment, their details and pricing

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::validation::{validate_amount, validate_quantity};

/// A batch of equipment received from a donor or a purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intake {
    pub id: i64,
    pub intake_type_id: i64,
    pub date: NaiveDate,
    pub in_creation: bool,
    pub donor_name: String,
    pub created_by: Uuid,
    pub received_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Quantity of one device type received in an intake.
///
/// The user enters `subtotal`; `unit_price` is `subtotal / total`. Discounts on
/// the intake lower the unit price, stored in `discounted_unit_price`, and
/// `total_price` is `discounted_unit_price * total`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeDetail {
    pub id: i64,
    pub intake_id: i64,
    pub device_type_id: i64,
    /// Units usable as devices
    pub usable: i32,
    /// Units kept as spare parts
    pub for_parts: i32,
    /// Units sent straight to scrap
    pub scrap: i32,
    pub total: i32,
    pub unit_price: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub discounted_unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub created_by: Uuid,
}

/// Discount applied to a whole intake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeDiscount {
    pub id: i64,
    pub intake_id: i64,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Data for a detail before it is stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIntakeDetail {
    pub device_type_id: i64,
    pub usable: i32,
    pub for_parts: i32,
    pub scrap: i32,
    pub subtotal: Option<Decimal>,
}

/// Largest quantity a single detail column may hold
pub const MAX_DETAIL_QUANTITY: i32 = 100_000;

impl NewIntakeDetail {
    /// Units received in all three columns
    pub fn total(&self) -> DomainResult<i32> {
        self.usable
            .checked_add(self.for_parts)
            .and_then(|sum| sum.checked_add(self.scrap))
            .ok_or_else(|| DomainError::validation("total", "Quantities are too large"))
    }

    /// Checks run before a detail is saved under an intake whose type is `priced`
    pub fn validate(&self, priced: bool) -> DomainResult<()> {
        for (field, value) in [
            ("usable", self.usable),
            ("for_parts", self.for_parts),
            ("scrap", self.scrap),
        ] {
            if value < 0 {
                return Err(DomainError::validation(field, "Quantity cannot be negative"));
            }
            if value > MAX_DETAIL_QUANTITY {
                return Err(DomainError::validation(
                    field,
                    format!("Quantity cannot exceed {}", MAX_DETAIL_QUANTITY),
                ));
            }
        }
        validate_quantity(self.total()? as i64, 1)?;
        match self.subtotal {
            None if priced => Err(DomainError::PricingRequired),
            Some(subtotal) if priced && subtotal.is_zero() => Err(DomainError::PricingRequired),
            Some(subtotal) => validate_amount("subtotal", subtotal, 10),
            None => Ok(()),
        }
    }
}

/// Outcome of a best-effort bulk creation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaterializeReport {
    pub created: u32,
    pub failed: u32,
}

impl MaterializeReport {
    pub fn record(&mut self, ok: bool) {
        if ok {
            self.created += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Totals of an intake
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntakeTotals {
    /// Sum of detail subtotals
    pub subtotal: Decimal,
    /// Subtotal minus discounts
    pub discounted: Decimal,
    /// Sum of detail total prices
    pub total: Decimal,
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Unit price of a detail: subtotal divided by unit count
pub fn unit_price(subtotal: Decimal, total: i32) -> Decimal {
    if total <= 0 {
        return Decimal::ZERO;
    }
    money(subtotal / Decimal::from(total))
}

/// Spread `discount` over the subtotals in proportion to each one.
/// The rounding remainder goes to the last priced entry so shares add up exactly.
pub fn allocate_discount(subtotals: &[Option<Decimal>], discount: Decimal) -> Vec<Decimal> {
    let base: Decimal = subtotals.iter().flatten().sum();
    let mut shares = vec![Decimal::ZERO; subtotals.len()];
    if base.is_zero() || discount.is_zero() {
        return shares;
    }

    let last_priced = subtotals.iter().rposition(|s| s.is_some());
    let mut allocated = Decimal::ZERO;
    for (i, subtotal) in subtotals.iter().enumerate() {
        let Some(subtotal) = subtotal else { continue };
        let share = if Some(i) == last_priced {
            discount - allocated
        } else {
            money(discount * *subtotal / base)
        };
        allocated += share;
        shares[i] = share;
    }
    shares
}

/// Recompute pricing fields of every detail of an intake
pub fn price_details(details: &mut [IntakeDetail], discounts: &[IntakeDiscount]) {
    let discount_total: Decimal = discounts.iter().map(|d| d.amount).sum();
    let subtotals: Vec<Option<Decimal>> = details.iter().map(|d| d.subtotal).collect();
    let shares = allocate_discount(&subtotals, discount_total);

    for (detail, share) in details.iter_mut().zip(shares) {
        match detail.subtotal {
            Some(subtotal) if detail.total > 0 => {
                let discounted = money((subtotal - share) / Decimal::from(detail.total));
                detail.unit_price = Some(unit_price(subtotal, detail.total));
                detail.discounted_unit_price = Some(discounted);
                detail.total_price = Some(discounted * Decimal::from(detail.total));
            }
            _ => {
                detail.unit_price = None;
                detail.discounted_unit_price = None;
                detail.total_price = None;
            }
        }
    }
}

/// Aggregate totals of an intake
pub fn intake_totals(details: &[IntakeDetail], discounts: &[IntakeDiscount]) -> IntakeTotals {
    let subtotal: Decimal = details.iter().filter_map(|d| d.subtotal).sum();
    let discount_total: Decimal = discounts.iter().map(|d| d.amount).sum();
    let total: Decimal = details.iter().filter_map(|d| d.total_price).sum();
    IntakeTotals {
        subtotal,
        discounted: subtotal - discount_total,
        total,
    }
}

/// State of a spare part
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpareState {
    Stored,
    Used,
    Discarded,
}

impl SpareState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpareState::Stored => "stored",
            SpareState::Used => "used",
            SpareState::Discarded => "discarded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "stored" => Some(SpareState::Stored),
            "used" => Some(SpareState::Used),
            "discarded" => Some(SpareState::Discarded),
            _ => None,
        }
    }
}

/// A unit kept for parts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparePart {
    pub id: i64,
    pub intake_id: i64,
    pub device_type_id: i64,
    pub state: SpareState,
    pub description: Option<String>,
    pub available: bool,
    pub pallet_id: Option<i64>,
    pub valid: bool,
    pub price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn detail(total: i32, subtotal: Option<&str>) -> IntakeDetail {
        IntakeDetail {
            id: 1,
            intake_id: 1,
            device_type_id: 1,
            usable: total,
            for_parts: 0,
            scrap: 0,
            total,
            unit_price: None,
            subtotal: subtotal.map(dec),
            discounted_unit_price: None,
            total_price: None,
            created_by: Uuid::nil(),
        }
    }

    #[test]
    fn test_priced_detail_requires_subtotal() {
        let mut new = NewIntakeDetail {
            device_type_id: 1,
            usable: 5,
            for_parts: 0,
            scrap: 0,
            subtotal: None,
        };
        assert_eq!(new.validate(true), Err(DomainError::PricingRequired));
        assert!(new.validate(false).is_ok());

        new.subtotal = Some(dec("500.00"));
        assert!(new.validate(true).is_ok());
    }

    #[test]
    fn test_detail_needs_at_least_one_unit() {
        let new = NewIntakeDetail {
            device_type_id: 1,
            usable: 0,
            for_parts: 0,
            scrap: 0,
            subtotal: None,
        };
        assert!(matches!(new.validate(false), Err(DomainError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_unit_price() {
        assert_eq!(unit_price(dec("100"), 3), dec("33.33"));
        assert_eq!(unit_price(dec("100"), 0), Decimal::ZERO);
    }

    #[test]
    fn test_allocate_discount_adds_up() {
        let shares = allocate_discount(
            &[Some(dec("100")), None, Some(dec("200")), Some(dec("100"))],
            dec("10"),
        );
        assert_eq!(shares[1], Decimal::ZERO);
        assert_eq!(shares.iter().copied().sum::<Decimal>(), dec("10"));
        assert_eq!(shares[0], dec("2.50"));
        assert_eq!(shares[2], dec("5.00"));
    }

    #[test]
    fn test_price_details_with_discount() {
        let mut details = vec![detail(4, Some("400")), detail(2, None)];
        let discounts = vec![IntakeDiscount {
            id: 1,
            intake_id: 1,
            amount: dec("40"),
            description: None,
        }];
        price_details(&mut details, &discounts);

        assert_eq!(details[0].unit_price, Some(dec("100")));
        assert_eq!(details[0].discounted_unit_price, Some(dec("90")));
        assert_eq!(details[0].total_price, Some(dec("360")));
        assert_eq!(details[1].total_price, None);

        let totals = intake_totals(&details, &discounts);
        assert_eq!(totals.subtotal, dec("400"));
        assert_eq!(totals.discounted, dec("360"));
        assert_eq!(totals.total, dec("360"));
    }

    #[test]
    fn test_materialize_report() {
        let mut report = MaterializeReport::default();
        report.record(true);
        report.record(false);
        report.record(true);
        assert_eq!(report, MaterializeReport { created: 2, failed: 1 });
    }
}

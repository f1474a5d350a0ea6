//! # Sale Totals
//!
//! Pure arithmetic for a sale, computed before the ledger is touched.
//!
//! ```text
//! subtotal = Σ unit_price × quantity
//! total    = max(0, subtotal − discount)
//! tax      = tax included in total at the business rate
//! tendered = as keyed (CASH) or total (other methods, when 0 was keyed)
//! change   = max(0, tendered − total)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, TaxRate};
use crate::types::{CreateSaleInput, PaymentMethod};
use crate::validation::{
    validate_line_count, validate_non_negative, validate_quantity, validate_tax_rate_bps,
    validate_unit_amount, validate_uuid,
};

/// Computed amounts of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
    pub tendered: Money,
    pub change: Money,
}

impl SaleTotals {
    /// Validates a sale input and computes its totals.
    ///
    /// Every rule that can reject a sale without reading the store is
    /// checked here.
    pub fn compute(input: &CreateSaleInput) -> CoreResult<Self> {
        validate_uuid("cashier_id", &input.cashier_id)?;
        validate_line_count("lines", input.lines.len())?;
        validate_non_negative("discount", input.discount_cents)?;
        validate_non_negative("amount_tendered", input.amount_tendered_cents)?;
        validate_tax_rate_bps(input.tax_rate_bps)?;

        let mut subtotal = Money::zero();
        for line in &input.lines {
            validate_quantity(line.quantity)?;
            validate_unit_amount("unit_price", line.unit_price_cents)?;
            subtotal += Money::from_cents(line.unit_price_cents).multiply_quantity(line.quantity);
        }

        let discount = Money::from_cents(input.discount_cents);
        let total = (subtotal - discount).floor_zero();
        let tax = total.included_tax(TaxRate::from_bps(input.tax_rate_bps));

        let keyed = Money::from_cents(input.amount_tendered_cents);
        let tendered = match input.payment_method {
            PaymentMethod::Cash => {
                if keyed < total {
                    return Err(CoreError::InsufficientTender {
                        tendered: keyed.cents(),
                        total: total.cents(),
                    });
                }
                keyed
            }
            _ if keyed.is_zero() => total,
            _ => keyed,
        };
        let change = (tendered - total).floor_zero();

        Ok(SaleTotals {
            subtotal,
            discount,
            tax,
            total,
            tendered,
            change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::types::SaleLine;

    const CASHIER: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn input(lines: &[(i64, i64)], discount: i64, method: PaymentMethod, tendered: i64) -> CreateSaleInput {
        CreateSaleInput {
            business_id: "b1".to_string(),
            lines: lines
                .iter()
                .enumerate()
                .map(|(i, (price, qty))| SaleLine {
                    product_id: format!("p{i}"),
                    unit_price_cents: *price,
                    quantity: *qty,
                })
                .collect(),
            discount_cents: discount,
            payment_method: method,
            amount_tendered_cents: tendered,
            cashier_id: CASHIER.to_string(),
            customer_id: None,
            tax_rate_bps: 0,
            enforce_stock: false,
        }
    }

    #[test]
    fn test_two_lines_with_discount() {
        let totals =
            SaleTotals::compute(&input(&[(150, 2), (80, 1)], 20, PaymentMethod::Card, 0)).unwrap();
        assert_eq!(totals.subtotal.cents(), 380);
        assert_eq!(totals.total.cents(), 360);
        assert_eq!(totals.tendered.cents(), 360);
        assert_eq!(totals.change.cents(), 0);
    }

    #[test]
    fn test_discount_larger_than_subtotal_is_free() {
        let totals =
            SaleTotals::compute(&input(&[(100, 1)], 500, PaymentMethod::Cash, 0)).unwrap();
        assert_eq!(totals.total.cents(), 0);
        assert_eq!(totals.change.cents(), 0);
    }

    #[test]
    fn test_cash_change() {
        let totals =
            SaleTotals::compute(&input(&[(2550, 1)], 0, PaymentMethod::Cash, 3000)).unwrap();
        assert_eq!(totals.change.cents(), 450);
    }

    #[test]
    fn test_cash_short_tender_rejected() {
        let err =
            SaleTotals::compute(&input(&[(2550, 1)], 0, PaymentMethod::Cash, 2000)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientTender {
                tendered: 2000,
                total: 2550
            }
        ));
    }

    #[test]
    fn test_included_tax() {
        let mut sale = input(&[(1150, 1)], 0, PaymentMethod::Card, 0);
        sale.tax_rate_bps = 1500;
        let totals = SaleTotals::compute(&sale).unwrap();
        assert_eq!(totals.total.cents(), 1150);
        assert_eq!(totals.tax.cents(), 150);
    }

    #[test]
    fn test_unit_price_too_large_for_line_total() {
        let err = SaleTotals::compute(&input(&[(i64::MAX / 2, 3)], 0, PaymentMethod::Card, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "unit_price"
        ));

        // Largest accepted line still totals exactly
        let max = crate::MAX_UNIT_AMOUNT_CENTS;
        let totals = SaleTotals::compute(&input(
            &[(max, crate::MAX_ITEM_QUANTITY)],
            0,
            PaymentMethod::Card,
            0,
        ))
        .unwrap();
        assert_eq!(totals.subtotal.cents(), max * crate::MAX_ITEM_QUANTITY);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(SaleTotals::compute(&input(&[], 0, PaymentMethod::Card, 0)).is_err());
        assert!(SaleTotals::compute(&input(&[(100, 0)], 0, PaymentMethod::Card, 0)).is_err());
        assert!(SaleTotals::compute(&input(&[(-1, 1)], 0, PaymentMethod::Card, 0)).is_err());
        assert!(SaleTotals::compute(&input(&[(100, 1)], -5, PaymentMethod::Card, 0)).is_err());

        let mut no_cashier = input(&[(100, 1)], 0, PaymentMethod::Card, 0);
        no_cashier.cashier_id = String::new();
        assert!(matches!(
            SaleTotals::compute(&no_cashier),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }
}
